//! Operators on a [`Dcel`](crate::mesh::Dcel).
//!
//! - **Pipeline**: the five-stage runner every edit goes through, and the
//!   [`ExitStatus`] it reports
//! - **Edits**: full-edge [split](FullEdgeSplit), [collapse](FullEdgeCollapse)
//!   and [flip](FullEdgeFlip), all implementing [`EditOperator`]
//! - **Curvature**: discrete Gaussian, mean and principal curvatures
//! - **Remeshing**: an isotropic remesher built on the edits
//!
//! Edits are transactional up to the point where they start rewiring: a
//! rejected edit leaves the container bit-for-bit unchanged.

pub mod collapse;
pub mod curvature;
pub mod edit;
pub mod flip;
pub mod pipeline;
pub mod remesh;
pub mod split;

pub use collapse::FullEdgeCollapse;
pub use curvature::{compute_curvature, vertex_curvature, VertexCurvature};
pub use edit::{run_edit, EditKind, EditOperator, EditOptions, EditOutput, EditReport};
pub use flip::FullEdgeFlip;
pub use pipeline::{
    ExitStatus, Pipeline, PipelineReport, PipelineSettings, Stage, StageOutcome, StageSettings,
};
pub use remesh::{remesh, EditTally, RemeshOptions, RemeshStats};
pub use split::FullEdgeSplit;
