//! # dcel-kernel
//!
//! A doubly-connected edge list (half-edge) topology kernel for polygonal
//! surface meshes.
//!
//! The kernel stores vertices, half-edges, full-edges and faces in arenas
//! addressed by typed indices, and offers three local topology edits (split,
//! collapse, flip) that run through a staged pipeline and report an exit
//! status instead of panicking.
//!
//! ## Features
//!
//! - **Arena storage**: stable typed indices, never reused after removal
//! - **Flexible indexing**: 16-bit, 32-bit or 64-bit indices
//! - **Bounded traversal**: circulators that report corrupted topology
//!   instead of looping
//! - **Transactional edits**: rejected edits leave the mesh untouched
//! - **Queries**: border tests, validity checks, normals, valence, curvature
//!   and curvature-driven sizing values
//! - **File formats**: OBJ and STL
//!
//! ## Building Meshes
//!
//! ```
//! use dcel_kernel::prelude::*;
//! use nalgebra::Point3;
//!
//! let mesh = TriangleMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.5, 1.0, 0.0),
//!         Point3::new(0.5, 0.5, 1.0),
//!     ],
//!     vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
//! );
//!
//! let dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
//! assert_eq!(dcel.num_vertices(), 4);
//! assert_eq!(dcel.num_halfedges(), 12);
//! assert!(dcel.is_valid_all());
//! ```
//!
//! ## Traversal and Edits
//!
//! ```
//! use dcel_kernel::prelude::*;
//! use dcel_kernel::algo::{EditOperator, ExitStatus, FullEdgeSplit, PipelineSettings};
//! use nalgebra::Point3;
//!
//! # let mesh = TriangleMesh::new(
//! #     vec![
//! #         Point3::new(0.0, 0.0, 0.0),
//! #         Point3::new(1.0, 0.0, 0.0),
//! #         Point3::new(1.0, 1.0, 0.0),
//! #         Point3::new(0.0, 1.0, 0.0),
//! #     ],
//! #     vec![[0, 1, 2], [0, 2, 3]],
//! # );
//! let mut dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
//! let v = VertexId::new(0);
//! assert_eq!(dcel.vertex_vertices(v).size().unwrap(), 3);
//!
//! let diagonal = dcel.find_halfedge(v, VertexId::new(2)).unwrap();
//! let mut split = FullEdgeSplit::new(dcel.full_edge_of(diagonal));
//! let report = split.run(&mut dcel, &PipelineSettings::default());
//! assert_eq!(report.status, ExitStatus::Success);
//! assert_eq!(dcel.num_faces(), 4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod io;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// ```
/// use dcel_kernel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{DcelError, Result};
    pub use crate::mesh::{
        Circulator, Dcel, Face, FaceId, FullEdge, FullEdgeId, HalfEdge, HalfEdgeId, MeshIndex,
        TriangleMesh, Vertex, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron() {
        let mesh = TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        );

        let dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
        assert_eq!(dcel.num_vertices(), 4);
        assert_eq!(dcel.num_faces(), 4);
        // Closed: no boundary half-edges
        assert_eq!(dcel.num_halfedges(), 12);
        assert!(dcel.is_valid_all());

        for v in dcel.vertex_ids() {
            assert!(!dcel.is_border_vertex(v), "vertex {} should not be on boundary", v);
            assert_eq!(dcel.valence(v).unwrap(), 3);
        }
    }

    #[test]
    fn test_u16_indices() {
        let mesh = TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let dcel = Dcel::<u16>::from_triangle_mesh(&mesh).unwrap();
        assert_eq!(dcel.num_halfedges(), 6);
        assert_eq!(dcel.to_triangle_mesh().unwrap(), mesh);
    }
}
