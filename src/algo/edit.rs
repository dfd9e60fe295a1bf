//! Common machinery of the local edit operators.
//!
//! An [`EditOperator`] splits its work into the five pipeline stages. All
//! stages before [`process`](EditOperator::process) are read-only, so a
//! rejected edit leaves the container exactly as it was. Once processing has
//! started, any error is a corruption: the container is poisoned and the run
//! reports [`ExitStatus::InvalidTopology`]. The one exception is a
//! [`DcelError::NotProcessable`] from `process`, which operators raise only
//! before their first write (a forced `is_processable` left no plan).

use std::collections::BTreeMap;

use log::{debug, trace};

use super::collapse::FullEdgeCollapse;
use super::flip::FullEdgeFlip;
use super::pipeline::{ExitStatus, Pipeline, PipelineReport, PipelineSettings, Stage, StageOutcome};
use super::split::FullEdgeSplit;
use crate::error::{DcelError, Result};
use crate::mesh::{Dcel, FaceId, FullEdgeId, HalfEdge, HalfEdgeId, MeshIndex, VertexId};

/// Options shared by the edit operators.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOptions {
    /// Position parameter along the edge: the new vertex for a split, the
    /// surviving vertex for a collapse. `None` means the midpoint.
    pub parameter: Option<f64>,

    /// Stage switches and debug checks.
    pub pipeline: PipelineSettings,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            parameter: None,
            pipeline: PipelineSettings::default(),
        }
    }
}

impl EditOptions {
    /// Set the position parameter along the edge.
    pub fn with_parameter(mut self, t: f64) -> Self {
        self.parameter = Some(t);
        self
    }

    /// Set whether post-processing verifies the whole container.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.pipeline.debug = debug;
        self
    }

    /// Replace the pipeline settings.
    pub fn with_pipeline(mut self, pipeline: PipelineSettings) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// A local topology edit, run through the stage pipeline.
pub trait EditOperator<I: MeshIndex> {
    /// What a successful edit produces.
    type Output: Copy;

    /// Operator name, for logging.
    const NAME: &'static str;

    /// Reset per-run state. Refuses a poisoned container with
    /// [`DcelError::InvalidTopology`].
    fn setup(&mut self, dcel: &Dcel<I>) -> Result<()> {
        if dcel.is_poisoned() {
            return Err(DcelError::topology("container is poisoned"));
        }
        Ok(())
    }

    /// Validate parameters.
    fn config_check(&self) -> Result<()>;

    /// Check preconditions and record everything `process` needs. Read-only.
    fn is_processable(&mut self, dcel: &Dcel<I>) -> Result<()>;

    /// Rewire the container.
    ///
    /// May return [`DcelError::NotProcessable`] only before the first write.
    fn process(&mut self, dcel: &mut Dcel<I>) -> Result<()>;

    /// Verify local invariants around the edit.
    fn post_process(&mut self, dcel: &Dcel<I>) -> Result<()>;

    /// The result of the last successful run.
    fn output(&self) -> Option<Self::Output>;

    /// Run all stages on `dcel`.
    fn run(&mut self, dcel: &mut Dcel<I>, settings: &PipelineSettings) -> PipelineReport
    where
        Self: Sized,
    {
        let mut job = Job { op: self, dcel };
        Pipeline::<Job<'_, Self, I>>::new(Self::NAME, settings.clone())
            .stage(Stage::Setup, |job, _| {
                outcome(Self::NAME, Stage::Setup, job.op.setup(job.dcel))
            })
            .stage(Stage::ConfigCheck, |job, _| {
                outcome(Self::NAME, Stage::ConfigCheck, job.op.config_check())
            })
            .stage(Stage::IsProcessable, |job, _| {
                outcome(Self::NAME, Stage::IsProcessable, job.op.is_processable(job.dcel))
            })
            .stage(Stage::Process, |job, _| {
                match job.op.process(job.dcel) {
                    Ok(()) => StageOutcome::Ok,
                    Err(err @ DcelError::NotProcessable(_)) => {
                        outcome(Self::NAME, Stage::Process, Err(err))
                    }
                    Err(err) => {
                        job.dcel.poison(&format!("{} failed while rewiring: {}", Self::NAME, err));
                        StageOutcome::Fail(ExitStatus::InvalidTopology)
                    }
                }
            })
            .stage(Stage::PostProcess, |job, settings| {
                let checked = job.op.post_process(job.dcel).and_then(|()| {
                    let sound = || {
                        if settings.multi_thread {
                            job.dcel.is_valid_all_parallel() && job.dcel.is_consistent_all_parallel()
                        } else {
                            job.dcel.is_valid_all() && job.dcel.is_consistent_all()
                        }
                    };
                    if settings.debug && !sound() {
                        Err(DcelError::topology("container invariants violated"))
                    } else {
                        Ok(())
                    }
                });
                match checked {
                    Ok(()) => StageOutcome::Ok,
                    Err(err) => {
                        job.dcel.poison(&format!("{} left bad topology: {}", Self::NAME, err));
                        StageOutcome::Fail(ExitStatus::InvalidTopology)
                    }
                }
            })
            .run(&mut job)
    }
}

struct Job<'a, O, I: MeshIndex> {
    op: &'a mut O,
    dcel: &'a mut Dcel<I>,
}

fn outcome(name: &str, stage: Stage, result: Result<()>) -> StageOutcome {
    match result {
        Ok(()) => StageOutcome::Ok,
        Err(err) => {
            debug!("{}: rejected at {:?}: {}", name, stage, err);
            StageOutcome::Fail(err.exit_status())
        }
    }
}

/// Which edit to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    /// [`FullEdgeSplit`].
    Split,
    /// [`FullEdgeCollapse`].
    Collapse,
    /// [`FullEdgeFlip`].
    Flip,
}

/// The entity a successful edit hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutput<I: MeshIndex = u32> {
    /// A new or surviving vertex.
    Vertex(VertexId<I>),
    /// A rewired full-edge.
    FullEdge(FullEdgeId<I>),
}

/// Report and output of one edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditReport<I: MeshIndex = u32> {
    /// Per-stage statuses.
    pub report: PipelineReport,
    /// The edit's output, when it succeeded.
    pub output: Option<EditOutput<I>>,
}

impl<I: MeshIndex> EditReport<I> {
    /// Overall status.
    #[inline]
    pub fn status(&self) -> ExitStatus {
        self.report.status
    }

    /// Whether the edit was applied.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }
}

/// Run one edit operator on a full-edge.
///
/// # Example
///
/// ```
/// use dcel_kernel::prelude::*;
/// use dcel_kernel::algo::{run_edit, EditKind, EditOptions, ExitStatus};
/// use nalgebra::Point3;
///
/// let mesh = TriangleMesh::new(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(1.0, 1.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 2], [0, 2, 3]],
/// );
/// let mut dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
/// let diagonal = dcel.find_halfedge(VertexId::new(0), VertexId::new(2)).unwrap();
/// let e = dcel.full_edge_of(diagonal);
///
/// let result = run_edit(&mut dcel, EditKind::Flip, e, &EditOptions::default());
/// assert_eq!(result.status(), ExitStatus::Success);
/// assert!(dcel.find_halfedge(VertexId::new(1), VertexId::new(3)).is_some());
/// ```
pub fn run_edit<I: MeshIndex>(
    dcel: &mut Dcel<I>,
    kind: EditKind,
    edge: FullEdgeId<I>,
    options: &EditOptions,
) -> EditReport<I> {
    match kind {
        EditKind::Split => {
            let mut op = FullEdgeSplit::new(edge);
            if let Some(t) = options.parameter {
                op = op.with_parameter(t);
            }
            let report = op.run(dcel, &options.pipeline);
            EditReport {
                report,
                output: op.output().map(EditOutput::Vertex),
            }
        }
        EditKind::Collapse => {
            let mut op = FullEdgeCollapse::new(edge);
            if let Some(t) = options.parameter {
                op = op.with_parameter(t);
            }
            let report = op.run(dcel, &options.pipeline);
            EditReport {
                report,
                output: op.output().map(EditOutput::Vertex),
            }
        }
        EditKind::Flip => {
            let mut op = FullEdgeFlip::new(edge);
            let report = op.run(dcel, &options.pipeline);
            EditReport {
                report,
                output: op.output().map(EditOutput::FullEdge),
            }
        }
    }
}

// ==================== Shared helpers for the operators ====================

/// The three half-edges of a triangular face, starting at `he`.
pub(crate) fn triangle<I: MeshIndex>(dcel: &Dcel<I>, he: HalfEdgeId<I>) -> Result<[HalfEdgeId<I>; 3]> {
    let next = dcel.next(he);
    let prev = dcel.prev(he);
    if !dcel.contains(next) || !dcel.contains(prev) {
        return Err(DcelError::topology(format!("{:?} has a dead neighbour", he)));
    }
    if dcel.next(next) != prev {
        return Err(DcelError::NotImplemented("edits on non-triangular faces"));
    }
    Ok([he, next, prev])
}

/// Resolve a full-edge to its primary half-edge and twin.
pub(crate) fn edge_halfedges<I: MeshIndex>(
    dcel: &Dcel<I>,
    e: FullEdgeId<I>,
) -> Result<(HalfEdgeId<I>, HalfEdgeId<I>)> {
    let h = dcel.full_edge(e)?.halfedge;
    dcel.halfedge(h)?;
    let t = dcel.twin(h);
    dcel.halfedge(t)?;
    Ok((h, t))
}

/// New half-edge records for an edit, written and bound as one batch.
///
/// Every half-edge in the batch is unbound first, which clears the neighbour
/// references pointing at it; the new records are then written and bound,
/// which restores the references the new wiring implies.
pub(crate) struct Rewire<I: MeshIndex> {
    records: BTreeMap<HalfEdgeId<I>, HalfEdge<I>>,
}

impl<I: MeshIndex> Rewire<I> {
    pub(crate) fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Start from the current record of `he`.
    pub(crate) fn keep(&mut self, dcel: &Dcel<I>, he: HalfEdgeId<I>) -> Result<&mut HalfEdge<I>> {
        let rec = *dcel.halfedge(he)?;
        Ok(self.records.entry(he).or_insert(rec))
    }

    /// Replace the record of `he`.
    pub(crate) fn set(&mut self, he: HalfEdgeId<I>, rec: HalfEdge<I>) {
        self.records.insert(he, rec);
    }

    pub(crate) fn get_mut(&mut self, he: HalfEdgeId<I>) -> Option<&mut HalfEdge<I>> {
        self.records.get_mut(&he)
    }

    /// Unbind `retired` and the batch, write the batch, then bind it together
    /// with the given full-edges and faces.
    pub(crate) fn apply(
        self,
        dcel: &mut Dcel<I>,
        retired: &[HalfEdgeId<I>],
        full_edges: &[FullEdgeId<I>],
        faces: &[FaceId<I>],
    ) -> Result<()> {
        for &he in retired.iter().chain(self.records.keys()) {
            dcel.unbind(he)?;
        }
        for (&he, &rec) in &self.records {
            dcel.write_halfedge(he, rec)?;
        }
        let batch: Vec<HalfEdgeId<I>> = self.records.keys().copied().collect();
        trace!("rewiring {} half-edges", batch.len());
        dcel.bind_region(&batch, full_edges, faces)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;
    use nalgebra::Point3;

    pub(crate) fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Unit square split along the 0-2 diagonal: 4 vertices, 2 faces, 5 full-edges.
    pub(crate) fn quad() -> Dcel {
        Dcel::from_triangle_mesh(&TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        ))
        .unwrap()
    }

    pub(crate) fn edge_between(dcel: &Dcel, a: usize, b: usize) -> FullEdgeId {
        let he = dcel
            .find_halfedge(VertexId::new(a), VertexId::new(b))
            .expect("vertices are adjacent");
        dcel.full_edge_of(he)
    }

    #[test]
    fn test_run_edit_dispatch() {
        init();
        let mut dcel = quad();
        let diagonal = edge_between(&dcel, 0, 2);

        let split = run_edit(&mut dcel, EditKind::Split, diagonal, &EditOptions::default());
        assert!(split.is_success());
        let Some(EditOutput::Vertex(m)) = split.output else {
            panic!("split should produce a vertex");
        };
        assert_eq!(*dcel.position(m).unwrap(), Point3::new(0.5, 0.5, 0.0));

        // 0 and 2 are no longer adjacent, so the 1-m spoke can turn into 0-2
        let spoke = edge_between(&dcel, 1, m.index());
        let flip = run_edit(&mut dcel, EditKind::Flip, spoke, &EditOptions::default());
        assert_eq!(flip.output, Some(EditOutput::FullEdge(spoke)));
        assert!(dcel.is_valid_all());

        let mut dcel = quad();
        let side = edge_between(&dcel, 0, 1);
        let collapse = run_edit(
            &mut dcel,
            EditKind::Collapse,
            side,
            &EditOptions::default().with_debug(true),
        );
        assert!(collapse.is_success(), "{:?}", collapse.report);
        assert_eq!(collapse.output, Some(EditOutput::Vertex(VertexId::new(0))));
        assert_eq!(dcel.num_faces(), 1);
        assert!(dcel.is_valid_all());
    }

    #[test]
    fn test_poisoned_container_is_refused() {
        init();
        let mut dcel = quad();
        dcel.poison("test");
        let e = edge_between(&dcel, 0, 2);
        let result = run_edit(&mut dcel, EditKind::Flip, e, &EditOptions::default());
        assert_eq!(result.status(), ExitStatus::InvalidTopology);
        assert_eq!(result.report.stage_status(Stage::Setup), Some(ExitStatus::InvalidTopology));
        assert!(result.output.is_none());
    }

    #[test]
    fn test_forced_rejection_keeps_container_usable() {
        init();
        let mut dcel = quad();
        let before = dcel.clone();
        let border = edge_between(&dcel, 0, 1);
        let options = EditOptions::default()
            .with_pipeline(PipelineSettings::default().with_force(Stage::IsProcessable, true));

        let result = run_edit(&mut dcel, EditKind::Split, border, &options);
        assert_eq!(result.status(), ExitStatus::NotProcessable);
        assert_eq!(
            result.report.stage_status(Stage::IsProcessable),
            Some(ExitStatus::NotProcessable)
        );
        assert_eq!(result.report.stage_status(Stage::Process), Some(ExitStatus::NotProcessable));
        assert!(!dcel.is_poisoned());
        assert_eq!(dcel, before);

        // Later edits still run
        let diagonal = edge_between(&dcel, 0, 2);
        let flip = run_edit(&mut dcel, EditKind::Flip, diagonal, &EditOptions::default());
        assert!(flip.is_success(), "{:?}", flip.report);
    }

    #[test]
    fn test_multi_thread_debug_checks() {
        init();
        let mut dcel = quad();
        let diagonal = edge_between(&dcel, 0, 2);
        let options = EditOptions::default().with_pipeline(
            PipelineSettings::default().with_debug(true).with_multi_thread(true),
        );
        let result = run_edit(&mut dcel, EditKind::Split, diagonal, &options);
        assert!(result.is_success(), "{:?}", result.report);
        assert_eq!(dcel.num_faces(), 4);
    }

    #[test]
    fn test_disabled_process_changes_nothing() {
        init();
        let mut dcel = quad();
        let before = dcel.clone();
        let e = edge_between(&dcel, 0, 2);
        let options = EditOptions::default()
            .with_pipeline(PipelineSettings::default().with_run(Stage::Process, false));
        let result = run_edit(&mut dcel, EditKind::Flip, e, &options);
        assert_eq!(result.report.stage_status(Stage::Process), Some(ExitStatus::Skipped));
        assert_eq!(dcel, before);
    }
}
