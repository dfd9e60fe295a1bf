//! Isotropic remeshing driven by the edit operators.
//!
//! Each iteration runs four passes:
//!
//! 1. **Split** edges longer than 4/3 × target length
//! 2. **Collapse** edges shorter than 4/5 × target length, unless the merged
//!    vertex would end up further than 4/3 × target from a neighbour
//! 3. **Flip** edges when that brings the four vertices involved closer to
//!    their optimal valence
//! 4. **Tangential smoothing**: move vertices towards the centroid of their
//!    one-ring, within the tangent plane
//!
//! Every edit goes through its full pipeline; the outcome of each attempt is
//! tallied in [`RemeshStats`]. The driver stops as soon as the container is
//! poisoned.

use log::{debug, warn};
use nalgebra::Point3;
use rayon::prelude::*;

use super::collapse::FullEdgeCollapse;
use super::edit::EditOperator;
use super::flip::FullEdgeFlip;
use super::pipeline::{ExitStatus, PipelineSettings};
use super::split::FullEdgeSplit;
use crate::error::Result;
use crate::mesh::{Dcel, FullEdgeId, MeshIndex, VertexId};

/// Options for isotropic remeshing.
#[derive(Debug, Clone, PartialEq)]
pub struct RemeshOptions {
    /// Target edge length for the remeshed surface.
    pub target_length: f64,

    /// Number of remeshing iterations.
    pub iterations: usize,

    /// Whether to leave boundary vertices and edges alone.
    pub preserve_boundary: bool,

    /// Number of tangential smoothing iterations per remeshing iteration.
    pub smoothing_iterations: usize,

    /// Smoothing factor for tangential relaxation.
    pub smoothing_lambda: f64,

    /// Whether to compute smoothing positions in parallel (default: true).
    pub parallel: bool,

    /// Whether every edit verifies the whole container afterwards.
    pub debug: bool,
}

impl RemeshOptions {
    /// Create options with the specified target edge length.
    pub fn with_target_length(target_length: f64) -> Self {
        Self {
            target_length,
            iterations: 5,
            preserve_boundary: true,
            smoothing_iterations: 3,
            smoothing_lambda: 0.5,
            parallel: true,
            debug: cfg!(feature = "strict-checks"),
        }
    }

    /// Set the number of remeshing iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set whether to preserve the boundary.
    pub fn with_preserve_boundary(mut self, preserve: bool) -> Self {
        self.preserve_boundary = preserve;
        self
    }

    /// Set the number of smoothing iterations per remeshing iteration.
    pub fn with_smoothing_iterations(mut self, iterations: usize) -> Self {
        self.smoothing_iterations = iterations;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set whether edits run the full-container checks.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn pipeline(&self) -> PipelineSettings {
        PipelineSettings::default()
            .with_debug(self.debug)
            .with_multi_thread(self.parallel)
    }
}

/// Outcome counts of one kind of edit, per exit status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditTally {
    counts: [usize; ExitStatus::ALL.len()],
}

impl EditTally {
    /// Record one attempt.
    pub fn record(&mut self, status: ExitStatus) {
        self.counts[status.code() as usize] += 1;
    }

    /// Number of attempts that ended with `status`.
    pub fn count(&self, status: ExitStatus) -> usize {
        self.counts[status.code() as usize]
    }

    /// Number of applied edits.
    pub fn successes(&self) -> usize {
        self.count(ExitStatus::Success)
    }

    /// Number of rejected or failed edits.
    pub fn failures(&self) -> usize {
        ExitStatus::ALL
            .iter()
            .filter(|s| s.is_failure())
            .map(|&s| self.count(s))
            .sum()
    }

    /// Number of attempts.
    pub fn attempts(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// What a remeshing run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemeshStats {
    /// Split attempts.
    pub split: EditTally,
    /// Collapse attempts.
    pub collapse: EditTally,
    /// Flip attempts.
    pub flip: EditTally,
    /// Completed iterations.
    pub iterations: usize,
    /// Whether the run stopped on a poisoned container.
    pub poisoned: bool,
}

impl RemeshStats {
    /// Attempts of every kind that ended with `status`.
    pub fn total(&self, status: ExitStatus) -> usize {
        self.split.count(status) + self.collapse.count(status) + self.flip.count(status)
    }
}

/// Remesh `dcel` in place towards edges of `options.target_length`.
///
/// # Example
///
/// ```
/// use dcel_kernel::prelude::*;
/// use dcel_kernel::algo::{remesh, RemeshOptions};
/// use nalgebra::Point3;
///
/// let mesh = TriangleMesh::new(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(2.0, 0.0, 0.0),
///         Point3::new(2.0, 2.0, 0.0),
///         Point3::new(0.0, 2.0, 0.0),
///         Point3::new(1.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]],
/// );
/// let mut dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
///
/// let stats = remesh(&mut dcel, &RemeshOptions::with_target_length(0.8).with_iterations(2));
/// assert!(stats.split.successes() > 0);
/// assert!(dcel.is_valid_all());
/// ```
pub fn remesh<I: MeshIndex>(dcel: &mut Dcel<I>, options: &RemeshOptions) -> RemeshStats {
    let mut stats = RemeshStats::default();
    if dcel.is_poisoned() {
        warn!("remesh: refusing a poisoned container");
        stats.poisoned = true;
        return stats;
    }
    if options.iterations == 0 || !(options.target_length.is_finite() && options.target_length > 0.0) {
        warn!("remesh: nothing to do for target length {}", options.target_length);
        return stats;
    }

    let high = options.target_length * 4.0 / 3.0;
    let low = options.target_length * 4.0 / 5.0;
    let settings = options.pipeline();

    for iter in 0..options.iterations {
        split_long_edges(dcel, high, options, &settings, &mut stats);
        if dcel.is_poisoned() {
            break;
        }
        collapse_short_edges(dcel, low, high, options, &settings, &mut stats);
        if dcel.is_poisoned() {
            break;
        }
        flip_edges_to_improve_valence(dcel, options, &settings, &mut stats);
        if dcel.is_poisoned() {
            break;
        }
        for _ in 0..options.smoothing_iterations {
            if let Err(err) = tangential_smooth(dcel, options) {
                warn!("remesh: smoothing skipped: {}", err);
                break;
            }
        }
        stats.iterations += 1;
        debug!(
            "remesh iteration {}: {} splits, {} collapses, {} flips so far",
            iter,
            stats.split.successes(),
            stats.collapse.successes(),
            stats.flip.successes()
        );
    }

    stats.poisoned = dcel.is_poisoned();
    stats
}

/// Live full-edges passing `keep`, longest first.
fn edges_by_length<I: MeshIndex>(
    dcel: &Dcel<I>,
    descending: bool,
    keep: impl Fn(FullEdgeId<I>, f64) -> bool,
) -> Vec<FullEdgeId<I>> {
    let mut edges: Vec<(FullEdgeId<I>, f64)> = dcel
        .full_edge_ids()
        .filter_map(|e| dcel.length(e).ok().map(|l| (e, l)))
        .filter(|&(e, l)| keep(e, l))
        .collect();
    edges.sort_by(|a, b| {
        let order = a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));
        if descending {
            order.reverse()
        } else {
            order
        }
    });
    edges.into_iter().map(|(e, _)| e).collect()
}

fn split_long_edges<I: MeshIndex>(
    dcel: &mut Dcel<I>,
    high: f64,
    options: &RemeshOptions,
    settings: &PipelineSettings,
    stats: &mut RemeshStats,
) {
    let candidates = edges_by_length(dcel, true, |e, l| {
        l > high && !(options.preserve_boundary && dcel.is_border_full_edge(e))
    });
    for e in candidates {
        if dcel.length(e).map_or(true, |l| l <= high) {
            continue;
        }
        let report = FullEdgeSplit::new(e).run(dcel, settings);
        stats.split.record(report.status);
        if dcel.is_poisoned() {
            return;
        }
    }
}

fn collapse_short_edges<I: MeshIndex>(
    dcel: &mut Dcel<I>,
    low: f64,
    high: f64,
    options: &RemeshOptions,
    settings: &PipelineSettings,
    stats: &mut RemeshStats,
) {
    let candidates = edges_by_length(dcel, false, |_, l| l < low);
    for e in candidates {
        let Ok(true) = dcel.length(e).map(|l| l < low) else {
            continue;
        };
        let Ok(acceptable) = collapse_is_acceptable(dcel, e, high, options.preserve_boundary) else {
            continue;
        };
        if !acceptable {
            continue;
        }
        let report = FullEdgeCollapse::new(e).run(dcel, settings);
        stats.collapse.record(report.status);
        if dcel.is_poisoned() {
            return;
        }
    }
}

/// Whether merging the endpoints of `e` at its midpoint keeps every new
/// edge within `high` and, if requested, leaves the boundary alone.
fn collapse_is_acceptable<I: MeshIndex>(
    dcel: &Dcel<I>,
    e: FullEdgeId<I>,
    high: f64,
    preserve_boundary: bool,
) -> Result<bool> {
    let [a, b] = dcel.full_edge_vertices(e)?;
    if preserve_boundary && (dcel.is_border_vertex(a) || dcel.is_border_vertex(b)) {
        return Ok(false);
    }
    let merged = Point3::from((dcel.position(a)?.coords + dcel.position(b)?.coords) * 0.5);
    for v in [a, b] {
        for w in dcel.vertex_vertices(v) {
            let w = w?;
            if w != a && w != b && (dcel.position(w)? - merged).norm() > high {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn flip_edges_to_improve_valence<I: MeshIndex>(
    dcel: &mut Dcel<I>,
    options: &RemeshOptions,
    settings: &PipelineSettings,
    stats: &mut RemeshStats,
) {
    let candidates: Vec<FullEdgeId<I>> = dcel
        .full_edge_ids()
        .filter(|&e| !dcel.is_border_full_edge(e))
        .collect();
    for e in candidates {
        let Ok(true) = flip_improves_valence(dcel, e, options.preserve_boundary) else {
            continue;
        };
        let report = FullEdgeFlip::new(e).run(dcel, settings);
        stats.flip.record(report.status);
        if dcel.is_poisoned() {
            return;
        }
    }
}

/// Total valence deviation of the edge's four vertices, before and after a flip.
fn flip_improves_valence<I: MeshIndex>(dcel: &Dcel<I>, e: FullEdgeId<I>, preserve_boundary: bool) -> Result<bool> {
    let h = dcel.full_edge(e)?.halfedge;
    let t = dcel.twin(h);
    let a = dcel.origin(h);
    let b = dcel.target(h);
    let c = dcel.target(dcel.next(h));
    let d = dcel.target(dcel.next(t));
    if preserve_boundary && (dcel.is_border_vertex(a) || dcel.is_border_vertex(b)) {
        return Ok(false);
    }

    let deviation = |v: VertexId<I>, delta: isize| -> Result<isize> {
        Ok((dcel.d_optimal_valence(v)? + delta).abs())
    };
    let before = deviation(a, 0)? + deviation(b, 0)? + deviation(c, 0)? + deviation(d, 0)?;
    let after = deviation(a, -1)? + deviation(b, -1)? + deviation(c, 1)? + deviation(d, 1)?;
    Ok(after < before)
}

/// One step of tangential relaxation towards the one-ring centroid.
fn tangential_smooth<I: MeshIndex>(dcel: &mut Dcel<I>, options: &RemeshOptions) -> Result<()> {
    let vertices: Vec<VertexId<I>> = dcel.vertex_ids().collect();
    let view: &Dcel<I> = dcel;

    let compute_position = |v: VertexId<I>| -> Result<Point3<f64>> {
        let pos = *view.position(v)?;
        if options.preserve_boundary && view.is_border_vertex(v) {
            return Ok(pos);
        }
        let ring = view.vertex_vertices(v).collect::<Result<Vec<_>>>()?;
        if ring.is_empty() {
            return Ok(pos);
        }
        let mut centroid = nalgebra::Vector3::zeros();
        for &w in &ring {
            centroid += view.position(w)?.coords;
        }
        centroid /= ring.len() as f64;

        let displacement = centroid - pos.coords;
        let normal = view.vertex_normal(v)?;
        let tangent = displacement - normal.dot(&displacement) * normal;
        Ok(pos + options.smoothing_lambda * tangent)
    };

    let positions: Vec<Point3<f64>> = if options.parallel {
        vertices.par_iter().map(|&v| compute_position(v)).collect::<Result<_>>()?
    } else {
        vertices.iter().map(|&v| compute_position(v)).collect::<Result<_>>()?
    };

    for (v, p) in vertices.into_iter().zip(positions) {
        dcel.set_position(v, p)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::curvature::tests::{flat_grid, icosphere};
    use crate::algo::edit::tests::init;

    fn euler<I: MeshIndex>(dcel: &Dcel<I>) -> isize {
        dcel.num_vertices() as isize - dcel.num_full_edges() as isize + dcel.num_faces() as isize
    }

    #[test]
    fn test_tally() {
        let mut tally = EditTally::default();
        tally.record(ExitStatus::Success);
        tally.record(ExitStatus::Success);
        tally.record(ExitStatus::NotProcessable);
        assert_eq!(tally.successes(), 2);
        assert_eq!(tally.failures(), 1);
        assert_eq!(tally.attempts(), 3);
        assert_eq!(tally.count(ExitStatus::NotFound), 0);
    }

    #[test]
    fn test_remesh_refines_flat_grid() {
        init();
        let mut dcel = flat_grid(4);
        let before = dcel.mean_full_edge_length().unwrap();

        let options = RemeshOptions::with_target_length(0.5)
            .with_iterations(2)
            .with_debug(true);
        let stats = remesh(&mut dcel, &options);

        assert!(!stats.poisoned);
        assert_eq!(stats.iterations, 2);
        assert!(stats.split.successes() > 0);
        assert!(dcel.mean_full_edge_length().unwrap() < before);
        assert!(dcel.vertices().all(|(_, v)| v.position.z == 0.0));
        assert!(dcel.is_valid_all());
        assert_eq!(euler(&dcel), 1);
    }

    #[test]
    fn test_remesh_keeps_sphere_closed() {
        init();
        let mut dcel = icosphere(1);
        let target = dcel.mean_full_edge_length().unwrap() * 0.7;
        let options = RemeshOptions::with_target_length(target)
            .with_iterations(2)
            .with_parallel(false);
        let stats = remesh(&mut dcel, &options);

        assert!(!stats.poisoned);
        assert!(stats.total(ExitStatus::Success) > 0);
        assert_eq!(stats.total(ExitStatus::InvalidTopology), 0);
        assert!(dcel.is_valid_all());
        assert_eq!(euler(&dcel), 2);
        assert!(dcel.vertex_ids().all(|v| !dcel.is_border_vertex(v)));
    }

    #[test]
    fn test_coarsening_collapses_edges() {
        let mut dcel = icosphere(2);
        let faces = dcel.num_faces();
        let target = dcel.mean_full_edge_length().unwrap() * 2.0;
        let stats = remesh(&mut dcel, &RemeshOptions::with_target_length(target).with_iterations(1));

        assert!(stats.collapse.successes() > 0);
        assert!(dcel.num_faces() < faces);
        assert!(dcel.is_valid_all());
        assert_eq!(euler(&dcel), 2);
    }

    #[test]
    fn test_nothing_to_do() {
        let mut dcel = flat_grid(2);
        let before = dcel.clone();

        let stats = remesh(&mut dcel, &RemeshOptions::with_target_length(0.5).with_iterations(0));
        assert_eq!(stats, RemeshStats::default());
        let stats = remesh(&mut dcel, &RemeshOptions::with_target_length(-1.0));
        assert_eq!(stats, RemeshStats::default());
        assert_eq!(dcel, before);
    }

    #[test]
    fn test_poisoned_container_is_refused() {
        let mut dcel = flat_grid(2);
        dcel.poison("test");
        let stats = remesh(&mut dcel, &RemeshOptions::with_target_length(0.5));
        assert!(stats.poisoned);
        assert_eq!(stats.split.attempts(), 0);
    }
}
