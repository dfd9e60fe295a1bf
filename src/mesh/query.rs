//! Read-only query operators.
//!
//! Border and consistency checks return plain booleans and never fail; a dead
//! handle is simply "not border" and "not valid". Geometric queries return
//! [`Result`] because they have to resolve positions.

use std::collections::HashSet;

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use super::dcel::Dcel;
use super::index::{FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};
use super::iter::Circulator;
use crate::algo::curvature::vertex_curvature;
use crate::error::{DcelError, Result};

/// Below this, curvature is treated as zero and the sizing value is unbounded.
const FLAT_CURVATURE: f64 = 1e-12;

/// Summary of full-edge lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeLengthStats {
    /// Shortest full-edge.
    pub min: f64,
    /// Longest full-edge.
    pub max: f64,
    /// Mean full-edge length.
    pub mean: f64,
    /// Number of full-edges measured.
    pub count: usize,
}

impl Default for EdgeLengthStats {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            count: 0,
        }
    }
}

impl EdgeLengthStats {
    fn from_lengths(lengths: impl Iterator<Item = f64>) -> Self {
        let (min, max, sum, count) = lengths.fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize),
            |(min, max, sum, n), l| (min.min(l), max.max(l), sum + l, n + 1),
        );
        if count == 0 {
            return Self::default();
        }
        Self {
            min,
            max,
            mean: sum / count as f64,
            count,
        }
    }
}

impl<I: MeshIndex> Dcel<I> {
    // ==================== Border ====================

    /// Check if a half-edge lies on the boundary (it or its twin has no face).
    pub fn is_border_halfedge(&self, he: HalfEdgeId<I>) -> bool {
        match self.he(he) {
            Some(rec) => rec.is_boundary() || self.he(rec.twin).map_or(true, |t| t.is_boundary()),
            None => false,
        }
    }

    /// Check if a full-edge lies on the boundary.
    pub fn is_border_full_edge(&self, e: FullEdgeId<I>) -> bool {
        self.is_border_halfedge(self.full_edge_halfedge(e))
    }

    /// Check if a vertex lies on the boundary.
    ///
    /// Isolated vertices are not on the boundary.
    pub fn is_border_vertex(&self, v: VertexId<I>) -> bool {
        self.vertex_halfedges(v)
            .map_while(|he| he.ok())
            .any(|he| self.is_border_halfedge(he))
    }

    /// Check if a face has at least one boundary edge.
    pub fn is_border_face(&self, f: FaceId<I>) -> bool {
        self.face_halfedges(f)
            .map_while(|he| he.ok())
            .any(|he| self.is_border_halfedge(he))
    }

    // ==================== Consistency ====================

    /// Check the local invariants of a vertex; dead neighbours are skipped.
    pub fn is_consistent_vertex(&self, v: VertexId<I>) -> bool {
        let Ok(rec) = self.vertex(v) else {
            return false;
        };
        self.he(rec.halfedge).map_or(true, |he| he.origin == v)
    }

    /// Check the local invariants of a half-edge; dead neighbours are skipped.
    pub fn is_consistent_halfedge(&self, h: HalfEdgeId<I>) -> bool {
        let Some(rec) = self.he(h) else {
            return false;
        };
        if rec.origin.is_valid() && rec.origin == rec.target {
            return false;
        }
        if let Some(next) = self.he(rec.next) {
            if next.prev != h || next.origin != rec.target || next.face != rec.face {
                return false;
            }
        }
        if let Some(prev) = self.he(rec.prev) {
            if prev.next != h || prev.target != rec.origin || prev.face != rec.face {
                return false;
            }
        }
        if let Some(twin) = self.he(rec.twin) {
            if rec.twin == h
                || twin.twin != h
                || twin.origin != rec.target
                || twin.target != rec.origin
                || twin.full_edge != rec.full_edge
            {
                return false;
            }
        }
        if let Ok(e) = self.full_edge(rec.full_edge) {
            if e.halfedge != h && e.halfedge != rec.twin {
                return false;
            }
        }
        true
    }

    /// Check the local invariants of a full-edge; dead neighbours are skipped.
    pub fn is_consistent_full_edge(&self, e: FullEdgeId<I>) -> bool {
        let Ok(rec) = self.full_edge(e) else {
            return false;
        };
        let Some(he) = self.he(rec.halfedge) else {
            return true;
        };
        he.full_edge == e && self.he(he.twin).map_or(true, |t| t.full_edge == e)
    }

    /// Check the local invariants of a face; the cycle walk stops at a dead link.
    pub fn is_consistent_face(&self, f: FaceId<I>) -> bool {
        let Ok(rec) = self.face(f) else {
            return false;
        };
        let seed = rec.halfedge;
        let mut he = seed;
        for _ in 0..=self.halfedge_capacity() {
            let Some(cur) = self.he(he) else {
                return true;
            };
            if cur.face != f {
                return false;
            }
            he = cur.next;
            if he == seed {
                return true;
            }
        }
        false
    }

    // ==================== Validity ====================

    /// Check that a vertex is consistent and all its references are live.
    pub fn is_valid_vertex(&self, v: VertexId<I>) -> bool {
        let Ok(rec) = self.vertex(v) else {
            return false;
        };
        let linked = !rec.halfedge.is_valid() || self.contains(rec.halfedge);
        linked && self.is_consistent_vertex(v) && self.vertex_halfedges(v).size().is_ok()
    }

    /// Check that a half-edge is consistent and all its references are live.
    pub fn is_valid_halfedge(&self, h: HalfEdgeId<I>) -> bool {
        let Some(rec) = self.he(h) else {
            return false;
        };
        let face_ok = !rec.face.is_valid() || self.contains(rec.face);
        self.contains(rec.origin)
            && self.contains(rec.target)
            && self.contains(rec.next)
            && self.contains(rec.prev)
            && self.contains(rec.twin)
            && self.contains(rec.full_edge)
            && face_ok
            && self.is_consistent_halfedge(h)
    }

    /// Check that a full-edge is consistent and both half-edges are live.
    pub fn is_valid_full_edge(&self, e: FullEdgeId<I>) -> bool {
        let he = self.full_edge_halfedge(e);
        self.contains(he) && self.contains(self.twin(he)) && self.is_consistent_full_edge(e)
    }

    /// Check that a face is consistent and bounded by a closed cycle of at least 3 half-edges.
    pub fn is_valid_face(&self, f: FaceId<I>) -> bool {
        if !self.contains(self.face_halfedge(f)) || !self.is_consistent_face(f) {
            return false;
        }
        matches!(self.face_halfedges(f).size(), Ok(n) if n >= 3)
    }

    /// Check every local invariant of every live entity.
    pub fn is_consistent_all(&self) -> bool {
        self.vertex_ids().all(|v| self.is_consistent_vertex(v))
            && self.halfedge_ids().all(|h| self.is_consistent_halfedge(h))
            && self.full_edge_ids().all(|e| self.is_consistent_full_edge(e))
            && self.face_ids().all(|f| self.is_consistent_face(f))
    }

    /// Check consistency plus liveness of every reference in the container.
    pub fn is_valid_all(&self) -> bool {
        self.vertex_ids().all(|v| self.is_valid_vertex(v))
            && self.halfedge_ids().all(|h| self.is_valid_halfedge(h))
            && self.full_edge_ids().all(|e| self.is_valid_full_edge(e))
            && self.face_ids().all(|f| self.is_valid_face(f))
            && self.num_halfedges() == 2 * self.num_full_edges()
    }

    /// [`is_consistent_all`](Self::is_consistent_all) spread over rayon.
    pub fn is_consistent_all_parallel(&self) -> bool {
        let vertices: Vec<VertexId<I>> = self.vertex_ids().collect();
        let halfedges: Vec<HalfEdgeId<I>> = self.halfedge_ids().collect();
        let full_edges: Vec<FullEdgeId<I>> = self.full_edge_ids().collect();
        let faces: Vec<FaceId<I>> = self.face_ids().collect();

        vertices.par_iter().all(|&v| self.is_consistent_vertex(v))
            && halfedges.par_iter().all(|&h| self.is_consistent_halfedge(h))
            && full_edges.par_iter().all(|&e| self.is_consistent_full_edge(e))
            && faces.par_iter().all(|&f| self.is_consistent_face(f))
    }

    /// [`is_valid_all`](Self::is_valid_all) spread over rayon.
    pub fn is_valid_all_parallel(&self) -> bool {
        let vertices: Vec<VertexId<I>> = self.vertex_ids().collect();
        let halfedges: Vec<HalfEdgeId<I>> = self.halfedge_ids().collect();
        let full_edges: Vec<FullEdgeId<I>> = self.full_edge_ids().collect();
        let faces: Vec<FaceId<I>> = self.face_ids().collect();

        vertices.par_iter().all(|&v| self.is_valid_vertex(v))
            && halfedges.par_iter().all(|&h| self.is_valid_halfedge(h))
            && full_edges.par_iter().all(|&e| self.is_valid_full_edge(e))
            && faces.par_iter().all(|&f| self.is_valid_face(f))
            && self.num_halfedges() == 2 * self.num_full_edges()
    }

    // ==================== Geometry ====================

    /// Twice the vector area of a face: the sum of corner cross products.
    fn face_area_vector(&self, f: FaceId<I>) -> Result<Vector3<f64>> {
        let corners = self
            .face_vertices(f)
            .map(|v| v.and_then(|v| self.position(v).map(|p| p.coords)))
            .collect::<Result<Vec<_>>>()?;
        if corners.len() < 3 {
            return Err(DcelError::topology(format!("{:?} has fewer than 3 corners", f)));
        }
        let n = corners.len();
        Ok((0..n).map(|i| corners[i].cross(&corners[(i + 1) % n])).sum())
    }

    /// Unit normal of a face, zero for a degenerate face.
    pub fn face_normal(&self, f: FaceId<I>) -> Result<Vector3<f64>> {
        Ok(self
            .face_area_vector(f)?
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros))
    }

    /// Area of a (planar) face.
    pub fn face_area(&self, f: FaceId<I>) -> Result<f64> {
        Ok(0.5 * self.face_area_vector(f)?.norm())
    }

    /// Average of a face's corner positions.
    pub fn face_centroid(&self, f: FaceId<I>) -> Result<Point3<f64>> {
        let mut sum = Vector3::zeros();
        let mut n = 0;
        for v in self.face_vertices(f) {
            sum += self.position(v?)?.coords;
            n += 1;
        }
        if n == 0 {
            return Err(DcelError::topology(format!("{:?} has no corners", f)));
        }
        Ok(Point3::from(sum / n as f64))
    }

    /// Area-weighted unit normal of a vertex, zero when it has no faces.
    pub fn vertex_normal(&self, v: VertexId<I>) -> Result<Vector3<f64>> {
        let mut sum = Vector3::zeros();
        for f in self.vertex_faces(v) {
            sum += self.face_area_vector(f?)?;
        }
        Ok(sum.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros))
    }

    /// Refresh the cached normal of every vertex.
    pub fn update_normals(&mut self) -> Result<()> {
        let normals = self
            .vertex_ids()
            .map(|v| self.vertex_normal(v).map(|n| (v, n)))
            .collect::<Result<Vec<_>>>()?;
        for (v, n) in normals {
            self.vertex_mut(v)?.normal = n;
        }
        Ok(())
    }

    /// Angle in `[0, π]` between the normals of two faces sharing a full-edge.
    ///
    /// # Errors
    /// [`DcelError::InvalidTopology`] if the faces share no full-edge.
    pub fn angle(&self, f0: FaceId<I>, f1: FaceId<I>) -> Result<f64> {
        let edges0 = self.face_full_edges(f0).list()?;
        let edges1 = self.face_full_edges(f1).list()?;
        if f0 == f1 || !edges0.iter().any(|e| edges1.contains(e)) {
            return Err(DcelError::topology(format!("{:?} and {:?} share no full-edge", f0, f1)));
        }
        let n0 = self.face_normal(f0)?;
        let n1 = self.face_normal(f1)?;
        Ok(n0.dot(&n1).clamp(-1.0, 1.0).acos())
    }

    /// Euclidean length of a full-edge.
    pub fn length(&self, e: FullEdgeId<I>) -> Result<f64> {
        let [a, b] = self.full_edge_vertices(e)?;
        Ok((self.position(b)? - self.position(a)?).norm())
    }

    /// Length statistics over all full-edges in one pass.
    pub fn full_edge_length_stats(&self) -> Result<EdgeLengthStats> {
        let lengths = self
            .full_edge_ids()
            .map(|e| self.length(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(EdgeLengthStats::from_lengths(lengths.into_iter()))
    }

    /// Length statistics computed in parallel.
    pub fn full_edge_length_stats_parallel(&self) -> Result<EdgeLengthStats> {
        let ids: Vec<FullEdgeId<I>> = self.full_edge_ids().collect();
        let lengths = ids
            .par_iter()
            .map(|&e| self.length(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(EdgeLengthStats::from_lengths(lengths.into_iter()))
    }

    /// Shortest full-edge length (0 for an edgeless container).
    pub fn min_full_edge_length(&self) -> Result<f64> {
        Ok(self.full_edge_length_stats()?.min)
    }

    /// Longest full-edge length (0 for an edgeless container).
    pub fn max_full_edge_length(&self) -> Result<f64> {
        Ok(self.full_edge_length_stats()?.max)
    }

    /// Mean full-edge length (0 for an edgeless container).
    pub fn mean_full_edge_length(&self) -> Result<f64> {
        Ok(self.full_edge_length_stats()?.mean)
    }

    // ==================== Valence ====================

    /// Number of full-edges incident to a vertex.
    pub fn valence(&self, v: VertexId<I>) -> Result<usize> {
        self.vertex_halfedges(v).size()
    }

    /// Ideal valence of a triangulation vertex: 4 on the boundary, 6 inside.
    pub fn optimal_valence(&self, v: VertexId<I>) -> usize {
        if self.is_border_vertex(v) {
            4
        } else {
            6
        }
    }

    /// Signed deviation of the valence from the optimal valence.
    pub fn d_optimal_valence(&self, v: VertexId<I>) -> Result<isize> {
        Ok(self.valence(v)? as isize - self.optimal_valence(v) as isize)
    }

    /// True when the vertex has exactly its optimal valence.
    ///
    /// The name is historical: it reads as the opposite of the usual meaning
    /// of "extraordinary vertex".
    pub fn is_extraordinary(&self, v: VertexId<I>) -> Result<bool> {
        Ok(self.d_optimal_valence(v)? == 0)
    }

    // ==================== Sizing ====================

    /// Target edge length at a vertex for approximation tolerance `eps`.
    ///
    /// `L = sqrt(6·eps/κ − 3·eps²)` where κ is the largest absolute principal
    /// curvature. Flat vertices get `f64::INFINITY`; the value saturates at
    /// `sqrt(3)/κ` once `eps ≥ 1/κ`.
    ///
    /// # Errors
    /// [`DcelError::InvalidParameter`] if `eps` is not a positive finite number.
    pub fn sizing_value_vertex(&self, v: VertexId<I>, eps: f64) -> Result<f64> {
        if !eps.is_finite() || eps <= 0.0 {
            return Err(DcelError::invalid_param("eps", eps, "must be positive and finite"));
        }
        let kappa = vertex_curvature(self, v)?.max_abs_principal();
        if kappa < FLAT_CURVATURE {
            return Ok(f64::INFINITY);
        }
        if eps >= 1.0 / kappa {
            return Ok(3.0_f64.sqrt() / kappa);
        }
        Ok((6.0 * eps / kappa - 3.0 * eps * eps).sqrt())
    }

    /// Target edge length of a full-edge: the smaller of its endpoints' values.
    pub fn sizing_value_full_edge(&self, e: FullEdgeId<I>, eps: f64) -> Result<f64> {
        let [a, b] = self.full_edge_vertices(e)?;
        Ok(self.sizing_value_vertex(a, eps)?.min(self.sizing_value_vertex(b, eps)?))
    }

    /// Target edge length of a face: the smallest of its corners' values.
    pub fn sizing_value_face(&self, f: FaceId<I>, eps: f64) -> Result<f64> {
        self.face(f)?;
        let mut value = f64::INFINITY;
        for v in self.face_vertices(f) {
            value = value.min(self.sizing_value_vertex(v?, eps)?);
        }
        Ok(value)
    }

    // ==================== One-ring ====================

    /// Number of vertices adjacent to both `v0` and `v1`.
    pub fn one_ring_intersection(&self, v0: VertexId<I>, v1: VertexId<I>) -> Result<usize> {
        let ring0: HashSet<VertexId<I>> = self.vertex_vertices(v0).collect::<Result<_>>()?;
        let mut common = 0;
        for w in self.vertex_vertices(v1) {
            if ring0.contains(&w?) {
                common += 1;
            }
        }
        Ok(common)
    }
}
