//! Full-edge flip.
//!
//! Replaces the diagonal of the quadrilateral formed by two adjacent
//! triangles with the other diagonal:
//!
//! ```text
//!         c                    c
//!        / \                  /|\
//!       /   \                / | \
//!      a-----b     ==>      a  |  b
//!       \   /                \ | /
//!        \ /                  \|/
//!         d                    d
//! ```
//!
//! No entity is created or destroyed; the full-edge keeps its index.

use super::edit::{edge_halfedges, triangle, EditOperator, Rewire};
use crate::error::{DcelError, Result};
use crate::mesh::{Circulator, Dcel, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};

/// Flip a full-edge shared by two triangles.
#[derive(Debug, Clone)]
pub struct FullEdgeFlip<I: MeshIndex = u32> {
    edge: FullEdgeId<I>,
    plan: Option<Plan<I>>,
    output: Option<FullEdgeId<I>>,
}

#[derive(Debug, Clone, Copy)]
struct Plan<I: MeshIndex> {
    upper: [HalfEdgeId<I>; 3],
    lower: [HalfEdgeId<I>; 3],
    c: VertexId<I>,
    d: VertexId<I>,
}

impl<I: MeshIndex> FullEdgeFlip<I> {
    /// Flip `edge`.
    pub fn new(edge: FullEdgeId<I>) -> Self {
        Self {
            edge,
            plan: None,
            output: None,
        }
    }

    /// The edge being flipped.
    pub fn edge(&self) -> FullEdgeId<I> {
        self.edge
    }
}

impl<I: MeshIndex> EditOperator<I> for FullEdgeFlip<I> {
    type Output = FullEdgeId<I>;
    const NAME: &'static str = "flip";

    fn setup(&mut self, dcel: &Dcel<I>) -> Result<()> {
        self.plan = None;
        self.output = None;
        if dcel.is_poisoned() {
            return Err(DcelError::topology("container is poisoned"));
        }
        Ok(())
    }

    fn config_check(&self) -> Result<()> {
        Ok(())
    }

    fn is_processable(&mut self, dcel: &Dcel<I>) -> Result<()> {
        let (h, t) = edge_halfedges(dcel, self.edge)?;
        if dcel.is_border_halfedge(h) {
            return Err(DcelError::not_processable("boundary edges cannot be flipped"));
        }
        let upper = triangle(dcel, h)?;
        let lower = triangle(dcel, t)?;
        let c = dcel.target(upper[1]);
        let d = dcel.target(lower[1]);

        if c == d {
            return Err(DcelError::not_processable("both triangles share their third corner"));
        }
        if dcel.find_halfedge(c, d).is_some() {
            return Err(DcelError::not_processable(format!("{} and {} are already adjacent", c, d)));
        }
        self.plan = Some(Plan { upper, lower, c, d });
        Ok(())
    }

    fn process(&mut self, dcel: &mut Dcel<I>) -> Result<()> {
        let plan = self
            .plan
            .ok_or_else(|| DcelError::not_processable("flip has no plan"))?;
        let [h, hn, hp] = plan.upper;
        let [t, tn, tp] = plan.lower;
        let f0 = dcel.face_of(h);
        let f1 = dcel.face_of(t);

        let mut rw = Rewire::new();
        let r = rw.keep(dcel, h)?;
        r.origin = plan.d;
        r.target = plan.c;
        r.next = hp;
        r.prev = tn;
        let r = rw.keep(dcel, t)?;
        r.origin = plan.c;
        r.target = plan.d;
        r.next = tp;
        r.prev = hn;
        let r = rw.keep(dcel, hp)?;
        r.next = tn;
        r.prev = h;
        let r = rw.keep(dcel, tn)?;
        r.next = h;
        r.prev = hp;
        r.face = f0;
        let r = rw.keep(dcel, tp)?;
        r.next = hn;
        r.prev = t;
        let r = rw.keep(dcel, hn)?;
        r.next = t;
        r.prev = tp;
        r.face = f1;

        rw.apply(dcel, &[], &[self.edge], &[f0, f1])?;
        self.output = Some(self.edge);
        Ok(())
    }

    fn post_process(&mut self, dcel: &Dcel<I>) -> Result<()> {
        let Some(e) = self.output else {
            return Ok(());
        };
        let h = dcel.full_edge_halfedge(e);
        for f in [dcel.face_of(h), dcel.face_of(dcel.twin(h))] {
            if !dcel.is_valid_face(f) || dcel.face_halfedges(f).size()? != 3 {
                return Err(DcelError::topology(format!("{:?} is not a valid triangle", f)));
            }
        }
        if !dcel.is_valid_full_edge(e) {
            return Err(DcelError::topology(format!("{:?} is not valid after the flip", e)));
        }
        Ok(())
    }

    fn output(&self) -> Option<FullEdgeId<I>> {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::curvature::tests::{flat_grid, icosphere};
    use crate::algo::edit::tests::{edge_between, init, quad};
    use crate::algo::pipeline::{ExitStatus, PipelineSettings};
    use crate::mesh::TriangleMesh;
    use nalgebra::Point3;

    /// Six triangles around the interior edge 0-1.
    fn hexagon_strip() -> Dcel {
        Dcel::from_triangle_mesh(&TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(1.0, -1.0, 0.0),
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(3.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2], [1, 0, 3], [0, 2, 4], [0, 4, 3], [1, 5, 2], [1, 3, 5]],
        ))
        .unwrap()
    }

    #[test]
    fn test_flip_quad_diagonal() {
        init();
        let mut dcel = hexagon_strip();
        let e = edge_between(&dcel, 0, 1);
        let mut op = FullEdgeFlip::new(e);
        let report = op.run(&mut dcel, &PipelineSettings::default().with_debug(true));

        assert_eq!(report.status, ExitStatus::Success);
        assert_eq!(op.output(), Some(e));
        let mut ends = dcel.full_edge_vertices(e).unwrap().map(|v| v.index());
        ends.sort();
        assert_eq!(ends, [2, 3]);
        assert!(dcel.find_halfedge(VertexId::new(0), VertexId::new(1)).is_none());
        assert_eq!(dcel.num_full_edges(), 11);
        assert!(dcel.is_valid_all());
        assert!(dcel.is_consistent_all());
    }

    #[test]
    fn test_flip_twice_restores_connectivity() {
        let mut dcel = hexagon_strip();
        let e = edge_between(&dcel, 0, 1);
        let settings = PipelineSettings::default();
        assert!(FullEdgeFlip::new(e).run(&mut dcel, &settings).is_success());
        assert!(FullEdgeFlip::new(e).run(&mut dcel, &settings).is_success());
        let mut ends = dcel.full_edge_vertices(e).unwrap().map(|v| v.index());
        ends.sort();
        assert_eq!(ends, [0, 1]);
        assert!(dcel.is_valid_all());
    }

    #[test]
    fn test_flip_bare_quad() {
        let mut dcel = quad();
        let valences = |dcel: &Dcel| {
            dcel.vertex_ids()
                .map(|v| dcel.valence(v).unwrap())
                .collect::<Vec<_>>()
        };
        // Valence counts incident full-edges, so the diagonal's ends have 3
        assert_eq!(valences(&dcel), vec![3, 2, 3, 2]);

        let e = edge_between(&dcel, 0, 2);
        let report = FullEdgeFlip::new(e).run(&mut dcel, &PipelineSettings::default());
        assert_eq!(report.status, ExitStatus::Success);
        assert!(dcel.find_halfedge(VertexId::new(1), VertexId::new(3)).is_some());
        assert!(dcel.find_halfedge(VertexId::new(0), VertexId::new(2)).is_none());
        assert_eq!(valences(&dcel), vec![2, 3, 2, 3]);
        assert!(dcel.is_valid_all());

        let mut triples: Vec<[usize; 3]> = dcel
            .to_triangle_mesh()
            .unwrap()
            .triangles
            .into_iter()
            .map(|mut t| {
                t.sort();
                t
            })
            .collect();
        triples.sort();
        assert_eq!(triples, vec![[0, 1, 3], [1, 2, 3]]);
    }

    #[test]
    fn test_flip_rejected_when_opposite_corners_adjacent() {
        let mut dcel = icosphere(0);
        let e = dcel.full_edge_ids().next().unwrap();
        assert!(FullEdgeFlip::new(e).run(&mut dcel, &PipelineSettings::default()).is_success());

        let mut tetra: Dcel = Dcel::from_triangle_mesh(&TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        ))
        .unwrap();
        let before = tetra.clone();
        let e = edge_between(&tetra, 0, 1);
        let report = FullEdgeFlip::new(e).run(&mut tetra, &PipelineSettings::default());
        assert_eq!(report.status, ExitStatus::NotProcessable);
        assert_eq!(tetra, before);
    }

    #[test]
    fn test_boundary_edge_is_not_processable() {
        let mut dcel = flat_grid(2);
        let e = dcel
            .full_edge_ids()
            .find(|&e| dcel.is_border_full_edge(e))
            .unwrap();
        let report = FullEdgeFlip::new(e).run(&mut dcel, &PipelineSettings::default());
        assert_eq!(report.status, ExitStatus::NotProcessable);
    }
}
