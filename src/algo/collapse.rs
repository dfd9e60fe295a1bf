//! Full-edge collapse.
//!
//! Merges the two endpoints of an edge into one. The origin `a` of the
//! primary half-edge survives and moves along the edge; the target `b` is
//! removed together with the faces incident to the edge:
//!
//! ```text
//!         c                    c
//!        /|\                   |
//!       / | \                  |
//!      x--a--b     ==>      x--a
//!       \ | /                  |
//!        \|/                   |
//!         d                    d
//! ```
//!
//! Every half-edge that started or ended at `b` is retargeted to `a`. On each
//! side with a face, the two outer edges of the removed triangle are fused
//! into one full-edge. On a boundary side the boundary loop is spliced shut.
//!
//! The link condition and valence floors are checked first, so a rejected
//! collapse never touches the container.

use log::trace;

use super::edit::{edge_halfedges, triangle, EditOperator, Rewire};
use crate::error::{DcelError, Result};
use crate::mesh::{Circulator, Dcel, FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};

/// Collapse a full-edge into its primary origin.
#[derive(Debug, Clone)]
pub struct FullEdgeCollapse<I: MeshIndex = u32> {
    edge: FullEdgeId<I>,
    parameter: f64,
    plan: Option<Plan<I>>,
    output: Option<VertexId<I>>,
}

#[derive(Debug, Clone)]
struct Plan<I: MeshIndex> {
    a: VertexId<I>,
    b: VertexId<I>,
    sides: Vec<Side<I>>,
}

/// What happens on one side of the collapsing edge.
#[derive(Debug, Clone, Copy)]
enum Side<I: MeshIndex> {
    /// The triangle `he, next, prev` is removed. `gone` is whichever of
    /// `next`/`prev` touches `b`; the twins of `gone` and `kept` become twins
    /// of each other under `kept`'s full-edge.
    Face {
        he: HalfEdgeId<I>,
        next: HalfEdgeId<I>,
        prev: HalfEdgeId<I>,
        face: FaceId<I>,
        gone_outer: HalfEdgeId<I>,
        kept_outer: HalfEdgeId<I>,
        gone_edge: FullEdgeId<I>,
        kept_edge: FullEdgeId<I>,
    },
    /// `he` is a boundary half-edge between `prev` and `next`.
    Border {
        he: HalfEdgeId<I>,
        prev: HalfEdgeId<I>,
        next: HalfEdgeId<I>,
    },
}

impl<I: MeshIndex> FullEdgeCollapse<I> {
    /// Collapse `edge` to its midpoint.
    pub fn new(edge: FullEdgeId<I>) -> Self {
        Self {
            edge,
            parameter: 0.5,
            plan: None,
            output: None,
        }
    }

    /// Place the surviving vertex at `a + t·(b − a)`, `t` in [0, 1].
    pub fn with_parameter(mut self, t: f64) -> Self {
        self.parameter = t;
        self
    }

    /// The edge being collapsed.
    pub fn edge(&self) -> FullEdgeId<I> {
        self.edge
    }

    fn face_side(dcel: &Dcel<I>, s: HalfEdgeId<I>, b: VertexId<I>) -> Result<Side<I>> {
        let [he, next, prev] = triangle(dcel, s)?;
        let (gone, kept) = if dcel.origin(next) == b || dcel.target(next) == b {
            (next, prev)
        } else {
            (prev, next)
        };
        let gone_outer = dcel.twin(gone);
        let kept_outer = dcel.twin(kept);
        if !dcel.face_of(gone_outer).is_valid() && !dcel.face_of(kept_outer).is_valid() {
            return Err(DcelError::not_processable("collapse would leave an edge without faces"));
        }

        let opposite = dcel.target(next);
        let floor = if dcel.is_border_vertex(opposite) { 2 } else { 3 };
        if dcel.valence(opposite)? <= floor {
            return Err(DcelError::not_processable(format!(
                "{} would drop below valence {}",
                opposite, floor
            )));
        }

        Ok(Side::Face {
            he,
            next,
            prev,
            face: dcel.face_of(he),
            gone_outer,
            kept_outer,
            gone_edge: dcel.full_edge_of(gone),
            kept_edge: dcel.full_edge_of(kept),
        })
    }
}

impl<I: MeshIndex> EditOperator<I> for FullEdgeCollapse<I> {
    type Output = VertexId<I>;
    const NAME: &'static str = "collapse";

    fn setup(&mut self, dcel: &Dcel<I>) -> Result<()> {
        self.plan = None;
        self.output = None;
        if dcel.is_poisoned() {
            return Err(DcelError::topology("container is poisoned"));
        }
        Ok(())
    }

    fn config_check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.parameter) {
            return Err(DcelError::invalid_param(
                "parameter",
                self.parameter,
                "must lie in [0, 1]",
            ));
        }
        Ok(())
    }

    fn is_processable(&mut self, dcel: &Dcel<I>) -> Result<()> {
        let (h, t) = edge_halfedges(dcel, self.edge)?;
        let a = dcel.origin(h);
        let b = dcel.target(h);

        let mut sides = Vec::with_capacity(2);
        for s in [h, t] {
            if dcel.face_of(s).is_valid() {
                sides.push(Self::face_side(dcel, s, b)?);
            } else {
                sides.push(Side::Border {
                    he: s,
                    prev: dcel.prev(s),
                    next: dcel.next(s),
                });
            }
        }

        let faces = sides.iter().filter(|s| matches!(s, Side::Face { .. })).count();
        if faces == 0 {
            return Err(DcelError::not_processable("edge has no incident face"));
        }
        if faces == 2 && dcel.is_border_vertex(a) && dcel.is_border_vertex(b) {
            return Err(DcelError::not_processable("interior edge joins two boundary vertices"));
        }
        // Link condition: the only shared neighbours are the opposite corners
        let common = dcel.one_ring_intersection(a, b)?;
        if common != faces {
            return Err(DcelError::not_processable(format!(
                "{} and {} share {} neighbours, expected {}",
                a, b, common, faces
            )));
        }

        self.plan = Some(Plan { a, b, sides });
        Ok(())
    }

    fn process(&mut self, dcel: &mut Dcel<I>) -> Result<()> {
        let plan = self
            .plan
            .take()
            .ok_or_else(|| DcelError::not_processable("collapse has no plan"))?;
        let (a, b) = (plan.a, plan.b);
        let pa = *dcel.position(a)?;
        let pb = *dcel.position(b)?;
        let ring = dcel.vertex_halfedges(b).list()?;

        let mut retired = Vec::with_capacity(6);
        let mut dead_edges = vec![self.edge];
        let mut dead_faces = Vec::with_capacity(2);
        let mut fused_edges = Vec::with_capacity(2);
        for side in &plan.sides {
            match *side {
                Side::Face { he, next, prev, face, gone_edge, kept_edge, .. } => {
                    retired.extend([he, next, prev]);
                    dead_edges.push(gone_edge);
                    dead_faces.push(face);
                    fused_edges.push(kept_edge);
                }
                Side::Border { he, .. } => retired.push(he),
            }
        }

        let mut rw = Rewire::new();
        for &out in &ring {
            if !retired.contains(&out) {
                rw.keep(dcel, out)?.origin = a;
            }
            let inc = dcel.twin(out);
            if !retired.contains(&inc) {
                rw.keep(dcel, inc)?.target = a;
            }
        }
        for side in &plan.sides {
            match *side {
                Side::Face { gone_outer, kept_outer, kept_edge, .. } => {
                    let r = rw.keep(dcel, gone_outer)?;
                    r.twin = kept_outer;
                    r.full_edge = kept_edge;
                    rw.keep(dcel, kept_outer)?.twin = gone_outer;
                }
                Side::Border { prev, next, .. } => {
                    rw.keep(dcel, prev)?.next = next;
                    rw.keep(dcel, next)?.prev = prev;
                }
            }
        }

        trace!(
            "collapse {:?}: {:?} into {:?}, retiring {} half-edges",
            self.edge,
            b,
            a,
            retired.len()
        );
        rw.apply(dcel, &retired, &fused_edges, &[])?;

        for he in retired {
            dcel.remove(he)?;
        }
        for e in dead_edges {
            dcel.remove(e)?;
        }
        for f in dead_faces {
            dcel.remove(f)?;
        }
        dcel.remove(b)?;
        dcel.set_position(a, pa + (pb - pa) * self.parameter)?;

        self.output = Some(a);
        Ok(())
    }

    fn post_process(&mut self, dcel: &Dcel<I>) -> Result<()> {
        let Some(a) = self.output else {
            return Ok(());
        };
        if !dcel.is_valid_vertex(a) {
            return Err(DcelError::topology(format!("{:?} is not valid after the collapse", a)));
        }
        for he in dcel.vertex_halfedges(a) {
            let he = he?;
            if !dcel.is_valid_halfedge(he) || !dcel.is_valid_full_edge(dcel.full_edge_of(he)) {
                return Err(DcelError::topology(format!("{:?} is not valid after the collapse", he)));
            }
            let f = dcel.face_of(he);
            if f.is_valid() && (!dcel.is_valid_face(f) || dcel.face_halfedges(f).size()? != 3) {
                return Err(DcelError::topology(format!("{:?} is not a valid triangle", f)));
            }
        }
        Ok(())
    }

    fn output(&self) -> Option<VertexId<I>> {
        self.output
    }
}
