//! Full-edge split.
//!
//! Inserts a vertex on an interior edge and connects it to the two opposite
//! corners, turning two triangles into four:
//!
//! ```text
//!         c                    c
//!        / \                  /|\
//!       /   \                / | \
//!      a-----b     ==>      a--m--b
//!       \   /                \ | /
//!        \ /                  \|/
//!         d                    d
//! ```
//!
//! The vertex count grows by one, faces by two, full-edges by three.

use log::trace;

use super::edit::{edge_halfedges, triangle, EditOperator, Rewire};
use crate::error::{DcelError, Result};
use crate::mesh::{Circulator, Dcel, FullEdgeId, HalfEdge, HalfEdgeId, MeshIndex, VertexId};

/// Split a full-edge at a point along it.
#[derive(Debug, Clone)]
pub struct FullEdgeSplit<I: MeshIndex = u32> {
    edge: FullEdgeId<I>,
    parameter: f64,
    plan: Option<Plan<I>>,
    output: Option<VertexId<I>>,
}

/// The two triangles around the edge, as found by `is_processable`.
#[derive(Debug, Clone, Copy)]
struct Plan<I: MeshIndex> {
    /// `h: a -> b`, then `b -> c`, `c -> a`.
    upper: [HalfEdgeId<I>; 3],
    /// `t: b -> a`, then `a -> d`, `d -> b`.
    lower: [HalfEdgeId<I>; 3],
    a: VertexId<I>,
    b: VertexId<I>,
    c: VertexId<I>,
    d: VertexId<I>,
}

impl<I: MeshIndex> FullEdgeSplit<I> {
    /// Split `edge` at its midpoint.
    pub fn new(edge: FullEdgeId<I>) -> Self {
        Self {
            edge,
            parameter: 0.5,
            plan: None,
            output: None,
        }
    }

    /// Place the new vertex at `a + t·(b − a)`, where `a → b` is the
    /// primary half-edge. Must lie strictly inside (0, 1).
    pub fn with_parameter(mut self, t: f64) -> Self {
        self.parameter = t;
        self
    }

    /// The edge being split.
    pub fn edge(&self) -> FullEdgeId<I> {
        self.edge
    }
}

impl<I: MeshIndex> EditOperator<I> for FullEdgeSplit<I> {
    type Output = VertexId<I>;
    const NAME: &'static str = "split";

    fn setup(&mut self, dcel: &Dcel<I>) -> Result<()> {
        self.plan = None;
        self.output = None;
        if dcel.is_poisoned() {
            return Err(DcelError::topology("container is poisoned"));
        }
        Ok(())
    }

    fn config_check(&self) -> Result<()> {
        if !(self.parameter > 0.0 && self.parameter < 1.0) {
            return Err(DcelError::invalid_param(
                "parameter",
                self.parameter,
                "must lie strictly between 0 and 1",
            ));
        }
        Ok(())
    }

    fn is_processable(&mut self, dcel: &Dcel<I>) -> Result<()> {
        let (h, t) = edge_halfedges(dcel, self.edge)?;
        if dcel.is_border_halfedge(h) {
            return Err(DcelError::not_processable("boundary edges are not split"));
        }
        let upper = triangle(dcel, h)?;
        let lower = triangle(dcel, t)?;

        let plan = Plan {
            upper,
            lower,
            a: dcel.origin(h),
            b: dcel.target(h),
            c: dcel.target(upper[1]),
            d: dcel.target(lower[1]),
        };
        if plan.c == plan.d {
            return Err(DcelError::not_processable("both triangles share their third corner"));
        }
        dcel.check_room(1, 6, 3, 2)?;
        self.plan = Some(plan);
        Ok(())
    }

    fn process(&mut self, dcel: &mut Dcel<I>) -> Result<()> {
        let plan = self
            .plan
            .ok_or_else(|| DcelError::not_processable("split has no plan"))?;
        let [h, hn, hp] = plan.upper;
        let [t, tn, tp] = plan.lower;
        let (a, b, c, d) = (plan.a, plan.b, plan.c, plan.d);
        let e = self.edge;
        let f0 = dcel.face_of(h);
        let f1 = dcel.face_of(t);

        let pa = *dcel.position(a)?;
        let pb = *dcel.position(b)?;
        let m = dcel.add_vertex(pa + (pb - pa) * self.parameter)?;

        let mut halfedges = [HalfEdgeId::invalid(); 6];
        for he in &mut halfedges {
            *he = dcel.add_halfedge()?;
        }
        let [h2, t2, mc, cm, md, dm] = halfedges;
        let [e2, e3, e4] = [dcel.add_full_edge()?, dcel.add_full_edge()?, dcel.add_full_edge()?];
        let f2 = dcel.add_face()?;
        let f3 = dcel.add_face()?;
        trace!("split {:?}: new vertex {:?}, faces {:?} {:?}", e, m, f2, f3);

        let rec = |origin, target, next, prev, twin, face, full_edge| HalfEdge {
            origin,
            target,
            next,
            prev,
            twin,
            face,
            full_edge,
        };

        let mut rw = Rewire::new();
        rw.set(h, rec(a, m, mc, hp, t, f0, e));
        rw.set(t, rec(m, a, tn, dm, h, f1, e));
        rw.set(h2, rec(m, b, hn, cm, t2, f2, e2));
        rw.set(t2, rec(b, m, md, tp, h2, f3, e2));
        rw.set(mc, rec(m, c, hp, h, cm, f0, e3));
        rw.set(cm, rec(c, m, h2, hn, mc, f2, e3));
        rw.set(md, rec(m, d, tp, t2, dm, f3, e4));
        rw.set(dm, rec(d, m, t, tn, md, f1, e4));

        let r = rw.keep(dcel, hn)?;
        r.next = cm;
        r.prev = h2;
        r.face = f2;
        let r = rw.keep(dcel, hp)?;
        r.next = h;
        r.prev = mc;
        let r = rw.keep(dcel, tn)?;
        r.next = dm;
        r.prev = t;
        let r = rw.keep(dcel, tp)?;
        r.next = t2;
        r.prev = md;
        r.face = f3;

        rw.apply(dcel, &[], &[e, e2, e3, e4], &[f0, f1, f2, f3])?;
        self.output = Some(m);
        Ok(())
    }

    fn post_process(&mut self, dcel: &Dcel<I>) -> Result<()> {
        let Some(m) = self.output else {
            return Ok(());
        };
        if dcel.valence(m)? != 4 || !dcel.is_valid_vertex(m) {
            return Err(DcelError::topology(format!("{:?} is not a valence-4 vertex", m)));
        }
        for f in dcel.vertex_faces(m) {
            let f = f?;
            if !dcel.is_valid_face(f) || dcel.face_halfedges(f).size()? != 3 {
                return Err(DcelError::topology(format!("{:?} is not a valid triangle", f)));
            }
        }
        Ok(())
    }

    fn output(&self) -> Option<VertexId<I>> {
        self.output
    }
}
