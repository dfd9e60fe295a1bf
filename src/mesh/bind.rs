//! Reciprocal wiring of entity cross references.
//!
//! An entity's own fields are its outward references. [`Dcel::bind`] writes
//! the matching inward references on its neighbours, [`Dcel::unbind`] clears
//! the entity's fields and exactly those neighbour references that point at
//! it. Binding validates everything before the first write, so a rejected
//! bind leaves the container untouched.

use super::dcel::{Dcel, Handle};
use super::entity::HalfEdge;
use super::index::{FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};
use crate::error::{DcelError, Result};

fn dangling<I: MeshIndex>(from: HalfEdgeId<I>, link: &str, to: impl std::fmt::Debug) -> DcelError {
    DcelError::topology(format!("{:?}.{} points at dead {:?}", from, link, to))
}

impl<I: MeshIndex> Dcel<I> {
    /// Establish the reciprocal references implied by an entity's own fields.
    ///
    /// # Errors
    /// Lookup errors for a dead handle; [`DcelError::InvalidTopology`] when a
    /// neighbour slot already points elsewhere, an endpoint does not match, or
    /// a face cycle does not close. Nothing is written in that case.
    pub fn bind<H: Handle<I>>(&mut self, id: H) -> Result<()> {
        self.get(id)?;
        id.bind_in(self)
    }

    /// Clear an entity's references and the neighbour references pointing at it.
    pub fn unbind<H: Handle<I>>(&mut self, id: H) -> Result<()> {
        self.get(id)?;
        id.unbind_in(self);
        Ok(())
    }

    // ==================== Half-edge ====================

    pub(crate) fn bind_halfedge(&mut self, h: HalfEdgeId<I>) -> Result<()> {
        let rec = *self.halfedge(h)?;

        if rec.origin.is_valid() && !self.contains(rec.origin) {
            return Err(dangling(h, "origin", rec.origin));
        }
        if rec.target.is_valid() && !self.contains(rec.target) {
            return Err(dangling(h, "target", rec.target));
        }
        if rec.face.is_valid() && !self.contains(rec.face) {
            return Err(dangling(h, "face", rec.face));
        }

        if rec.next.is_valid() {
            let n = self.he(rec.next).ok_or_else(|| dangling(h, "next", rec.next))?;
            if n.prev.is_valid() && n.prev != h {
                return Err(DcelError::topology(format!(
                    "{:?}.next {:?} is already preceded by {:?}",
                    h, rec.next, n.prev
                )));
            }
            if rec.target.is_valid() && n.origin.is_valid() && n.origin != rec.target {
                return Err(DcelError::topology(format!(
                    "{:?} ends at {:?} but its next starts at {:?}",
                    h, rec.target, n.origin
                )));
            }
        }

        if rec.prev.is_valid() {
            let p = self.he(rec.prev).ok_or_else(|| dangling(h, "prev", rec.prev))?;
            if p.next.is_valid() && p.next != h {
                return Err(DcelError::topology(format!(
                    "{:?}.prev {:?} is already followed by {:?}",
                    h, rec.prev, p.next
                )));
            }
            if rec.origin.is_valid() && p.target.is_valid() && p.target != rec.origin {
                return Err(DcelError::topology(format!(
                    "{:?} starts at {:?} but its prev ends at {:?}",
                    h, rec.origin, p.target
                )));
            }
        }

        if rec.twin.is_valid() {
            if rec.twin == h {
                return Err(DcelError::topology(format!("{:?} is its own twin", h)));
            }
            let t = self.he(rec.twin).ok_or_else(|| dangling(h, "twin", rec.twin))?;
            if t.twin.is_valid() && t.twin != h {
                return Err(DcelError::topology(format!(
                    "{:?}.twin {:?} is already twinned with {:?}",
                    h, rec.twin, t.twin
                )));
            }
            if (t.origin.is_valid() && rec.target.is_valid() && t.origin != rec.target)
                || (t.target.is_valid() && rec.origin.is_valid() && t.target != rec.origin)
            {
                return Err(DcelError::topology(format!(
                    "{:?} and its twin {:?} do not share endpoints",
                    h, rec.twin
                )));
            }
            if t.full_edge.is_valid() && rec.full_edge.is_valid() && t.full_edge != rec.full_edge {
                return Err(DcelError::topology(format!(
                    "{:?} and its twin {:?} belong to different full-edges",
                    h, rec.twin
                )));
            }
        }

        if rec.full_edge.is_valid() {
            let e = self
                .full_edge(rec.full_edge)
                .map_err(|_| dangling(h, "full_edge", rec.full_edge))?;
            if e.halfedge.is_valid() && e.halfedge != h && e.halfedge != rec.twin {
                return Err(DcelError::topology(format!(
                    "{:?} is owned by {:?} whose primary half-edge is {:?}",
                    h, rec.full_edge, e.halfedge
                )));
            }
        }

        // Validation passed; write the inward references
        if let Some(n) = self.he_mut(rec.next) {
            n.prev = h;
        }
        if let Some(p) = self.he_mut(rec.prev) {
            p.next = h;
        }
        if let Some(t) = self.he_mut(rec.twin) {
            t.twin = h;
        }
        if let Ok(v) = self.vertex_mut(rec.origin) {
            if !v.halfedge.is_valid() {
                v.halfedge = h;
            }
        }
        if let Ok(f) = self.face_mut(rec.face) {
            if !f.halfedge.is_valid() {
                f.halfedge = h;
            }
        }
        if let Ok(e) = self.full_edge_mut(rec.full_edge) {
            if !e.halfedge.is_valid() {
                e.halfedge = h;
            }
        }
        Ok(())
    }

    pub(crate) fn unbind_halfedge(&mut self, h: HalfEdgeId<I>) {
        let Some(rec) = self.he(h).copied() else {
            return;
        };

        if let Some(n) = self.he_mut(rec.next) {
            if n.prev == h {
                n.prev = HalfEdgeId::invalid();
            }
        }
        if let Some(p) = self.he_mut(rec.prev) {
            if p.next == h {
                p.next = HalfEdgeId::invalid();
            }
        }
        if let Some(t) = self.he_mut(rec.twin) {
            if t.twin == h {
                t.twin = HalfEdgeId::invalid();
            }
        }
        if let Ok(v) = self.vertex_mut(rec.origin) {
            if v.halfedge == h {
                v.halfedge = HalfEdgeId::invalid();
            }
        }
        if let Ok(f) = self.face_mut(rec.face) {
            if f.halfedge == h {
                f.halfedge = HalfEdgeId::invalid();
            }
        }
        if let Ok(e) = self.full_edge_mut(rec.full_edge) {
            if e.halfedge == h {
                e.halfedge = HalfEdgeId::invalid();
            }
        }
        if let Some(own) = self.he_mut(h) {
            *own = HalfEdge::new();
        }
    }

    // ==================== Vertex ====================

    pub(crate) fn bind_vertex(&mut self, v: VertexId<I>) -> Result<()> {
        let he = self.vertex(v)?.halfedge;
        if !he.is_valid() {
            return Ok(());
        }
        let rec = self
            .he(he)
            .ok_or_else(|| DcelError::topology(format!("{:?}.halfedge points at dead {:?}", v, he)))?;
        if rec.origin.is_valid() && rec.origin != v {
            return Err(DcelError::topology(format!(
                "{:?}.halfedge {:?} starts at {:?}",
                v, he, rec.origin
            )));
        }
        if let Some(rec) = self.he_mut(he) {
            rec.origin = v;
        }
        Ok(())
    }

    pub(crate) fn unbind_vertex(&mut self, v: VertexId<I>) {
        let outgoing: Vec<HalfEdgeId<I>> = self
            .vertex_halfedges(v)
            .map_while(|he| he.ok())
            .collect();

        for he in outgoing {
            let twin = self.twin(he);
            let prev = self.prev(he);
            if let Some(rec) = self.he_mut(he) {
                if rec.origin == v {
                    rec.origin = VertexId::invalid();
                }
            }
            for incoming in [twin, prev] {
                if let Some(rec) = self.he_mut(incoming) {
                    if rec.target == v {
                        rec.target = VertexId::invalid();
                    }
                }
            }
        }
        if let Ok(rec) = self.vertex_mut(v) {
            rec.halfedge = HalfEdgeId::invalid();
        }
    }

    // ==================== Face ====================

    pub(crate) fn bind_face(&mut self, f: FaceId<I>) -> Result<()> {
        let start = self.face(f)?.halfedge;
        if !start.is_valid() {
            return Ok(());
        }
        let cycle = self.face_halfedges(f).collect::<Result<Vec<_>>>()?;

        for &he in &cycle {
            let owner = self.face_of(he);
            if owner.is_valid() && owner != f {
                return Err(DcelError::topology(format!(
                    "{:?} on the cycle of {:?} already bounds {:?}",
                    he, f, owner
                )));
            }
        }
        for he in cycle {
            if let Some(rec) = self.he_mut(he) {
                rec.face = f;
            }
        }
        Ok(())
    }

    pub(crate) fn unbind_face(&mut self, f: FaceId<I>) {
        let cycle: Vec<HalfEdgeId<I>> = self.face_halfedges(f).map_while(|he| he.ok()).collect();
        for he in cycle {
            if let Some(rec) = self.he_mut(he) {
                if rec.face == f {
                    rec.face = FaceId::invalid();
                }
            }
        }
        if let Ok(rec) = self.face_mut(f) {
            rec.halfedge = HalfEdgeId::invalid();
        }
    }

    // ==================== Full-edge ====================

    pub(crate) fn bind_full_edge(&mut self, e: FullEdgeId<I>) -> Result<()> {
        let h = self.full_edge(e)?.halfedge;
        if !h.is_valid() {
            return Ok(());
        }
        let rec = self
            .he(h)
            .copied()
            .ok_or_else(|| DcelError::topology(format!("{:?}.halfedge points at dead {:?}", e, h)))?;

        for he in [h, rec.twin] {
            if !he.is_valid() {
                continue;
            }
            let owner = self
                .he(he)
                .ok_or_else(|| dangling(h, "twin", he))?
                .full_edge;
            if owner.is_valid() && owner != e {
                return Err(DcelError::topology(format!(
                    "{:?} of {:?} already belongs to {:?}",
                    he, e, owner
                )));
            }
        }
        for he in [h, rec.twin] {
            if let Some(r) = self.he_mut(he) {
                r.full_edge = e;
            }
        }
        Ok(())
    }

    pub(crate) fn unbind_full_edge(&mut self, e: FullEdgeId<I>) {
        let h = self.full_edge_halfedge(e);
        let twin = self.twin(h);
        for he in [h, twin] {
            if let Some(r) = self.he_mut(he) {
                if r.full_edge == e {
                    r.full_edge = FullEdgeId::invalid();
                }
            }
        }
        if let Ok(rec) = self.full_edge_mut(e) {
            rec.halfedge = HalfEdgeId::invalid();
        }
    }

    // ==================== Rewiring helpers ====================

    /// Overwrite a half-edge's own fields without touching its neighbours.
    pub(crate) fn write_halfedge(&mut self, h: HalfEdgeId<I>, rec: HalfEdge<I>) -> Result<()> {
        *self.halfedge_mut(h)? = rec;
        Ok(())
    }

    /// Bind a batch of entities, stopping at the first failure.
    pub(crate) fn bind_region(
        &mut self,
        halfedges: &[HalfEdgeId<I>],
        full_edges: &[FullEdgeId<I>],
        faces: &[FaceId<I>],
    ) -> Result<()> {
        for &he in halfedges {
            self.bind(he)?;
        }
        for &e in full_edges {
            self.bind(e)?;
        }
        for &f in faces {
            self.bind(f)?;
        }
        Ok(())
    }
}
