//! The DCEL container.
//!
//! [`Dcel`] owns four index-addressed stores, one per entity kind. It is the
//! only place entities are created and destroyed. Removing an entity retires
//! its index: the slot stays empty and is never handed out again, so a stale
//! handle can never alias a newer entity.

use std::fmt::Debug;

use log::warn;
use nalgebra::Point3;

use super::entity::{Face, FullEdge, HalfEdge, IndexedObject, Vertex};
use super::index::{FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};
use crate::error::{DcelError, Result};

/// Slot storage for one entity kind.
///
/// Retired slots hold `None`; indices are positions in `slots`.
#[derive(Debug, Clone, PartialEq)]
pub struct Store<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> Store<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    /// Append `value`, refusing to hand out an index above `limit`.
    fn push(&mut self, value: T, kind: &'static str, limit: usize) -> Result<usize> {
        let index = self.slots.len();
        if index > limit {
            return Err(DcelError::IndexOverflow { kind, limit });
        }
        self.slots.push(Some(value));
        self.live += 1;
        Ok(index)
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn take(&mut self, index: usize) -> Option<T> {
        let taken = self.slots.get_mut(index).and_then(Option::take);
        if taken.is_some() {
            self.live -= 1;
        }
        taken
    }

    /// Number of live entries.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Number of slots ever allocated, live or retired.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A typed handle into one of the container's stores.
///
/// Implemented for [`VertexId`], [`HalfEdgeId`], [`FullEdgeId`] and [`FaceId`];
/// the set is closed.
pub trait Handle<I: MeshIndex>: Copy + Eq + Debug + sealed::Sealed {
    /// The entity record this handle addresses.
    type Object: IndexedObject<I, Id = Self>;

    /// Entity kind name, for diagnostics.
    const KIND: &'static str;

    /// Raw index.
    fn slot(self) -> usize;

    /// Whether this handle is not the invalid sentinel.
    fn is_set(self) -> bool;

    #[doc(hidden)]
    fn store(dcel: &Dcel<I>) -> &Store<Self::Object>;

    #[doc(hidden)]
    fn store_mut(dcel: &mut Dcel<I>) -> &mut Store<Self::Object>;

    #[doc(hidden)]
    fn bind_in(self, dcel: &mut Dcel<I>) -> Result<()>;

    #[doc(hidden)]
    fn unbind_in(self, dcel: &mut Dcel<I>);
}

macro_rules! impl_handle {
    ($id:ident, $object:ident, $store:ident, $bind:ident, $unbind:ident) => {
        impl<I: MeshIndex> sealed::Sealed for $id<I> {}

        impl<I: MeshIndex> Handle<I> for $id<I> {
            type Object = $object<I>;
            const KIND: &'static str = $id::<I>::KIND;

            #[inline]
            fn slot(self) -> usize {
                self.index()
            }

            #[inline]
            fn is_set(self) -> bool {
                self.is_valid()
            }

            #[inline]
            fn store(dcel: &Dcel<I>) -> &Store<Self::Object> {
                &dcel.$store
            }

            #[inline]
            fn store_mut(dcel: &mut Dcel<I>) -> &mut Store<Self::Object> {
                &mut dcel.$store
            }

            fn bind_in(self, dcel: &mut Dcel<I>) -> Result<()> {
                dcel.$bind(self)
            }

            fn unbind_in(self, dcel: &mut Dcel<I>) {
                dcel.$unbind(self)
            }
        }
    };
}

impl_handle!(VertexId, Vertex, vertices, bind_vertex, unbind_vertex);
impl_handle!(HalfEdgeId, HalfEdge, halfedges, bind_halfedge, unbind_halfedge);
impl_handle!(FullEdgeId, FullEdge, full_edges, bind_full_edge, unbind_full_edge);
impl_handle!(FaceId, Face, faces, bind_face, unbind_face);

/// A doubly-connected edge list.
///
/// All cross references between entities are typed indices into the stores
/// owned here.
#[derive(Debug, Clone, PartialEq)]
pub struct Dcel<I: MeshIndex = u32> {
    pub(crate) vertices: Store<Vertex<I>>,
    pub(crate) halfedges: Store<HalfEdge<I>>,
    pub(crate) full_edges: Store<FullEdge<I>>,
    pub(crate) faces: Store<Face<I>>,
    poisoned: bool,
}

impl<I: MeshIndex> Default for Dcel<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> Dcel<I> {
    /// Create a new empty container.
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create a container with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // Closed triangle mesh: E = 3F/2, HE = 3F; leave headroom for boundary
        let num_halfedges = num_faces * 3 + num_faces / 2;

        Self {
            vertices: Store::with_capacity(num_vertices),
            halfedges: Store::with_capacity(num_halfedges),
            full_edges: Store::with_capacity(num_halfedges / 2),
            faces: Store::with_capacity(num_faces),
            poisoned: false,
        }
    }

    // ==================== Counts ====================

    /// Number of live vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of live half-edges.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Number of live full-edges.
    #[inline]
    pub fn num_full_edges(&self) -> usize {
        self.full_edges.len()
    }

    /// Number of live faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of half-edge indices ever allocated, including retired ones.
    #[inline]
    pub fn halfedge_capacity(&self) -> usize {
        self.halfedges.capacity()
    }

    /// Number of face indices ever allocated, including retired ones.
    #[inline]
    pub fn face_capacity(&self) -> usize {
        self.faces.capacity()
    }

    /// Check if the container holds no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.len() == 0
    }

    // ==================== Allocation ====================

    // Indices above I::MAX would collide with the sentinel or wrap.

    /// Add a new isolated vertex and return its ID.
    ///
    /// # Errors
    /// [`DcelError::IndexOverflow`] once every index of `I` has been handed out.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> Result<VertexId<I>> {
        let index = self
            .vertices
            .push(Vertex::new(position), VertexId::<I>::KIND, I::MAX.to_usize())?;
        Ok(VertexId::new(index))
    }

    /// Add a new unlinked half-edge and return its ID.
    pub fn add_halfedge(&mut self) -> Result<HalfEdgeId<I>> {
        let index = self
            .halfedges
            .push(HalfEdge::new(), HalfEdgeId::<I>::KIND, I::MAX.to_usize())?;
        Ok(HalfEdgeId::new(index))
    }

    /// Add a new full-edge with no primary half-edge and return its ID.
    pub fn add_full_edge(&mut self) -> Result<FullEdgeId<I>> {
        let index = self
            .full_edges
            .push(FullEdge::default(), FullEdgeId::<I>::KIND, I::MAX.to_usize())?;
        Ok(FullEdgeId::new(index))
    }

    /// Add a new face with no boundary half-edge and return its ID.
    pub fn add_face(&mut self) -> Result<FaceId<I>> {
        let index = self
            .faces
            .push(Face::default(), FaceId::<I>::KIND, I::MAX.to_usize())?;
        Ok(FaceId::new(index))
    }

    /// Check that this many more entities of each kind can still be allocated.
    pub fn check_room(
        &self,
        vertices: usize,
        halfedges: usize,
        full_edges: usize,
        faces: usize,
    ) -> Result<()> {
        let limit = I::MAX.to_usize();
        let kinds = [
            (VertexId::<I>::KIND, self.vertices.capacity(), vertices),
            (HalfEdgeId::<I>::KIND, self.halfedges.capacity(), halfedges),
            (FullEdgeId::<I>::KIND, self.full_edges.capacity(), full_edges),
            (FaceId::<I>::KIND, self.faces.capacity(), faces),
        ];
        for (kind, used, wanted) in kinds {
            if wanted > 0 && used.saturating_add(wanted - 1) > limit {
                return Err(DcelError::IndexOverflow { kind, limit });
            }
        }
        Ok(())
    }

    // ==================== Lookup ====================

    /// Look up any entity by handle.
    ///
    /// # Errors
    /// [`DcelError::InvalidIndex`] for the sentinel, [`DcelError::NotFound`]
    /// for an absent or retired index.
    pub fn get<H: Handle<I>>(&self, id: H) -> Result<&H::Object> {
        if !id.is_set() {
            return Err(DcelError::InvalidIndex { kind: H::KIND });
        }
        H::store(self).get(id.slot()).ok_or(DcelError::NotFound {
            kind: H::KIND,
            index: id.slot(),
        })
    }

    /// Look up any entity mutably by handle.
    pub fn get_mut<H: Handle<I>>(&mut self, id: H) -> Result<&mut H::Object> {
        if !id.is_set() {
            return Err(DcelError::InvalidIndex { kind: H::KIND });
        }
        H::store_mut(self)
            .get_mut(id.slot())
            .ok_or(DcelError::NotFound {
                kind: H::KIND,
                index: id.slot(),
            })
    }

    /// Check whether a handle refers to a live entity.
    #[inline]
    pub fn contains<H: Handle<I>>(&self, id: H) -> bool {
        id.is_set() && H::store(self).get(id.slot()).is_some()
    }

    /// Unbind an entity and retire its index.
    ///
    /// Returns the removed record with its own references cleared.
    pub fn remove<H: Handle<I>>(&mut self, id: H) -> Result<H::Object> {
        self.get(id)?;
        id.unbind_in(self);
        H::store_mut(self)
            .take(id.slot())
            .ok_or(DcelError::NotFound {
                kind: H::KIND,
                index: id.slot(),
            })
    }

    /// Get a vertex by ID.
    pub fn vertex(&self, id: VertexId<I>) -> Result<&Vertex<I>> {
        self.get(id)
    }

    /// Get a mutable vertex by ID.
    pub fn vertex_mut(&mut self, id: VertexId<I>) -> Result<&mut Vertex<I>> {
        self.get_mut(id)
    }

    /// Get a half-edge by ID.
    pub fn halfedge(&self, id: HalfEdgeId<I>) -> Result<&HalfEdge<I>> {
        self.get(id)
    }

    /// Get a mutable half-edge by ID.
    pub fn halfedge_mut(&mut self, id: HalfEdgeId<I>) -> Result<&mut HalfEdge<I>> {
        self.get_mut(id)
    }

    /// Get a full-edge by ID.
    pub fn full_edge(&self, id: FullEdgeId<I>) -> Result<&FullEdge<I>> {
        self.get(id)
    }

    /// Get a mutable full-edge by ID.
    pub fn full_edge_mut(&mut self, id: FullEdgeId<I>) -> Result<&mut FullEdge<I>> {
        self.get_mut(id)
    }

    /// Get a face by ID.
    pub fn face(&self, id: FaceId<I>) -> Result<&Face<I>> {
        self.get(id)
    }

    /// Get a mutable face by ID.
    pub fn face_mut(&mut self, id: FaceId<I>) -> Result<&mut Face<I>> {
        self.get_mut(id)
    }

    /// Get the position of a vertex.
    pub fn position(&self, v: VertexId<I>) -> Result<&Point3<f64>> {
        Ok(&self.vertex(v)?.position)
    }

    /// Set the position of a vertex.
    pub fn set_position(&mut self, v: VertexId<I>, pos: Point3<f64>) -> Result<()> {
        self.vertex_mut(v)?.position = pos;
        Ok(())
    }

    // ==================== Navigation ====================
    //
    // These never panic: a dead or invalid argument yields the invalid
    // sentinel, which iterators and checks then report.

    #[inline]
    pub(crate) fn he(&self, he: HalfEdgeId<I>) -> Option<&HalfEdge<I>> {
        if he.is_valid() {
            self.halfedges.get(he.index())
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn he_mut(&mut self, he: HalfEdgeId<I>) -> Option<&mut HalfEdge<I>> {
        if he.is_valid() {
            self.halfedges.get_mut(he.index())
        } else {
            None
        }
    }

    /// The next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.he(he).map_or_else(HalfEdgeId::invalid, |h| h.next)
    }

    /// The previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.he(he).map_or_else(HalfEdgeId::invalid, |h| h.prev)
    }

    /// The twin (opposite) half-edge.
    #[inline]
    pub fn twin(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.he(he).map_or_else(HalfEdgeId::invalid, |h| h.twin)
    }

    /// The start vertex of a half-edge.
    #[inline]
    pub fn origin(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.he(he).map_or_else(VertexId::invalid, |h| h.origin)
    }

    /// The end vertex of a half-edge.
    #[inline]
    pub fn target(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.he(he).map_or_else(VertexId::invalid, |h| h.target)
    }

    /// The face of a half-edge (invalid on the boundary).
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId<I>) -> FaceId<I> {
        self.he(he).map_or_else(FaceId::invalid, |h| h.face)
    }

    /// The full-edge a half-edge belongs to.
    #[inline]
    pub fn full_edge_of(&self, he: HalfEdgeId<I>) -> FullEdgeId<I> {
        self.he(he).map_or_else(FullEdgeId::invalid, |h| h.full_edge)
    }

    /// The outgoing half-edge stored on a vertex.
    #[inline]
    pub fn vertex_halfedge(&self, v: VertexId<I>) -> HalfEdgeId<I> {
        self.get(v).map_or_else(|_| HalfEdgeId::invalid(), |v| v.halfedge)
    }

    /// The primary half-edge of a full-edge.
    #[inline]
    pub fn full_edge_halfedge(&self, e: FullEdgeId<I>) -> HalfEdgeId<I> {
        self.get(e).map_or_else(|_| HalfEdgeId::invalid(), |e| e.halfedge)
    }

    /// The boundary half-edge stored on a face.
    #[inline]
    pub fn face_halfedge(&self, f: FaceId<I>) -> HalfEdgeId<I> {
        self.get(f).map_or_else(|_| HalfEdgeId::invalid(), |f| f.halfedge)
    }

    /// The two endpoints of a full-edge, as (origin, target) of its primary half-edge.
    pub fn full_edge_vertices(&self, e: FullEdgeId<I>) -> Result<[VertexId<I>; 2]> {
        let he = self.halfedge(self.full_edge(e)?.halfedge)?;
        Ok([he.origin, he.target])
    }

    /// Find the half-edge going from `from` to `to`, if the two vertices are adjacent.
    pub fn find_halfedge(&self, from: VertexId<I>, to: VertexId<I>) -> Option<HalfEdgeId<I>> {
        self.vertex_halfedges(from)
            .filter_map(|he| he.ok())
            .find(|&he| self.target(he) == to)
    }

    // ==================== Iteration over stores ====================

    /// Iterate over all live vertex IDs in index order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertices.iter().map(|(i, _)| VertexId::new(i))
    }

    /// Iterate over all live vertices with their IDs.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId<I>, &Vertex<I>)> + '_ {
        self.vertices.iter().map(|(i, v)| (VertexId::new(i), v))
    }

    /// Iterate over all live half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId<I>> + '_ {
        self.halfedges.iter().map(|(i, _)| HalfEdgeId::new(i))
    }

    /// Iterate over all live half-edges with their IDs.
    pub fn halfedges(&self) -> impl Iterator<Item = (HalfEdgeId<I>, &HalfEdge<I>)> + '_ {
        self.halfedges.iter().map(|(i, he)| (HalfEdgeId::new(i), he))
    }

    /// Iterate over all live full-edge IDs.
    pub fn full_edge_ids(&self) -> impl Iterator<Item = FullEdgeId<I>> + '_ {
        self.full_edges.iter().map(|(i, _)| FullEdgeId::new(i))
    }

    /// Iterate over all live full-edges with their IDs.
    pub fn full_edges(&self) -> impl Iterator<Item = (FullEdgeId<I>, &FullEdge<I>)> + '_ {
        self.full_edges.iter().map(|(i, e)| (FullEdgeId::new(i), e))
    }

    /// Iterate over all live face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.faces.iter().map(|(i, _)| FaceId::new(i))
    }

    /// Iterate over all live faces with their IDs.
    pub fn faces(&self) -> impl Iterator<Item = (FaceId<I>, &Face<I>)> + '_ {
        self.faces.iter().map(|(i, f)| (FaceId::new(i), f))
    }

    // ==================== Poisoning ====================

    /// Whether an edit failed half-way through rewiring.
    ///
    /// A poisoned container refuses further edits; rebuild it from the last
    /// known-good [`TriangleMesh`](super::TriangleMesh).
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub(crate) fn poison(&mut self, reason: &str) {
        warn!("dcel poisoned: {}", reason);
        self.poisoned = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_container() {
        let dcel = Dcel::<u32>::new();
        assert_eq!(dcel.num_vertices(), 0);
        assert_eq!(dcel.num_halfedges(), 0);
        assert_eq!(dcel.num_full_edges(), 0);
        assert_eq!(dcel.num_faces(), 0);
        assert!(dcel.is_empty());
        assert!(!dcel.is_poisoned());
    }

    #[test]
    fn test_add_vertex() {
        let mut dcel = Dcel::<u32>::new();
        let v0 = dcel.add_vertex(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let v1 = dcel.add_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();

        assert_eq!(dcel.num_vertices(), 2);
        assert_eq!(v0.index(), 0);
        assert_eq!(v1.index(), 1);
        assert_eq!(dcel.position(v1).unwrap(), &Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_lookup_errors() {
        let mut dcel = Dcel::<u32>::new();
        let v = dcel.add_vertex(Point3::origin()).unwrap();

        assert!(matches!(
            dcel.vertex(VertexId::invalid()),
            Err(DcelError::InvalidIndex { kind: "vertex" })
        ));
        assert!(matches!(
            dcel.vertex(VertexId::new(5)),
            Err(DcelError::NotFound { kind: "vertex", index: 5 })
        ));
        assert!(dcel.vertex(v).is_ok());
    }

    #[test]
    fn test_remove_retires_index() {
        let mut dcel = Dcel::<u32>::new();
        let v0 = dcel.add_vertex(Point3::origin()).unwrap();
        let _v1 = dcel.add_vertex(Point3::new(1.0, 0.0, 0.0)).unwrap();

        dcel.remove(v0).unwrap();
        assert_eq!(dcel.num_vertices(), 1);
        assert!(!dcel.contains(v0));
        assert!(matches!(dcel.remove(v0), Err(DcelError::NotFound { .. })));

        // Indices are never recycled
        let v2 = dcel.add_vertex(Point3::origin()).unwrap();
        assert_eq!(v2.index(), 2);
        assert_eq!(dcel.vertex_ids().collect::<Vec<_>>(), vec![VertexId::new(1), v2]);
    }

    #[test]
    fn test_index_space_exhaustion() {
        let mut dcel = Dcel::<u16>::new();
        let limit = <u16 as MeshIndex>::MAX as usize;
        for _ in 0..=limit {
            dcel.add_face().unwrap();
        }
        assert_eq!(dcel.num_faces(), limit + 1);
        assert!(dcel.face_ids().all(|f| f.is_valid()));

        // The next index would be the sentinel
        assert!(matches!(
            dcel.add_face(),
            Err(DcelError::IndexOverflow { kind: "face", limit: 65534 })
        ));
        assert_eq!(dcel.num_faces(), limit + 1);

        assert!(dcel.check_room(1, 0, 0, 0).is_ok());
        assert!(matches!(
            dcel.check_room(0, 0, 0, 1),
            Err(DcelError::IndexOverflow { kind: "face", .. })
        ));
        assert!(Dcel::<u16>::new().check_room(0, limit + 1, 0, 0).is_ok());
        assert!(Dcel::<u16>::new().check_room(0, limit + 2, 0, 0).is_err());
    }

    #[test]
    fn test_navigation_on_dead_handles() {
        let dcel = Dcel::<u32>::new();
        let he = HalfEdgeId::new(3);
        assert!(!dcel.next(he).is_valid());
        assert!(!dcel.twin(HalfEdgeId::invalid()).is_valid());
        assert!(!dcel.origin(he).is_valid());
        assert!(!dcel.vertex_halfedge(VertexId::new(0)).is_valid());
    }
}
