//! Topology entity records.
//!
//! The four entity kinds of a DCEL:
//!
//! - [`Vertex`]: a position plus one outgoing half-edge
//! - [`HalfEdge`]: a directed edge with `next`, `prev`, `twin`, face and full-edge links
//! - [`FullEdge`]: the undirected edge formed by a half-edge and its twin
//! - [`Face`]: one half-edge of its boundary cycle
//!
//! Records only hold typed indices into the owning [`Dcel`](super::Dcel);
//! they never own each other.
//!
//! # Boundary Handling
//!
//! Boundary half-edges have an invalid face. Their twins are the interior
//! half-edges, and boundary loops can be traversed using `next` on them.

use std::fmt::Debug;

use nalgebra::{Point3, Vector3};

use super::index::{FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};

/// An entity that is addressed by a stable typed index in the container.
pub trait IndexedObject<I: MeshIndex>: Clone + Debug + PartialEq {
    /// The handle type addressing this entity.
    type Id: Copy + Eq + Debug;
}

/// A vertex in the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex<I: MeshIndex = u32> {
    /// The 3D position of this vertex.
    pub position: Point3<f64>,

    /// Cached vertex normal, refreshed by [`Dcel::update_normals`](super::Dcel::update_normals).
    pub normal: Vector3<f64>,

    /// One outgoing half-edge from this vertex (invalid for an isolated vertex).
    pub halfedge: HalfEdgeId<I>,
}

impl<I: MeshIndex> Vertex<I> {
    /// Create a new isolated vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
            halfedge: HalfEdgeId::invalid(),
        }
    }

    /// Create a new vertex from coordinates.
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Check if this vertex has no incident edges.
    #[inline]
    pub fn is_isolated(&self) -> bool {
        !self.halfedge.is_valid()
    }
}

/// A directed half-edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// The vertex this half-edge starts at.
    pub origin: VertexId<I>,

    /// The vertex this half-edge ends at.
    pub target: VertexId<I>,

    /// The next half-edge around the face (counter-clockwise).
    pub next: HalfEdgeId<I>,

    /// The previous half-edge around the face.
    pub prev: HalfEdgeId<I>,

    /// The oppositely directed half-edge of the same full-edge.
    pub twin: HalfEdgeId<I>,

    /// The face this half-edge bounds. Invalid for boundary half-edges.
    pub face: FaceId<I>,

    /// The full-edge this half-edge belongs to.
    pub full_edge: FullEdgeId<I>,
}

impl<I: MeshIndex> HalfEdge<I> {
    /// Create a new unlinked half-edge.
    pub fn new() -> Self {
        Self {
            origin: VertexId::invalid(),
            target: VertexId::invalid(),
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            twin: HalfEdgeId::invalid(),
            face: FaceId::invalid(),
            full_edge: FullEdgeId::invalid(),
        }
    }

    /// Check if this half-edge has no face.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !self.face.is_valid()
    }
}

impl<I: MeshIndex> Default for HalfEdge<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// An undirected edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullEdge<I: MeshIndex = u32> {
    /// The primary half-edge; the other one is its twin.
    pub halfedge: HalfEdgeId<I>,
}

impl<I: MeshIndex> FullEdge<I> {
    /// Create a full-edge with the given primary half-edge.
    pub fn new(halfedge: HalfEdgeId<I>) -> Self {
        Self { halfedge }
    }
}

impl<I: MeshIndex> Default for FullEdge<I> {
    fn default() -> Self {
        Self::new(HalfEdgeId::invalid())
    }
}

/// A polygonal face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face<I: MeshIndex = u32> {
    /// One half-edge on the boundary of this face.
    pub halfedge: HalfEdgeId<I>,
}

impl<I: MeshIndex> Face<I> {
    /// Create a new face with the given half-edge.
    pub fn new(halfedge: HalfEdgeId<I>) -> Self {
        Self { halfedge }
    }
}

impl<I: MeshIndex> Default for Face<I> {
    fn default() -> Self {
        Self::new(HalfEdgeId::invalid())
    }
}

impl<I: MeshIndex> IndexedObject<I> for Vertex<I> {
    type Id = VertexId<I>;
}

impl<I: MeshIndex> IndexedObject<I> for HalfEdge<I> {
    type Id = HalfEdgeId<I>;
}

impl<I: MeshIndex> IndexedObject<I> for FullEdge<I> {
    type Id = FullEdgeId<I>;
}

impl<I: MeshIndex> IndexedObject<I> for Face<I> {
    type Id = FaceId<I>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_creation() {
        let v = Vertex::<u32>::from_coords(1.0, 2.0, 3.0);
        assert_eq!(v.position, Point3::new(1.0, 2.0, 3.0));
        assert!(v.is_isolated());
        assert_eq!(v.normal, Vector3::zeros());
    }

    #[test]
    fn test_new_halfedge_is_unlinked() {
        let he = HalfEdge::<u32>::new();
        assert!(he.is_boundary());
        assert!(!he.twin.is_valid());
        assert!(!he.full_edge.is_valid());
        assert_eq!(he, HalfEdge::default());
    }
}
