//! Core DCEL data structures.
//!
//! This module provides the doubly-connected edge list and everything that
//! reads it: traversal, queries, conversion and diagnostics.
//!
//! # Overview
//!
//! The primary type is [`Dcel`], an arena of four entity kinds ([`Vertex`],
//! [`HalfEdge`], [`FullEdge`], [`Face`]) that reference each other only
//! through typed indices. Every edge owns two half-edges; the outer one of a
//! boundary edge has no face and is linked into its boundary loop.
//!
//! # Index Types
//!
//! Entities are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`HalfEdgeId`] - Identifies a half-edge
//! - [`FullEdgeId`] - Identifies a full-edge
//! - [`FaceId`] - Identifies a face
//!
//! These are generic over the underlying integer type ([`MeshIndex`]), so you
//! can choose `u16`, `u32`, or `u64` based on mesh size.
//!
//! # Construction
//!
//! ```
//! use dcel_kernel::mesh::{Dcel, TriangleMesh};
//! use nalgebra::Point3;
//!
//! let mesh = TriangleMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2], [0, 2, 3]],
//! );
//!
//! let dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
//! assert_eq!(dcel.num_full_edges(), 5);
//! assert!(dcel.is_valid_all());
//! ```

mod bind;
mod convert;
mod dcel;
mod entity;
mod index;
mod iter;
mod print;
mod query;

pub use convert::TriangleMesh;
pub use dcel::{Dcel, Handle, Store};
pub use entity::{Face, FullEdge, HalfEdge, IndexedObject, Vertex};
pub use index::{FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};
pub use iter::{Circulator, FfeIter, FheIter, FvIter, VheIter, VvIter};
pub use query::EdgeLengthStats;
