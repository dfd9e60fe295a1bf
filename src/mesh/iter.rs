//! One-ring and face-cycle traversals.
//!
//! Five circulators cover every neighbour kind the kernel needs:
//!
//! | Iterator  | Seed   | Yields                                   |
//! |-----------|--------|------------------------------------------|
//! | [`VheIter`] | vertex | outgoing half-edges                      |
//! | [`VvIter`]  | vertex | adjacent vertices                        |
//! | [`FheIter`] | face   | half-edges of the boundary cycle         |
//! | [`FvIter`]  | face   | corner vertices                          |
//! | [`FfeIter`] | face   | full-edges of the boundary cycle         |
//!
//! All of them are lazy, finite and restartable, and yield
//! `Result<Id>`. A dead link, an entity that does not belong to the ring, or
//! a walk that fails to return to its seed within the container's half-edge
//! capacity produces a single [`DcelError::InvalidTopology`] item, after which
//! the iterator is exhausted. Client code can therefore never loop forever on
//! corrupted topology.

use super::dcel::Dcel;
use super::index::{FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};
use crate::error::{DcelError, Result};

/// Shared contract of the circulators.
pub trait Circulator<T>: Iterator<Item = Result<T>> + Clone {
    /// Rewind to the seed.
    fn restart(&mut self);

    /// Length of the cycle (valence or polygon degree), walking it once.
    fn size(&self) -> Result<usize> {
        let mut walk = self.clone();
        walk.restart();
        let mut n = 0;
        for item in walk {
            item?;
            n += 1;
        }
        Ok(n)
    }

    /// Materialise the full sequence from the seed.
    fn list(&self) -> Result<Vec<T>> {
        let mut walk = self.clone();
        walk.restart();
        walk.collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Center<I: MeshIndex> {
    Vertex(VertexId<I>),
    Face(FaceId<I>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Done,
    DeadSeed { kind: &'static str, index: usize },
}

/// The walk every circulator is built on.
#[derive(Debug, Clone)]
struct HalfEdgeWalk<'a, I: MeshIndex> {
    dcel: &'a Dcel<I>,
    center: Center<I>,
    seed: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    steps: usize,
    initial: State,
    state: State,
}

impl<'a, I: MeshIndex> HalfEdgeWalk<'a, I> {
    fn around_vertex(dcel: &'a Dcel<I>, v: VertexId<I>) -> Self {
        let (seed, initial) = match dcel.vertex(v) {
            Ok(rec) if rec.halfedge.is_valid() => (rec.halfedge, State::Running),
            Ok(_) => (HalfEdgeId::invalid(), State::Done),
            Err(_) => (
                HalfEdgeId::invalid(),
                State::DeadSeed { kind: VertexId::<I>::KIND, index: v.index() },
            ),
        };
        Self::start(dcel, Center::Vertex(v), seed, initial)
    }

    fn around_face(dcel: &'a Dcel<I>, f: FaceId<I>) -> Self {
        let (seed, initial) = match dcel.face(f) {
            Ok(rec) if rec.halfedge.is_valid() => (rec.halfedge, State::Running),
            Ok(_) => (HalfEdgeId::invalid(), State::Done),
            Err(_) => (
                HalfEdgeId::invalid(),
                State::DeadSeed { kind: FaceId::<I>::KIND, index: f.index() },
            ),
        };
        Self::start(dcel, Center::Face(f), seed, initial)
    }

    fn start(dcel: &'a Dcel<I>, center: Center<I>, seed: HalfEdgeId<I>, initial: State) -> Self {
        Self {
            dcel,
            center,
            seed,
            current: seed,
            steps: 0,
            initial,
            state: initial,
        }
    }

    fn restart(&mut self) {
        self.current = self.seed;
        self.steps = 0;
        self.state = self.initial;
    }

    fn fail(&mut self, message: String) -> Option<Result<HalfEdgeId<I>>> {
        self.state = State::Done;
        Some(Err(DcelError::InvalidTopology(message)))
    }
}

impl<'a, I: MeshIndex> Iterator for HalfEdgeWalk<'a, I> {
    type Item = Result<HalfEdgeId<I>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Done => return None,
            State::DeadSeed { kind, index } => {
                self.state = State::Done;
                return Some(Err(DcelError::NotFound { kind, index }));
            }
            State::Running => {}
        }

        let he = self.current;
        let Some(rec) = self.dcel.he(he) else {
            return self.fail(format!("walk from {:?} reached dead {:?}", self.seed, he));
        };
        if self.steps > self.dcel.halfedge_capacity() {
            return self.fail(format!("walk from {:?} does not return to its seed", self.seed));
        }

        let following = match self.center {
            Center::Vertex(v) => {
                if rec.origin != v {
                    return self.fail(format!("{:?} in the ring of {:?} starts at {:?}", he, v, rec.origin));
                }
                // he goes v -> w, twin goes w -> v, and the half-edge after
                // the twin is the next outgoing half-edge of v
                self.dcel.next(rec.twin)
            }
            Center::Face(f) => {
                if rec.face.is_valid() && rec.face != f {
                    return self.fail(format!("{:?} in the cycle of {:?} bounds {:?}", he, f, rec.face));
                }
                rec.next
            }
        };

        self.steps += 1;
        if following == self.seed {
            self.state = State::Done;
        } else {
            self.current = following;
        }
        Some(Ok(he))
    }
}

macro_rules! circulator {
    ($(#[$doc:meta])* $name:ident, $item:ident, $ctor:ident, $seed:ident, |$dcel:ident, $he:ident| $map:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name<'a, I: MeshIndex = u32> {
            walk: HalfEdgeWalk<'a, I>,
            seed: $seed<I>,
        }

        impl<'a, I: MeshIndex> $name<'a, I> {
            /// Create the iterator from its seed entity.
            pub fn new(dcel: &'a Dcel<I>, seed: $seed<I>) -> Self {
                Self {
                    walk: HalfEdgeWalk::$ctor(dcel, seed),
                    seed,
                }
            }

            /// The entity this iterator circulates around.
            pub fn seed(&self) -> $seed<I> {
                self.seed
            }
        }

        impl<'a, I: MeshIndex> Iterator for $name<'a, I> {
            type Item = Result<$item<I>>;

            fn next(&mut self) -> Option<Self::Item> {
                let $dcel = self.walk.dcel;
                self.walk.next().map(|item| item.map(|$he| $map))
            }
        }

        impl<'a, I: MeshIndex> Circulator<$item<I>> for $name<'a, I> {
            fn restart(&mut self) {
                self.walk.restart();
            }
        }
    };
}

circulator!(
    /// Outgoing half-edges of a vertex, in rotational order.
    VheIter, HalfEdgeId, around_vertex, VertexId, |_dcel, he| he
);

circulator!(
    /// Vertices adjacent to a vertex (targets of its outgoing half-edges).
    VvIter, VertexId, around_vertex, VertexId, |dcel, he| dcel.target(he)
);

circulator!(
    /// Half-edges of a face's boundary cycle, following `next`.
    FheIter, HalfEdgeId, around_face, FaceId, |_dcel, he| he
);

circulator!(
    /// Corner vertices of a face, in cycle order.
    FvIter, VertexId, around_face, FaceId, |dcel, he| dcel.origin(he)
);

circulator!(
    /// Full-edges bounding a face, in cycle order.
    FfeIter, FullEdgeId, around_face, FaceId, |dcel, he| dcel.full_edge_of(he)
);

impl<I: MeshIndex> Dcel<I> {
    /// Iterate over outgoing half-edges of a vertex.
    pub fn vertex_halfedges(&self, v: VertexId<I>) -> VheIter<'_, I> {
        VheIter::new(self, v)
    }

    /// Iterate over vertices adjacent to a vertex.
    pub fn vertex_vertices(&self, v: VertexId<I>) -> VvIter<'_, I> {
        VvIter::new(self, v)
    }

    /// Iterate over faces around a vertex, skipping the boundary gap.
    pub fn vertex_faces(&self, v: VertexId<I>) -> impl Iterator<Item = Result<FaceId<I>>> + '_ {
        self.vertex_halfedges(v).filter_map(move |he| match he {
            Ok(he) => {
                let f = self.face_of(he);
                f.is_valid().then_some(Ok(f))
            }
            Err(e) => Some(Err(e)),
        })
    }

    /// Iterate over half-edges around a face.
    pub fn face_halfedges(&self, f: FaceId<I>) -> FheIter<'_, I> {
        FheIter::new(self, f)
    }

    /// Iterate over vertices of a face.
    pub fn face_vertices(&self, f: FaceId<I>) -> FvIter<'_, I> {
        FvIter::new(self, f)
    }

    /// Iterate over full-edges of a face.
    pub fn face_full_edges(&self, f: FaceId<I>) -> FfeIter<'_, I> {
        FfeIter::new(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;
    use nalgebra::Point3;

    fn fan() -> Dcel<u32> {
        // Centre vertex 0 surrounded by a closed ring of 4 triangles
        let mesh = TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(0.0, -1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3], [0, 3, 4], [0, 4, 1]],
        );
        Dcel::from_triangle_mesh(&mesh).unwrap()
    }

    #[test]
    fn test_vertex_ring() {
        let dcel = fan();
        let v = VertexId::new(0);

        let ring = dcel.vertex_vertices(v).list().unwrap();
        assert_eq!(ring.len(), 4);
        let mut sorted: Vec<usize> = ring.iter().map(|v| v.index()).collect();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4]);

        assert_eq!(dcel.vertex_halfedges(v).size().unwrap(), 4);
        assert_eq!(dcel.vertex_faces(v).count(), 4);
    }

    #[test]
    fn test_ring_order_is_rotational() {
        let dcel = fan();
        let ring = dcel.vertex_vertices(VertexId::new(0)).list().unwrap();
        // Consecutive neighbours share a triangle with the centre
        for i in 0..ring.len() {
            let a = ring[i];
            let b = ring[(i + 1) % ring.len()];
            assert!(dcel.find_halfedge(a, b).is_some() || dcel.find_halfedge(b, a).is_some());
        }
    }

    #[test]
    fn test_restart_replays_sequence() {
        let dcel = fan();
        let mut it = dcel.face_vertices(FaceId::new(2));
        let first: Vec<_> = it.by_ref().collect::<Result<_>>().unwrap();
        assert!(it.next().is_none());

        it.restart();
        let second: Vec<_> = it.collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_face_full_edges() {
        let dcel = fan();
        let edges = dcel.face_full_edges(FaceId::new(0)).list().unwrap();
        assert_eq!(edges.len(), 3);
        assert!(edges.iter().all(|e| dcel.contains(*e)));
    }

    #[test]
    fn test_dead_seed() {
        let dcel = fan();
        let mut it = dcel.face_halfedges(FaceId::new(99));
        assert!(matches!(it.next(), Some(Err(DcelError::NotFound { .. }))));
        assert!(it.next().is_none());
    }

    #[test]
    fn test_isolated_vertex_is_empty() {
        let mut dcel = fan();
        let v = dcel.add_vertex(Point3::new(5.0, 5.0, 5.0)).unwrap();
        assert_eq!(dcel.vertex_halfedges(v).size().unwrap(), 0);
    }

    #[test]
    fn test_corrupted_cycle_is_reported() {
        let mut dcel = fan();
        let f = FaceId::new(0);
        let he = dcel.face_halfedge(f);
        let third = dcel.prev(he);
        // Short-circuit the cycle so it never returns to the seed
        dcel.halfedge_mut(third).unwrap().next = third;

        let result: Result<Vec<_>> = dcel.face_halfedges(f).collect();
        assert!(matches!(result, Err(DcelError::InvalidTopology(_))));
        assert!(dcel.face_vertices(f).size().is_err());
    }

    #[test]
    fn test_dangling_link_is_reported() {
        let mut dcel = fan();
        let v = VertexId::new(0);
        let he = dcel.vertex_halfedge(v);
        let twin = dcel.twin(he);
        dcel.halfedge_mut(twin).unwrap().next = HalfEdgeId::new(1000);

        let result = dcel.vertex_vertices(v).list();
        assert!(matches!(result, Err(DcelError::InvalidTopology(_))));
    }
}
