//! Conversion between a [`Dcel`] and an indexed triangle mesh.
//!
//! [`TriangleMesh`] is the interchange value used by file adapters and
//! renderers: a list of positions plus index triples into it.

use std::collections::HashMap;

use log::debug;
use nalgebra::Point3;

use super::dcel::Dcel;
use super::entity::HalfEdge;
use super::index::{FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};
use super::iter::Circulator;
use crate::error::{DcelError, Result};

/// An indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub positions: Vec<Point3<f64>>,
    /// Triangles as indices into `positions`, counter-clockwise.
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Create a mesh from positions and triangles.
    pub fn new(positions: Vec<Point3<f64>>, triangles: Vec<[usize; 3]>) -> Self {
        Self { positions, triangles }
    }

    /// Number of positions.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Check if the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

impl<I: MeshIndex> Dcel<I> {
    /// Build a DCEL from an indexed triangle mesh.
    ///
    /// # Example
    /// ```
    /// use dcel_kernel::mesh::{Dcel, TriangleMesh};
    /// use nalgebra::Point3;
    ///
    /// let mesh = TriangleMesh::new(
    ///     vec![
    ///         Point3::new(0.0, 0.0, 0.0),
    ///         Point3::new(1.0, 0.0, 0.0),
    ///         Point3::new(0.5, 1.0, 0.0),
    ///     ],
    ///     vec![[0, 1, 2]],
    /// );
    ///
    /// let dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
    /// assert_eq!(dcel.num_vertices(), 3);
    /// assert_eq!(dcel.num_full_edges(), 3);
    /// assert_eq!(dcel.num_faces(), 1);
    /// ```
    pub fn from_triangle_mesh(mesh: &TriangleMesh) -> Result<Self> {
        let polygons: Vec<&[usize]> = mesh.triangles.iter().map(|t| &t[..]).collect();
        Self::build(&mesh.positions, &polygons)
    }

    /// Build a DCEL from arbitrary polygons (each at least 3 vertices, counter-clockwise).
    pub fn from_polygons(positions: &[Point3<f64>], polygons: &[Vec<usize>]) -> Result<Self> {
        let polygons: Vec<&[usize]> = polygons.iter().map(Vec::as_slice).collect();
        Self::build(positions, &polygons)
    }

    fn build(positions: &[Point3<f64>], polygons: &[&[usize]]) -> Result<Self> {
        if polygons.is_empty() {
            return Err(DcelError::EmptyMesh);
        }

        for (fi, poly) in polygons.iter().enumerate() {
            if poly.len() < 3 {
                return Err(DcelError::DegenerateFace { face: fi });
            }
            for (k, &vi) in poly.iter().enumerate() {
                if vi >= positions.len() {
                    return Err(DcelError::InvalidVertexIndex { face: fi, vertex: vi });
                }
                if poly[k + 1..].contains(&vi) {
                    return Err(DcelError::DegenerateFace { face: fi });
                }
            }
        }

        let num_corners: usize = polygons.iter().map(|p| p.len()).sum();
        let mut dcel = Dcel::with_capacity(positions.len(), polygons.len());
        // Boundary half-edges are only known later; add_halfedge catches those
        dcel.check_room(positions.len(), num_corners, 0, polygons.len())?;

        let vertex_ids = positions
            .iter()
            .map(|&p| dcel.add_vertex(p))
            .collect::<Result<Vec<VertexId<I>>>>()?;

        // Directed edge (v0, v1) -> half-edge, plus creation order for determinism
        let mut edge_map: HashMap<(usize, usize), HalfEdgeId<I>> = HashMap::with_capacity(num_corners);
        let mut directed: Vec<(usize, usize, HalfEdgeId<I>)> = Vec::with_capacity(num_corners);

        // First pass: faces and their half-edge cycles
        for poly in polygons {
            let n = poly.len();
            let face_id = dcel.add_face()?;
            let hes = (0..n)
                .map(|_| dcel.add_halfedge())
                .collect::<Result<Vec<HalfEdgeId<I>>>>()?;

            for i in 0..n {
                let a = poly[i];
                let b = poly[(i + 1) % n];
                dcel.write_halfedge(
                    hes[i],
                    HalfEdge {
                        origin: vertex_ids[a],
                        target: vertex_ids[b],
                        next: hes[(i + 1) % n],
                        prev: hes[(i + n - 1) % n],
                        twin: HalfEdgeId::invalid(),
                        face: face_id,
                        full_edge: FullEdgeId::invalid(),
                    },
                )?;
                if edge_map.insert((a, b), hes[i]).is_some() {
                    return Err(DcelError::NonManifoldEdge { v0: a, v1: b });
                }
                directed.push((a, b, hes[i]));
            }
            dcel.face_mut(face_id)?.halfedge = hes[0];
        }

        // Second pass: twins and full-edges, creating boundary half-edges where needed
        for &(a, b, he) in &directed {
            if dcel.twin(he).is_valid() {
                continue;
            }
            let twin = match edge_map.get(&(b, a)) {
                Some(&twin) => twin,
                None => {
                    let boundary = dcel.add_halfedge()?;
                    let rec = dcel.halfedge_mut(boundary)?;
                    rec.origin = vertex_ids[b];
                    rec.target = vertex_ids[a];
                    boundary
                }
            };
            let e = dcel.add_full_edge()?;
            dcel.full_edge_mut(e)?.halfedge = he;
            for (h, t) in [(he, twin), (twin, he)] {
                let rec = dcel.halfedge_mut(h)?;
                rec.twin = t;
                rec.full_edge = e;
            }
        }

        link_boundary_loops(&mut dcel)?;
        assign_vertex_halfedges(&mut dcel)?;

        debug!(
            "built dcel: {} vertices, {} full-edges, {} faces",
            dcel.num_vertices(),
            dcel.num_full_edges(),
            dcel.num_faces()
        );
        Ok(dcel)
    }

    /// Convert back to an indexed triangle mesh.
    ///
    /// Live vertices are renumbered densely in index order; polygonal faces
    /// are fan-triangulated from their first corner.
    pub fn to_triangle_mesh(&self) -> Result<TriangleMesh> {
        let mut remap: HashMap<VertexId<I>, usize> = HashMap::with_capacity(self.num_vertices());
        let mut positions = Vec::with_capacity(self.num_vertices());
        for (v, rec) in self.vertices() {
            remap.insert(v, positions.len());
            positions.push(rec.position);
        }

        let mut triangles = Vec::with_capacity(self.num_faces());
        for f in self.face_ids() {
            let corners = self.face_vertices(f).list()?;
            let corners = corners
                .iter()
                .map(|v| {
                    remap.get(v).copied().ok_or(DcelError::NotFound {
                        kind: VertexId::<I>::KIND,
                        index: v.index(),
                    })
                })
                .collect::<Result<Vec<usize>>>()?;
            push_fan(&mut triangles, &corners, f)?;
        }

        Ok(TriangleMesh { positions, triangles })
    }

    /// Extract the faces around a vertex as a standalone mesh.
    pub fn extract_vertex(&self, v: VertexId<I>) -> Result<TriangleMesh> {
        self.vertex(v)?;
        let faces = self.vertex_faces(v).collect::<Result<Vec<_>>>()?;
        self.extract_faces(&faces)
    }

    /// Extract the (one or two) faces incident to a full-edge.
    pub fn extract_full_edge(&self, e: FullEdgeId<I>) -> Result<TriangleMesh> {
        let he = self.full_edge(e)?.halfedge;
        let faces: Vec<FaceId<I>> = [self.face_of(he), self.face_of(self.twin(he))]
            .into_iter()
            .filter(|f| f.is_valid())
            .collect();
        self.extract_faces(&faces)
    }

    /// Extract a single face.
    pub fn extract_face(&self, f: FaceId<I>) -> Result<TriangleMesh> {
        self.face(f)?;
        self.extract_faces(&[f])
    }

    /// Extract a set of faces, renumbering vertices in first-seen order.
    pub fn extract_faces(&self, faces: &[FaceId<I>]) -> Result<TriangleMesh> {
        let mut remap: HashMap<VertexId<I>, usize> = HashMap::new();
        let mut positions = Vec::new();
        let mut triangles = Vec::with_capacity(faces.len());

        for &f in faces {
            let mut corners = Vec::new();
            for v in self.face_vertices(f) {
                let v = v?;
                let local = match remap.get(&v) {
                    Some(&i) => i,
                    None => {
                        let i = positions.len();
                        positions.push(*self.position(v)?);
                        remap.insert(v, i);
                        i
                    }
                };
                corners.push(local);
            }
            push_fan(&mut triangles, &corners, f)?;
        }

        Ok(TriangleMesh { positions, triangles })
    }
}

fn push_fan<I: MeshIndex>(triangles: &mut Vec<[usize; 3]>, corners: &[usize], f: FaceId<I>) -> Result<()> {
    if corners.len() < 3 {
        return Err(DcelError::topology(format!(
            "{:?} has only {} corners",
            f,
            corners.len()
        )));
    }
    for i in 1..corners.len() - 1 {
        triangles.push([corners[0], corners[i], corners[i + 1]]);
    }
    Ok(())
}

/// Link boundary half-edges into loops.
fn link_boundary_loops<I: MeshIndex>(dcel: &mut Dcel<I>) -> Result<()> {
    let boundary: Vec<HalfEdgeId<I>> = dcel
        .halfedges()
        .filter(|(_, he)| he.is_boundary())
        .map(|(id, _)| id)
        .collect();

    let mut outgoing: HashMap<VertexId<I>, HalfEdgeId<I>> = HashMap::with_capacity(boundary.len());
    for &he in &boundary {
        let origin = dcel.origin(he);
        if outgoing.insert(origin, he).is_some() {
            return Err(DcelError::NonManifold {
                details: format!("vertex {} lies on more than one boundary fan", origin.index()),
            });
        }
    }

    // The next boundary half-edge starts where this one ends
    for &he in &boundary {
        let dest = dcel.target(he);
        let next = *outgoing.get(&dest).ok_or_else(|| {
            DcelError::topology(format!("boundary loop is open at vertex {}", dest.index()))
        })?;
        dcel.halfedge_mut(he)?.next = next;
        dcel.halfedge_mut(next)?.prev = he;
    }
    Ok(())
}

/// Point every vertex at an outgoing half-edge, preferring the boundary one,
/// and reject vertices whose faces form more than one fan.
fn assign_vertex_halfedges<I: MeshIndex>(dcel: &mut Dcel<I>) -> Result<()> {
    let mut outgoing_count: HashMap<VertexId<I>, usize> = HashMap::with_capacity(dcel.num_vertices());
    let mut chosen: HashMap<VertexId<I>, HalfEdgeId<I>> = HashMap::with_capacity(dcel.num_vertices());

    for (id, he) in dcel.halfedges() {
        *outgoing_count.entry(he.origin).or_insert(0) += 1;
        let slot = chosen.entry(he.origin).or_insert(id);
        if he.is_boundary() {
            *slot = id;
        }
    }

    for (v, he) in chosen {
        dcel.vertex_mut(v)?.halfedge = he;
    }

    for v in dcel.vertex_ids() {
        let ring = dcel.vertex_halfedges(v).size()?;
        let expected = outgoing_count.get(&v).copied().unwrap_or(0);
        if ring != expected {
            return Err(DcelError::NonManifold {
                details: format!(
                    "vertex {} has {} outgoing half-edges but a one-ring of {}",
                    v.index(),
                    expected,
                    ring
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn single_triangle() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    fn tetrahedron() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, 0.5, 1.0),
            ],
            vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        )
    }

    /// Triangles keyed by positions, rotated to a canonical start, for
    /// comparing meshes up to reindexing.
    fn triangle_set(mesh: &TriangleMesh) -> HashSet<[[i64; 3]; 3]> {
        let key = |i: usize| {
            let p = mesh.positions[i];
            [
                (p.x * 1e6).round() as i64,
                (p.y * 1e6).round() as i64,
                (p.z * 1e6).round() as i64,
            ]
        };
        mesh.triangles
            .iter()
            .map(|t| {
                let k = [key(t[0]), key(t[1]), key(t[2])];
                let start = (0..3).min_by_key(|&i| k[i]).unwrap();
                [k[start], k[(start + 1) % 3], k[(start + 2) % 3]]
            })
            .collect()
    }

    #[test]
    fn test_single_triangle() {
        let dcel: Dcel = Dcel::from_triangle_mesh(&single_triangle()).unwrap();

        assert_eq!(dcel.num_vertices(), 3);
        assert_eq!(dcel.num_faces(), 1);
        assert_eq!(dcel.num_full_edges(), 3);
        // 3 interior half-edges + 3 boundary half-edges
        assert_eq!(dcel.num_halfedges(), 6);
        assert!(dcel.is_valid_all());
        assert!(dcel.is_consistent_all());
    }

    #[test]
    fn test_closed_tetrahedron() {
        let dcel: Dcel = Dcel::from_triangle_mesh(&tetrahedron()).unwrap();
        assert_eq!(dcel.num_halfedges(), 12);
        assert_eq!(dcel.num_full_edges(), 6);
        assert!(dcel.is_valid_all());
        for v in dcel.vertex_ids() {
            assert!(!dcel.is_border_vertex(v));
        }
    }

    #[test]
    fn test_roundtrip() {
        let mesh = tetrahedron();
        let dcel: Dcel = Dcel::from_triangle_mesh(&mesh).unwrap();
        let out = dcel.to_triangle_mesh().unwrap();

        assert_eq!(out.num_vertices(), mesh.num_vertices());
        assert_eq!(triangle_set(&out), triangle_set(&mesh));
    }

    #[test]
    fn test_roundtrip_after_removal_compacts() {
        let mut dcel: Dcel = Dcel::from_triangle_mesh(&single_triangle()).unwrap();
        let extra = dcel.add_vertex(Point3::new(9.0, 9.0, 9.0)).unwrap();
        let stray = dcel.add_vertex(Point3::new(8.0, 8.0, 8.0)).unwrap();
        dcel.remove(extra).unwrap();

        let out = dcel.to_triangle_mesh().unwrap();
        assert_eq!(out.num_vertices(), 4);
        assert_eq!(out.positions[3], *dcel.position(stray).unwrap());
        assert_eq!(out.triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_quads_are_fan_triangulated() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        let dcel: Dcel = Dcel::from_polygons(&positions, &[vec![0, 1, 2, 3], vec![1, 4, 5, 2]]).unwrap();
        assert_eq!(dcel.num_faces(), 2);
        // 8 interior half-edges + 6 boundary half-edges
        assert_eq!(dcel.num_halfedges(), 14);
        assert_eq!(dcel.num_full_edges(), 7);
        assert!(dcel.is_valid_all());

        let out = dcel.to_triangle_mesh().unwrap();
        assert_eq!(out.num_triangles(), 4);
    }

    #[test]
    fn test_invalid_input() {
        let vertices = vec![Point3::new(0.0, 0.0, 0.0)];
        let result: Result<Dcel> = Dcel::from_triangle_mesh(&TriangleMesh::new(vertices, vec![[0, 1, 2]]));
        assert!(matches!(result, Err(DcelError::InvalidVertexIndex { face: 0, vertex: 1 })));

        let mut mesh = single_triangle();
        mesh.triangles = vec![[0, 0, 2]];
        let result: Result<Dcel> = Dcel::from_triangle_mesh(&mesh);
        assert!(matches!(result, Err(DcelError::DegenerateFace { face: 0 })));

        let result: Result<Dcel> = Dcel::from_triangle_mesh(&TriangleMesh::default());
        assert!(matches!(result, Err(DcelError::EmptyMesh)));
    }

    #[test]
    fn test_inconsistent_orientation_is_rejected() {
        let mesh = TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, -1.0, 0.0),
            ],
            // Both faces traverse 0 -> 1
            vec![[0, 1, 2], [0, 1, 3]],
        );
        let result: Result<Dcel> = Dcel::from_triangle_mesh(&mesh);
        assert!(matches!(result, Err(DcelError::NonManifoldEdge { v0: 0, v1: 1 })));
    }

    fn grid_mesh(n: usize) -> TriangleMesh {
        let mut positions = Vec::with_capacity((n + 1) * (n + 1));
        for j in 0..=n {
            for i in 0..=n {
                positions.push(Point3::new(i as f64, j as f64, 0.0));
            }
        }
        let mut triangles = Vec::with_capacity(2 * n * n);
        for j in 0..n {
            for i in 0..n {
                let v00 = j * (n + 1) + i;
                let v01 = v00 + n + 1;
                triangles.push([v00, v00 + 1, v01 + 1]);
                triangles.push([v00, v01 + 1, v01]);
            }
        }
        TriangleMesh::new(positions, triangles)
    }

    #[test]
    fn test_small_index_type_limits() {
        // 60,000 corners plus 400 boundary half-edges fit under u16
        let dcel = Dcel::<u16>::from_triangle_mesh(&grid_mesh(100)).unwrap();
        assert_eq!(dcel.num_halfedges(), 60_400);
        assert!(dcel.is_valid_all());

        // Too many corners: rejected before anything is allocated
        assert!(matches!(
            Dcel::<u16>::from_triangle_mesh(&grid_mesh(130)),
            Err(DcelError::IndexOverflow { kind: "half-edge", limit: 65534 })
        ));
        assert!(Dcel::<u32>::from_triangle_mesh(&grid_mesh(130)).is_ok());

        // Corners fit, but the boundary half-edges push past the limit
        let k = 11_000;
        let positions = (0..3 * k)
            .map(|i| Point3::new(i as f64, (i % 3) as f64, 0.0))
            .collect();
        let triangles = (0..k).map(|t| [3 * t, 3 * t + 1, 3 * t + 2]).collect();
        assert!(matches!(
            Dcel::<u16>::from_triangle_mesh(&TriangleMesh::new(positions, triangles)),
            Err(DcelError::IndexOverflow { kind: "half-edge", .. })
        ));
    }

    #[test]
    fn test_bowtie_vertex_is_rejected() {
        // Two triangles touching only at vertex 0
        let mesh = TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(-1.0, -1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 3, 4]],
        );
        let result: Result<Dcel> = Dcel::from_triangle_mesh(&mesh);
        assert!(matches!(result, Err(DcelError::NonManifold { .. })));
    }

    #[test]
    fn test_extract() {
        let dcel: Dcel = Dcel::from_triangle_mesh(&tetrahedron()).unwrap();

        let ring = dcel.extract_vertex(VertexId::new(3)).unwrap();
        assert_eq!(ring.num_triangles(), 3);
        assert_eq!(ring.num_vertices(), 4);

        let e = dcel.full_edge_ids().next().unwrap();
        let pair = dcel.extract_full_edge(e).unwrap();
        assert_eq!(pair.num_triangles(), 2);

        let single = dcel.extract_face(FaceId::new(1)).unwrap();
        assert_eq!(single.triangles, vec![[0, 1, 2]]);
        assert_eq!(single.positions[2], Point3::new(0.5, 0.5, 1.0));
    }
}
