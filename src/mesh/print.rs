//! Human-readable dumps of entities, for logging and debugging.
//!
//! The format is not stable.

use std::fmt::Write;

use super::dcel::Dcel;
use super::index::{FaceId, FullEdgeId, HalfEdgeId, MeshIndex, VertexId};

impl<I: MeshIndex> Dcel<I> {
    /// One-line description of a vertex.
    pub fn describe_vertex(&self, v: VertexId<I>) -> String {
        match self.vertex(v) {
            Ok(rec) => format!(
                "{} pos=({:.6}, {:.6}, {:.6}) he={}",
                v, rec.position.x, rec.position.y, rec.position.z, rec.halfedge
            ),
            Err(err) => format!("{} <{}>", v, err),
        }
    }

    /// One-line description of a half-edge.
    pub fn describe_halfedge(&self, h: HalfEdgeId<I>) -> String {
        match self.halfedge(h) {
            Ok(rec) => format!(
                "{} {}->{} next={} prev={} twin={} face={} edge={}",
                h, rec.origin, rec.target, rec.next, rec.prev, rec.twin, rec.face, rec.full_edge
            ),
            Err(err) => format!("{} <{}>", h, err),
        }
    }

    /// One-line description of a full-edge.
    pub fn describe_full_edge(&self, e: FullEdgeId<I>) -> String {
        match self.full_edge(e) {
            Ok(rec) => {
                let he = rec.halfedge;
                format!(
                    "{} he={} twin={} {}-{}",
                    e,
                    he,
                    self.twin(he),
                    self.origin(he),
                    self.target(he)
                )
            }
            Err(err) => format!("{} <{}>", e, err),
        }
    }

    /// One-line description of a face, listing its corners.
    pub fn describe_face(&self, f: FaceId<I>) -> String {
        match self.face(f) {
            Ok(rec) => {
                let corners: Vec<String> = self
                    .face_vertices(f)
                    .map(|v| match v {
                        Ok(v) => v.to_string(),
                        Err(_) => "?".to_string(),
                    })
                    .collect();
                format!("{} he={} [{}]", f, rec.halfedge, corners.join(" "))
            }
            Err(err) => format!("{} <{}>", f, err),
        }
    }

    /// Dump the whole container.
    ///
    /// With `recursive` set, each face is followed by its half-edges.
    pub fn dump(&self, recursive: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "dcel: {} vertices, {} half-edges, {} full-edges, {} faces{}",
            self.num_vertices(),
            self.num_halfedges(),
            self.num_full_edges(),
            self.num_faces(),
            if self.is_poisoned() { " (poisoned)" } else { "" }
        );
        for v in self.vertex_ids() {
            let _ = writeln!(out, "  {}", self.describe_vertex(v));
        }
        for e in self.full_edge_ids() {
            let _ = writeln!(out, "  {}", self.describe_full_edge(e));
        }
        for f in self.face_ids() {
            let _ = writeln!(out, "  {}", self.describe_face(f));
            if recursive {
                for he in self.face_halfedges(f).map_while(|he| he.ok()) {
                    let _ = writeln!(out, "    {}", self.describe_halfedge(he));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;
    use nalgebra::Point3;

    fn triangle() -> Dcel {
        Dcel::from_triangle_mesh(&TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        ))
        .unwrap()
    }

    #[test]
    fn test_describe() {
        let dcel = triangle();
        assert!(dcel.describe_vertex(VertexId::new(1)).starts_with("V1 pos=(1.000000"));
        assert_eq!(dcel.describe_face(FaceId::new(0)), "F0 he=HE0 [V0 V1 V2]");
        assert!(dcel.describe_halfedge(HalfEdgeId::new(0)).starts_with("HE0 V0->V1"));
        assert!(dcel.describe_vertex(VertexId::new(9)).contains("not found"));
    }

    #[test]
    fn test_dump() {
        let dcel = triangle();
        let flat = dcel.dump(false);
        let deep = dcel.dump(true);
        assert!(flat.starts_with("dcel: 3 vertices, 6 half-edges, 3 full-edges, 1 faces"));
        assert_eq!(flat.lines().count(), 1 + 3 + 3 + 1);
        assert_eq!(deep.lines().count(), flat.lines().count() + 3);
    }
}
