//! STL (stereolithography) format support.
//!
//! STL stores every triangle with its own three corners. On import, corners
//! closer than the welding tolerance are merged into one vertex so that the
//! result is connected; triangles that collapse under welding are dropped.
//! Export always writes binary STL.

use std::collections::HashMap;
use std::io::{BufRead, Cursor, Read, Write};

use log::warn;
use nalgebra::Point3;

use super::FileManager;
use crate::error::{DcelError, Result};
use crate::mesh::TriangleMesh;

/// STL adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StlFile {
    /// Corners closer than this are welded into one vertex.
    pub weld_tolerance: f64,
}

impl Default for StlFile {
    fn default() -> Self {
        Self {
            weld_tolerance: 1e-10,
        }
    }
}

impl StlFile {
    /// Set the welding tolerance.
    pub fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }
}

/// Merges points that fall within `tolerance` of an earlier one.
///
/// Points are bucketed on a grid of cell size `tolerance`; a query checks its
/// own cell and the 26 around it.
struct Welder {
    tolerance: f64,
    cells: HashMap<[i64; 3], Vec<usize>>,
    positions: Vec<Point3<f64>>,
}

impl Welder {
    fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            cells: HashMap::new(),
            positions: Vec::new(),
        }
    }

    fn cell(&self, p: &Point3<f64>) -> [i64; 3] {
        [
            (p.x / self.tolerance).floor() as i64,
            (p.y / self.tolerance).floor() as i64,
            (p.z / self.tolerance).floor() as i64,
        ]
    }

    fn insert(&mut self, p: Point3<f64>) -> usize {
        let [cx, cy, cz] = self.cell(&p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.cells.get(&[cx + dx, cy + dy, cz + dz]) else {
                        continue;
                    };
                    if let Some(&i) = bucket
                        .iter()
                        .find(|&&i| (self.positions[i] - p).norm() < self.tolerance)
                    {
                        return i;
                    }
                }
            }
        }
        let index = self.positions.len();
        self.positions.push(p);
        self.cells.entry([cx, cy, cz]).or_default().push(index);
        index
    }
}

impl FileManager for StlFile {
    fn file_extension(&self) -> &'static str {
        "stl"
    }

    fn import_data(&self, reader: &mut dyn BufRead) -> Result<TriangleMesh> {
        if !(self.weld_tolerance.is_finite() && self.weld_tolerance > 0.0) {
            return Err(DcelError::invalid_param(
                "weld_tolerance",
                self.weld_tolerance,
                "must be positive and finite",
            ));
        }

        // stl_io needs to seek to tell binary from ASCII
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let stl = stl_io::read_stl(&mut Cursor::new(bytes))?;

        let mut welder = Welder::new(self.weld_tolerance);
        let mut triangles = Vec::with_capacity(stl.faces.len());
        let mut dropped = 0;
        for tri in &stl.faces {
            let [i0, i1, i2] = tri.vertices.map(|i| {
                let v = &stl.vertices[i];
                welder.insert(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
            });
            if i0 != i1 && i1 != i2 && i0 != i2 {
                triangles.push([i0, i1, i2]);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!("STL input: dropped {} degenerate triangles", dropped);
        }
        if triangles.is_empty() {
            return Err(DcelError::Parse {
                line: 0,
                message: "STL data contains no valid triangles".to_string(),
            });
        }

        Ok(TriangleMesh::new(welder.positions, triangles))
    }

    fn export_data(&self, writer: &mut dyn Write, mesh: &TriangleMesh) -> Result<()> {
        let mut triangles = Vec::with_capacity(mesh.num_triangles());
        for (f, t) in mesh.triangles.iter().enumerate() {
            let corner = |k: usize| {
                mesh.positions
                    .get(t[k])
                    .copied()
                    .ok_or(DcelError::InvalidVertexIndex { face: f, vertex: t[k] })
            };
            let (p0, p1, p2) = (corner(0)?, corner(1)?, corner(2)?);
            let n = (p1 - p0)
                .cross(&(p2 - p0))
                .try_normalize(f64::EPSILON)
                .unwrap_or_else(nalgebra::Vector3::zeros);

            triangles.push(stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [p0, p1, p2].map(|p| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32])),
            });
        }

        let mut out = writer;
        stl_io::write_stl(&mut out, triangles.iter())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Dcel;

    fn quad() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_binary_roundtrip_welds_corners() {
        let mut bytes = Vec::new();
        StlFile::default().export_data(&mut bytes, &quad()).unwrap();
        // 80-byte header, count, 50 bytes per triangle
        assert_eq!(bytes.len(), 84 + 2 * 50);

        let back = StlFile::default()
            .import_data(&mut Cursor::new(bytes))
            .unwrap();
        assert_eq!(back.num_vertices(), 4);
        assert_eq!(back.num_triangles(), 2);

        let dcel: Dcel = Dcel::from_triangle_mesh(&back).unwrap();
        assert_eq!(dcel.num_full_edges(), 5);
    }

    #[test]
    fn test_ascii_import() {
        let text = "\
solid tri
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid tri
";
        let mesh = StlFile::default()
            .import_data(&mut Cursor::new(text.as_bytes()))
            .unwrap();
        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_welder_tolerance() {
        let mut welder = Welder::new(1e-3);
        let a = welder.insert(Point3::new(0.0, 0.0, 0.0));
        let b = welder.insert(Point3::new(0.0004, 0.0, 0.0));
        let c = welder.insert(Point3::new(0.01, 0.0, 0.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(welder.positions.len(), 2);
    }

    #[test]
    fn test_bad_tolerance() {
        let err = StlFile::default()
            .with_weld_tolerance(0.0)
            .import_data(&mut Cursor::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, DcelError::InvalidParameter { name: "weld_tolerance", .. }));
    }
}
