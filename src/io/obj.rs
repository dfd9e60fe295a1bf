//! Wavefront OBJ format support.
//!
//! Only geometry is read: `v` positions and `f` faces. Face corners may be
//! written as `i`, `i/t`, `i/t/n` or `i//n`; negative indices count back from
//! the most recent vertex. Polygons are fan-triangulated. Every other
//! directive is ignored.

use std::io::{BufRead, Write};

use log::warn;
use nalgebra::Point3;

use super::FileManager;
use crate::error::{DcelError, Result};
use crate::mesh::TriangleMesh;

/// OBJ adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjFile;

fn parse_error(line: usize, message: impl Into<String>) -> DcelError {
    DcelError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_coord(token: Option<&str>, line: usize) -> Result<f64> {
    let token = token.ok_or_else(|| parse_error(line, "vertex needs three coordinates"))?;
    token
        .parse::<f64>()
        .map_err(|_| parse_error(line, format!("invalid coordinate '{}'", token)))
}

/// Resolve one face corner to a 0-based vertex index.
fn parse_corner(token: &str, num_vertices: usize, line: usize) -> Result<usize> {
    let index = token.split('/').next().unwrap_or(token);
    let raw: i64 = index
        .parse()
        .map_err(|_| parse_error(line, format!("invalid face index '{}'", token)))?;

    let resolved = if raw > 0 {
        raw - 1
    } else if raw < 0 {
        num_vertices as i64 + raw
    } else {
        return Err(parse_error(line, "face index 0 is not allowed"));
    };
    if resolved < 0 || resolved as usize >= num_vertices {
        return Err(parse_error(
            line,
            format!("face index {} out of range ({} vertices)", raw, num_vertices),
        ));
    }
    Ok(resolved as usize)
}

impl FileManager for ObjFile {
    fn file_extension(&self) -> &'static str {
        "obj"
    }

    fn import_data(&self, reader: &mut dyn BufRead) -> Result<TriangleMesh> {
        let mut mesh = TriangleMesh::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let number = i + 1;
            let mut tokens = line.split_whitespace();

            match tokens.next() {
                Some("v") => {
                    let x = parse_coord(tokens.next(), number)?;
                    let y = parse_coord(tokens.next(), number)?;
                    let z = parse_coord(tokens.next(), number)?;
                    mesh.positions.push(Point3::new(x, y, z));
                }
                Some("f") => {
                    let corners = tokens
                        .map(|t| parse_corner(t, mesh.positions.len(), number))
                        .collect::<Result<Vec<_>>>()?;
                    if corners.len() < 3 {
                        return Err(parse_error(number, "face needs at least three corners"));
                    }
                    for k in 1..corners.len() - 1 {
                        mesh.triangles.push([corners[0], corners[k], corners[k + 1]]);
                    }
                }
                _ => {}
            }
        }

        if mesh.triangles.is_empty() {
            warn!("OBJ input has no faces");
        }
        Ok(mesh)
    }

    fn export_data(&self, writer: &mut dyn Write, mesh: &TriangleMesh) -> Result<()> {
        writeln!(
            writer,
            "# {} vertices, {} triangles",
            mesh.num_vertices(),
            mesh.num_triangles()
        )?;
        for p in &mesh.positions {
            writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
        }
        for t in &mesh.triangles {
            writeln!(writer, "f {} {} {}", t[0] + 1, t[1] + 1, t[2] + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn import(text: &str) -> Result<TriangleMesh> {
        ObjFile.import_data(&mut Cursor::new(text.as_bytes()))
    }

    #[test]
    fn test_import_polygons_and_index_forms() {
        let text = "\
# unit square as one quad plus a triangle
o square
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vn 0 0 1
f 1/1/1 2/1/1 3//1 4
v 2 0.5 0
f -4 -1 -3
";
        let mesh = import(text).unwrap();
        assert_eq!(mesh.num_vertices(), 5);
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 2, 3], [1, 4, 2]]);
    }

    #[test]
    fn test_import_errors_carry_line_numbers() {
        let err = import("v 0 0 0\nv 1 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, DcelError::Parse { line: 3, .. }));

        let err = import("v 0 0\n").unwrap_err();
        assert!(matches!(err, DcelError::Parse { line: 1, .. }));

        let err = import("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 0 2\n").unwrap_err();
        assert!(matches!(err, DcelError::Parse { line: 4, .. }));

        let err = import("v 0 0 0\nv 1 0 0\nf 1 2\n").unwrap_err();
        assert!(matches!(err, DcelError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_export_then_import() {
        let mesh = TriangleMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.5, -2.25, 0.1),
                Point3::new(0.0, 1.0, 1e-7),
            ],
            vec![[0, 1, 2]],
        );
        let mut bytes = Vec::new();
        ObjFile.export_data(&mut bytes, &mesh).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("f 1 2 3"));

        let back = import(&text).unwrap();
        assert_eq!(back, mesh);
    }
}
