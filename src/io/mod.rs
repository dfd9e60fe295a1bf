//! Mesh file I/O.
//!
//! Every format is a [`FileManager`]: an adapter that turns a byte stream
//! into a [`TriangleMesh`] and back. [`load`] and [`save`] pick the adapter
//! from the file extension and convert to and from a [`Dcel`].
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | Wavefront OBJ | `.obj` | ✓ | ✓ | Polygons are fan-triangulated |
//! | STL | `.stl` | ✓ | ✓ | Binary and ASCII in, binary out |
//!
//! # Usage
//!
//! ```no_run
//! use dcel_kernel::io::{load, save};
//! use dcel_kernel::mesh::Dcel;
//!
//! let dcel: Dcel = load("model.obj").unwrap();
//! save(&dcel, "output.stl").unwrap();
//! ```

pub mod obj;
pub mod stl;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;

use crate::error::{DcelError, Result};
use crate::mesh::{Dcel, MeshIndex, TriangleMesh};

pub use obj::ObjFile;
pub use stl::StlFile;

/// A format adapter between a byte stream and an indexed triangle mesh.
pub trait FileManager {
    /// Extension this adapter handles, without the dot.
    fn file_extension(&self) -> &'static str;

    /// Parse a mesh from `reader`.
    fn import_data(&self, reader: &mut dyn BufRead) -> Result<TriangleMesh>;

    /// Write `mesh` to `writer`.
    fn export_data(&self, writer: &mut dyn Write, mesh: &TriangleMesh) -> Result<()>;
}

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ format.
    Obj,
    /// STL (stereolithography) format.
    Stl,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "obj" => Some(Format::Obj),
            "stl" => Some(Format::Stl),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }

    /// The adapter for this format.
    pub fn manager(self) -> Box<dyn FileManager> {
        match self {
            Format::Obj => Box::new(ObjFile),
            Format::Stl => Box::new(StlFile::default()),
        }
    }
}

fn format_of(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| DcelError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Read a file into a [`TriangleMesh`], choosing the format by extension.
pub fn load_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    let manager = format_of(path)?.manager();
    let mut reader = BufReader::new(File::open(path)?);
    let mesh = manager.import_data(&mut reader)?;
    debug!(
        "loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.num_vertices(),
        mesh.num_triangles()
    );
    Ok(mesh)
}

/// Write a [`TriangleMesh`] to a file, choosing the format by extension.
pub fn save_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    let manager = format_of(path)?.manager();
    let mut writer = BufWriter::new(File::create(path)?);
    manager.export_data(&mut writer, mesh)?;
    writer.flush()?;
    Ok(())
}

/// Load a mesh from a file with automatic format detection.
///
/// # Example
///
/// ```no_run
/// use dcel_kernel::io::load;
/// use dcel_kernel::mesh::Dcel;
///
/// let dcel: Dcel = load("model.obj").unwrap();
/// ```
pub fn load<P: AsRef<Path>, I: MeshIndex>(path: P) -> Result<Dcel<I>> {
    Dcel::from_triangle_mesh(&load_mesh(path)?)
}

/// Save a mesh to a file with automatic format detection.
///
/// Live vertices are compacted and polygons fan-triangulated on the way out.
pub fn save<P: AsRef<Path>, I: MeshIndex>(dcel: &Dcel<I>, path: P) -> Result<()> {
    save_mesh(&dcel.to_triangle_mesh()?, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

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

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("dcel_kernel_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path("a/b/model.OBJ"), Some(Format::Obj));
        assert_eq!(Format::from_path("model.stl"), Some(Format::Stl));
        assert_eq!(Format::from_path("model.ply"), None);
        assert_eq!(Format::Obj.manager().file_extension(), "obj");
        assert_eq!(Format::Stl.manager().file_extension(), "stl");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load::<_, u32>("mesh.xyz").unwrap_err();
        assert!(matches!(err, DcelError::UnsupportedFormat { ref extension } if extension == "xyz"));
        let dcel: Dcel = Dcel::from_triangle_mesh(&tetrahedron()).unwrap();
        assert!(matches!(save(&dcel, "mesh"), Err(DcelError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_save_and_load_through_files() {
        let dcel: Dcel = Dcel::from_triangle_mesh(&tetrahedron()).unwrap();
        for ext in ["obj", "stl"] {
            let path = scratch(&format!("tetra.{}", ext));
            save(&dcel, &path).unwrap();
            let back: Dcel = load(&path).unwrap();
            let _ = std::fs::remove_file(&path);

            assert_eq!(back.num_vertices(), 4, "{}", ext);
            assert_eq!(back.num_faces(), 4, "{}", ext);
            assert_eq!(back.num_full_edges(), 6, "{}", ext);
            assert!(back.is_valid_all());
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load::<_, u32>(scratch("does_not_exist.obj")).unwrap_err();
        assert!(matches!(err, DcelError::Io(_)));
    }
}
