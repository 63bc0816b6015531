//! ASCII PLY mesh export

use crate::error::Result;
use crate::types::TriangleMesh;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Write `mesh` as an ASCII PLY with `vertex` and `face` elements.
///
/// The file is written to a sibling temporary path and renamed into place so
/// a concurrent reader never observes a half-written mesh.
pub fn write_mesh_ply(mesh: &TriangleMesh, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension("ply.partial");
    {
        let mut out = BufWriter::new(File::create(&tmp_path)?);
        writeln!(out, "ply")?;
        writeln!(out, "format ascii 1.0")?;
        writeln!(out, "element vertex {}", mesh.vertex_count())?;
        writeln!(out, "property float x")?;
        writeln!(out, "property float y")?;
        writeln!(out, "property float z")?;
        writeln!(out, "element face {}", mesh.face_count())?;
        writeln!(out, "property list uchar int vertex_indices")?;
        writeln!(out, "end_header")?;
        for v in &mesh.vertices {
            writeln!(out, "{} {} {}", v.x, v.y, v.z)?;
        }
        for [a, b, c] in &mesh.faces {
            writeln!(out, "3 {} {} {}", a, b, c)?;
        }
        out.flush()?;
    }
    std::fs::rename(&tmp_path, path)?;
    debug!(
        "Wrote {} vertices / {} faces to {}",
        mesh.vertex_count(),
        mesh.face_count(),
        path.display()
    );
    Ok(())
}
