//! PLY file loading functions

use crate::error::{DataError, Result};
use crate::ply::PlyVertex;
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

// Face structure for PLY files
#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct PlyFace {
    vertex_indices: Vec<i32>,
}

// PLY file structure
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<HashMap<String, JsonValue>>,
    #[serde(default, rename = "face", skip_serializing_if = "Vec::is_empty")]
    face: Vec<PlyFace>,
}

fn read_ply(path: &Path) -> Result<PlyFile> {
    let reader = BufReader::new(File::open(path)?);
    serde_ply::from_reader(reader).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        DataError::Ply(e.to_string())
    })
}

/// Load vertex positions (and normals when present) from a PLY file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_vertices_from_ply(path: impl AsRef<Path>) -> Result<Vec<PlyVertex>> {
    let ply_data = read_ply(path.as_ref())?;

    fn get_f32(prop: Option<&JsonValue>) -> Option<f32> {
        prop.and_then(|v| match v {
            JsonValue::Number(n) => n.as_f64().map(|f| f as f32),
            _ => None,
        })
    }

    let mut vertices = Vec::with_capacity(ply_data.vertex.len());
    for (i, vertex) in ply_data.vertex.iter().enumerate() {
        let coord = |name: &str| {
            get_f32(vertex.get(name))
                .ok_or_else(|| DataError::Ply(format!("Missing '{}' at vertex {}", name, i)))
        };
        let position = Vec3::new(coord("x")?, coord("y")?, coord("z")?);

        let normal = match (
            get_f32(vertex.get("nx")),
            get_f32(vertex.get("ny")),
            get_f32(vertex.get("nz")),
        ) {
            (Some(x), Some(y), Some(z)) => Some(Vec3::new(x, y, z)),
            _ => None,
        };

        vertices.push(PlyVertex { position, normal });
    }

    debug!(
        "Loaded {} vertices, {} faces",
        vertices.len(),
        ply_data.face.len()
    );
    Ok(vertices)
}

/// Check if a PLY file contains face data.
pub fn ply_has_faces(path: impl AsRef<Path>) -> Result<bool> {
    Ok(!read_ply(path.as_ref())?.face.is_empty())
}
