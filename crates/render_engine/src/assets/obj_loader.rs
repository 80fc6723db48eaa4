//! OBJ file loader for the viewer mesh
//!
//! Every face corner becomes its own vertex; polygons are fan-triangulated.

use crate::render::{Mesh, Vertex};
use super::mtl_parser::{MtlData, MtlParser};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// OBJ loading errors
#[derive(Error, Debug)]
pub enum ObjError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A number or index could not be parsed
    #[error("Parse error on line {line}: {message}")]
    ParseError {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
    /// Structurally invalid data
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// The referenced material library is malformed
    #[error("Material library {path}: {message}")]
    Material {
        /// Library path
        path: String,
        /// Parser message
        message: String,
    },
}

/// Mesh plus the first material of its `mtllib`, if any
#[derive(Debug, Clone, PartialEq)]
pub struct ObjModel {
    /// Triangulated mesh
    pub mesh: Mesh,
    /// Material library named by `mtllib`
    pub material_library: Option<PathBuf>,
    /// First material in that library
    pub material: Option<MtlData>,
}

/// Loader for Wavefront OBJ files
pub struct ObjLoader;

impl ObjLoader {
    /// Load an OBJ file and its material library
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<ObjModel, ObjError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut model = Self::parse(reader)?;

        if let Some(library) = model.material_library.take() {
            let resolved = path.parent().map_or_else(|| library.clone(), |dir| dir.join(&library));
            let contents = std::fs::read_to_string(&resolved)?;
            model.material = MtlParser::parse_first(&contents).map_err(|message| ObjError::Material {
                path: resolved.display().to_string(),
                message,
            })?;
            model.material_library = Some(resolved);
        }

        log::info!(
            "Loaded {} with {} vertices, {} indices",
            path.display(),
            model.mesh.vertices.len(),
            model.mesh.indices.len()
        );
        Ok(model)
    }

    /// Parse OBJ text; `mtllib` is recorded but not opened
    pub fn parse<R: BufRead>(reader: R) -> Result<ObjModel, ObjError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut material_library = None;

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            let line_number = number + 1;

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[0] {
                "v" => positions.push(parse_vec3(&parts, line_number)?),
                "vn" => normals.push(parse_vec3(&parts, line_number)?),
                "vt" => {
                    let u = parse_number(parts.get(1), line_number)?;
                    let v = parse_number(parts.get(2), line_number)?;
                    // Image rows run top to bottom
                    tex_coords.push([u, 1.0 - v]);
                }
                "f" => {
                    if parts.len() < 4 {
                        return Err(ObjError::InvalidFormat(format!(
                            "face on line {line_number} has fewer than three corners"
                        )));
                    }

                    let first = vertices.len() as u32;
                    for corner in &parts[1..] {
                        let (position, tex, normal) = parse_corner(corner, line_number)?;
                        let position = resolve(position, positions.len(), line_number)?;
                        let tex_coord = match tex {
                            Some(index) => tex_coords[resolve(index, tex_coords.len(), line_number)?],
                            None => [0.0, 0.0],
                        };
                        let normal = match normal {
                            Some(index) => normals[resolve(index, normals.len(), line_number)?],
                            None => [0.0, 0.0, 1.0],
                        };

                        vertices.push(Vertex {
                            position: positions[position],
                            color: [1.0, 1.0, 1.0],
                            tex_coord,
                            normal,
                        });
                    }

                    let corners = (parts.len() - 1) as u32;
                    for i in 1..corners - 1 {
                        indices.extend_from_slice(&[first, first + i, first + i + 1]);
                    }
                }
                "mtllib" => {
                    if let Some(name) = parts.get(1) {
                        material_library = Some(PathBuf::from(parts[1..].join(" ")));
                        log::debug!("OBJ references material library {}", name);
                    }
                }
                _ => {}
            }
        }

        Ok(ObjModel {
            mesh: Mesh::new(vertices, indices),
            material_library,
            material: None,
        })
    }
}

fn parse_number(value: Option<&&str>, line: usize) -> Result<f32, ObjError> {
    value
        .ok_or_else(|| ObjError::ParseError {
            line,
            message: "missing component".to_string(),
        })?
        .parse()
        .map_err(|_| ObjError::ParseError {
            line,
            message: "invalid number".to_string(),
        })
}

fn parse_vec3(parts: &[&str], line: usize) -> Result<[f32; 3], ObjError> {
    Ok([
        parse_number(parts.get(1), line)?,
        parse_number(parts.get(2), line)?,
        parse_number(parts.get(3), line)?,
    ])
}

/// Split `v`, `v/vt`, `v//vn` or `v/vt/vn` into raw indices
fn parse_corner(corner: &str, line: usize) -> Result<(i64, Option<i64>, Option<i64>), ObjError> {
    let parse = |text: &str| {
        text.parse::<i64>().map_err(|_| ObjError::ParseError {
            line,
            message: format!("invalid index in '{corner}'"),
        })
    };

    let mut fields = corner.split('/');
    let position = parse(fields.next().unwrap_or_default())?;
    let tex = fields.next().filter(|s| !s.is_empty()).map(parse).transpose()?;
    let normal = fields.next().filter(|s| !s.is_empty()).map(parse).transpose()?;
    Ok((position, tex, normal))
}

/// Turn a 1-based (or negative, relative) OBJ index into a 0-based one
fn resolve(index: i64, len: usize, line: usize) -> Result<usize, ObjError> {
    let resolved = if index > 0 { index - 1 } else { len as i64 + index };
    if index == 0 || resolved < 0 || resolved >= len as i64 {
        return Err(ObjError::InvalidFormat(format!(
            "index {index} on line {line} out of range (have {len})"
        )));
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const QUAD: &str = "\
mtllib duck.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0.25
vn 0 0 1
f 1/1/1 2/2/1 3/2/1 4/1/1
";

    #[test]
    fn test_quad_splits_into_two_triangles() {
        let model = ObjLoader::parse(QUAD.as_bytes()).unwrap();

        assert_eq!(model.mesh.vertices.len(), 4);
        assert_eq!(model.mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(model.material_library, Some(PathBuf::from("duck.mtl")));
    }

    #[test]
    fn test_texture_v_is_flipped_and_color_is_white() {
        let model = ObjLoader::parse(QUAD.as_bytes()).unwrap();
        let vertex = model.mesh.vertices[1];

        assert_relative_eq!(vertex.tex_coord[0], 1.0);
        assert_relative_eq!(vertex.tex_coord[1], 0.75);
        assert_eq!(vertex.color, [1.0, 1.0, 1.0]);
        assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_negative_indices_are_relative() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let model = ObjLoader::parse(source.as_bytes()).unwrap();

        assert_eq!(model.mesh.indices, vec![0, 1, 2]);
        assert_eq!(model.mesh.vertices[2].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_position_only_and_double_slash_corners() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 1 0 0\nf 1 2//1 3//1\n";
        let model = ObjLoader::parse(source.as_bytes()).unwrap();

        assert_eq!(model.mesh.vertices[0].tex_coord, [0.0, 0.0]);
        assert_eq!(model.mesh.vertices[1].normal, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_index_fails() {
        let source = "v 0 0 0\nf 1 2 3\n";
        assert!(matches!(
            ObjLoader::parse(source.as_bytes()),
            Err(ObjError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let source = "v 0 0 0\nv 1 x 0\n";
        match ObjLoader::parse(source.as_bytes()) {
            Err(ObjError::ParseError { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_load_resolves_material_next_to_model() {
        let dir = std::env::temp_dir().join(format!("render_engine_obj_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("duck.obj"), QUAD).unwrap();
        std::fs::write(dir.join("duck.mtl"), "newmtl duck\nKd 0.9 0.8 0.1\nNs 12\n").unwrap();

        let model = ObjLoader::load_obj(dir.join("duck.obj")).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let material = model.material.unwrap();
        assert_eq!(material.name, "duck");
        assert_relative_eq!(material.specular_exponent, 12.0);
    }
}
