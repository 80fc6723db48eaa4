//! MTL (Material Template Library) file parser
//!
//! Only the Phong terms used by the lighting constants are kept.

use std::collections::HashMap;

use crate::render::LightingConstants;

/// Parsed MTL material data
#[derive(Debug, Clone, PartialEq)]
pub struct MtlData {
    /// Material name
    pub name: String,
    /// Ambient color (Ka)
    pub ambient: [f32; 3],
    /// Diffuse color (Kd)
    pub diffuse: [f32; 3],
    /// Specular color (Ks)
    pub specular: [f32; 3],
    /// Specular exponent (Ns)
    pub specular_exponent: f32,
}

impl Default for MtlData {
    fn default() -> Self {
        Self {
            name: String::new(),
            ambient: [1.0, 1.0, 1.0],
            diffuse: [0.8, 0.8, 0.8],
            specular: [0.5, 0.5, 0.5],
            specular_exponent: 250.0,
        }
    }
}

impl MtlData {
    /// Lighting constants using this material's colors
    pub fn to_lighting(&self) -> LightingConstants {
        LightingConstants::default().with_material(self.ambient, self.diffuse, self.specular, self.specular_exponent)
    }
}

/// Parser for .mtl files
pub struct MtlParser;

impl MtlParser {
    /// Parse MTL file contents into materials keyed by name
    ///
    /// Unknown statements are skipped. Malformed numbers fail the whole parse.
    pub fn parse(contents: &str) -> Result<HashMap<String, MtlData>, String> {
        let mut materials = HashMap::new();
        let mut current: Option<MtlData> = None;

        for (line_number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else { continue };
            let args: Vec<&str> = parts.collect();

            if keyword == "newmtl" {
                if let Some(done) = current.take() {
                    materials.insert(done.name.clone(), done);
                }
                current = Some(MtlData {
                    name: args.join(" "),
                    ..MtlData::default()
                });
                continue;
            }

            let Some(material) = current.as_mut() else {
                log::warn!("MTL line {} before any newmtl: {}", line_number + 1, line);
                continue;
            };

            match keyword {
                "Ka" => material.ambient = parse_color(&args, line_number)?,
                "Kd" => material.diffuse = parse_color(&args, line_number)?,
                "Ks" => material.specular = parse_color(&args, line_number)?,
                "Ns" => material.specular_exponent = parse_float(args.first().copied(), line_number)?,
                _ => {}
            }
        }

        if let Some(done) = current {
            materials.insert(done.name.clone(), done);
        }

        Ok(materials)
    }

    /// Parse MTL contents and return the first material declared
    pub fn parse_first(contents: &str) -> Result<Option<MtlData>, String> {
        let first_name = contents
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("newmtl").map(|name| name.trim().to_string()));

        let mut materials = Self::parse(contents)?;
        Ok(first_name.and_then(|name| materials.remove(&name)))
    }
}

fn parse_float(value: Option<&str>, line_number: usize) -> Result<f32, String> {
    value
        .ok_or_else(|| format!("line {}: missing value", line_number + 1))?
        .parse()
        .map_err(|_| format!("line {}: invalid number", line_number + 1))
}

fn parse_color(args: &[&str], line_number: usize) -> Result<[f32; 3], String> {
    let r = parse_float(args.first().copied(), line_number)?;
    // A single value means a grey level
    let g = args.get(1).map_or(Ok(r), |v| parse_float(Some(v), line_number))?;
    let b = args.get(2).map_or(Ok(r), |v| parse_float(Some(v), line_number))?;
    Ok([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DUCK_MTL: &str = "\
# exported material
newmtl blinn3SG
illum 4
Kd 0.80 0.60 0.40
Ka 0.10 0.10 0.10
Ks 0.50 0.50 0.50
Ns 96.0
map_Kd duck.ppm
";

    #[test]
    fn test_parse_phong_terms() {
        let materials = MtlParser::parse(DUCK_MTL).unwrap();
        let material = &materials["blinn3SG"];

        assert_relative_eq!(material.diffuse[1], 0.6);
        assert_relative_eq!(material.ambient[2], 0.1);
        assert_relative_eq!(material.specular_exponent, 96.0);
    }

    #[test]
    fn test_first_material_feeds_lighting() {
        let contents = format!("{DUCK_MTL}\nnewmtl other\nKd 0 0 1\n");
        let material = MtlParser::parse_first(&contents).unwrap().unwrap();
        let lighting = material.to_lighting();

        assert_eq!(material.name, "blinn3SG");
        assert_relative_eq!(lighting.light_diffuse[0], 0.8);
        assert_relative_eq!(lighting.light_diffuse[3], 1.0);
        assert_relative_eq!(lighting.ambient_intensity, 0.2);
    }

    #[test]
    fn test_single_component_color_is_grey() {
        let materials = MtlParser::parse("newmtl grey\nKa 0.25\n").unwrap();
        assert_eq!(materials["grey"].ambient, [0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        assert!(MtlParser::parse("newmtl bad\nNs shiny\n").is_err());
    }
}
