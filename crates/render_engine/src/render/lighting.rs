//! Lighting constants uploaded to binding 1 every frame

use bitflags::bitflags;

bitflags! {
    /// Lighting terms that can be toggled at runtime
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LightingFeatures: u32 {
        /// Ambient term
        const AMBIENT = 1 << 0;
        /// Diffuse term
        const DIFFUSE = 1 << 1;
        /// Specular term
        const SPECULAR = 1 << 2;
        /// Texture sampling
        const TEXTURE = 1 << 3;
    }
}

impl Default for LightingFeatures {
    fn default() -> Self {
        Self::all()
    }
}

/// Light and material parameters in std140 layout
///
/// The enable flags are floats so the shader can multiply by them directly.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingConstants {
    /// Light position in world space
    pub light_position: [f32; 4],
    /// Ambient color (material Ka)
    pub light_ambient: [f32; 4],
    /// Diffuse color (material Kd)
    pub light_diffuse: [f32; 4],
    /// Specular color (material Ks)
    pub light_specular: [f32; 4],
    /// Ambient scale
    pub ambient_intensity: f32,
    /// Specular scale
    pub specular_intensity: f32,
    /// Diffuse scale
    pub diffuse_intensity: f32,
    /// Specular exponent (material Ns)
    pub specular_exponent: f32,
    /// 1.0 when the ambient term is enabled
    pub ambient_enabled: f32,
    /// 1.0 when the specular term is enabled
    pub specular_enabled: f32,
    /// 1.0 when the diffuse term is enabled
    pub diffuse_enabled: f32,
    /// 1.0 when texture sampling is enabled
    pub texture_enabled: f32,
}

unsafe impl bytemuck::Pod for LightingConstants {}
unsafe impl bytemuck::Zeroable for LightingConstants {}

impl Default for LightingConstants {
    fn default() -> Self {
        Self {
            light_position: [0.0, -200.0, 260.0, 1.0],
            light_ambient: [1.0, 1.0, 1.0, 1.0],
            light_diffuse: [0.8, 0.8, 0.8, 1.0],
            light_specular: [0.5, 0.5, 0.5, 1.0],
            ambient_intensity: 0.2,
            specular_intensity: 5.3,
            diffuse_intensity: 0.7,
            specular_exponent: 250.0,
            ambient_enabled: 1.0,
            specular_enabled: 1.0,
            diffuse_enabled: 1.0,
            texture_enabled: 1.0,
        }
    }
}

impl LightingConstants {
    /// Set the material colors and specular exponent
    pub fn with_material(mut self, ambient: [f32; 3], diffuse: [f32; 3], specular: [f32; 3], exponent: f32) -> Self {
        self.light_ambient = [ambient[0], ambient[1], ambient[2], 1.0];
        self.light_diffuse = [diffuse[0], diffuse[1], diffuse[2], 1.0];
        self.light_specular = [specular[0], specular[1], specular[2], 1.0];
        self.specular_exponent = exponent;
        self
    }

    /// Copy of these constants with the toggle flags taken from `features`
    pub fn with_features(mut self, features: LightingFeatures) -> Self {
        let flag = |feature| if features.contains(feature) { 1.0 } else { 0.0 };
        self.ambient_enabled = flag(LightingFeatures::AMBIENT);
        self.diffuse_enabled = flag(LightingFeatures::DIFFUSE);
        self.specular_enabled = flag(LightingFeatures::SPECULAR);
        self.texture_enabled = flag(LightingFeatures::TEXTURE);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_layout_matches_std140() {
        assert_eq!(std::mem::size_of::<LightingConstants>(), 96);
        assert_eq!(std::mem::align_of::<LightingConstants>(), 16);
    }

    #[test]
    fn test_features_map_to_float_flags() {
        let constants = LightingConstants::default()
            .with_features(LightingFeatures::AMBIENT | LightingFeatures::TEXTURE);

        assert_relative_eq!(constants.ambient_enabled, 1.0);
        assert_relative_eq!(constants.diffuse_enabled, 0.0);
        assert_relative_eq!(constants.specular_enabled, 0.0);
        assert_relative_eq!(constants.texture_enabled, 1.0);
    }

    #[test]
    fn test_material_keeps_light_position() {
        let constants = LightingConstants::default().with_material([0.1; 3], [0.2; 3], [0.3; 3], 96.0);

        assert_relative_eq!(constants.light_position[2], 260.0);
        assert_relative_eq!(constants.light_diffuse[0], 0.2);
        assert_relative_eq!(constants.light_specular[3], 1.0);
        assert_relative_eq!(constants.specular_exponent, 96.0);
    }
}
