//! Math types used by the uniform path and the camera

pub use nalgebra::{Matrix4, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Convert a matrix into the column-major array layout shaders expect
pub fn to_column_array(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

/// Right-handed perspective projection with a zero-to-one depth range
///
/// Equivalent to the classic GL perspective with depth remapped for Vulkan
/// clip space. The Y axis is left untouched; callers flip it when needed.
pub fn perspective_zero_to_one(fovy_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let focal = 1.0 / (fovy_radians / 2.0).tan();
    let mut proj = Mat4::zeros();
    proj[(0, 0)] = focal / aspect;
    proj[(1, 1)] = focal;
    proj[(2, 2)] = far / (near - far);
    proj[(3, 2)] = -1.0;
    proj[(2, 3)] = -(far * near) / (far - near);
    proj
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_perspective_maps_near_and_far_to_unit_depth() {
        let proj = perspective_zero_to_one(45f32.to_radians(), 4.0 / 3.0, 0.1, 1000.0);

        let near = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -1000.0, 1.0);

        assert_relative_eq!(near.z / near.w, 0.0, epsilon = EPSILON);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_column_array_is_column_major() {
        let translation = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let columns = to_column_array(&translation);

        assert_relative_eq!(columns[3][0], 1.0);
        assert_relative_eq!(columns[3][1], 2.0);
        assert_relative_eq!(columns[3][2], 3.0);
        assert_relative_eq!(columns[0][3], 0.0);
    }
}
