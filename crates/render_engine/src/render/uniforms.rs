//! Per-frame uniform contents
//!
//! Computes the model/view/projection triple from the accumulated drag state
//! and the fixed camera. Upload happens in the Vulkan backend.

use crate::config::CameraConfig;
use crate::foundation::math::{to_column_array, perspective_zero_to_one, Mat4, Point3, Vec3};
use super::input::InputState;

/// Degrees of model rotation per unit of normalized drag
const ROTATION_STEP_DEGREES: f32 = 10.0;

/// Model placement before any drag is applied
const MODEL_ORIGIN: [f32; 3] = [-10.0, 0.0, -15.0];

/// Transform matrices bound at binding 0
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformUniform {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// World to camera
    pub view: [[f32; 4]; 4],
    /// Camera to clip (Y already flipped)
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for TransformUniform {}
unsafe impl bytemuck::Zeroable for TransformUniform {}

impl TransformUniform {
    /// Build the transforms for one frame
    pub fn compute(input: &InputState, camera: &CameraConfig, extent: (u32, u32)) -> Self {
        Self {
            model: to_column_array(&model_matrix(input)),
            view: to_column_array(&view_matrix(camera)),
            proj: to_column_array(&projection_matrix(camera, extent)),
        }
    }
}

/// Model matrix: translate, then rotate about Y, then about Z
pub fn model_matrix(input: &InputState) -> Mat4 {
    let [tx, ty] = input.translation();
    let [rx, ry] = input.rotation();
    let step = ROTATION_STEP_DEGREES.to_radians();

    let translation = Mat4::new_translation(&Vec3::new(
        MODEL_ORIGIN[0],
        MODEL_ORIGIN[1] + tx * 2.0,
        MODEL_ORIGIN[2] + ty * 2.0,
    ));
    let spin_y = Mat4::from_axis_angle(&Vec3::y_axis(), step * ry);
    let spin_z = Mat4::from_axis_angle(&Vec3::z_axis(), step * rx);

    translation * spin_y * spin_z
}

/// Right-handed look-at view matrix
pub fn view_matrix(camera: &CameraConfig) -> Mat4 {
    Mat4::look_at_rh(
        &Point3::from(camera.eye),
        &Point3::from(camera.target),
        &Vec3::from(camera.up),
    )
}

/// Perspective projection for Vulkan clip space
///
/// Depth maps to [0, 1] and the Y scale is negated because Vulkan's clip-space
/// Y points down.
pub fn projection_matrix(camera: &CameraConfig, extent: (u32, u32)) -> Mat4 {
    let aspect = extent.0.max(1) as f32 / extent.1.max(1) as f32;
    let mut proj = perspective_zero_to_one(camera.fov_degrees.to_radians(), aspect, camera.near, camera.far);
    proj[(1, 1)] *= -1.0;
    proj
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::input::DragKind;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_model_without_input_is_origin_translation() {
        let model = model_matrix(&InputState::default());
        let origin = model * Vec4::new(0.0, 0.0, 0.0, 1.0);

        assert_relative_eq!(origin.x, -10.0, epsilon = EPSILON);
        assert_relative_eq!(origin.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(origin.z, -15.0, epsilon = EPSILON);
    }

    #[test]
    fn test_translate_drag_moves_in_y_and_z() {
        let mut input = InputState::default();
        input.press(DragKind::Translate, [0.0, 0.0]);
        input.release(DragKind::Translate, [0.5, 1.0]);

        let origin = model_matrix(&input) * Vec4::new(0.0, 0.0, 0.0, 1.0);

        assert_relative_eq!(origin.y, 1.0, epsilon = EPSILON);
        assert_relative_eq!(origin.z, -13.0, epsilon = EPSILON);
    }

    #[test]
    fn test_rotate_drag_spins_about_z_by_ten_degrees_per_unit() {
        let mut input = InputState::default();
        input.press(DragKind::Rotate, [0.0, 0.0]);
        input.release(DragKind::Rotate, [9.0, 0.0]);

        let rotated = model_matrix(&input) * Vec4::new(1.0, 0.0, 0.0, 0.0);

        // 90 degrees about Z takes +X to +Y
        assert_relative_eq!(rotated.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(rotated.y, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = CameraConfig::default();
        let proj = projection_matrix(&camera, (800, 600));

        assert!(proj[(1, 1)] < 0.0);
        assert_relative_eq!(proj[(0, 0)] * (800.0 / 600.0), -proj[(1, 1)], epsilon = EPSILON);
    }

    #[test]
    fn test_view_maps_target_onto_negative_z_axis() {
        let camera = CameraConfig::default();
        let target = view_matrix(&camera) * Vec4::new(camera.target[0], camera.target[1], camera.target[2], 1.0);

        assert_relative_eq!(target.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(target.y, 0.0, epsilon = 1e-3);
        assert!(target.z < 0.0);
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<TransformUniform>(), 192);
    }
}
