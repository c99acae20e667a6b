//! Uniform buffer object definitions for shaders.
//!
//! The struct must match the shader's uniform block exactly. It uses
//! `#[repr(C)]` for predictable memory layout and implements `Pod` and
//! `Zeroable` for safe byte casting.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Degrees of rotation per second about +Z.
pub const ROTATION_DEGREES_PER_SEC: f32 = 90.0;

/// Eye position of the fixed camera.
pub const EYE: Vec3 = Vec3::new(2.0, 2.0, 2.0);

/// Vertical field of view in degrees.
pub const FOV_Y_DEGREES: f32 = 45.0;

/// Near clip plane distance.
pub const Z_NEAR: f32 = 0.1;

/// Far clip plane distance.
pub const Z_FAR: f32 = 10.0;

/// Model, view and projection matrices for the vertex stage.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl UniformBufferObject {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Matrices for `seconds` after startup, rendering into `extent`.
    ///
    /// The projection flips Y: glam's clip space has +Y up, Vulkan's has +Y
    /// down.
    pub fn at_time(seconds: f32, extent: vk::Extent2D) -> Self {
        let model = Mat4::from_rotation_z((seconds * ROTATION_DEGREES_PER_SEC).to_radians());
        let view = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Z);

        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let mut proj = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }

    /// Returns the struct as raw bytes for upload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
