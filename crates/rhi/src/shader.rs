//! Shader module management.
//!
//! This module handles SPIR-V loading and VkShaderModule creation.
//!
//! # Overview
//!
//! - [`ShaderStage`] defines the pipeline stage an entry point runs in
//! - [`ShaderModule`] wraps one VkShaderModule, which may hold several entry
//!   points (Slang emits the vertex and fragment stages into a single file)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use triangle_rhi::device::Device;
//! use triangle_rhi::shader::{ShaderModule, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), triangle_rhi::RhiError> {
//! let module = ShaderModule::from_spirv_file(
//!     device,
//!     Path::new("assets/shaders/hello_triangle/slang.spv"),
//! )?;
//!
//! let vert = module.entry(ShaderStage::Vertex, "vertMain")?;
//! let frag = module.entry(ShaderStage::Fragment, "fragMain")?;
//! let _stages = [vert.stage_create_info(), frag.stage_create_info()];
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage - processes each vertex
    Vertex,
    /// Fragment (pixel) shader stage - processes each fragment
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Decodes little-endian SPIR-V bytes into code words.
///
/// # Errors
///
/// Returns [`RhiError::ShaderError`] if the length is not a non-zero
/// multiple of 4 or the magic number is missing.
pub fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if bytes.is_empty() || !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be a non-empty multiple of 4 bytes, got {} bytes",
            bytes.len()
        )));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if code[0] != SPIRV_MAGIC {
        return Err(RhiError::ShaderError(format!(
            "Not a SPIR-V module (magic {:#010x})",
            code[0]
        )));
    }

    Ok(code)
}

/// Vulkan shader module wrapper.
///
/// Immutable after creation. Entry points borrow the module, so it must
/// outlive any pipeline creation that uses them.
pub struct ShaderModule {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Creates a shader module from a SPIR-V file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The SPIR-V data is malformed
    /// - Shader module creation fails
    pub fn from_spirv_file(device: Arc<Device>, path: &Path) -> RhiResult<Self> {
        debug!("Loading shader module from {:?}", path);

        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read shader file {:?}: {}", path, e))
        })?;

        Self::from_spirv_bytes(device, &bytes)
    }

    /// Creates a shader module from SPIR-V bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not SPIR-V or module creation fails.
    pub fn from_spirv_bytes(device: Arc<Device>, bytes: &[u8]) -> RhiResult<Self> {
        let code = spirv_words(bytes)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        info!("Created shader module ({} bytes)", bytes.len());

        Ok(Self { device, module })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Names one entry point of this module for `stage`.
    ///
    /// The name is not checked against the module; a wrong one surfaces as a
    /// pipeline creation error.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ShaderError`] if `name` contains a NUL byte.
    pub fn entry(&self, stage: ShaderStage, name: &str) -> RhiResult<ShaderEntry<'_>> {
        let name = CString::new(name)
            .map_err(|e| RhiError::ShaderError(format!("Invalid entry point name: {}", e)))?;
        Ok(ShaderEntry {
            module: self,
            stage,
            name,
        })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed shader module");
    }
}

/// One entry point of a [`ShaderModule`].
pub struct ShaderEntry<'a> {
    module: &'a ShaderModule,
    stage: ShaderStage,
    name: CString,
}

impl ShaderEntry<'_> {
    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Returns the entry point function name.
    #[inline]
    pub fn name(&self) -> &CStr {
        &self.name
    }

    /// Creates a pipeline shader stage create info structure.
    ///
    /// The returned structure borrows from this entry and must not outlive it.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module.handle())
            .name(&self.name)
    }
}
