//! Vulkan implementation of [`FrameBackend`].
//!
//! [`VulkanBackend`] owns every GPU object the frame loop touches: instance,
//! surface, device, swapchain, the synchronization ring and the per-slot
//! resources used to draw the quad.
//!
//! # Resource Destruction Order
//!
//! 1. Wait for the device to go idle
//! 2. Per-slot resources, geometry, descriptors and pipeline
//! 3. Synchronization ring
//! 4. Swapchain
//! 5. Surface
//! 6. Device
//! 7. Instance
//!
//! The window outlives all of them.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, trace, warn};

use triangle_core::{AppConfig, Timer};
use triangle_platform::{Surface, Window};
use triangle_rhi::RhiResult;
use triangle_rhi::buffer::{Buffer, BufferUsage};
use triangle_rhi::command::{CommandBuffer, CommandPool};
use triangle_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, uniform_pool_sizes,
    write_uniform_buffer,
};
use triangle_rhi::device::Device;
use triangle_rhi::instance::Instance;
use triangle_rhi::physical_device::select_physical_device;
use triangle_rhi::pipeline::{
    CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use triangle_rhi::shader::{ShaderModule, ShaderStage};
use triangle_rhi::swapchain::{
    AcquireOutcome, PresentOutcome, RecreateOutcome, Swapchain, SwapchainPreferences,
};
use triangle_rhi::sync::{SlotWait, SyncRing};
use triangle_rhi::vertex::{QUAD_INDEX_TYPE, QUAD_INDICES, QUAD_VERTICES, Vertex};

use crate::backend::FrameBackend;
use crate::error::RendererResult;
use crate::recorder::{CommandRecorder, DrawResources, RenderTarget};
use crate::ubo::UniformBufferObject;

/// Vertex stage entry point in the shader module.
pub const VERTEX_ENTRY: &str = "vertMain";
/// Fragment stage entry point in the shader module.
pub const FRAGMENT_ENTRY: &str = "fragMain";

/// Resources owned by one frame slot.
struct FrameResources {
    /// Re-recorded every time the slot comes around.
    command_buffer: CommandBuffer,
    /// Backing pool, held for drop. Declared after the buffer so it outlives it.
    _command_pool: CommandPool,
    /// Persistently mapped uniform buffer.
    uniform_buffer: Buffer,
    /// Set pointing at `uniform_buffer`.
    descriptor_set: vk::DescriptorSet,
}

/// Everything created after the swapchain and released before it.
struct SceneResources {
    frames: Vec<FrameResources>,
    /// Held for drop, like `_descriptor_set_layout`.
    _descriptor_pool: DescriptorPool,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    _descriptor_set_layout: DescriptorSetLayout,
    /// Kept so the pipeline can be rebuilt if the swapchain format changes.
    shader: ShaderModule,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl SceneResources {
    fn draw_resources(&self, slot: usize) -> DrawResources {
        DrawResources {
            pipeline: self.pipeline.handle(),
            pipeline_layout: self.pipeline_layout.handle(),
            descriptor_set: self.frames[slot].descriptor_set,
            vertex_buffer: self.vertex_buffer.handle(),
            index_buffer: self.index_buffer.handle(),
            index_count: self.index_count,
            index_type: QUAD_INDEX_TYPE,
        }
    }
}

/// Renders the spinning quad into a window.
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct VulkanBackend {
    window: Window,
    instance: ManuallyDrop<Instance>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    swapchain: ManuallyDrop<Swapchain>,
    sync: ManuallyDrop<SyncRing>,
    scene: ManuallyDrop<SceneResources>,
    recorder: CommandRecorder,
    timer: Timer,
}

impl VulkanBackend {
    /// Creates the backend for `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of setup fails: missing validation layer,
    /// no suitable GPU, unreadable shader, or any Vulkan object creation.
    /// Objects created before the failure are released.
    pub fn new(window: Window, config: &AppConfig) -> RendererResult<Self> {
        let (width, height) = window.framebuffer_size();
        info!("Initializing Vulkan backend ({}x{})", width, height);

        let extensions = window.required_extensions()?;
        let instance = Instance::new(config.enable_validation, &extensions)?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        info!(
            "Using {} ({})",
            physical_device_info.device_name(),
            physical_device_info.device_type_name()
        );

        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            SwapchainPreferences::default(),
        )?;

        let sync = SyncRing::new(
            device.clone(),
            config.frames_in_flight,
            swapchain.image_count(),
        )?;

        let scene = Self::create_scene(&device, config, swapchain.format())?;

        info!(
            "Vulkan backend ready: {} swapchain images, {} frames in flight",
            swapchain.image_count(),
            config.frames_in_flight
        );

        Ok(Self {
            window,
            instance: ManuallyDrop::new(instance),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            swapchain: ManuallyDrop::new(swapchain),
            sync: ManuallyDrop::new(sync),
            scene: ManuallyDrop::new(scene),
            recorder: CommandRecorder::new(),
            timer: Timer::new(),
        })
    }

    fn create_scene(
        device: &Arc<Device>,
        config: &AppConfig,
        color_format: vk::Format,
    ) -> RhiResult<SceneResources> {
        let ubo_binding = DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &[ubo_binding])?;
        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()])?;

        let shader = ShaderModule::from_spirv_file(device.clone(), &config.shader_path)?;
        let pipeline = Self::create_pipeline(device, &shader, &pipeline_layout, color_format)?;

        let upload_pool = CommandPool::new_transient(device.clone(), device.graphics_family())?;
        let vertex_buffer = Buffer::upload_via_staging(
            device.clone(),
            &upload_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&QUAD_VERTICES),
        )?;
        let index_buffer = Buffer::upload_via_staging(
            device.clone(),
            &upload_pool,
            BufferUsage::Index,
            bytemuck::cast_slice(&QUAD_INDICES),
        )?;

        let slot_count = config.frames_in_flight as u32;
        let descriptor_pool = DescriptorPool::new(
            device.clone(),
            slot_count,
            &uniform_pool_sizes(slot_count),
        )?;
        let set_layouts = vec![descriptor_set_layout.handle(); config.frames_in_flight];
        let descriptor_sets = descriptor_pool.allocate(&set_layouts)?;

        let frames = descriptor_sets
            .into_iter()
            .map(|descriptor_set| {
                let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;
                let command_buffer = CommandBuffer::new(device.clone(), &command_pool)?;
                let uniform_buffer = Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    UniformBufferObject::SIZE as vk::DeviceSize,
                )?;
                write_uniform_buffer(
                    device,
                    descriptor_set,
                    0,
                    uniform_buffer.handle(),
                    uniform_buffer.size(),
                );
                Ok(FrameResources {
                    command_buffer,
                    _command_pool: command_pool,
                    uniform_buffer,
                    descriptor_set,
                })
            })
            .collect::<RhiResult<Vec<_>>>()?;

        debug!("Created resources for {} frame slot(s)", frames.len());

        Ok(SceneResources {
            frames,
            _descriptor_pool: descriptor_pool,
            pipeline,
            pipeline_layout,
            _descriptor_set_layout: descriptor_set_layout,
            shader,
            vertex_buffer,
            index_buffer,
            index_count: QUAD_INDICES.len() as u32,
        })
    }

    fn create_pipeline(
        device: &Arc<Device>,
        shader: &ShaderModule,
        layout: &PipelineLayout,
        color_format: vk::Format,
    ) -> RhiResult<Pipeline> {
        let vertex = shader.entry(ShaderStage::Vertex, VERTEX_ENTRY)?;
        let fragment = shader.entry(ShaderStage::Fragment, FRAGMENT_ENTRY)?;
        let attributes = Vertex::attribute_descriptions();

        GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex)
            .fragment_shader(&fragment)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&attributes)
            .cull_mode(CullMode::Back)
            .front_face(FrontFace::CounterClockwise)
            .color_attachment_format(color_format)
            .build(device.clone(), layout)
    }

    /// The window this backend renders into.
    #[inline]
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Current swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Current swapchain format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// Frames recorded and average frame rate since startup.
    pub fn frame_stats(&self) -> (u64, f64) {
        (self.timer.frames(), self.timer.average_fps())
    }
}

impl FrameBackend for VulkanBackend {
    fn frames_in_flight(&self) -> usize {
        self.sync.frames_in_flight()
    }

    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn wait_for_slot(&mut self, slot: usize, timeout_ns: u64) -> RhiResult<SlotWait> {
        self.sync.wait_for_slot(slot, timeout_ns)
    }

    fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.sync.reset_slot(slot)
    }

    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        self.swapchain
            .acquire_next_image(self.sync.acquire_semaphore(slot))
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let delta = self.timer.tick();
        trace!("Frame delta {:?}", delta);

        let extent = self.swapchain.extent();
        let ubo = UniformBufferObject::at_time(self.timer.elapsed_secs(), extent);
        let frame = &self.scene.frames[slot];
        frame.uniform_buffer.write_data(0, ubo.as_bytes())?;

        let index = image_index as usize;
        let target = RenderTarget {
            image: self.swapchain.image(index),
            image_view: self.swapchain.image_view(index),
            extent,
        };

        self.recorder
            .record(&frame.command_buffer, &target, &self.scene.draw_resources(slot))
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let wait_semaphores = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.sync.acquire_semaphore(slot))
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let signal_semaphores = [vk::SemaphoreSubmitInfo::default()
            .semaphore(self.sync.present_semaphore(image_index as usize))
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let command_buffers = [vk::CommandBufferSubmitInfo::default()
            .command_buffer(self.scene.frames[slot].command_buffer.handle())];

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_semaphores)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signal_semaphores);

        // SAFETY: the command buffer was recorded by `record`, the acquire
        // semaphore has a pending signal from `acquire_image`, and the fence
        // was reset by `reset_slot`.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], self.sync.completion_fence(slot))
        }
    }

    fn present(&mut self, image_index: u32) -> RhiResult<PresentOutcome> {
        self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.sync.present_semaphore(image_index as usize),
        )
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.window.framebuffer_size()
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> RhiResult<RecreateOutcome> {
        let old_format = self.swapchain.format();

        if self.swapchain.recreate(width, height)? == RecreateOutcome::ZeroExtent {
            return Ok(RecreateOutcome::ZeroExtent);
        }
        self.sync.recreate(self.swapchain.image_count())?;

        let new_format = self.swapchain.format();
        if new_format != old_format {
            warn!(
                "Swapchain format changed from {:?} to {:?}, rebuilding pipeline",
                old_format, new_format
            );
            let scene = &mut *self.scene;
            scene.pipeline = Self::create_pipeline(
                &self.device,
                &scene.shader,
                &scene.pipeline_layout,
                new_format,
            )?;
        }

        Ok(RecreateOutcome::Recreated)
    }

    fn wait_idle(&mut self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during backend drop: {:?}", e);
        }

        unsafe {
            ManuallyDrop::drop(&mut self.scene);
            ManuallyDrop::drop(&mut self.sync);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Vulkan backend destroyed");
    }
}
