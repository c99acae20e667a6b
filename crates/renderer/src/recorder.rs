//! Per-frame command recording.
//!
//! [`CommandRecorder::record`] writes the full command stream for one
//! swapchain image into a frame slot's command buffer:
//!
//! 1. Reset and begin the buffer (one-time submit)
//! 2. Transition the image `UNDEFINED -> COLOR_ATTACHMENT_OPTIMAL`
//! 3. Begin dynamic rendering with a clear
//! 4. Bind pipeline, vertex and index buffers; set viewport and scissor from
//!    the current extent; bind the slot's descriptor set
//! 5. Indexed draw
//! 6. End rendering
//! 7. Transition the image `COLOR_ATTACHMENT_OPTIMAL -> PRESENT_SRC_KHR`
//! 8. End the buffer
//!
//! Recording goes through the [`CommandEncoder`] trait so the order can be
//! checked without a GPU.

use ash::vk;
use triangle_rhi::RhiResult;
use triangle_rhi::command::{CommandBuffer, LayoutTransition};
use triangle_rhi::rendering::{ColorAttachment, DEFAULT_CLEAR_COLOR, RenderingConfig};

/// Command-buffer operations used by the recorder.
///
/// Implemented by [`CommandBuffer`]; tests provide a logging fake.
pub trait CommandEncoder {
    fn reset(&self) -> RhiResult<()>;
    fn begin(&self) -> RhiResult<()>;
    fn end(&self) -> RhiResult<()>;
    fn transition_image(&self, image: vk::Image, transition: LayoutTransition);
    fn begin_rendering(&self, rendering_info: &vk::RenderingInfo);
    fn end_rendering(&self);
    fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline);
    fn bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]);
    fn bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType);
    fn bind_graphics_descriptor_sets(
        &self,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    );
    fn set_viewport(&self, viewport: &vk::Viewport);
    fn set_scissor(&self, scissor: &vk::Rect2D);
    fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
}

impl CommandEncoder for CommandBuffer {
    fn reset(&self) -> RhiResult<()> {
        CommandBuffer::reset(self)
    }

    fn begin(&self) -> RhiResult<()> {
        CommandBuffer::begin(self)
    }

    fn end(&self) -> RhiResult<()> {
        CommandBuffer::end(self)
    }

    fn transition_image(&self, image: vk::Image, transition: LayoutTransition) {
        CommandBuffer::transition_image(self, image, transition);
    }

    fn begin_rendering(&self, rendering_info: &vk::RenderingInfo) {
        CommandBuffer::begin_rendering(self, rendering_info);
    }

    fn end_rendering(&self) {
        CommandBuffer::end_rendering(self);
    }

    fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        CommandBuffer::bind_graphics_pipeline(self, pipeline);
    }

    fn bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        CommandBuffer::bind_vertex_buffers(self, first_binding, buffers, offsets);
    }

    fn bind_index_buffer(&self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        CommandBuffer::bind_index_buffer(self, buffer, offset, index_type);
    }

    fn bind_graphics_descriptor_sets(
        &self,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        CommandBuffer::bind_graphics_descriptor_sets(self, layout, first_set, descriptor_sets);
    }

    fn set_viewport(&self, viewport: &vk::Viewport) {
        CommandBuffer::set_viewport(self, viewport);
    }

    fn set_scissor(&self, scissor: &vk::Rect2D) {
        CommandBuffer::set_scissor(self, scissor);
    }

    fn draw_indexed(
        &self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        CommandBuffer::draw_indexed(
            self,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
    }
}

/// The swapchain image a frame draws into.
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub extent: vk::Extent2D,
}

/// Everything bound for the draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawResources {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    /// The frame slot's uniform descriptor set.
    pub descriptor_set: vk::DescriptorSet,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    pub index_type: vk::IndexType,
}

/// Records the per-image command stream.
#[derive(Debug, Clone, Copy)]
pub struct CommandRecorder {
    clear_color: [f32; 4],
}

impl Default for CommandRecorder {
    fn default() -> Self {
        Self {
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

impl CommandRecorder {
    /// Creates a recorder that clears to opaque black.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clear color.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Resets `encoder` and records one frame for `target`.
    ///
    /// The encoder must not be referenced by a pending submission.
    ///
    /// # Errors
    ///
    /// Returns an error if resetting, beginning or ending the command
    /// buffer fails.
    pub fn record<E: CommandEncoder>(
        &self,
        encoder: &E,
        target: &RenderTarget,
        draw: &DrawResources,
    ) -> RhiResult<()> {
        encoder.reset()?;
        encoder.begin()?;

        encoder.transition_image(target.image, LayoutTransition::UndefinedToColorAttachment);

        let rendering = RenderingConfig::from_extent(target.extent)
            .with_color_attachment(
                ColorAttachment::new(target.image_view).with_clear_color(self.clear_color),
            )
            .build();
        encoder.begin_rendering(&rendering.info());

        encoder.bind_graphics_pipeline(draw.pipeline);
        encoder.bind_vertex_buffers(0, &[draw.vertex_buffer], &[0]);
        encoder.bind_index_buffer(draw.index_buffer, 0, draw.index_type);
        encoder.set_viewport(&viewport_for(target.extent));
        encoder.set_scissor(&scissor_for(target.extent));
        encoder.bind_graphics_descriptor_sets(draw.pipeline_layout, 0, &[draw.descriptor_set]);

        encoder.draw_indexed(draw.index_count, 1, 0, 0, 0);

        encoder.end_rendering();

        encoder.transition_image(target.image, LayoutTransition::ColorAttachmentToPresent);

        encoder.end()
    }
}

/// Full-extent viewport with depth range `[0, 1]`.
pub fn viewport_for(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Full-extent scissor.
pub fn scissor_for(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}
