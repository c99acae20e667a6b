//! Dynamic rendering helpers (Vulkan 1.3).
//!
//! Render regions are opened with `vkCmdBeginRendering` instead of a
//! VkRenderPass. The attachment layout is not changed by the region; callers
//! record the transitions around it (see [`crate::command::LayoutTransition`]).
//!
//! - [`ColorAttachment`] - configuration for the color attachment
//! - [`RenderingConfig`] - render area plus attachment
//! - [`RenderingInfoBundle`] - owns the attachment info so a
//!   `vk::RenderingInfo` can borrow it
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use triangle_rhi::rendering::{ColorAttachment, RenderingConfig};
//! use triangle_rhi::command::CommandBuffer;
//!
//! # fn example(swapchain_image_view: vk::ImageView, extent: vk::Extent2D, cmd: &CommandBuffer) {
//! let config = RenderingConfig::from_extent(extent)
//!     .with_color_attachment(ColorAttachment::new(swapchain_image_view));
//!
//! let bundle = config.build();
//! cmd.begin_rendering(&bundle.info());
//! // ... draw commands ...
//! cmd.end_rendering();
//! # }
//! ```

use ash::vk;

/// Opaque black.
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Configuration for a color attachment in dynamic rendering.
///
/// # Default Values
///
/// - `layout`: `COLOR_ATTACHMENT_OPTIMAL`
/// - `load_op`: `CLEAR`
/// - `store_op`: `STORE`
/// - `clear_color`: [`DEFAULT_CLEAR_COLOR`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorAttachment {
    /// The image view to render to.
    pub image_view: vk::ImageView,
    /// The image layout during rendering.
    pub layout: vk::ImageLayout,
    /// How to load the attachment contents at the start of rendering.
    pub load_op: vk::AttachmentLoadOp,
    /// How to store the attachment contents at the end of rendering.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear value when load_op is CLEAR.
    pub clear_color: [f32; 4],
}

impl ColorAttachment {
    /// Creates a cleared-and-stored color attachment.
    #[inline]
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }

    /// Sets the clear color as RGBA float values.
    #[inline]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Converts this attachment to a `VkRenderingAttachmentInfo`.
    #[inline]
    pub fn to_rendering_attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            })
    }
}

/// Render area plus the attachments of one render region.
#[derive(Clone, Debug, Default)]
pub struct RenderingConfig {
    render_area: vk::Rect2D,
    color_attachments: Vec<ColorAttachment>,
}

impl RenderingConfig {
    /// Covers the whole of `extent`.
    pub fn from_extent(extent: vk::Extent2D) -> Self {
        Self {
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            color_attachments: Vec::new(),
        }
    }

    /// Appends a color attachment.
    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    /// Returns the render area.
    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        self.render_area
    }

    /// Builds the bundle backing a `vk::RenderingInfo`.
    pub fn build(&self) -> RenderingInfoBundle {
        RenderingInfoBundle {
            color_attachments: self
                .color_attachments
                .iter()
                .map(ColorAttachment::to_rendering_attachment_info)
                .collect(),
            render_area: self.render_area,
        }
    }
}

/// Owned attachment data for one `vkCmdBeginRendering` call.
pub struct RenderingInfoBundle {
    color_attachments: Vec<vk::RenderingAttachmentInfo<'static>>,
    render_area: vk::Rect2D,
}

impl RenderingInfoBundle {
    /// Returns the `VkRenderingInfo` referencing this bundle's data.
    pub fn info(&self) -> vk::RenderingInfo<'_> {
        vk::RenderingInfo::default()
            .render_area(self.render_area)
            .layer_count(1)
            .color_attachments(&self.color_attachments)
    }

    /// Returns the color attachments.
    #[inline]
    pub fn color_attachments(&self) -> &[vk::RenderingAttachmentInfo<'static>] {
        &self.color_attachments
    }
}
