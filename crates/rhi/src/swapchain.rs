//! Swapchain management.
//!
//! This module owns the presentable images of a surface and the views the
//! renderer draws into.
//!
//! # Overview
//!
//! The [`Swapchain`] struct provides:
//! - Surface capability querying
//! - Format, present mode, extent and image count selection
//! - Image view creation and management
//! - All-or-nothing rebuilds on resize or staleness
//!
//! Images belong to the presentation engine and are never destroyed here;
//! only the views and the swapchain handle are.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triangle_rhi::device::Device;
//! use triangle_rhi::instance::Instance;
//! use triangle_rhi::swapchain::{AcquireOutcome, Swapchain, SwapchainPreferences};
//! use ash::vk;
//!
//! # fn example(instance: &Instance, device: Arc<Device>, surface: vk::SurfaceKHR,
//! #            semaphore: vk::Semaphore) -> Result<(), triangle_rhi::RhiError> {
//! let mut swapchain = Swapchain::new(
//!     instance,
//!     device.clone(),
//!     surface,
//!     800,
//!     600,
//!     SwapchainPreferences::default(),
//! )?;
//!
//! match swapchain.acquire_next_image(semaphore)? {
//!     AcquireOutcome::Ready { image_index, suboptimal: false } => {
//!         // ... render to swapchain.image(image_index as usize) ...
//!     }
//!     _ => {
//!         device.wait_idle()?;
//!         swapchain.recreate(800, 600)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Minimum number of swapchain images requested.
pub const MIN_IMAGE_COUNT: u32 = 3;

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Desired surface format and present mode.
///
/// Either is only a preference: selection falls back to the first reported
/// format and to FIFO respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainPreferences {
    /// Preferred format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Preferred present mode
    pub present_mode: vk::PresentModeKHR,
}

impl Default for SwapchainPreferences {
    fn default() -> Self {
        Self {
            surface_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            present_mode: vk::PresentModeKHR::MAILBOX,
        }
    }
}

/// Result of asking the swapchain for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. The acquire semaphore will be signaled.
    ///
    /// `suboptimal` means the image is usable but the swapchain no longer
    /// matches the surface exactly.
    Ready { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and must be rebuilt.
    OutOfDate,
}

/// Result of a present request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Queued for presentation.
    Presented,
    /// Queued, but the swapchain should be rebuilt.
    Suboptimal,
    /// Not presented; the swapchain must be rebuilt.
    OutOfDate,
}

impl PresentOutcome {
    /// True for outcomes that call for a rebuild.
    #[inline]
    pub fn is_stale(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// Result of a rebuild request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateOutcome {
    /// A new generation replaced the old one.
    Recreated,
    /// The surface currently has a zero extent (e.g. a minimized window).
    /// Nothing was created and the old generation is kept; retry later.
    ZeroExtent,
}

/// Handle, images and views of one swapchain generation.
///
/// `images.len() == image_views.len()` holds for every value of this type.
struct SwapchainState {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

/// Vulkan swapchain wrapper.
///
/// A rebuild creates the complete next generation (handle, images, views)
/// before releasing the current one, so a failed rebuild leaves the old
/// generation untouched.
///
/// # Thread Safety
///
/// Not thread-safe. The frame loop is the only user.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    preferences: SwapchainPreferences,
    state: SwapchainState,
}

impl Swapchain {
    /// Creates a new swapchain.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance
    /// * `device` - The logical device
    /// * `surface` - The window surface
    /// * `width` - Framebuffer width in pixels
    /// * `height` - Framebuffer height in pixels
    /// * `preferences` - Desired format and present mode
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Surface queries fail
    /// - The surface reports no formats or present modes
    /// - The selected extent is zero (a window cannot start minimized)
    /// - Swapchain or image view creation fails
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        preferences: SwapchainPreferences,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let state = create_state(
            &device,
            &swapchain_loader,
            &surface_loader,
            surface,
            &preferences,
            width,
            height,
            vk::SwapchainKHR::null(),
        )?
        .ok_or_else(|| {
            RhiError::SwapchainError("surface reports a zero extent".to_string())
        })?;

        Ok(Self {
            device,
            swapchain_loader,
            surface_loader,
            surface,
            preferences,
            state,
        })
    }

    /// Rebuilds the swapchain for a new framebuffer size.
    ///
    /// The caller must have waited for the device to go idle: the old views
    /// and swapchain handle are destroyed as soon as the new generation exists.
    ///
    /// Returns [`RecreateOutcome::ZeroExtent`] without touching the current
    /// generation when the surface has no drawable area.
    ///
    /// # Errors
    ///
    /// Returns an error if creating the new generation fails. The current
    /// generation is kept in that case (its handle is retired but valid).
    pub fn recreate(&mut self, width: u32, height: u32) -> RhiResult<RecreateOutcome> {
        info!("Recreating swapchain for {}x{}", width, height);

        let Some(next) = create_state(
            &self.device,
            &self.swapchain_loader,
            &self.surface_loader,
            self.surface,
            &self.preferences,
            width,
            height,
            self.state.handle,
        )?
        else {
            return Ok(RecreateOutcome::ZeroExtent);
        };

        self.destroy_views();
        self.state = next;

        Ok(RecreateOutcome::Recreated)
    }

    /// Acquires the next image, signaling `semaphore` when it is ready.
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than success, suboptimal or
    /// out-of-date, e.g. `ERROR_SURFACE_LOST_KHR`.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.state.handle,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(RhiError::from(e)),
        }
    }

    /// Queues `image_index` for presentation once `wait_semaphore` signals.
    ///
    /// # Errors
    ///
    /// Returns an error for anything other than success, suboptimal or
    /// out-of-date.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<PresentOutcome> {
        let swapchains = [self.state.handle];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(RhiError::from(e)),
        }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.state.handle
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.state.format
    }

    /// Returns the swapchain color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.state.color_space
    }

    /// Returns the swapchain extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.state.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.state.present_mode
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.state.images.len()
    }

    /// Returns the swapchain image at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.state.images[index]
    }

    /// Returns the image view at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.state.image_views[index]
    }

    /// Releases the current generation's views and swapchain handle.
    ///
    /// Images are owned by the presentation engine and go away with the handle.
    fn destroy_views(&mut self) {
        for &image_view in &self.state.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
        self.state.image_views.clear();
        self.state.images.clear();

        if self.state.handle != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader
                    .destroy_swapchain(self.state.handle, None);
            }
            self.state.handle = vk::SwapchainKHR::null();
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let extent = self.state.extent;
        let count = self.state.images.len();
        self.destroy_views();
        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            extent.width, extent.height, count
        );
    }
}

/// Builds one swapchain generation. Nothing is leaked on failure.
///
/// Returns `None` if the surface extent is zero.
#[allow(clippy::too_many_arguments)]
fn create_state(
    device: &Device,
    swapchain_loader: &ash::khr::swapchain::Device,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    preferences: &SwapchainPreferences,
    width: u32,
    height: u32,
    old_swapchain: vk::SwapchainKHR,
) -> RhiResult<Option<SwapchainState>> {
    let support = SwapchainSupportDetails::query(device.physical_device(), surface, surface_loader)?;

    if !support.is_adequate() {
        return Err(RhiError::SwapchainError(
            "Inadequate swapchain support (no formats or present modes)".to_string(),
        ));
    }

    let surface_format = choose_surface_format(&support.formats, preferences.surface_format);
    let present_mode = choose_present_mode(&support.present_modes, preferences.present_mode);
    let extent = choose_extent(&support.capabilities, width, height);
    let image_count = determine_image_count(&support.capabilities);

    if extent.width == 0 || extent.height == 0 {
        debug!(
            "Surface extent is {}x{}, not creating a swapchain",
            extent.width, extent.height
        );
        return Ok(None);
    }

    info!(
        "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
        extent.width,
        extent.height,
        surface_format.format,
        surface_format.color_space,
        present_mode,
        image_count
    );

    let queue_families = device.queue_families();
    let (Some(graphics_family), Some(present_family)) =
        (queue_families.graphics_family, queue_families.present_family)
    else {
        return Err(RhiError::SwapchainError(
            "device has no graphics or present queue family".to_string(),
        ));
    };
    let queue_family_indices = [graphics_family, present_family];

    let (sharing_mode, queue_family_indices_slice) = if graphics_family != present_family {
        debug!(
            "Using CONCURRENT sharing mode between graphics ({}) and present ({}) queues",
            graphics_family, present_family
        );
        (vk::SharingMode::CONCURRENT, queue_family_indices.as_slice())
    } else {
        (vk::SharingMode::EXCLUSIVE, &[][..])
    };

    let create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(sharing_mode)
        .queue_family_indices(queue_family_indices_slice)
        .pre_transform(support.capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old_swapchain);

    let handle = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

    let images = match unsafe { swapchain_loader.get_swapchain_images(handle) } {
        Ok(images) => images,
        Err(e) => {
            unsafe { swapchain_loader.destroy_swapchain(handle, None) };
            return Err(RhiError::from(e));
        }
    };

    let image_views = match create_image_views(device, &images, surface_format.format) {
        Ok(views) => views,
        Err(e) => {
            unsafe { swapchain_loader.destroy_swapchain(handle, None) };
            return Err(e);
        }
    };

    info!("Swapchain created with {} images", images.len());

    Ok(Some(SwapchainState {
        handle,
        images,
        image_views,
        format: surface_format.format,
        color_space: surface_format.color_space,
        extent,
        present_mode,
    }))
}

/// Chooses the surface format.
///
/// Uses `preferred` when the surface offers that exact format and color
/// space, otherwise the first reported format. `formats` must not be empty.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> vk::SurfaceFormatKHR {
    if let Some(&format) = formats
        .iter()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
    {
        debug!(
            "Selected preferred surface format: {:?} / {:?}",
            format.format, format.color_space
        );
        return format;
    }

    warn!(
        "Using first available surface format: {:?}",
        formats[0].format
    );
    formats[0]
}

/// Chooses the present mode: `preferred` if offered, otherwise FIFO,
/// which every implementation supports.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if present_modes.contains(&preferred) {
        debug!("Selected {:?} present mode", preferred);
        return preferred;
    }

    debug!("Selected FIFO present mode (vsync)");
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// A `current_extent` of `u32::MAX` means the surface lets the application
/// pick; the framebuffer size is then clamped to the surface limits one
/// axis at a time.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        debug!(
            "Using current surface extent: {}x{}",
            capabilities.current_extent.width, capabilities.current_extent.height
        );
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Calculated extent: {}x{} (requested: {}x{}, min: {}x{}, max: {}x{})",
        extent.width,
        extent.height,
        width,
        height,
        capabilities.min_image_extent.width,
        capabilities.min_image_extent.height,
        capabilities.max_image_extent.width,
        capabilities.max_image_extent.height
    );

    extent
}

/// Number of images to request: at least [`MIN_IMAGE_COUNT`] (or the
/// surface minimum if higher), capped by the surface maximum when it
/// declares one (`max_image_count == 0` means no limit).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = MIN_IMAGE_COUNT.max(capabilities.min_image_count);

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for &view in &image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {}: {:?}",
                    i, e
                )));
            }
        }
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srgb() -> vk::SurfaceFormatKHR {
        SwapchainPreferences::default().surface_format
    }

    fn free_extent_caps(min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            srgb(),
        ];

        let selected = choose_surface_format(&formats, srgb());
        assert_eq!(selected, srgb());
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats, srgb());
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_surface_format_requires_matching_color_space() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::A2B10G10R10_UNORM_PACK32,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
            },
        ];

        let selected = choose_surface_format(&formats, srgb());
        assert_eq!(selected.format, vk::Format::A2B10G10R10_UNORM_PACK32);
    }

    #[test]
    fn test_choose_present_mode_prefers_mailbox() {
        let modes = vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];

        let selected = choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX);
        assert_eq!(selected, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_choose_present_mode_fallback_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];

        let selected = choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX);
        assert_eq!(selected, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..free_extent_caps((1, 1), (4096, 4096))
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_choose_extent_clamps_each_axis() {
        let capabilities = free_extent_caps((1, 1), (4096, 4096));

        let extent = choose_extent(&capabilities, 10000, 500);
        assert_eq!((extent.width, extent.height), (4096, 500));
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = free_extent_caps((100, 100), (2000, 2000));

        let extent = choose_extent(&capabilities, 3000, 3000);
        assert_eq!((extent.width, extent.height), (2000, 2000));

        let extent = choose_extent(&capabilities, 50, 50);
        assert_eq!((extent.width, extent.height), (100, 100));

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_choose_extent_minimized_surface() {
        // Some platforms report a zero current extent while minimized.
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D::default(),
            ..free_extent_caps((1, 1), (4096, 4096))
        };
        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (0, 0));

        // Others keep the extent free but shrink the maximum to zero.
        let capabilities = free_extent_caps((0, 0), (0, 0));
        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!((extent.width, extent.height), (0, 0));
    }

    #[test]
    fn test_determine_image_count() {
        let caps = |min_image_count, max_image_count| vk::SurfaceCapabilitiesKHR {
            min_image_count,
            max_image_count,
            ..Default::default()
        };

        // At least three
        assert_eq!(determine_image_count(&caps(2, 8)), 3);
        assert_eq!(determine_image_count(&caps(1, 0)), 3);
        // Surface minimum wins when larger
        assert_eq!(determine_image_count(&caps(4, 8)), 4);
        // Capped by a declared maximum
        assert_eq!(determine_image_count(&caps(1, 2)), 2);
        assert_eq!(determine_image_count(&caps(2, 3)), 3);
    }

    #[test]
    fn test_present_outcome_staleness() {
        assert!(!PresentOutcome::Presented.is_stale());
        assert!(PresentOutcome::Suboptimal.is_stale());
        assert!(PresentOutcome::OutOfDate.is_stale());
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            formats: vec![],
            ..adequate.clone()
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..adequate
        };
        assert!(!no_modes.is_adequate());
    }
}
