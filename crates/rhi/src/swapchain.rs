//! Swapchain creation, acquisition, and presentation.
//!
//! The engine runs with a fixed window extent and a vsync'd FIFO present
//! mode, so the [`Swapchain`] is created exactly once and never rebuilt.
//! Images carry `TRANSFER_DST` usage because every frame is produced by
//! blitting the offscreen draw image into the acquired swapchain image.
//!
//! Format policy: B8G8R8A8_UNORM with the SRGB_NONLINEAR color space when
//! the surface offers it, otherwise whatever the surface lists first.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;

/// What the surface supports for swapchain creation.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Image count bounds, extent bounds, transforms.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Available format / color space pairs.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Available present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Queries surface capabilities, formats, and present modes for a
    /// physical device.
    ///
    /// # Errors
    ///
    /// Returns an error if any surface query fails.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
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
            "Surface reports {} format(s), {} present mode(s)",
            formats.len(),
            present_modes.len()
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// A surface with no formats or no present modes cannot host a
    /// swapchain.
    #[inline]
    pub fn usable(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// The presentation swapchain and its image views.
///
/// Not thread-safe; all use happens on the render thread.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Creates the swapchain for a fixed-size window.
    ///
    /// FIFO present mode (always available per the Vulkan spec), image
    /// usage `COLOR_ATTACHMENT | TRANSFER_DST`, exclusive sharing on the
    /// single graphics queue, and one image above the surface minimum,
    /// clamped to the surface maximum.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface is unusable or any Vulkan object
    /// creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<Self, RhiError> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support = SurfaceSupport::query(device.physical_device(), surface, &surface_loader)?;
        if !support.usable() {
            return Err(RhiError::SwapchainError(
                "Surface offers no formats or present modes".to_string(),
            ));
        }

        let surface_format = pick_format(&support.formats);
        let extent = pick_extent(&support.capabilities, width, height);
        let image_count = pick_image_count(&support.capabilities);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true);

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };
        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };

        info!(
            "Swapchain ready: {}x{} {:?}, FIFO, {} image(s)",
            extent.width,
            extent.height,
            surface_format.format,
            images.len()
        );

        let image_views = build_image_views(&device, &images, surface_format.format)?;

        Ok(Self {
            device,
            swapchain_loader,
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    /// Acquires the next presentable image.
    ///
    /// `semaphore` is signaled once the image is actually ready for
    /// rendering. Returns the image index and whether the swapchain is
    /// suboptimal for the surface.
    ///
    /// # Errors
    ///
    /// Returns the raw Vulkan result on failure or timeout.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout: u64,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Queues the image for presentation after `wait_semaphore` signals.
    ///
    /// Returns whether the swapchain is suboptimal.
    ///
    /// # Errors
    ///
    /// Returns the raw Vulkan result on failure.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns how many images the swapchain holds.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns the image at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// Returns the view for the image at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    /// Returns all swapchain images.
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }
        info!("Swapchain destroyed");
    }
}

/// Picks B8G8R8A8_UNORM + SRGB_NONLINEAR when offered, else the surface's
/// first format.
///
/// UNORM rather than SRGB because the blit source already holds linear
/// values written by the compute pass.
fn pick_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or_else(|| {
            warn!(
                "Preferred surface format unavailable, using {:?}",
                formats[0].format
            );
            formats[0]
        })
}

/// Picks the swapchain extent.
///
/// When the surface pins a current extent, that wins; otherwise the
/// requested size is clamped to the surface bounds.
fn pick_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One image above the surface minimum, capped by the surface maximum
/// (`max_image_count == 0` means uncapped).
fn pick_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        wanted.min(capabilities.max_image_count)
    } else {
        wanted
    }
}

/// Creates a 2D color view per swapchain image.
fn build_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    images
        .iter()
        .map(|&image| {
            let create_info = crate::init::image_view_create_info(
                format,
                image,
                vk::ImageAspectFlags::COLOR,
            );
            unsafe { Ok(device.handle().create_image_view(&create_info, None)?) }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_pick_format_takes_preferred_pair() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let picked = pick_format(&formats);
        assert_eq!(picked.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(picked.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_pick_format_falls_back_to_first() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        assert_eq!(pick_format(&formats).format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn test_pick_extent_honors_pinned_extent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1700,
                height: 900,
            },
            ..Default::default()
        };

        // Requested size is ignored when the surface pins the extent.
        let extent = pick_extent(&capabilities, 640, 480);
        assert_eq!((extent.width, extent.height), (1700, 900));
    }

    #[test]
    fn test_pick_extent_clamps_free_extent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 320,
                height: 240,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        };

        let too_big = pick_extent(&capabilities, 8000, 8000);
        assert_eq!((too_big.width, too_big.height), (1920, 1080));

        let too_small = pick_extent(&capabilities, 10, 10);
        assert_eq!((too_small.width, too_small.height), (320, 240));

        let in_range = pick_extent(&capabilities, 1700, 900);
        assert_eq!((in_range.width, in_range.height), (1700, 900));
    }

    #[test]
    fn test_pick_image_count_min_plus_one() {
        assert_eq!(pick_image_count(&caps(2, 8)), 3);
    }

    #[test]
    fn test_pick_image_count_respects_cap() {
        assert_eq!(pick_image_count(&caps(3, 3)), 3);
    }

    #[test]
    fn test_pick_image_count_uncapped_surface() {
        assert_eq!(pick_image_count(&caps(2, 0)), 3);
    }

    #[test]
    fn test_surface_support_usable() {
        let support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(support.usable());

        let empty = SurfaceSupport {
            present_modes: Vec::new(),
            ..support
        };
        assert!(!empty.usable());
    }
}
