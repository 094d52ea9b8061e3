//! GPU image allocation and image commands.
//!
//! This module provides:
//! - [`AllocatedImage`] - an image backed by gpu-allocator memory together
//!   with its default image view
//! - [`transition_image`] - layout transitions via `VK_KHR_synchronization2`
//!   barriers
//! - [`copy_image_to_image`] - a full-extent blit between two images
//!
//! # Overview
//!
//! The engine renders into an offscreen `AllocatedImage` in a high precision
//! format and blits the result into the swapchain image each frame. Layout
//! transitions use conservative `ALL_COMMANDS` barriers: correct for every
//! use site at the cost of some GPU parallelism.

use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiError;

/// An image with dedicated GPU memory and a default image view.
///
/// The image, its view, and its allocation are released together when the
/// wrapper is dropped.
pub struct AllocatedImage {
    device: Arc<Device>,
    allocator: Arc<Mutex<Allocator>>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent3D,
}

impl AllocatedImage {
    /// Creates a new GPU-only image with a dedicated allocation and a 2D
    /// color image view covering the whole image.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `allocator` - The shared GPU memory allocator
    /// * `format` - Image pixel format
    /// * `extent` - Image dimensions (depth is 1 for 2D images)
    /// * `usage` - Image usage flags
    /// * `aspect` - Aspect for the default view (COLOR or DEPTH)
    ///
    /// # Errors
    ///
    /// Returns an error if image creation, memory allocation, binding, or
    /// view creation fails.
    pub fn new(
        device: Arc<Device>,
        allocator: Arc<Mutex<Allocator>>,
        format: vk::Format,
        extent: vk::Extent3D,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> Result<Self, RhiError> {
        let image_info = crate::init::image_create_info(format, usage, extent);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = allocator
                .lock()
                .map_err(|_| RhiError::InvalidHandle("Allocator mutex poisoned".to_string()))?;
            allocator.allocate(&AllocationCreateDesc {
                name: "allocated_image",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::DedicatedImage(image),
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = crate::init::image_view_create_info(format, image, aspect);
        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        info!(
            "Allocated image created: {}x{}, format {:?}, {} bytes",
            extent.width,
            extent.height,
            format,
            allocation.size()
        );

        Ok(Self {
            device,
            allocator,
            image,
            view,
            allocation: Some(allocation),
            format,
            extent,
        })
    }

    /// Returns the image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Returns the default image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    /// Returns the image extent as a 2D extent.
    #[inline]
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }
}

impl Drop for AllocatedImage {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            if let Ok(mut allocator) = self.allocator.lock() {
                if let Err(e) = allocator.free(allocation) {
                    tracing::warn!("Failed to free image allocation: {e}");
                }
            }
        }

        debug!(
            "Allocated image destroyed ({}x{}, {:?})",
            self.extent.width, self.extent.height, self.format
        );
    }
}

/// Records an image layout transition into `cmd`.
///
/// Uses a synchronization2 barrier with `ALL_COMMANDS` stage masks and full
/// memory read/write access. The subresource range covers all mips and
/// layers; the aspect is DEPTH when transitioning to a depth attachment
/// layout, COLOR otherwise.
pub fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    current_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let aspect_mask = if new_layout == vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    };

    let barrier = vk::ImageMemoryBarrier2::default()
        .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .src_access_mask(vk::AccessFlags2::MEMORY_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
        .dst_access_mask(vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ)
        .old_layout(current_layout)
        .new_layout(new_layout)
        .subresource_range(crate::init::image_subresource_range(aspect_mask))
        .image(image);

    let barriers = [barrier];
    let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);

    unsafe {
        device.cmd_pipeline_barrier2(cmd, &dependency_info);
    }
}

/// Records a blit copying the full extent of `source` into `destination`.
///
/// The blit uses linear filtering and covers mip 0, layer 0 of both images.
/// Source must be in `TRANSFER_SRC_OPTIMAL` and destination in
/// `TRANSFER_DST_OPTIMAL` layout.
pub fn copy_image_to_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    source: vk::Image,
    destination: vk::Image,
    src_size: vk::Extent2D,
    dst_size: vk::Extent2D,
) {
    let blit_region = vk::ImageBlit2::default()
        .src_offsets([
            vk::Offset3D { x: 0, y: 0, z: 0 },
            vk::Offset3D {
                x: src_size.width as i32,
                y: src_size.height as i32,
                z: 1,
            },
        ])
        .dst_offsets([
            vk::Offset3D { x: 0, y: 0, z: 0 },
            vk::Offset3D {
                x: dst_size.width as i32,
                y: dst_size.height as i32,
                z: 1,
            },
        ])
        .src_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_array_layer(0)
                .layer_count(1)
                .mip_level(0),
        )
        .dst_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_array_layer(0)
                .layer_count(1)
                .mip_level(0),
        );

    let regions = [blit_region];
    let blit_info = vk::BlitImageInfo2::default()
        .src_image(source)
        .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
        .dst_image(destination)
        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .filter(vk::Filter::LINEAR)
        .regions(&regions);

    unsafe {
        device.cmd_blit_image2(cmd, &blit_info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_image_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AllocatedImage>();
    }
}
