//! Vulkan structure initializers.
//!
//! Small helpers that build fully-specified create-info and submit-info
//! structures for the handful of patterns the frame loop repeats every
//! frame. Keeping them here keeps command recording readable.

use ash::vk;

/// Create info for a command pool with per-buffer reset.
pub fn command_pool_create_info(
    queue_family_index: u32,
    flags: vk::CommandPoolCreateFlags,
) -> vk::CommandPoolCreateInfo<'static> {
    vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(flags)
}

/// Allocate info for primary command buffers.
pub fn command_buffer_allocate_info(
    pool: vk::CommandPool,
    count: u32,
) -> vk::CommandBufferAllocateInfo<'static> {
    vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(count)
}

/// Create info for a fence.
pub fn fence_create_info(flags: vk::FenceCreateFlags) -> vk::FenceCreateInfo<'static> {
    vk::FenceCreateInfo::default().flags(flags)
}

/// Create info for a binary semaphore.
pub fn semaphore_create_info() -> vk::SemaphoreCreateInfo<'static> {
    vk::SemaphoreCreateInfo::default()
}

/// Begin info for one-time-submit command buffer recording.
pub fn command_buffer_begin_info(
    flags: vk::CommandBufferUsageFlags,
) -> vk::CommandBufferBeginInfo<'static> {
    vk::CommandBufferBeginInfo::default().flags(flags)
}

/// Subresource range covering every mip level and array layer.
pub fn image_subresource_range(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect_mask)
        .base_mip_level(0)
        .level_count(vk::REMAINING_MIP_LEVELS)
        .base_array_layer(0)
        .layer_count(vk::REMAINING_ARRAY_LAYERS)
}

/// Semaphore submit info for a binary semaphore at the given stage.
pub fn semaphore_submit_info(
    stage_mask: vk::PipelineStageFlags2,
    semaphore: vk::Semaphore,
) -> vk::SemaphoreSubmitInfo<'static> {
    vk::SemaphoreSubmitInfo::default()
        .semaphore(semaphore)
        .stage_mask(stage_mask)
        .device_index(0)
        .value(1)
}

/// Command buffer submit info for `vkQueueSubmit2`.
pub fn command_buffer_submit_info(
    cmd: vk::CommandBuffer,
) -> vk::CommandBufferSubmitInfo<'static> {
    vk::CommandBufferSubmitInfo::default()
        .command_buffer(cmd)
        .device_mask(0)
}

/// Submit info tying command buffers to wait/signal semaphores.
///
/// Empty slices are valid and leave the corresponding arrays unset.
pub fn submit_info<'a>(
    cmd_infos: &'a [vk::CommandBufferSubmitInfo<'a>],
    signal_semaphore_infos: &'a [vk::SemaphoreSubmitInfo<'a>],
    wait_semaphore_infos: &'a [vk::SemaphoreSubmitInfo<'a>],
) -> vk::SubmitInfo2<'a> {
    vk::SubmitInfo2::default()
        .wait_semaphore_infos(wait_semaphore_infos)
        .signal_semaphore_infos(signal_semaphore_infos)
        .command_buffer_infos(cmd_infos)
}

/// Create info for a 2D optimal-tiling image with one mip and one layer.
pub fn image_create_info(
    format: vk::Format,
    usage_flags: vk::ImageUsageFlags,
    extent: vk::Extent3D,
) -> vk::ImageCreateInfo<'static> {
    vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(extent)
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage_flags)
}

/// Create info for a 2D image view covering mip 0, layer 0.
pub fn image_view_create_info(
    format: vk::Format,
    image: vk::Image,
    aspect_flags: vk::ImageAspectFlags,
) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo::default()
        .view_type(vk::ImageViewType::TYPE_2D)
        .image(image)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect_flags)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_subresource_range_covers_everything() {
        let range = image_subresource_range(vk::ImageAspectFlags::COLOR);
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(range.base_mip_level, 0);
        assert_eq!(range.level_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(range.base_array_layer, 0);
        assert_eq!(range.layer_count, vk::REMAINING_ARRAY_LAYERS);
    }

    #[test]
    fn test_image_create_info_defaults() {
        let extent = vk::Extent3D {
            width: 1700,
            height: 900,
            depth: 1,
        };
        let info = image_create_info(
            vk::Format::R16G16B16A16_SFLOAT,
            vk::ImageUsageFlags::STORAGE,
            extent,
        );
        assert_eq!(info.image_type, vk::ImageType::TYPE_2D);
        assert_eq!(info.mip_levels, 1);
        assert_eq!(info.array_layers, 1);
        assert_eq!(info.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(info.tiling, vk::ImageTiling::OPTIMAL);
        assert_eq!(info.extent.width, 1700);
        assert_eq!(info.extent.height, 900);
        assert_eq!(info.extent.depth, 1);
    }

    #[test]
    fn test_image_view_create_info_single_mip() {
        let info = image_view_create_info(
            vk::Format::R16G16B16A16_SFLOAT,
            vk::Image::null(),
            vk::ImageAspectFlags::COLOR,
        );
        assert_eq!(info.view_type, vk::ImageViewType::TYPE_2D);
        assert_eq!(info.subresource_range.level_count, 1);
        assert_eq!(info.subresource_range.layer_count, 1);
    }

    #[test]
    fn test_semaphore_submit_info_value() {
        let info =
            semaphore_submit_info(vk::PipelineStageFlags2::ALL_GRAPHICS, vk::Semaphore::null());
        assert_eq!(info.value, 1);
        assert_eq!(info.device_index, 0);
        assert_eq!(info.stage_mask, vk::PipelineStageFlags2::ALL_GRAPHICS);
    }

    #[test]
    fn test_fence_create_info_signaled() {
        let info = fence_create_info(vk::FenceCreateFlags::SIGNALED);
        assert_eq!(info.flags, vk::FenceCreateFlags::SIGNALED);
    }
}
