//! Per-frame rendering resources.
//!
//! Each frame slot owns its own command pool, primary command buffer, and
//! synchronization objects so two frames can be in flight at once: the CPU
//! records frame N while the GPU finishes frame N-1.

use std::sync::Arc;

use ash::vk;
use tome_rhi::RhiError;
use tome_rhi::command::CommandPool;
use tome_rhi::device::Device;
use tome_rhi::sync::{Fence, Semaphore};

use crate::deletion_queue::DeletionQueue;

/// Command and synchronization state for one frame slot.
pub struct FrameData {
    /// Command pool owning this frame's command buffer.
    pub command_pool: CommandPool,
    /// Primary command buffer, re-recorded every time the slot is used.
    pub command_buffer: vk::CommandBuffer,
    /// Signaled when the swapchain image for this frame is acquired.
    pub swapchain_semaphore: Semaphore,
    /// Signaled when this frame's rendering completes; waited by present.
    pub render_semaphore: Semaphore,
    /// Signaled when this frame's commands finish on the GPU. Created
    /// signaled so the first use of the slot does not block.
    pub render_fence: Fence,
    /// Per-frame transient resources, flushed once the fence wait
    /// guarantees the GPU is done with them.
    pub deletion_queue: DeletionQueue,
}

impl FrameData {
    /// Creates the command and synchronization objects for one frame slot.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object creation fails.
    pub fn new(device: Arc<Device>) -> Result<Self, RhiError> {
        let command_pool = CommandPool::new(device.clone(), device.graphics_queue_family())?;
        let command_buffer = command_pool.allocate_primary()?;

        let swapchain_semaphore = Semaphore::new(device.clone())?;
        let render_semaphore = Semaphore::new(device.clone())?;
        let render_fence = Fence::new(device, true)?;

        Ok(Self {
            command_pool,
            command_buffer,
            swapchain_semaphore,
            render_semaphore,
            render_fence,
            deletion_queue: DeletionQueue::new(),
        })
    }
}
