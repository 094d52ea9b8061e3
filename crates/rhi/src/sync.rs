//! Synchronization primitives for Vulkan.
//!
//! This module provides wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - GPU-to-GPU synchronization (between queue operations)
//! - [`Fence`] - GPU-to-CPU synchronization (for host waiting)
//!
//! # Overview
//!
//! The frame lifecycle uses two semaphores and one fence per frame slot:
//!
//! - A **swapchain semaphore**, signaled when an image has been acquired and
//!   waited on by the frame's queue submission.
//! - A **render semaphore**, signaled when the frame's commands finish and
//!   waited on by presentation.
//! - A **render fence**, signaled when the frame's command buffer completes
//!   on the GPU and waited on by the CPU before the frame slot is reused.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tome_rhi::device::Device;
//! use tome_rhi::sync::{Semaphore, Fence};
//!
//! # fn example(device: Arc<Device>) -> Result<(), tome_rhi::RhiError> {
//! // Create a semaphore for GPU-to-GPU synchronization
//! let swapchain_semaphore = Semaphore::new(device.clone())?;
//!
//! // Create a fence for GPU-to-CPU synchronization (signaled initially)
//! let render_fence = Fence::new(device.clone(), true)?;
//!
//! // Wait for the fence before starting a new frame
//! render_fence.wait(1_000_000_000)?;
//! render_fence.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiError;

/// Vulkan binary semaphore wrapper.
///
/// Semaphores are used for GPU-to-GPU synchronization between queue operations.
///
/// # Thread Safety
///
/// The semaphore is immutable after creation; the engine only uses it from
/// the render thread.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> Result<Self, RhiError> {
        let create_info = crate::init::semaphore_create_info();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    /// Returns the semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
///
/// Fences allow the CPU to wait for GPU operations to complete.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - If true, the fence starts in the signaled state.
    ///   Per-frame fences start signaled so the first wait does not block.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> Result<Self, RhiError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = crate::init::fence_create_info(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!("Fence created (signaled: {})", signaled);

        Ok(Self { device, fence })
    }

    /// Returns the fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits for the fence to become signaled.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout in nanoseconds
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails or times out.
    pub fn wait(&self, timeout: u64) -> Result<(), RhiError> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?;
        }
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> Result<(), RhiError> {
        unsafe {
            self.device.handle().reset_fences(&[self.fence])?;
        }
        Ok(())
    }

    /// Checks if the fence is signaled without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the status query fails.
    pub fn is_signaled(&self) -> Result<bool, RhiError> {
        let status = unsafe { self.device.handle().get_fence_status(self.fence)? };
        Ok(status)
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

// Safety: the wrapped handles are plain Vulkan handles and the device is
// shared via Arc.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}
unsafe impl Send for Fence {}
unsafe impl Sync for Fence {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
    }
}
