//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance and device creation
//! - Swapchain management
//! - Image allocation, layout transitions, and blits
//! - Descriptor pool and set layout management
//! - Runtime shader compilation and compute pipeline creation
//! - Synchronization primitives

mod error;

pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod init;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
