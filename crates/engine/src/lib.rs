//! Tome engine core.
//!
//! This crate owns the engine lifecycle: Vulkan bring-up, the double
//! buffered frame loop, the compute background pass, and ordered teardown.
//!
//! # Overview
//!
//! - [`Engine`] brings the whole rendering stack up in one call and renders
//!   a frame per [`Engine::draw`] call
//! - [`FrameData`] holds the per-frame command and synchronization objects
//! - [`DeletionQueue`] destroys queued resources in reverse push order

pub mod deletion_queue;
pub mod engine;
pub mod frame;

pub use deletion_queue::DeletionQueue;
pub use engine::Engine;
pub use frame::FrameData;

/// Number of frames recorded concurrently (double buffering).
pub const FRAME_OVERLAP: usize = 2;
