//! Compute pipeline management.
//!
//! This module handles VkPipeline and VkPipelineLayout creation for the
//! engine's compute passes.
//!
//! # Overview
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout for descriptor set and push
//!   constant configuration
//! - [`Pipeline`] wraps VkPipeline together with its bind point
//! - [`ComputePipelineBuilder`] builds compute pipelines from a shader module
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use tome_rhi::device::Device;
//! use tome_rhi::pipeline::{ComputePipelineBuilder, PipelineLayout};
//!
//! # fn example(
//! #     device: Arc<Device>,
//! #     set_layout: vk::DescriptorSetLayout,
//! #     shader_module: vk::ShaderModule,
//! # ) -> Result<(), tome_rhi::RhiError> {
//! let layout = PipelineLayout::new(device.clone(), &[set_layout], &[])?;
//!
//! let pipeline = ComputePipelineBuilder::new()
//!     .shader(shader_module)
//!     .build(device, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::ffi::{CStr, CString};
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan pipeline layout wrapper.
///
/// A pipeline layout describes the complete set of resources that can be
/// accessed by a pipeline: descriptor set layouts and push constant ranges.
///
/// # Thread Safety
///
/// The pipeline layout is immutable after creation.
pub struct PipelineLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline layout handle.
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a new pipeline layout.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `descriptor_set_layouts` - Slice of descriptor set layout handles
    /// * `push_constant_ranges` - Slice of push constant ranges
    ///
    /// # Errors
    ///
    /// Returns an error if pipeline layout creation fails.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Pipeline layout created with {} set layout(s), {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Vulkan pipeline wrapper.
///
/// Owns the pipeline handle and remembers its bind point.
pub struct Pipeline {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline handle.
    pipeline: vk::Pipeline,
    /// Bind point for this pipeline.
    bind_point: vk::PipelineBindPoint,
}

impl Pipeline {
    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Returns the pipeline bind point.
    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Pipeline destroyed");
    }
}

/// Builder for compute pipelines.
///
/// The shader module is borrowed for pipeline creation only; the caller
/// may destroy it once `build` returns.
pub struct ComputePipelineBuilder {
    shader_module: vk::ShaderModule,
    entry_point: CString,
}

impl Default for ComputePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputePipelineBuilder {
    /// Creates a new builder with entry point `main`.
    pub fn new() -> Self {
        Self {
            shader_module: vk::ShaderModule::null(),
            entry_point: c"main".to_owned(),
        }
    }

    /// Sets the compute shader module.
    pub fn shader(mut self, module: vk::ShaderModule) -> Self {
        self.shader_module = module;
        self
    }

    /// Sets the shader entry point name (defaults to `main`).
    pub fn entry_point(mut self, name: &CStr) -> Self {
        self.entry_point = name.to_owned();
        self
    }

    /// Builds the compute pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] if no shader module was set, or
    /// a Vulkan error if pipeline creation fails.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        if self.shader_module == vk::ShaderModule::null() {
            return Err(RhiError::PipelineError(
                "Compute pipeline requires a shader module".to_string(),
            ));
        }

        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(self.shader_module)
            .name(&self.entry_point);

        let create_info = vk::ComputePipelineCreateInfo::default()
            .layout(layout.handle())
            .stage(stage_info);

        let pipelines = unsafe {
            device
                .handle()
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| RhiError::from(result))?
        };

        info!("Compute pipeline created");

        Ok(Pipeline {
            device,
            pipeline: pipelines[0],
            bind_point: vk::PipelineBindPoint::COMPUTE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ComputePipelineBuilder::new();
        assert_eq!(builder.shader_module, vk::ShaderModule::null());
        assert_eq!(builder.entry_point.as_c_str(), c"main");
    }

    #[test]
    fn test_builder_entry_point_override() {
        let builder = ComputePipelineBuilder::new().entry_point(c"cs_main");
        assert_eq!(builder.entry_point.as_c_str(), c"cs_main");
    }
}
