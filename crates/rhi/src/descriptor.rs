//! Descriptor set management for shader resource binding.
//!
//! This module provides abstractions for Vulkan descriptor management:
//! - [`DescriptorLayoutBuilder`] assembles descriptor set layouts binding
//!   by binding
//! - [`DescriptorSetLayout`] owns the resulting layout handle
//! - [`DescriptorAllocator`] manages a pool sized from declarative
//!   [`PoolSizeRatio`] entries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use tome_rhi::device::Device;
//! use tome_rhi::descriptor::{DescriptorAllocator, DescriptorLayoutBuilder, PoolSizeRatio};
//!
//! # fn example(device: Arc<Device>) -> Result<(), tome_rhi::RhiError> {
//! // Layout with a single storage image at binding 0
//! let layout = DescriptorLayoutBuilder::new()
//!     .add_binding(0, vk::DescriptorType::STORAGE_IMAGE)
//!     .build(device.clone(), vk::ShaderStageFlags::COMPUTE)?;
//!
//! // Pool sized for 10 sets, one storage image per set
//! let ratios = [PoolSizeRatio {
//!     descriptor_type: vk::DescriptorType::STORAGE_IMAGE,
//!     ratio: 1.0,
//! }];
//! let allocator = DescriptorAllocator::new(device, 10, &ratios)?;
//!
//! let set = allocator.allocate(layout.handle())?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Declarative sizing for one descriptor type in a pool.
///
/// The pool reserves `ceil(max_sets * ratio)` descriptors of
/// `descriptor_type`.
#[derive(Clone, Copy, Debug)]
pub struct PoolSizeRatio {
    /// The descriptor type to reserve capacity for.
    pub descriptor_type: vk::DescriptorType,
    /// Descriptors of this type per set, on average.
    pub ratio: f32,
}

/// Converts pool size ratios into concrete pool sizes for `max_sets` sets.
pub fn pool_sizes(max_sets: u32, ratios: &[PoolSizeRatio]) -> Vec<vk::DescriptorPoolSize> {
    ratios
        .iter()
        .map(|r| {
            vk::DescriptorPoolSize::default()
                .ty(r.descriptor_type)
                .descriptor_count((max_sets as f32 * r.ratio).ceil() as u32)
        })
        .collect()
}

/// Builder for descriptor set layouts.
///
/// Bindings are declared with `descriptor_count` 1; the shader stage flags
/// are applied uniformly to every binding when the layout is built.
#[derive(Default)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorLayoutBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding with the given index and descriptor type.
    pub fn add_binding(mut self, binding: u32, descriptor_type: vk::DescriptorType) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1),
        );
        self
    }

    /// Removes all declared bindings.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Returns the number of declared bindings.
    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if no bindings have been declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Builds the descriptor set layout, applying `stage_flags` to every
    /// binding.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn build(
        self,
        device: Arc<Device>,
        stage_flags: vk::ShaderStageFlags,
    ) -> RhiResult<DescriptorSetLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = self
            .bindings
            .into_iter()
            .map(|b| b.stage_flags(stage_flags))
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Descriptor set layout created with {} binding(s)",
            bindings.len()
        );

        Ok(DescriptorSetLayout { device, layout })
    }
}

/// Descriptor set layout wrapper.
///
/// # Thread Safety
///
/// The layout is immutable after creation.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Descriptor set layout destroyed");
    }
}

/// Descriptor pool wrapper with ratio-based sizing.
///
/// Individual sets are not freed; the whole pool is reset with [`clear`]
/// or destroyed on drop.
///
/// [`clear`]: DescriptorAllocator::clear
pub struct DescriptorAllocator {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorAllocator {
    /// Creates a descriptor pool sized for `max_sets` sets using the given
    /// per-type ratios.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(device: Arc<Device>, max_sets: u32, ratios: &[PoolSizeRatio]) -> RhiResult<Self> {
        let sizes = pool_sizes(max_sets, ratios);

        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&sizes);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Descriptor pool created: {} sets, {} type(s)",
            max_sets,
            sizes.len()
        );

        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Allocates a single descriptor set with the given layout.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DescriptorPoolExhausted`] when the pool has no
    /// capacity left, or another error if allocation fails.
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            self.device
                .handle()
                .allocate_descriptor_sets(&alloc_info)
                .map_err(|e| match e {
                    vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                        RhiError::DescriptorPoolExhausted
                    }
                    other => RhiError::from(other),
                })?
        };

        Ok(sets[0])
    }

    /// Resets the pool, returning every allocated set to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn clear(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        }
        Ok(())
    }

    /// Returns the pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Returns the maximum number of sets the pool can allocate.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_descriptor_pool(self.pool, None);
        }
        debug!("Descriptor pool destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_sizes_whole_ratio() {
        let ratios = [PoolSizeRatio {
            descriptor_type: vk::DescriptorType::STORAGE_IMAGE,
            ratio: 1.0,
        }];
        let sizes = pool_sizes(10, &ratios);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::STORAGE_IMAGE);
        assert_eq!(sizes[0].descriptor_count, 10);
    }

    #[test]
    fn test_pool_sizes_fractional_ratio_rounds_up() {
        let ratios = [PoolSizeRatio {
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            ratio: 0.5,
        }];
        let sizes = pool_sizes(3, &ratios);
        assert_eq!(sizes[0].descriptor_count, 2); // ceil(1.5)
    }

    #[test]
    fn test_pool_sizes_multiple_types() {
        let ratios = [
            PoolSizeRatio {
                descriptor_type: vk::DescriptorType::STORAGE_IMAGE,
                ratio: 1.0,
            },
            PoolSizeRatio {
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                ratio: 2.0,
            },
        ];
        let sizes = pool_sizes(4, &ratios);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].descriptor_count, 4);
        assert_eq!(sizes[1].descriptor_count, 8);
    }

    #[test]
    fn test_layout_builder_accumulates_bindings() {
        let builder = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::STORAGE_IMAGE)
            .add_binding(1, vk::DescriptorType::UNIFORM_BUFFER);

        assert_eq!(builder.len(), 2);
        assert_eq!(builder.bindings[0].binding, 0);
        assert_eq!(
            builder.bindings[0].descriptor_type,
            vk::DescriptorType::STORAGE_IMAGE
        );
        assert_eq!(builder.bindings[0].descriptor_count, 1);
        assert_eq!(builder.bindings[1].binding, 1);
    }

    #[test]
    fn test_layout_builder_clear() {
        let mut builder =
            DescriptorLayoutBuilder::new().add_binding(0, vk::DescriptorType::STORAGE_IMAGE);
        builder.clear();
        assert!(builder.is_empty());
    }
}
