//! Engine lifecycle and frame loop.
//!
//! [`Engine::new`] brings up the full Vulkan stack for a window: instance,
//! surface, device, swapchain, offscreen draw image, per-frame command and
//! sync objects, descriptors, and the background compute pipeline. Each
//! [`Engine::draw`] call renders one frame: the compute pass fills the draw
//! image, which is then blitted into the acquired swapchain image and
//! presented.
//!
//! Teardown is ordered: the GPU is drained, per-frame resources go first,
//! then the global deletion queue unwinds init in reverse, then swapchain,
//! surface, device, and instance are destroyed explicitly.

use std::mem::ManuallyDrop;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ash::vk;
use tracing::{error, info, warn};

use tome_platform::{Surface, Window, get_required_extensions};
use tome_rhi::descriptor::{DescriptorAllocator, DescriptorLayoutBuilder, PoolSizeRatio};
use tome_rhi::device::{Device, create_allocator};
use tome_rhi::image::{AllocatedImage, copy_image_to_image, transition_image};
use tome_rhi::instance::Instance;
use tome_rhi::physical_device::select_physical_device;
use tome_rhi::pipeline::{ComputePipelineBuilder, PipelineLayout};
use tome_rhi::shader::ShaderSession;
use tome_rhi::swapchain::Swapchain;
use tome_rhi::{RhiError, init};

use crate::deletion_queue::DeletionQueue;
use crate::frame::FrameData;
use crate::FRAME_OVERLAP;

/// Whether to request the Khronos validation layer at instance creation.
pub const USE_VALIDATION_LAYERS: bool = true;

/// Timeout for fence waits and image acquisition, in nanoseconds.
pub const GPU_TIMEOUT_NS: u64 = 1_000_000_000;

/// Workgroup size of the background compute shader, per axis.
const BACKGROUND_WORKGROUP_SIZE: u32 = 16;

/// Process-wide flag enforcing the single-engine invariant.
static ENGINE_EXISTS: AtomicBool = AtomicBool::new(false);

/// Guard holding the process-wide engine slot.
///
/// Dropping the guard releases the slot, including on failed init.
struct EngineSlot;

impl EngineSlot {
    /// Claims the slot.
    ///
    /// # Panics
    ///
    /// Panics if another [`Engine`] currently exists.
    fn acquire() -> Self {
        if ENGINE_EXISTS
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            panic!("only one Engine may exist per process");
        }
        Self
    }
}

impl Drop for EngineSlot {
    fn drop(&mut self) {
        ENGINE_EXISTS.store(false, Ordering::Release);
    }
}

/// The rendering engine.
///
/// Owns the whole Vulkan stack for one window. At most one engine may exist
/// per process; a second [`Engine::new`] panics while the first is alive.
pub struct Engine {
    _slot: EngineSlot,

    instance: ManuallyDrop<Instance>,
    surface: ManuallyDrop<Surface>,
    device: ManuallyDrop<Arc<Device>>,
    swapchain: ManuallyDrop<Swapchain>,

    /// Init-time resources, destroyed in reverse creation order.
    global_deletion_queue: DeletionQueue,

    frames: Vec<FrameData>,
    frame_number: u64,

    // Raw handles into resources owned by the global deletion queue.
    draw_image: vk::Image,
    draw_extent: vk::Extent2D,
    draw_descriptor_set: vk::DescriptorSet,
    background_pipeline: vk::Pipeline,
    background_pipeline_layout: vk::PipelineLayout,

    /// Kept alive for later shader recompilation.
    #[allow(dead_code)]
    shader_session: ShaderSession,
}

impl Engine {
    /// Initializes the engine for the given window.
    ///
    /// Bring-up order: instance, surface, physical and logical device,
    /// allocator, swapchain, draw image, per-frame commands and sync,
    /// descriptors, shader compiler, background pipeline. Any failure
    /// unwinds everything created so far.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage of Vulkan bring-up fails, including
    /// when the background shader `gradient.comp` is missing or does not
    /// compile.
    ///
    /// # Panics
    ///
    /// Panics if another engine already exists in this process.
    pub fn new(window: &Window) -> Result<Self, RhiError> {
        let slot = EngineSlot::acquire();

        info!("Initializing engine");

        let display_handle = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {e}")))?;
        let surface_extensions = get_required_extensions(display_handle.as_raw())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let instance = Instance::new(USE_VALIDATION_LAYERS, &surface_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;

        let device = Device::new(&instance, &physical_device_info)?;

        let mut global_deletion_queue = DeletionQueue::new();

        let allocator = create_allocator(&instance, &device)?;
        {
            let allocator = Arc::clone(&allocator);
            global_deletion_queue.push(move || {
                info!("Deleting allocator");
                drop(allocator);
            });
        }

        let swapchain = Swapchain::new(
            &instance,
            Arc::clone(&device),
            surface.handle(),
            window.width(),
            window.height(),
        )?;

        // Offscreen render target. High precision so the compute pass can
        // write linear values; the blit converts to the swapchain format.
        let draw_image = AllocatedImage::new(
            Arc::clone(&device),
            Arc::clone(&allocator),
            vk::Format::R16G16B16A16_SFLOAT,
            vk::Extent3D {
                width: window.width(),
                height: window.height(),
                depth: 1,
            },
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::STORAGE
                | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::ImageAspectFlags::COLOR,
        )?;
        let draw_image_handle = draw_image.image();
        let draw_image_view = draw_image.view();
        let draw_extent = draw_image.extent_2d();
        global_deletion_queue.push(move || {
            info!("Deleting image");
            drop(draw_image);
        });

        let mut frames = Vec::with_capacity(FRAME_OVERLAP);
        for _ in 0..FRAME_OVERLAP {
            frames.push(FrameData::new(Arc::clone(&device))?);
        }
        info!("Per-frame resources created ({} frames in flight)", FRAME_OVERLAP);

        // Descriptors: one storage image at binding 0 for the compute pass.
        let ratios = [PoolSizeRatio {
            descriptor_type: vk::DescriptorType::STORAGE_IMAGE,
            ratio: 1.0,
        }];
        let descriptor_allocator = DescriptorAllocator::new(Arc::clone(&device), 10, &ratios)?;

        let draw_image_layout = DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::STORAGE_IMAGE)
            .build(Arc::clone(&device), vk::ShaderStageFlags::COMPUTE)?;

        let draw_descriptor_set = descriptor_allocator.allocate(draw_image_layout.handle())?;

        let image_info = [vk::DescriptorImageInfo::default()
            .image_layout(vk::ImageLayout::GENERAL)
            .image_view(draw_image_view)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(draw_descriptor_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
            .image_info(&image_info);
        unsafe {
            device.handle().update_descriptor_sets(&[write], &[]);
        }

        let draw_image_layout_handle = draw_image_layout.handle();
        global_deletion_queue.push(move || drop(descriptor_allocator));
        global_deletion_queue.push(move || drop(draw_image_layout));

        let shader_session = ShaderSession::new(vec![
            PathBuf::from("shaders"),
            PathBuf::from("../tome_engine/shaders"),
        ])?;

        let background_layout =
            PipelineLayout::new(Arc::clone(&device), &[draw_image_layout_handle], &[])?;

        let gradient_module = shader_session
            .load_shader_module(&device, "gradient.comp")
            .ok_or_else(|| {
                RhiError::ShaderError(
                    "Background shader 'gradient.comp' missing or failed to compile".to_string(),
                )
            })?;

        let pipeline_result = ComputePipelineBuilder::new()
            .shader(gradient_module)
            .build(Arc::clone(&device), &background_layout);

        // The module is only needed for pipeline creation.
        unsafe {
            device.handle().destroy_shader_module(gradient_module, None);
        }

        let background = pipeline_result?;

        let background_pipeline = background.handle();
        let background_pipeline_layout = background_layout.handle();
        global_deletion_queue.push(move || drop(background_layout));
        global_deletion_queue.push(move || drop(background));

        info!("Engine initialized");

        Ok(Self {
            _slot: slot,
            instance: ManuallyDrop::new(instance),
            surface: ManuallyDrop::new(surface),
            device: ManuallyDrop::new(device),
            swapchain: ManuallyDrop::new(swapchain),
            global_deletion_queue,
            frames,
            frame_number: 0,
            draw_image: draw_image_handle,
            draw_extent,
            draw_descriptor_set,
            background_pipeline,
            background_pipeline_layout,
            shader_session,
        })
    }

    /// Returns the number of frames rendered so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Returns the offscreen draw extent.
    #[inline]
    pub fn draw_extent(&self) -> vk::Extent2D {
        self.draw_extent
    }

    /// Renders and presents one frame.
    ///
    /// Waits for this frame slot's previous use to finish on the GPU, then
    /// acquires a swapchain image, records the compute pass and blit, submits,
    /// and presents. A suboptimal swapchain is tolerated with a warning; any
    /// Vulkan error code is fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if a fence wait times out or any Vulkan call fails.
    pub fn draw(&mut self) -> Result<(), RhiError> {
        let device = Arc::clone(&self.device);
        let frame_index = (self.frame_number as usize) % FRAME_OVERLAP;

        // Wait until the GPU has finished with this frame slot, then reclaim
        // its transient resources.
        {
            let frame = &mut self.frames[frame_index];
            frame.render_fence.wait(GPU_TIMEOUT_NS)?;
            frame.deletion_queue.flush();
            frame.render_fence.reset()?;
        }

        let frame = &self.frames[frame_index];

        let (image_index, suboptimal_acquire) = self
            .swapchain
            .acquire_next_image(frame.swapchain_semaphore.handle(), GPU_TIMEOUT_NS)?;
        if suboptimal_acquire {
            warn!("Swapchain suboptimal at acquire");
        }

        let cmd = frame.command_buffer;
        let swapchain_image = self.swapchain.image(image_index as usize);

        unsafe {
            device
                .handle()
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;

            let begin_info =
                init::command_buffer_begin_info(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.handle().begin_command_buffer(cmd, &begin_info)?;
        }

        // Compute pass writes the draw image in GENERAL layout.
        transition_image(
            device.handle(),
            cmd,
            self.draw_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::GENERAL,
        );

        self.draw_background(device.handle(), cmd);

        // Blit draw image -> swapchain image.
        transition_image(
            device.handle(),
            cmd,
            self.draw_image,
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );
        transition_image(
            device.handle(),
            cmd,
            swapchain_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );

        copy_image_to_image(
            device.handle(),
            cmd,
            self.draw_image,
            swapchain_image,
            self.draw_extent,
            self.swapchain.extent(),
        );

        transition_image(
            device.handle(),
            cmd,
            swapchain_image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );

        unsafe {
            device.handle().end_command_buffer(cmd)?;
        }

        // Submit: wait for the acquired image, signal render completion,
        // fence the frame slot.
        let cmd_infos = [init::command_buffer_submit_info(cmd)];
        let wait_infos = [init::semaphore_submit_info(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            frame.swapchain_semaphore.handle(),
        )];
        let signal_infos = [init::semaphore_submit_info(
            vk::PipelineStageFlags2::ALL_GRAPHICS,
            frame.render_semaphore.handle(),
        )];
        let submit = init::submit_info(&cmd_infos, &signal_infos, &wait_infos);

        unsafe {
            device.handle().queue_submit2(
                device.graphics_queue(),
                &[submit],
                frame.render_fence.handle(),
            )?;
        }

        let suboptimal_present = self.swapchain.present(
            device.graphics_queue(),
            image_index,
            frame.render_semaphore.handle(),
        )?;
        if suboptimal_present {
            warn!("Swapchain suboptimal at present");
        }

        self.frame_number += 1;
        Ok(())
    }

    /// Records the background compute pass into `cmd`.
    ///
    /// Dispatches one workgroup per 16x16 tile of the draw image.
    fn draw_background(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        let (groups_x, groups_y) = dispatch_group_counts(self.draw_extent);

        unsafe {
            device.cmd_bind_pipeline(
                cmd,
                vk::PipelineBindPoint::COMPUTE,
                self.background_pipeline,
            );
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::COMPUTE,
                self.background_pipeline_layout,
                0,
                &[self.draw_descriptor_set],
                &[],
            );
            device.cmd_dispatch(cmd, groups_x, groups_y, 1);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        info!("Shutting down engine");

        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {e}");
        }

        for frame in &mut self.frames {
            frame.deletion_queue.flush();
        }
        self.frames.clear();

        self.global_deletion_queue.flush();

        // Remaining teardown must run in dependency order.
        unsafe {
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Engine shut down");
    }
}

/// Number of compute workgroups needed to cover `extent` with the
/// background shader's 16x16 workgroup.
fn dispatch_group_counts(extent: vk::Extent2D) -> (u32, u32) {
    (
        extent.width.div_ceil(BACKGROUND_WORKGROUP_SIZE),
        extent.height.div_ceil(BACKGROUND_WORKGROUP_SIZE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_group_counts_round_up() {
        let (x, y) = dispatch_group_counts(vk::Extent2D {
            width: 1700,
            height: 900,
        });
        assert_eq!((x, y), (107, 57));
    }

    #[test]
    fn test_dispatch_group_counts_exact_multiple() {
        let (x, y) = dispatch_group_counts(vk::Extent2D {
            width: 1600,
            height: 800,
        });
        assert_eq!((x, y), (100, 50));
    }

    #[test]
    fn test_engine_slot_alternates() {
        {
            let _slot = EngineSlot::acquire();
            assert!(ENGINE_EXISTS.load(Ordering::Acquire));
        }
        assert!(!ENGINE_EXISTS.load(Ordering::Acquire));

        // Reacquirable after release.
        let _slot = EngineSlot::acquire();
    }

    #[test]
    fn test_gpu_timeout_is_one_second() {
        assert_eq!(GPU_TIMEOUT_NS, 1_000_000_000);
    }

    #[test]
    fn test_frame_slot_alternates() {
        let slots: Vec<usize> = (0u64..4)
            .map(|frame_number| (frame_number as usize) % FRAME_OVERLAP)
            .collect();
        assert_eq!(slots, vec![0, 1, 0, 1]);
    }
}
