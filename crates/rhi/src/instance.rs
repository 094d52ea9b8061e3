//! Vulkan instance bring-up.
//!
//! [`Instance`] loads the Vulkan library, creates a VkInstance targeting
//! API 1.3, and optionally attaches the Khronos validation layer with a
//! debug messenger that forwards driver diagnostics into `tracing`.
//!
//! The caller supplies the surface extensions for its windowing backend
//! (queried from the window via `ash_window`); this module only appends
//! the debug-utils extension when validation is active.
//!
//! # Example
//!
//! ```no_run
//! use tome_rhi::instance::Instance;
//!
//! # fn example(surface_extensions: &[*const i8]) -> Result<(), tome_rhi::RhiError> {
//! let instance = Instance::new(true, surface_extensions)?;
//! let vk_instance = instance.handle();
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::RhiError;

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the VkInstance plus the optional validation debug messenger.
///
/// Dropping the instance tears the messenger down first, then the
/// instance itself.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl Instance {
    /// Loads Vulkan and creates an instance for API version 1.3.
    ///
    /// Validation is best-effort: when `enable_validation` is set but the
    /// Khronos layer is not installed, instance creation proceeds without
    /// it after a warning.
    ///
    /// # Arguments
    ///
    /// * `enable_validation` - Request the validation layer and debug
    ///   messenger
    /// * `surface_extensions` - Instance extensions required by the window
    ///   backend, as returned by the platform layer
    ///
    /// # Errors
    ///
    /// Returns an error if the Vulkan library cannot be loaded, or if
    /// instance or debug messenger creation fails.
    pub fn new(
        enable_validation: bool,
        surface_extensions: &[*const i8],
    ) -> Result<Self, RhiError> {
        let entry = unsafe { Entry::load()? };

        let validation_active = enable_validation && validation_layer_present(&entry)?;
        if enable_validation && !validation_active {
            warn!("Khronos validation layer not installed, continuing without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"Tome App")
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Tome Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_3);

        let extensions = assemble_extensions(surface_extensions, validation_active);
        let layers: Vec<*const i8> = if validation_active {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!(
            "Vulkan 1.3 instance created ({} extension(s), validation: {})",
            extensions.len(),
            validation_active
        );

        let (debug_utils, debug_messenger) = if validation_active {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = create_debug_messenger(&loader)?;
            debug!("Validation debug messenger attached");
            (Some(loader), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether the validation messenger is active.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.debug_messenger.is_some()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(loader), Some(messenger)) = (&self.debug_utils, self.debug_messenger) {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Builds the enabled-extension list from the platform's surface
/// extensions, appending debug utils when validation is active.
fn assemble_extensions(
    surface_extensions: &[*const i8],
    with_debug_utils: bool,
) -> Vec<*const i8> {
    let mut extensions = surface_extensions.to_vec();
    if with_debug_utils {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    extensions
}

/// Checks whether the Khronos validation layer can be enabled.
fn validation_layer_present(entry: &Entry) -> Result<bool, RhiError> {
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };

    Ok(layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER_NAME
    }))
}

/// Registers the tracing-backed debug messenger.
///
/// Only warnings and errors are requested from the driver; routine INFO
/// chatter stays off.
fn create_debug_messenger(
    loader: &ash::ext::debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT, RhiError> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };
    Ok(messenger)
}

/// Forwards validation layer messages into `tracing`.
///
/// # Safety
///
/// Invoked by the Vulkan loader; the callback data pointer is only
/// dereferenced after a null check, per the debug-utils contract.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let Some(data) = (unsafe { p_callback_data.as_ref() }) else {
        return vk::FALSE;
    };

    let message = if data.p_message.is_null() {
        std::borrow::Cow::Borrowed("<empty>")
    } else {
        unsafe { CStr::from_ptr(data.p_message).to_string_lossy() }
    };

    let kind = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "general",
    };

    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("vulkan {kind}: {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("vulkan {kind}: {message}"),
        _ => debug!("vulkan {kind}: {message}"),
    }

    // Never abort the triggering call.
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_extensions_passthrough_without_validation() {
        let surface = [c"VK_KHR_surface".as_ptr(), c"VK_KHR_xlib_surface".as_ptr()];
        let extensions = assemble_extensions(&surface, false);
        assert_eq!(extensions, surface.to_vec());
    }

    #[test]
    fn test_assemble_extensions_appends_debug_utils() {
        let surface = [c"VK_KHR_surface".as_ptr()];
        let extensions = assemble_extensions(&surface, true);
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[1], ash::ext::debug_utils::NAME.as_ptr());
    }

    #[test]
    fn test_validation_layer_name() {
        assert_eq!(
            VALIDATION_LAYER_NAME.to_bytes(),
            b"VK_LAYER_KHRONOS_validation"
        );
    }
}
