//! Runtime GLSL shader compilation.
//!
//! This module wraps the `shaderc` compiler for compiling GLSL source files
//! to SPIR-V at engine startup and creating VkShaderModules from the result.
//!
//! # Overview
//!
//! - [`ShaderSession`] owns a shaderc compiler instance and an ordered list
//!   of search paths
//! - Shaders are looked up by file name; the first search path containing
//!   the file wins
//! - Loading is lenient: a missing or uncompilable shader returns `None`
//!   with a warning, and callers decide whether that is fatal
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tome_rhi::device::Device;
//! use tome_rhi::shader::ShaderSession;
//!
//! # fn example(device: Arc<Device>) -> Result<(), tome_rhi::RhiError> {
//! let session = ShaderSession::new(vec!["shaders".into()])?;
//!
//! if let Some(module) = session.load_shader_module(&device, "gradient.comp") {
//!     // use the module, destroy it when done
//!     # let _ = module;
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use ash::vk;
use shaderc::{CompileOptions, Compiler, EnvVersion, ShaderKind, SpirvVersion, TargetEnv};
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Shader compiler session with search paths.
///
/// Holds the shaderc compiler for the lifetime of the engine so repeated
/// compilations do not pay the initialization cost.
pub struct ShaderSession {
    compiler: Compiler,
    search_paths: Vec<PathBuf>,
}

impl ShaderSession {
    /// Creates a new shader session.
    ///
    /// # Arguments
    ///
    /// * `search_paths` - Directories searched in order for shader files
    ///
    /// # Errors
    ///
    /// Returns an error if the shaderc compiler cannot be initialized.
    pub fn new(search_paths: Vec<PathBuf>) -> RhiResult<Self> {
        let compiler = Compiler::new()
            .ok_or_else(|| RhiError::ShaderError("Failed to initialize shaderc".to_string()))?;

        info!(
            "Shader compiler initialized with {} search path(s)",
            search_paths.len()
        );
        for path in &search_paths {
            debug!("Shader search path: {}", path.display());
        }

        Ok(Self {
            compiler,
            search_paths,
        })
    }

    /// Resolves a shader file name against the search paths.
    ///
    /// Returns the first existing path, or `None` if the file is not found
    /// in any search path.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Compiles a GLSL source file to SPIR-V.
    ///
    /// The shader kind is inferred from the file extension (`.comp`,
    /// `.vert`, `.frag`). Compilation targets Vulkan 1.2 / SPIR-V 1.5 with
    /// entry point `main`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the extension is
    /// unknown, or compilation fails.
    pub fn compile(&self, path: &Path) -> RhiResult<Vec<u32>> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            RhiError::ShaderError(format!("Failed to read {}: {e}", path.display()))
        })?;

        let kind = shader_kind_from_path(path).ok_or_else(|| {
            RhiError::ShaderError(format!(
                "Unknown shader extension: {}",
                path.display()
            ))
        })?;

        let mut options = CompileOptions::new()
            .ok_or_else(|| RhiError::ShaderError("Failed to create compile options".to_string()))?;
        options.set_target_env(TargetEnv::Vulkan, EnvVersion::Vulkan1_2 as u32);
        options.set_target_spirv(SpirvVersion::V1_5);

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("shader");

        let artifact = self
            .compiler
            .compile_into_spirv(&source, kind, file_name, "main", Some(&options))
            .map_err(|e| RhiError::ShaderError(format!("{file_name}: {e}")))?;

        if artifact.get_num_warnings() > 0 {
            warn!(
                "{}: {} warning(s): {}",
                file_name,
                artifact.get_num_warnings(),
                artifact.get_warning_messages().trim()
            );
        }

        debug!(
            "Compiled {} ({} words of SPIR-V)",
            file_name,
            artifact.as_binary().len()
        );

        Ok(artifact.as_binary().to_vec())
    }

    /// Loads and compiles a shader by name, creating a VkShaderModule.
    ///
    /// Lenient by design: returns `None` with a warning if the file is not
    /// found, does not compile, or module creation fails. The caller owns
    /// the returned module and must destroy it.
    pub fn load_shader_module(&self, device: &Device, name: &str) -> Option<vk::ShaderModule> {
        let path = match self.resolve(name) {
            Some(path) => path,
            None => {
                warn!("Shader '{name}' not found in any search path");
                return None;
            }
        };

        let spirv = match self.compile(&path) {
            Ok(spirv) => spirv,
            Err(e) => {
                warn!("Failed to compile shader '{name}': {e}");
                return None;
            }
        };

        let create_info = vk::ShaderModuleCreateInfo::default().code(&spirv);

        match unsafe { device.handle().create_shader_module(&create_info, None) } {
            Ok(module) => {
                info!("Shader module created from '{}'", path.display());
                Some(module)
            }
            Err(e) => {
                warn!("Failed to create shader module for '{name}': {e}");
                None
            }
        }
    }

    /// Returns the configured search paths.
    #[inline]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

/// Infers the shaderc shader kind from a file extension.
fn shader_kind_from_path(path: &Path) -> Option<ShaderKind> {
    match path.extension()?.to_str()? {
        "comp" => Some(ShaderKind::Compute),
        "vert" => Some(ShaderKind::Vertex),
        "frag" => Some(ShaderKind::Fragment),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_kind_from_extension() {
        assert_eq!(
            shader_kind_from_path(Path::new("gradient.comp")),
            Some(ShaderKind::Compute)
        );
        assert_eq!(
            shader_kind_from_path(Path::new("mesh.vert")),
            Some(ShaderKind::Vertex)
        );
        assert_eq!(
            shader_kind_from_path(Path::new("mesh.frag")),
            Some(ShaderKind::Fragment)
        );
        assert_eq!(shader_kind_from_path(Path::new("mesh.glsl")), None);
        assert_eq!(shader_kind_from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_resolve_finds_file_in_search_path() {
        let dir = std::env::temp_dir().join("tome_shader_test_resolve");
        std::fs::create_dir_all(&dir).unwrap();
        let shader_path = dir.join("test.comp");
        std::fs::write(&shader_path, "#version 460\nvoid main() {}\n").unwrap();

        let session = ShaderSession::new(vec![
            PathBuf::from("/nonexistent_dir_for_test"),
            dir.clone(),
        ])
        .unwrap();

        assert_eq!(session.resolve("test.comp"), Some(shader_path));
        assert_eq!(session.resolve("missing.comp"), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_compile_valid_compute_shader() {
        let dir = std::env::temp_dir().join("tome_shader_test_compile");
        std::fs::create_dir_all(&dir).unwrap();
        let shader_path = dir.join("noop.comp");
        std::fs::write(
            &shader_path,
            "#version 460\nlayout(local_size_x = 16, local_size_y = 16) in;\nvoid main() {}\n",
        )
        .unwrap();

        let session = ShaderSession::new(vec![dir.clone()]).unwrap();
        let spirv = session.compile(&shader_path).unwrap();

        // SPIR-V magic number
        assert_eq!(spirv[0], 0x0723_0203);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_compile_rejects_unknown_extension() {
        let dir = std::env::temp_dir().join("tome_shader_test_ext");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("shader.hlsl");
        std::fs::write(&path, "void main() {}").unwrap();

        let session = ShaderSession::new(vec![dir.clone()]).unwrap();
        assert!(session.compile(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
