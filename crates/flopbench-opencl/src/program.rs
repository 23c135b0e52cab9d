//! Kernel source loading and compilation.

use crate::error::{CompilationError, ResourceError};
use opencl3::context::Context;
use opencl3::kernel::Kernel;
use opencl3::program::Program;
use std::path::Path;
use tracing::info;

/// Kernel source text together with where it came from, for diagnostics.
#[derive(Debug, Clone)]
pub struct KernelSource {
    text: String,
    origin: String,
}

impl KernelSource {
    /// Source compiled into the binary.
    #[must_use]
    pub fn embedded(text: &str) -> Self {
        Self { text: text.to_owned(), origin: "embedded".to_owned() }
    }

    /// Source read from an external file.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self { text, origin: path.display().to_string() })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Compile `source` for `context`.
///
/// On failure the driver's build log is carried verbatim; it is the only
/// useful diagnostic a kernel author gets.
pub fn compile_program(
    context: &Context,
    source: &KernelSource,
) -> Result<Program, CompilationError> {
    match Program::create_and_build_from_source(context, source.text(), "") {
        Ok(program) => {
            info!("compiled kernel program from {}", source.origin());
            Ok(program)
        }
        Err(log) => Err(CompilationError { build_log: log.to_string() }),
    }
}

/// Create a kernel object for the named entry point.
pub fn create_kernel(program: &Program, name: &str) -> Result<Kernel, ResourceError> {
    Kernel::create(program, name)
        .map_err(|e| ResourceError::Kernel { name: name.to_owned(), status: e.0 })
}
