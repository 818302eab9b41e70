//! Error types for fragment composition, marshalling and execution.

use std::path::PathBuf;

use snafu::Snafu;

use crate::dispatch::Library;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while composing or running programs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("fragment '{name}' not found"))]
    FragmentNotFound { name: String },

    #[snafu(display("failed to read fragment from {}: {source}", path.display()))]
    FragmentRead { path: PathBuf, source: std::io::Error },

    /// An argument cannot be passed to a kernel or primitive.
    #[snafu(display("argument {position} ({kind}) not admitted: {reason}"))]
    TypeMismatch { position: usize, kind: String, reason: String },

    #[snafu(display("output position {position} has no shape/dtype descriptor"))]
    MissingOutputDescriptor { position: usize },

    #[snafu(display("output position {position} is out of range for {count} arguments"))]
    OutputPositionOutOfRange { position: usize, count: usize },

    /// Compilation of the composite source or entry point lookup failed.
    #[snafu(display("failed to build entry point '{entry}': {source}"))]
    CompileError { entry: String, source: ipanema_device::Error },

    #[snafu(display("operation '{name}' not implemented by the {library} library"))]
    OperationNotFound { library: Library, name: String },

    /// A factory reduction was applied directly instead of being instantiated first.
    #[snafu(display("reduction '{name}' must be instantiated before use"))]
    CallShape { name: String },

    #[snafu(display("{operation} failed: {source}"))]
    Device { operation: String, source: ipanema_device::Error },

    #[snafu(display("{source}"))]
    Dtype { source: ipanema_dtype::Error },
}
