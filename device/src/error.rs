use ipanema_dtype::DType;
use snafu::Snafu;

use crate::context::ContextState;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The driver enumerated zero devices.
    #[snafu(display("no {driver} devices found"))]
    NoDeviceFound { driver: String },

    /// Invalid device specification.
    #[snafu(display("invalid device: {device}"))]
    InvalidDevice { device: String },

    #[snafu(display("device selection cancelled"))]
    SelectionCancelled,

    #[snafu(display("no valid device chosen after {attempts} attempts"))]
    SelectionExhausted { attempts: usize },

    #[snafu(display("failed to read device selection: {source}"))]
    Prompt { source: std::io::Error },

    #[snafu(display("device context is {state}"))]
    ContextInactive { state: ContextState },

    #[snafu(display("compilation failed: {reason}"))]
    Compile { reason: String },

    /// Entry point missing from a compiled module.
    #[snafu(display("function '{name}' not found in module"))]
    SymbolNotFound { name: String },

    #[snafu(display("kernel launch failed: {reason}"))]
    Launch { reason: String },

    #[snafu(display("size mismatch: expected {expected}, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// The same buffer was bound twice, or is borrowed elsewhere during a launch.
    #[snafu(display("buffer is already in use"))]
    BufferBusy,

    #[snafu(display("{op} does not support {dtype}"))]
    UnsupportedDType { op: String, dtype: DType },

    #[snafu(display("{op} takes {expected} argument(s), got {actual}"))]
    ArityMismatch { op: String, expected: usize, actual: usize },

    #[snafu(display("context teardown failed: {reason}"))]
    ContextTeardown { reason: String },

    #[cfg(feature = "cuda")]
    /// CUDA-specific errors.
    #[snafu(display("CUDA error: {source}"))]
    Cuda { source: cudarc::driver::DriverError },

    #[snafu(display("{source}"))]
    Dtype { source: ipanema_dtype::Error },
}
