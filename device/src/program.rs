//! Compiled modules, resolved entry points and their launch arguments.

use ipanema_dtype::DType;

use crate::buffer::Buffer;
use crate::error::Result;

/// A positional kernel argument after marshalling.
#[derive(Debug, Clone, Copy)]
pub enum KernelArg<'a> {
    Buffer(&'a Buffer),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl KernelArg<'_> {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Buffer(buffer) => buffer.dtype(),
            Self::I32(_) => DType::Int32,
            Self::I64(_) => DType::Int64,
            Self::F32(_) => DType::Float32,
            Self::F64(_) => DType::Float64,
        }
    }

    /// Scalar value widened to `f64`, `None` for buffers.
    pub fn scalar(&self) -> Option<f64> {
        match *self {
            Self::Buffer(_) => None,
            Self::I32(v) => Some(v.into()),
            Self::I64(v) => Some(v as f64),
            Self::F32(v) => Some(v.into()),
            Self::F64(v) => Some(v),
        }
    }
}

/// Block and grid geometry of a launch.
///
/// Passed through to the backend as given; device limits are not checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub block: [u32; 3],
    pub grid: [u32; 2],
}

impl LaunchConfig {
    pub const fn new(block: [u32; 3], grid: [u32; 2]) -> Self {
        Self { block, grid }
    }

    /// Threads per block.
    pub fn threads(&self) -> u64 {
        self.block.iter().map(|&d| u64::from(d)).product()
    }

    pub fn blocks(&self) -> u64 {
        self.grid.iter().map(|&d| u64::from(d)).product()
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self { block: [256, 1, 1], grid: [1, 1] }
    }
}

/// A compiled unit of source code.
pub trait Module: std::fmt::Debug {
    /// Resolve an entry point by name.
    fn function(&self, name: &str) -> Result<Box<dyn Program + '_>>;
}

/// A resolved kernel entry point.
pub trait Program: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Launch with positional arguments and block until the kernel completes.
    fn launch(&self, args: &[KernelArg<'_>], config: &LaunchConfig) -> Result<()>;
}
