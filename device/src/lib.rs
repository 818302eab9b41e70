//! Device layer: contexts, memory, compiled programs and built-in primitives.
//!
//! Two backends implement [`Driver`]: the always-available [`host::HostDriver`]
//! (C compiled with clang, loaded with `dlopen`) and, with the `cuda` feature,
//! [`cuda::CudaDriver`] (NVRTC + the CUDA driver API through cudarc).

pub mod allocator;
pub mod buffer;
pub mod context;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod driver;
pub mod error;
pub mod host;
pub mod primitives;
pub mod program;
pub mod selection;

#[cfg(test)]
pub mod test;

pub use allocator::{Allocator, BufferOptions, CpuAllocator, RawBuffer, TrackingAllocator};
#[cfg(feature = "cuda")]
pub use allocator::CudaAllocator;
pub use buffer::Buffer;
pub use context::{ContextState, ContextStrategy, DeviceContext, ExplicitStrategy, ImplicitStrategy};
pub use driver::{DeviceInfo, Driver, Session};
pub use error::{Error, Result};
pub use primitives::{ElementwiseOp, Finalize, MapOp, ReduceOp, ReductionKernel};
pub use program::{KernelArg, LaunchConfig, Module, Program};
pub use selection::{ConsolePrompt, DeviceSelector, Selection, SelectionPrompt};
