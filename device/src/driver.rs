//! Backend entry points: a [`Driver`] enumerates devices and opens
//! [`Session`]s, a session owns one execution context and its queue.

use std::fmt;
use std::sync::Arc;

use crate::allocator::Allocator;
use crate::buffer::Buffer;
use crate::error::Result;
use crate::primitives::{ElementwiseOp, ReductionKernel};
use crate::program::{KernelArg, Module};

/// Description of one enumerated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    /// Name of the driver that enumerated the device.
    pub driver: &'static str,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.index, self.name, self.driver)
    }
}

pub trait Driver: fmt::Debug {
    fn name(&self) -> &'static str;

    fn device_count(&self) -> Result<usize>;

    fn device_info(&self, index: usize) -> Result<DeviceInfo>;

    /// Create a dedicated context and queue on device `index`.
    fn open(&self, index: usize) -> Result<Box<dyn Session>>;

    /// Bind to the context the process already has current.
    fn attach(&self) -> Result<Box<dyn Session>>;
}

/// An execution context on one device.
///
/// All calls are synchronous: they return once device work and any
/// copy-back have completed.
pub trait Session: fmt::Debug {
    fn info(&self) -> &DeviceInfo;

    fn allocator(&self) -> Arc<dyn Allocator>;

    fn compile(&self, source: &str) -> Result<Box<dyn Module>>;

    /// Evaluate a built-in elementwise function into a fresh buffer.
    fn elementwise(&self, op: ElementwiseOp, args: &[KernelArg<'_>]) -> Result<Buffer>;

    /// Reduce a whole buffer into a fresh 0-d buffer.
    fn reduce(&self, kernel: ReductionKernel, input: &Buffer) -> Result<Buffer>;

    /// Number of buffers allocated through this session that are still alive.
    fn live_buffers(&self) -> usize;

    fn synchronize(&self) -> Result<()>;

    /// Release the context. Called at most once, by the owning strategy.
    fn release(&mut self) -> Result<()>;
}
