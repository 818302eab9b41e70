//! Host backend: every "device" is the local CPU.
//!
//! User kernels are compiled as C and loaded as shared libraries (see
//! [`compiler`]); built-in primitives run natively.

pub mod compiler;
mod primitives;

use std::sync::Arc;

use snafu::ensure;

use crate::allocator::{Allocator, CpuAllocator, TrackingAllocator};
use crate::buffer::Buffer;
use crate::driver::{DeviceInfo, Driver, Session};
use crate::error::{ContextTeardownSnafu, InvalidDeviceSnafu, NoDeviceFoundSnafu, Result};
use crate::primitives::{ElementwiseOp, ReductionKernel};
use crate::program::{KernelArg, Module};

pub use compiler::{HostModule, LAUNCH_PRELUDE};

pub const DEFAULT_COMPILER: &str = "clang";

const DRIVER_NAME: &str = "host";

#[derive(Debug, Clone)]
pub struct HostDriver {
    devices: usize,
    compiler: String,
}

impl Default for HostDriver {
    fn default() -> Self {
        Self::new(1)
    }
}

impl HostDriver {
    /// Driver exposing `devices` host devices.
    pub fn new(devices: usize) -> Self {
        Self { devices, compiler: DEFAULT_COMPILER.to_string() }
    }

    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = compiler.into();
        self
    }

    pub fn compiler(&self) -> &str {
        &self.compiler
    }
}

impl Driver for HostDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn device_count(&self) -> Result<usize> {
        Ok(self.devices)
    }

    fn device_info(&self, index: usize) -> Result<DeviceInfo> {
        ensure!(index < self.devices, InvalidDeviceSnafu { device: format!("{DRIVER_NAME}:{index}") });
        Ok(DeviceInfo { index, name: format!("Host CPU {index}"), driver: DRIVER_NAME })
    }

    fn open(&self, index: usize) -> Result<Box<dyn Session>> {
        let info = self.device_info(index)?;
        Ok(Box::new(HostSession::new(info, self.compiler.clone())))
    }

    fn attach(&self) -> Result<Box<dyn Session>> {
        ensure!(self.devices > 0, NoDeviceFoundSnafu { driver: DRIVER_NAME });
        self.open(0)
    }
}

#[derive(Debug)]
pub struct HostSession {
    info: DeviceInfo,
    compiler: String,
    allocator: Arc<TrackingAllocator>,
}

impl HostSession {
    pub fn new(info: DeviceInfo, compiler: String) -> Self {
        Self { info, compiler, allocator: Arc::new(TrackingAllocator::new(Box::new(CpuAllocator))) }
    }
}

impl Session for HostSession {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocator(&self) -> Arc<dyn Allocator> {
        self.allocator.clone()
    }

    fn compile(&self, source: &str) -> Result<Box<dyn Module>> {
        Ok(Box::new(HostModule::compile(&self.compiler, source)?))
    }

    fn elementwise(&self, op: ElementwiseOp, args: &[KernelArg<'_>]) -> Result<Buffer> {
        primitives::elementwise(self.allocator(), op, args)
    }

    fn reduce(&self, kernel: ReductionKernel, input: &Buffer) -> Result<Buffer> {
        primitives::reduce(self.allocator(), kernel, input)
    }

    fn live_buffers(&self) -> usize {
        self.allocator.live_buffers()
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let live = self.live_buffers();
        ensure!(live == 0, ContextTeardownSnafu { reason: format!("{live} buffer(s) still allocated") });
        Ok(())
    }
}
