//! CUDA backend built on cudarc.
//!
//! Explicit sessions create a dedicated stream on a freshly retained device
//! context; implicit sessions attach to the primary context of device 0 and
//! use its default stream. User source is compiled with NVRTC on every call,
//! the primitive kernels once per session.

pub mod kernels;

use std::cell::Ref;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use cudarc::driver::{CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, PushKernelArg};
use cudarc::nvrtc;
use ipanema_dtype::{ArrayData, DType, HostArray};
use snafu::{OptionExt, ResultExt, ensure};

use crate::allocator::{Allocator, CudaAllocator, RawBuffer, TrackingAllocator};
use crate::buffer::Buffer;
use crate::driver::{DeviceInfo, Driver, Session};
use crate::error::{
    ArityMismatchSnafu, BufferBusySnafu, CompileSnafu, ContextTeardownSnafu, CudaSnafu, DtypeSnafu, InvalidDeviceSnafu, LaunchSnafu,
    NoDeviceFoundSnafu, Result, SymbolNotFoundSnafu,
};
use crate::primitives::{ElementwiseOp, MapOp, ReductionKernel, broadcast_shape};
use crate::program::{KernelArg, LaunchConfig, Module, Program};

const DRIVER_NAME: &str = "cuda";

/// Retain the primary context of `index`.
///
/// cudarc panics when the driver library cannot be loaded; that is reported
/// as an invalid device instead.
fn retain_context(index: usize) -> Result<Arc<CudaContext>> {
    std::panic::catch_unwind(|| CudaContext::new(index))
        .ok()
        .context(InvalidDeviceSnafu { device: "CUDA driver library is not available" })?
        .context(CudaSnafu)
}

fn compile_ptx(source: &str) -> Result<nvrtc::Ptx> {
    nvrtc::compile_ptx(source).map_err(|e| CompileSnafu { reason: e.to_string() }.build())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CudaDriver;

impl CudaDriver {
    fn session(&self, index: usize, stream: impl FnOnce(&Arc<CudaContext>) -> Result<Arc<CudaStream>>) -> Result<CudaSession> {
        let context = retain_context(index)?;
        let name = context.name().context(CudaSnafu)?;
        let stream = stream(&context)?;
        CudaSession::new(DeviceInfo { index, name, driver: DRIVER_NAME }, context, stream)
    }
}

impl Driver for CudaDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn device_count(&self) -> Result<usize> {
        match std::panic::catch_unwind(CudaContext::device_count) {
            Ok(Ok(count)) => Ok(usize::try_from(count).unwrap_or(0)),
            Ok(Err(error)) => {
                tracing::debug!(%error, "CUDA device enumeration failed");
                Ok(0)
            }
            Err(_) => {
                tracing::debug!("CUDA driver library is not available");
                Ok(0)
            }
        }
    }

    fn device_info(&self, index: usize) -> Result<DeviceInfo> {
        let count = self.device_count()?;
        ensure!(index < count, InvalidDeviceSnafu { device: format!("{DRIVER_NAME}:{index}") });
        let name = retain_context(index)?.name().context(CudaSnafu)?;
        Ok(DeviceInfo { index, name, driver: DRIVER_NAME })
    }

    fn open(&self, index: usize) -> Result<Box<dyn Session>> {
        let session = self.session(index, |context| context.new_stream().context(CudaSnafu))?;
        Ok(Box::new(session))
    }

    fn attach(&self) -> Result<Box<dyn Session>> {
        ensure!(self.device_count()? > 0, NoDeviceFoundSnafu { driver: DRIVER_NAME });
        let session = self.session(0, |context| Ok(context.default_stream()))?;
        Ok(Box::new(session))
    }
}

pub struct CudaSession {
    info: DeviceInfo,
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    allocator: Arc<TrackingAllocator>,
    primitives: Arc<CudaModule>,
}

impl fmt::Debug for CudaSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaSession").field("info", &self.info).finish_non_exhaustive()
    }
}

/// A kernel operand converted to the dtype a primitive runs in.
enum Staged<'a> {
    Borrowed(&'a Buffer),
    Owned(Buffer),
}

impl Deref for Staged<'_> {
    type Target = Buffer;

    fn deref(&self) -> &Buffer {
        match self {
            Self::Borrowed(buffer) => buffer,
            Self::Owned(buffer) => buffer,
        }
    }
}

impl CudaSession {
    fn new(info: DeviceInfo, context: Arc<CudaContext>, stream: Arc<CudaStream>) -> Result<Self> {
        let primitives = context.load_module(compile_ptx(&kernels::primitive_source())?).context(CudaSnafu)?;
        let allocator = Arc::new(TrackingAllocator::new(Box::new(CudaAllocator::new(Arc::clone(&stream)))));
        tracing::debug!(device.index = info.index, device.name = %info.name, "CUDA session opened");
        Ok(Self { info, context, stream, allocator, primitives })
    }

    fn primitive(&self, name: &str) -> Result<CudaProgram> {
        let function = self.primitives.load_function(name).ok().context(SymbolNotFoundSnafu { name })?;
        Ok(CudaProgram { function, stream: Arc::clone(&self.stream), name: name.to_string() })
    }

    fn stage<'a>(&self, arg: &KernelArg<'a>, dtype: DType) -> Result<Staged<'a>> {
        match *arg {
            KernelArg::Buffer(buffer) if buffer.dtype() == dtype => Ok(Staged::Borrowed(buffer)),
            KernelArg::Buffer(buffer) => {
                let host = buffer.to_host()?.cast(dtype);
                Ok(Staged::Owned(Buffer::from_host(self.allocator(), &host)?))
            }
            scalar => {
                let host = HostArray::scalar(scalar.scalar().unwrap_or_default()).cast(dtype);
                Ok(Staged::Owned(Buffer::from_host(self.allocator(), &host)?))
            }
        }
    }

    /// Direct integer reduction, accumulated in the 64-bit type of matching signedness.
    fn reduce_integral(&self, kernel: ReductionKernel, input: &Buffer) -> Result<Buffer> {
        let dtype = input.dtype();
        let scalar = |value: i64| -> Result<Buffer> {
            let array = HostArray::new(ArrayData::from_i64(dtype, &[value]), &[]).context(DtypeSnafu)?;
            Buffer::from_host(self.allocator(), &array)
        };
        if input.is_empty() {
            return scalar(kernel.evaluate_int(&[], dtype.is_unsigned()));
        }

        let wide = if dtype.is_unsigned() { DType::UInt64 } else { DType::Int64 };
        let staged = self.stage(&KernelArg::Buffer(input), wide)?;
        let out = Buffer::zeros(self.allocator(), wide, &[])?;
        let program = self.primitive(&kernels::reduction_name(kernel.reduce, MapOp::Identity, wide))?;
        let config = LaunchConfig::new([kernels::REDUCE_THREADS, 1, 1], [1, 1]);
        program.launch(&[KernelArg::Buffer(&staged), KernelArg::Buffer(&out), KernelArg::I64(element_count(&staged))], &config)?;
        if wide == dtype {
            return Ok(out);
        }

        let value = out.to_host()?.data().to_i64_vec();
        scalar(value.first().copied().unwrap_or_default())
    }
}

fn element_count(buffer: &Buffer) -> i64 {
    i64::try_from(buffer.len()).unwrap_or(i64::MAX)
}

impl Session for CudaSession {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocator(&self) -> Arc<dyn Allocator> {
        self.allocator.clone()
    }

    fn compile(&self, source: &str) -> Result<Box<dyn Module>> {
        let module = self.context.load_module(compile_ptx(source)?).context(CudaSnafu)?;
        tracing::debug!(source.len = source.len(), "CUDA module compiled and loaded");
        Ok(Box::new(CudaKernelModule { module, stream: Arc::clone(&self.stream) }))
    }

    fn elementwise(&self, op: ElementwiseOp, args: &[KernelArg<'_>]) -> Result<Buffer> {
        op.check_arity(args.len())?;
        let dtype = ElementwiseOp::result_dtype(&args.iter().map(KernelArg::dtype).collect::<Vec<_>>());
        let operands = args.iter().map(|arg| self.stage(arg, dtype)).collect::<Result<Vec<_>>>()?;
        let shape = broadcast_shape(operands.iter().map(|operand| operand.shape()))?;
        let out = Buffer::zeros(self.allocator(), dtype, &shape)?;

        let n = element_count(&out);
        let blocks = u32::try_from(out.len().div_ceil(kernels::ELEMENTWISE_THREADS as usize)).unwrap_or(u32::MAX);
        let config = LaunchConfig::new([kernels::ELEMENTWISE_THREADS, 1, 1], [blocks.max(1), 1]);
        let program = self.primitive(&kernels::elementwise_name(op, dtype))?;
        match operands.as_slice() {
            [x] => program.launch(&[KernelArg::Buffer(x), KernelArg::Buffer(&out), KernelArg::I64(n)], &config)?,
            [a, b] => program.launch(
                &[
                    KernelArg::Buffer(a),
                    KernelArg::I64(element_count(a)),
                    KernelArg::Buffer(b),
                    KernelArg::I64(element_count(b)),
                    KernelArg::Buffer(&out),
                    KernelArg::I64(n),
                ],
                &config,
            )?,
            _ => return ArityMismatchSnafu { op: op.to_string(), expected: op.arity(), actual: operands.len() }.fail(),
        }
        Ok(out)
    }

    fn reduce(&self, kernel: ReductionKernel, input: &Buffer) -> Result<Buffer> {
        if kernel.is_integral(input.dtype()) {
            return self.reduce_integral(kernel, input);
        }

        let dtype = kernel.result_dtype(input.dtype());
        let staged = self.stage(&KernelArg::Buffer(input), dtype)?;
        let out = Buffer::zeros(self.allocator(), dtype, &[])?;

        let program = self.primitive(&kernels::reduction_name(kernel.reduce, kernel.map, dtype))?;
        let config = LaunchConfig::new([kernels::REDUCE_THREADS, 1, 1], [1, 1]);
        program.launch(
            &[
                KernelArg::Buffer(&staged),
                KernelArg::Buffer(&out),
                KernelArg::I64(element_count(&staged)),
                KernelArg::I32(kernel.finalize.code()),
            ],
            &config,
        )?;
        Ok(out)
    }

    fn live_buffers(&self) -> usize {
        self.allocator.live_buffers()
    }

    fn synchronize(&self) -> Result<()> {
        self.allocator.synchronize()
    }

    fn release(&mut self) -> Result<()> {
        self.synchronize()?;
        let live = self.live_buffers();
        ensure!(live == 0, ContextTeardownSnafu { reason: format!("{live} buffer(s) still allocated") });
        Ok(())
    }
}

#[derive(Debug)]
struct CudaKernelModule {
    module: Arc<CudaModule>,
    stream: Arc<CudaStream>,
}

impl Module for CudaKernelModule {
    fn function(&self, name: &str) -> Result<Box<dyn Program + '_>> {
        let function = self.module.load_function(name).ok().context(SymbolNotFoundSnafu { name })?;
        Ok(Box::new(CudaProgram { function, stream: Arc::clone(&self.stream), name: name.to_string() }))
    }
}

struct CudaProgram {
    function: CudaFunction,
    stream: Arc<CudaStream>,
    name: String,
}

impl fmt::Debug for CudaProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaProgram").field("name", &self.name).finish_non_exhaustive()
    }
}

fn device_slice<'a>(arg: &KernelArg<'a>) -> Result<Option<Ref<'a, CudaSlice<u8>>>> {
    match *arg {
        KernelArg::Buffer(buffer) => match buffer.raw() {
            RawBuffer::Cuda { data, .. } => Ok(Some(data.try_borrow().ok().context(BufferBusySnafu)?)),
            RawBuffer::Cpu { .. } => LaunchSnafu { reason: "buffer does not live in device memory" }.fail(),
        },
        _ => Ok(None),
    }
}

impl Program for CudaProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn launch(&self, args: &[KernelArg<'_>], config: &LaunchConfig) -> Result<()> {
        tracing::debug!(
            kernel.name = %self.name,
            kernel.num_args = args.len(),
            kernel.block = ?config.block,
            kernel.grid = ?config.grid,
            "launching CUDA kernel"
        );

        let slices = args.iter().map(device_slice).collect::<Result<Vec<_>>>()?;
        let mut builder = self.stream.launch_builder(&self.function);
        for (arg, slice) in args.iter().zip(&slices) {
            match (arg, slice) {
                (_, Some(slice)) => builder.arg(&**slice),
                (KernelArg::I32(v), None) => builder.arg(v),
                (KernelArg::I64(v), None) => builder.arg(v),
                (KernelArg::F32(v), None) => builder.arg(v),
                (KernelArg::F64(v), None) => builder.arg(v),
                (KernelArg::Buffer(_), None) => continue,
            };
        }

        let [bx, by, bz] = config.block;
        let [gx, gy] = config.grid;
        let launch = cudarc::driver::LaunchConfig { grid_dim: (gx, gy, 1), block_dim: (bx, by, bz), shared_mem_bytes: 0 };
        // SAFETY: buffer borrows outlive the launch and the stream is synchronized
        // before returning; matching the kernel signature is the caller's contract.
        unsafe { builder.launch(launch) }.context(CudaSnafu)?;
        self.stream.synchronize().context(CudaSnafu)
    }
}
