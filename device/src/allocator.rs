use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "cuda")]
use std::sync::Arc;

#[cfg(feature = "cuda")]
use cudarc::driver::{CudaSlice, CudaStream};
#[cfg(feature = "cuda")]
use snafu::ResultExt;

#[cfg(feature = "cuda")]
use crate::error::CudaSnafu;
use crate::error::Result;

/// Opaque handle to device memory.
///
/// Uses `RefCell` for interior mutability with runtime borrow checking.
/// Host memory is stored as 64-bit words so any element type is aligned
/// when a compiled kernel reinterprets the pointer.
#[derive(Debug)]
pub enum RawBuffer {
    Cpu {
        words: RefCell<Box<[u64]>>,
        size: usize,
    },
    #[cfg(feature = "cuda")]
    Cuda {
        data: RefCell<CudaSlice<u8>>,
        stream: Arc<CudaStream>,
        size: usize,
    },
}

impl RawBuffer {
    /// Get the size of the buffer in bytes.
    pub fn size(&self) -> usize {
        match self {
            RawBuffer::Cpu { size, .. } => *size,
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { size, .. } => *size,
        }
    }
}

/// Options for buffer allocation.
#[derive(Debug, Clone, Default)]
pub struct BufferOptions {
    /// Whether to zero-initialize the buffer.
    pub zero_init: bool,
}

impl BufferOptions {
    pub const fn zeroed() -> Self {
        Self { zero_init: true }
    }
}

pub trait Allocator: Send + Sync + std::fmt::Debug {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer>;
    fn free(&self, _buffer: RawBuffer) {}
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &str;
}

/// CPU allocator using system memory. Allocations are always zeroed.
#[derive(Debug, Clone)]
pub struct CpuAllocator;

impl Allocator for CpuAllocator {
    fn alloc(&self, size: usize, _options: &BufferOptions) -> Result<RawBuffer> {
        let words = vec![0u64; size.div_ceil(8)].into_boxed_slice();
        Ok(RawBuffer::Cpu { words: RefCell::new(words), size })
    }

    fn name(&self) -> &str {
        "CPU"
    }
}

/// CUDA allocator bound to one stream of an open context.
#[cfg(feature = "cuda")]
#[derive(Debug, Clone)]
pub struct CudaAllocator {
    stream: Arc<CudaStream>,
}

#[cfg(feature = "cuda")]
impl CudaAllocator {
    pub fn new(stream: Arc<CudaStream>) -> Self {
        Self { stream }
    }
}

#[cfg(feature = "cuda")]
impl Allocator for CudaAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        // Zero-byte device allocations are rejected by the driver.
        let len = size.max(1);
        let data = if options.zero_init {
            self.stream.alloc_zeros::<u8>(len)
        } else {
            unsafe { self.stream.alloc::<u8>(len) }
        }
        .context(CudaSnafu)?;

        Ok(RawBuffer::Cuda { data: RefCell::new(data), stream: Arc::clone(&self.stream), size })
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize().context(CudaSnafu)
    }

    fn name(&self) -> &str {
        "CUDA"
    }
}

/// Allocator wrapper that counts live allocations.
///
/// Sessions hand this out so callers can check that failed operations
/// leave no device memory behind.
#[derive(Debug)]
pub struct TrackingAllocator {
    inner: Box<dyn Allocator>,
    live: AtomicUsize,
    live_bytes: AtomicUsize,
}

impl TrackingAllocator {
    pub fn new(inner: Box<dyn Allocator>) -> Self {
        Self { inner, live: AtomicUsize::new(0), live_bytes: AtomicUsize::new(0) }
    }

    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }
}

impl Allocator for TrackingAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        let buffer = self.inner.alloc(size, options)?;
        self.live.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(size, Ordering::Relaxed);
        Ok(buffer)
    }

    fn free(&self, buffer: RawBuffer) {
        self.live.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(buffer.size(), Ordering::Relaxed);
        self.inner.free(buffer);
    }

    fn synchronize(&self) -> Result<()> {
        self.inner.synchronize()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
