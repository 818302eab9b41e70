use std::mem::ManuallyDrop;
use std::sync::Arc;

use ipanema_dtype::{DType, HostArray};
use smallvec::SmallVec;
use snafu::{OptionExt, ResultExt, ensure};

use crate::allocator::{Allocator, BufferOptions, RawBuffer};
use crate::error::{BufferBusySnafu, DtypeSnafu, Result, SizeMismatchSnafu};

#[cfg(feature = "cuda")]
use crate::error::CudaSnafu;

/// A typed device allocation.
///
/// The memory goes back to the allocator that produced it when the buffer
/// is dropped, so a failed operation never leaves device memory behind.
#[derive(Debug)]
pub struct Buffer {
    raw: ManuallyDrop<RawBuffer>,
    allocator: Arc<dyn Allocator>,
    /// Size of the payload in bytes.
    size: usize,
    dtype: DType,
    /// Shape of the array (stack-allocated for 0-4D arrays).
    shape: SmallVec<[usize; 4]>,
}

impl Buffer {
    pub fn allocate(
        allocator: Arc<dyn Allocator>,
        dtype: DType,
        shape: &[usize],
        options: &BufferOptions,
    ) -> Result<Self> {
        let size = dtype.buffer_size(shape).context(DtypeSnafu)?;
        let raw = allocator.alloc(size, options)?;
        Ok(Self { raw: ManuallyDrop::new(raw), allocator, size, dtype, shape: SmallVec::from_slice(shape) })
    }

    /// Zero-initialized buffer, used for kernel outputs.
    pub fn zeros(allocator: Arc<dyn Allocator>, dtype: DType, shape: &[usize]) -> Result<Self> {
        Self::allocate(allocator, dtype, shape, &BufferOptions::zeroed())
    }

    /// Upload a host array into a fresh buffer of the same dtype and shape.
    pub fn from_host(allocator: Arc<dyn Allocator>, array: &HostArray) -> Result<Self> {
        let mut buffer = Self::allocate(allocator, array.dtype(), array.shape(), &BufferOptions::default())?;
        buffer.copyin(array.as_bytes())?;
        Ok(buffer)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the size of this buffer in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the allocator used by this buffer.
    pub fn allocator(&self) -> &dyn Allocator {
        &*self.allocator
    }

    pub(crate) fn raw(&self) -> &RawBuffer {
        &self.raw
    }

    /// Copy data from host memory into this buffer.
    pub fn copyin(&mut self, src: &[u8]) -> Result<()> {
        let expected = self.size;
        let actual = src.len();
        ensure!(expected == actual, SizeMismatchSnafu { expected, actual });

        match &*self.raw {
            RawBuffer::Cpu { words, .. } => {
                let mut words = words.try_borrow_mut().ok().context(BufferBusySnafu)?;
                bytemuck::cast_slice_mut::<u64, u8>(&mut words[..])[..expected].copy_from_slice(src);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, stream, .. } => {
                if expected == 0 {
                    return Ok(());
                }
                let mut data = data.try_borrow_mut().ok().context(BufferBusySnafu)?;
                let mut view = data.slice_mut(0..expected);
                stream.memcpy_htod(src, &mut view).context(CudaSnafu)
            }
        }
    }

    /// Copy data from this buffer to host memory.
    pub fn copyout(&self, dst: &mut [u8]) -> Result<()> {
        let expected = self.size;
        let actual = dst.len();
        ensure!(expected == actual, SizeMismatchSnafu { expected, actual });

        match &*self.raw {
            RawBuffer::Cpu { words, .. } => {
                let words = words.try_borrow().ok().context(BufferBusySnafu)?;
                dst.copy_from_slice(&bytemuck::cast_slice::<u64, u8>(&words[..])[..expected]);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, stream, .. } => {
                if expected == 0 {
                    return Ok(());
                }
                let data = data.try_borrow().ok().context(BufferBusySnafu)?;
                let view = data.slice(0..expected);
                stream.memcpy_dtoh(&view, dst).context(CudaSnafu)?;
                stream.synchronize().context(CudaSnafu)
            }
        }
    }

    /// Copy the contents back into a host array of the same dtype and shape.
    pub fn to_host(&self) -> Result<HostArray> {
        let mut bytes = vec![0u8; self.size];
        self.copyout(&mut bytes)?;
        HostArray::from_bytes(self.dtype, &self.shape, &bytes).context(DtypeSnafu)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // SAFETY: `raw` is never touched again after this point.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        self.allocator.free(raw);
    }
}
