//! Type-directed conversion of host values into kernel arguments.

use std::fmt;

use ipanema_device::{Buffer, KernelArg, Session};
use ipanema_dtype::{DType, HostArray, Number};
use snafu::ResultExt;

use crate::error::{DeviceSnafu, Result, TypeMismatchSnafu};
use crate::executor::OutputDescriptor;

/// A positional host value handed to `run` or a primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Array(HostArray),
    /// Integer scalar together with the width it was given in.
    Int { value: i64, dtype: DType },
    /// Floating scalar together with the width it was given in.
    Float { value: f64, dtype: DType },
    /// Plain sequence of numbers, materialized as an array before upload.
    Sequence(Vec<Number>),
}

/// Kind of an [`Argument`], for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Array(DType),
    Int(DType),
    Float(DType),
    Sequence,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array(dtype) => write!(f, "{dtype} array"),
            Self::Int(dtype) | Self::Float(dtype) => write!(f, "{dtype} scalar"),
            Self::Sequence => f.write_str("sequence"),
        }
    }
}

impl Argument {
    /// Value for an output position; it is never marshalled.
    pub fn placeholder() -> Self {
        Self::Sequence(Vec::new())
    }

    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Array(array) => ArgKind::Array(array.dtype()),
            Self::Int { dtype, .. } => ArgKind::Int(*dtype),
            Self::Float { dtype, .. } => ArgKind::Float(*dtype),
            Self::Sequence(_) => ArgKind::Sequence,
        }
    }
}

impl From<HostArray> for Argument {
    fn from(array: HostArray) -> Self {
        Self::Array(array)
    }
}

impl From<Vec<Number>> for Argument {
    fn from(numbers: Vec<Number>) -> Self {
        Self::Sequence(numbers)
    }
}

impl From<Vec<f64>> for Argument {
    fn from(values: Vec<f64>) -> Self {
        Self::Sequence(values.into_iter().map(Number::from).collect())
    }
}

impl From<Vec<i64>> for Argument {
    fn from(values: Vec<i64>) -> Self {
        Self::Sequence(values.into_iter().map(Number::from).collect())
    }
}

macro_rules! scalar_argument {
    ($variant:ident($repr:ty): $($ty:ty => $dtype:ident),* $(,)?) => {
        $(impl From<$ty> for Argument {
            fn from(value: $ty) -> Self {
                Self::$variant { value: value as $repr, dtype: DType::$dtype }
            }
        })*
    };
}

scalar_argument!(Int(i64): i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64);
scalar_argument!(Int(i64): u8 => UInt8, u16 => UInt16, u32 => UInt32, u64 => UInt64);
scalar_argument!(Float(f64): f32 => Float32, f64 => Float64);

/// A marshalled input, owning any device memory it needs.
#[derive(Debug)]
pub enum Marshalled {
    Buffer(Buffer),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Marshalled {
    pub fn as_arg(&self) -> KernelArg<'_> {
        match self {
            Self::Buffer(buffer) => KernelArg::Buffer(buffer),
            Self::I32(v) => KernelArg::I32(*v),
            Self::I64(v) => KernelArg::I64(*v),
            Self::F32(v) => KernelArg::F32(*v),
            Self::F64(v) => KernelArg::F64(*v),
        }
    }
}

/// Moves host values onto the device of one session.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentMarshaller<'s> {
    session: &'s dyn Session,
}

impl<'s> ArgumentMarshaller<'s> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self { session }
    }

    /// Convert the argument at `position` into something a kernel accepts.
    ///
    /// Arrays and sequences are uploaded; scalars must be 32 or 64 bits wide
    /// and signed when integral.
    pub fn marshal_input(&self, position: usize, argument: &Argument) -> Result<Marshalled> {
        let kind = argument.kind();
        let marshalled = match *argument {
            Argument::Array(ref array) => Marshalled::Buffer(self.upload(array)?),
            Argument::Sequence(ref numbers) => Marshalled::Buffer(self.upload(&HostArray::from_numbers(numbers))?),
            Argument::Int { value, dtype: DType::Int32 } => Marshalled::I32(value as i32),
            Argument::Int { value, dtype: DType::Int64 } => Marshalled::I64(value),
            Argument::Float { value, dtype: DType::Float32 } => Marshalled::F32(value as f32),
            Argument::Float { value, dtype: DType::Float64 } => Marshalled::F64(value),
            Argument::Int { .. } => {
                return TypeMismatchSnafu {
                    position,
                    kind: kind.to_string(),
                    reason: "integer scalars must be int32 or int64",
                }
                .fail();
            }
            Argument::Float { .. } => {
                return TypeMismatchSnafu {
                    position,
                    kind: kind.to_string(),
                    reason: "floating scalars must be float32 or float64",
                }
                .fail();
            }
        };
        tracing::debug!(arg.position = position, arg.kind = %kind, "argument marshalled");
        Ok(marshalled)
    }

    pub fn upload(&self, array: &HostArray) -> Result<Buffer> {
        Buffer::from_host(self.session.allocator(), array).context(DeviceSnafu { operation: "upload" })
    }

    /// Zero-initialized device buffer for an output.
    pub fn allocate_output(&self, descriptor: &OutputDescriptor) -> Result<Buffer> {
        Buffer::zeros(self.session.allocator(), descriptor.dtype, &descriptor.shape)
            .context(DeviceSnafu { operation: "output allocation" })
    }

    pub fn retrieve(&self, buffer: &Buffer) -> Result<HostArray> {
        buffer.to_host().context(DeviceSnafu { operation: "copy back" })
    }
}
