//! Host-resident n-dimensional arrays.
//!
//! `HostArray` is the host side of every transfer: inputs are uploaded from it,
//! kernel outputs and primitive results are copied back into it. Storage is a
//! typed `Vec<T>` per element type so slices are always properly aligned.

use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::error::{ByteLengthSnafu, NotScalarSnafu, Result, ShapeMismatchSnafu, ShapeOverflowSnafu};
use crate::{DType, HasDType};

/// Rust primitive usable as an array element.
pub trait Element: HasDType + bytemuck::Pod {
    fn slice(data: &ArrayData) -> Option<&[Self]>;
    fn wrap(values: Vec<Self>) -> ArrayData;
}

macro_rules! array_data {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Typed element storage, one variant per [`DType`].
        #[derive(Debug, Clone, PartialEq)]
        pub enum ArrayData {
            $($variant(Vec<$ty>),)*
        }

        impl ArrayData {
            pub fn dtype(&self) -> DType {
                match self {
                    $(Self::$variant(_) => DType::$variant,)*
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(Self::$variant(values) => values.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            pub fn as_bytes(&self) -> &[u8] {
                match self {
                    $(Self::$variant(values) => bytemuck::cast_slice(values),)*
                }
            }

            pub fn zeros(dtype: DType, len: usize) -> Self {
                match dtype {
                    $(DType::$variant => Self::$variant(vec![<$ty>::default(); len]),)*
                }
            }

            /// Reinterpret raw little-endian bytes; the length must be a whole number of elements.
            pub fn from_bytes(dtype: DType, bytes: &[u8]) -> Result<Self> {
                ensure!(bytes.len() % dtype.bytes() == 0, ByteLengthSnafu { dtype, len: bytes.len() });
                Ok(match dtype {
                    $(DType::$variant => {
                        let mut values = vec![<$ty>::default(); bytes.len() / dtype.bytes()];
                        bytemuck::cast_slice_mut::<$ty, u8>(&mut values).copy_from_slice(bytes);
                        Self::$variant(values)
                    })*
                })
            }

            /// Lossy conversion through `f64`, used by host-side math.
            pub fn to_f64_vec(&self) -> Vec<f64> {
                match self {
                    $(Self::$variant(values) => values.iter().map(|&v| v as f64).collect(),)*
                }
            }

            /// Integer view through `i64`; 64-bit unsigned values keep their bit pattern.
            pub fn to_i64_vec(&self) -> Vec<i64> {
                match self {
                    $(Self::$variant(values) => values.iter().map(|&v| v as i64).collect(),)*
                }
            }

            /// Build storage of `dtype` from `i64` values, wrapping like an `as` cast.
            pub fn from_i64(dtype: DType, values: &[i64]) -> Self {
                match dtype {
                    $(DType::$variant => Self::$variant(values.iter().map(|&v| v as $ty).collect()),)*
                }
            }

            /// Build storage of `dtype` from `f64` values, saturating like an `as` cast.
            pub fn from_f64(dtype: DType, values: &[f64]) -> Self {
                match dtype {
                    $(DType::$variant => Self::$variant(values.iter().map(|&v| v as $ty).collect()),)*
                }
            }
        }

        $(
            impl Element for $ty {
                fn slice(data: &ArrayData) -> Option<&[Self]> {
                    match data {
                        ArrayData::$variant(values) => Some(values),
                        _ => None,
                    }
                }

                fn wrap(values: Vec<Self>) -> ArrayData {
                    ArrayData::$variant(values)
                }
            }
        )*
    };
}

array_data! {
    Int8(i8), UInt8(u8), Int16(i16), UInt16(u16), Int32(i32), UInt32(u32),
    Int64(i64), UInt64(u64), Float32(f32), Float64(f64),
}

/// Number of elements of `shape`, failing instead of overflowing.
pub fn element_count(shape: &[usize]) -> Result<usize> {
    if shape.contains(&0) {
        return Ok(0);
    }
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim)).context(ShapeOverflowSnafu { shape: shape.to_vec() })
}

/// A number inside a plain sequence argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int(_) => DType::Int64,
            Self::Float(_) => DType::Float64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

macro_rules! number_from {
    ($variant:ident: $($ty:ty),*) => {
        $(impl From<$ty> for Number {
            fn from(value: $ty) -> Self {
                Self::$variant(value.into())
            }
        })*
    };
}

number_from!(Int: i8, i16, i32, i64, u8, u16, u32);
number_from!(Float: f32, f64);

/// Host array with an element type and a row-major shape.
///
/// A shape of `[]` denotes a 0-d array holding exactly one element.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    data: ArrayData,
    shape: SmallVec<[usize; 4]>,
}

impl HostArray {
    pub fn new(data: ArrayData, shape: &[usize]) -> Result<Self> {
        let expected = element_count(shape)?;
        let actual = data.len();
        ensure!(expected == actual, ShapeMismatchSnafu { shape: shape.to_vec(), expected, actual });
        Ok(Self { data, shape: SmallVec::from_slice(shape) })
    }

    pub fn from_vec<T: Element>(values: Vec<T>, shape: &[usize]) -> Result<Self> {
        Self::new(T::wrap(values), shape)
    }

    /// One-dimensional array copied from `values`.
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        Self { data: T::wrap(values.to_vec()), shape: SmallVec::from_slice(&[values.len()]) }
    }

    /// Zero-dimensional array.
    pub fn scalar<T: Element>(value: T) -> Self {
        Self { data: T::wrap(vec![value]), shape: SmallVec::new() }
    }

    pub fn zeros(dtype: DType, shape: &[usize]) -> Result<Self> {
        let len = element_count(shape)?;
        Ok(Self { data: ArrayData::zeros(dtype, len), shape: SmallVec::from_slice(shape) })
    }

    pub fn from_bytes(dtype: DType, shape: &[usize], bytes: &[u8]) -> Result<Self> {
        Self::new(ArrayData::from_bytes(dtype, bytes)?, shape)
    }

    /// Materialize a plain sequence: all-integer input becomes `int64`, anything else `float64`.
    pub fn from_numbers(numbers: &[Number]) -> Self {
        let dtypes: Vec<DType> = numbers.iter().map(Number::dtype).collect();
        match DType::least_upper_dtype(&dtypes).unwrap_or(DType::Float64) {
            DType::Int64 => Self::from_slice(
                &numbers.iter().map(|n| if let Number::Int(v) = n { *v } else { 0 }).collect::<Vec<i64>>(),
            ),
            _ => Self::from_slice(&numbers.iter().map(Number::as_f64).collect::<Vec<f64>>()),
        }
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the element storage in bytes.
    pub fn nbytes(&self) -> usize {
        self.len() * self.dtype().bytes()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    /// Typed view of the elements, `None` when `T` is not the array's dtype.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.to_f64_vec()
    }

    /// The single element of a 0-d or one-element array, as `f64`.
    pub fn item(&self) -> Result<f64> {
        ensure!(self.len() == 1, NotScalarSnafu { shape: self.shape.to_vec() });
        Ok(self.to_f64_vec()[0])
    }

    /// Convert to another dtype through `f64`.
    pub fn cast(&self, dtype: DType) -> Self {
        if dtype == self.dtype() {
            return self.clone();
        }
        Self { data: ArrayData::from_f64(dtype, &self.to_f64_vec()), shape: self.shape.clone() }
    }

    pub fn reshape(self, shape: &[usize]) -> Result<Self> {
        Self::new(self.data, shape)
    }
}

impl<T: Element> From<Vec<T>> for HostArray {
    fn from(values: Vec<T>) -> Self {
        let len = values.len();
        Self { data: T::wrap(values), shape: SmallVec::from_slice(&[len]) }
    }
}
