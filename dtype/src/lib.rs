//! Element types shared by host arrays, device buffers and kernel arguments.

pub mod array;
pub mod cast;
pub mod error;
pub mod ext;


pub use array::{ArrayData, Element, HostArray, Number, element_count};
pub use error::{Error, Result};
pub use ext::HasDType;

/// Element type of a host array or device buffer.
///
/// Discriminants order the types from most to least specific; the promotion
/// lattice in [`cast`] relies on it when picking a least upper bound.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::Display, strum::EnumString)]
#[derive(enumset::EnumSetType)]
#[strum(ascii_case_insensitive)]
#[enumset(repr = "u32")]
pub enum DType {
    #[strum(to_string = "int8", serialize = "i8")]
    Int8 = 0,
    #[strum(to_string = "uint8", serialize = "u8")]
    UInt8 = 1,
    #[strum(to_string = "int16", serialize = "i16", serialize = "short")]
    Int16 = 2,
    #[strum(to_string = "uint16", serialize = "u16")]
    UInt16 = 3,
    #[strum(to_string = "int32", serialize = "i32", serialize = "int")]
    Int32 = 4,
    #[strum(to_string = "uint32", serialize = "u32")]
    UInt32 = 5,
    #[strum(to_string = "int64", serialize = "i64", serialize = "long")]
    Int64 = 6,
    #[strum(to_string = "uint64", serialize = "u64")]
    UInt64 = 7,
    #[strum(to_string = "float32", serialize = "f32", serialize = "float", serialize = "single")]
    Float32 = 8,
    #[strum(to_string = "float64", serialize = "f64", serialize = "double")]
    Float64 = 9,
}

impl DType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Bytes needed to hold an array of `shape`, failing instead of overflowing.
    pub fn buffer_size(&self, shape: &[usize]) -> Result<usize> {
        array::element_count(shape)?
            .checked_mul(self.bytes())
            .ok_or_else(|| Error::ShapeOverflow { shape: shape.to_vec() })
    }

    /// Width in bits.
    pub const fn bits(&self) -> usize {
        self.bytes() * 8
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// C spelling used by generated kernel source.
    pub const fn c_style(&self) -> &'static str {
        match self {
            Self::Int8 => "signed char",
            Self::UInt8 => "unsigned char",
            Self::Int16 => "short",
            Self::UInt16 => "unsigned short",
            Self::Int32 => "int",
            Self::UInt32 => "unsigned int",
            Self::Int64 => "long long",
            Self::UInt64 => "unsigned long long",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }

    /// Parse a dtype name such as `"float64"`, `"f32"` or `"double"`.
    pub fn parse(name: &str) -> Result<Self> {
        name.trim().parse().map_err(|_| Error::UnknownDType { name: name.to_string() })
    }
}
