use snafu::Snafu;

use crate::DType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Element count does not match the product of the shape.
    #[snafu(display("shape {shape:?} holds {expected} elements, got {actual}"))]
    ShapeMismatch { shape: Vec<usize>, expected: usize, actual: usize },

    #[snafu(display("{len} bytes is not a whole number of {dtype} elements"))]
    ByteLength { dtype: DType, len: usize },

    #[snafu(display("unknown element type '{name}'"))]
    UnknownDType { name: String },

    /// The element or byte count of a shape does not fit in `usize`.
    #[snafu(display("shape {shape:?} is too large to address"))]
    ShapeOverflow { shape: Vec<usize> },

    /// A scalar was requested from an array holding more than one element.
    #[snafu(display("expected a single element, array has shape {shape:?}"))]
    NotScalar { shape: Vec<usize> },
}
