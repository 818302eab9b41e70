//! Built-in elementwise and reduction operations every backend provides.

use ipanema_dtype::DType;
use snafu::ensure;

use crate::error::{ArityMismatchSnafu, Result, SizeMismatchSnafu};

/// Elementwise math function, named like its C counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumString, strum::EnumIter, strum::VariantArray, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ElementwiseOp {
    Fabs,
    Ceil,
    Floor,
    Exp,
    Log,
    #[strum(to_string = "log10")]
    Log10,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Fmod,
    Pow,
}

impl ElementwiseOp {
    pub const fn arity(self) -> usize {
        match self {
            Self::Fmod | Self::Pow => 2,
            _ => 1,
        }
    }

    pub fn check_arity(self, actual: usize) -> Result<()> {
        let expected = self.arity();
        ensure!(expected == actual, ArityMismatchSnafu { op: self.to_string(), expected, actual });
        Ok(())
    }

    /// Apply to one value, or to a pair for binary ops (`rhs` is ignored by unary ones).
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Fabs => lhs.abs(),
            Self::Ceil => lhs.ceil(),
            Self::Floor => lhs.floor(),
            Self::Exp => lhs.exp(),
            Self::Log => lhs.ln(),
            Self::Log10 => lhs.log10(),
            Self::Sqrt => lhs.sqrt(),
            Self::Sin => lhs.sin(),
            Self::Cos => lhs.cos(),
            Self::Tan => lhs.tan(),
            Self::Asin => lhs.asin(),
            Self::Acos => lhs.acos(),
            Self::Atan => lhs.atan(),
            Self::Sinh => lhs.sinh(),
            Self::Cosh => lhs.cosh(),
            Self::Tanh => lhs.tanh(),
            Self::Fmod => lhs % rhs,
            Self::Pow => lhs.powf(rhs),
        }
    }

    /// Name of the C math function for `dtype` (`expf` for float32, `exp` for float64).
    pub fn c_function(self, dtype: DType) -> String {
        match dtype {
            DType::Float32 => format!("{self}f"),
            _ => self.to_string(),
        }
    }

    /// Result dtype for the given operand dtypes: float inputs keep their
    /// promoted width, integers are computed in float64.
    pub fn result_dtype(operands: &[DType]) -> DType {
        match DType::least_upper_dtype(operands) {
            Some(dtype) if dtype.is_float() => dtype,
            _ => DType::Float64,
        }
    }
}

/// Shape of the result of combining operands elementwise.
///
/// Operands must have equal element counts, except that single-element
/// operands broadcast against the others.
pub fn broadcast_shape<'a>(shapes: impl IntoIterator<Item = &'a [usize]>) -> Result<Vec<usize>> {
    let mut result: Option<&[usize]> = None;
    for shape in shapes {
        let len = shape.iter().product::<usize>();
        match result {
            None => result = Some(shape),
            Some(current) => {
                let current_len = current.iter().product::<usize>();
                if current_len == 1 && (len != 1 || shape.len() > current.len()) {
                    result = Some(shape);
                } else if len != 1 {
                    ensure!(len == current_len, SizeMismatchSnafu { expected: current_len, actual: len });
                }
            }
        }
    }
    Ok(result.map(<[usize]>::to_vec).unwrap_or_default())
}

/// How values are combined by a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ReduceOp {
    Sum,
    Prod,
    Min,
    Max,
}

impl ReduceOp {
    pub const fn identity(self) -> f64 {
        match self {
            Self::Sum => 0.0,
            Self::Prod => 1.0,
            Self::Min => f64::INFINITY,
            Self::Max => f64::NEG_INFINITY,
        }
    }

    pub fn combine(self, acc: f64, value: f64) -> f64 {
        match self {
            Self::Sum => acc + value,
            Self::Prod => acc * value,
            Self::Min => acc.min(value),
            Self::Max => acc.max(value),
        }
    }

    /// Combine 64-bit integers. Sums and products wrap; `unsigned` compares the bit patterns as `u64`.
    pub fn combine_int(self, acc: i64, value: i64, unsigned: bool) -> i64 {
        match self {
            Self::Sum => acc.wrapping_add(value),
            Self::Prod => acc.wrapping_mul(value),
            Self::Min if unsigned => (acc as u64).min(value as u64) as i64,
            Self::Max if unsigned => (acc as u64).max(value as u64) as i64,
            Self::Min => acc.min(value),
            Self::Max => acc.max(value),
        }
    }
}

/// Transform applied to every element before reducing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MapOp {
    #[default]
    Identity,
    Square,
    Abs,
}

impl MapOp {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::Square => value * value,
            Self::Abs => value.abs(),
        }
    }
}

/// Post-processing of the reduced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Finalize {
    #[default]
    None,
    /// Divide by the element count.
    Mean,
    Sqrt,
}

impl Finalize {
    pub fn apply(self, value: f64, count: usize) -> f64 {
        match self {
            Self::None => value,
            Self::Mean => value / count as f64,
            Self::Sqrt => value.sqrt(),
        }
    }

    /// Stable code passed to device kernels.
    pub const fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Mean => 1,
            Self::Sqrt => 2,
        }
    }
}

/// A full-array reduction: `finalize(reduce(map(x_i)))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReductionKernel {
    pub reduce: ReduceOp,
    pub map: MapOp,
    pub finalize: Finalize,
}

impl ReductionKernel {
    pub const fn new(reduce: ReduceOp, map: MapOp, finalize: Finalize) -> Self {
        Self { reduce, map, finalize }
    }

    /// Plain reduction without mapping or finalization.
    pub const fn direct(reduce: ReduceOp) -> Self {
        Self { reduce, map: MapOp::Identity, finalize: Finalize::None }
    }

    /// Neither mapped nor finalized.
    pub fn is_direct(&self) -> bool {
        self.map == MapOp::Identity && self.finalize == Finalize::None
    }

    /// Whether `input` reduces exactly in 64-bit integer arithmetic.
    pub fn is_integral(&self, input: DType) -> bool {
        input.is_int() && self.is_direct()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let reduced =
            values.iter().fold(self.reduce.identity(), |acc, &value| self.reduce.combine(acc, self.map.apply(value)));
        self.finalize.apply(reduced, values.len())
    }

    /// Direct reduction of integers. An empty input yields 1 for products and 0 otherwise.
    pub fn evaluate_int(&self, values: &[i64], unsigned: bool) -> i64 {
        let empty = if self.reduce == ReduceOp::Prod { 1 } else { 0 };
        values.iter().copied().reduce(|acc, value| self.reduce.combine_int(acc, value, unsigned)).unwrap_or(empty)
    }

    /// Float inputs and direct integer reductions keep their dtype; mapped or
    /// finalized integer reductions produce float64.
    pub fn result_dtype(&self, input: DType) -> DType {
        if input.is_float() || self.is_integral(input) { input } else { DType::Float64 }
    }
}
