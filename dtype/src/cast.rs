use super::*;
use enumset::EnumSet;

impl DType {
    const fn promotion_lattice(self) -> &'static [Self] {
        use DType::*;
        match self {
            Int8 => &[Int16],
            UInt8 => &[Int16, UInt16],
            Int16 => &[Int32, Float32],
            UInt16 => &[Int32, UInt32, Float32],
            Int32 => &[Int64],
            UInt32 => &[Int64, UInt64],
            Int64 => &[Float64],
            UInt64 => &[Float64],
            Float32 => &[Float64],
            Float64 => &[],
        }
    }

    fn recursive_parents(self) -> EnumSet<Self> {
        self.promotion_lattice().iter().fold(EnumSet::only(self), |dtypes, &parent| dtypes.union(parent.recursive_parents()))
    }

    /// Check if casting from `self` to `to` preserves every value.
    pub fn can_safe_cast(self, to: Self) -> bool {
        if self == to {
            return true;
        }

        let from_bytes = self.bytes();
        let to_bytes = to.bytes();
        match (self.is_unsigned(), self.is_signed(), self.is_float(), to.is_unsigned(), to.is_signed(), to.is_float()) {
            (true, _, _, true, _, _) => from_bytes < to_bytes,
            (_, true, _, _, true, _) => from_bytes <= to_bytes,
            (true, _, _, _, true, _) => from_bytes < to_bytes,
            // Integers up to 32 bits fit in a double mantissa, up to 16 bits in a float one.
            (_, _, false, _, _, true) => from_bytes * 2 <= to_bytes,
            (_, _, true, _, _, true) => from_bytes < to_bytes,
            _ => false,
        }
    }

    /// Smallest dtype every input promotes to, following NumPy-style rules.
    ///
    /// Returns `None` only for an empty input.
    pub fn least_upper_dtype(dtypes: &[Self]) -> Option<Self> {
        dtypes.iter().map(|d| d.recursive_parents()).reduce(|lhs, rhs| lhs.intersection(rhs))?.iter().min()
    }
}
