use crate::*;
use proptest::prelude::*;
use strum::VariantArray;

pub fn int_dtype() -> impl Strategy<Value = DType> {
    proptest::sample::select(DType::VARIANTS.iter().copied().filter(DType::is_int).collect::<Vec<_>>())
}

pub fn float_dtype() -> impl Strategy<Value = DType> {
    prop_oneof![Just(DType::Float32), Just(DType::Float64)]
}

pub fn any_dtype() -> impl Strategy<Value = DType> {
    proptest::sample::select(DType::VARIANTS)
}

/// Small row-major shapes with up to four dimensions, including 0-d.
pub fn shape() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..6, 0..=4)
}

/// Float64 arrays of arbitrary small shape with finite values.
pub fn f64_array() -> impl Strategy<Value = HostArray> {
    shape().prop_flat_map(|shape| {
        let len = shape.iter().product::<usize>();
        prop::collection::vec(-1.0e6f64..1.0e6, len)
            .prop_map(move |values| HostArray::from_vec(values, &shape).expect("length matches shape"))
    })
}
