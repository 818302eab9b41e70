use std::str::FromStr;
use std::sync::Arc;

use ipanema_dtype::{DType, HostArray};
use test_case::test_case;

use crate::host::HostDriver;
use crate::primitives::broadcast_shape;
use crate::{Buffer, Driver, ElementwiseOp, Error, Finalize, KernelArg, MapOp, ReduceOp, ReductionKernel, Session};

fn session() -> Box<dyn Session> {
    HostDriver::new(1).open(0).unwrap()
}

fn upload(session: &dyn Session, array: &HostArray) -> Buffer {
    Buffer::from_host(session.allocator(), array).unwrap()
}

#[test_case("exp", ElementwiseOp::Exp)]
#[test_case("fabs", ElementwiseOp::Fabs)]
#[test_case("log10", ElementwiseOp::Log10)]
#[test_case("fmod", ElementwiseOp::Fmod)]
#[test_case("asin", ElementwiseOp::Asin)]
fn op_names(name: &str, op: ElementwiseOp) {
    assert_eq!(ElementwiseOp::from_str(name).unwrap(), op);
    assert_eq!(op.to_string(), name);
}

#[test]
fn c_function_names() {
    assert_eq!(ElementwiseOp::Exp.c_function(DType::Float32), "expf");
    assert_eq!(ElementwiseOp::Pow.c_function(DType::Float64), "pow");
}

#[test]
fn result_dtypes() {
    assert_eq!(ElementwiseOp::result_dtype(&[DType::Float32]), DType::Float32);
    assert_eq!(ElementwiseOp::result_dtype(&[DType::Int32]), DType::Float64);
    assert_eq!(ElementwiseOp::result_dtype(&[DType::Float32, DType::Float64]), DType::Float64);
}

#[test]
fn broadcast_rejects_mismatched_lengths() {
    let err = broadcast_shape([&[3usize][..], &[4usize][..]]).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch { expected: 3, actual: 4 }));
}

#[test_case(ReductionKernel::direct(ReduceOp::Sum), 6.0; "sum")]
#[test_case(ReductionKernel::direct(ReduceOp::Prod), -36.0; "prod")]
#[test_case(ReductionKernel::direct(ReduceOp::Min), -3.0; "min")]
#[test_case(ReductionKernel::direct(ReduceOp::Max), 6.0; "max")]
#[test_case(ReductionKernel::new(ReduceOp::Sum, MapOp::Identity, Finalize::Mean), 1.5; "mean")]
#[test_case(ReductionKernel::new(ReduceOp::Sum, MapOp::Square, Finalize::Sqrt), 50f64.sqrt(); "norm")]
#[test_case(ReductionKernel::new(ReduceOp::Sum, MapOp::Abs, Finalize::None), 12.0; "abs_sum")]
fn reduction_kernels(kernel: ReductionKernel, expected: f64) {
    let value = kernel.evaluate(&[1.0, 2.0, -3.0, 6.0]);
    assert!((value - expected).abs() < 1e-12, "{value} != {expected}");
}

#[test_case(ReduceOp::Sum, 6; "sum")]
#[test_case(ReduceOp::Prod, -36; "prod")]
#[test_case(ReduceOp::Min, -3; "min")]
#[test_case(ReduceOp::Max, 6; "max")]
fn integer_reductions(reduce: ReduceOp, expected: i64) {
    assert_eq!(ReductionKernel::direct(reduce).evaluate_int(&[1, 2, -3, 6], false), expected);
}

#[test]
fn integer_reductions_compare_unsigned_bit_patterns() {
    let values = [u64::MAX as i64, 1];
    assert_eq!(ReductionKernel::direct(ReduceOp::Max).evaluate_int(&values, true) as u64, u64::MAX);
    assert_eq!(ReductionKernel::direct(ReduceOp::Min).evaluate_int(&values, true), 1);
    assert_eq!(ReductionKernel::direct(ReduceOp::Max).evaluate_int(&values, false), 1);
}

#[test]
fn integer_reductions_wrap_and_handle_empty_input() {
    assert_eq!(ReductionKernel::direct(ReduceOp::Sum).evaluate_int(&[i64::MAX, 1], false), i64::MIN);
    assert_eq!(ReductionKernel::direct(ReduceOp::Prod).evaluate_int(&[], false), 1);
    assert_eq!(ReductionKernel::direct(ReduceOp::Max).evaluate_int(&[], false), 0);
}

#[test]
fn reduction_result_dtypes() {
    let mean = ReductionKernel::new(ReduceOp::Sum, MapOp::Identity, Finalize::Mean);
    let abs_sum = ReductionKernel::new(ReduceOp::Sum, MapOp::Abs, Finalize::None);
    assert_eq!(ReductionKernel::direct(ReduceOp::Max).result_dtype(DType::Int64), DType::Int64);
    assert_eq!(ReductionKernel::direct(ReduceOp::Sum).result_dtype(DType::UInt8), DType::UInt8);
    assert_eq!(ReductionKernel::direct(ReduceOp::Sum).result_dtype(DType::Float32), DType::Float32);
    assert_eq!(mean.result_dtype(DType::Int32), DType::Float64);
    assert_eq!(abs_sum.result_dtype(DType::Int64), DType::Float64);
    assert_eq!(mean.result_dtype(DType::Float32), DType::Float32);
}

#[test]
fn host_exp() {
    let session = session();
    let x = upload(&*session, &HostArray::from_slice(&[0.0f64, 1.0]));
    let out = session.elementwise(ElementwiseOp::Exp, &[KernelArg::Buffer(&x)]).unwrap().to_host().unwrap();

    let values = out.as_slice::<f64>().unwrap();
    assert!((values[0] - 1.0).abs() < 1e-12);
    assert!((values[1] - std::f64::consts::E).abs() < 1e-12);
}

#[test]
fn host_elementwise_keeps_float32() {
    let session = session();
    let x = upload(&*session, &HostArray::from_slice(&[-1.5f32, 2.0]));
    let out = session.elementwise(ElementwiseOp::Fabs, &[KernelArg::Buffer(&x)]).unwrap().to_host().unwrap();
    assert_eq!(out.as_slice::<f32>(), Some(&[1.5f32, 2.0][..]));
}

#[test]
fn host_elementwise_promotes_integers() {
    let session = session();
    let x = upload(&*session, &HostArray::from_slice(&[4i32, 9]));
    let out = session.elementwise(ElementwiseOp::Sqrt, &[KernelArg::Buffer(&x)]).unwrap().to_host().unwrap();
    assert_eq!(out.as_slice::<f64>(), Some(&[2.0, 3.0][..]));
}

#[test]
fn host_binary_with_scalar() {
    let session = session();
    let x = upload(&*session, &HostArray::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], &[2, 2]).unwrap());
    let out =
        session.elementwise(ElementwiseOp::Pow, &[KernelArg::Buffer(&x), KernelArg::F64(2.0)]).unwrap().to_host().unwrap();
    assert_eq!(out.shape(), &[2, 2]);
    assert_eq!(out.as_slice::<f64>(), Some(&[1.0, 4.0, 9.0, 16.0][..]));
}

#[test]
fn host_arity_mismatch() {
    let session = session();
    let x = upload(&*session, &HostArray::from_slice(&[1.0f64]));
    let err = session.elementwise(ElementwiseOp::Fmod, &[KernelArg::Buffer(&x)]).unwrap_err();
    assert!(matches!(err, Error::ArityMismatch { expected: 2, actual: 1, .. }));
}

#[test]
fn host_sum_is_zero_dimensional() {
    let session = session();
    let x = upload(&*session, &HostArray::from_slice(&[1.0f64, 2.0, 3.0]));
    let out = session.reduce(ReductionKernel::direct(ReduceOp::Sum), &x).unwrap().to_host().unwrap();
    assert_eq!(out.ndim(), 0);
    assert_eq!(out.item().unwrap(), 6.0);
}

#[test]
fn host_integer_max_is_exact() {
    let session = session();
    let big = (1i64 << 53) + 1;
    let x = upload(&*session, &HostArray::from_slice(&[big, 1]));
    let out = session.reduce(ReductionKernel::direct(ReduceOp::Max), &x).unwrap().to_host().unwrap();
    assert_eq!(out.dtype(), DType::Int64);
    assert_eq!(out.ndim(), 0);
    assert_eq!(out.as_slice::<i64>(), Some(&[big][..]));
}

#[test]
fn host_integer_sum_keeps_narrow_dtype() {
    let session = session();
    let x = upload(&*session, &HostArray::from_slice(&[100i16, 200, -50]));
    let out = session.reduce(ReductionKernel::direct(ReduceOp::Sum), &x).unwrap().to_host().unwrap();
    assert_eq!(out.as_slice::<i16>(), Some(&[250i16][..]));
}

#[test]
fn host_integer_mean_is_float64() {
    let session = session();
    let x = upload(&*session, &HostArray::from_slice(&[1i32, 2]));
    let kernel = ReductionKernel::new(ReduceOp::Sum, MapOp::Identity, Finalize::Mean);
    let out = session.reduce(kernel, &x).unwrap().to_host().unwrap();
    assert_eq!(out.as_slice::<f64>(), Some(&[1.5][..]));
}

#[test]
fn host_primitives_release_intermediates() {
    let session = session();
    {
        let x = upload(&*session, &HostArray::from_slice(&[1i64, 2, 3]));
        let _sum = session.reduce(ReductionKernel::direct(ReduceOp::Max), &x).unwrap();
        let _sin = session.elementwise(ElementwiseOp::Sin, &[KernelArg::Buffer(&x)]).unwrap();
        assert_eq!(session.live_buffers(), 3);
    }
    assert_eq!(session.live_buffers(), 0);
}

#[test]
fn allocator_is_shared_with_session() {
    let session = session();
    let allocator = session.allocator();
    let _buffer = Buffer::zeros(Arc::clone(&allocator), DType::UInt8, &[16]).unwrap();
    assert_eq!(session.live_buffers(), 1);
}
