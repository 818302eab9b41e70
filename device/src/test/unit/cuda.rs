use ipanema_dtype::{DType, HostArray};

use crate::cuda::CudaDriver;
use crate::{Buffer, Driver, ElementwiseOp, KernelArg, LaunchConfig, ReduceOp, ReductionKernel, Session};

fn session() -> Option<Box<dyn Session>> {
    let driver = CudaDriver;
    if driver.device_count().unwrap_or(0) == 0 {
        eprintln!("CUDA not available, skipping test");
        return None;
    }
    Some(driver.open(0).unwrap())
}

#[test]
fn test_cuda_exp_and_sum() {
    let Some(session) = session() else { return };

    let x = Buffer::from_host(session.allocator(), &HostArray::from_slice(&[0.0f64, 1.0])).unwrap();
    let exp = session.elementwise(ElementwiseOp::Exp, &[KernelArg::Buffer(&x)]).unwrap().to_host().unwrap();
    let values = exp.as_slice::<f64>().unwrap();
    assert!((values[1] - std::f64::consts::E).abs() < 1e-12);

    let y = Buffer::from_host(session.allocator(), &HostArray::from_slice(&[1.0f32, 2.0, 3.0])).unwrap();
    let sum = session.reduce(ReductionKernel::direct(ReduceOp::Sum), &y).unwrap().to_host().unwrap();
    assert_eq!(sum.dtype(), DType::Float32);
    assert_eq!(sum.item().unwrap(), 6.0);
}

#[test]
fn test_cuda_user_kernel() {
    let Some(session) = session() else { return };

    let src = r#"
extern "C" __global__ void twice(const float *x, float *out, int n) {
    int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < n) out[i] = 2.0f * x[i];
}
"#;
    let module = session.compile(src).unwrap();
    let x = Buffer::from_host(session.allocator(), &HostArray::from_slice(&[1.0f32, 2.0, 3.0])).unwrap();
    let out = Buffer::zeros(session.allocator(), DType::Float32, &[3]).unwrap();
    let args = [KernelArg::Buffer(&x), KernelArg::Buffer(&out), KernelArg::I32(3)];
    module.function("twice").unwrap().launch(&args, &LaunchConfig::new([32, 1, 1], [1, 1])).unwrap();

    assert_eq!(out.to_host().unwrap().as_slice::<f32>(), Some(&[2.0f32, 4.0, 6.0][..]));
}

#[test]
fn test_cuda_integer_reductions_are_exact() {
    let Some(session) = session() else { return };

    let big = (1i64 << 53) + 1;
    let x = Buffer::from_host(session.allocator(), &HostArray::from_slice(&[big, 1, -4])).unwrap();
    let max = session.reduce(ReductionKernel::direct(ReduceOp::Max), &x).unwrap().to_host().unwrap();
    assert_eq!(max.as_slice::<i64>(), Some(&[big][..]));
    let min = session.reduce(ReductionKernel::direct(ReduceOp::Min), &x).unwrap().to_host().unwrap();
    assert_eq!(min.as_slice::<i64>(), Some(&[-4i64][..]));

    let y = Buffer::from_host(session.allocator(), &HostArray::from_slice(&[7u8, 9, 11])).unwrap();
    let sum = session.reduce(ReductionKernel::direct(ReduceOp::Sum), &y).unwrap().to_host().unwrap();
    assert_eq!(sum.as_slice::<u8>(), Some(&[27u8][..]));

    let z = Buffer::from_host(session.allocator(), &HostArray::from_slice(&[u64::MAX, 3])).unwrap();
    let max = session.reduce(ReductionKernel::direct(ReduceOp::Max), &z).unwrap().to_host().unwrap();
    assert_eq!(max.as_slice::<u64>(), Some(&[u64::MAX][..]));
}
