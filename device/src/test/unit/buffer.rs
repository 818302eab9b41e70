use std::sync::Arc;

use ipanema_dtype::{DType, HostArray};

use crate::{Buffer, BufferOptions, CpuAllocator, Error, TrackingAllocator};

#[test]
fn test_allocation_size() {
    let buffer = Buffer::allocate(Arc::new(CpuAllocator), DType::Float32, &[10], &BufferOptions::default()).unwrap();
    assert_eq!(buffer.size(), 40);
    assert_eq!(buffer.len(), 10);
    assert_eq!(buffer.allocator().name(), "CPU");
}

#[test]
fn test_zero_dimensional() {
    let buffer = Buffer::zeros(Arc::new(CpuAllocator), DType::Float64, &[]).unwrap();
    assert_eq!(buffer.size(), 8);
    assert_eq!(buffer.to_host().unwrap().item().unwrap(), 0.0);
}

#[test]
fn test_copyin_size_mismatch() {
    let mut buffer = Buffer::zeros(Arc::new(CpuAllocator), DType::Int32, &[2]).unwrap();
    let err = buffer.copyin(&[0u8; 4]).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch { expected: 8, actual: 4 }));
}

#[test]
fn test_copy_roundtrip_odd_size() {
    // Three bytes do not fill a whole storage word.
    let mut buffer = Buffer::zeros(Arc::new(CpuAllocator), DType::UInt8, &[3]).unwrap();
    buffer.copyin(&[7, 8, 9]).unwrap();

    let mut out = [0u8; 3];
    buffer.copyout(&mut out).unwrap();
    assert_eq!(out, [7, 8, 9]);
}

#[test]
fn test_from_host_keeps_shape() {
    let array = HostArray::from_vec(vec![1i64, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
    let buffer = Buffer::from_host(Arc::new(CpuAllocator), &array).unwrap();
    assert_eq!(buffer.dtype(), DType::Int64);
    assert_eq!(buffer.shape(), &[2, 3]);
    assert_eq!(buffer.to_host().unwrap(), array);
}

#[test]
fn test_tracking_allocator_counts() {
    let tracking = Arc::new(TrackingAllocator::new(Box::new(CpuAllocator)));
    let first = Buffer::zeros(tracking.clone(), DType::Float32, &[4]).unwrap();
    let second = Buffer::zeros(tracking.clone(), DType::Float64, &[4]).unwrap();
    assert_eq!(tracking.live_buffers(), 2);
    assert_eq!(tracking.live_bytes(), 48);

    drop(first);
    assert_eq!(tracking.live_buffers(), 1);
    drop(second);
    assert_eq!(tracking.live_buffers(), 0);
    assert_eq!(tracking.live_bytes(), 0);
}

#[test]
fn test_oversized_shape_is_rejected() {
    let tracking = Arc::new(TrackingAllocator::new(Box::new(CpuAllocator)));
    let err = Buffer::zeros(tracking.clone(), DType::Float64, &[usize::MAX / 4, 2]).unwrap_err();
    assert!(matches!(err, Error::Dtype { source: ipanema_dtype::Error::ShapeOverflow { .. } }), "{err}");
    assert_eq!(tracking.live_buffers(), 0);
}
