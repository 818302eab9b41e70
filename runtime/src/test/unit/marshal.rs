use ipanema_dtype::{DType, HostArray, Number};
use test_case::test_case;

use crate::error::Error;
use crate::executor::OutputDescriptor;
use crate::marshal::{ArgKind, Argument, ArgumentMarshaller, Marshalled};
use crate::test::host_session;

#[test_case(Argument::from(7i8) ; "int8")]
#[test_case(Argument::from(7i16) ; "int16")]
#[test_case(Argument::from(7u8) ; "uint8")]
#[test_case(Argument::from(7u32) ; "uint32")]
#[test_case(Argument::from(7u64) ; "uint64")]
#[test_case(Argument::Float { value: 1.5, dtype: DType::Int32 } ; "float tagged as int")]
fn test_scalar_width_rejected(argument: Argument) {
    let session = host_session();
    let marshaller = ArgumentMarshaller::new(session.as_ref());

    let err = marshaller.marshal_input(3, &argument).unwrap_err();
    match err {
        Error::TypeMismatch { position, kind, .. } => {
            assert_eq!(position, 3);
            assert_eq!(kind, argument.kind().to_string());
        }
        other => panic!("expected TypeMismatch, got {other}"),
    }
    assert_eq!(session.live_buffers(), 0);
}

#[test]
fn test_scalars_keep_width() {
    let session = host_session();
    let marshaller = ArgumentMarshaller::new(session.as_ref());

    assert!(matches!(marshaller.marshal_input(0, &Argument::from(-4i32)).unwrap(), Marshalled::I32(-4)));
    assert!(matches!(marshaller.marshal_input(0, &Argument::from(1i64 << 40)).unwrap(), Marshalled::I64(v) if v == 1 << 40));
    assert!(matches!(marshaller.marshal_input(0, &Argument::from(0.25f32)).unwrap(), Marshalled::F32(v) if v == 0.25));
    assert!(matches!(marshaller.marshal_input(0, &Argument::from(0.5f64)).unwrap(), Marshalled::F64(v) if v == 0.5));
}

#[test]
fn test_array_is_uploaded() {
    let session = host_session();
    let marshaller = ArgumentMarshaller::new(session.as_ref());
    let array = HostArray::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();

    let Marshalled::Buffer(buffer) = marshaller.marshal_input(0, &Argument::from(array.clone())).unwrap() else {
        panic!("array must become a buffer");
    };
    assert_eq!(buffer.dtype(), DType::Float32);
    assert_eq!(buffer.shape(), &[2, 3]);
    assert_eq!(marshaller.retrieve(&buffer).unwrap(), array);
    assert_eq!(session.live_buffers(), 1);
    drop(buffer);
    assert_eq!(session.live_buffers(), 0);
}

#[test_case(vec![Number::Int(1), Number::Int(2)], DType::Int64 ; "integers")]
#[test_case(vec![Number::Int(1), Number::Float(2.5)], DType::Float64 ; "mixed")]
#[test_case(vec![Number::Float(0.5)], DType::Float64 ; "floats")]
fn test_sequence_is_materialized(numbers: Vec<Number>, dtype: DType) {
    let session = host_session();
    let marshaller = ArgumentMarshaller::new(session.as_ref());
    let expected: Vec<f64> = numbers.iter().map(Number::as_f64).collect();

    let Marshalled::Buffer(buffer) = marshaller.marshal_input(0, &Argument::from(numbers)).unwrap() else {
        panic!("sequence must become a buffer");
    };
    assert_eq!(buffer.dtype(), dtype);
    assert_eq!(marshaller.retrieve(&buffer).unwrap().to_f64_vec(), expected);
}

#[test]
fn test_output_is_zeroed() {
    let session = host_session();
    let marshaller = ArgumentMarshaller::new(session.as_ref());

    let buffer = marshaller.allocate_output(&OutputDescriptor::new([2, 2], DType::Int32)).unwrap();
    assert_eq!(marshaller.retrieve(&buffer).unwrap(), HostArray::zeros(DType::Int32, &[2, 2]).unwrap());
}

#[test]
fn test_kind_display() {
    assert_eq!(Argument::from(1u16).kind(), ArgKind::Int(DType::UInt16));
    assert_eq!(Argument::from(1u16).kind().to_string(), "uint16 scalar");
    assert_eq!(Argument::from(vec![1.0, 2.0]).kind().to_string(), "sequence");
    assert_eq!(Argument::from(HostArray::scalar(1.0f32)).kind().to_string(), "float32 array");
}
