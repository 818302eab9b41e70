//! Built-in primitives evaluated natively on the host.

use std::sync::Arc;

use ipanema_dtype::{ArrayData, DType, HostArray};
use snafu::ResultExt;

use crate::allocator::Allocator;
use crate::buffer::Buffer;
use crate::error::{DtypeSnafu, Result};
use crate::primitives::{ElementwiseOp, ReductionKernel, broadcast_shape};
use crate::program::KernelArg;

struct Operand {
    values: Vec<f64>,
    shape: Vec<usize>,
    dtype: DType,
}

impl Operand {
    fn load(arg: &KernelArg<'_>) -> Result<Self> {
        match *arg {
            KernelArg::Buffer(buffer) => {
                let host = buffer.to_host()?;
                Ok(Self { values: host.to_f64_vec(), shape: host.shape().to_vec(), dtype: host.dtype() })
            }
            scalar => Ok(Self { values: vec![scalar.scalar().unwrap_or_default()], shape: vec![], dtype: scalar.dtype() }),
        }
    }

    fn at(&self, index: usize) -> f64 {
        if self.values.len() == 1 { self.values[0] } else { self.values[index] }
    }
}

fn upload(allocator: Arc<dyn Allocator>, dtype: DType, shape: &[usize], values: &[f64]) -> Result<Buffer> {
    let array = HostArray::new(ArrayData::from_f64(dtype, values), shape).context(DtypeSnafu)?;
    Buffer::from_host(allocator, &array)
}

pub(crate) fn elementwise(allocator: Arc<dyn Allocator>, op: ElementwiseOp, args: &[KernelArg<'_>]) -> Result<Buffer> {
    op.check_arity(args.len())?;
    let operands = args.iter().map(Operand::load).collect::<Result<Vec<_>>>()?;
    let shape = broadcast_shape(operands.iter().map(|operand| operand.shape.as_slice()))?;
    let dtype = ElementwiseOp::result_dtype(&operands.iter().map(|operand| operand.dtype).collect::<Vec<_>>());

    let len = shape.iter().product::<usize>();
    let values: Vec<f64> = (0..len)
        .map(|i| {
            let rhs = operands.get(1).map_or(0.0, |operand| operand.at(i));
            op.apply(operands[0].at(i), rhs)
        })
        .collect();

    tracing::debug!(op = %op, dtype = %dtype, len, "host elementwise");
    upload(allocator, dtype, &shape, &values)
}

pub(crate) fn reduce(allocator: Arc<dyn Allocator>, kernel: ReductionKernel, input: &Buffer) -> Result<Buffer> {
    let host = input.to_host()?;
    if kernel.is_integral(host.dtype()) {
        let dtype = host.dtype();
        let value = kernel.evaluate_int(&host.data().to_i64_vec(), dtype.is_unsigned());
        tracing::debug!(reduce = %kernel.reduce, dtype = %dtype, len = host.len(), "host integer reduction");
        let array = HostArray::new(ArrayData::from_i64(dtype, &[value]), &[]).context(DtypeSnafu)?;
        return Buffer::from_host(allocator, &array);
    }

    let values = host.to_f64_vec();
    let value = kernel.evaluate(&values);
    let dtype = kernel.result_dtype(input.dtype());

    tracing::debug!(reduce = %kernel.reduce, map = %kernel.map, finalize = %kernel.finalize, len = values.len(), "host reduction");
    upload(allocator, dtype, &[], &[value])
}
