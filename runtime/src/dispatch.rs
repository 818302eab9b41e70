//! Name-based access to the built-in primitive libraries.

use std::str::FromStr;

use ipanema_device::{Buffer, ElementwiseOp, Finalize, MapOp, ReduceOp, ReductionKernel, Session};
use ipanema_dtype::HostArray;
use snafu::{OptionExt, ResultExt};
use strum::IntoEnumIterator;

use crate::error::{CallShapeSnafu, DeviceSnafu, Error, OperationNotFoundSnafu, Result};
use crate::marshal::{Argument, ArgumentMarshaller, Marshalled};

/// The two primitive namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Library {
    Elementwise,
    Reduction,
}

/// Input of a reduction: host arrays are uploaded, device buffers pass through.
#[derive(Debug)]
pub enum ReduceInput<'a> {
    Host(HostArray),
    Device(&'a Buffer),
}

impl From<HostArray> for ReduceInput<'_> {
    fn from(array: HostArray) -> Self {
        Self::Host(array)
    }
}

impl<'a> From<&'a Buffer> for ReduceInput<'a> {
    fn from(buffer: &'a Buffer) -> Self {
        Self::Device(buffer)
    }
}

/// An entry of the reduction library.
#[derive(Debug, Clone, Copy)]
pub enum ReductionEntry {
    /// Applied to the array as is.
    Direct(ReductionKernel),
    /// Produces the kernel to apply when instantiated.
    Factory(fn() -> ReductionKernel),
}

impl ReductionEntry {
    /// The kernel when the entry is used as a direct call.
    pub fn call(&self, name: &str) -> Result<ReductionKernel> {
        match self {
            Self::Direct(kernel) => Ok(*kernel),
            Self::Factory(_) => CallShapeSnafu { name }.fail(),
        }
    }

    pub fn instantiate(&self) -> ReductionKernel {
        match self {
            Self::Direct(kernel) => *kernel,
            Self::Factory(factory) => factory(),
        }
    }
}

fn mean() -> ReductionKernel {
    ReductionKernel::new(ReduceOp::Sum, MapOp::Identity, Finalize::Mean)
}

fn norm() -> ReductionKernel {
    ReductionKernel::new(ReduceOp::Sum, MapOp::Square, Finalize::Sqrt)
}

fn sum_of_squares() -> ReductionKernel {
    ReductionKernel::new(ReduceOp::Sum, MapOp::Square, Finalize::None)
}

fn abs_sum() -> ReductionKernel {
    ReductionKernel::new(ReduceOp::Sum, MapOp::Abs, Finalize::None)
}

const REDUCTIONS: &[(&str, ReductionEntry)] = &[
    ("sum", ReductionEntry::Direct(ReductionKernel::direct(ReduceOp::Sum))),
    ("min", ReductionEntry::Direct(ReductionKernel::direct(ReduceOp::Min))),
    ("max", ReductionEntry::Direct(ReductionKernel::direct(ReduceOp::Max))),
    ("prod", ReductionEntry::Direct(ReductionKernel::direct(ReduceOp::Prod))),
    ("mean", ReductionEntry::Factory(mean)),
    ("norm", ReductionEntry::Factory(norm)),
    ("sum_of_squares", ReductionEntry::Factory(sum_of_squares)),
    ("abs_sum", ReductionEntry::Factory(abs_sum)),
];

pub fn reduction_entry(name: &str) -> Option<ReductionEntry> {
    REDUCTIONS.iter().find(|(registered, _)| *registered == name).map(|(_, entry)| *entry)
}

pub fn elementwise_names() -> impl Iterator<Item = &'static str> {
    ElementwiseOp::iter().map(<&'static str>::from)
}

pub fn reduction_names() -> impl Iterator<Item = &'static str> {
    REDUCTIONS.iter().map(|(name, _)| *name)
}

/// Invokes primitives on one session and copies results back to the host.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveDispatcher<'s> {
    session: &'s dyn Session,
}

impl<'s> PrimitiveDispatcher<'s> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self { session }
    }

    pub fn elementwise(&self, name: &str, args: &[Argument]) -> Result<HostArray> {
        let op = ElementwiseOp::from_str(name).ok().context(OperationNotFoundSnafu { library: Library::Elementwise, name })?;

        let marshaller = ArgumentMarshaller::new(self.session);
        let marshalled = args
            .iter()
            .enumerate()
            .map(|(position, argument)| marshaller.marshal_input(position, argument))
            .collect::<Result<Vec<_>>>()?;
        let kernel_args: Vec<_> = marshalled.iter().map(Marshalled::as_arg).collect();

        tracing::debug!(op = name, num_args = kernel_args.len(), "elementwise primitive");
        let result = self
            .session
            .elementwise(op, &kernel_args)
            .context(DeviceSnafu { operation: format!("elementwise '{name}'") })?;
        marshaller.retrieve(&result)
    }

    pub fn reduce<'a>(&self, name: &str, input: impl Into<ReduceInput<'a>>) -> Result<HostArray> {
        let entry = reduction_entry(name).context(OperationNotFoundSnafu { library: Library::Reduction, name })?;
        let kernel = match entry.call(name) {
            Ok(kernel) => kernel,
            Err(Error::CallShape { .. }) => entry.instantiate(),
            Err(error) => return Err(error),
        };

        let marshaller = ArgumentMarshaller::new(self.session);
        let uploaded;
        let buffer = match input.into() {
            ReduceInput::Host(array) => {
                uploaded = marshaller.upload(&array)?;
                &uploaded
            }
            ReduceInput::Device(buffer) => buffer,
        };

        tracing::debug!(op = name, len = buffer.len(), "reduction primitive");
        let result =
            self.session.reduce(kernel, buffer).context(DeviceSnafu { operation: format!("reduction '{name}'") })?;
        marshaller.retrieve(&result)
    }
}
