//! Composite-source kernel execution.

use std::collections::HashMap;

use ipanema_device::{Buffer, KernelArg, LaunchConfig, Session};
use ipanema_dtype::{DType, HostArray};
use snafu::{ResultExt, ensure};

use crate::error::{
    CompileSnafu, DeviceSnafu, MissingOutputDescriptorSnafu, OutputPositionOutOfRangeSnafu, Result,
};
use crate::marshal::{Argument, ArgumentMarshaller, Marshalled};

/// Shape and element type of an output buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl OutputDescriptor {
    pub fn new(shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        Self { shape: shape.into(), dtype }
    }
}

/// Which argument positions are outputs, and how to allocate each one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSpec {
    positions: Vec<usize>,
    descriptors: HashMap<usize, OutputDescriptor>,
}

impl OutputSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a position list and a separate descriptor map.
    ///
    /// Positions without a descriptor are reported by [`Self::validate`].
    pub fn from_parts(
        positions: impl IntoIterator<Item = usize>,
        descriptors: impl IntoIterator<Item = (usize, OutputDescriptor)>,
    ) -> Self {
        Self { positions: positions.into_iter().collect(), descriptors: descriptors.into_iter().collect() }
    }

    /// Declare `position` as an output of the given shape and dtype.
    pub fn with(mut self, position: usize, shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        if !self.positions.contains(&position) {
            self.positions.push(position);
        }
        self.descriptors.insert(position, OutputDescriptor::new(shape, dtype));
        self
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn is_output(&self, position: usize) -> bool {
        self.positions.contains(&position)
    }

    pub fn descriptor(&self, position: usize) -> Option<&OutputDescriptor> {
        self.descriptors.get(&position)
    }

    /// Every position must be in range and carry a descriptor.
    pub fn validate(&self, count: usize) -> Result<()> {
        for &position in &self.positions {
            ensure!(position < count, OutputPositionOutOfRangeSnafu { position, count });
            ensure!(self.descriptors.contains_key(&position), MissingOutputDescriptorSnafu { position });
        }
        Ok(())
    }
}

enum Slot {
    Output(Buffer),
    Input(Marshalled),
}

impl Slot {
    fn as_arg(&self) -> KernelArg<'_> {
        match self {
            Self::Output(buffer) => KernelArg::Buffer(buffer),
            Self::Input(marshalled) => marshalled.as_arg(),
        }
    }
}

/// Compiles and launches user kernels on one session.
#[derive(Debug, Clone, Copy)]
pub struct KernelExecutor<'s> {
    session: &'s dyn Session,
}

impl<'s> KernelExecutor<'s> {
    pub fn new(session: &'s dyn Session) -> Self {
        Self { session }
    }

    /// Compile `source`, launch `entry` and return host copies of the outputs.
    ///
    /// Output positions receive a zeroed buffer and their argument value is
    /// ignored; outputs come back in ascending argument position.
    pub fn run(
        &self,
        source: &str,
        entry: &str,
        outputs: &OutputSpec,
        config: &LaunchConfig,
        args: &[Argument],
    ) -> Result<Vec<HostArray>> {
        outputs.validate(args.len())?;

        let module = self.session.compile(source).context(CompileSnafu { entry })?;
        let program = module.function(entry).context(CompileSnafu { entry })?;

        let marshaller = ArgumentMarshaller::new(self.session);
        let slots = args
            .iter()
            .enumerate()
            .map(|(position, argument)| match outputs.descriptor(position) {
                Some(descriptor) if outputs.is_output(position) => {
                    marshaller.allocate_output(descriptor).map(Slot::Output)
                }
                _ => marshaller.marshal_input(position, argument).map(Slot::Input),
            })
            .collect::<Result<Vec<_>>>()?;

        let kernel_args: Vec<KernelArg<'_>> = slots.iter().map(Slot::as_arg).collect();
        tracing::debug!(
            kernel.name = entry,
            kernel.num_args = kernel_args.len(),
            kernel.num_outputs = outputs.positions().len(),
            "running kernel"
        );
        program.launch(&kernel_args, config).context(DeviceSnafu { operation: format!("launch of '{entry}'") })?;

        slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Output(buffer) => Some(marshaller.retrieve(buffer)),
                Slot::Input(_) => None,
            })
            .collect()
    }
}
