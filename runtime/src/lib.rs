//! Program execution for ipanema.
//!
//! A [`ProgramManager`] composes named source fragments into one compilation
//! unit, marshals host arguments onto the active device, launches kernels and
//! copies outputs back. Built-in elementwise and reduction primitives are
//! reachable by name through the same manager.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod fragment;
pub mod manager;
pub mod marshal;


pub use config::{Backend, ManagerConfig, StrategyKind};
pub use dispatch::{Library, PrimitiveDispatcher, ReduceInput, ReductionEntry, elementwise_names, reduction_names};
pub use error::{Error, Result};
pub use executor::{KernelExecutor, OutputDescriptor, OutputSpec};
pub use fragment::{CodeFragment, FragmentSource, FragmentStore};
pub use manager::ProgramManager;
pub use marshal::{ArgKind, Argument, ArgumentMarshaller};

pub use ipanema_device::{Buffer, LaunchConfig};
pub use ipanema_dtype::{DType, HostArray, Number};
