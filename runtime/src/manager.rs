//! The per-program manager: device context, fragment store, kernel runs and
//! primitive calls behind one handle.

use ipanema_device::{Buffer, ContextStrategy, DeviceContext, Driver, LaunchConfig, Session};
use ipanema_dtype::HostArray;
use snafu::ResultExt;
use tracing::info;

use crate::config::ManagerConfig;
use crate::dispatch::{PrimitiveDispatcher, ReduceInput};
use crate::error::{DeviceSnafu, Result};
use crate::executor::{KernelExecutor, OutputSpec};
use crate::fragment::{FragmentSource, FragmentStore};
use crate::marshal::{Argument, ArgumentMarshaller};

/// Owns the fragment store and the device context of one program.
///
/// The context is activated on construction and released by [`Self::teardown`]
/// or on drop, whichever comes first.
#[derive(Debug)]
pub struct ProgramManager {
    fragments: FragmentStore,
    context: DeviceContext,
}

impl ProgramManager {
    pub fn new(config: &ManagerConfig) -> Result<Self> {
        let driver = config.driver().context(DeviceSnafu { operation: "driver setup" })?;
        Self::with_driver(driver, config.context_strategy())
    }

    /// Manager configured from `IPANEMA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&ManagerConfig::from_env())
    }

    pub fn with_driver(driver: Box<dyn Driver>, strategy: Box<dyn ContextStrategy>) -> Result<Self> {
        let context = DeviceContext::open(driver, strategy).context(DeviceSnafu { operation: "context activation" })?;
        if let Some(device) = context.device() {
            info!(%device, strategy = context.strategy().name(), "device context active");
        }
        Ok(Self { fragments: FragmentStore::new(), context })
    }

    /// Register source text or a file under `name`, replacing any previous fragment.
    pub fn add_fragment(&mut self, name: impl Into<String>, source: impl Into<FragmentSource>) -> Result<()> {
        self.fragments.add(name, source)
    }

    pub fn pop_fragment(&mut self, name: &str) -> Result<String> {
        self.fragments.pop(name)
    }

    pub fn fragments(&self) -> &FragmentStore {
        &self.fragments
    }

    pub fn compose(&self) -> String {
        self.fragments.compose()
    }

    /// Compile the composed fragments and launch `entry`.
    pub fn run(
        &self,
        entry: &str,
        outputs: &OutputSpec,
        config: &LaunchConfig,
        args: &[Argument],
    ) -> Result<Vec<HostArray>> {
        let source = self.compose();
        KernelExecutor::new(self.session()?).run(&source, entry, outputs, config, args)
    }

    pub fn elementwise(&self, name: &str, args: &[Argument]) -> Result<HostArray> {
        PrimitiveDispatcher::new(self.session()?).elementwise(name, args)
    }

    pub fn reduce<'a>(&self, name: &str, input: impl Into<ReduceInput<'a>>) -> Result<HostArray> {
        PrimitiveDispatcher::new(self.session()?).reduce(name, input)
    }

    /// Copy `array` into a new buffer on the active device.
    pub fn upload(&self, array: &HostArray) -> Result<Buffer> {
        ArgumentMarshaller::new(self.session()?).upload(array)
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    /// Release the device context. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.context.teardown();
    }

    fn session(&self) -> Result<&dyn Session> {
        self.context.session().context(DeviceSnafu { operation: "session access" })
    }
}
