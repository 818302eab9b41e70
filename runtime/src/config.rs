//! Manager configuration.
//!
//! Built explicitly with a bon builder or read from `IPANEMA_*` environment
//! variables, with the same defaults either way.

use bon::bon;
use ipanema_device::host::{DEFAULT_COMPILER, HostDriver};
use ipanema_device::selection::DEFAULT_PROMPT_ATTEMPTS;
use ipanema_device::{ContextStrategy, DeviceSelector, Driver, ExplicitStrategy, ImplicitStrategy};

/// Device driver backing the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Backend {
    /// C compiled with the system compiler, run on the CPU.
    #[default]
    Host,
    /// NVIDIA GPUs, requires the `cuda` feature.
    Cuda,
}

/// How the device context is acquired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StrategyKind {
    /// Attach to the ambient context of device 0.
    Implicit,
    /// Select a device and create a dedicated context for it.
    #[default]
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub backend: Backend,
    pub strategy: StrategyKind,
    /// Device to open; out-of-range indices fall back to 0.
    pub device_index: Option<usize>,
    /// Prompt for a device when no index is given.
    pub interactive: bool,
    pub max_prompt_attempts: usize,
    /// Number of host devices exposed by the host backend.
    pub host_devices: usize,
    /// C compiler used by the host backend.
    pub compiler: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[bon]
impl ManagerConfig {
    #[builder]
    pub fn builder(
        #[builder(default)] backend: Backend,
        #[builder(default)] strategy: StrategyKind,
        device_index: Option<usize>,
        #[builder(default = false)] interactive: bool,
        #[builder(default = DEFAULT_PROMPT_ATTEMPTS)] max_prompt_attempts: usize,
        #[builder(default = 1)] host_devices: usize,
        #[builder(default = DEFAULT_COMPILER.to_string(), into)] compiler: String,
    ) -> Self {
        Self { backend, strategy, device_index, interactive, max_prompt_attempts, host_devices, compiler }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `IPANEMA_BACKEND` - `host` or `cuda` (default: host)
    /// * `IPANEMA_CONTEXT` - `implicit` or `explicit` (default: explicit)
    /// * `IPANEMA_DEVICE` - Device index (default: unset)
    /// * `IPANEMA_INTERACTIVE` - Prompt for a device if `1`/`true`
    /// * `IPANEMA_PROMPT_ATTEMPTS` - Prompt attempts before giving up (default: 5)
    /// * `IPANEMA_HOST_DEVICES` - Host devices to expose (default: 1)
    /// * `IPANEMA_CC` - C compiler for the host backend (default: clang)
    pub fn from_env() -> Self {
        Self {
            backend: env_parse("IPANEMA_BACKEND").unwrap_or_default(),
            strategy: env_parse("IPANEMA_CONTEXT").unwrap_or_default(),
            device_index: env_parse("IPANEMA_DEVICE"),
            interactive: env_flag("IPANEMA_INTERACTIVE"),
            max_prompt_attempts: env_parse("IPANEMA_PROMPT_ATTEMPTS").unwrap_or(DEFAULT_PROMPT_ATTEMPTS),
            host_devices: env_parse("IPANEMA_HOST_DEVICES").unwrap_or(1),
            compiler: std::env::var("IPANEMA_CC").unwrap_or_else(|_| DEFAULT_COMPILER.to_string()),
        }
    }

    pub fn driver(&self) -> ipanema_device::Result<Box<dyn Driver>> {
        match self.backend {
            Backend::Host => Ok(Box::new(HostDriver::new(self.host_devices).with_compiler(self.compiler.clone()))),
            #[cfg(feature = "cuda")]
            Backend::Cuda => Ok(Box::new(ipanema_device::cuda::CudaDriver)),
            #[cfg(not(feature = "cuda"))]
            Backend::Cuda => ipanema_device::error::InvalidDeviceSnafu { device: "cuda (feature disabled)" }.fail(),
        }
    }

    pub fn context_strategy(&self) -> Box<dyn ContextStrategy> {
        match self.strategy {
            StrategyKind::Implicit => Box::new(ImplicitStrategy),
            StrategyKind::Explicit => Box::new(ExplicitStrategy::new(
                DeviceSelector::new(self.device_index, self.interactive).with_max_attempts(self.max_prompt_attempts),
            )),
        }
    }
}
