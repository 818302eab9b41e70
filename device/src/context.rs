//! Device context lifecycle.
//!
//! A [`DeviceContext`] owns at most one live [`Session`]. How that session is
//! obtained and released is delegated to a [`ContextStrategy`]:
//!
//! - [`ImplicitStrategy`] binds to the context the process already has and
//!   leaves it alone on teardown.
//! - [`ExplicitStrategy`] enumerates devices, picks one through a
//!   [`DeviceSelector`], creates a dedicated context and releases it on teardown.
//!
//! Teardown happens exactly once, either through [`DeviceContext::teardown`]
//! or on drop. Failures while releasing are logged and never returned.

use std::fmt;

use snafu::{OptionExt, ensure};

use crate::driver::{DeviceInfo, Driver, Session};
use crate::error::{ContextInactiveSnafu, NoDeviceFoundSnafu, Result};
use crate::selection::{DeviceSelector, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ContextState {
    Uninitialized,
    Selecting,
    Active,
    TornDown,
}

pub trait ContextStrategy: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Whether acquisition goes through device selection.
    fn selects_device(&self) -> bool {
        false
    }

    fn acquire(&mut self, driver: &dyn Driver) -> Result<Box<dyn Session>>;

    fn release(&mut self, session: Box<dyn Session>) -> Result<()>;
}

/// Piggybacks on an externally established context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplicitStrategy;

impl ContextStrategy for ImplicitStrategy {
    fn name(&self) -> &'static str {
        "implicit"
    }

    fn acquire(&mut self, driver: &dyn Driver) -> Result<Box<dyn Session>> {
        let session = driver.attach()?;
        tracing::debug!(device.name = %session.info().name, driver = driver.name(), "attached to ambient context");
        Ok(session)
    }

    fn release(&mut self, session: Box<dyn Session>) -> Result<()> {
        // The context belongs to whoever created it.
        drop(session);
        Ok(())
    }
}

/// Creates and owns a dedicated context on a selected device.
#[derive(Debug, Default)]
pub struct ExplicitStrategy {
    selector: DeviceSelector,
    selection: Option<Selection>,
}

impl ExplicitStrategy {
    pub fn new(selector: DeviceSelector) -> Self {
        Self { selector, selection: None }
    }

    /// The selection made by the last successful acquisition.
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }
}

impl ContextStrategy for ExplicitStrategy {
    fn name(&self) -> &'static str {
        "explicit"
    }

    fn selects_device(&self) -> bool {
        true
    }

    fn acquire(&mut self, driver: &dyn Driver) -> Result<Box<dyn Session>> {
        let count = driver.device_count()?;
        ensure!(count > 0, NoDeviceFoundSnafu { driver: driver.name() });

        let devices = (0..count).map(|index| driver.device_info(index)).collect::<Result<Vec<_>>>()?;
        let selection = self.selector.select(&devices)?;
        self.selection = Some(selection);

        let session = driver.open(selection.index)?;
        tracing::info!(
            device.index = selection.index,
            device.name = %session.info().name,
            device.clamped = selection.clamped,
            driver = driver.name(),
            "device context created"
        );
        Ok(session)
    }

    fn release(&mut self, mut session: Box<dyn Session>) -> Result<()> {
        session.release()
    }
}

pub struct DeviceContext {
    driver: Box<dyn Driver>,
    strategy: Box<dyn ContextStrategy>,
    state: ContextState,
    session: Option<Box<dyn Session>>,
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("driver", &self.driver.name())
            .field("strategy", &self.strategy.name())
            .field("state", &self.state)
            .field("device", &self.device())
            .finish()
    }
}

impl DeviceContext {
    /// Create an uninitialized context; call [`Self::activate`] to acquire a device.
    pub fn new(driver: Box<dyn Driver>, strategy: Box<dyn ContextStrategy>) -> Self {
        Self { driver, strategy, state: ContextState::Uninitialized, session: None }
    }

    /// Create and immediately activate.
    pub fn open(driver: Box<dyn Driver>, strategy: Box<dyn ContextStrategy>) -> Result<Self> {
        let mut context = Self::new(driver, strategy);
        context.activate()?;
        Ok(context)
    }

    pub fn activate(&mut self) -> Result<()> {
        match self.state {
            ContextState::Active => return Ok(()),
            ContextState::TornDown => return ContextInactiveSnafu { state: self.state }.fail(),
            ContextState::Uninitialized | ContextState::Selecting => {}
        }

        if self.strategy.selects_device() {
            self.state = ContextState::Selecting;
        }
        match self.strategy.acquire(self.driver.as_ref()) {
            Ok(session) => {
                self.session = Some(session);
                self.state = ContextState::Active;
                Ok(())
            }
            Err(error) => {
                self.state = ContextState::Uninitialized;
                Err(error)
            }
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn strategy(&self) -> &dyn ContextStrategy {
        self.strategy.as_ref()
    }

    /// The active session, or `ContextInactive` before activation and after teardown.
    pub fn session(&self) -> Result<&dyn Session> {
        self.session.as_deref().context(ContextInactiveSnafu { state: self.state })
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.session.as_deref().map(|session| session.info())
    }

    /// Release the context. Idempotent; release failures are logged.
    pub fn teardown(&mut self) {
        if self.state == ContextState::TornDown {
            return;
        }

        if let Some(session) = self.session.take() {
            let device = session.info().clone();
            match self.strategy.release(session) {
                Ok(()) => tracing::info!(device.index = device.index, device.name = %device.name, "device context released"),
                Err(error) => tracing::error!(device.index = device.index, %error, "device context teardown failed"),
            }
        }
        self.state = ContextState::TornDown;
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        self.teardown();
    }
}
