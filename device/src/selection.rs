//! Device index resolution, including the interactive console prompt.

use std::fmt;
use std::io::{self, BufRead, Write};

use snafu::{ResultExt, ensure};

use crate::driver::DeviceInfo;
use crate::error::{NoDeviceFoundSnafu, PromptSnafu, Result, SelectionCancelledSnafu, SelectionExhaustedSnafu};

pub const DEFAULT_PROMPT_ATTEMPTS: usize = 5;

/// Outcome of device selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    /// The requested index was out of range and device 0 was used instead.
    pub clamped: bool,
}

impl Selection {
    const fn exact(index: usize) -> Self {
        Self { index, clamped: false }
    }

    const fn fallback() -> Self {
        Self { index: 0, clamped: true }
    }
}

/// Source of interactive answers.
pub trait SelectionPrompt: fmt::Debug {
    /// Present the devices and read one answer; `None` at end of input.
    fn ask(&mut self, devices: &[DeviceInfo], default: usize) -> io::Result<Option<String>>;
}

/// Prompt that lists devices on `output` and reads a line from `input`.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R, W> fmt::Debug for ConsolePrompt<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsolePrompt").finish_non_exhaustive()
    }
}

impl<R: BufRead, W: Write> SelectionPrompt for ConsolePrompt<R, W> {
    fn ask(&mut self, devices: &[DeviceInfo], default: usize) -> io::Result<Option<String>> {
        writeln!(self.output, "Available devices:")?;
        for device in devices {
            writeln!(self.output, "  {device}")?;
        }
        write!(self.output, "Select a device (default {default}): ")?;
        self.output.flush()?;

        let mut line = String::new();
        match self.input.read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }
}

/// Resolves which device to open.
///
/// Priority: an explicit index (clamped to 0 when out of range), then
/// device 0 when not interactive, then the prompt, which asks again on
/// answers that are not a valid index.
#[derive(Debug)]
pub struct DeviceSelector {
    index: Option<usize>,
    interactive: bool,
    max_attempts: usize,
    prompt: Option<Box<dyn SelectionPrompt>>,
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self { index: None, interactive: false, max_attempts: DEFAULT_PROMPT_ATTEMPTS, prompt: None }
    }
}

impl DeviceSelector {
    pub fn new(index: Option<usize>, interactive: bool) -> Self {
        Self { index, interactive, ..Self::default() }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Use `prompt` instead of stdin/stdout for interactive selection.
    pub fn with_prompt(mut self, prompt: impl SelectionPrompt + 'static) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    /// Whether [`Self::select`] would prompt.
    pub fn is_interactive(&self) -> bool {
        self.index.is_none() && self.interactive
    }

    pub fn select(&mut self, devices: &[DeviceInfo]) -> Result<Selection> {
        ensure!(!devices.is_empty(), NoDeviceFoundSnafu { driver: "any" });

        if let Some(index) = self.index {
            return Ok(Self::checked(index, devices.len()));
        }
        if !self.is_interactive() {
            return Ok(Selection::exact(0));
        }

        match self.prompt.as_mut() {
            Some(prompt) => Self::prompt_loop(prompt.as_mut(), devices, self.max_attempts),
            None => Self::prompt_loop(&mut ConsolePrompt::stdio(), devices, self.max_attempts),
        }
    }

    fn checked(index: usize, count: usize) -> Selection {
        if index < count {
            Selection::exact(index)
        } else {
            tracing::warn!(device.index = index, device.count = count, "device index out of range, using device 0");
            Selection::fallback()
        }
    }

    fn prompt_loop(prompt: &mut dyn SelectionPrompt, devices: &[DeviceInfo], attempts: usize) -> Result<Selection> {
        for attempt in 1..=attempts {
            let answer = match prompt.ask(devices, 0) {
                Ok(Some(answer)) => answer,
                Ok(None) => return SelectionCancelledSnafu.fail(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => return SelectionCancelledSnafu.fail(),
                Err(source) => return Err(source).context(PromptSnafu),
            };

            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(Selection::exact(0));
            }
            if answer.eq_ignore_ascii_case("q") || answer.eq_ignore_ascii_case("quit") {
                return SelectionCancelledSnafu.fail();
            }
            match answer.parse::<usize>() {
                Ok(index) if index < devices.len() => return Ok(Selection::exact(index)),
                Ok(index) => {
                    tracing::warn!(device.index = index, device.count = devices.len(), attempt, "device index out of range")
                }
                Err(_) => tracing::warn!(answer, attempt, "invalid device selection"),
            }
        }
        SelectionExhaustedSnafu { attempts }.fail()
    }
}
