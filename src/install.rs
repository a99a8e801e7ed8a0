//! The installation walk-through: an ordered list of steps, the last of
//! which may wait for the sensor to read the expected tag.
//!
//! ```text
//! NotStarted --begin--> Active(0) <--back/forward--> ... Active(n-1) --forward--> Finished
//! ```
//!
//! Only a final step that requires a signal is gated. While that step is
//! current the signal source runs; leaving it in either direction stops the
//! source and drops whatever it last reported.

use tracing::{debug, info};

use crate::model::InstallationStep;
use crate::sensor::{NfcPoller, PollStatus};

/// Something that reports sensor readings while a gated step is current.
pub trait SignalSource {
    /// Begins reporting readings against `expected`.
    fn start(&mut self, expected: Option<&str>);

    /// Stops reporting and forgets the last reading.
    fn stop(&mut self);

    fn latest(&self) -> Option<PollStatus>;
}

impl SignalSource for NfcPoller {
    fn start(&mut self, expected: Option<&str>) {
        NfcPoller::start(self, expected);
    }

    fn stop(&mut self) {
        NfcPoller::stop(self);
    }

    fn latest(&self) -> Option<PollStatus> {
        NfcPoller::latest(self)
    }
}

/// Where the walk-through stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,

    /// Index into the sorted steps.
    Active(usize),

    Finished,
}

/// The outcome of a successful [`InstallationSession::forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved { step_number: u32 },
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("this machine has no installation steps")]
    NoSteps,

    #[error("step number {0} appears more than once")]
    DuplicateStepNumber(u32),

    #[error("the installation has not started")]
    NotStarted,

    #[error("the installation is already finished")]
    AlreadyFinished,

    #[error(
        "the sensor has not confirmed this step: {}",
        .status.as_ref().map_or_else(|| "no reading yet".to_string(), PollStatus::message)
    )]
    StepNotSatisfied { status: Option<PollStatus> },
}

/// One pass through a machine's installation steps.
pub struct InstallationSession<S: SignalSource> {
    steps: Vec<InstallationStep>,
    state: SessionState,
    signal: S,
    signal_running: bool,
}

impl<S: SignalSource> InstallationSession<S> {
    pub fn new(signal: S) -> Self {
        Self {
            steps: Vec::new(),
            state: SessionState::NotStarted,
            signal,
            signal_running: false,
        }
    }

    /// Loads `steps` and enters the first one.
    ///
    /// Steps are ordered by step number, which must be unique. A session
    /// that is already running starts over.
    pub fn begin(&mut self, mut steps: Vec<InstallationStep>) -> Result<(), StepError> {
        if steps.is_empty() {
            return Err(StepError::NoSteps);
        }
        steps.sort_by_key(|step| step.step_number);
        if let Some(pair) = steps
            .windows(2)
            .find(|pair| pair[0].step_number == pair[1].step_number)
        {
            return Err(StepError::DuplicateStepNumber(pair[0].step_number));
        }

        self.leave();
        self.steps = steps;
        info!(steps = self.steps.len(), "installation session started");
        self.enter(0);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn steps(&self) -> &[InstallationStep] {
        &self.steps
    }

    /// The current step, while the session is active.
    pub fn current(&self) -> Option<&InstallationStep> {
        match self.state {
            SessionState::Active(index) => self.steps.get(index),
            SessionState::NotStarted | SessionState::Finished => None,
        }
    }

    /// Whether the current step waits for the sensor.
    pub fn current_is_gated(&self) -> bool {
        matches!(self.state, SessionState::Active(index) if self.is_gated(index))
    }

    /// The latest reading, while the gated step is current.
    pub fn signal_status(&self) -> Option<PollStatus> {
        if self.signal_running {
            self.signal.latest()
        } else {
            None
        }
    }

    /// Returns to the previous step. Does nothing on the first step.
    pub fn back(&mut self) -> Result<(), StepError> {
        let index = self.active_index()?;
        if index == 0 {
            return Ok(());
        }
        self.leave();
        self.enter(index - 1);
        Ok(())
    }

    /// Moves to the next step, or finishes after the last one.
    ///
    /// A gated final step only passes once the signal source reports a
    /// positive detection; otherwise nothing changes.
    pub fn forward(&mut self) -> Result<Advance, StepError> {
        let index = self.active_index()?;
        if self.is_gated(index) {
            let status = self.signal.latest();
            if !status.as_ref().is_some_and(PollStatus::is_positive) {
                debug!(?status, "gated step not satisfied");
                return Err(StepError::StepNotSatisfied { status });
            }
        }

        self.leave();
        if index + 1 == self.steps.len() {
            self.state = SessionState::Finished;
            info!("installation session finished");
            return Ok(Advance::Finished);
        }
        self.enter(index + 1);
        Ok(Advance::Moved {
            step_number: self.steps[index + 1].step_number,
        })
    }

    fn active_index(&self) -> Result<usize, StepError> {
        match self.state {
            SessionState::Active(index) => Ok(index),
            SessionState::NotStarted => Err(StepError::NotStarted),
            SessionState::Finished => Err(StepError::AlreadyFinished),
        }
    }

    fn is_gated(&self, index: usize) -> bool {
        index + 1 == self.steps.len() && self.steps[index].requires_signal
    }

    fn enter(&mut self, index: usize) {
        self.state = SessionState::Active(index);
        let step = &self.steps[index];
        debug!(step = step.step_number, title = %step.title, "entered step");
        if self.is_gated(index) {
            let expected = self.steps[index].signal_position.clone();
            self.signal.start(expected.as_deref());
            self.signal_running = true;
        }
    }

    fn leave(&mut self) {
        if self.signal_running {
            self.signal.stop();
            self.signal_running = false;
        }
    }
}

impl<S: SignalSource> Drop for InstallationSession<S> {
    fn drop(&mut self) {
        self.leave();
    }
}
