//! Lifecycle of the processor as a whole.

use serde::{Deserialize, Serialize};

/// Current operational state of the processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorState {
    /// Workers are being spawned.
    #[default]
    Starting,
    /// Workers are pulling and processing messages.
    Running,
    /// Shutdown was requested; workers finish their in-flight message and exit.
    Draining,
    /// All workers have exited.
    Stopped,
}

impl ProcessorState {
    /// Check if workers may still issue pulls.
    pub fn is_accepting_work(&self) -> bool {
        matches!(self, ProcessorState::Starting | ProcessorState::Running)
    }
}

impl std::fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessorState::Starting => write!(f, "starting"),
            ProcessorState::Running => write!(f, "running"),
            ProcessorState::Draining => write!(f, "draining"),
            ProcessorState::Stopped => write!(f, "stopped"),
        }
    }
}
