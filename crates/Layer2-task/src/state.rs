//! Task status

use serde::{Deserialize, Serialize};

/// Observable status of a computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not settled yet (or not started)
    Pending,

    /// Settled with a value
    RanToCompletion,

    /// Settled by a deliberate abort
    Canceled,

    /// Settled with a fault
    Faulted,
}

impl TaskStatus {
    /// Check if this is a terminal state (cannot transition further)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    /// Check if task is pending
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    /// Check if task completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::RanToCompletion)
    }

    /// Get display name for the status
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::RanToCompletion => "RanToCompletion",
            TaskStatus::Canceled => "Canceled",
            TaskStatus::Faulted => "Faulted",
        }
    }

    /// Get a symbol for the status (for terminal output)
    pub fn symbol(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "⟳",
            TaskStatus::RanToCompletion => "✓",
            TaskStatus::Canceled => "⊘",
            TaskStatus::Faulted => "✗",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
