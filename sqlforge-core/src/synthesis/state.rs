//! Per-call stage tracking
//!
//! Synthesis runs `Draft -> Extracted -> Normalized`; repair starts at
//! `Diagnosing`. Any stage may end in `Failed`. Nothing here outlives the call.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Diagnosing,
    Draft,
    Extracted,
    Normalized,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Normalized | Self::Failed)
    }

    pub fn can_advance_to(&self, next: Stage) -> bool {
        match (self, next) {
            (current, _) if current.is_terminal() => false,
            (_, Self::Failed) => true,
            (Self::Diagnosing, Self::Draft)
            | (Self::Draft, Self::Extracted)
            | (Self::Extracted, Self::Normalized) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Stages one call has passed through
#[derive(Debug, Clone, Serialize)]
pub struct StageTrace {
    pub call_id: Uuid,
    pub operation: &'static str,
    pub history: Vec<Stage>,
}

impl StageTrace {
    pub fn new(operation: &'static str, start: Stage) -> Self {
        let trace = Self { call_id: Uuid::new_v4(), operation, history: vec![start] };
        tracing::debug!(call_id = %trace.call_id, "{} entered {}", operation, start);
        trace
    }

    pub fn current(&self) -> Stage {
        self.history.last().copied().unwrap_or(Stage::Failed)
    }

    /// Record a move to `next`; illegal moves are logged and ignored
    pub fn advance(&mut self, next: Stage) {
        let current = self.current();
        if !current.can_advance_to(next) {
            tracing::warn!(
                call_id = %self.call_id,
                "{} cannot move from {} to {}",
                self.operation,
                current,
                next
            );
            return;
        }
        tracing::debug!(call_id = %self.call_id, "{} entered {}", self.operation, next);
        self.history.push(next);
    }

    pub fn fail(&mut self) {
        self.advance(Stage::Failed);
    }
}
