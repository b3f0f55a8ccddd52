//! Pieces shared by the create, edit, and browse sessions.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::config::VersionsConfig;
use crate::db::VersionType;
use crate::error::VersionError;

/// Asks the operator to confirm a destructive action.
#[async_trait]
pub trait OperatorPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Answers every confirmation with the same value.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl OperatorPrompt for AutoConfirm {
    async fn confirm(&self, message: &str) -> bool {
        tracing::debug!(message, answer = self.0, "Auto-answered confirmation");
        self.0
    }
}

/// Version type for a parent whose stage indicator is `stage`.
pub fn classify_stage(stage: &str, config: &VersionsConfig) -> VersionType {
    if stage.trim() == config.closed_won_stage {
        VersionType::PostSale
    } else {
        VersionType::PreSale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveState {
    Idle,
    InFlight,
    Committed,
}

/// Serializes saves within one session.
///
/// Only one save may be in flight. A save that fails returns the gate to
/// idle so it can be retried; a save that commits closes it for good.
#[derive(Debug)]
pub struct SaveGate {
    state: Mutex<SaveState>,
}

impl Default for SaveGate {
    fn default() -> Self {
        Self {
            state: Mutex::new(SaveState::Idle),
        }
    }
}

impl SaveGate {
    pub fn begin(&self) -> Result<SaveTicket<'_>, VersionError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            SaveState::Idle => {
                *state = SaveState::InFlight;
                Ok(SaveTicket {
                    gate: self,
                    committed: false,
                })
            }
            SaveState::InFlight => Err(VersionError::SaveInFlight),
            SaveState::Committed => Err(VersionError::SessionClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) == SaveState::Committed
    }

    fn set(&self, next: SaveState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

/// An in-flight save. Dropping it without `commit` reopens the gate.
#[derive(Debug)]
pub struct SaveTicket<'a> {
    gate: &'a SaveGate,
    committed: bool,
}

impl SaveTicket<'_> {
    pub fn commit(mut self) {
        self.committed = true;
        self.gate.set(SaveState::Committed);
    }
}

impl Drop for SaveTicket<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.gate.set(SaveState::Idle);
        }
    }
}
