//! Day-state machine.
//!
//! The four functionalities ([`crate::config::Functionality`]) are not
//! distinct types: a single
//! [`crate::party::Party`] is parameterized by that tag, and
//! message-building/handling branches on it instead of going through
//! virtual dispatch. This module owns only the shared day-level state
//! machine, since that part is identical across all four variants.

use crate::config::Functionality;
use crate::error::SessionError;

/// The day-level state machine: `WAIT_I -> WAIT_II -> (WAIT_III ->
/// WAIT_IV)? -> DAY_DONE -> WAIT_I`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    WaitI,
    WaitII,
    WaitIII,
    WaitIV,
    DayDone,
}

impl DayState {
    pub fn initial() -> Self {
        DayState::WaitI
    }

    fn label(&self) -> &'static str {
        match self {
            DayState::WaitI => "WAIT_I",
            DayState::WaitII => "WAIT_II",
            DayState::WaitIII => "WAIT_III",
            DayState::WaitIV => "WAIT_IV",
            DayState::DayDone => "DAY_DONE",
        }
    }

    /// Advance on receipt of MessageI. Valid only from `WAIT_I`.
    pub fn on_message_i(self) -> Result<Self, SessionError> {
        self.expect(DayState::WaitI)?;
        Ok(DayState::WaitII)
    }

    /// Advance on receipt of MessageII. For PSI/CA this reaches `DAY_DONE`
    /// directly; for SUM/SS it proceeds to `WAIT_III`.
    pub fn on_message_ii(self, func: Functionality) -> Result<Self, SessionError> {
        self.expect(DayState::WaitII)?;
        Ok(if func.has_round_two() {
            DayState::WaitIII
        } else {
            DayState::DayDone
        })
    }

    pub fn on_message_iii(self) -> Result<Self, SessionError> {
        self.expect(DayState::WaitIII)?;
        Ok(DayState::WaitIV)
    }

    pub fn on_message_iv(self) -> Result<Self, SessionError> {
        self.expect(DayState::WaitIV)?;
        Ok(DayState::DayDone)
    }

    /// Reset to `WAIT_I` for the next day; valid only from `DAY_DONE`.
    pub fn advance_day(self) -> Result<Self, SessionError> {
        self.expect(DayState::DayDone)?;
        Ok(DayState::WaitI)
    }

    fn expect(self, want: DayState) -> Result<(), SessionError> {
        if self == want {
            Ok(())
        } else {
            Err(SessionError::OutOfOrderMessage {
                expected: want.label(),
                got: self.label(),
            })
        }
    }
}
