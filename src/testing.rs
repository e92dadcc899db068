//! Host-side simulation of the flash controller and chip controls
//!
//! `SimPlatform` stands in for the board during tests (and for integrators
//! with the `sim` feature). It records every action in order so a test can
//! check exactly what the erase path did:
//! - write mode changes and page erases
//! - SoftDevice shutdown
//! - the final reset
//!
//! The controller reports busy for a few polls after each command, and
//! counts any command issued before the previous one completed.
//! `system_reset` records `Event::Reset` and then panics with
//! [`SIM_RESET_MSG`]; that is how a never-returning reset surfaces on a host.

use core::cell::Cell;

use heapless::Vec;

use crate::crypto::{KeyedHash, Tag, SECRET_KEY_SIZE};
use crate::errors::{HashFault, RuntimeError};
use crate::flash::{FlashController, WriteMode};
use crate::recovery::SystemControl;

/// Panic payload of a simulated reset.
pub const SIM_RESET_MSG: &str = "simulated system reset";

/// Polls each command stays busy for.
const BUSY_POLLS: u32 = 3;

const EVENT_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Mode(WriteMode),
    ErasePage(u32),
    /// Erase command while the controller was not in erase mode.
    EraseRejected(u32),
    DisableRuntime,
    Reset,
}

pub struct SimPlatform {
    events: Vec<Event, EVENT_CAPACITY>,
    overflowed: bool,
    mode: WriteMode,
    busy_polls: Cell<u32>,
    unpolled: u32,
    runtime_disable: Result<(), RuntimeError>,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            overflowed: false,
            mode: WriteMode::ReadOnly,
            busy_polls: Cell::new(0),
            unpolled: 0,
            runtime_disable: Ok(()),
        }
    }

    /// Make `disable_runtime` fail with `err`.
    pub fn with_runtime_disable_error(mut self, err: RuntimeError) -> Self {
        self.runtime_disable = Err(err);
        self
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// True if more events happened than the log could hold.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Commands issued while an earlier one was still in progress.
    pub fn unpolled_commands(&self) -> u32 {
        self.unpolled
    }

    /// True if any flash mutation was recorded.
    pub fn touched_flash(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, Event::ErasePage(_) | Event::EraseRejected(_)))
    }

    fn record(&mut self, event: Event) {
        if self.events.push(event).is_err() {
            self.overflowed = true;
        }
    }

    fn command(&mut self) {
        if self.busy_polls.get() != 0 {
            self.unpolled += 1;
        }
        self.busy_polls.set(BUSY_POLLS);
    }
}

impl FlashController for SimPlatform {
    fn set_mode(&mut self, mode: WriteMode) {
        self.command();
        self.mode = mode;
        self.record(Event::Mode(mode));
    }

    fn start_page_erase(&mut self, page_address: u32) {
        self.command();
        if self.mode == WriteMode::Erase {
            self.record(Event::ErasePage(page_address));
        } else {
            self.record(Event::EraseRejected(page_address));
        }
    }

    fn is_busy(&self) -> bool {
        let left = self.busy_polls.get();
        if left == 0 {
            return false;
        }
        self.busy_polls.set(left - 1);
        true
    }
}

impl SystemControl for SimPlatform {
    fn disable_runtime(&mut self) -> Result<(), RuntimeError> {
        self.record(Event::DisableRuntime);
        self.runtime_disable
    }

    fn system_reset(&mut self) -> ! {
        self.record(Event::Reset);
        panic!("{}", SIM_RESET_MSG)
    }
}

/// Keyed hash whose primitive always reports a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingHash;

impl KeyedHash for FailingHash {
    fn compute(&self, _message: &[u8], _key: &[u8; SECRET_KEY_SIZE]) -> Result<Tag, HashFault> {
        Err(HashFault)
    }
}

/// Run `f`, which must end in a simulated reset.
#[cfg(test)]
pub fn expect_reset<R>(f: impl FnOnce() -> R) {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    let payload = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("expected a system reset, call returned"),
        Err(payload) => payload,
    };
    let msg = payload
        .downcast_ref::<std::string::String>()
        .map(|s| s.as_str())
        .or_else(|| payload.downcast_ref::<&str>().copied());
    assert_eq!(msg, Some(SIM_RESET_MSG));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_clears_after_polls() {
        let mut sim = SimPlatform::new();
        sim.set_mode(WriteMode::Erase);
        let mut polls = 0;
        while sim.is_busy() {
            polls += 1;
        }
        assert_eq!(polls, BUSY_POLLS);
    }

    #[test]
    fn back_to_back_commands_are_counted() {
        let mut sim = SimPlatform::new();
        sim.set_mode(WriteMode::Erase);
        sim.start_page_erase(0x400);
        assert_eq!(sim.unpolled_commands(), 1);
    }

    #[test]
    fn erase_outside_erase_mode_is_rejected() {
        let mut sim = SimPlatform::new();
        sim.start_page_erase(0x400);
        assert_eq!(sim.events(), &[Event::EraseRejected(0x400)]);
        assert!(sim.touched_flash());
    }
}
