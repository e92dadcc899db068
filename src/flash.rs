//! Flash controller access for the erase path
//!
//! The gate only ever erases. [`erase_page`] drives a [`FlashController`]
//! through the same sequence the nRF51 NVMC needs:
//!
//! 1. enable erase, wait for READY
//! 2. write the page address to ERASEPAGE, wait for READY
//! 3. restore read-only, wait for READY
//!
//! Waits are unbounded busy polls. A controller that never becomes ready
//! hangs the device; there is nothing safer to fall back to at this point.
//!
//! [`Nvmc`] is the memory-mapped implementation. Host tests use
//! `testing::SimPlatform`.

use core::iter::StepBy;
use core::ops::Range;
use core::ptr;

/// NVMC write-enable modes (`CONFIG.WEN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WriteMode {
    ReadOnly = 0,
    Write = 1,
    Erase = 2,
}

pub trait FlashController {
    fn set_mode(&mut self, mode: WriteMode);
    /// Start erasing the page at `page_address`. Completion is reported by
    /// `is_busy` going false.
    fn start_page_erase(&mut self, page_address: u32);
    fn is_busy(&self) -> bool;
}

#[inline]
fn wait_ready<F: FlashController + ?Sized>(flash: &F) {
    while flash.is_busy() {
        core::hint::spin_loop();
    }
}

/// Erase one page and leave the controller read-only.
pub fn erase_page<F: FlashController + ?Sized>(flash: &mut F, page_address: u32) {
    flash.set_mode(WriteMode::Erase);
    wait_ready(flash);

    flash.start_page_erase(page_address);
    wait_ready(flash);

    flash.set_mode(WriteMode::ReadOnly);
    wait_ready(flash);
}

/// Base addresses of every page intersecting `[start, start + len)`.
///
/// A region ending part way into a page still yields that page; erase is
/// page granular. An empty region yields nothing.
pub fn page_span(start: u32, len: u32, page_size: u32) -> StepBy<Range<u32>> {
    debug_assert!(page_size.is_power_of_two());
    let first = start & !(page_size - 1);
    let end = if len == 0 { first } else { start.saturating_add(len) };
    (first..end).step_by(page_size as usize)
}

/// nRF51 NVMC register block base.
pub const NVMC_BASE: usize = 0x4001_E000;

const NVMC_READY: usize = 0x400;
const NVMC_CONFIG: usize = 0x504;
const NVMC_ERASEPAGE: usize = 0x508;

const READY_BUSY: u32 = 0;

/// Memory-mapped nRF51 non-volatile memory controller.
pub struct Nvmc {
    base: usize,
}

impl Nvmc {
    /// # Safety
    /// Caller must own the NVMC exclusively (SoftDevice disabled) and the
    /// register block must be mapped at `NVMC_BASE`.
    pub const unsafe fn new() -> Self {
        Self { base: NVMC_BASE }
    }

    #[inline]
    fn reg(&self, offset: usize) -> *mut u32 {
        (self.base + offset) as *mut u32
    }
}

impl FlashController for Nvmc {
    fn set_mode(&mut self, mode: WriteMode) {
        // SAFETY: register address derived from the block handed to `new`.
        unsafe { ptr::write_volatile(self.reg(NVMC_CONFIG), mode as u32) }
    }

    fn start_page_erase(&mut self, page_address: u32) {
        // SAFETY: as above; ERASEPAGE takes the page address directly.
        unsafe { ptr::write_volatile(self.reg(NVMC_ERASEPAGE), page_address) }
    }

    fn is_busy(&self) -> bool {
        // SAFETY: READY is a read-only status register.
        unsafe { ptr::read_volatile(self.reg(NVMC_READY)) == READY_BUSY }
    }
}
