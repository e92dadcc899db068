//! Erase-and-reset after a failed authentication
//!
//! Once an image has been transferred and fails postvalidation it is not
//! trusted to stay in flash. Recovery runs in a fixed order, each step
//! assuming the previous one finished:
//!
//! 1. Disable the SoftDevice to get the flash controller. A failure here is
//!    logged and ignored; stopping would leave a half-erased device.
//! 2. Erase the bootloader settings page, so a power loss from here on can
//!    not boot the image.
//! 3. Erase every page of the copied image.
//! 4. Reset. Nothing after this runs.

use crate::config::FlashLayout;
use crate::errors::RuntimeError;
use crate::flash::{erase_page, page_span, FlashController};
use crate::log::logger::{log_critical, log_warn};

/// Chip-level controls the recovery path needs besides flash.
pub trait SystemControl {
    /// Shut down the resident runtime component (SoftDevice).
    fn disable_runtime(&mut self) -> Result<(), RuntimeError>;
    /// Hardware reset; never returns.
    fn system_reset(&mut self) -> !;
}

/// Erase the settings page and the image at `[image_address, image_address + image_len)`,
/// then reset.
///
/// `layout` must pass [`FlashLayout::validate`]; `DfuValidator::new` refuses
/// any that does not.
pub fn erase_and_reset<P>(layout: &FlashLayout, image_address: u32, image_len: u32, platform: &mut P) -> !
where
    P: FlashController + SystemControl + ?Sized,
{
    log_critical(
        "recovery",
        format_args!("erasing settings and {} byte image at {:#010x}", image_len, image_address),
    );

    if let Err(RuntimeError(code)) = platform.disable_runtime() {
        log_warn("recovery", format_args!("runtime disable failed ({}), erasing anyway", code));
    }

    erase_page(platform, layout.settings_address);

    for page in page_span(image_address, image_len, layout.code_page_size) {
        erase_page(platform, page);
    }

    platform.system_reset()
}

/// nRF51 board: NVMC flash, SoftDevice shutdown hook, Cortex-M reset.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub struct Nrf51 {
    nvmc: crate::flash::Nvmc,
    disable_softdevice: fn() -> Result<(), RuntimeError>,
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
impl Nrf51 {
    /// `disable_softdevice` wraps `sd_softdevice_disable`.
    ///
    /// # Safety
    /// See [`crate::flash::Nvmc::new`].
    pub unsafe fn new(disable_softdevice: fn() -> Result<(), RuntimeError>) -> Self {
        Self { nvmc: crate::flash::Nvmc::new(), disable_softdevice }
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
impl FlashController for Nrf51 {
    fn set_mode(&mut self, mode: crate::flash::WriteMode) {
        self.nvmc.set_mode(mode)
    }

    fn start_page_erase(&mut self, page_address: u32) {
        self.nvmc.start_page_erase(page_address)
    }

    fn is_busy(&self) -> bool {
        self.nvmc.is_busy()
    }
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
impl SystemControl for Nrf51 {
    fn disable_runtime(&mut self) -> Result<(), RuntimeError> {
        (self.disable_softdevice)()
    }

    fn system_reset(&mut self) -> ! {
        cortex_m::peripheral::SCB::sys_reset()
    }
}
