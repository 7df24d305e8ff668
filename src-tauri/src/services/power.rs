//! Screen lock suppression during calls.
//!
//! The hosted page reports `call-connected` / `call-disconnected`; the mediator
//! turns those into either an OS-native inhibition or a wake-lock signal back
//! to the page, depending on the configured method.

use crate::config::ScreenLockInhibitionMethod;
use crate::effects::PageSignal;
use crate::services::inhibitor::{InhibitionHandle, ScreenLockInhibitor};

/// Outcome of a call signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerTransition {
    /// Whether the inhibition state actually changed.
    pub changed: bool,
    /// Signal for the page, signal-based method only.
    pub signal: Option<PageSignal>,
}

impl PowerTransition {
    fn native(changed: bool) -> Self {
        Self {
            changed,
            signal: None,
        }
    }

    fn signalled(signal: PageSignal) -> Self {
        Self {
            changed: true,
            signal: Some(signal),
        }
    }
}

pub struct PowerStateMediator {
    method: ScreenLockInhibitionMethod,
    on_call: bool,
    handle: Option<InhibitionHandle>,
    inhibitor: Box<dyn ScreenLockInhibitor>,
}

impl PowerStateMediator {
    pub fn new(method: ScreenLockInhibitionMethod, inhibitor: Box<dyn ScreenLockInhibitor>) -> Self {
        Self {
            method,
            on_call: false,
            handle: None,
            inhibitor,
        }
    }

    pub fn method(&self) -> ScreenLockInhibitionMethod {
        self.method
    }

    pub fn is_on_call(&self) -> bool {
        self.on_call
    }

    pub fn is_inhibited(&self) -> bool {
        self.handle.is_some()
    }

    pub fn call_connected(&mut self) -> PowerTransition {
        self.on_call = true;
        match self.method {
            ScreenLockInhibitionMethod::OsNative => PowerTransition::native(self.inhibit()),
            ScreenLockInhibitionMethod::WakeLockSignal => {
                log::debug!("Power save is disabled using the wake-lock signal");
                PowerTransition::signalled(PageSignal::EnableWakeLock)
            }
        }
    }

    pub fn call_disconnected(&mut self) -> PowerTransition {
        self.on_call = false;
        match self.method {
            ScreenLockInhibitionMethod::OsNative => PowerTransition::native(self.uninhibit()),
            ScreenLockInhibitionMethod::WakeLockSignal => {
                log::debug!("Power save is restored using the wake-lock signal");
                PowerTransition::signalled(PageSignal::DisableWakeLock)
            }
        }
    }

    /// Drops any held inhibition without touching the call state.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.inhibitor.release(handle);
        }
    }

    fn inhibit(&mut self) -> bool {
        if self.handle.is_some() {
            log::debug!("Screen lock already inhibited");
            return false;
        }

        match self.inhibitor.acquire() {
            Ok(handle) => {
                log::debug!("Power save is disabled using the OS-native inhibitor");
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                log::warn!("{e}");
                false
            }
        }
    }

    fn uninhibit(&mut self) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };

        if !self.inhibitor.is_active(handle) {
            log::debug!("Inhibition {} already ended", handle.id());
            return false;
        }

        self.inhibitor.release(handle);
        log::debug!("Power save is restored using the OS-native inhibitor");
        true
    }
}
