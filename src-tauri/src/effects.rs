//! Actions the core asks the host to perform.
//!
//! Every handler in [`crate::services`] returns a list of these instead of
//! touching the webview directly, which keeps the policy testable without a
//! running GUI host.

use std::path::PathBuf;

use crate::services::window_state::WindowGeometry;

/// One-way signals sent to the hosted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal {
    PageTitle(String),
    EnableWakeLock,
    DisableWakeLock,
}

impl PageSignal {
    /// Event channel name the page listens on.
    pub fn channel(&self) -> &'static str {
        match self {
            PageSignal::PageTitle(_) => "page-title",
            PageSignal::EnableWakeLock => "enable-wakelock",
            PageSignal::DisableWakeLock => "disable-wakelock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Navigate the primary surface.
    LoadUrl(String),
    Show,
    Hide,
    /// Un-minimize if minimized, else show if hidden to tray, then focus.
    RestoreAndFocus,
    OpenDevTools,
    ClearStorage,
    SendToPage(PageSignal),
    /// Best-effort script run inside the primary surface.
    RunScript(&'static str),
    InjectStyles,
    WatchConnectivity,
    ConfigureSpellCheck(Vec<String>),
    ImportCertificate {
        path: PathBuf,
        password: Option<String>,
    },
    /// Open in the OS default browser; no shared session.
    OpenExternal(String),
    /// Child surface parented to the primary one and sharing its session.
    /// It is a separate top-level webview with no `window.opener`.
    OpenChild(String),
    /// Strip the default menu from the first child surface once it exists.
    StripChildMenu,
    /// Hidden surface that closes itself once loading finishes.
    OpenHiddenAuxiliary {
        url: String,
        reuse_contents: bool,
    },
    PersistGeometry(WindowGeometry),
    Quit,
}
