//! Shell services, independent of the GUI host.
//!
//! Each service turns host callbacks into decisions and [`crate::effects::Effect`]s;
//! the `host` module is the only place that touches the webview.

pub mod certificate;
pub mod deep_link;
pub mod inhibitor;
pub mod navigation;
pub mod power;
pub mod second_instance;
pub mod spellcheck;
pub mod window;
pub mod window_state;
