//! Commands exposed to the hosted page.

pub mod calls;
pub mod screen_share;
