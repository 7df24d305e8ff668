//! Routing of duplicate launches into the running surface.

use std::time::{Duration, Instant};

use crate::effects::Effect;
use crate::services::deep_link::parse_deep_link;

/// How long a routed deep link blocks further ones.
pub const THROTTLE_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct SecondInstanceRouter {
    closed_until: Option<Instant>,
}

impl SecondInstanceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.closed_until.map_or(true, |deadline| now >= deadline)
    }

    /// Effects for a duplicate launch with `args`, given a live surface.
    ///
    /// A deep link navigates only when the throttle is open; the surface is
    /// restored and focused either way.
    pub fn route<S: AsRef<str>>(&mut self, args: &[S], base_url: &str, now: Instant) -> Vec<Effect> {
        log::debug!("second-instance started");
        let mut effects = Vec::with_capacity(2);

        if let Some(url) = parse_deep_link(args, base_url) {
            if self.is_open(now) {
                self.closed_until = Some(now + THROTTLE_WINDOW);
                effects.push(Effect::LoadUrl(url));
            } else {
                log::debug!("Deep link {url} dropped, another one is still loading");
            }
        }

        effects.push(Effect::RestoreAndFocus);
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://teams.microsoft.com";
    const LINK: &str = "https://teams.microsoft.com/l/meetup-join/abc";

    #[test]
    fn launch_without_link_only_restores() {
        let mut router = SecondInstanceRouter::new();
        assert_eq!(
            router.route(&["teams-shell"], BASE, Instant::now()),
            vec![Effect::RestoreAndFocus]
        );
    }

    #[test]
    fn throttle_reopens_after_window() {
        let mut router = SecondInstanceRouter::new();
        let start = Instant::now();

        let first = router.route(&[LINK], BASE, start);
        assert_eq!(
            first,
            vec![Effect::LoadUrl(LINK.to_string()), Effect::RestoreAndFocus]
        );
        assert!(!router.is_open(start + Duration::from_secs(4)));

        assert!(router.is_open(start + THROTTLE_WINDOW));
    }

    #[test]
    fn throttled_launch_still_restores() {
        let mut router = SecondInstanceRouter::new();
        let start = Instant::now();
        router.route(&[LINK], BASE, start);

        assert_eq!(
            router.route(&[LINK], BASE, start + Duration::from_secs(1)),
            vec![Effect::RestoreAndFocus]
        );
    }
}
