//! Arbitration of new-window and top-level navigation requests.
//!
//! Meeting-join popups are denied (deep-link routing handles them), blank
//! popups are treated as phantoms whose follow-up request is sent to the
//! external browser, and everything else waits on the user's choice.

use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

use crate::effects::Effect;

pub const BLANK_PAGE: &str = "about:blank";
const BLANK_PAGE_BLOCKED: &str = "about:blank#blocked";

/// Popups into the service's own join path are never opened as windows.
pub const MEETUP_JOIN_PATH: &str = "https://teams.microsoft.com/l/meetup-join";

pub const LINK_PROMPT_TITLE: &str = "Open Link";
pub const LINK_PROMPT_MESSAGE: &str = "How would you like to open the link?\n\n\
     External: Opens in new window without sharing context.\n\
     Internal: Opens in new window sharing context (Unsafe). Useful for SSO.\n\
     Deny: Denies opening the link.";

const STRIP_POLL_INTERVAL: Duration = Duration::from_millis(10);
const STRIP_MAX_RETRIES: usize = 200;

/// The user's answer to the link prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkChoice {
    External,
    Internal,
    /// Also the answer when the prompt is dismissed.
    #[default]
    Deny,
}

impl LinkChoice {
    pub fn label(self) -> &'static str {
        match self {
            LinkChoice::External => "External",
            LinkChoice::Internal => "Internal",
            LinkChoice::Deny => "Deny",
        }
    }

    /// Maps a button label back to a choice; anything unknown is `Deny`.
    pub fn from_label(label: &str) -> Self {
        [LinkChoice::External, LinkChoice::Internal]
            .into_iter()
            .find(|choice| choice.label() == label)
            .unwrap_or_default()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum NewWindowDecision {
    /// Refuse the window; the effects still run.
    Deny(Vec<Effect>),
    /// Ask the user, then call [`PendingLink::resolve`].
    Prompt(PendingLink),
}

/// A link waiting on the user's choice.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending link does nothing until resolved"]
pub struct PendingLink {
    url: String,
}

impl PendingLink {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn resolve(self, choice: LinkChoice) -> Vec<Effect> {
        log::debug!("Link {} resolved as {}", self.url, choice.label());
        match choice {
            LinkChoice::External => vec![Effect::OpenExternal(self.url)],
            LinkChoice::Internal => vec![Effect::OpenChild(self.url), Effect::StripChildMenu],
            LinkChoice::Deny => Vec::new(),
        }
    }
}

/// Surface a top-level request was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    /// Never redirected; its own loads always proceed.
    Primary,
    /// Hidden surface adopted from a blank popup.
    Phantom,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RequestVerdict {
    Proceed,
    /// Cancel the in-app load and run the effects instead.
    Cancel(Vec<Effect>),
}

#[derive(Debug, Default)]
pub struct NavigationPolicy {
    phantom_popups: u32,
}

impl NavigationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phantom popups whose follow-up request has not been externalized yet.
    pub fn phantom_popups(&self) -> u32 {
        self.phantom_popups
    }

    pub fn on_new_window(&mut self, url: &str, has_existing_contents: bool) -> NewWindowDecision {
        if url.starts_with(MEETUP_JOIN_PATH) {
            log::debug!("Captured meetup-join url");
            return NewWindowDecision::Deny(Vec::new());
        }

        if url == BLANK_PAGE || url == BLANK_PAGE_BLOCKED {
            log::debug!("Captured {url}");
            self.phantom_popups += 1;
            return NewWindowDecision::Deny(vec![Effect::OpenHiddenAuxiliary {
                url: url.to_string(),
                reuse_contents: has_existing_contents,
            }]);
        }

        log::debug!("Requesting to open '{url}'");
        NewWindowDecision::Prompt(PendingLink {
            url: url.to_string(),
        })
    }

    /// Top-level requests: the first one after a phantom popup goes to the
    /// external browser.
    ///
    /// Popups are not matched to their follow-up requests; with several
    /// phantoms outstanding the next requests are externalized in arrival
    /// order, whichever popup they came from.
    ///
    /// Only `https://` requests count; `about:`, `data:` and `blob:` loads
    /// proceed without touching the counter.
    pub fn on_before_request(&mut self, url: &str) -> RequestVerdict {
        if self.phantom_popups == 0 || !url.starts_with("https://") {
            return RequestVerdict::Proceed;
        }

        log::debug!("Request to {url} intercepted");
        self.phantom_popups -= 1;
        RequestVerdict::Cancel(vec![Effect::OpenExternal(url.to_string())])
    }
}

/// Access to the primary surface's child surfaces.
pub trait ChildSurfaces {
    /// Removes the menu of the first child surface; `false` if none exists yet.
    fn strip_first_child_menu(&self) -> bool;
}

#[derive(Debug)]
struct NoChildSurface;

/// Waits for a child surface to appear and strips its menu.
///
/// Polls every 10 ms, giving up after 200 retries. Returns whether a menu was
/// stripped.
pub async fn strip_child_menu<C: ChildSurfaces + ?Sized>(children: &C) -> bool {
    let probe = || async move {
        if children.strip_first_child_menu() {
            Ok(())
        } else {
            Err(NoChildSurface)
        }
    };

    let stripped = probe
        .retry(
            ConstantBuilder::default()
                .with_delay(STRIP_POLL_INTERVAL)
                .with_max_times(STRIP_MAX_RETRIES),
        )
        .sleep(tokio::time::sleep)
        .await
        .is_ok();

    if !stripped {
        log::debug!("No child surface appeared, menu left in place");
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::cell::Cell;

    #[rstest]
    #[case("https://teams.microsoft.com/l/meetup-join/19:abc")]
    #[case("https://teams.microsoft.com/l/meetup-join")]
    fn meetup_join_popups_are_denied(#[case] url: &str) {
        let mut policy = NavigationPolicy::new();
        assert_eq!(
            policy.on_new_window(url, false),
            NewWindowDecision::Deny(Vec::new())
        );
        assert_eq!(policy.phantom_popups(), 0);
    }

    #[rstest]
    #[case("about:blank", true)]
    #[case("about:blank#blocked", false)]
    fn blank_popups_become_hidden_phantoms(#[case] url: &str, #[case] reuse: bool) {
        let mut policy = NavigationPolicy::new();
        assert_eq!(
            policy.on_new_window(url, reuse),
            NewWindowDecision::Deny(vec![Effect::OpenHiddenAuxiliary {
                url: url.to_string(),
                reuse_contents: reuse,
            }])
        );
        assert_eq!(policy.phantom_popups(), 1);
    }

    #[test]
    fn other_popups_wait_on_the_prompt() {
        let mut policy = NavigationPolicy::new();
        let NewWindowDecision::Prompt(pending) =
            policy.on_new_window("https://login.example.com/sso", false)
        else {
            panic!("expected a prompt");
        };
        assert_eq!(pending.url(), "https://login.example.com/sso");
        assert_eq!(policy.phantom_popups(), 0);
    }

    #[rstest]
    #[case(LinkChoice::External, vec![Effect::OpenExternal("https://a.example".into())])]
    #[case(
        LinkChoice::Internal,
        vec![Effect::OpenChild("https://a.example".into()), Effect::StripChildMenu]
    )]
    #[case(LinkChoice::Deny, vec![])]
    fn prompt_choices_map_to_effects(#[case] choice: LinkChoice, #[case] expected: Vec<Effect>) {
        let pending = PendingLink {
            url: "https://a.example".into(),
        };
        assert_eq!(pending.resolve(choice), expected);
    }

    #[rstest]
    #[case("External", LinkChoice::External)]
    #[case("Internal", LinkChoice::Internal)]
    #[case("Deny", LinkChoice::Deny)]
    #[case("Cancel", LinkChoice::Deny)]
    #[case("", LinkChoice::Deny)]
    fn unknown_labels_deny(#[case] label: &str, #[case] expected: LinkChoice) {
        assert_eq!(LinkChoice::from_label(label), expected);
    }

    #[test]
    fn requests_proceed_without_phantoms() {
        let mut policy = NavigationPolicy::new();
        assert_eq!(
            policy.on_before_request("https://teams.microsoft.com/"),
            RequestVerdict::Proceed
        );
    }

    #[test]
    fn request_after_phantom_is_externalized_once() {
        let mut policy = NavigationPolicy::new();
        let _ = policy.on_new_window(BLANK_PAGE, false);

        assert_eq!(
            policy.on_before_request("https://docs.example.com/file"),
            RequestVerdict::Cancel(vec![Effect::OpenExternal(
                "https://docs.example.com/file".into()
            )])
        );
        assert_eq!(
            policy.on_before_request("https://teams.microsoft.com/"),
            RequestVerdict::Proceed
        );
    }

    #[rstest]
    #[case("about:blank")]
    #[case("about:blank#blocked")]
    #[case("data:text/html,<p>hi</p>")]
    #[case("blob:https://teams.microsoft.com/6f1c")]
    #[case("http://intranet.example/")]
    fn non_https_requests_leave_the_counter_alone(#[case] url: &str) {
        let mut policy = NavigationPolicy::new();
        let _ = policy.on_new_window(BLANK_PAGE, true);

        assert_eq!(policy.on_before_request(url), RequestVerdict::Proceed);
        assert_eq!(policy.phantom_popups(), 1);
    }

    proptest! {
        #[test]
        fn phantom_counter_never_underflows(popups in 0u32..20, requests in 0u32..40) {
            let mut policy = NavigationPolicy::new();
            for _ in 0..popups {
                let _ = policy.on_new_window(BLANK_PAGE, false);
            }

            let mut externalized = 0;
            for _ in 0..requests {
                if matches!(policy.on_before_request("https://x.example"), RequestVerdict::Cancel(_)) {
                    externalized += 1;
                }
            }

            prop_assert_eq!(externalized, popups.min(requests));
            prop_assert_eq!(policy.phantom_popups(), popups.saturating_sub(requests));
        }
    }

    struct AppearsAfter {
        polls: Cell<usize>,
        ready_at: usize,
    }

    impl ChildSurfaces for AppearsAfter {
        fn strip_first_child_menu(&self) -> bool {
            self.polls.set(self.polls.get() + 1);
            self.polls.get() >= self.ready_at
        }
    }

    #[tokio::test]
    async fn strips_menu_once_child_appears() {
        let children = AppearsAfter {
            polls: Cell::new(0),
            ready_at: 3,
        };
        assert!(strip_child_menu(&children).await);
        assert_eq!(children.polls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_bounded_retries() {
        let children = AppearsAfter {
            polls: Cell::new(0),
            ready_at: usize::MAX,
        };
        assert!(!strip_child_menu(&children).await);
        assert_eq!(children.polls.get(), STRIP_MAX_RETRIES + 1);
    }
}
