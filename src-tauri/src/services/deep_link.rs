//! Meeting-join deep links found in process arguments.
//!
//! Shared by startup and the second-instance router.

/// Web form of a meeting-join link, accepted as-is.
pub const MEETUP_JOIN_URL_PREFIX: &str = "https://teams.microsoft.com/l/meetup-join/";

/// Custom-scheme form, rewritten onto the configured base URL.
pub const MEETUP_JOIN_SCHEME_PREFIX: &str = "msteams:/l/meetup-join/";

const CUSTOM_SCHEME: &str = "msteams:";

/// Returns the navigation target for the first meeting-join argument, if any.
pub fn parse_deep_link<S: AsRef<str>>(args: &[S], base_url: &str) -> Option<String> {
    log::debug!("Scanning {} argument(s) for a deep link", args.len());

    for arg in args.iter().map(AsRef::as_ref) {
        if arg.starts_with(MEETUP_JOIN_URL_PREFIX) {
            log::debug!("meetup-join argument received with https protocol");
            return Some(arg.to_string());
        }
        if arg.starts_with(MEETUP_JOIN_SCHEME_PREFIX) {
            log::debug!("meetup-join argument received with msteams protocol");
            let path = &arg[CUSTOM_SCHEME.len()..];
            return Some(format!("{}{path}", base_url.trim_end_matches('/')));
        }
    }

    None
}
