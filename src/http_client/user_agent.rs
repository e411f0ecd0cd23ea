//! User-Agent selection.

/// Agent sent when none is configured.
pub const USER_AGENT: &str = concat!(
    "wayback-mirror/",
    env!("CARGO_PKG_VERSION"),
    " (offline archive reconstruction)"
);

/// Configured value that selects a desktop browser agent.
pub const BROWSER_KEYWORD: &str = "impersonate";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// The User-Agent header for a configured value.
///
/// Unset or blank means the default agent; [`BROWSER_KEYWORD`] (any case)
/// means a desktop browser agent; anything else is sent as given.
pub fn resolve_user_agent(configured: Option<&str>) -> String {
    match configured.map(str::trim) {
        None | Some("") => USER_AGENT.to_string(),
        Some(value) if value.eq_ignore_ascii_case(BROWSER_KEYWORD) => {
            BROWSER_USER_AGENT.to_string()
        }
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_or_blank_uses_default() {
        assert_eq!(resolve_user_agent(None), USER_AGENT);
        assert_eq!(resolve_user_agent(Some("  ")), USER_AGENT);
        assert!(USER_AGENT.starts_with("wayback-mirror/"));
    }

    #[test]
    fn browser_keyword_ignores_case() {
        let agent = resolve_user_agent(Some("Impersonate"));
        assert!(agent.starts_with("Mozilla/5.0"));
        assert_eq!(agent, resolve_user_agent(Some(BROWSER_KEYWORD)));
    }

    #[test]
    fn custom_agent_is_trimmed() {
        assert_eq!(resolve_user_agent(Some(" MyBot/1.0 ")), "MyBot/1.0");
    }
}
