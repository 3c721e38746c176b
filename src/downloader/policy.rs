// Client spoofing policy
//
// Which YouTube player clients, user agent and headers yt-dlp should present.
// With cookies we look like a logged-in desktop browser; without them the
// mobile app clients are less likely to hit the "confirm you're not a bot" wall.
// This is a workaround for upstream anti-automation measures and will need
// retuning whenever YouTube changes them: bump `revision` when editing.

use serde::Serialize;

/// Identity handed to yt-dlp for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientProfile {
    pub name: &'static str,
    /// Values for `--extractor-args youtube:player_client=...`
    pub player_clients: &'static [&'static str],
    pub user_agent: &'static str,
    /// Extra request headers (`--add-header`)
    pub headers: &'static [(&'static str, &'static str)],
}

impl ClientProfile {
    pub fn player_client_arg(&self) -> String {
        format!("youtube:player_client={}", self.player_clients.join(","))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClientPolicy {
    pub revision: u32,
    pub with_cookies: ClientProfile,
    pub without_cookies: ClientProfile,
}

impl ClientPolicy {
    pub fn select(&self, has_cookies: bool) -> &ClientProfile {
        if has_cookies {
            &self.with_cookies
        } else {
            &self.without_cookies
        }
    }
}

pub const CLIENT_POLICY: ClientPolicy = ClientPolicy {
    revision: 3,
    with_cookies: ClientProfile {
        name: "browser",
        player_clients: &["web", "web_safari"],
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        headers: &[
            ("Accept-Language", "en-US,en;q=0.9"),
            ("Sec-Fetch-Mode", "navigate"),
        ],
    },
    without_cookies: ClientProfile {
        name: "mobile",
        player_clients: &["android", "ios"],
        user_agent: "com.google.android.youtube/19.09.37 (Linux; U; Android 11) gzip",
        headers: &[("Accept-Language", "en-US,en;q=0.9")],
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookies_select_browser_profile() {
        let profile = CLIENT_POLICY.select(true);
        assert_eq!(profile.name, "browser");
        assert!(profile.player_clients.contains(&"web"));
    }

    #[test]
    fn test_no_cookies_select_mobile_profile() {
        let profile = CLIENT_POLICY.select(false);
        assert_eq!(profile.name, "mobile");
        assert_eq!(
            profile.player_client_arg(),
            "youtube:player_client=android,ios"
        );
    }
}
