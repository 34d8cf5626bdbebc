//! Scheme dispatch: classify a raw URL and select the checking strategy.
//!
//! Parsing happens exactly once; the resulting [`UriChecker`] variant decides
//! whether the URL is terminal (invalid, local file, non-web contact scheme)
//! or continues into the redirect resolution engine. Structural warnings that
//! need no network access (embedded credentials, risky TLDs) are evaluated
//! before any request is made.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::content;
use super::fetcher::UrlFetcher;
use super::http::{self, RedirectSettings};
use super::report::Report;
use super::threat::ThreatLookup;

/// Checking strategy selected from the parsed scheme.
#[derive(Debug)]
enum UriChecker {
    /// Live check over HTTP(S).
    Http(Url),
    /// `file:` URLs are never fetched.
    File,
    /// Non-web schemes such as `mailto:` are contact references, not links.
    UnsupportedScheme(String),
    /// Unparseable, schemeless, or hostless input.
    Invalid,
}

fn classify(raw: &str) -> UriChecker {
    let Ok(url) = Url::parse(raw.trim()) else {
        return UriChecker::Invalid;
    };

    match url.scheme() {
        "http" | "https" => {
            if url.host_str().filter(|host| !host.is_empty()).is_none() {
                UriChecker::Invalid
            } else {
                UriChecker::Http(url)
            }
        }
        "file" => UriChecker::File,
        other => UriChecker::UnsupportedScheme(other.to_string()),
    }
}

/// Engine-wide settings, sourced from the `[checker]` config section.
#[derive(Debug, Clone)]
pub struct CheckerSettings {
    pub hop_limit: u32,
    pub slow_threshold: Duration,
    /// Top-level domains considered risky enough to warn about.
    pub risky_tlds: HashSet<String>,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            hop_limit: 20,
            slow_threshold: Duration::from_millis(2500),
            risky_tlds: ["xxx", "adult", "porn", "sex", "top", "zip"]
                .iter()
                .map(|tld| tld.to_string())
                .collect(),
        }
    }
}

impl CheckerSettings {
    fn redirect_settings(&self) -> RedirectSettings {
        RedirectSettings {
            hop_limit: self.hop_limit,
            slow_threshold: self.slow_threshold,
        }
    }
}

/// The URL health-check engine: scheme dispatch, redirect resolution, and
/// secondary signal checks, producing one [`Report`] per URL.
pub struct LinkChecker {
    fetcher: Arc<dyn UrlFetcher>,
    threat: Arc<dyn ThreatLookup>,
    settings: CheckerSettings,
}

impl LinkChecker {
    pub fn new(
        fetcher: Arc<dyn UrlFetcher>,
        threat: Arc<dyn ThreatLookup>,
        settings: CheckerSettings,
    ) -> Self {
        Self {
            fetcher,
            threat,
            settings,
        }
    }

    /// Evaluate one URL. Findings are data: this never fails, even when the
    /// URL does.
    pub async fn check(&self, raw: &str) -> Report {
        match classify(raw) {
            UriChecker::Invalid => {
                let mut report = Report::new();
                report.add_error(
                    "Invalid URL",
                    "This is not a valid link.",
                    "Invalid link",
                    "Check the address is entered correctly.",
                );
                report
            }
            UriChecker::File => {
                let mut report = Report::new();
                report.add_error(
                    "Not available online",
                    "This links to a file on a local system rather than a website.",
                    "Local file",
                    "Link to a copy hosted on a website.",
                );
                report
            }
            UriChecker::UnsupportedScheme(scheme) => {
                debug!(%scheme, "Non-web scheme treated as contact details");
                let mut report = Report::new();
                report.add_warning(
                    "Contact details",
                    "This links to contact details rather than a web page.",
                    "Contact details",
                    "Check the contact details are up to date.",
                );
                report
            }
            UriChecker::Http(url) => self.check_http(url).await,
        }
    }

    async fn check_http(&self, url: Url) -> Report {
        let mut report = Report::new();

        // Structural warnings are independent of whatever the network says.
        if !url.username().is_empty() || url.password().is_some() {
            report.add_warning(
                "Login details in URL",
                "This link contains a username and password in the address.",
                "Login details in link",
                "Remove the login details from the address.",
            );
        }

        if let Some(tld) = top_level_domain(&url)
            && self.settings.risky_tlds.contains(&tld)
        {
            report.add_warning(
                "Suspicious URL",
                format!("The domain ends in .{tld}, which is often used by untrustworthy sites."),
                "Suspicious domain",
                "Check the site is one you trust before linking to it.",
            );
        }

        let resolution = http::resolve(
            self.fetcher.as_ref(),
            url,
            &self.settings.redirect_settings(),
        )
        .await;
        report.merge(resolution.report);

        // Secondary signals apply only when the chain ended reachable.
        if let Some(terminal) = resolution.terminal {
            if !self.threat.matches(&terminal.url).await.is_empty() {
                report.add_warning(
                    "Flagged as dangerous",
                    "This link has been flagged as containing malware or phishing.",
                    "Dangerous link",
                    "Remove the link.",
                );
            }

            if terminal.html
                && let Ok(body) = self.fetcher.get_body(&terminal.url).await
                && content::has_mature_rating(&body)
            {
                report.add_warning(
                    "Possible adult content",
                    "This page declares a mature content rating.",
                    "Possible adult content",
                    "Check the page is appropriate to link to.",
                );
            }
        }

        report
    }
}

/// Lowercased label after the final dot of the host, when the host is a
/// domain name.
fn top_level_domain(url: &Url) -> Option<String> {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain
            .rsplit('.')
            .next()
            .filter(|tld| !tld.is_empty())
            .map(|tld| tld.to_ascii_lowercase()),
        _ => None,
    }
}
