//! Redirect resolution engine.
//!
//! Determines reachability of an http(s) URL with HEAD requests, following
//! redirects manually so that cycles and hop limits can be detected, and
//! classifies the terminal outcome into report findings. Wall time for the
//! whole chain is measured; a chain that resolves but takes too long earns a
//! `Slow page load` warning on top of whatever else it found.

use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use super::fetcher::{FetchError, UrlFetcher};
use super::report::Report;

/// Engine tunables. The hop limit and slow threshold are deployment
/// configuration; these defaults match the service defaults.
#[derive(Debug, Clone)]
pub struct RedirectSettings {
    pub hop_limit: u32,
    pub slow_threshold: Duration,
}

impl Default for RedirectSettings {
    fn default() -> Self {
        Self {
            hop_limit: 20,
            slow_threshold: Duration::from_millis(2500),
        }
    }
}

/// Where the chain ended up, when it ended reachable (2xx).
#[derive(Debug, Clone)]
pub struct TerminalPage {
    pub url: Url,
    pub html: bool,
}

/// Outcome of resolving one URL: the findings so far, plus the terminal
/// page when secondary checks are warranted.
#[derive(Debug)]
pub struct Resolution {
    pub report: Report,
    pub terminal: Option<TerminalPage>,
}

/// Follow the redirect chain from `start` and classify the outcome.
pub async fn resolve(
    fetcher: &dyn UrlFetcher,
    start: Url,
    settings: &RedirectSettings,
) -> Resolution {
    let mut report = Report::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut hops: u32 = 0;
    let mut current = start;
    let mut terminal = None;
    let started = Instant::now();

    loop {
        let outcome = match fetcher.head(&current).await {
            Ok(outcome) => outcome,
            Err(error) => {
                // Transport failures carry no response time worth judging.
                add_transport_error(&mut report, &current, &error);
                return Resolution {
                    report,
                    terminal: None,
                };
            }
        };

        match outcome.status {
            300..=399 if outcome.location.is_some() => {
                let location = outcome.location.as_deref().unwrap_or_default();
                let next = match current.join(location) {
                    Ok(next) => next,
                    Err(_) => {
                        report.add_error(
                            "Broken redirect",
                            format!("The page redirects to an invalid address ({location})."),
                            "Broken redirect",
                            "Link directly to the final page.",
                        );
                        break;
                    }
                };

                // Cycle detection takes priority over the hop limit.
                if visited.contains(next.as_str()) {
                    report.add_error(
                        "Circular redirect",
                        "This link redirects back to a page it already visited.",
                        "Broken redirect",
                        "Link directly to the final page.",
                    );
                    break;
                }
                if hops >= settings.hop_limit {
                    report.add_error(
                        "Too many redirects",
                        format!("This link goes through more than {} redirects.", settings.hop_limit),
                        "Broken redirect",
                        "Link directly to the final page.",
                    );
                    break;
                }

                debug!(from = %current, to = %next, hops, "Following redirect");
                visited.insert(current.as_str().to_string());
                hops += 1;
                current = next;
            }
            200 => {
                terminal = Some(TerminalPage {
                    url: current.clone(),
                    html: outcome.is_html(),
                });
                break;
            }
            status @ 201..=299 => {
                report.add_warning(
                    "Unusual response",
                    format!("The page responded with status {status} rather than 200."),
                    "Unusual response",
                    "Check the link behaves as expected in a browser.",
                );
                terminal = Some(TerminalPage {
                    url: current.clone(),
                    html: outcome.is_html(),
                });
                break;
            }
            status @ 400..=499 => {
                add_client_error(&mut report, status);
                break;
            }
            status @ 500..=599 => {
                report.add_error(
                    format!("{status} (server error)"),
                    "The website encountered an internal error serving this page.",
                    "Website error",
                    "Try the link again later.",
                );
                break;
            }
            status => {
                report.add_error(
                    format!("{status} error"),
                    format!("The page returned an unexpected response ({status})."),
                    "Unusual response",
                    "Check the link behaves as expected in a browser.",
                );
                break;
            }
        }
    }

    // Each hop's latency accumulates; judge the whole chain.
    if started.elapsed() > settings.slow_threshold {
        report.add_warning(
            "Slow page load",
            "This page took a long time to load.",
            "Slow page",
            "Contact the site owner if the page stays slow.",
        );
    }

    Resolution { report, terminal }
}

fn add_transport_error(report: &mut Report, url: &Url, error: &FetchError) {
    match error {
        FetchError::Connect(_) => report.add_error(
            "Connection failed",
            format!("We could not connect to {url}."),
            "Website unavailable",
            "Check the address is correct and the site is online.",
        ),
        FetchError::Tls(_) => report.add_error(
            "Unsafe link",
            "The site's security certificate could not be verified.",
            "Unsafe link",
            "Contact the site owner about their security certificate.",
        ),
        FetchError::Timeout => report.add_error(
            "Timeout error",
            format!("{url} took too long to respond."),
            "Website unavailable",
            "Try the link again later.",
        ),
        FetchError::Other(detail) => report.add_error(
            "Connection failed",
            format!("The request to {url} failed: {detail}."),
            "Website unavailable",
            "Check the address is correct and the site is online.",
        ),
    }
}

fn add_client_error(report: &mut Report, status: u16) {
    let (key, message) = match status {
        401 => (
            "401 error (login required)".to_string(),
            "This page requires you to log in.".to_string(),
        ),
        403 => (
            "403 error (access denied)".to_string(),
            "Access to this page is forbidden.".to_string(),
        ),
        404 => (
            "404 error (page not found)".to_string(),
            "The page could not be found.".to_string(),
        ),
        410 => (
            "410 error (page gone)".to_string(),
            "The page is no longer available.".to_string(),
        ),
        _ => (
            format!("{status} error"),
            format!("The page returned an unexpected response ({status})."),
        ),
    };

    report.add_error(
        key,
        message,
        "Page unavailable",
        "Find the new location of the page and update the link.",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_named_by_recognized_code() {
        let mut report = Report::new();
        add_client_error(&mut report, 404);
        assert!(report.errors.contains_key("404 error (page not found)"));

        let mut report = Report::new();
        add_client_error(&mut report, 418);
        assert!(report.errors.contains_key("418 error"));
    }

    #[test]
    fn transport_errors_map_to_findings() {
        let url = Url::parse("http://example.org/down").unwrap();

        let mut report = Report::new();
        add_transport_error(&mut report, &url, &FetchError::Timeout);
        assert!(report.errors.contains_key("Timeout error"));

        let mut report = Report::new();
        add_transport_error(&mut report, &url, &FetchError::Tls("bad cert".into()));
        assert!(report.errors.contains_key("Unsafe link"));

        let mut report = Report::new();
        add_transport_error(&mut report, &url, &FetchError::Connect("refused".into()));
        assert!(report.errors.contains_key("Connection failed"));
    }

    #[test]
    fn default_settings() {
        let settings = RedirectSettings::default();
        assert_eq!(settings.hop_limit, 20);
        assert_eq!(settings.slow_threshold, Duration::from_millis(2500));
    }
}
