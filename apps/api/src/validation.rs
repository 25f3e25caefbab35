//! Field validators shared by the auth and applicant APIs.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is a valid literal regex")
    })
}

fn profile_regex(host: &str) -> Regex {
    Regex::new(&format!(r"^https?://(www\.)?{}/", regex::escape(host)))
        .expect("profile pattern is built from an escaped host")
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

pub fn is_linkedin_url(url: &str) -> bool {
    static LINKEDIN: OnceLock<Regex> = OnceLock::new();
    LINKEDIN
        .get_or_init(|| profile_regex("linkedin.com"))
        .is_match(url)
}

pub fn is_github_url(url: &str) -> bool {
    static GITHUB: OnceLock<Regex> = OnceLock::new();
    GITHUB.get_or_init(|| profile_regex("github.com")).is_match(url)
}

/// Absolute http(s) URL with a host.
pub fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}
