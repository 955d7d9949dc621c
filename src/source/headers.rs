//! Browser-like request headers for fetching source images
//!
//! Image hosts often refuse hot-linked requests that lack a plausible
//! `Referer`. Hosts that need the relay get a same-site `Referer`/`Origin`
//! pointing at their own front page.

use super::SourceHeaders;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";
const ACCEPT: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

/// Default headers for a source URL
///
/// `relay_host` is the configured relay host the URL matched, if any.
pub fn default_source_headers(source_url: &str, relay_host: Option<&str>) -> SourceHeaders {
    let mut headers = SourceHeaders::new();
    headers.insert("User-Agent".into(), USER_AGENT.into());
    headers.insert("Accept".into(), ACCEPT.into());
    headers.insert("Sec-Fetch-Dest".into(), "image".into());
    headers.insert("Sec-Fetch-Mode".into(), "cors".into());

    match relay_host {
        Some(host) => {
            headers.insert("Referer".into(), format!("https://www.{}/", host));
            headers.insert("Origin".into(), format!("https://www.{}", host));
            headers.insert("Sec-Fetch-Site".into(), "same-site".into());
        }
        None => {
            headers.insert("Referer".into(), source_url.to_string());
            headers.insert("Sec-Fetch-Site".into(), "cross-site".into());
        }
    }

    headers
}

/// Overlay caller headers on the defaults; names compare case-insensitively
pub fn merge_headers(mut base: SourceHeaders, overrides: Option<&SourceHeaders>) -> SourceHeaders {
    if let Some(overrides) = overrides {
        for (name, value) in overrides {
            base.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            base.insert(name.clone(), value.clone());
        }
    }
    base
}
