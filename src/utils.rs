// Utility functions
use chrono::Local;
use url::Url;

/// Timestamp-based id for one invocation, e.g. `20240105_142233`.
pub fn timestamp_run_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Returns the trimmed text, or `None` for blank and "n/a"-style placeholders.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    let v = value?.trim();
    if v.is_empty() || is_placeholder(v) {
        None
    } else {
        Some(v)
    }
}

fn is_placeholder(text: &str) -> bool {
    let squashed: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    matches!(
        squashed.as_str(),
        "-" | "–" | "—" | "n/a" | "na" | "none" | "unknown" | "notspecified"
    )
}

/// Host part of a URL without a leading `www.`; `None` for non-http URLs.
pub fn host_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    (!host.is_empty()).then(|| host.to_string())
}
