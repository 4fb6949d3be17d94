//! Tab URL → tracked domain.
//!
//! Only web pages count. Browser-internal pages (`chrome://`, `about:`,
//! extension pages, `file:`) have no domain and never start a tab session.

use url::Url;

const TRACKED_SCHEMES: &[&str] = &["http", "https"];

/// Returns the lowercase hostname of a web URL, or `None` if the URL is
/// unparseable, not http(s), or has no host.
pub fn domain_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !TRACKED_SCHEMES.contains(&url.scheme()) {
        return None;
    }
    let host = url.host_str()?.trim_end_matches('.');
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hostname() {
        assert_eq!(
            domain_from_url("https://example.com/path?q=1#frag"),
            Some("example.com".to_string())
        );
        assert_eq!(
            domain_from_url("http://sub.Other.org:8080/"),
            Some("sub.other.org".to_string())
        );
    }

    #[test]
    fn keeps_ip_hosts() {
        assert_eq!(
            domain_from_url("http://127.0.0.1:3000/"),
            Some("127.0.0.1".to_string())
        );
    }

    #[test]
    fn ignores_internal_pages() {
        assert_eq!(domain_from_url("chrome://extensions"), None);
        assert_eq!(domain_from_url("about:blank"), None);
        assert_eq!(domain_from_url("chrome-extension://abcdef/popup.html"), None);
        assert_eq!(domain_from_url("file:///home/user/notes.txt"), None);
    }

    #[test]
    fn ignores_garbage() {
        assert_eq!(domain_from_url(""), None);
        assert_eq!(domain_from_url("not a url"), None);
    }

    #[test]
    fn strips_trailing_root_dot() {
        assert_eq!(
            domain_from_url("https://example.com./"),
            Some("example.com".to_string())
        );
    }
}
