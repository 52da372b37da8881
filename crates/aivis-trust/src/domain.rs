use reqwest::Url;

/// Lowercased host of `url` with any leading `www.` removed.
///
/// Accepts bare hosts (`acme.com`) as well as full URLs. Returns `None` for
/// input with no parseable host.
#[must_use]
pub fn domain_of(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed).ok()?
    } else {
        Url::parse(&format!("https://{trimmed}")).ok()?
    };
    let host = parsed.host_str()?.trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").map_or(host.clone(), str::to_string);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_and_lowercases() {
        assert_eq!(
            domain_of("https://WWW.Example.com/path?q=1").as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn accepts_bare_host() {
        assert_eq!(domain_of("acme.com").as_deref(), Some("acme.com"));
        assert_eq!(domain_of("www.acme.com/about").as_deref(), Some("acme.com"));
    }

    #[test]
    fn keeps_other_subdomains() {
        assert_eq!(
            domain_of("http://docs.acme.com").as_deref(),
            Some("docs.acme.com")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(domain_of(""), None);
        assert_eq!(domain_of("https://"), None);
        assert_eq!(domain_of("not a host"), None);
    }
}
