//! Relay-domain filtering of recipients

use tracing::debug;

/// Check `recipient` against an allow-list of domain suffixes.
///
/// An empty list means no filtering and accepts everything. Otherwise the
/// recipient is accepted if it ends with any listed domain. This is a plain
/// suffix test, so `example.com` also admits `user@fakeexample.com`.
pub fn accepts(recipient: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        debug!("no relay domain configured, no filtering");
        return true;
    }

    match allowed_domains
        .iter()
        .find(|domain| recipient.ends_with(domain.as_str()))
    {
        Some(domain) => {
            debug!(recipient, domain = %domain, "recipient matches relay domain");
            true
        }
        None => {
            debug!(recipient, domains = ?allowed_domains, "recipient matches no relay domain");
            false
        }
    }
}

/// Owned allow-list used by the ingestor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayFilter {
    domains: Vec<String>,
}

impl RelayFilter {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    /// Filter that accepts every recipient
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn is_filtering(&self) -> bool {
        !self.domains.is_empty()
    }

    pub fn accepts(&self, recipient: &str) -> bool {
        accepts(recipient, &self.domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_subdomain_is_accepted() {
        assert!(accepts("user@test.example.com", &domains(&["example.com"])));
    }

    #[test]
    fn test_other_domain_is_rejected() {
        assert!(!accepts("user@other.com", &domains(&["example.com"])));
    }

    #[test]
    fn test_empty_list_accepts_all() {
        assert!(accepts("user@x.com", &[]));
        assert!(RelayFilter::accept_all().accepts("anything"));
        assert!(!RelayFilter::accept_all().is_filtering());
    }

    #[test]
    fn test_suffix_match_is_loose() {
        assert!(accepts("user@fakeexample.com", &domains(&["example.com"])));
    }

    #[test]
    fn test_any_domain_matches() {
        let list = domains(&["first.org", "second.org"]);
        assert!(accepts("a@second.org", &list));
        assert!(accepts("a@first.org", &list));
        assert!(!accepts("a@third.org", &list));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert!(!accepts("user@EXAMPLE.COM", &domains(&["example.com"])));
    }

    #[test]
    fn test_filter_keeps_order() {
        let filter = RelayFilter::new(["b.com", "a.com"]);
        assert!(filter.is_filtering());
        assert_eq!(filter.domains(), &["b.com".to_string(), "a.com".to_string()]);
        assert!(filter.accepts("x@a.com"));
        assert!(!filter.accepts("x@c.com"));
    }
}
