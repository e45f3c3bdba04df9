//! Outbound URL classification.
//!
//! Only the cloud metadata endpoints are denied. RFC 1918, loopback and
//! link-local ranges stay reachable: the gateway runs inside a trusted local
//! network and legitimately fetches icons from applications hosted there.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use url::{Host, Url};

/// Literal hosts that are never fetched.
pub const CLOUD_METADATA_HOSTS: &[&str] = &[
    "169.254.169.254", // AWS/GCP/Azure instance metadata (IMDSv1)
    "fd00:ec2::254",   // AWS instance metadata over IPv6
];

/// Immutable set of host literals matched exactly against a parsed URL host.
#[derive(Debug, Clone)]
pub struct BlockedHostSet {
    hosts: Arc<HashSet<String>>,
}

impl BlockedHostSet {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| canonical_literal(h.as_ref()))
            .filter(|h| !h.is_empty())
            .collect();
        Self {
            hosts: Arc::new(hosts),
        }
    }

    pub fn contains(&self, host: &Host<&str>) -> bool {
        self.hosts.contains(&canonical_host(host))
    }
}

impl Default for BlockedHostSet {
    fn default() -> Self {
        Self::new(CLOUD_METADATA_HOSTS)
    }
}

fn canonical_literal(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    match trimmed.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        Ok(ip) => ip.to_string(),
        Err(_) => trimmed.trim_end_matches('.').to_ascii_lowercase(),
    }
}

fn canonical_host(host: &Host<&str>) -> String {
    match host {
        Host::Domain(domain) => domain.trim_end_matches('.').to_ascii_lowercase(),
        Host::Ipv4(v4) => v4.to_string(),
        Host::Ipv6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostVerdict {
    Allowed,
    Unparseable,
    Scheme(String),
    MissingHost,
    MetadataHost(String),
}

impl HostVerdict {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, HostVerdict::Allowed)
    }
}

/// Scheme and host gate consulted before every outbound fetch whose target
/// is influenced by a caller or by remote content.
#[derive(Debug, Clone, Default)]
pub struct HostGuard {
    blocked: BlockedHostSet,
}

impl HostGuard {
    pub fn new(blocked: BlockedHostSet) -> Self {
        Self { blocked }
    }

    /// Classify a raw URL string. Unparseable input fails closed.
    pub fn classify(&self, url: &str) -> HostVerdict {
        match Url::parse(url) {
            Ok(parsed) => self.classify_url(&parsed),
            Err(_) => HostVerdict::Unparseable,
        }
    }

    pub fn classify_url(&self, url: &Url) -> HostVerdict {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return HostVerdict::Scheme(scheme.to_string());
        }
        let Some(host) = url.host() else {
            return HostVerdict::MissingHost;
        };
        if self.blocked.contains(&host) {
            return HostVerdict::MetadataHost(canonical_host(&host));
        }
        HostVerdict::Allowed
    }

    /// `true` when `url` must not be fetched. Every blocked URL is logged.
    pub fn is_blocked(&self, url: &str) -> bool {
        let verdict = self.classify(url);
        log_verdict(&verdict, url);
        verdict.is_blocked()
    }

    pub fn is_blocked_url(&self, url: &Url) -> bool {
        let verdict = self.classify_url(url);
        log_verdict(&verdict, url.as_str());
        verdict.is_blocked()
    }
}

fn log_verdict(verdict: &HostVerdict, url: &str) {
    match verdict {
        HostVerdict::Allowed => {}
        HostVerdict::MetadataHost(host) => {
            tracing::warn!(
                name = "security.metadata_host_blocked",
                url = %url,
                host = %host,
                "Blocked request to cloud metadata endpoint; misconfiguration or probe attempt"
            );
        }
        HostVerdict::Scheme(scheme) => {
            tracing::warn!(
                name = "security.scheme_blocked",
                url = %url,
                scheme = %scheme,
                "Blocked non-HTTP scheme"
            );
        }
        HostVerdict::Unparseable | HostVerdict::MissingHost => {
            tracing::warn!(
                name = "security.url_blocked",
                url = %url,
                reason = ?verdict,
                "Blocked unparseable URL"
            );
        }
    }
}
