//! IP allow-list for privileged routes.
//!
//! The list is resolved once at startup (hostname resolution is the
//! runtime's job; this type only stores addresses). Loopback callers are
//! always allowed so a local operator can never be locked out.

use std::net::IpAddr;

/// Set of addresses allowed to trigger privileged operations.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    ips: Vec<IpAddr>,
}

impl Allowlist {
    /// Build a list from addresses resolved at startup.
    #[must_use]
    pub fn new(ips: Vec<IpAddr>) -> Self {
        Self { ips }
    }

    /// Whether this caller may use privileged routes.
    #[must_use]
    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        ip.is_loopback() || self.ips.contains(&ip)
    }

    /// Number of configured (non-loopback) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ips.len()
    }

    /// Whether no addresses were configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }
}
