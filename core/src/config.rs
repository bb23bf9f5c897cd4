//! Baseline option values and host-environment settings.
//!
//! # Design
//! `ClientConfig` is an immutable value handed to each client at
//! construction; nothing here is process-global. Environment variables can
//! override any field through figment, e.g. `TRANSFER_RESTRICTED=true` or
//! `TRANSFER_DEFAULTS__TIMEOUT_SECS=5`.

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::options::{Opt, OptionSet};

/// Prefix for environment overrides read by `ClientConfig::from_env`.
pub const ENV_PREFIX: &str = "TRANSFER_";

/// Baseline options applied before any per-client override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub http_headers: Vec<String>,
    pub return_transfer: bool,
    pub max_redirects: u32,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub follow_location: bool,
    pub crlf: bool,
    /// 0 lets the TLS stack choose.
    pub ssl_version: u32,
    pub ssl_verify_peer: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            http_headers: Vec::new(),
            return_transfer: true,
            max_redirects: 10,
            timeout_secs: 30,
            connect_timeout_secs: 30,
            follow_location: true,
            crlf: false,
            ssl_version: 0,
            ssl_verify_peer: false,
        }
    }
}

impl Defaults {
    /// The baseline as an option set, before conditional adjustments.
    pub fn option_set(&self) -> OptionSet {
        let mut set = OptionSet::new();
        set.insert(Opt::HttpHeader, self.http_headers.clone());
        set.insert(Opt::ReturnTransfer, self.return_transfer);
        set.insert(Opt::MaxRedirs, i64::from(self.max_redirects));
        set.insert(Opt::Timeout, saturating_i64(self.timeout_secs));
        set.insert(Opt::ConnectTimeout, saturating_i64(self.connect_timeout_secs));
        set.insert(Opt::FollowLocation, self.follow_location);
        set.insert(Opt::Crlf, self.crlf);
        set.insert(Opt::SslVersion, i64::from(self.ssl_version));
        set.insert(Opt::SslVerifyPeer, self.ssl_verify_peer);
        set
    }
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Everything a client needs besides its engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub defaults: Defaults,
    /// The host forbids following redirects.
    pub restricted: bool,
}

impl ClientConfig {
    /// Figment layering `TRANSFER_*` variables over the built-in defaults.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(ClientConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_env() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }
}
