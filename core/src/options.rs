//! Recognized transfer options and the merged option set.
//!
//! # Design
//! Callers name options with the familiar `CURLOPT_*` strings, but the set
//! handed to an engine is keyed by the closed `Opt` enum. Resolution happens
//! once, at merge time, so a typo surfaces as `ConfigError::UnknownOption`
//! from `execute()` rather than as a silently ignored entry.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A transfer option the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opt {
    Url,
    HttpHeader,
    ReturnTransfer,
    MaxRedirs,
    Timeout,
    TimeoutMs,
    ConnectTimeout,
    ConnectTimeoutMs,
    FollowLocation,
    Crlf,
    SslVersion,
    SslVerifyPeer,
    CustomRequest,
    PostFields,
    UserAgent,
    Referer,
    NoBody,
}

/// Shape of value an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Flag,
    Integer,
    Text,
    List,
}

impl ValueKind {
    fn describe(self) -> &'static str {
        match self {
            ValueKind::Flag => "a flag",
            ValueKind::Integer => "an integer",
            ValueKind::Text => "text",
            ValueKind::List => "a list",
        }
    }
}

impl Opt {
    pub const ALL: [Opt; 17] = [
        Opt::Url,
        Opt::HttpHeader,
        Opt::ReturnTransfer,
        Opt::MaxRedirs,
        Opt::Timeout,
        Opt::TimeoutMs,
        Opt::ConnectTimeout,
        Opt::ConnectTimeoutMs,
        Opt::FollowLocation,
        Opt::Crlf,
        Opt::SslVersion,
        Opt::SslVerifyPeer,
        Opt::CustomRequest,
        Opt::PostFields,
        Opt::UserAgent,
        Opt::Referer,
        Opt::NoBody,
    ];

    /// Canonical upper-case name, e.g. `CURLOPT_FOLLOWLOCATION`.
    pub fn name(self) -> &'static str {
        match self {
            Opt::Url => "CURLOPT_URL",
            Opt::HttpHeader => "CURLOPT_HTTPHEADER",
            Opt::ReturnTransfer => "CURLOPT_RETURNTRANSFER",
            Opt::MaxRedirs => "CURLOPT_MAXREDIRS",
            Opt::Timeout => "CURLOPT_TIMEOUT",
            Opt::TimeoutMs => "CURLOPT_TIMEOUT_MS",
            Opt::ConnectTimeout => "CURLOPT_CONNECTTIMEOUT",
            Opt::ConnectTimeoutMs => "CURLOPT_CONNECTTIMEOUT_MS",
            Opt::FollowLocation => "CURLOPT_FOLLOWLOCATION",
            Opt::Crlf => "CURLOPT_CRLF",
            Opt::SslVersion => "CURLOPT_SSLVERSION",
            Opt::SslVerifyPeer => "CURLOPT_SSL_VERIFYPEER",
            Opt::CustomRequest => "CURLOPT_CUSTOMREQUEST",
            Opt::PostFields => "CURLOPT_POSTFIELDS",
            Opt::UserAgent => "CURLOPT_USERAGENT",
            Opt::Referer => "CURLOPT_REFERER",
            Opt::NoBody => "CURLOPT_NOBODY",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Opt::ReturnTransfer
            | Opt::FollowLocation
            | Opt::Crlf
            | Opt::SslVerifyPeer
            | Opt::NoBody => ValueKind::Flag,
            Opt::MaxRedirs
            | Opt::Timeout
            | Opt::TimeoutMs
            | Opt::ConnectTimeout
            | Opt::ConnectTimeoutMs
            | Opt::SslVersion => ValueKind::Integer,
            Opt::Url | Opt::CustomRequest | Opt::PostFields | Opt::UserAgent | Opt::Referer => {
                ValueKind::Text
            }
            Opt::HttpHeader => ValueKind::List,
        }
    }

    /// Check `value` against this option's kind.
    ///
    /// Flags and integers convert into each other (non-zero is on); every
    /// other mismatch is rejected.
    pub fn coerce(self, value: OptionValue) -> Result<OptionValue, ConfigError> {
        match (self.kind(), value) {
            (ValueKind::Flag, OptionValue::Flag(b)) => Ok(OptionValue::Flag(b)),
            (ValueKind::Flag, OptionValue::Integer(n)) => Ok(OptionValue::Flag(n != 0)),
            (ValueKind::Integer, OptionValue::Integer(n)) => Ok(OptionValue::Integer(n)),
            (ValueKind::Integer, OptionValue::Flag(b)) => Ok(OptionValue::Integer(i64::from(b))),
            (ValueKind::Text, OptionValue::Text(s)) => Ok(OptionValue::Text(s)),
            (ValueKind::List, OptionValue::List(l)) => Ok(OptionValue::List(l)),
            (expected, found) => Err(ConfigError::InvalidValue {
                option: self.name(),
                expected: expected.describe(),
                found: found.kind().describe(),
            }),
        }
    }
}

impl FromStr for Opt {
    type Err = ConfigError;

    /// Resolve a key case-insensitively.
    fn from_str(key: &str) -> Result<Self, Self::Err> {
        Opt::ALL
            .into_iter()
            .find(|opt| opt.name().eq_ignore_ascii_case(key))
            .ok_or_else(|| ConfigError::UnknownOption {
                key: key.to_string(),
            })
    }
}

impl AsRef<str> for Opt {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

impl fmt::Display for Opt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a single option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl OptionValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            OptionValue::Flag(_) => ValueKind::Flag,
            OptionValue::Integer(_) => ValueKind::Integer,
            OptionValue::Text(_) => ValueKind::Text,
            OptionValue::List(_) => ValueKind::List,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Flag(b)
    }
}

impl From<i64> for OptionValue {
    fn from(n: i64) -> Self {
        OptionValue::Integer(n)
    }
}

impl From<i32> for OptionValue {
    fn from(n: i32) -> Self {
        OptionValue::Integer(i64::from(n))
    }
}

impl From<u32> for OptionValue {
    fn from(n: u32) -> Self {
        OptionValue::Integer(i64::from(n))
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Text(s)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(l: Vec<String>) -> Self {
        OptionValue::List(l)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(l: Vec<&str>) -> Self {
        OptionValue::List(l.into_iter().map(str::to_string).collect())
    }
}

/// Fully merged options for one execution.
///
/// Values are already checked against their option's kind, so the typed
/// accessors return `None` only when the option is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: BTreeMap<Opt, OptionValue>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, checking it against the option's kind.
    pub fn set(&mut self, opt: Opt, value: impl Into<OptionValue>) -> Result<(), ConfigError> {
        let value = opt.coerce(value.into())?;
        self.entries.insert(opt, value);
        Ok(())
    }

    /// Insert a value whose kind is known to match.
    pub(crate) fn insert(&mut self, opt: Opt, value: impl Into<OptionValue>) {
        let value = value.into();
        debug_assert_eq!(opt.kind(), value.kind(), "{opt} given mismatched value");
        self.entries.insert(opt, value);
    }

    pub fn get(&self, opt: Opt) -> Option<&OptionValue> {
        self.entries.get(&opt)
    }

    pub fn contains(&self, opt: Opt) -> bool {
        self.entries.contains_key(&opt)
    }

    pub fn flag(&self, opt: Opt) -> Option<bool> {
        match self.entries.get(&opt) {
            Some(OptionValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn integer(&self, opt: Opt) -> Option<i64> {
        match self.entries.get(&opt) {
            Some(OptionValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, opt: Opt) -> Option<&str> {
        match self.entries.get(&opt) {
            Some(OptionValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn list(&self, opt: Opt) -> Option<&[String]> {
        match self.entries.get(&opt) {
            Some(OptionValue::List(l)) => Some(l),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Opt, &OptionValue)> {
        self.entries.iter().map(|(opt, value)| (*opt, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
