//! Connection target descriptors
//!
//! A connection string has the form
//! `scheme://[user[:password]@][host[:port]]/[digi/...]STATION[?key=value&...]`,
//! for example `ardop:///LA1B?freq=3601.5` or `telnet://cms.winlink.org:8772/wl2k`.
//!
//! Parsing never validates the scheme: unknown transports are accepted
//! here and rejected when a dialer is looked up.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Target parsing error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// Empty connection string
    #[error("empty connection string")]
    Empty,

    /// Not a parseable connection URL
    #[error("malformed target '{raw}': {reason}")]
    Malformed {
        /// The offending string
        raw: String,
        /// Why it was rejected
        reason: String,
    },

    /// Alias chain loops back on itself
    #[error("alias cycle: {}", .0.join(" -> "))]
    AliasCycle(Vec<String>),
}

/// Ordered multi-map of URL query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of `key` with a single value
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.pairs.retain(|(k, _)| k != key);
        self.pairs.push((key.to_string(), value.into()));
    }

    /// Append a value, keeping existing ones
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.pairs.push((key.to_string(), value.into()));
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Iterate over all pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when there are no parameters
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Parsed connection target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Transport scheme, lower case (`ardop`, `telnet`, ...)
    pub scheme: String,
    /// Identity used to log in; defaults to the operator's own call
    pub user: Option<String>,
    /// Optional password from the user-info part
    pub password: Option<String>,
    /// Host or interface address, may be empty until defaults are applied
    pub host: String,
    /// Remote station, upper case
    pub station: String,
    /// Digipeater path (AX.25)
    pub digis: Vec<String>,
    /// Free-form parameters such as `freq` or `baud`
    pub params: Params,
}

impl Target {
    /// Minimum length of a station identifier
    pub const MIN_STATION_LEN: usize = 3;

    /// Parse a connection string
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TargetError::Empty);
        }

        let malformed = |reason: String| TargetError::Malformed {
            raw: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| malformed(e.to_string()))?;

        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(port)) => format!("{h}:{port}"),
            (Some(h), None) => h.to_string(),
            (None, _) => String::new(),
        };

        // The station is the last path element as written; a trailing
        // slash leaves it empty.
        let mut segments: Vec<&str> = url
            .path_segments()
            .map(Iterator::collect)
            .unwrap_or_default();
        let station = segments
            .pop()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("missing target station".into()))?
            .to_uppercase();
        if station.len() < Self::MIN_STATION_LEN {
            return Err(malformed(format!("invalid target station '{station}'")));
        }

        let mut params = Params::new();
        for (k, v) in url.query_pairs() {
            params.add(&k, v.into_owned());
        }

        let decode = |s: &str| {
            percent_decode_str(s)
                .decode_utf8()
                .map(|s| s.into_owned())
                .map_err(|e| malformed(format!("invalid user info: {e}")))
        };
        let user = match url.username() {
            "" => None,
            u => Some(decode(u)?),
        };
        let password = url.password().map(decode).transpose()?;

        Ok(Self {
            scheme: url.scheme().to_lowercase(),
            user,
            password,
            host,
            station,
            digis: segments
                .into_iter()
                .filter(|d| !d.is_empty())
                .map(str::to_uppercase)
                .collect(),
            params,
        })
    }

    /// Resolve aliases, then parse
    pub fn parse_with_aliases(raw: &str, aliases: &AliasTable) -> Result<Self, TargetError> {
        let resolved = aliases.resolve(raw)?;
        Self::parse(&resolved)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }
        write!(f, "{}/", self.host)?;
        for digi in &self.digis {
            write!(f, "{digi}/")?;
        }
        write!(f, "{}", self.station)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{k}={v}")?;
        }
        Ok(())
    }
}

/// Short names for full connection strings
///
/// Resolution follows alias-to-alias chains and stops with
/// [`TargetError::AliasCycle`] when a name repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    /// Create an empty alias table
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or replace an alias
    pub fn insert(&mut self, name: &str, target: &str) -> &mut Self {
        self.aliases.insert(name.to_string(), target.to_string());
        self
    }

    /// Direct lookup, one hop
    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// Number of aliases
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// True when no alias is defined
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Substitute aliases until a non-alias string is reached
    pub fn resolve(&self, raw: &str) -> Result<String, TargetError> {
        let mut current = raw;
        let mut seen = HashSet::new();
        let mut chain = vec![raw.to_string()];

        while let Some(next) = self.get(current) {
            if !seen.insert(current) {
                return Err(TargetError::AliasCycle(chain));
            }
            chain.push(next.to_string());
            current = next;
        }

        Ok(current.to_string())
    }
}

impl From<HashMap<String, String>> for AliasTable {
    fn from(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }
}
