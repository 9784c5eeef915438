//! Canonical site identifiers and the tracked roster

use crate::errors::{MonitorError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Sites shown on the dashboard when no roster is configured.
pub const DEFAULT_ROSTER: &[&str] = &[
    "google.com",
    "facebook.com",
    "x.com",
    "netflix.com",
    "youtube.com",
    "gmail.com",
    "outlook.com",
    "steamcommunity.com",
    "whatsapp.com",
    "live.com",
    "instagram.com",
    "dropbox.com",
    "battle.net",
    "vk.com",
    "reddit.com",
    "pinterest.com",
    "spotify.com",
    "twitch.tv",
    "web.telegram.org",
    "ya.ru",
    "faceit.com",
];

/// A normalized hostname used as the key for everything site-related.
///
/// Two spellings of the same host (`https://Example.com/`, `example.com`)
/// always produce the same `SiteId`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteId(String);

impl SiteId {
    /// Normalize raw user or feed input into a site identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize(raw);

        if normalized.is_empty() || !normalized.contains('.') {
            return Err(MonitorError::InvalidSite(raw.to_string()));
        }

        if normalized.chars().any(char::is_whitespace) {
            return Err(MonitorError::InvalidSite(raw.to_string()));
        }

        Ok(SiteId(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strip scheme and trailing slashes, lowercase the rest.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();

    let without_scheme = ["https://", "http://"]
        .iter()
        .find_map(|scheme| lower.strip_prefix(scheme))
        .unwrap_or(lower.as_str());

    without_scheme.trim_end_matches('/').to_string()
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SiteId {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        SiteId::parse(s)
    }
}

impl AsRef<str> for SiteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for SiteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SiteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SiteId::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Ordered, duplicate-free set of sites polled by the batch view.
///
/// Sites can be added during a session but never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    sites: Vec<SiteId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from raw entries, failing on the first invalid one.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roster = Roster::new();
        for entry in entries {
            roster.add(SiteId::parse(entry.as_ref())?);
        }
        Ok(roster)
    }

    /// Add a site. Returns `false` if it was already tracked.
    pub fn add(&mut self, site: SiteId) -> bool {
        if self.contains(&site) {
            return false;
        }
        self.sites.push(site);
        true
    }

    pub fn contains(&self, site: &SiteId) -> bool {
        self.sites.contains(site)
    }

    pub fn sites(&self) -> &[SiteId] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteId> {
        self.sites.iter()
    }
}
