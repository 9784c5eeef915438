//! Configuration management for the monitoring client

use crate::errors::{MonitorError, Result};
use crate::site::{DEFAULT_ROSTER, Roster};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Which backend endpoint serves the "last reported" list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportsFeed {
    /// `/monitor/last-reported`
    LastReported,
    /// `/monitor/recent-reports`
    RecentReports,
}

impl ReportsFeed {
    pub fn path_segment(&self) -> &'static str {
        match self {
            ReportsFeed::LastReported => "last-reported",
            ReportsFeed::RecentReports => "recent-reports",
        }
    }
}

impl FromStr for ReportsFeed {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "last-reported" | "last_reported" => Ok(ReportsFeed::LastReported),
            "recent-reports" | "recent_reports" => Ok(ReportsFeed::RecentReports),
            other => Err(MonitorError::Config(format!("unknown reports feed: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the monitoring backend
    pub api_base_url: String,

    /// Sites polled by the batch view
    pub roster: Vec<String>,

    /// Time between the starts of two poll cycles
    pub refresh_interval: Duration,

    /// HTTP timeout for backend requests
    pub http_timeout: Duration,

    /// Cap on the "latest sites checked" list
    pub recent_display_limit: usize,

    /// Cap on the "last reported" list
    pub reported_display_limit: usize,

    /// Endpoint used for the reported-sites feed
    pub reports_feed: ReportsFeed,

    /// Offset of the backend's local clock from UTC, in hours
    pub backend_utc_offset_hours: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            roster: DEFAULT_ROSTER.iter().map(|site| site.to_string()).collect(),
            refresh_interval: Duration::from_secs(300),
            http_timeout: Duration::from_secs(10),
            recent_display_limit: 5,
            reported_display_limit: 5,
            reports_feed: ReportsFeed::LastReported,
            backend_utc_offset_hours: 3,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(base_url) = env::var("MONITOR_API_BASE_URL") {
            config.api_base_url = base_url.trim().trim_end_matches('/').to_string();
        }

        if let Ok(path) = env::var("ROSTER_FILE") {
            config.roster = read_roster_file(Path::new(&path))?;
        }

        if let Ok(roster) = env::var("ROSTER") {
            config.roster = split_roster(&roster);
        }

        if let Ok(interval) = env::var("REFRESH_INTERVAL_SECONDS") {
            if let Ok(seconds) = interval.parse::<u64>() {
                config.refresh_interval = Duration::from_secs(seconds);
            }
        }

        if let Ok(timeout) = env::var("HTTP_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.http_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(limit) = env::var("RECENT_DISPLAY_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.recent_display_limit = limit;
            }
        }

        if let Ok(limit) = env::var("REPORTED_DISPLAY_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.reported_display_limit = limit;
            }
        }

        if let Ok(feed) = env::var("REPORTS_FEED") {
            config.reports_feed = feed.parse()?;
        }

        if let Ok(offset) = env::var("BACKEND_UTC_OFFSET_HOURS") {
            if let Ok(hours) = offset.parse() {
                config.backend_utc_offset_hours = hours;
            }
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.api_base_url.is_empty() {
            return Err("api_base_url cannot be empty".to_string());
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(format!("api_base_url must be an http(s) URL: {}", self.api_base_url));
        }

        if self.refresh_interval.is_zero() {
            return Err("refresh_interval must be greater than 0".to_string());
        }

        if self.http_timeout.is_zero() {
            return Err("http_timeout must be greater than 0".to_string());
        }

        if self.recent_display_limit == 0 || self.reported_display_limit == 0 {
            return Err("display limits must be greater than 0".to_string());
        }

        if !(-12..=14).contains(&self.backend_utc_offset_hours) {
            return Err("backend_utc_offset_hours must be between -12 and 14".to_string());
        }

        self.parsed_roster().map_err(|e| e.to_string())?;

        Ok(())
    }

    /// The configured roster in canonical form.
    pub fn parsed_roster(&self) -> Result<Roster> {
        Roster::from_entries(&self.roster)
    }
}

fn split_roster(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// One site per line; blank lines and `#` comments are ignored.
fn read_roster_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;

    Ok(content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
