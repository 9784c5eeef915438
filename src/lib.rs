//! Site Monitor Client Library
//!
//! This library polls a website-availability backend for a roster of sites,
//! derives dashboard aggregates from each completed cycle, and drives the
//! single-site lookup and issue-report workflow.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod detail;
pub mod errors;
pub mod fetcher;
pub mod models;
pub mod poller;
pub mod scheduler;
pub mod site;
pub mod store;

#[cfg(test)]
mod test_support;

pub use aggregate::{AggregateViewBuilder, DerivedAggregates, DownSite, Headline};
pub use client::{HttpMonitorApi, MonitorApi};
pub use config::{Config, ReportsFeed};
pub use detail::{DetailState, Notice, SiteDetailController};
pub use errors::{FetchError, FetchResult, MonitorError, Result};
pub use fetcher::StatusFetcher;
pub use models::{AuxiliaryFeeds, FetchOutcome, RosterSnapshot, SiteDetail, StatusSnapshot};
pub use poller::BatchPoller;
pub use scheduler::{RefreshScheduler, SchedulerHandle, SchedulerState};
pub use site::{Roster, SiteId};
pub use store::{DashboardView, SiteCard, ViewStore};
