//! Tracksync Core - Headless Client Core for Time-Tracking Sync
//!
//! This crate provides the client-side core of tracksync, a personal
//! Toggl ↔ Jira time-tracking sync tool, completely independent of any UI
//! framework. It can drive a TUI, web UI, native GUI, or run headless for
//! testing/automation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       UI Surfaces                        │
//! │        (render days, progress bars, error banners)       │
//! │                           │                              │
//! │        refresh()/sync() (down)   DayEvent (up)           │
//! └───────────────────────────┼──────────────────────────────┘
//!                             │
//! ┌───────────────────────────┼──────────────────────────────┐
//! │                     TRACKSYNC CORE                       │
//! │  ┌────────────────────────┴───────────────────────────┐  │
//! │  │                      DaySync                       │  │
//! │  │  ┌───────────┐  ┌─────────────┐  ┌──────────────┐  │  │
//! │  │  │ WorkQueue │  │ DiffService │  │  read_lines  │  │  │
//! │  │  │(scheduler)│  │  (SyncApi)  │  │ (NDJSON body)│  │  │
//! │  │  └───────────┘  └─────────────┘  └──────────────┘  │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └───────────────────────────┼──────────────────────────────┘
//!                             │ HTTP
//!                   sync server (/api/settings,
//!                   /api/diff, /api/diff/sync)
//! ```
//!
//! # Key Types
//!
//! - [`WorkQueue`]: bounded-concurrency job scheduler with two-tier priority
//! - [`read_lines`]: incremental newline-delimited record streaming
//! - [`SyncApi`] / [`DiffService`]: the sync-server HTTP boundary
//! - [`DaySync`]: per-day refresh/sync orchestration, reporting [`DayEvent`]s
//! - [`ClientConfig`]: TOML + environment configuration
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use tracksync_core::{
//!     load_config, DaySync, Priority, SchedulerConfig, SyncApi, WorkQueue,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!
//!     // One queue per session; every day job funnels through it.
//!     let queue = WorkQueue::new(SchedulerConfig::new().with_workers(config.workers))?;
//!     let api = Arc::new(SyncApi::from_config(&config));
//!
//!     let (tx, mut rx) = mpsc::channel(64);
//!     let days = DaySync::new(api, queue, tx);
//!
//!     // Passive refresh of today; a user click would use Priority::High.
//!     let today = chrono::Local::now().date_naive();
//!     days.refresh(today, Priority::Normal);
//!
//!     while let Some(event) = rx.recv().await {
//!         // Render the event to the surface.
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`scheduler`]: bounded-concurrency work queue with priority promotion
//! - [`lines`]: streaming line decoder for newline-delimited JSON bodies
//! - [`api`]: sync-server HTTP client and wire types
//! - [`day`]: day-sync orchestration and day-window planning
//! - [`config`]: TOML configuration with environment overrides
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any UI framework. It's pure
//! client logic that can be used anywhere.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod day;
pub mod lines;
pub mod scheduler;

// Re-exports for convenience
pub use api::{
    ActionRecord, ApiError, DayDiff, DiffRow, DiffService, Message, MessageLevel, Settings,
    SyncApi, SyncProgress, WorklogEntry,
};
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ClientToml, ConfigError,
    DEFAULT_BASE_URL,
};
pub use day::{day_range, DayEvent, DaySync, DayWindow};
pub use lines::read_lines;
pub use scheduler::{
    JobHandle, JobOutcome, Priority, SchedulerConfig, SchedulerError, WorkQueue,
};
