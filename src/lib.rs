//! Backup-reserve scheduling for home battery sites.
//!
//! Schedules say which reserve percents a site should hold during which
//! local time windows; the reconciler applies the winning schedule to the
//! site's gateway, optionally raising the off-peak reserve ahead of cloudy
//! weather. Live power readings are broken down into source-to-sink flows.

pub mod api;
pub mod codec;
pub mod config;
pub mod controller;
pub mod domain;
pub mod hardware;
pub mod power_flow;
pub mod repo;
pub mod telemetry;
pub mod weather;
