//! Event-log analytics behind the sales and interaction dashboard.
//!
//! [`normalize::normalize`] turns a raw CSV table into an [`event::EventTable`]
//! once per load. [`dashboard::build_dashboard`] then runs on every filter
//! change as a pure function of (table, selection, config).

pub mod breakdowns;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod event;
pub mod export;
pub mod filter;
pub mod geo;
pub mod interest;
pub mod kpi;
pub mod normalize;
pub mod scoring;

pub use config::DashboardConfig;
pub use dashboard::{build_dashboard, Dashboard, DashboardReport, Section};
pub use error::CoreError;
pub use event::{EventTable, RawTable};
pub use filter::{filter, FilterSelection};
pub use kpi::{compute_kpis, KpiSet};
pub use normalize::normalize;
