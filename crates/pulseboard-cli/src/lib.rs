pub mod config;

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use tracing::info;

use pulseboard_core::{
    build_dashboard, export, normalize, DashboardConfig, DashboardReport, FilterSelection,
    RawTable,
};

use crate::config::Config;

/// Translate the configured filters into a core selection.
pub fn selection(cfg: &Config) -> FilterSelection {
    let mut selection = FilterSelection::all()
        .with_countries(cfg.countries.iter().cloned())
        .with_salespersons(cfg.salespersons.iter().cloned())
        .with_products(cfg.products.iter().cloned())
        .with_quarters(cfg.quarters.iter().cloned());
    if let Some((start, end)) = cfg.date_range {
        selection = selection.with_date_range(start, end);
    }
    selection
}

fn load_dashboard_config(cfg: &Config) -> Result<DashboardConfig> {
    match &cfg.dashboard_config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening dashboard config {}", path.display()))?;
            DashboardConfig::from_reader(BufReader::new(file))
                .with_context(|| format!("loading dashboard config {}", path.display()))
        }
        None => Ok(DashboardConfig::default()),
    }
}

/// Load, normalize and summarize the input file; write the filtered export
/// when one is configured.
pub fn run(cfg: &Config) -> Result<DashboardReport> {
    let dashboard_config = load_dashboard_config(cfg)?;

    let raw = RawTable::from_path(&cfg.input)
        .with_context(|| format!("reading {}", cfg.input.display()))?;
    let table = normalize(raw).with_context(|| format!("normalizing {}", cfg.input.display()))?;
    info!(input = %cfg.input.display(), rows = table.len(), "event table loaded");

    let dashboard = build_dashboard(&table, &selection(cfg), &dashboard_config)?;

    if let Some(path) = &cfg.export {
        let bytes = export::to_csv(&dashboard.filtered)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("writing export {}", path.display()))?;
        info!(path = %path.display(), rows = dashboard.filtered.len(), "export written");
    }

    Ok(dashboard.report)
}
