use anyhow::Result;
use tracing_subscriber::EnvFilter;

use pulseboard_cli::config::{Config, LogFormat};

fn main() -> Result<()> {
    let input = std::env::args().nth(1);
    let cfg = Config::from_env(input).map_err(|e| anyhow::anyhow!(e))?;

    // Logs go to stderr so stdout carries only the report.
    let filter = EnvFilter::from_default_env().add_directive("pulseboard=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cfg.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }

    let report = pulseboard_cli::run(&cfg)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
