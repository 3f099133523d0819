use std::path::PathBuf;

use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    /// JSON file with KPI targets and interest categories.
    pub dashboard_config: Option<PathBuf>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub countries: Vec<String>,
    pub salespersons: Vec<String>,
    pub products: Vec<String>,
    pub quarters: Vec<String>,
    /// Where to write the filtered rows as CSV.
    pub export: Option<PathBuf>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Config {
    /// Read settings from `PULSEBOARD_*` variables. A positional `input`
    /// argument takes precedence over `PULSEBOARD_INPUT`.
    pub fn from_env(input: Option<String>) -> Result<Self, String> {
        Self::from_lookup(input, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(input: Option<String>, var: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input = input
            .or_else(|| var("PULSEBOARD_INPUT"))
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                "an input CSV is required (first argument or PULSEBOARD_INPUT)".to_string()
            })?;

        let start = parse_date(&var, "PULSEBOARD_START_DATE")?;
        let end = parse_date(&var, "PULSEBOARD_END_DATE")?;
        let date_range = match (start, end) {
            (Some(start), Some(end)) => Some((start, end)),
            (None, None) => None,
            _ => {
                return Err(
                    "PULSEBOARD_START_DATE and PULSEBOARD_END_DATE must be set together"
                        .to_string(),
                )
            }
        };

        Ok(Self {
            input: PathBuf::from(input),
            dashboard_config: var("PULSEBOARD_CONFIG")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            date_range,
            countries: list(&var, "PULSEBOARD_COUNTRIES"),
            salespersons: list(&var, "PULSEBOARD_SALESPERSONS"),
            products: list(&var, "PULSEBOARD_PRODUCTS"),
            quarters: list(&var, "PULSEBOARD_QUARTERS"),
            export: var("PULSEBOARD_EXPORT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            log_format: match var("PULSEBOARD_LOG_FORMAT").as_deref() {
                Some("pretty") => LogFormat::Pretty,
                _ => LogFormat::Json,
            },
        })
    }
}

fn parse_date<F>(var: &F, key: &str) -> Result<Option<NaiveDate>, String>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|e| format!("invalid {key} '{raw}': {e}")),
        None => Ok(None),
    }
}

fn list<F>(var: &F, key: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
