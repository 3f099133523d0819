//! KPI targets and the good/amber/bad banding against them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::filter::{DateRange, FilterSelection};
use crate::kpi::{KpiName, KpiSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Good,
    Amber,
    Bad,
    Undefined,
}

/// Target tier picked from the length of the selected period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPeriod {
    Daily,
    Monthly,
    Annual,
}

impl TargetPeriod {
    /// ≤1 day → daily, ≤31 → monthly, >300 → annual, anything between falls
    /// back to monthly. No range at all is treated as monthly.
    pub fn for_range(range: Option<&DateRange>) -> Self {
        match range.map(DateRange::span_days) {
            Some(days) if days <= 1 => TargetPeriod::Daily,
            Some(days) if days <= 31 => TargetPeriod::Monthly,
            Some(days) if days > 300 => TargetPeriod::Annual,
            _ => TargetPeriod::Monthly,
        }
    }
}

/// How a value is compared with its target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdRule {
    /// good if value ≥ target × good_factor, amber if ≥ target × amber_factor.
    Factor { good_factor: f64, amber_factor: f64 },
    /// good if value ≥ target + good_offset, amber if ≥ target + amber_offset.
    Offset { good_offset: f64, amber_offset: f64 },
}

impl ThresholdRule {
    pub fn default_for(kpi: KpiName) -> Self {
        if kpi.is_rate() {
            ThresholdRule::Offset {
                good_offset: 0.0,
                amber_offset: -1.0,
            }
        } else {
            ThresholdRule::Factor {
                good_factor: 1.2,
                amber_factor: 0.8,
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (good, amber) = match *self {
            ThresholdRule::Factor {
                good_factor,
                amber_factor,
            } => (good_factor, amber_factor),
            ThresholdRule::Offset {
                good_offset,
                amber_offset,
            } => (good_offset, amber_offset),
        };
        if !good.is_finite() || !amber.is_finite() {
            return Err(CoreError::InvalidConfig(
                "threshold values must be finite".to_string(),
            ));
        }
        if amber > good {
            return Err(CoreError::InvalidConfig(format!(
                "amber threshold {amber} is above good threshold {good}"
            )));
        }
        Ok(())
    }

    /// Boundary values belong to the higher band.
    pub fn classify(&self, value: f64, target: f64) -> Band {
        let (good_at, amber_at) = match *self {
            ThresholdRule::Factor {
                good_factor,
                amber_factor,
            } => (target * good_factor, target * amber_factor),
            ThresholdRule::Offset {
                good_offset,
                amber_offset,
            } => (target + good_offset, target + amber_offset),
        };
        if value >= good_at {
            Band::Good
        } else if value >= amber_at {
            Band::Amber
        } else {
            Band::Bad
        }
    }

    pub fn delta(&self, value: f64, target: f64) -> Delta {
        match self {
            ThresholdRule::Factor { .. } if target != 0.0 => {
                Delta::Percent((value - target) / target * 100.0)
            }
            _ => Delta::Absolute(value - target),
        }
    }
}

/// Difference from target as shown next to a KPI card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum Delta {
    /// No target: the value itself.
    Raw(f64),
    /// Points or hours above/below target.
    Absolute(f64),
    /// Percentage deviation from target.
    Percent(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiTarget {
    #[serde(default)]
    pub daily: Option<f64>,
    #[serde(default)]
    pub monthly: Option<f64>,
    #[serde(default)]
    pub annual: Option<f64>,
    /// Falls back to [`ThresholdRule::default_for`] when omitted.
    #[serde(default)]
    pub rule: Option<ThresholdRule>,
}

impl KpiTarget {
    pub fn for_period(&self, period: TargetPeriod) -> Option<f64> {
        match period {
            TargetPeriod::Daily => self.daily,
            TargetPeriod::Monthly => self.monthly,
            TargetPeriod::Annual => self.annual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiScore {
    pub kpi: KpiName,
    pub value: f64,
    pub period: TargetPeriod,
    pub target: Option<f64>,
    pub delta: Delta,
    pub band: Band,
}

/// Targets per KPI. KPIs without an entry score as [`Band::Undefined`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KpiTargets(pub BTreeMap<KpiName, KpiTarget>);

impl KpiTargets {
    pub fn insert(&mut self, kpi: KpiName, target: KpiTarget) {
        self.0.insert(kpi, target);
    }

    pub fn get(&self, kpi: KpiName) -> Option<&KpiTarget> {
        self.0.get(&kpi)
    }

    pub fn validate(&self) -> Result<()> {
        for target in self.0.values() {
            if let Some(rule) = &target.rule {
                rule.validate()?;
            }
        }
        Ok(())
    }

    /// Band `value` against the target tier that matches the selection's
    /// date span.
    pub fn score(&self, kpi: KpiName, value: f64, selection: &FilterSelection) -> KpiScore {
        let period = TargetPeriod::for_range(selection.date_range.as_ref());
        let entry = self.get(kpi);
        let Some(target) = entry.and_then(|t| t.for_period(period)) else {
            return KpiScore {
                kpi,
                value,
                period,
                target: None,
                delta: Delta::Raw(value),
                band: Band::Undefined,
            };
        };

        let rule = entry
            .and_then(|t| t.rule)
            .unwrap_or_else(|| ThresholdRule::default_for(kpi));
        KpiScore {
            kpi,
            value,
            period,
            target: Some(target),
            delta: rule.delta(value, target),
            band: rule.classify(value, target),
        }
    }

    pub fn score_all(&self, kpis: &KpiSet, selection: &FilterSelection) -> Vec<KpiScore> {
        KpiName::ALL
            .into_iter()
            .map(|kpi| self.score(kpi, kpis.value(kpi), selection))
            .collect()
    }
}
