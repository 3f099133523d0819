//! One pass from (normalized table, selection) to every dashboard section.

use serde::Serialize;
use tracing::{debug, warn};

use crate::breakdowns::{
    self, CustomerSplit, DailyVisits, Funnel, HeatmapRow, HourCount, InterestScore, LabelCount,
    MonthlyChannelPurchases, ProductInteraction, SalesGauge,
};
use crate::config::DashboardConfig;
use crate::error::{CoreError, Result};
use crate::event::EventTable;
use crate::filter::{filter, DateRange, FilterOptions, FilterSelection};
use crate::kpi::{compute_kpis, KpiSet};
use crate::scoring::KpiScore;

/// A breakdown that may be missing because its source column is absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Available { data: T },
    Unavailable { reason: String },
}

impl<T> Section<T> {
    /// Unavailable-dimension errors become an unavailable section; anything
    /// else is a real failure and is returned.
    fn from_result(result: Result<T>) -> Result<Self> {
        match result {
            Ok(data) => Ok(Section::Available { data }),
            Err(e @ CoreError::UnavailableDimension { .. }) => {
                warn!(reason = %e, "dashboard section unavailable");
                Ok(Section::Unavailable {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Section::Available { data } => Some(data),
            Section::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub rows: usize,
    pub filter_options: FilterOptions,
    pub kpis: KpiSet,
    pub scores: Vec<KpiScore>,
    pub visits_over_time: Vec<DailyVisits>,
    pub purchases_by_month_and_channel: Vec<MonthlyChannelPurchases>,
    pub purchases_by_month_of_year: Vec<LabelCount>,
    pub funnel: Funnel,
    pub customers: Section<CustomerSplit>,
    pub interest: Section<Vec<InterestScore>>,
    pub purchases_by_salesperson: Section<Vec<LabelCount>>,
    pub top_products: Vec<LabelCount>,
    pub purchases_by_channel: Vec<LabelCount>,
    pub purchases_by_category: Section<Vec<LabelCount>>,
    pub purchases_by_country: Vec<LabelCount>,
    pub interactions_by_month: Vec<LabelCount>,
    pub interactions_by_hour: Vec<HourCount>,
    pub traffic_heatmap: Vec<HeatmapRow>,
    pub interactions_by_category: Section<Vec<LabelCount>>,
    pub accessed_vs_purchased: Vec<ProductInteraction>,
    pub sales_gauge: Section<SalesGauge>,
}

/// The filtered rows (for the raw-data view and export) and the report.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub filtered: EventTable,
    pub report: DashboardReport,
}

/// Filter `table` by `selection` and compute every KPI, score and breakdown.
///
/// When no date range is selected, targets are resolved against the span of
/// the whole table.
pub fn build_dashboard(
    table: &EventTable,
    selection: &FilterSelection,
    config: &DashboardConfig,
) -> Result<Dashboard> {
    let filtered = filter(table, selection);
    let kpis = compute_kpis(&filtered);

    let table_range = table
        .date_bounds()
        .and_then(|(start, end)| DateRange::new(start, end).ok());
    let scoring_selection = selection.clone().or_date_range(table_range);
    let scores = config.targets.score_all(&kpis, &scoring_selection);

    let product_category = config.product_url_category.as_str();
    let report = DashboardReport {
        rows: filtered.len(),
        filter_options: FilterOptions::from_table(table),
        scores,
        visits_over_time: breakdowns::visits_over_time(&filtered),
        purchases_by_month_and_channel: breakdowns::purchases_by_month_and_channel(&filtered),
        purchases_by_month_of_year: breakdowns::purchases_by_month_of_year(&filtered),
        funnel: breakdowns::funnel(&filtered, product_category),
        customers: Section::from_result(breakdowns::customer_split(&filtered))?,
        interest: Section::from_result(breakdowns::interest_by_category(
            &filtered,
            &config.interests,
        ))?,
        purchases_by_salesperson: Section::from_result(breakdowns::purchases_by_salesperson(
            &filtered,
        ))?,
        top_products: breakdowns::top_products(&filtered, config.top_n),
        purchases_by_channel: breakdowns::purchases_by_channel(&filtered, config.top_n),
        purchases_by_category: Section::from_result(breakdowns::purchases_by_category(&filtered))?,
        purchases_by_country: breakdowns::purchases_by_country(&filtered),
        interactions_by_month: breakdowns::interactions_by_month(&filtered),
        interactions_by_hour: breakdowns::interactions_by_hour(&filtered),
        traffic_heatmap: breakdowns::traffic_heatmap(&filtered),
        interactions_by_category: Section::from_result(breakdowns::interactions_by_category(
            &filtered,
        ))?,
        accessed_vs_purchased: breakdowns::accessed_vs_purchased(&filtered, product_category),
        sales_gauge: Section::from_result(breakdowns::sales_gauge(table, &filtered, selection))?,
        kpis,
    };

    debug!(
        rows = report.rows,
        visits = report.kpis.total_visits,
        purchases = report.kpis.total_purchases,
        "dashboard computed"
    );

    Ok(Dashboard { filtered, report })
}
