//! Group-by aggregates feeding the dashboard charts.
//!
//! Every function takes the already-filtered table. Breakdowns that need an
//! optional column return [`CoreError::UnavailableDimension`] when the source
//! did not have it.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::event::{Column, EventRow, EventTable, NO_PURCHASE, UNASSIGNED};
use crate::filter::FilterSelection;
use crate::geo::official_country_name;
use crate::interest::InterestCategories;
use crate::scoring::{Band, ThresholdRule};

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Bands for the sales gauge: below 80% of the team average is bad, at or
/// above 120% is good.
const GAUGE_RULE: ThresholdRule = ThresholdRule::Factor {
    good_factor: 1.2,
    amber_factor: 0.8,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyVisits {
    pub date: NaiveDate,
    pub visits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyChannelPurchases {
    pub month: String,
    pub referrer: String,
    pub purchases: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Funnel {
    pub visits: u64,
    pub product_views: u64,
    pub purchases: u64,
    /// A later stage counted more sessions than the one before it. The stages
    /// are independent counts, so this points at sessions that skipped a step.
    pub widening: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerSplit {
    pub new_customers: u64,
    pub returning_customers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterestScore {
    pub label: String,
    pub visitors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatmapRow {
    pub day: String,
    /// Interactions per hour, index 0..=23.
    pub hours: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInteraction {
    pub page_name: String,
    pub viewed: u64,
    pub purchased: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GaugeMode {
    Team,
    Individual { salesperson: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesGauge {
    pub mode: GaugeMode,
    pub value: f64,
    pub team_average: f64,
    pub axis_max: f64,
    pub band: Band,
}

fn require(table: &EventTable, column: Column, breakdown: &'static str) -> Result<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(CoreError::UnavailableDimension {
            dimension: column.name().to_string(),
            breakdown,
        })
    }
}

/// Descending by count, ties by label so output is stable.
fn sorted_desc(counts: HashMap<String, u64>) -> Vec<LabelCount> {
    let mut out: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

fn count_by<'a, F>(rows: impl Iterator<Item = &'a EventRow>, key: F) -> HashMap<String, u64>
where
    F: Fn(&'a EventRow) -> Option<&'a str>,
{
    let mut counts = HashMap::new();
    for row in rows {
        if let Some(k) = key(row) {
            *counts.entry(k.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn distinct_sessions<'a>(rows: impl Iterator<Item = &'a EventRow>) -> u64 {
    rows.filter_map(|r| r.session_id.as_deref())
        .collect::<HashSet<_>>()
        .len() as u64
}

fn is_attributed(row: &EventRow) -> bool {
    matches!(row.processed_by.as_deref(), Some(p) if p != UNASSIGNED)
}

/// Distinct sessions per calendar date.
pub fn visits_over_time(table: &EventTable) -> Vec<DailyVisits> {
    let mut by_date: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for row in &table.rows {
        let sessions = by_date.entry(row.date).or_default();
        if let Some(session) = row.session_id.as_deref() {
            sessions.insert(session);
        }
    }
    by_date
        .into_iter()
        .map(|(date, sessions)| DailyVisits {
            date,
            visits: sessions.len() as u64,
        })
        .collect()
}

/// Purchases grouped by "YYYY-MM" month and traffic source.
pub fn purchases_by_month_and_channel(table: &EventTable) -> Vec<MonthlyChannelPurchases> {
    let mut grouped: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for row in table.purchases() {
        if let Some(referrer) = row.referrer.as_deref() {
            *grouped.entry((row.month.as_str(), referrer)).or_insert(0) += 1;
        }
    }
    grouped
        .into_iter()
        .map(|((month, referrer), purchases)| MonthlyChannelPurchases {
            month: month.to_string(),
            referrer: referrer.to_string(),
            purchases,
        })
        .collect()
}

/// Purchases per calendar month Jan..Dec across all years, zero-filled.
pub fn purchases_by_month_of_year(table: &EventTable) -> Vec<LabelCount> {
    let mut counts = [0u64; 12];
    for row in table.purchases() {
        counts[row.timestamp.month0() as usize] += 1;
    }
    MONTH_NAMES
        .iter()
        .zip(counts)
        .map(|(name, count)| LabelCount {
            label: name.to_string(),
            count,
        })
        .collect()
}

/// Visit → product view → purchase, each a distinct-session count over the
/// whole table. The stages are not intersected with each other.
pub fn funnel(table: &EventTable, product_url_category: &str) -> Funnel {
    let visits = distinct_sessions(table.rows.iter());
    let product_views = distinct_sessions(
        table
            .rows
            .iter()
            .filter(|r| r.url_category.as_deref() == Some(product_url_category)),
    );
    let purchases = distinct_sessions(table.purchases());
    Funnel {
        visits,
        product_views,
        purchases,
        widening: product_views > visits || purchases > product_views,
    }
}

/// Customers seen in exactly one row are new; more than one row is returning.
pub fn customer_split(table: &EventTable) -> Result<CustomerSplit> {
    require(table, Column::UserId, "new vs returning customers")?;
    let per_user = count_by(table.rows.iter(), |r| r.user_id.as_deref());
    let returning_customers = per_user.values().filter(|&&n| n > 1).count() as u64;
    Ok(CustomerSplit {
        new_customers: per_user.len() as u64 - returning_customers,
        returning_customers,
    })
}

/// Distinct users whose page views match each interest category.
pub fn interest_by_category(
    table: &EventTable,
    categories: &InterestCategories,
) -> Result<Vec<InterestScore>> {
    require(table, Column::UserId, "solution interest")?;
    let pages: Vec<(String, Option<&str>)> = table
        .rows
        .iter()
        .map(|r| (r.page_name_lower(), r.user_id.as_deref()))
        .collect();

    Ok(categories
        .iter()
        .map(|category| {
            let visitors = pages
                .iter()
                .filter(|(page, _)| category.matches(page))
                .filter_map(|(_, user)| *user)
                .collect::<HashSet<_>>()
                .len() as u64;
            InterestScore {
                label: category.label.clone(),
                visitors,
            }
        })
        .collect())
}

/// Purchases credited to each sales-team member, largest first.
pub fn purchases_by_salesperson(table: &EventTable) -> Result<Vec<LabelCount>> {
    require(table, Column::ProcessedBy, "purchases by sales team member")?;
    Ok(sorted_desc(count_by(
        table.purchases().filter(|r| is_attributed(r)),
        |r| r.processed_by.as_deref(),
    )))
}

/// Most purchased products.
pub fn top_products(table: &EventTable, limit: usize) -> Vec<LabelCount> {
    let mut out = sorted_desc(count_by(table.purchases(), |r| {
        r.purchased_product.as_deref()
    }));
    out.truncate(limit);
    out
}

/// Purchases per traffic source.
pub fn purchases_by_channel(table: &EventTable, limit: usize) -> Vec<LabelCount> {
    let mut out = sorted_desc(count_by(table.purchases(), |r| r.referrer.as_deref()));
    out.truncate(limit);
    out
}

pub fn purchases_by_category(table: &EventTable) -> Result<Vec<LabelCount>> {
    require(table, Column::ProductCategory, "purchases by product category")?;
    Ok(sorted_desc(count_by(table.purchases(), |r| {
        r.product_category.as_deref()
    })))
}

/// Purchases per country under its ISO short name. Spellings that resolve
/// to the same country are merged.
pub fn purchases_by_country(table: &EventTable) -> Vec<LabelCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for (country, n) in count_by(table.purchases(), |r| r.country.as_deref()) {
        *counts
            .entry(official_country_name(&country).into_owned())
            .or_insert(0) += n;
    }
    sorted_desc(counts)
}

/// Rows per "YYYY-MM" month, oldest first.
pub fn interactions_by_month(table: &EventTable) -> Vec<LabelCount> {
    let mut months: BTreeMap<&str, u64> = BTreeMap::new();
    for row in &table.rows {
        *months.entry(row.month.as_str()).or_insert(0) += 1;
    }
    months
        .into_iter()
        .map(|(month, count)| LabelCount {
            label: month.to_string(),
            count,
        })
        .collect()
}

/// Rows per hour of day, only hours that occur.
pub fn interactions_by_hour(table: &EventTable) -> Vec<HourCount> {
    let mut hours: BTreeMap<u32, u64> = BTreeMap::new();
    for row in &table.rows {
        *hours.entry(row.hour).or_insert(0) += 1;
    }
    hours
        .into_iter()
        .map(|(hour, count)| HourCount { hour, count })
        .collect()
}

/// Day-of-week × hour cross-tab, Monday first, 24 columns each.
pub fn traffic_heatmap(table: &EventTable) -> Vec<HeatmapRow> {
    let mut grid = [[0u64; 24]; 7];
    for row in &table.rows {
        if let Some(day) = WEEKDAYS.iter().position(|d| *d == row.day_of_week) {
            grid[day][row.hour as usize % 24] += 1;
        }
    }
    WEEKDAYS
        .iter()
        .zip(grid)
        .map(|(day, hours)| HeatmapRow {
            day: day.to_string(),
            hours: hours.to_vec(),
        })
        .collect()
}

/// Rows per product category, largest first.
pub fn interactions_by_category(table: &EventTable) -> Result<Vec<LabelCount>> {
    require(table, Column::ProductCategory, "interactions by product category")?;
    Ok(sorted_desc(count_by(table.rows.iter(), |r| {
        r.product_category.as_deref()
    })))
}

/// Views and purchases per product page, sorted by page name.
pub fn accessed_vs_purchased(
    table: &EventTable,
    product_url_category: &str,
) -> Vec<ProductInteraction> {
    let mut pages: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for row in table
        .rows
        .iter()
        .filter(|r| r.url_category.as_deref() == Some(product_url_category))
    {
        let Some(page) = row.page_name.as_deref() else {
            continue;
        };
        let entry = pages.entry(page).or_insert((0, 0));
        entry.0 += 1;
        if row.is_purchase() {
            entry.1 += 1;
        }
    }
    pages
        .into_iter()
        .map(|(page, (viewed, purchased))| ProductInteraction {
            page_name: page.to_string(),
            viewed,
            purchased,
        })
        .collect()
}

fn average_attributed_sales<'a>(rows: impl Iterator<Item = &'a EventRow>) -> f64 {
    let mut sales = 0u64;
    let mut people = HashSet::new();
    for row in rows.filter(|r| is_attributed(r)) {
        if let Some(person) = row.processed_by.as_deref() {
            people.insert(person);
        }
        if row.is_purchase() {
            sales += 1;
        }
    }
    if people.is_empty() {
        0.0
    } else {
        sales as f64 / people.len() as f64
    }
}

/// Sales performance against the team average.
///
/// The baseline average comes from `full` restricted only by the quarter,
/// country and product selections; date and salesperson do not narrow it.
/// With exactly one salesperson selected the gauge shows that person's
/// purchases in `filtered`, otherwise the team average over `filtered`.
pub fn sales_gauge(
    full: &EventTable,
    filtered: &EventTable,
    selection: &FilterSelection,
) -> Result<SalesGauge> {
    require(full, Column::ProcessedBy, "sales performance gauge")?;

    let mut products = selection.products.clone();
    if !products.is_empty() {
        products.insert(NO_PURCHASE.to_string());
    }
    let baseline = FilterSelection {
        date_range: None,
        countries: selection.countries.clone(),
        salespersons: Default::default(),
        products,
        quarters: selection.quarters.clone(),
    };
    let team_average = average_attributed_sales(full.rows.iter().filter(|r| baseline.matches(r)));

    let (mode, value) = match selection.salespersons.iter().collect::<Vec<_>>().as_slice() {
        [only] => {
            let sales = filtered
                .purchases()
                .filter(|r| r.processed_by.as_deref() == Some(only.as_str()))
                .count() as f64;
            (
                GaugeMode::Individual {
                    salesperson: only.to_string(),
                },
                sales,
            )
        }
        _ => (GaugeMode::Team, average_attributed_sales(filtered.rows.iter())),
    };

    let band = if team_average > 0.0 {
        GAUGE_RULE.classify(value, team_average)
    } else {
        Band::Undefined
    };

    Ok(SalesGauge {
        mode,
        value,
        team_average,
        axis_max: (team_average * 2.0).max(1.0),
        band,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawTable;
    use crate::filter::filter;
    use crate::normalize::normalize;

    fn table(csv: &str) -> EventTable {
        normalize(RawTable::from_reader(csv.as_bytes()).expect("read")).expect("normalize")
    }

    fn shop() -> EventTable {
        table(
            "timestamp,session_id,user_id,country,page_name,url_category,purchased_product,product_category,referrer,processed_by\n\
             2024-01-01 09:00:00,s1,u1,US,Home,home,No Purchase,,Google,Unassigned\n\
             2024-01-01 09:05:00,s1,u1,US,Virtual Assistant,products,Virtual Assistant,AI,Google,Alice\n\
             2024-01-02 13:00:00,s2,u2,USA,Prototyping Tool,products,No Purchase,Design,Direct,Unassigned\n\
             2024-02-05 13:30:00,s3,u1,Germany,Prototyping Tool,products,Prototyping Tool,Design,Direct,Bob\n\
             2024-02-06 17:00:00,s4,u3,DE,Checkout,checkout,Virtual Assistant,AI,Google,Unassigned\n\
             2024-02-07 17:15:00,s5,u4,France,Demo Request,demo,No Purchase,,Email,Alice\n",
        )
    }

    #[test]
    fn visits_over_time_counts_distinct_sessions_per_day() {
        let visits = visits_over_time(&shop());
        assert_eq!(visits.len(), 5);
        assert_eq!(visits[0].visits, 1, "s1 twice on the first day");
        assert_eq!(visits[0].date.to_string(), "2024-01-01");
    }

    #[test]
    fn purchases_by_month_and_channel_groups_pairs() {
        let rows = purchases_by_month_and_channel(&shop());
        assert_eq!(
            rows,
            vec![
                MonthlyChannelPurchases {
                    month: "2024-01".to_string(),
                    referrer: "Google".to_string(),
                    purchases: 1
                },
                MonthlyChannelPurchases {
                    month: "2024-02".to_string(),
                    referrer: "Direct".to_string(),
                    purchases: 1
                },
                MonthlyChannelPurchases {
                    month: "2024-02".to_string(),
                    referrer: "Google".to_string(),
                    purchases: 1
                },
            ]
        );
    }

    #[test]
    fn month_of_year_is_zero_filled() {
        let months = purchases_by_month_of_year(&shop());
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].label, "Jan");
        assert_eq!(months[0].count, 1);
        assert_eq!(months[1].count, 2);
        assert!(months[2..].iter().all(|m| m.count == 0));
    }

    #[test]
    fn funnel_stages_are_independent_counts() {
        let f = funnel(&shop(), "products");
        assert_eq!(f.visits, 5);
        assert_eq!(f.product_views, 3);
        assert_eq!(f.purchases, 3);
        assert!(!f.widening);
    }

    #[test]
    fn funnel_reports_widening() {
        let t = table(
            "timestamp,session_id,url_category,purchased_product\n\
             2024-01-01 09:00:00,s1,home,Widget\n\
             2024-01-01 10:00:00,s2,home,Gadget\n\
             2024-01-01 11:00:00,s3,products,No Purchase\n",
        );
        let f = funnel(&t, "products");
        assert_eq!((f.visits, f.product_views, f.purchases), (3, 1, 2));
        assert!(f.widening);
    }

    #[test]
    fn customer_split_counts_repeat_users_as_returning() {
        let split = customer_split(&shop()).expect("user_id present");
        assert_eq!(split.returning_customers, 1);
        assert_eq!(split.new_customers, 3);
    }

    #[test]
    fn customer_split_without_user_id_is_unavailable() {
        let t = table("timestamp,session_id\n2024-01-01 09:00:00,s1\n");
        let err = customer_split(&t).expect_err("must be unavailable");
        assert!(matches!(
            err,
            CoreError::UnavailableDimension { ref dimension, .. } if dimension == "user_id"
        ));
    }

    #[test]
    fn interest_counts_distinct_users() {
        let scores = interest_by_category(&shop(), &InterestCategories::default()).expect("interest");
        let get = |label: &str| {
            scores
                .iter()
                .find(|s| s.label == label)
                .map(|s| s.visitors)
                .expect("label present")
        };
        assert_eq!(get("AI Assistant"), 1);
        assert_eq!(get("Prototyping Tools"), 2);
        assert_eq!(get("Software Testing Tool"), 0);
    }

    #[test]
    fn salesperson_breakdown_excludes_unassigned() {
        let rows = purchases_by_salesperson(&shop()).expect("processed_by present");
        assert_eq!(
            rows,
            vec![
                LabelCount {
                    label: "Alice".to_string(),
                    count: 1
                },
                LabelCount {
                    label: "Bob".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn top_products_and_channels_are_sorted_and_limited() {
        let products = top_products(&shop(), 1);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].label, "Virtual Assistant");
        assert_eq!(products[0].count, 2);

        let channels = purchases_by_channel(&shop(), 10);
        assert_eq!(channels[0].label, "Google");
        assert_eq!(channels[0].count, 2);
        assert_eq!(channels[1].label, "Direct");
    }

    #[test]
    fn category_breakdowns_need_product_category() {
        let purchases = purchases_by_category(&shop()).expect("present");
        assert_eq!(purchases[0].label, "AI");
        assert_eq!(purchases[0].count, 2);

        let interactions = interactions_by_category(&shop()).expect("present");
        assert_eq!(
            interactions,
            vec![
                LabelCount {
                    label: "AI".to_string(),
                    count: 2
                },
                LabelCount {
                    label: "Design".to_string(),
                    count: 2
                },
            ]
        );

        let t = table("timestamp,session_id\n2024-01-01 09:00:00,s1\n");
        assert!(purchases_by_category(&t).is_err());
        assert!(interactions_by_category(&t).is_err());
    }

    #[test]
    fn countries_merge_after_normalization() {
        let rows = purchases_by_country(&shop());
        assert_eq!(
            rows,
            vec![
                LabelCount {
                    label: "Germany".to_string(),
                    count: 2
                },
                LabelCount {
                    label: "United States".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn country_codes_merge_with_names_across_the_registry() {
        let t = table(
            "timestamp,session_id,country,purchased_product\n\
             2024-01-01 10:00:00,s1,PE,Widget\n\
             2024-01-01 11:00:00,s2,Peru,Widget\n\
             2024-01-01 12:00:00,s3,hun,Widget\n",
        );
        assert_eq!(
            purchases_by_country(&t),
            vec![
                LabelCount {
                    label: "Peru".to_string(),
                    count: 2
                },
                LabelCount {
                    label: "Hungary".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn time_of_day_breakdowns() {
        let t = shop();
        let months = interactions_by_month(&t);
        assert_eq!(months.len(), 2);
        assert_eq!((months[0].label.as_str(), months[0].count), ("2024-01", 3));

        let hours = interactions_by_hour(&t);
        assert_eq!(hours.first(), Some(&HourCount { hour: 9, count: 2 }));
        assert_eq!(hours.last(), Some(&HourCount { hour: 17, count: 2 }));

        let heatmap = traffic_heatmap(&t);
        assert_eq!(heatmap.len(), 7);
        assert_eq!(heatmap[0].day, "Monday");
        assert!(heatmap.iter().all(|r| r.hours.len() == 24));
        // 2024-01-01 was a Monday.
        assert_eq!(heatmap[0].hours[9], 2);
        let total: u64 = heatmap.iter().flat_map(|r| r.hours.iter()).sum();
        assert_eq!(total, t.len() as u64);
    }

    #[test]
    fn accessed_vs_purchased_pairs_views_with_purchases() {
        let rows = accessed_vs_purchased(&shop(), "products");
        assert_eq!(
            rows,
            vec![
                ProductInteraction {
                    page_name: "Prototyping Tool".to_string(),
                    viewed: 2,
                    purchased: 1
                },
                ProductInteraction {
                    page_name: "Virtual Assistant".to_string(),
                    viewed: 1,
                    purchased: 1
                },
            ]
        );
    }

    #[test]
    fn team_gauge_compares_against_team_average() {
        let full = shop();
        let selection = FilterSelection::all();
        let gauge = sales_gauge(&full, &filter(&full, &selection), &selection).expect("gauge");
        assert_eq!(gauge.mode, GaugeMode::Team);
        // Alice and Bob, one attributed purchase each.
        assert_eq!(gauge.team_average, 1.0);
        assert_eq!(gauge.value, 1.0);
        assert_eq!(gauge.band, Band::Amber);
        assert_eq!(gauge.axis_max, 2.0);
    }

    #[test]
    fn individual_gauge_uses_the_selected_salesperson() {
        let full = shop();
        let selection = FilterSelection::all().with_salespersons(["Bob"]);
        let gauge = sales_gauge(&full, &filter(&full, &selection), &selection).expect("gauge");
        assert_eq!(
            gauge.mode,
            GaugeMode::Individual {
                salesperson: "Bob".to_string()
            }
        );
        assert_eq!(gauge.value, 1.0);
        assert_eq!(gauge.team_average, 1.0);
    }

    #[test]
    fn gauge_without_salespeople_is_undefined() {
        let t = table(
            "timestamp,session_id,purchased_product,processed_by\n\
             2024-01-01 09:00:00,s1,Widget,Unassigned\n",
        );
        let selection = FilterSelection::all();
        let gauge = sales_gauge(&t, &t, &selection).expect("gauge");
        assert_eq!(gauge.band, Band::Undefined);
        assert_eq!(gauge.axis_max, 1.0);
    }
}
