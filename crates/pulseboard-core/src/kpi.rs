use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::event::EventTable;

/// Headline KPIs shown as cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiName {
    TotalVisits,
    TotalPurchases,
    ScheduledDemos,
    AvgVisitingHour,
    DemoConversionRate,
}

impl KpiName {
    pub const ALL: [KpiName; 5] = [
        KpiName::TotalVisits,
        KpiName::TotalPurchases,
        KpiName::ScheduledDemos,
        KpiName::AvgVisitingHour,
        KpiName::DemoConversionRate,
    ];

    /// Rate-style KPIs are scored with additive offsets, counts with factors.
    pub fn is_rate(self) -> bool {
        matches!(self, KpiName::AvgVisitingHour | KpiName::DemoConversionRate)
    }
}

/// KPI values for one filtered table.
///
/// `total_purchases` counts rows while `total_visits` counts distinct
/// sessions, so the two are not comparable and purchases can exceed visits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSet {
    pub total_visits: u64,
    pub total_purchases: u64,
    pub scheduled_demos: u64,
    pub avg_visiting_hour: f64,
    pub demo_conversion_rate: f64,
}

impl KpiSet {
    pub fn value(&self, kpi: KpiName) -> f64 {
        match kpi {
            KpiName::TotalVisits => self.total_visits as f64,
            KpiName::TotalPurchases => self.total_purchases as f64,
            KpiName::ScheduledDemos => self.scheduled_demos as f64,
            KpiName::AvgVisitingHour => self.avg_visiting_hour,
            KpiName::DemoConversionRate => self.demo_conversion_rate,
        }
    }
}

/// Distinct non-missing session ids.
pub fn count_visits(table: &EventTable) -> u64 {
    table
        .rows
        .iter()
        .filter_map(|r| r.session_id.as_deref())
        .collect::<HashSet<_>>()
        .len() as u64
}

pub fn compute_kpis(table: &EventTable) -> KpiSet {
    let total_visits = count_visits(table);
    let total_purchases = table.purchases().count() as u64;

    let mut scheduled_demos = 0u64;
    let mut demo_requests = 0u64;
    let mut hour_sum = 0u64;
    for row in &table.rows {
        let page = row.page_name_lower();
        if page.contains("demo") {
            scheduled_demos += 1;
        }
        if page == "demo request" {
            demo_requests += 1;
        }
        hour_sum += u64::from(row.hour);
    }

    let avg_visiting_hour = if table.is_empty() {
        0.0
    } else {
        hour_sum as f64 / table.len() as f64
    };
    let demo_conversion_rate = if total_visits > 0 {
        demo_requests as f64 / total_visits as f64 * 100.0
    } else {
        0.0
    };

    KpiSet {
        total_visits,
        total_purchases,
        scheduled_demos,
        avg_visiting_hour,
        demo_conversion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawTable;
    use crate::normalize::normalize;

    fn table(csv: &str) -> EventTable {
        normalize(RawTable::from_reader(csv.as_bytes()).expect("read")).expect("normalize")
    }

    #[test]
    fn computes_every_kpi() {
        let t = table(
            "timestamp,session_id,page_name,purchased_product\n\
             2024-01-01 08:00:00,s1,Home,No Purchase\n\
             2024-01-01 10:00:00,s1,Demo Request,No Purchase\n\
             2024-01-02 12:00:00,s2,Book a demo,Widget\n\
             2024-01-03 14:00:00,s3,DEMO REQUEST,Gadget\n",
        );
        let kpis = compute_kpis(&t);
        assert_eq!(kpis.total_visits, 3);
        assert_eq!(kpis.total_purchases, 2);
        assert_eq!(kpis.scheduled_demos, 3);
        assert!((kpis.avg_visiting_hour - 11.0).abs() < f64::EPSILON);
        assert!((kpis.demo_conversion_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn purchases_can_exceed_visits() {
        let t = table(
            "timestamp,session_id,purchased_product\n\
             2024-01-01 08:00:00,s1,Widget\n\
             2024-01-01 08:05:00,s1,Gadget\n\
             2024-01-01 08:10:00,s1,Gizmo\n",
        );
        let kpis = compute_kpis(&t);
        assert_eq!(kpis.total_visits, 1);
        assert_eq!(kpis.total_purchases, 3);
    }

    #[test]
    fn empty_table_yields_zero_rates() {
        let t = table("timestamp,session_id\n2024-01-01 08:00:00,s1\n").with_rows(Vec::new());
        let kpis = compute_kpis(&t);
        assert_eq!(kpis.total_visits, 0);
        assert_eq!(kpis.avg_visiting_hour, 0.0);
        assert_eq!(kpis.demo_conversion_rate, 0.0);
    }

    #[test]
    fn missing_product_is_not_a_purchase() {
        let t = table("timestamp,session_id,purchased_product\n2024-01-01 08:00:00,s1,\n");
        assert_eq!(compute_kpis(&t).total_purchases, 0);
    }

    #[test]
    fn compute_kpis_is_deterministic() {
        let t = table(
            "timestamp,session_id,page_name\n\
             2024-01-01 08:00:00,s1,demo request\n\
             2024-01-02 09:00:00,s2,Home\n",
        );
        assert_eq!(compute_kpis(&t), compute_kpis(&t));
    }
}
