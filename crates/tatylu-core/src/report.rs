//! # Sales Report Aggregator
//!
//! A stateless full scan over all orders and products, producing one
//! snapshot of revenue, order counts, units, top products and category
//! revenue.
//!
//! ## Windows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  now = Wed 2024-06-12 15:30 (local)                                     │
//! │                                                                         │
//! │  month ├─────────────────────────────────────────────────────────┤      │
//! │        Sat 06-01 00:00                                                  │
//! │  week                           ├────────────────────────────────┤      │
//! │                                 Mon 06-10 00:00                         │
//! │  day                                                   ├─────────┤      │
//! │                                                        Wed 06-12 00:00  │
//! │                                                                         │
//! │  Sunday belongs to the week that started the previous Monday.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Windows are computed in the caller's time zone (`build_report` is generic
//! over `chrono::TimeZone`), then compared against UTC order timestamps.
//!
//! ## Line Revenue Priority
//! 1. The line total recorded on the order
//! 2. `unit price * quantity`, where unit price is the recorded one, or the
//!    catalog price when none was recorded

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Order, Product};
use crate::{DEFAULT_CATEGORY, TOP_PRODUCTS_LIMIT, UNKNOWN_PRODUCT_NAME};

/// Audit record type for persisted snapshots.
pub const SNAPSHOT_REPORT_TYPE: &str = "snapshot";

// =============================================================================
// Windows
// =============================================================================

/// Start instants of the day, week and month containing `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindows {
    pub now: DateTime<Utc>,
    pub day_start: DateTime<Utc>,
    pub week_start: DateTime<Utc>,
    pub month_start: DateTime<Utc>,
}

impl ReportWindows {
    /// Anchors the windows to `now` in its own time zone.
    pub fn anchored<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        let first = today.with_day(1).unwrap_or(today);

        Self {
            now: now.with_timezone(&Utc),
            day_start: local_midnight(&tz, today),
            week_start: local_midnight(&tz, monday),
            month_start: local_midnight(&tz, first),
        }
    }
}

/// Midnight of `date` in `tz`. When DST skips midnight the earliest valid
/// instant of that local time is used, then UTC as a last resort.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

// =============================================================================
// Snapshot
// =============================================================================

/// A product in the top-sellers list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TopProduct {
    /// Canonical id; absent when the order line carried something else.
    pub product_id: Option<String>,
    /// Alternate catalog code, empty when unknown.
    pub code: String,
    pub name: String,
    pub units_sold: i64,
    pub revenue_cents: i64,
}

/// Revenue for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue_cents: i64,
}

/// One report snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportSnapshot {
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub period_start: DateTime<Utc>,
    #[ts(as = "String")]
    pub period_end: DateTime<Utc>,

    pub total_sales_cents: i64,
    pub total_orders: i64,
    pub total_units_sold: i64,

    pub sales_today_cents: i64,
    pub sales_week_cents: i64,
    pub sales_month_cents: i64,
    pub orders_today: i64,
    pub orders_week: i64,
    pub orders_month: i64,

    /// At most ten, by units sold; ties keep first-seen order.
    pub top_products: Vec<TopProduct>,
    /// In first-seen order.
    pub sales_by_category: Vec<CategoryRevenue>,
}

#[derive(Debug)]
struct ProductTally {
    product_id: String,
    code: String,
    name: String,
    units: i64,
    revenue: Money,
}

/// Builds a snapshot over every order and product.
///
/// ## Arguments
/// * `now` - Anchor instant; its time zone defines "today", "this week" and
///   "this month"
/// * `orders` - All orders, in storage order
/// * `products` - The full catalog, used for names, categories and prices
pub fn build_report<Tz: TimeZone>(now: DateTime<Tz>, orders: &[Order], products: &[Product]) -> ReportSnapshot {
    let windows = ReportWindows::anchored(&now);
    let catalog: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut total_sales = Money::zero();
    let mut total_units = 0i64;
    let (mut sales_today, mut sales_week, mut sales_month) = (Money::zero(), Money::zero(), Money::zero());
    let (mut orders_today, mut orders_week, mut orders_month) = (0i64, 0i64, 0i64);

    let mut tallies: Vec<ProductTally> = Vec::new();
    let mut tally_index: HashMap<String, usize> = HashMap::new();
    let mut categories: Vec<CategoryRevenue> = Vec::new();
    let mut category_index: HashMap<String, usize> = HashMap::new();

    for order in orders {
        let order_total = order.total();
        total_sales += order_total;

        if order.created_at >= windows.day_start {
            sales_today += order_total;
            orders_today += 1;
        }
        if order.created_at >= windows.week_start {
            sales_week += order_total;
            orders_week += 1;
        }
        if order.created_at >= windows.month_start {
            sales_month += order_total;
            orders_month += 1;
        }

        for item in &order.items {
            let pid = if item.product_id.is_empty() {
                "unknown"
            } else {
                item.product_id.as_str()
            };
            let info = catalog.get(pid).copied();
            let qty = item.quantity;

            let unit_price = match item.unit_price_cents {
                0 => info.map_or(Money::zero(), |p| p.price()),
                cents => Money::from_cents(cents),
            };
            let revenue = if item.line_total_cents != 0 {
                item.line_total()
            } else if unit_price.is_positive() {
                unit_price * qty
            } else {
                Money::zero()
            };

            let name = info
                .map(|p| p.name.as_str())
                .filter(|n| !n.is_empty())
                .or(Some(item.name.as_str()).filter(|n| !n.is_empty()))
                .unwrap_or(UNKNOWN_PRODUCT_NAME);
            let category = info
                .map(|p| p.category.as_str())
                .filter(|c| !c.is_empty())
                .or(Some(item.category.as_str()).filter(|c| !c.is_empty()))
                .unwrap_or(DEFAULT_CATEGORY);

            total_units += qty;

            let slot = *tally_index.entry(pid.to_string()).or_insert_with(|| {
                tallies.push(ProductTally {
                    product_id: pid.to_string(),
                    code: info.and_then(|p| p.code.clone()).unwrap_or_default(),
                    name: name.to_string(),
                    units: 0,
                    revenue: Money::zero(),
                });
                tallies.len() - 1
            });
            tallies[slot].units += qty;
            tallies[slot].revenue += revenue;

            let slot = *category_index.entry(category.to_string()).or_insert_with(|| {
                categories.push(CategoryRevenue {
                    category: category.to_string(),
                    revenue_cents: 0,
                });
                categories.len() - 1
            });
            categories[slot].revenue_cents += revenue.cents();
        }
    }

    // stable: equal unit counts keep first-seen order
    tallies.sort_by(|a, b| b.units.cmp(&a.units));
    let top_products = tallies
        .into_iter()
        .take(TOP_PRODUCTS_LIMIT)
        .map(|t| TopProduct {
            product_id: Some(t.product_id).filter(|id| crate::ids::is_object_id(id)),
            code: t.code,
            name: t.name,
            units_sold: t.units,
            revenue_cents: t.revenue.cents(),
        })
        .collect();

    ReportSnapshot {
        generated_at: windows.now,
        period_start: windows.month_start,
        period_end: windows.now,
        total_sales_cents: total_sales.cents(),
        total_orders: orders.len() as i64,
        total_units_sold: total_units,
        sales_today_cents: sales_today.cents(),
        sales_week_cents: sales_week.cents(),
        sales_month_cents: sales_month.cents(),
        orders_today,
        orders_week,
        orders_month,
        top_products,
        sales_by_category: categories,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
