//! Dashboard rollups: daily orders, categories, payments, cities, RFM summaries
//!
//! Group-and-sum work runs through Polars lazy frames. Every result is
//! sorted on its value and then on its label so output never depends on
//! hash-map iteration order.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use polars::prelude::*;

use crate::data::{fields, from_day_number, transactions_frame, Transaction};
use crate::error::SegmentResult;
use crate::rfm::{CustomerMetrics, Metric, ScoredRecord};
use crate::segment::Segment;

/// Orders placed on one calendar day
#[derive(Debug, Clone, PartialEq)]
pub struct DailyOrders {
    pub date: NaiveDate,
    pub order_count: u64,
    pub revenue: f64,
    /// First category seen that day
    pub category: Option<String>,
}

/// Headline totals of the daily view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSummary {
    pub total_orders: u64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRating {
    pub category: String,
    pub mean_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentShare {
    pub payment_type: String,
    /// Distinct orders paid this way
    pub frequency: u64,
    pub payment_value: f64,
    pub frequency_percentage: f64,
    pub payment_value_million: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityRevenue {
    pub city: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityCount {
    pub city: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfmAverages {
    pub recency: f64,
    pub frequency: f64,
    pub monetary: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCount {
    pub segment: Segment,
    pub customers: usize,
    /// Fraction of all scored customers, 0.0-1.0
    pub share: f64,
}

/// Orders and revenue per day, with empty days filled in
pub fn daily_orders(transactions: &[Transaction]) -> SegmentResult<Vec<DailyOrders>> {
    let daily_df = transactions_frame(transactions)?
        .lazy()
        .group_by([col(fields::ORDER_DAY)])
        .agg([
            col(fields::ORDER_ID)
                .n_unique()
                .cast(DataType::Int64)
                .alias("order_count"),
            col(fields::TOTAL_PRICE).sum().alias("revenue"),
            col(fields::CATEGORY).drop_nulls().first().alias("category"),
        ])
        .sort([fields::ORDER_DAY], SortMultipleOptions::default())
        .collect()?;

    let days = i64_values(&daily_df, fields::ORDER_DAY)?;
    let counts = i64_values(&daily_df, "order_count")?;
    let revenue = f64_values(&daily_df, "revenue")?;
    let categories: Vec<Option<String>> = daily_df
        .column("category")?
        .str()?
        .into_iter()
        .map(|c| c.map(str::to_string))
        .collect();

    let by_day: BTreeMap<i64, (u64, f64, Option<String>)> = days
        .into_iter()
        .zip(counts)
        .zip(revenue)
        .zip(categories)
        .map(|(((day, count), revenue), category)| {
            (day, (count.max(0) as u64, revenue, category))
        })
        .collect();

    let (Some(&first), Some(&last)) = (by_day.keys().next(), by_day.keys().next_back()) else {
        return Ok(Vec::new());
    };

    let mut daily = Vec::with_capacity((last - first + 1) as usize);
    for day in first..=last {
        let Some(date) = from_day_number(day) else {
            continue;
        };
        let (order_count, revenue, category) =
            by_day.get(&day).cloned().unwrap_or((0, 0.0, None));
        daily.push(DailyOrders {
            date,
            order_count,
            revenue,
            category,
        });
    }
    Ok(daily)
}

pub fn order_summary(daily: &[DailyOrders]) -> OrderSummary {
    OrderSummary {
        total_orders: daily.iter().map(|d| d.order_count).sum(),
        total_revenue: daily.iter().map(|d| d.revenue).sum(),
    }
}

/// Line items per product category, most ordered first
pub fn category_order_counts(transactions: &[Transaction]) -> SegmentResult<Vec<CategoryCount>> {
    let df = grouped_desc(
        transactions_frame(transactions)?.lazy(),
        fields::CATEGORY,
        [col(fields::ORDER_ID).count().cast(DataType::Int64).alias("orders")],
        "orders",
    )?;

    Ok(text_values(&df, fields::CATEGORY)?
        .into_iter()
        .zip(i64_values(&df, "orders")?)
        .map(|(category, orders)| CategoryCount {
            category,
            orders: orders.max(0) as u64,
        })
        .collect())
}

/// Mean review score per category, best rated first
pub fn category_ratings(transactions: &[Transaction]) -> SegmentResult<Vec<CategoryRating>> {
    let df = grouped_desc(
        transactions_frame(transactions)?
            .lazy()
            .filter(col(fields::REVIEW_SCORE).is_not_null()),
        fields::CATEGORY,
        [col(fields::REVIEW_SCORE).mean().alias("mean_score")],
        "mean_score",
    )?;

    Ok(text_values(&df, fields::CATEGORY)?
        .into_iter()
        .zip(f64_values(&df, "mean_score")?)
        .map(|(category, mean_score)| CategoryRating {
            category,
            mean_score,
        })
        .collect())
}

/// Distinct orders and payment value per payment type
pub fn payment_mix(transactions: &[Transaction]) -> SegmentResult<Vec<PaymentShare>> {
    let df = transactions_frame(transactions)?
        .lazy()
        .filter(col(fields::PAYMENT_TYPE).is_not_null())
        .group_by([col(fields::PAYMENT_TYPE)])
        .agg([
            col(fields::ORDER_ID)
                .n_unique()
                .cast(DataType::Int64)
                .alias("frequency"),
            col(fields::PAYMENT_VALUE).sum().alias("payment_value"),
        ])
        .sort(
            ["frequency", "payment_value", fields::PAYMENT_TYPE],
            SortMultipleOptions::default().with_order_descending_multi([true, true, false]),
        )
        .collect()?;

    let types = text_values(&df, fields::PAYMENT_TYPE)?;
    let frequencies = i64_values(&df, "frequency")?;
    let values = f64_values(&df, "payment_value")?;
    let total_frequency: i64 = frequencies.iter().sum();

    Ok(types
        .into_iter()
        .zip(frequencies)
        .zip(values)
        .map(|((payment_type, frequency), payment_value)| PaymentShare {
            payment_type,
            frequency: frequency.max(0) as u64,
            payment_value,
            frequency_percentage: if total_frequency > 0 {
                frequency as f64 / total_frequency as f64 * 100.0
            } else {
                0.0
            },
            payment_value_million: payment_value / 1_000_000.0,
        })
        .collect())
}

/// Total payment value per customer city, highest first
pub fn city_revenue(transactions: &[Transaction]) -> SegmentResult<Vec<CityRevenue>> {
    let df = grouped_desc(
        transactions_frame(transactions)?.lazy(),
        fields::CUSTOMER_CITY,
        [col(fields::PAYMENT_VALUE).sum().alias("revenue")],
        "revenue",
    )?;

    Ok(text_values(&df, fields::CUSTOMER_CITY)?
        .into_iter()
        .zip(f64_values(&df, "revenue")?)
        .map(|(city, revenue)| CityRevenue { city, revenue })
        .collect())
}

/// Line items per seller city, busiest first
pub fn seller_city_counts(transactions: &[Transaction]) -> SegmentResult<Vec<CityCount>> {
    let df = grouped_desc(
        transactions_frame(transactions)?.lazy(),
        fields::SELLER_CITY,
        [col(fields::ORDER_ID).count().cast(DataType::Int64).alias("count")],
        "count",
    )?;

    Ok(text_values(&df, fields::SELLER_CITY)?
        .into_iter()
        .zip(i64_values(&df, "count")?)
        .map(|(city, count)| CityCount {
            city,
            count: count.max(0) as u64,
        })
        .collect())
}

pub fn rfm_averages(metrics: &[CustomerMetrics]) -> Option<RfmAverages> {
    if metrics.is_empty() {
        return None;
    }
    let n = metrics.len() as f64;
    let mean = |metric: Metric| metrics.iter().map(|m| m.value(metric)).sum::<f64>() / n;
    Some(RfmAverages {
        recency: mean(Metric::Recency),
        frequency: mean(Metric::Frequency),
        monetary: mean(Metric::Monetary),
    })
}

/// Best `n` customers on one metric
///
/// Lowest recency, highest frequency and highest monetary come first;
/// ties fall back to customer id.
pub fn top_customers(metrics: &[CustomerMetrics], metric: Metric, n: usize) -> Vec<CustomerMetrics> {
    let mut ranked: Vec<&CustomerMetrics> = metrics.iter().collect();
    ranked.sort_by(|a, b| {
        let by_value = match metric {
            Metric::Recency => a.value(metric).total_cmp(&b.value(metric)),
            Metric::Frequency | Metric::Monetary => b.value(metric).total_cmp(&a.value(metric)),
        };
        by_value.then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    ranked.into_iter().take(n).cloned().collect()
}

/// Customers per segment, largest segment first
pub fn segment_counts(records: &[ScoredRecord]) -> Vec<SegmentCount> {
    let mut counts: HashMap<Segment, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.segment).or_insert(0) += 1;
    }

    let total = records.len() as f64;
    let mut segments: Vec<SegmentCount> = counts
        .into_iter()
        .map(|(segment, customers)| SegmentCount {
            segment,
            customers,
            share: customers as f64 / total,
        })
        .collect();
    segments.sort_by(|a, b| b.customers.cmp(&a.customers).then(a.segment.cmp(&b.segment)));
    segments
}

/// Group by a text key (nulls dropped), then sort by `value` descending and key ascending
fn grouped_desc<const N: usize>(
    frame: LazyFrame,
    key: &str,
    aggs: [Expr; N],
    value: &str,
) -> PolarsResult<DataFrame> {
    frame
        .filter(col(key).is_not_null())
        .group_by([col(key)])
        .agg(aggs)
        .sort(
            [value, key],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()
}

fn text_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

fn i64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<i64>> {
    Ok(df
        .column(name)?
        .i64()?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    Ok(df
        .column(name)?
        .f64()?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}
