//! RFM metric extraction and the segmentation pipeline entry point
//!
//! Raw transactions flow one way: per-customer metrics are extracted
//! against a single reference date, binned into quintile scores over the
//! whole population, then mapped to a named segment.

use std::fmt;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::binning::{score_population, RfmScores};
use crate::data::{day_number, fields, from_day_number, transactions_frame, Transaction};
use crate::error::{SegmentError, SegmentResult};
use crate::segment::{classify, Segment};

/// The three customer-level metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Recency,
    Frequency,
    Monetary,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Recency => f.write_str("recency"),
            Metric::Frequency => f.write_str("frequency"),
            Metric::Monetary => f.write_str("monetary"),
        }
    }
}

/// Per-customer RFM metrics
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerMetrics {
    pub customer_id: String,
    /// Whole days between the last order and the reference date
    pub recency: i64,
    /// Distinct orders placed
    pub frequency: u32,
    /// Sum of line totals
    pub monetary: f64,
}

impl CustomerMetrics {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Recency => self.recency as f64,
            Metric::Frequency => f64::from(self.frequency),
            Metric::Monetary => self.monetary,
        }
    }
}

/// A customer with quintile scores and the segment they fall in
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub metrics: CustomerMetrics,
    pub scores: RfmScores,
    pub segment: Segment,
}

/// Latest order date across the whole dataset
pub fn reference_date(transactions: &[Transaction]) -> Option<NaiveDate> {
    transactions.iter().map(Transaction::order_date).max()
}

/// Group transactions by customer and compute recency, frequency and monetary
///
/// # Arguments
/// * `transactions` - Validated order lines
/// * `reference` - Date recency is measured against, shared by every customer;
///   pass [`reference_date`] of the full dataset to reproduce dashboard semantics
///
/// # Returns
/// * One `CustomerMetrics` per customer, sorted by customer id
pub fn extract_metrics(
    transactions: &[Transaction],
    reference: NaiveDate,
) -> SegmentResult<Vec<CustomerMetrics>> {
    let reference_day = day_number(reference);

    let rfm_df = transactions_frame(transactions)?
        .lazy()
        .group_by([col(fields::CUSTOMER_ID)])
        .agg([
            col(fields::ORDER_DAY).max().alias(LAST_ORDER_DAY),
            col(fields::ORDER_ID)
                .n_unique()
                .cast(DataType::Int64)
                .alias(FREQUENCY),
            col(fields::TOTAL_PRICE).sum().alias(MONETARY),
        ])
        .with_columns([(lit(reference_day) - col(LAST_ORDER_DAY)).alias(RECENCY)])
        .sort([fields::CUSTOMER_ID], SortMultipleOptions::default())
        .collect()?;

    let records = metrics_from_frame(&rfm_df, reference)?;
    log::debug!(
        "Extracted metrics for {} customers (reference date {})",
        records.len(),
        reference
    );
    Ok(records)
}

const LAST_ORDER_DAY: &str = "last_order_day";
const FREQUENCY: &str = "frequency";
const MONETARY: &str = "monetary";
const RECENCY: &str = "recency";

/// Read the grouped metrics frame; a null cell is an error, never a default
fn metrics_from_frame(
    rfm_df: &DataFrame,
    reference: NaiveDate,
) -> SegmentResult<Vec<CustomerMetrics>> {
    let customer_ids = rfm_df.column(fields::CUSTOMER_ID)?.str()?;
    let recency = rfm_df.column(RECENCY)?.i64()?;
    let last_order = rfm_df.column(LAST_ORDER_DAY)?.i64()?;
    let frequency = rfm_df.column(FREQUENCY)?.i64()?;
    let monetary = rfm_df.column(MONETARY)?.f64()?;

    let mut records = Vec::with_capacity(rfm_df.height());
    for idx in 0..rfm_df.height() {
        let customer_id = required(customer_ids.get(idx), fields::CUSTOMER_ID)?.to_string();
        let days = required(recency.get(idx), RECENCY)?;
        if days < 0 {
            let last_day = required(last_order.get(idx), LAST_ORDER_DAY)?;
            return Err(SegmentError::OrderAfterReference {
                customer_id,
                last_order: from_day_number(last_day).unwrap_or(reference),
                reference,
            });
        }

        let orders = required(frequency.get(idx), FREQUENCY)?;

        records.push(CustomerMetrics {
            customer_id,
            recency: days,
            frequency: u32::try_from(orders).unwrap_or(u32::MAX),
            monetary: required(monetary.get(idx), MONETARY)?,
        });
    }
    Ok(records)
}

fn required<T>(value: Option<T>, column: &str) -> SegmentResult<T> {
    value.ok_or_else(|| SegmentError::NullValue {
        column: column.to_string(),
    })
}

/// Full pipeline: metrics, quintile scores, segment labels
///
/// Pure and deterministic for a given input: output is ordered by
/// customer id and contains exactly one record per customer.
///
/// # Arguments
/// * `transactions` - Every validated order line of the dataset
///
/// # Returns
/// * One `ScoredRecord` per customer, or the reason binning was impossible
pub fn compute_segments(transactions: &[Transaction]) -> SegmentResult<Vec<ScoredRecord>> {
    let Some(reference) = reference_date(transactions) else {
        return Err(SegmentError::InsufficientPopulation {
            customers: 0,
            required: crate::binning::QUINTILES,
        });
    };

    score_customers(extract_metrics(transactions, reference)?)
}

/// Bin and classify an already extracted customer population
pub fn score_customers(metrics: Vec<CustomerMetrics>) -> SegmentResult<Vec<ScoredRecord>> {
    let scores = score_population(&metrics)?;

    Ok(metrics
        .into_iter()
        .zip(scores)
        .map(|(metrics, scores)| ScoredRecord {
            segment: classify(&scores),
            metrics,
            scores,
        })
        .collect())
}
