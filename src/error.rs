//! Typed errors for the segmentation core

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

use crate::rfm::Metric;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("insufficient population for quantile binning: {customers} customers, need at least {required}")]
    InsufficientPopulation { customers: usize, required: usize },

    #[error("insufficient distinct values for quantile binning on {metric}")]
    InsufficientDistinctValues { metric: Metric },

    #[error("required column '{0}' not found in dataset")]
    MissingColumn(String),

    #[error("unexpected null in column '{column}'")]
    NullValue { column: String },

    #[error("unknown category '{category}', expected one of: {}", .available.join(", "))]
    UnknownCategory {
        category: String,
        available: Vec<String>,
    },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("customer '{customer_id}' ordered on {last_order}, after reference date {reference}")]
    OrderAfterReference {
        customer_id: String,
        last_order: NaiveDate,
        reference: NaiveDate,
    },

    #[error("dataframe error: {0}")]
    Frame(#[from] PolarsError),
}

pub type SegmentResult<T> = Result<T, SegmentError>;
