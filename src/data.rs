//! Transaction loading and row validation using Polars

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::{SegmentError, SegmentResult};

/// Column names expected in the merged transaction export
pub mod columns {
    pub const CUSTOMER_ID: &str = "customer_unique_id";
    pub const ORDER_ID: &str = "order_id";
    pub const ORDER_TIMESTAMP: &str = "order_purchase_timestamp";
    pub const TOTAL_PRICE: &str = "total_price";
    pub const CATEGORY: &str = "product_category_name_english";
    pub const PAYMENT_TYPE: &str = "payment_type";
    pub const PAYMENT_VALUE: &str = "payment_value";
    pub const CUSTOMER_CITY: &str = "customer_city";
    pub const SELLER_CITY: &str = "seller_city";
    pub const REVIEW_SCORE: &str = "review_score";
}

/// Column names of the frame built by [`transactions_frame`]
pub mod fields {
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const ORDER_ID: &str = "order_id";
    pub const ORDER_DAY: &str = "order_day";
    pub const TOTAL_PRICE: &str = "total_price";
    pub const CATEGORY: &str = "category";
    pub const PAYMENT_TYPE: &str = "payment_type";
    pub const PAYMENT_VALUE: &str = "payment_value";
    pub const CUSTOMER_CITY: &str = "customer_city";
    pub const SELLER_CITY: &str = "seller_city";
    pub const REVIEW_SCORE: &str = "review_score";
}

/// One line item of an order
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer_id: String,
    pub order_id: String,
    pub order_timestamp: NaiveDateTime,
    /// Line total, never negative
    pub total_price: f64,
    pub category: Option<String>,
    pub payment_type: Option<String>,
    pub payment_value: Option<f64>,
    pub customer_city: Option<String>,
    pub seller_city: Option<String>,
    pub review_score: Option<f64>,
}

impl Transaction {
    /// Create a transaction carrying only the fields the RFM core needs
    pub fn new(
        customer_id: impl Into<String>,
        order_id: impl Into<String>,
        order_timestamp: NaiveDateTime,
        total_price: f64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            order_id: order_id.into(),
            order_timestamp,
            total_price,
            category: None,
            payment_type: None,
            payment_value: None,
            customer_city: None,
            seller_city: None,
            review_score: None,
        }
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_timestamp.date()
    }
}

/// Why a row of the input file was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectReason {
    MissingCustomerId,
    MissingOrderId,
    MissingTimestamp,
    UnparseableTimestamp,
    MissingTotal,
    NonNumericTotal,
    NegativeTotal,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::MissingCustomerId => "missing customer id",
            RejectReason::MissingOrderId => "missing order id",
            RejectReason::MissingTimestamp => "missing order timestamp",
            RejectReason::UnparseableTimestamp => "unparseable order timestamp",
            RejectReason::MissingTotal => "missing line total",
            RejectReason::NonNumericTotal => "non-numeric line total",
            RejectReason::NegativeTotal => "negative line total",
        };
        f.write_str(text)
    }
}

/// A rejected input row with its 1-based file line (header is line 1)
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: RejectReason,
    /// Offending raw value, when there was one
    pub value: Option<String>,
}

/// Result of loading a dataset: accepted rows plus an account of every drop
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Accepted rows, sorted by order timestamp
    pub transactions: Vec<Transaction>,
    pub rejected: Vec<RejectedRow>,
}

impl LoadReport {
    pub fn total_rows(&self) -> usize {
        self.transactions.len() + self.rejected.len()
    }

    /// Number of rejected rows per reason
    pub fn rejection_counts(&self) -> BTreeMap<RejectReason, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rejected {
            *counts.entry(row.reason).or_insert(0) += 1;
        }
        counts
    }
}

/// Load the merged transaction CSV and validate every row
///
/// All columns are read as text so that a single malformed cell rejects
/// its row instead of failing the whole file.
///
/// # Arguments
/// * `file_path` - Path to the merged export with a header row
///
/// # Returns
/// * `LoadReport` with accepted rows sorted by timestamp and every rejected row
pub fn load_transactions(file_path: &str) -> crate::Result<LoadReport> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(file_path.into()))?
        .finish()?;

    let report = parse_frame(&df)?;
    log::info!(
        "Loaded {} of {} rows from {}",
        report.transactions.len(),
        report.total_rows(),
        file_path
    );
    Ok(report)
}

/// Validate a text frame into transactions, recording each rejected row
pub fn parse_frame(df: &DataFrame) -> SegmentResult<LoadReport> {
    let customer_ids = text_column(df, columns::CUSTOMER_ID)?;
    let order_ids = text_column(df, columns::ORDER_ID)?;
    let timestamps = text_column(df, columns::ORDER_TIMESTAMP)?;
    let totals = text_column(df, columns::TOTAL_PRICE)?;

    let categories = optional_text_column(df, columns::CATEGORY);
    let payment_types = optional_text_column(df, columns::PAYMENT_TYPE);
    let payment_values = optional_text_column(df, columns::PAYMENT_VALUE);
    let customer_cities = optional_text_column(df, columns::CUSTOMER_CITY);
    let seller_cities = optional_text_column(df, columns::SELLER_CITY);
    let review_scores = optional_text_column(df, columns::REVIEW_SCORE);

    let mut report = LoadReport::default();

    for idx in 0..df.height() {
        let line = idx + 2;
        let core = validate_core(
            customer_ids.get(idx),
            order_ids.get(idx),
            timestamps.get(idx),
            totals.get(idx),
        );

        match core {
            Ok((customer_id, order_id, order_timestamp, total_price)) => {
                report.transactions.push(Transaction {
                    category: optional_text(categories, idx),
                    payment_type: optional_text(payment_types, idx),
                    payment_value: optional_number(payment_values, idx),
                    customer_city: optional_text(customer_cities, idx),
                    seller_city: optional_text(seller_cities, idx),
                    review_score: optional_number(review_scores, idx),
                    ..Transaction::new(customer_id, order_id, order_timestamp, total_price)
                });
            }
            Err((reason, value)) => {
                log::debug!("Rejected line {}: {} ({:?})", line, reason, value);
                report.rejected.push(RejectedRow {
                    line,
                    reason,
                    value,
                });
            }
        }
    }

    report.transactions.sort_by_key(|t| t.order_timestamp);
    Ok(report)
}

type RowRejection = (RejectReason, Option<String>);

fn validate_core(
    customer_id: Option<&str>,
    order_id: Option<&str>,
    timestamp: Option<&str>,
    total: Option<&str>,
) -> Result<(String, String, NaiveDateTime, f64), RowRejection> {
    let customer_id = non_blank(customer_id).ok_or((RejectReason::MissingCustomerId, None))?;
    let order_id = non_blank(order_id).ok_or((RejectReason::MissingOrderId, None))?;

    let raw_timestamp = non_blank(timestamp).ok_or((RejectReason::MissingTimestamp, None))?;
    let order_timestamp = parse_timestamp(raw_timestamp).ok_or_else(|| {
        (
            RejectReason::UnparseableTimestamp,
            Some(raw_timestamp.to_string()),
        )
    })?;

    let raw_total = non_blank(total).ok_or((RejectReason::MissingTotal, None))?;
    let total_price = match raw_total.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => return Err((RejectReason::NonNumericTotal, Some(raw_total.to_string()))),
    };
    if total_price < 0.0 {
        return Err((RejectReason::NegativeTotal, Some(raw_total.to_string())));
    }

    Ok((
        customer_id.to_string(),
        order_id.to_string(),
        order_timestamp,
        total_price,
    ))
}

/// Parse an order timestamp in any of the export formats seen in practice
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }

    const FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Build the typed frame consumed by the RFM extractor and the rollups
///
/// Order dates are stored as day numbers (days from the common era) so
/// that recency arithmetic stays in plain integers.
pub fn transactions_frame(transactions: &[Transaction]) -> PolarsResult<DataFrame> {
    let customer_ids: Vec<&str> = transactions.iter().map(|t| t.customer_id.as_str()).collect();
    let order_ids: Vec<&str> = transactions.iter().map(|t| t.order_id.as_str()).collect();
    let order_days: Vec<i64> = transactions.iter().map(|t| day_number(t.order_date())).collect();
    let totals: Vec<f64> = transactions.iter().map(|t| t.total_price).collect();
    let categories: Vec<Option<&str>> = transactions.iter().map(|t| t.category.as_deref()).collect();
    let payment_types: Vec<Option<&str>> =
        transactions.iter().map(|t| t.payment_type.as_deref()).collect();
    let payment_values: Vec<Option<f64>> = transactions.iter().map(|t| t.payment_value).collect();
    let customer_cities: Vec<Option<&str>> =
        transactions.iter().map(|t| t.customer_city.as_deref()).collect();
    let seller_cities: Vec<Option<&str>> =
        transactions.iter().map(|t| t.seller_city.as_deref()).collect();
    let review_scores: Vec<Option<f64>> = transactions.iter().map(|t| t.review_score).collect();

    DataFrame::new(vec![
        Series::new(fields::CUSTOMER_ID, customer_ids),
        Series::new(fields::ORDER_ID, order_ids),
        Series::new(fields::ORDER_DAY, order_days),
        Series::new(fields::TOTAL_PRICE, totals),
        Series::new(fields::CATEGORY, categories),
        Series::new(fields::PAYMENT_TYPE, payment_types),
        Series::new(fields::PAYMENT_VALUE, payment_values),
        Series::new(fields::CUSTOMER_CITY, customer_cities),
        Series::new(fields::SELLER_CITY, seller_cities),
        Series::new(fields::REVIEW_SCORE, review_scores),
    ])
}

/// Day number of a calendar date, as stored in the `order_day` column
pub fn day_number(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

/// Inverse of [`day_number`]
pub fn from_day_number(day: i64) -> Option<NaiveDate> {
    i32::try_from(day)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

fn text_column<'a>(df: &'a DataFrame, name: &str) -> SegmentResult<&'a StringChunked> {
    let series = df
        .column(name)
        .map_err(|_| SegmentError::MissingColumn(name.to_string()))?;
    Ok(series.str()?)
}

fn optional_text_column<'a>(df: &'a DataFrame, name: &str) -> Option<&'a StringChunked> {
    df.column(name).ok().and_then(|series| series.str().ok())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn optional_text(column: Option<&StringChunked>, idx: usize) -> Option<String> {
    column
        .and_then(|ca| non_blank(ca.get(idx)))
        .map(str::to_string)
}

fn optional_number(column: Option<&StringChunked>, idx: usize) -> Option<f64> {
    column
        .and_then(|ca| non_blank(ca.get(idx)))
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "order_id,customer_unique_id,order_purchase_timestamp,total_price,product_category_name_english,payment_type,payment_value,customer_city,seller_city,review_score").unwrap();
        writeln!(file, "o2,c1,2018-01-03 12:00:00,20.0,toys,credit_card,25.0,sao paulo,curitiba,5").unwrap();
        writeln!(file, "o1,c1,2018-01-01 08:30:00,10.5,bed_bath_table,boleto,12.0,sao paulo,sao paulo,4").unwrap();
        writeln!(file, "o3,,2018-01-04 09:00:00,5.0,toys,boleto,5.0,rio de janeiro,curitiba,3").unwrap();
        writeln!(file, "o4,c2,yesterday,5.0,toys,boleto,5.0,rio de janeiro,curitiba,3").unwrap();
        writeln!(file, "o5,c2,2018-01-05 10:00:00,-1.0,toys,boleto,5.0,rio de janeiro,curitiba,3").unwrap();
        writeln!(file, "o6,c2,2018-01-05 10:00:00,abc,toys,boleto,5.0,rio de janeiro,curitiba,").unwrap();
        file
    }

    #[test]
    fn test_load_transactions() {
        let test_file = create_test_csv();
        let file_path = test_file.path().to_str().unwrap();

        let report = load_transactions(file_path).unwrap();
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.rejected.len(), 4);
        assert_eq!(report.total_rows(), 6);

        // sorted by timestamp, not file order
        assert_eq!(report.transactions[0].order_id, "o1");
        assert_eq!(report.transactions[1].order_id, "o2");
        assert_eq!(report.transactions[0].category.as_deref(), Some("bed_bath_table"));
        assert_eq!(report.transactions[1].payment_value, Some(25.0));
        assert_eq!(report.transactions[1].review_score, Some(5.0));
    }

    #[test]
    fn test_rejection_accounting() {
        let test_file = create_test_csv();
        let report = load_transactions(test_file.path().to_str().unwrap()).unwrap();

        let counts = report.rejection_counts();
        assert_eq!(counts.get(&RejectReason::MissingCustomerId), Some(&1));
        assert_eq!(counts.get(&RejectReason::UnparseableTimestamp), Some(&1));
        assert_eq!(counts.get(&RejectReason::NegativeTotal), Some(&1));
        assert_eq!(counts.get(&RejectReason::NonNumericTotal), Some(&1));

        let lines: Vec<usize> = report.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![4, 5, 6, 7]);
        assert_eq!(report.rejected[1].value.as_deref(), Some("yesterday"));
    }

    #[test]
    fn test_missing_required_column() {
        let df = df!(
            "customer_unique_id" => &["c1"],
            "order_id" => &["o1"],
            "total_price" => &["1.0"]
        )
        .unwrap();

        match parse_frame(&df) {
            Err(SegmentError::MissingColumn(name)) => assert_eq!(name, columns::ORDER_TIMESTAMP),
            other => panic!("expected missing column error, got {:?}", other),
        }
    }

    #[test]
    fn test_optional_columns_absent() {
        let df = df!(
            "customer_unique_id" => &["c1", "c2"],
            "order_id" => &["o1", "o2"],
            "order_purchase_timestamp" => &["2018-02-01", "2018-02-02T10:00:00"],
            "total_price" => &["3", "4.25"]
        )
        .unwrap();

        let report = parse_frame(&df).unwrap();
        assert!(report.rejected.is_empty());
        assert_eq!(report.transactions.len(), 2);
        assert!(report.transactions.iter().all(|t| t.category.is_none()));
        assert_eq!(report.transactions[1].total_price, 4.25);
    }

    #[test]
    fn test_null_cells_are_rejected() {
        let df = df!(
            "customer_unique_id" => &[Some("c1"), Some("c2")],
            "order_id" => &[None, Some("o2")],
            "order_purchase_timestamp" => &[Some("2018-02-01"), Some("2018-02-01")],
            "total_price" => &[Some("3"), None]
        )
        .unwrap();

        let report = parse_frame(&df).unwrap();
        assert!(report.transactions.is_empty());
        let reasons: Vec<RejectReason> = report.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![RejectReason::MissingOrderId, RejectReason::MissingTotal]
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2017, 10, 2)
            .unwrap()
            .and_hms_opt(10, 56, 33)
            .unwrap();
        assert_eq!(parse_timestamp("2017-10-02 10:56:33"), Some(expected));
        assert_eq!(parse_timestamp("2017-10-02T10:56:33"), Some(expected));
        assert_eq!(parse_timestamp("2017-10-02T10:56:33Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2017-10-02"),
            NaiveDate::from_ymd_opt(2017, 10, 2).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("02/10/2017"), None);
    }

    #[test]
    fn test_day_number_round_trip() {
        let date = NaiveDate::from_ymd_opt(2018, 8, 29).unwrap();
        assert_eq!(from_day_number(day_number(date)), Some(date));
        assert_eq!(
            day_number(date) - day_number(NaiveDate::from_ymd_opt(2018, 8, 1).unwrap()),
            28
        );
    }

    #[test]
    fn test_transactions_frame_shape() {
        let ts = parse_timestamp("2018-01-01 00:00:00").unwrap();
        let mut tx = Transaction::new("c1", "o1", ts, 9.0);
        tx.category = Some("toys".to_string());
        let df = transactions_frame(&[tx, Transaction::new("c2", "o2", ts, 1.0)]).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 10);
        assert_eq!(df.column(fields::CATEGORY).unwrap().null_count(), 1);
    }
}
