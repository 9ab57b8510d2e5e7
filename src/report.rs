//! Console rendering of the dashboard and export of the scored customer table

use std::fs::File;

use polars::prelude::*;

use crate::aggregate::{rfm_averages, segment_counts, top_customers};
use crate::dashboard::Dashboard;
use crate::data::LoadReport;
use crate::rfm::{Metric, ScoredRecord};

/// Currency used for revenue figures
pub const CURRENCY: &str = "AUD";

/// Rows shown in the top/bottom category tables
const CATEGORY_ROWS: usize = 6;
/// Rows shown in the city tables
const CITY_ROWS: usize = 10;

/// Format an amount as `"<CODE> 1,234,567.89"`
pub fn format_currency(value: f64, code: &str) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{} {}{}.{:02}", code, sign, grouped, cents % 100)
}

/// Print how many rows were accepted and why the rest were rejected
pub fn print_load_summary(report: &LoadReport) {
    println!(
        "✓ Data loaded: {} transactions ({} rows read)",
        report.transactions.len(),
        report.total_rows()
    );

    let counts = report.rejection_counts();
    if counts.is_empty() {
        return;
    }
    log::warn!("{} rows rejected", report.rejected.len());
    println!("  Rejected rows: {}", report.rejected.len());
    for (reason, count) in counts {
        println!("    {:<28} {:>8}", reason.to_string(), count);
    }
}

/// Print every dashboard section to stdout
pub fn print_dashboard(dashboard: &Dashboard, top_n: usize) {
    print_daily_orders(dashboard);
    print_categories(dashboard);
    print_seller_cities(dashboard);
    print_payments(dashboard);
    print_ratings(dashboard);
    print_city_revenue(dashboard);
    print_rfm(dashboard, top_n);
    print_segments(dashboard);
}

fn print_daily_orders(dashboard: &Dashboard) {
    println!("\n=== Daily Orders for: {} ===", dashboard.filter.category);
    println!(
        "Period: {} to {}",
        dashboard.filter.start, dashboard.filter.end
    );
    println!("Total orders:  {}", dashboard.summary.total_orders);
    println!(
        "Total revenue: {}",
        format_currency(dashboard.summary.total_revenue, CURRENCY)
    );

    let busiest = dashboard.daily.iter().max_by_key(|d| d.order_count);
    if let Some(day) = busiest {
        println!("Busiest day:   {} ({} orders)", day.date, day.order_count);
    }
    let active_days = dashboard.daily.iter().filter(|d| d.order_count > 0).count();
    println!(
        "Active days:   {} of {}",
        active_days,
        dashboard.daily.len()
    );
}

fn print_categories(dashboard: &Dashboard) {
    println!("\n=== Top Categories by Order ===");
    println!("  {:<40} | {:>8}", "Highest", "Orders");
    for row in dashboard.categories.iter().take(CATEGORY_ROWS) {
        println!("  {:<40} | {:>8}", row.category, row.orders);
    }
    println!("  {:<40} | {:>8}", "Lowest", "Orders");
    let skip = dashboard.categories.len().saturating_sub(CATEGORY_ROWS);
    for row in dashboard.categories.iter().skip(skip) {
        println!("  {:<40} | {:>8}", row.category, row.orders);
    }
}

fn print_seller_cities(dashboard: &Dashboard) {
    println!("\n=== {} Cities with the largest number of Sellers ===", CITY_ROWS);
    for row in dashboard.seller_cities.iter().take(CITY_ROWS) {
        println!("  {:<32} | {:>8}", row.city, row.count);
    }
}

fn print_payments(dashboard: &Dashboard) {
    println!("\n=== Payment Types by Frequency and Revenue ===");
    println!(
        "  {:<16} | {:>9} | {:>7} | {:>12}",
        "Payment type", "Orders", "Share", "Value (M)"
    );
    for row in &dashboard.payments {
        println!(
            "  {:<16} | {:>9} | {:>6.1}% | {:>12.3}",
            row.payment_type, row.frequency, row.frequency_percentage, row.payment_value_million
        );
    }
}

fn print_ratings(dashboard: &Dashboard) {
    println!("\n=== Categories by Rating ===");
    println!("  {:<40} | {:>6}", "Highest rated", "Score");
    for row in dashboard.ratings.iter().take(CATEGORY_ROWS) {
        println!("  {:<40} | {:>6.2}", row.category, row.mean_score);
    }
    println!("  {:<40} | {:>6}", "Lowest rated", "Score");
    let skip = dashboard.ratings.len().saturating_sub(CATEGORY_ROWS);
    for row in dashboard.ratings.iter().skip(skip) {
        println!("  {:<40} | {:>6.2}", row.category, row.mean_score);
    }
}

fn print_city_revenue(dashboard: &Dashboard) {
    println!("\n=== Top {} cities with the highest Revenue ===", CITY_ROWS);
    for row in dashboard.cities.iter().take(CITY_ROWS) {
        println!(
            "  {:<32} | {:>20}",
            row.city,
            format_currency(row.revenue, CURRENCY)
        );
    }
}

fn print_rfm(dashboard: &Dashboard, top_n: usize) {
    println!("\n=== Best Customers Based on RFM Parameters ===");
    let Some(averages) = rfm_averages(&dashboard.customers) else {
        println!("  No customers");
        return;
    };
    println!("Average Recency (days): {:.1}", averages.recency);
    println!("Average Frequency:      {:.2}", averages.frequency);
    println!(
        "Average Monetary:       {}",
        format_currency(averages.monetary, CURRENCY)
    );

    for (metric, title) in [
        (Metric::Recency, "By Recency (days)"),
        (Metric::Frequency, "By Frequency"),
        (Metric::Monetary, "By Monetary"),
    ] {
        println!("\n  {}", title);
        for customer in top_customers(&dashboard.customers, metric, top_n) {
            let value = match metric {
                Metric::Recency => customer.recency.to_string(),
                Metric::Frequency => customer.frequency.to_string(),
                Metric::Monetary => format!("{:.2}", customer.monetary),
            };
            println!("    {:<34} | {:>12}", customer.customer_id, value);
        }
    }
}

fn print_segments(dashboard: &Dashboard) {
    println!("\n=== Customer Segmentation based on RFM analysis ===");
    let records = match &dashboard.segmentation {
        Ok(records) => records,
        Err(e) => {
            println!("  Segmentation unavailable: {}", e);
            return;
        }
    };

    println!("  {:<24} | {:>9} | {:>7}", "Segment", "Customers", "Ratio");
    println!("  -------------------------|-----------|--------");
    for row in segment_counts(records) {
        println!(
            "  {:<24} | {:>9} | {:>6.2}%",
            row.segment.label(),
            row.customers,
            row.share * 100.0
        );
    }
}

/// Scored customers as a frame, one row per customer
pub fn segments_frame(records: &[ScoredRecord]) -> PolarsResult<DataFrame> {
    let customer_ids: Vec<&str> = records
        .iter()
        .map(|r| r.metrics.customer_id.as_str())
        .collect();
    let recency: Vec<i64> = records.iter().map(|r| r.metrics.recency).collect();
    let frequency: Vec<i64> = records
        .iter()
        .map(|r| i64::from(r.metrics.frequency))
        .collect();
    let monetary: Vec<f64> = records.iter().map(|r| r.metrics.monetary).collect();
    let recency_score: Vec<i32> = records.iter().map(|r| i32::from(r.scores.recency)).collect();
    let frequency_score: Vec<i32> = records
        .iter()
        .map(|r| i32::from(r.scores.frequency))
        .collect();
    let monetary_score: Vec<i32> = records
        .iter()
        .map(|r| i32::from(r.scores.monetary))
        .collect();
    let rfm_score: Vec<String> = records.iter().map(|r| r.scores.code()).collect();
    let segment: Vec<&str> = records.iter().map(|r| r.segment.label()).collect();

    DataFrame::new(vec![
        Series::new("customer_id", customer_ids),
        Series::new("recency", recency),
        Series::new("frequency", frequency),
        Series::new("monetary", monetary),
        Series::new("recency_score", recency_score),
        Series::new("frequency_score", frequency_score),
        Series::new("monetary_score", monetary_score),
        Series::new("rfm_score", rfm_score),
        Series::new("segment", segment),
    ])
}

/// Write the labeled per-customer table as CSV
///
/// # Arguments
/// * `records` - Scored customers, written in the given order
/// * `output_path` - Destination file, overwritten if present
pub fn write_segments_csv(records: &[ScoredRecord], output_path: &str) -> crate::Result<()> {
    let mut df = segments_frame(records)?;
    let mut file = File::create(output_path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    log::info!("Wrote {} scored customers to {}", records.len(), output_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::RfmScores;
    use crate::rfm::CustomerMetrics;
    use crate::segment::Segment;
    use tempfile::tempdir;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0, "AUD"), "AUD 0.00");
        assert_eq!(format_currency(999.5, "AUD"), "AUD 999.50");
        assert_eq!(format_currency(1234567.891, "AUD"), "AUD 1,234,567.89");
        assert_eq!(format_currency(-1000.0, "BRL"), "BRL -1,000.00");
        assert_eq!(format_currency(100000.0, "AUD"), "AUD 100,000.00");
    }

    fn record(id: &str, recency: u8, frequency: u8, monetary: u8) -> ScoredRecord {
        let scores = RfmScores {
            recency,
            frequency,
            monetary,
        };
        ScoredRecord {
            metrics: CustomerMetrics {
                customer_id: id.to_string(),
                recency: 3,
                frequency: 2,
                monetary: 150.25,
            },
            segment: crate::segment::classify(&scores),
            scores,
        }
    }

    #[test]
    fn test_segments_frame() {
        let records = vec![record("a", 5, 5, 5), record("b", 1, 1, 1)];
        let df = segments_frame(&records).unwrap();

        assert_eq!(df.shape(), (2, 9));
        let segments: Vec<Option<&str>> = df
            .column("segment")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            segments,
            vec![
                Some(Segment::Champions.label()),
                Some(Segment::LostCustomers.label())
            ]
        );
    }

    #[test]
    fn test_write_segments_csv() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("segments.csv");
        let output_str = output_path.to_str().unwrap();

        let records = vec![record("a", 5, 4, 3), record("b", 2, 2, 2)];
        write_segments_csv(&records, output_str).unwrap();

        let written = std::fs::read_to_string(&output_path).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some("customer_id,recency,frequency,monetary,recency_score,frequency_score,monetary_score,rfm_score,segment")
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("a,3,2,150.25,5,4,3,543,"));
        assert!(first.ends_with("Potential Loyalist"));
        assert_eq!(lines.count(), 1);
    }
}
