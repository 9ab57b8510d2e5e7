//! Assembly of every dashboard section for one filter selection

use crate::aggregate::{
    category_order_counts, category_ratings, city_revenue, daily_orders, order_summary,
    payment_mix, seller_city_counts, CategoryCount, CategoryRating, CityCount, CityRevenue,
    DailyOrders, OrderSummary, PaymentShare,
};
use crate::data::Transaction;
use crate::error::{SegmentError, SegmentResult};
use crate::filter::DashboardFilter;
use crate::rfm::{extract_metrics, reference_date, score_customers, CustomerMetrics, ScoredRecord};

/// All computed sections of the dashboard
#[derive(Debug)]
pub struct Dashboard {
    pub filter: DashboardFilter,
    /// Daily view over the filtered rows
    pub daily: Vec<DailyOrders>,
    pub summary: OrderSummary,
    pub categories: Vec<CategoryCount>,
    pub ratings: Vec<CategoryRating>,
    pub payments: Vec<PaymentShare>,
    pub cities: Vec<CityRevenue>,
    pub seller_cities: Vec<CityCount>,
    /// Per-customer metrics over the full dataset
    pub customers: Vec<CustomerMetrics>,
    /// Segmentation outcome; binning failures are kept for the caller to report
    pub segmentation: SegmentResult<Vec<ScoredRecord>>,
}

impl Dashboard {
    /// Compute every section
    ///
    /// Only the daily view honours `filter`. Category, payment and city
    /// rollups cover the full dataset, and RFM always does so that customer
    /// scores stay comparable across filter selections.
    ///
    /// # Arguments
    /// * `transactions` - The full validated dataset
    /// * `filter` - Date range and category for the daily-orders view
    pub fn build(transactions: &[Transaction], filter: &DashboardFilter) -> SegmentResult<Self> {
        let filtered = filter.apply(transactions);
        log::info!(
            "Filter {} to {} ({}) kept {} of {} rows",
            filter.start,
            filter.end,
            filter.category,
            filtered.len(),
            transactions.len()
        );

        let daily = daily_orders(&filtered)?;
        let summary = order_summary(&daily);

        let customers = match reference_date(transactions) {
            Some(reference) => extract_metrics(transactions, reference)?,
            None => Vec::new(),
        };
        let segmentation = if customers.is_empty() {
            Err(SegmentError::InsufficientPopulation {
                customers: 0,
                required: crate::binning::QUINTILES,
            })
        } else {
            score_customers(customers.clone())
        };
        if let Err(e) = &segmentation {
            log::warn!("Customer segmentation unavailable: {}", e);
        }

        Ok(Self {
            filter: filter.clone(),
            daily,
            summary,
            categories: category_order_counts(transactions)?,
            ratings: category_ratings(transactions)?,
            payments: payment_mix(transactions)?,
            cities: city_revenue(transactions)?,
            seller_cities: seller_city_counts(transactions)?,
            customers,
            segmentation,
        })
    }
}
