//! RFM Dash: an e-commerce transaction dashboard with RFM customer segmentation
//!
//! Loads a merged transaction export, rolls it up into dashboard views and
//! scores every customer on Recency, Frequency and Monetary quintiles before
//! mapping the score pattern to a named segment.

pub mod aggregate;
pub mod binning;
pub mod cli;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod filter;
pub mod report;
pub mod rfm;
pub mod segment;

// Re-export public items for easier access
pub use binning::{score_population, RfmScores};
pub use cli::Args;
pub use dashboard::Dashboard;
pub use data::{load_transactions, LoadReport, RejectReason, Transaction};
pub use error::{SegmentError, SegmentResult};
pub use filter::{CategoryFilter, DashboardFilter};
pub use rfm::{compute_segments, extract_metrics, CustomerMetrics, Metric, ScoredRecord};
pub use segment::{classify_code, Segment};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
