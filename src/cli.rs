//! Command-line interface definitions and argument parsing

use chrono::NaiveDate;
use clap::Parser;

use crate::binning::RfmScores;
use crate::filter::ALL_CATEGORIES;

/// E-commerce dashboard with RFM customer segmentation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the merged transaction CSV file
    #[arg(short, long, default_value = "all_merged_df.csv")]
    pub input: String,

    /// First day of the daily-orders view (YYYY-MM-DD), defaults to the first order
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last day of the daily-orders view (YYYY-MM-DD), inclusive, defaults to the last order
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Product category for the daily-orders view
    #[arg(short, long, default_value = ALL_CATEGORIES)]
    pub category: String,

    /// Output path for the scored customer table
    #[arg(short, long, default_value = "rfm_segments.csv")]
    pub output: String,

    /// Number of customers listed per RFM metric
    #[arg(short = 'n', long, default_value = "8")]
    pub top: usize,

    /// Lookup mode: classify a 3-digit RFM score such as "543"
    /// (recency, frequency and monetary score, each 1-5)
    #[arg(short, long)]
    pub score: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the RFM score code from the score string
    /// Expected format: three digits from 1 to 5, e.g. "543"
    pub fn parse_score_code(&self) -> crate::Result<Option<RfmScores>> {
        let Some(ref code) = self.score else {
            return Ok(None);
        };

        let digits: Vec<u8> = code
            .trim()
            .chars()
            .map(|c| match c.to_digit(10) {
                Some(d @ 1..=5) => Ok(d as u8),
                _ => Err(anyhow::anyhow!("Invalid score digit '{}' in {}", c, code)),
            })
            .collect::<crate::Result<_>>()?;

        if digits.len() != 3 {
            anyhow::bail!(
                "Score must be exactly 3 digits (recency, frequency, monetary), got '{}'",
                code
            );
        }

        Ok(Some(RfmScores {
            recency: digits[0],
            frequency: digits[1],
            monetary: digits[2],
        }))
    }
}
