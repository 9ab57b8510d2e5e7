//! Date-range and category selection for the dashboard views

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;

use crate::data::Transaction;
use crate::error::{SegmentError, SegmentResult};

/// Option shown first in the category selector
pub const ALL_CATEGORIES: &str = "All Categories";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(String),
}

impl CategoryFilter {
    /// Interpret a selector value, treating [`ALL_CATEGORIES`] as no filter
    pub fn from_selection(selection: &str) -> Self {
        if selection == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(selection.to_string())
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str(ALL_CATEGORIES),
            CategoryFilter::Only(category) => f.write_str(category),
        }
    }
}

/// Inclusive date window plus category selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardFilter {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub category: CategoryFilter,
}

impl DashboardFilter {
    pub fn new(start: NaiveDate, end: NaiveDate, category: CategoryFilter) -> SegmentResult<Self> {
        if start > end {
            return Err(SegmentError::InvalidDateRange { start, end });
        }
        Ok(Self {
            start,
            end,
            category,
        })
    }

    /// Whole dataset, all categories; `None` when there are no transactions
    pub fn spanning(transactions: &[Transaction]) -> Option<Self> {
        date_bounds(transactions).map(|(start, end)| Self {
            start,
            end,
            category: CategoryFilter::All,
        })
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        let date = transaction.order_date();
        if date < self.start || date > self.end {
            return false;
        }
        match &self.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => {
                transaction.category.as_deref() == Some(category.as_str())
            }
        }
    }

    /// Matching transactions, input order preserved
    pub fn apply(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        transactions
            .iter()
            .filter(|t| self.matches(t))
            .cloned()
            .collect()
    }
}

/// First and last order date in the dataset
pub fn date_bounds(transactions: &[Transaction]) -> Option<(NaiveDate, NaiveDate)> {
    let first = transactions.iter().map(Transaction::order_date).min()?;
    let last = transactions.iter().map(Transaction::order_date).max()?;
    Some((first, last))
}

/// Selector options: [`ALL_CATEGORIES`] then each category in first-seen order
pub fn category_options(transactions: &[Transaction]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut options = vec![ALL_CATEGORIES.to_string()];
    for category in transactions.iter().filter_map(|t| t.category.as_deref()) {
        if seen.insert(category) {
            options.push(category.to_string());
        }
    }
    options
}

/// Resolve a selector value against the categories present in the data
///
/// Only values listed by [`category_options`] are accepted, so a misspelt
/// category is reported instead of producing an empty view.
pub fn resolve_category(
    selection: &str,
    transactions: &[Transaction],
) -> SegmentResult<CategoryFilter> {
    let options = category_options(transactions);
    if options.iter().any(|option| option == selection) {
        Ok(CategoryFilter::from_selection(selection))
    } else {
        Err(SegmentError::UnknownCategory {
            category: selection.to_string(),
            available: options,
        })
    }
}
