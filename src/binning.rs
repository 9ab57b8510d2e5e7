//! Quintile binning of RFM metrics into 1-5 scores
//!
//! Cuts are population-relative: edges sit at the 0, 20, 40, 60, 80 and
//! 100th percentiles (linear interpolation) of the values being scored, so
//! the whole customer population has to be scored in one call.

use polars::prelude::*;

use crate::error::{SegmentError, SegmentResult};
use crate::rfm::{CustomerMetrics, Metric};

/// Number of buckets per metric
pub const QUINTILES: usize = 5;

/// Quintile scores of one customer, each in 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RfmScores {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
}

impl RfmScores {
    /// Recency, frequency and monetary digits concatenated, e.g. "543"
    pub fn code(&self) -> String {
        format!("{}{}{}", self.recency, self.frequency, self.monetary)
    }
}

/// Which end of the value range earns score 5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrder {
    /// Smallest values score 5 (recency: fewer days is better)
    LowestBest,
    /// Largest values score 5
    HighestBest,
}

/// What the quantile edges are computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutBasis {
    /// Raw values; duplicate edges are an error
    Values,
    /// Ordinal rank with ties broken by first appearance
    FirstSeenRank,
}

/// Score every customer on all three metrics
///
/// Frequency is ranked before cutting because order counts are heavily
/// tied in practice.
///
/// # Arguments
/// * `metrics` - The whole customer population; edges are relative to it
///
/// # Returns
/// * Scores aligned index for index with `metrics`
pub fn score_population(metrics: &[CustomerMetrics]) -> SegmentResult<Vec<RfmScores>> {
    let column = |metric: Metric| -> Vec<f64> { metrics.iter().map(|m| m.value(metric)).collect() };

    let recency = quintile_scores(
        &column(Metric::Recency),
        Metric::Recency,
        CutBasis::Values,
        ScoreOrder::LowestBest,
    )?;
    let frequency = quintile_scores(
        &column(Metric::Frequency),
        Metric::Frequency,
        CutBasis::FirstSeenRank,
        ScoreOrder::HighestBest,
    )?;
    let monetary = quintile_scores(
        &column(Metric::Monetary),
        Metric::Monetary,
        CutBasis::Values,
        ScoreOrder::HighestBest,
    )?;

    Ok(recency
        .into_iter()
        .zip(frequency)
        .zip(monetary)
        .map(|((recency, frequency), monetary)| RfmScores {
            recency,
            frequency,
            monetary,
        })
        .collect())
}

const VALUE: &str = "value";
const CUT: &str = "cut";
const BUCKET: &str = "bucket";

/// Cut `values` into five quantile buckets and return a 1-5 score per value
///
/// Buckets are `(lo, hi]` with the smallest value in the first bucket.
/// Edges use linear interpolation, and all six of them (minimum and
/// maximum included) must be distinct.
///
/// # Arguments
/// * `values` - One value per customer
/// * `metric` - Reported in the error when edges collapse
/// * `basis` - Cut the raw values or their first-seen ordinal rank
/// * `order` - Which end of the range earns score 5
///
/// # Returns
/// * Scores aligned with `values`
pub fn quintile_scores(
    values: &[f64],
    metric: Metric,
    basis: CutBasis,
    order: ScoreOrder,
) -> SegmentResult<Vec<u8>> {
    if values.len() < QUINTILES {
        return Err(SegmentError::InsufficientPopulation {
            customers: values.len(),
            required: QUINTILES,
        });
    }

    let cut_expr = match basis {
        CutBasis::Values => col(VALUE),
        CutBasis::FirstSeenRank => col(VALUE)
            .rank(
                RankOptions {
                    method: RankMethod::Ordinal,
                    descending: false,
                },
                None,
            )
            .cast(DataType::Float64),
    };
    let cut_frame = DataFrame::new(vec![Series::new(VALUE, values)])?
        .lazy()
        .select([cut_expr.alias(CUT)]);

    let edges = quantile_edges(cut_frame.clone())?;
    let distinct = edges.windows(2).all(|pair| match (pair[0], pair[1]) {
        (Some(lo), Some(hi)) => lo < hi,
        _ => false,
    });
    if !distinct {
        return Err(SegmentError::InsufficientDistinctValues { metric });
    }

    let labels: Vec<String> = (1..=QUINTILES).map(|bucket| bucket.to_string()).collect();
    let bucket_df = cut_frame
        .select([col(CUT)
            .qcut(interior_probabilities(), Some(labels), false, false, false)
            .cast(DataType::String)
            .cast(DataType::Int32)
            .alias(BUCKET)])
        .collect()?;

    bucket_df
        .column(BUCKET)?
        .i32()?
        .into_iter()
        .map(|bucket| -> SegmentResult<u8> {
            let bucket = bucket.ok_or_else(|| SegmentError::NullValue {
                column: BUCKET.to_string(),
            })?;
            let bucket = bucket.clamp(1, QUINTILES as i32) as u8;
            Ok(match order {
                ScoreOrder::HighestBest => bucket,
                ScoreOrder::LowestBest => QUINTILES as u8 + 1 - bucket,
            })
        })
        .collect()
}

/// 0.2, 0.4, 0.6 and 0.8
fn interior_probabilities() -> Vec<f64> {
    (1..QUINTILES).map(|k| k as f64 / QUINTILES as f64).collect()
}

/// The six quintile edges of the `cut` column, minimum and maximum included
fn quantile_edges(cut_frame: LazyFrame) -> SegmentResult<Vec<Option<f64>>> {
    let edge_exprs: Vec<Expr> = (0..=QUINTILES)
        .map(|k| {
            col(CUT)
                .quantile(
                    lit(k as f64 / QUINTILES as f64),
                    QuantileInterpolOptions::Linear,
                )
                .alias(&format!("edge_{}", k))
        })
        .collect();
    let edges_df = cut_frame.select(edge_exprs).collect()?;

    edges_df
        .get_columns()
        .iter()
        .map(|edge| -> SegmentResult<Option<f64>> { Ok(edge.f64()?.get(0)) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bucket_sizes(scores: &[u8]) -> [usize; QUINTILES] {
        let mut sizes = [0; QUINTILES];
        for &score in scores {
            sizes[usize::from(score) - 1] += 1;
        }
        sizes
    }

    fn metrics(values: &[(i64, u32, f64)]) -> Vec<CustomerMetrics> {
        values
            .iter()
            .enumerate()
            .map(|(i, &(recency, frequency, monetary))| CustomerMetrics {
                customer_id: format!("c{:03}", i),
                recency,
                frequency,
                monetary,
            })
            .collect()
    }

    #[test]
    fn test_recency_scenario_25_customers() {
        let recency: Vec<f64> = (0..25).map(f64::from).collect();
        let scores =
            quintile_scores(&recency, Metric::Recency, CutBasis::Values, ScoreOrder::LowestBest)
                .unwrap();

        assert_eq!(bucket_sizes(&scores), [5, 5, 5, 5, 5]);
        assert!(scores[..5].iter().all(|&s| s == 5));
        assert!(scores[20..].iter().all(|&s| s == 1));
    }

    #[test]
    fn test_first_seen_tie_break() {
        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0];
        let scores = quintile_scores(
            &values,
            Metric::Frequency,
            CutBasis::FirstSeenRank,
            ScoreOrder::HighestBest,
        )
        .unwrap();
        assert_eq!(scores, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_three_customers_insufficient_population() {
        let population = metrics(&[(1, 10, 9000.0), (400, 1, 50.0), (200, 3, 500.0)]);
        match score_population(&population) {
            Err(SegmentError::InsufficientPopulation {
                customers,
                required,
            }) => {
                assert_eq!(customers, 3);
                assert_eq!(required, QUINTILES);
            }
            other => panic!("expected InsufficientPopulation, got {:?}", other),
        }
    }

    #[test]
    fn test_uniform_values_insufficient_distinct() {
        let population: Vec<(i64, u32, f64)> = (0..25).map(|d| (d, 1, 100.0)).collect();
        match score_population(&metrics(&population)) {
            Err(SegmentError::InsufficientDistinctValues { metric }) => {
                assert_eq!(metric, Metric::Monetary)
            }
            other => panic!("expected InsufficientDistinctValues, got {:?}", other),
        }
    }

    #[test]
    fn test_score_population_directions() {
        let population: Vec<(i64, u32, f64)> = (0..10)
            .map(|i| (i as i64 * 3, 1 + i as u32, 50.0 * (i + 1) as f64))
            .collect();
        let scores = score_population(&metrics(&population)).unwrap();

        assert_eq!(
            scores[0],
            RfmScores {
                recency: 5,
                frequency: 1,
                monetary: 1
            }
        );
        assert_eq!(scores[9].code(), "155");
    }

    fn balanced(sizes: [usize; QUINTILES], n: usize) -> bool {
        sizes.iter().all(|&size| size == n / 5 || size == (n + 4) / 5)
    }

    /// Distinct integer-valued amounts in arbitrary order
    fn arb_distinct_values() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::hash_set(0u32..100_000, QUINTILES..200)
            .prop_map(|set| set.into_iter().map(|v| f64::from(v) * 1.5).collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn quintile_balance_on_distinct_values(values in arb_distinct_values()) {
            for order in [ScoreOrder::HighestBest, ScoreOrder::LowestBest] {
                let scores =
                    quintile_scores(&values, Metric::Monetary, CutBasis::Values, order).unwrap();
                prop_assert!(
                    balanced(bucket_sizes(&scores), values.len()),
                    "n={} produced buckets {:?}",
                    values.len(),
                    bucket_sizes(&scores)
                );
            }
        }

        #[test]
        fn ranked_cut_balanced_despite_ties(
            orders in prop::collection::vec(1u32..4, QUINTILES..200)
        ) {
            let values: Vec<f64> = orders.iter().copied().map(f64::from).collect();
            let scores = quintile_scores(
                &values,
                Metric::Frequency,
                CutBasis::FirstSeenRank,
                ScoreOrder::HighestBest,
            )
            .unwrap();
            prop_assert!(balanced(bucket_sizes(&scores), values.len()));

            // ties never invert: a larger order count never scores lower
            for a in 0..values.len() {
                for b in 0..values.len() {
                    if values[a] > values[b] {
                        prop_assert!(scores[a] >= scores[b]);
                    }
                }
            }
        }

        #[test]
        fn recency_score_never_rises_with_age(
            days in prop::collection::vec(0i64..720, QUINTILES..200)
        ) {
            let recency: Vec<f64> = days.iter().map(|&d| d as f64).collect();
            match quintile_scores(&recency, Metric::Recency, CutBasis::Values, ScoreOrder::LowestBest) {
                Ok(scores) => {
                    for a in 0..recency.len() {
                        for b in 0..recency.len() {
                            if recency[a] < recency[b] {
                                prop_assert!(scores[a] >= scores[b]);
                            }
                        }
                    }
                }
                Err(SegmentError::InsufficientDistinctValues { metric }) => {
                    prop_assert_eq!(metric, Metric::Recency);
                }
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }

        #[test]
        fn population_scores_stay_in_range(
            rows in prop::collection::vec((0i64..720, 1u32..20, 1u32..10_000), QUINTILES..120)
        ) {
            let population: Vec<(i64, u32, f64)> = rows
                .into_iter()
                .enumerate()
                .map(|(i, (recency, frequency, cents))| {
                    (recency, frequency, f64::from(cents) + i as f64 * 0.001)
                })
                .collect();
            if let Ok(scores) = score_population(&metrics(&population)) {
                prop_assert_eq!(scores.len(), population.len());
                for s in scores {
                    for digit in [s.recency, s.frequency, s.monetary] {
                        prop_assert!((1..=5).contains(&digit));
                    }
                }
            }
        }
    }
}
