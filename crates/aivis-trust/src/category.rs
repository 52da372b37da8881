//! Topic trend per prompt category, from recorded visibility history.

use std::collections::BTreeMap;

use aivis_core::{TrendDirection, TrustWindow};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::stats::{mean, round6};
use crate::trends;

/// One visibility-history point tagged with its prompt's category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryVisibility {
    pub category: String,
    pub recorded_on: NaiveDate,
    /// Visibility score, 0–100.
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTrend {
    pub category: String,
    pub window: TrustWindow,
    pub as_of: NaiveDate,
    pub current_mean: Option<f64>,
    pub previous_mean: Option<f64>,
    /// `current_mean - previous_mean`; `None` unless both windows have data.
    pub delta: Option<f64>,
    pub direction: TrendDirection,
    pub samples: usize,
}

/// Compare each category's mean score over `window` ending at `as_of` with
/// the mean over the window of equal length just before it.
///
/// `dead_band` is in score points. Categories are returned in name order.
#[must_use]
pub fn compute_category_trends(
    points: &[CategoryVisibility],
    window: TrustWindow,
    as_of: NaiveDate,
    dead_band: f64,
) -> Vec<CategoryTrend> {
    let current_start = as_of - Duration::days(window.days() - 1);
    let previous_start = current_start - Duration::days(window.days());

    let mut buckets: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for p in points {
        if p.recorded_on > as_of || p.recorded_on < previous_start {
            continue;
        }
        let (current, previous) = buckets.entry(p.category.as_str()).or_default();
        if p.recorded_on >= current_start {
            current.push(p.score);
        } else {
            previous.push(p.score);
        }
    }

    buckets
        .into_iter()
        .map(|(category, (current, previous))| {
            let current_mean = mean(&current).map(round6);
            let previous_mean = mean(&previous).map(round6);
            let delta = current_mean.zip(previous_mean).map(|(c, p)| round6(c - p));
            if delta.is_none() {
                tracing::debug!(
                    category,
                    window = %window,
                    "category trend lacks a comparison window"
                );
            }
            let direction =
                delta.map_or(TrendDirection::Stable, |d| trends::direction(d, dead_band));
            CategoryTrend {
                category: category.to_string(),
                window,
                as_of,
                current_mean,
                previous_mean,
                delta,
                direction,
                samples: current.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(category: &str, day: u32, score: f64) -> CategoryVisibility {
        CategoryVisibility {
            category: category.to_string(),
            recorded_on: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            score,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn delta_compares_adjacent_windows() {
        // previous week: 1..=7, current week: 8..=14
        let points = vec![
            point("crm", 2, 40.0),
            point("crm", 5, 50.0),
            point("crm", 9, 60.0),
            point("crm", 13, 70.0),
        ];
        let trends = compute_category_trends(&points, TrustWindow::Week, as_of(), 1.0);
        assert_eq!(trends.len(), 1);
        let t = &trends[0];
        assert_eq!(t.previous_mean, Some(45.0));
        assert_eq!(t.current_mean, Some(65.0));
        assert_eq!(t.delta, Some(20.0));
        assert_eq!(t.direction, TrendDirection::Improving);
        assert_eq!(t.samples, 2);
    }

    #[test]
    fn unchanged_category_is_stable_without_dead_band() {
        let points = vec![point("crm", 3, 50.0), point("crm", 10, 50.0)];
        let t = &compute_category_trends(&points, TrustWindow::Week, as_of(), 0.0)[0];
        assert_eq!(t.delta, Some(0.0));
        assert_eq!(t.direction, TrendDirection::Stable);
    }

    #[test]
    fn missing_previous_window_has_no_delta() {
        let points = vec![point("crm", 10, 60.0)];
        let t = &compute_category_trends(&points, TrustWindow::Week, as_of(), 1.0)[0];
        assert_eq!(t.delta, None);
        assert_eq!(t.direction, TrendDirection::Stable);
    }

    #[test]
    fn categories_sorted_and_out_of_range_points_ignored() {
        let points = vec![
            point("zeta", 10, 10.0),
            point("alpha", 10, 20.0),
            point("alpha", 15, 99.0),
        ];
        let trends = compute_category_trends(&points, TrustWindow::Week, as_of(), 1.0);
        let names: Vec<_> = trends.iter().map(|t| t.category.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(trends[0].current_mean, Some(20.0));
    }
}
