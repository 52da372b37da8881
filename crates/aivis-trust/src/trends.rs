//! Windowed authority trend for one engine.

use std::collections::BTreeMap;

use aivis_core::{TrendDirection, TrendPolicy, TrustSnapshot, TrustTrend, TrustWindow};
use chrono::{Duration, NaiveDate};

use crate::stats::{linear_fit, round6, std_dev};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// A move must leave the dead band to count, so a zero delta is always
/// `stable`, even with a zero band.
pub(crate) fn direction(delta: f64, dead_band: f64) -> TrendDirection {
    if delta > dead_band {
        TrendDirection::Improving
    } else if delta < -dead_band {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Runs of consecutive missing days within the window. Each run longer than
/// the grace period is one outage; every day past the grace adds a full day
/// of outage minutes.
fn outages(
    present: &BTreeMap<NaiveDate, &TrustSnapshot>,
    start: NaiveDate,
    as_of: NaiveDate,
    grace_days: u32,
) -> (i32, i64) {
    let grace = i64::from(grace_days);
    let mut count = 0i32;
    let mut minutes = 0i64;
    let mut run = 0i64;

    let mut close_run = |run: &mut i64| {
        if *run > grace {
            count += 1;
            minutes += (*run - grace) * MINUTES_PER_DAY;
        }
        *run = 0;
    };

    let mut day = start;
    while day <= as_of {
        if present.contains_key(&day) {
            close_run(&mut run);
        } else {
            run += 1;
        }
        day += Duration::days(1);
    }
    close_run(&mut run);
    (count, minutes)
}

/// Compute the trend of `engine` over `window` ending at `as_of` (inclusive).
///
/// Snapshots for other engines or outside the window are ignored; a repeated
/// date keeps the last snapshot given for it. With no snapshots in the window
/// the trend is neutral: zero deltas, `stable`, no projection.
#[must_use]
pub fn calculate_trust_trends(
    engine: &str,
    window: TrustWindow,
    as_of: NaiveDate,
    snapshots: &[TrustSnapshot],
    policy: &TrendPolicy,
) -> TrustTrend {
    let start = as_of - Duration::days(window.days() - 1);
    let in_window: BTreeMap<NaiveDate, &TrustSnapshot> = snapshots
        .iter()
        .filter(|s| s.engine == engine && s.snapshot_date >= start && s.snapshot_date <= as_of)
        .map(|s| (s.snapshot_date, s))
        .collect();

    let (Some(first), Some(last)) = (in_window.values().next(), in_window.values().next_back())
    else {
        tracing::warn!(engine, window = %window, %as_of, "no trust snapshots in window");
        return TrustTrend {
            engine: engine.to_string(),
            window,
            as_of,
            authority_delta: 0.0,
            direction: TrendDirection::Stable,
            reliability_delta: 0.0,
            volatility: 0.0,
            outage_count: 0,
            outage_minutes: 0,
            current_authority: 0.0,
            projected_authority: None,
        };
    };

    let authority: Vec<f64> = in_window.values().map(|s| s.authority_weight).collect();
    let authority_delta = round6(last.authority_weight - first.authority_weight);
    let reliability_delta = round6(last.reliability_score - first.reliability_score);
    let volatility = round6(std_dev(&authority).unwrap_or(0.0));
    let (outage_count, outage_minutes) =
        outages(&in_window, start, as_of, policy.outage_grace_days);

    #[allow(clippy::cast_precision_loss)]
    let points: Vec<(f64, f64)> = in_window
        .iter()
        .map(|(date, s)| ((*date - start).num_days() as f64, s.authority_weight))
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let horizon = (as_of - start).num_days() as f64 + f64::from(policy.projection_days);
    let projected_authority = linear_fit(&points)
        .map(|(slope, intercept)| round6((intercept + slope * horizon).clamp(0.0, 1.0)));

    TrustTrend {
        engine: engine.to_string(),
        window,
        as_of,
        authority_delta,
        direction: direction(authority_delta, policy.dead_band),
        reliability_delta,
        volatility,
        outage_count,
        outage_minutes,
        current_authority: round6(last.authority_weight),
        projected_authority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn snap(engine: &str, day: u32, authority: f64) -> TrustSnapshot {
        TrustSnapshot {
            engine: engine.to_string(),
            snapshot_date: date(day),
            reliability_score: authority,
            citation_completeness: 0.5,
            freshness_index: 0.5,
            authority_weight: authority,
            query_volume: 10,
            success_rate: 1.0,
        }
    }

    fn week(values: &[f64]) -> Vec<TrustSnapshot> {
        values
            .iter()
            .zip(1u32..)
            .map(|(v, d)| snap("gpt-4o", d, *v))
            .collect()
    }

    #[test]
    fn constant_authority_is_stable_with_zero_volatility() {
        let snaps = week(&[0.6; 7]);
        let trend = calculate_trust_trends(
            "gpt-4o",
            TrustWindow::Week,
            date(7),
            &snaps,
            &TrendPolicy::default(),
        );
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.volatility.abs() < f64::EPSILON);
        assert!(trend.authority_delta.abs() < f64::EPSILON);
        assert_eq!(trend.outage_count, 0);
        assert_eq!(trend.projected_authority, Some(0.6));
    }

    #[test]
    fn rising_authority_improves_and_projects_upward() {
        let snaps = week(&[0.40, 0.42, 0.44, 0.46, 0.48, 0.50, 0.52]);
        let trend = calculate_trust_trends(
            "gpt-4o",
            TrustWindow::Week,
            date(7),
            &snaps,
            &TrendPolicy::default(),
        );
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert!((trend.authority_delta - 0.12).abs() < 1e-9);
        assert!((trend.current_authority - 0.52).abs() < 1e-9);
        // slope 0.02/day for 30 more days saturates at 1.0
        assert_eq!(trend.projected_authority, Some(1.0));
    }

    #[test]
    fn constant_authority_is_stable_without_dead_band() {
        let policy = TrendPolicy {
            dead_band: 0.0,
            ..TrendPolicy::default()
        };
        let snaps = week(&[0.6; 7]);
        let trend = calculate_trust_trends("gpt-4o", TrustWindow::Week, date(7), &snaps, &policy);
        assert!(trend.volatility.abs() < f64::EPSILON);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn direction_needs_to_leave_the_band() {
        assert_eq!(direction(0.0, 0.0), TrendDirection::Stable);
        assert_eq!(direction(0.02, 0.02), TrendDirection::Stable);
        assert_eq!(direction(-0.02, 0.02), TrendDirection::Stable);
        assert_eq!(direction(0.021, 0.02), TrendDirection::Improving);
        assert_eq!(direction(-0.001, 0.0), TrendDirection::Declining);
    }

    #[test]
    fn small_moves_stay_inside_dead_band() {
        let snaps = week(&[0.50, 0.51, 0.50, 0.51, 0.50, 0.51, 0.51]);
        let trend = calculate_trust_trends(
            "gpt-4o",
            TrustWindow::Week,
            date(7),
            &snaps,
            &TrendPolicy::default(),
        );
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.volatility > 0.0);
    }

    #[test]
    fn gaps_beyond_grace_count_as_outages() {
        // days 1, 2, 6, 7 present: one 3-day gap, grace 1 => 2 outage days
        let snaps: Vec<_> = [1, 2, 6, 7].iter().map(|d| snap("gpt-4o", *d, 0.5)).collect();
        let trend = calculate_trust_trends(
            "gpt-4o",
            TrustWindow::Week,
            date(7),
            &snaps,
            &TrendPolicy::default(),
        );
        assert_eq!(trend.outage_count, 1);
        assert_eq!(trend.outage_minutes, 2 * 1440);
    }

    #[test]
    fn single_missing_day_is_within_grace() {
        let snaps: Vec<_> = [1, 2, 3, 5, 6, 7]
            .iter()
            .map(|d| snap("gpt-4o", *d, 0.5))
            .collect();
        let trend = calculate_trust_trends(
            "gpt-4o",
            TrustWindow::Week,
            date(7),
            &snaps,
            &TrendPolicy::default(),
        );
        assert_eq!(trend.outage_count, 0);
        assert_eq!(trend.outage_minutes, 0);
    }

    #[test]
    fn no_snapshots_yields_neutral_trend() {
        let trend = calculate_trust_trends(
            "gpt-4o",
            TrustWindow::Month,
            date(7),
            &[snap("claude", 7, 0.9)],
            &TrendPolicy::default(),
        );
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.projected_authority, None);
        assert!(trend.current_authority.abs() < f64::EPSILON);
    }

    #[test]
    fn single_snapshot_has_no_projection() {
        let trend = calculate_trust_trends(
            "gpt-4o",
            TrustWindow::Week,
            date(7),
            &[snap("gpt-4o", 7, 0.7)],
            &TrendPolicy::default(),
        );
        assert_eq!(trend.projected_authority, None);
        assert!(trend.volatility.abs() < f64::EPSILON);
    }

    #[test]
    fn recomputation_is_identical() {
        let snaps = week(&[0.3, 0.5, 0.4, 0.6, 0.2, 0.7, 0.5]);
        let run = || {
            calculate_trust_trends(
                "gpt-4o",
                TrustWindow::Week,
                date(7),
                &snaps,
                &TrendPolicy::default(),
            )
        };
        assert_eq!(run(), run());
    }
}
