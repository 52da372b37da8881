//! Alert evaluation: compare two consecutive score states and decide which
//! alerts fire. Pure; delivery and duplicate suppression belong to the caller.

use std::collections::BTreeMap;

use aivis_core::{AlertKind, NotificationSettings};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Scores observed for one prompt at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreState {
    pub own_score: f64,
    /// Competitor name to visibility score.
    pub competitor_scores: BTreeMap<String, f64>,
}

/// What the notification collaborator needs to render a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertContext {
    pub prompt_id: i64,
    pub prompt_text: String,
    pub brand: String,
    pub model: String,
    pub persona: String,
    /// Job whose result is the `current` state being evaluated.
    pub job_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub context: AlertContext,
    pub previous_score: f64,
    pub current_score: f64,
    pub competitor: Option<String>,
    pub previous_competitor_score: Option<f64>,
    pub current_competitor_score: Option<f64>,
    pub threshold: Option<f64>,
}

impl AlertEvent {
    /// Key identifying one alert raised by one evaluated job. Evaluating the
    /// same job twice yields the same key; a later job crossing the same
    /// threshold with the same scores does not.
    #[must_use]
    pub fn dedupe_key(&self) -> String {
        let raw = format!(
            "{}|{}|{}|{}|{}|{}|{:.2}|{:.2}|{}|{:?}|{:?}",
            self.kind,
            self.context.prompt_id,
            self.context.model,
            self.context.persona,
            self.context.job_id.map_or_else(String::new, |id| id.to_string()),
            self.context.brand,
            self.previous_score,
            self.current_score,
            self.competitor.as_deref().unwrap_or(""),
            self.previous_competitor_score.map(|s| format!("{s:.2}")),
            self.current_competitor_score.map(|s| format!("{s:.2}")),
        );
        format!("{:x}", Sha256::digest(raw.as_bytes()))
    }

    #[must_use]
    pub fn message(&self) -> String {
        let ctx = &self.context;
        match self.kind {
            AlertKind::VisibilityDrop => format!(
                "{} visibility for \"{}\" on {} dropped from {:.1} to {:.1} (threshold {:.1})",
                ctx.brand,
                ctx.prompt_text,
                ctx.model,
                self.previous_score,
                self.current_score,
                self.threshold.unwrap_or_default(),
            ),
            AlertKind::CompetitorOvertake => format!(
                "{} overtook {} for \"{}\" on {}: {:.1} vs {:.1}",
                self.competitor.as_deref().unwrap_or("a competitor"),
                ctx.brand,
                ctx.prompt_text,
                ctx.model,
                self.current_competitor_score.unwrap_or_default(),
                self.current_score,
            ),
        }
    }
}

/// Alerts warranted by the move from `previous` to `current`.
///
/// * Visibility drop fires iff `previous.own ≥ threshold` and
///   `current.own < threshold`.
/// * Competitor overtake fires, per competitor present in both states, iff the
///   competitor was strictly behind before and is strictly ahead now.
///
/// Disabled alert kinds never fire. Overtakes are ordered by competitor name.
#[must_use]
pub fn evaluate_alerts(
    previous: &ScoreState,
    current: &ScoreState,
    settings: &NotificationSettings,
    context: &AlertContext,
) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    let threshold = settings.visibility_drop_threshold;
    if settings.visibility_drop_enabled
        && previous.own_score >= threshold
        && current.own_score < threshold
    {
        events.push(AlertEvent {
            kind: AlertKind::VisibilityDrop,
            context: context.clone(),
            previous_score: previous.own_score,
            current_score: current.own_score,
            competitor: None,
            previous_competitor_score: None,
            current_competitor_score: None,
            threshold: Some(threshold),
        });
    }

    if settings.competitor_overtake_enabled {
        for (name, &current_comp) in &current.competitor_scores {
            let Some(&previous_comp) = previous.competitor_scores.get(name) else {
                continue;
            };
            if previous_comp < previous.own_score && current_comp > current.own_score {
                events.push(AlertEvent {
                    kind: AlertKind::CompetitorOvertake,
                    context: context.clone(),
                    previous_score: previous.own_score,
                    current_score: current.own_score,
                    competitor: Some(name.clone()),
                    previous_competitor_score: Some(previous_comp),
                    current_competitor_score: Some(current_comp),
                    threshold: None,
                });
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AlertContext {
        AlertContext {
            prompt_id: 3,
            prompt_text: "best crm".to_string(),
            brand: "Acme".to_string(),
            model: "gpt-4o".to_string(),
            persona: "default".to_string(),
            job_id: Some(41),
        }
    }

    fn own(score: f64) -> ScoreState {
        ScoreState {
            own_score: score,
            competitor_scores: BTreeMap::new(),
        }
    }

    fn with_comp(own_score: f64, comp: f64) -> ScoreState {
        ScoreState {
            own_score,
            competitor_scores: BTreeMap::from([("Globex".to_string(), comp)]),
        }
    }

    fn settings(threshold: f64) -> NotificationSettings {
        NotificationSettings {
            visibility_drop_threshold: threshold,
            ..NotificationSettings::default()
        }
    }

    #[test]
    fn drop_fires_on_crossing() {
        let events = evaluate_alerts(&own(75.0), &own(65.0), &settings(70.0), &context());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::VisibilityDrop);
        assert_eq!(events[0].threshold, Some(70.0));
    }

    #[test]
    fn drop_does_not_refire_below_threshold() {
        assert!(evaluate_alerts(&own(65.0), &own(60.0), &settings(70.0), &context()).is_empty());
    }

    #[test]
    fn drop_needs_to_cross_threshold() {
        assert!(evaluate_alerts(&own(75.0), &own(65.0), &settings(60.0), &context()).is_empty());
    }

    #[test]
    fn drop_fires_when_starting_exactly_at_threshold() {
        let events = evaluate_alerts(&own(70.0), &own(69.9), &settings(70.0), &context());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn overtake_fires_on_strict_crossing() {
        let events = evaluate_alerts(
            &with_comp(80.0, 70.0),
            &with_comp(60.0, 75.0),
            &settings(0.0),
            &context(),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertKind::CompetitorOvertake);
        assert_eq!(events[0].competitor.as_deref(), Some("Globex"));
        assert!(events[0].message().contains("Globex overtook Acme"));
    }

    #[test]
    fn overtake_requires_competitor_behind_before() {
        let events = evaluate_alerts(
            &with_comp(70.0, 80.0),
            &with_comp(60.0, 75.0),
            &settings(0.0),
            &context(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn overtake_requires_competitor_ahead_now() {
        let tie = evaluate_alerts(
            &with_comp(80.0, 70.0),
            &with_comp(75.0, 75.0),
            &settings(0.0),
            &context(),
        );
        assert!(tie.is_empty());
    }

    #[test]
    fn competitor_missing_from_previous_state_is_ignored() {
        let events =
            evaluate_alerts(&own(80.0), &with_comp(60.0, 75.0), &settings(0.0), &context());
        assert!(events.is_empty());
    }

    #[test]
    fn disabled_kinds_never_fire() {
        let disabled = NotificationSettings {
            visibility_drop_enabled: false,
            competitor_overtake_enabled: false,
            visibility_drop_threshold: 70.0,
            email_enabled: false,
        };
        let events = evaluate_alerts(
            &with_comp(80.0, 70.0),
            &with_comp(60.0, 75.0),
            &disabled,
            &context(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn dedupe_key_is_stable_and_distinguishes_changes() {
        let a = evaluate_alerts(&own(75.0), &own(65.0), &settings(70.0), &context());
        let b = evaluate_alerts(&own(75.0), &own(65.0), &settings(70.0), &context());
        let c = evaluate_alerts(&own(75.0), &own(64.0), &settings(70.0), &context());
        assert_eq!(a[0].dedupe_key(), b[0].dedupe_key());
        assert_ne!(a[0].dedupe_key(), c[0].dedupe_key());
        assert_eq!(a[0].dedupe_key().len(), 64);
    }

    #[test]
    fn separate_crossings_with_equal_scores_get_distinct_keys() {
        let first = evaluate_alerts(&own(74.0), &own(40.0), &settings(50.0), &context());
        let later = AlertContext {
            job_id: Some(57),
            ..context()
        };
        let second = evaluate_alerts(&own(74.0), &own(40.0), &settings(50.0), &later);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].dedupe_key(), second[0].dedupe_key());
    }

    #[test]
    fn personas_get_distinct_keys() {
        let skeptic = AlertContext {
            persona: "skeptical-buyer".to_string(),
            ..context()
        };
        let a = evaluate_alerts(&own(74.0), &own(40.0), &settings(50.0), &context());
        let b = evaluate_alerts(&own(74.0), &own(40.0), &settings(50.0), &skeptic);
        assert_ne!(a[0].dedupe_key(), b[0].dedupe_key());
    }
}
