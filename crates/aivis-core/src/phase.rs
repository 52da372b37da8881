//! Analysis job phases and answer sentiment.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Phase of an analysis job.
///
/// The happy path is strictly `Pending → Scraping → Thinking → Judging →
/// Complete`. `Failed` is reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Pending,
    Scraping,
    Thinking,
    Judging,
    Complete,
    Failed,
}

impl JobPhase {
    /// The ordered happy path.
    pub const SEQUENCE: [JobPhase; 5] = [
        JobPhase::Pending,
        JobPhase::Scraping,
        JobPhase::Thinking,
        JobPhase::Judging,
        JobPhase::Complete,
    ];

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Complete | JobPhase::Failed)
    }

    /// The phase that follows `self` on the happy path, if any.
    #[must_use]
    pub fn next(self) -> Option<JobPhase> {
        match self {
            JobPhase::Pending => Some(JobPhase::Scraping),
            JobPhase::Scraping => Some(JobPhase::Thinking),
            JobPhase::Thinking => Some(JobPhase::Judging),
            JobPhase::Judging => Some(JobPhase::Complete),
            JobPhase::Complete | JobPhase::Failed => None,
        }
    }

    #[must_use]
    pub fn can_advance_to(self, to: JobPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == JobPhase::Failed || self.next() == Some(to)
    }

    /// Validate a transition, returning the target phase on success.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] when `to` is not the next
    /// happy-path phase or `Failed`, or when `self` is terminal.
    pub fn advance_to(self, to: JobPhase) -> Result<JobPhase, CoreError> {
        if self.can_advance_to(to) {
            Ok(to)
        } else {
            Err(CoreError::InvalidTransition { from: self, to })
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Pending => "pending",
            JobPhase::Scraping => "scraping",
            JobPhase::Thinking => "thinking",
            JobPhase::Judging => "judging",
            JobPhase::Complete => "complete",
            JobPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobPhase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobPhase::Pending),
            "scraping" => Ok(JobPhase::Scraping),
            "thinking" => Ok(JobPhase::Thinking),
            "judging" => Ok(JobPhase::Judging),
            "complete" => Ok(JobPhase::Complete),
            "failed" => Ok(JobPhase::Failed),
            other => Err(CoreError::UnknownValue {
                kind: "job phase",
                value: other.to_string(),
            }),
        }
    }
}

/// Polarity of an answer toward the tracked brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(CoreError::UnknownValue {
                kind: "sentiment",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_advances_one_step_at_a_time() {
        for pair in JobPhase::SEQUENCE.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let err = JobPhase::Pending.advance_to(JobPhase::Thinking).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: JobPhase::Pending,
                to: JobPhase::Thinking
            }
        );
        assert!(!JobPhase::Scraping.can_advance_to(JobPhase::Complete));
    }

    #[test]
    fn going_backwards_is_rejected() {
        assert!(!JobPhase::Judging.can_advance_to(JobPhase::Thinking));
    }

    #[test]
    fn failed_reachable_from_every_non_terminal_phase() {
        for phase in [
            JobPhase::Pending,
            JobPhase::Scraping,
            JobPhase::Thinking,
            JobPhase::Judging,
        ] {
            assert!(phase.can_advance_to(JobPhase::Failed), "{phase} -> failed");
        }
    }

    #[test]
    fn terminal_phases_cannot_advance() {
        assert!(!JobPhase::Complete.can_advance_to(JobPhase::Failed));
        assert!(!JobPhase::Failed.can_advance_to(JobPhase::Pending));
        assert_eq!(JobPhase::Complete.next(), None);
    }

    #[test]
    fn phase_round_trips_through_str() {
        for phase in JobPhase::SEQUENCE {
            assert_eq!(phase.as_str().parse::<JobPhase>().unwrap(), phase);
        }
        assert!("exploded".parse::<JobPhase>().is_err());
    }

    #[test]
    fn sentiment_parses_lowercase_only() {
        assert_eq!("negative".parse::<Sentiment>().unwrap(), Sentiment::Negative);
        assert!("Negative".parse::<Sentiment>().is_err());
    }

    #[test]
    fn phase_serializes_lowercase() {
        let json = serde_json::to_string(&JobPhase::Judging).unwrap();
        assert_eq!(json, "\"judging\"");
    }
}
