//! In-process change feed.
//!
//! Writers publish a [`ChangeEvent`] after a row is persisted; subscribers
//! receive the events for one owner and fold them into a [`LocalView`].
//! Events carry a feed-wide sequence number so a view can ignore stale or
//! repeated deliveries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Prompt,
    AnalysisJob,
    PromptResult,
    UrlCitation,
    AlertEvent,
    TrustTrend,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Prompt => "prompt",
            EntityKind::AnalysisJob => "analysis_job",
            EntityKind::PromptResult => "prompt_result",
            EntityKind::UrlCitation => "url_citation",
            EntityKind::AlertEvent => "alert_event",
            EntityKind::TrustTrend => "trust_trend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Upsert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub sequence: u64,
    /// `None` for rows visible to every owner, such as trust trends.
    pub owner_id: Option<Uuid>,
    pub kind: EntityKind,
    /// Natural key of the row within its kind.
    pub key: String,
    pub op: ChangeOp,
    pub payload: Value,
}

/// Broadcast hub for [`ChangeEvent`]s. Cheap to share behind an `Arc`.
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    sequence: AtomicU64,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish a change and return the event as sent. Having no subscribers
    /// is not an error.
    pub fn publish(
        &self,
        owner_id: Option<Uuid>,
        kind: EntityKind,
        key: impl Into<String>,
        op: ChangeOp,
        payload: Value,
    ) -> ChangeEvent {
        let event = ChangeEvent {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            owner_id,
            kind,
            key: key.into(),
            op,
            payload,
        };
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        tracing::trace!(
            kind = event.kind.as_str(),
            key = %event.key,
            sequence = event.sequence,
            receivers,
            "change published"
        );
        event
    }

    /// Subscribe to changes for `owner_id` plus ownerless changes. `None`
    /// subscribes to everything.
    #[must_use]
    pub fn subscribe(&self, owner_id: Option<Uuid>) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            owner_id,
        }
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    owner_id: Option<Uuid>,
}

impl Subscription {
    fn wants(&self, event: &ChangeEvent) -> bool {
        match (self.owner_id, event.owner_id) {
            (None, _) | (_, None) => true,
            (Some(mine), Some(theirs)) => mine == theirs,
        }
    }

    /// Next event for this subscriber, or `None` once the feed is dropped.
    ///
    /// A subscriber that falls behind skips the events it missed and logs
    /// how many; its view should be reloaded from the database.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "change feed subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Client-side replica built from change events.
///
/// Applying the same event twice, or an event older than the one already
/// applied for its key, leaves the view unchanged. Deleted keys keep their
/// sequence so a late upsert cannot resurrect them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LocalView {
    rows: BTreeMap<(EntityKind, String), (u64, Option<Value>)>,
    last_sequence: u64,
}

impl LocalView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the event changed the view.
    pub fn apply(&mut self, event: &ChangeEvent) -> bool {
        let slot = (event.kind, event.key.clone());
        let previous = match self.rows.get(&slot) {
            Some((seen, _)) if *seen >= event.sequence => return false,
            Some((_, row)) => row.is_some(),
            None => false,
        };
        self.last_sequence = self.last_sequence.max(event.sequence);
        let row = match event.op {
            ChangeOp::Upsert => Some(event.payload.clone()),
            ChangeOp::Delete => None,
        };
        let changed = row.is_some() || previous;
        self.rows.insert(slot, (event.sequence, row));
        changed
    }

    #[must_use]
    pub fn get(&self, kind: EntityKind, key: &str) -> Option<&Value> {
        self.rows
            .get(&(kind, key.to_string()))
            .and_then(|(_, row)| row.as_ref())
    }

    /// Live rows of one kind in key order.
    pub fn rows_of(&self, kind: EntityKind) -> impl Iterator<Item = (&str, &Value)> {
        self.rows
            .iter()
            .filter(move |((k, _), _)| *k == kind)
            .filter_map(|((_, key), (_, row))| row.as_ref().map(|payload| (key.as_str(), payload)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.values().filter(|(_, row)| row.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscriber_sees_only_its_owner_and_shared_rows() {
        let feed = ChangeFeed::new(16);
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut sub = feed.subscribe(Some(me));

        feed.publish(Some(other), EntityKind::Prompt, "1", ChangeOp::Upsert, json!({}));
        feed.publish(Some(me), EntityKind::Prompt, "2", ChangeOp::Upsert, json!({"s": 1}));
        feed.publish(None, EntityKind::TrustTrend, "gpt-4o/7d", ChangeOp::Upsert, json!({}));

        let first = sub.recv().await.unwrap();
        assert_eq!(first.key, "2");
        let second = sub.recv().await.unwrap();
        assert_eq!(second.kind, EntityKind::TrustTrend);
    }

    #[tokio::test]
    async fn closed_feed_ends_subscription() {
        let feed = ChangeFeed::new(4);
        let mut sub = feed.subscribe(None);
        drop(feed);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let feed = ChangeFeed::default();
        let event = feed.publish(None, EntityKind::Prompt, "1", ChangeOp::Upsert, json!(null));
        assert_eq!(event.sequence, 1);
    }

    #[test]
    fn view_applies_upserts_idempotently() {
        let feed = ChangeFeed::default();
        let mut view = LocalView::new();
        let event = feed.publish(
            None,
            EntityKind::AnalysisJob,
            "7",
            ChangeOp::Upsert,
            json!({"phase": "thinking"}),
        );

        assert!(view.apply(&event));
        assert!(!view.apply(&event));
        assert_eq!(view.len(), 1);
        assert_eq!(
            view.get(EntityKind::AnalysisJob, "7"),
            Some(&json!({"phase": "thinking"}))
        );
    }

    #[test]
    fn view_ignores_stale_events() {
        let feed = ChangeFeed::default();
        let mut view = LocalView::new();
        let older = feed.publish(
            None,
            EntityKind::AnalysisJob,
            "7",
            ChangeOp::Upsert,
            json!({"phase": "thinking"}),
        );
        let newer = feed.publish(
            None,
            EntityKind::AnalysisJob,
            "7",
            ChangeOp::Upsert,
            json!({"phase": "complete"}),
        );

        view.apply(&newer);
        assert!(!view.apply(&older));
        assert_eq!(
            view.get(EntityKind::AnalysisJob, "7"),
            Some(&json!({"phase": "complete"}))
        );
        assert_eq!(view.last_sequence(), 2);
    }

    #[test]
    fn delete_removes_row() {
        let feed = ChangeFeed::default();
        let mut view = LocalView::new();
        view.apply(&feed.publish(None, EntityKind::Prompt, "3", ChangeOp::Upsert, json!({})));
        let stale = ChangeEvent {
            sequence: 1,
            owner_id: None,
            kind: EntityKind::Prompt,
            key: "3".to_string(),
            op: ChangeOp::Upsert,
            payload: json!({}),
        };
        view.apply(&feed.publish(None, EntityKind::Prompt, "3", ChangeOp::Delete, json!(null)));
        assert!(view.is_empty());
        assert!(!view.apply(&stale));
        assert_eq!(view.rows_of(EntityKind::Prompt).count(), 0);
    }
}
