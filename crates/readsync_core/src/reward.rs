//! Reward de-duplication and notification sequencing.

use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use engine_logging::engine_debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Achievement, NotificationKind, RewardEvent};
use crate::normalize::RewardPayload;

/// How long a banner stays up unless dismissed.
pub const BANNER_INTERVAL: Duration = Duration::from_secs(3);

/// One rewarded fact, e.g. `("book-42", "finished")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AwardKey {
    pub subject_id: String,
    pub fact_kind: String,
}

impl AwardKey {
    pub fn new(subject_id: impl Into<String>, fact_kind: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            fact_kind: fact_kind.into(),
        }
    }
}

/// Facts that have already been rewarded for the signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AwardLedger {
    awarded: BTreeSet<AwardKey>,
}

impl AwardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &AwardKey) -> bool {
        self.awarded.contains(key)
    }

    /// Returns `false` when the key was already present.
    pub fn record(&mut self, key: AwardKey) -> bool {
        self.awarded.insert(key)
    }

    pub fn merge(&mut self, other: AwardLedger) {
        self.awarded.extend(other.awarded);
    }

    pub fn len(&self) -> usize {
        self.awarded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.awarded.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AwardKey> {
        self.awarded.iter()
    }
}

impl FromIterator<AwardKey> for AwardLedger {
    fn from_iter<I: IntoIterator<Item = AwardKey>>(iter: I) -> Self {
        Self {
            awarded: iter.into_iter().collect(),
        }
    }
}

/// Award `payload` for `key` unless the ledger already holds it.
///
/// The ledger goes in and comes back out; callers persist it when an event is returned.
pub fn apply_reward(
    mut ledger: AwardLedger,
    payload: RewardPayload,
    key: AwardKey,
) -> (AwardLedger, Option<RewardEvent>) {
    if ledger.contains(&key) {
        return apply_reward_duplicate(ledger, &key);
    }
    let event = payload.into_event();
    ledger.record(key);
    (ledger, Some(event))
}

fn apply_reward_duplicate(
    ledger: AwardLedger,
    key: &AwardKey,
) -> (AwardLedger, Option<RewardEvent>) {
    engine_debug!(
        "Reward for {}/{} already granted; skipping",
        key.subject_id,
        key.fact_kind
    );
    (ledger, None)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Points {
        message: String,
        kind: NotificationKind,
        points: u32,
    },
    Achievement(Achievement),
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Visible {
    banner: Banner,
    shown_at: Instant,
}

/// One banner at a time. Achievements jump ahead of queued plain banners but
/// never replace the one on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationQueue {
    interval: Duration,
    visible: Option<Visible>,
    achievements: VecDeque<Achievement>,
    plain: VecDeque<Banner>,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(BANNER_INTERVAL)
    }
}

impl NotificationQueue {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            visible: None,
            achievements: VecDeque::new(),
            plain: VecDeque::new(),
        }
    }

    pub fn enqueue_event(&mut self, event: &RewardEvent) {
        let note = &event.notification;
        if note.show {
            self.plain.push_back(Banner::Points {
                message: note.message.clone(),
                kind: note.kind,
                points: note.points,
            });
        }
        self.achievements
            .extend(event.achievements.iter().cloned());
    }

    pub fn enqueue_error(&mut self, message: impl Into<String>) {
        self.plain.push_back(Banner::Error {
            message: message.into(),
        });
    }

    pub fn visible(&self) -> Option<&Banner> {
        self.visible.as_ref().map(|v| &v.banner)
    }

    pub fn pending(&self) -> usize {
        self.achievements.len() + self.plain.len()
    }

    /// Expire the current banner and promote the next one. Returns whether anything changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        let expired = self
            .visible
            .as_ref()
            .is_some_and(|current| now.saturating_duration_since(current.shown_at) >= self.interval);
        if expired {
            self.visible = None;
            changed = true;
        }
        if self.visible.is_none() {
            changed |= self.promote(now);
        }
        changed
    }

    /// Viewer closed the current banner early.
    pub fn dismiss(&mut self, now: Instant) -> bool {
        let had_visible = self.visible.take().is_some();
        let promoted = self.promote(now);
        had_visible || promoted
    }

    pub fn clear(&mut self) {
        self.visible = None;
        self.achievements.clear();
        self.plain.clear();
    }

    fn promote(&mut self, now: Instant) -> bool {
        let next = self
            .achievements
            .pop_front()
            .map(Banner::Achievement)
            .or_else(|| self.plain.pop_front());
        match next {
            Some(banner) => {
                self.visible = Some(Visible {
                    banner,
                    shown_at: now,
                });
                true
            }
            None => false,
        }
    }
}

/// Ledger gate plus presentation queue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewardPipeline {
    queue: NotificationQueue,
}

impl RewardPipeline {
    pub fn new(interval: Duration) -> Self {
        Self {
            queue: NotificationQueue::new(interval),
        }
    }

    /// Gate `payload` through the ledger and queue whatever was granted.
    pub fn apply(
        &mut self,
        ledger: AwardLedger,
        payload: RewardPayload,
        key: AwardKey,
    ) -> (AwardLedger, Option<RewardEvent>) {
        let (ledger, event) = apply_reward(ledger, payload, key);
        if let Some(event) = &event {
            self.queue.enqueue_event(event);
        }
        (ledger, event)
    }

    /// Same as [`apply`](Self::apply) for an unclassified body. A body with no
    /// reward shape grants nothing and leaves the ledger untouched.
    pub fn apply_raw(
        &mut self,
        ledger: AwardLedger,
        body: &Value,
        key: AwardKey,
    ) -> (AwardLedger, Option<RewardEvent>) {
        if ledger.contains(&key) {
            return apply_reward_duplicate(ledger, &key);
        }
        match RewardPayload::from_value(body) {
            Some(payload) => self.apply(ledger, payload, key),
            None => {
                engine_debug!(
                    "No reward shape in response for {}/{}",
                    key.subject_id,
                    key.fact_kind
                );
                (ledger, None)
            }
        }
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut NotificationQueue {
        &mut self.queue
    }
}
