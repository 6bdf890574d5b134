//! Maps the backend's heterogeneous record shapes onto the canonical model.
//!
//! Nothing here fails on a single bad field: missing or mistyped values fall
//! back to defaults. Only a payload with no recognizable record container is
//! reported as [`NormalizeError::Malformed`].

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use engine_logging::{engine_debug, engine_warn};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{
    Achievement, Author, DiscussionNode, Notification, NotificationKind, RewardEvent, UNKNOWN_AUTHOR,
};

const ID_KEYS: &[&str] = &["id", "review_id"];
const TEXT_KEYS: &[&str] = &["review_text", "text", "content"];
const AUTHOR_ID_KEYS: &[&str] = &["user_id", "author_id"];
const AUTHOR_NAME_KEYS: &[&str] = &["username", "author_name"];
const CREATED_KEYS: &[&str] = &["created_at", "date_created", "added_date", "date"];
const UPDATED_KEYS: &[&str] = &["updated_at", "date_updated", "date"];
const REPLIES_KEY: &str = "replies";
const ECHO_WRAPPERS: &[&str] = &["review", "reply"];
const LISTING_WRAPPERS: &[&str] = &["results", "books", "items"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Normalize one raw review or reply, recursing into `replies`.
pub fn normalize_record(raw: &Value, now: DateTime<Utc>) -> DiscussionNode {
    Walk::new(now).node(raw, "0")
}

/// Normalize a discussion fetch: a bare array of records or `{results: [...]}`.
pub fn normalize_discussion(
    body: &Value,
    now: DateTime<Utc>,
) -> Result<Vec<DiscussionNode>, NormalizeError> {
    let records = match body {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("results") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(NormalizeError::Malformed(
                    "discussion payload has no record array".into(),
                ))
            }
        },
        other => {
            return Err(NormalizeError::Malformed(format!(
                "discussion payload is a {}",
                json_kind(other)
            )))
        }
    };
    Ok(Walk::new(now).forest(records, None))
}

/// What a create/edit/reply endpoint sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEcho {
    pub node: Option<DiscussionNode>,
    pub reward: Option<RewardPayload>,
}

/// Split a mutation response into the echoed record and any reward riding along.
///
/// The record may be the body itself or wrapped under `review`/`reply`.
pub fn normalize_mutation_echo(body: &Value, now: DateTime<Utc>) -> MutationEcho {
    let record = ECHO_WRAPPERS
        .iter()
        .find_map(|key| body.get(*key).filter(|value| value.is_object()))
        .or_else(|| {
            body.as_object()
                .filter(|obj| ID_KEYS.iter().any(|key| obj.contains_key(*key)))
                .map(|_| body)
        });
    MutationEcho {
        node: record.map(|record| normalize_record(record, now)),
        reward: RewardPayload::from_value(body),
    }
}

struct Walk {
    now: DateTime<Utc>,
    seen: HashSet<String>,
}

impl Walk {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            seen: HashSet::new(),
        }
    }

    fn forest(&mut self, records: &[Value], parent_path: Option<&str>) -> Vec<DiscussionNode> {
        let mut nodes = Vec::with_capacity(records.len());
        for (index, raw) in records.iter().enumerate() {
            let path = match parent_path {
                Some(parent) => format!("{parent}.{index}"),
                None => index.to_string(),
            };
            if !raw.is_object() {
                engine_debug!("Skipping non-object discussion entry at {}", path);
                continue;
            }
            let id = record_id(raw, &path);
            if self.seen.contains(&id) {
                engine_warn!("Dropping duplicate discussion record id={}", id);
                continue;
            }
            nodes.push(self.node(raw, &path));
        }
        nodes
    }

    fn node(&mut self, raw: &Value, path: &str) -> DiscussionNode {
        let empty = Map::new();
        let obj = raw.as_object().unwrap_or(&empty);

        let id = record_id(raw, path);
        self.seen.insert(id.clone());

        let text = first_text(obj, TEXT_KEYS).unwrap_or_default();
        let created_at = first_timestamp(obj, CREATED_KEYS).unwrap_or(self.now);
        let updated_at = first_timestamp(obj, UPDATED_KEYS)
            .unwrap_or(created_at)
            .max(created_at);

        let children = match obj.get(REPLIES_KEY) {
            Some(Value::Array(items)) => self.forest(items, Some(path)),
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                engine_debug!(
                    "Ignoring replies of type {} on record {}",
                    json_kind(other),
                    id
                );
                Vec::new()
            }
        };

        DiscussionNode {
            id,
            text,
            author: author(obj),
            created_at,
            updated_at,
            children,
        }
    }
}

fn record_id(raw: &Value, path: &str) -> String {
    raw.as_object()
        .and_then(|obj| first_scalar(obj, ID_KEYS))
        .unwrap_or_else(|| format!("anon-{path}"))
}

fn author(obj: &Map<String, Value>) -> Author {
    let user = obj.get("user");
    let nested = user.and_then(Value::as_object);

    let id = nested
        .and_then(|u| u.get("id"))
        .and_then(scalar_string)
        .or_else(|| user.and_then(scalar_string))
        .or_else(|| first_scalar(obj, AUTHOR_ID_KEYS));
    let display_name = nested
        .and_then(|u| u.get("username"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| first_text(obj, AUTHOR_NAME_KEYS))
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    Author { id, display_name }
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
}

fn first_scalar(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key).and_then(scalar_string))
}

fn first_timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|key| obj.get(*key).and_then(parse_timestamp))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts RFC3339, naive ISO date-times (taken as UTC), plain dates and epoch seconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The two generations of reward payload, resolved once at the edge.
///
/// The generation is picked by which key is present. Fields inside are read
/// one at a time, so a mistyped value costs that value and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewardPayload {
    /// `{notification: {...}, achievements: [...]}`
    Structured(StructuredReward),
    /// `{points_earned: n, achievement: {...}}`
    Legacy(LegacyReward),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredReward {
    pub notification: RawNotification,
    pub achievements: Vec<RawAchievement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawNotification {
    pub show: Option<bool>,
    pub message: Option<String>,
    pub kind: Option<String>,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyReward {
    pub points_earned: i64,
    pub achievement: Option<RawAchievement>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawAchievement {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub points: i64,
}

impl RewardPayload {
    /// Classify a body; `None` when it carries neither reward shape.
    pub fn from_value(body: &Value) -> Option<Self> {
        let obj = body.as_object()?;
        if let Some(raw) = obj.get("notification").and_then(Value::as_object) {
            return Some(RewardPayload::Structured(StructuredReward {
                notification: RawNotification::from_map(raw),
                achievements: raw_achievements(obj.get("achievements")),
            }));
        }
        let points_earned = obj.get("points_earned").filter(|v| !v.is_null())?;
        Some(RewardPayload::Legacy(LegacyReward {
            points_earned: lenient_int(points_earned).unwrap_or(0),
            achievement: obj
                .get("achievement")
                .and_then(Value::as_object)
                .map(RawAchievement::from_map),
            message: first_text(obj, &["message"]),
        }))
    }

    pub fn into_event(self) -> RewardEvent {
        match self {
            RewardPayload::Structured(reward) => {
                let raw = reward.notification;
                let points = clamp_points(raw.points);
                RewardEvent {
                    notification: Notification {
                        show: raw.show.unwrap_or(true),
                        message: raw.message.unwrap_or_default(),
                        kind: resolve_kind(raw.kind.as_deref(), points),
                        points,
                    },
                    achievements: reward
                        .achievements
                        .into_iter()
                        .enumerate()
                        .map(|(index, a)| a.into_achievement(index))
                        .collect(),
                }
            }
            RewardPayload::Legacy(reward) => {
                let points = clamp_points(reward.points_earned);
                let achievements: Vec<Achievement> = reward
                    .achievement
                    .into_iter()
                    .map(|a| a.into_achievement(0))
                    .collect();
                let message = reward
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| legacy_message(points, achievements.first()));
                RewardEvent {
                    notification: Notification {
                        show: points > 0 || !achievements.is_empty(),
                        message,
                        kind: resolve_kind(None, points),
                        points,
                    },
                    achievements,
                }
            }
        }
    }
}

impl RawNotification {
    fn from_map(obj: &Map<String, Value>) -> Self {
        Self {
            show: obj.get("show").and_then(lenient_bool),
            message: first_text(obj, &["message"]),
            kind: first_text(obj, &["type", "kind"]),
            points: obj.get("points").and_then(lenient_int).unwrap_or(0),
        }
    }
}

impl RawAchievement {
    fn from_map(obj: &Map<String, Value>) -> Self {
        Self {
            id: obj.get("id").and_then(scalar_string),
            name: first_text(obj, &["name"]),
            description: first_text(obj, &["description"]),
            points: obj.get("points").and_then(lenient_int).unwrap_or(0),
        }
    }

    fn into_achievement(self, index: usize) -> Achievement {
        let name = self.name.unwrap_or_default();
        let id = self
            .id
            .or_else(|| (!name.is_empty()).then(|| name.clone()))
            .unwrap_or_else(|| format!("achievement-{index}"));
        Achievement {
            id,
            name,
            description: self.description.unwrap_or_default(),
            points: clamp_points(self.points),
        }
    }
}

fn raw_achievements(value: Option<&Value>) -> Vec<RawAchievement> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match item.as_object() {
                Some(obj) => Some(RawAchievement::from_map(obj)),
                None => {
                    engine_debug!(
                        "Skipping achievement {} of type {}",
                        index,
                        json_kind(item)
                    );
                    None
                }
            })
            .collect(),
        Some(Value::Object(obj)) => vec![RawAchievement::from_map(obj)],
        _ => Vec::new(),
    }
}

/// Integers, floats (truncated) and numeric strings.
fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim() {
            t if t.eq_ignore_ascii_case("true") => Some(true),
            t if t.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize any reward-bearing body into the canonical event.
pub fn normalize_reward(body: &Value) -> Option<RewardEvent> {
    RewardPayload::from_value(body).map(RewardPayload::into_event)
}

fn clamp_points(raw: i64) -> u32 {
    u32::try_from(raw.max(0)).unwrap_or(u32::MAX)
}

fn resolve_kind(raw: Option<&str>, points: u32) -> NotificationKind {
    match raw.map(str::trim) {
        Some(kind) if kind.eq_ignore_ascii_case("success") => NotificationKind::Success,
        Some(kind) if kind.eq_ignore_ascii_case("info") => NotificationKind::Info,
        Some(kind) => {
            engine_debug!("Unknown notification kind {:?}, showing as info", kind);
            NotificationKind::Info
        }
        None if points > 0 => NotificationKind::Success,
        None => NotificationKind::Info,
    }
}

fn legacy_message(points: u32, achievement: Option<&Achievement>) -> String {
    match (points, achievement) {
        (0, Some(a)) => format!("Achievement unlocked: {}", a.name),
        (0, None) => String::new(),
        (points, _) => format!("You earned {points} points!"),
    }
}

/// One page of a paginated listing, plus whatever totals the backend reported.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingPage {
    pub items: Vec<Value>,
    pub page: Option<u32>,
    pub total_results: Option<u64>,
    pub total_pages: Option<u32>,
}

pub fn normalize_listing(body: &Value) -> Result<ListingPage, NormalizeError> {
    match body {
        Value::Array(items) => Ok(ListingPage {
            items: items.clone(),
            ..ListingPage::default()
        }),
        Value::Object(obj) => {
            let items = LISTING_WRAPPERS
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_array))
                .ok_or_else(|| NormalizeError::Malformed("listing has no item array".into()))?;
            Ok(ListingPage {
                items: items.clone(),
                page: first_u64(obj, &["page"]).and_then(|p| u32::try_from(p).ok()),
                total_results: first_u64(obj, &["totalResults", "total_results", "count"]),
                total_pages: first_u64(obj, &["totalPages", "total_pages"])
                    .and_then(|p| u32::try_from(p).ok()),
            })
        }
        other => Err(NormalizeError::Malformed(format!(
            "listing payload is a {}",
            json_kind(other)
        ))),
    }
}

fn first_u64(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_u64))
}
