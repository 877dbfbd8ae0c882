use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of items a weekly plan may carry.
pub const MAX_PLAN_ITEMS: usize = 15;
/// Lower bound (inclusive) on a plan item's duration.
pub const MIN_CHUNK_MINUTES: u32 = 10;
/// Upper bound (inclusive) on a plan item's duration.
pub const MAX_CHUNK_MINUTES: u32 = 20;
/// Target chunk size when splitting assignments, and the default duration.
pub const DEFAULT_CHUNK_MINUTES: u32 = 15;

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// An academic task fetched from a coursework source, a fixture, or the stub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    /// ISO-8601 date or datetime. Kept as received; parsed only for sorting.
    #[serde(default)]
    pub due_date: Option<String>,
    pub course_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Total effort in minutes, not a chunk size.
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
}

impl Assignment {
    /// Create an assignment with the required fields; optional fields are unset.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        course_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            due_date: None,
            course_name: course_name.into(),
            description: None,
            url: None,
            estimated_minutes: None,
        }
    }

    /// Set the due date.
    pub fn due_date(mut self, due: impl Into<String>) -> Self {
        self.due_date = Some(due.into());
        self
    }

    /// Set the total estimated effort.
    pub fn estimated_minutes(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    /// Set the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the link back to the source system.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// An assignment is usable when both its id and title are non-blank.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.title.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// PlanStatus
// ---------------------------------------------------------------------------

/// Progress state of a plan item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Done => "done",
        };
        f.pad(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "doing" => Ok(Self::Doing),
            "done" => Ok(Self::Done),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid plan status: {0:?}")]
pub struct PlanStatusParseError(pub String);

// ---------------------------------------------------------------------------
// PlanItem / WeeklyPlan
// ---------------------------------------------------------------------------

/// One actionable unit of work inside a weekly plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub due_date: Option<String>,
    pub estimated_minutes: u32,
    #[serde(default)]
    pub status: PlanStatus,
    /// Back-reference to the originating [`Assignment::id`]. Informational only.
    #[serde(default)]
    pub source_assignment_id: Option<String>,
}

/// A week's worth of plan items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    pub week_start: NaiveDate,
    pub items: Vec<PlanItem>,
}

impl WeeklyPlan {
    /// An empty plan for the week containing `today`.
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            week_start: week_start(today),
            items: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message in a coaching conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

impl ChatMessage {
    /// An assistant message stamped with the current time.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: ChatRole::Assistant,
            text: text.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monday of the ISO week containing `today`.
pub fn week_start(today: NaiveDate) -> NaiveDate {
    let offset = u64::from(today.weekday().num_days_from_monday());
    today.checked_sub_days(Days::new(offset)).unwrap_or(today)
}

/// Fresh random identifier for plan items and messages.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Claim `candidate` as an item id unless it is missing, blank, or already in
/// `used`; in those cases claim a fresh one.
pub fn unique_id(used: &mut HashSet<String>, candidate: Option<&str>) -> String {
    let id = match candidate.map(str::trim) {
        Some(c) if !c.is_empty() && !used.contains(c) => c.to_owned(),
        _ => new_id(),
    };
    used.insert(id.clone());
    id
}

/// Clamp a duration into the allowed chunk range.
pub fn clamp_minutes(minutes: u32) -> u32 {
    minutes.clamp(MIN_CHUNK_MINUTES, MAX_CHUNK_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_start_is_monday() {
        // 2026-01-14 is a Wednesday.
        assert_eq!(week_start(date(2026, 1, 14)), date(2026, 1, 12));
        assert_eq!(week_start(date(2026, 1, 12)), date(2026, 1, 12));
        // Sunday belongs to the week that started six days earlier.
        assert_eq!(week_start(date(2026, 1, 18)), date(2026, 1, 12));
    }

    #[test]
    fn week_start_crosses_month_boundary() {
        // 2026-10-01 is a Thursday.
        assert_eq!(week_start(date(2026, 10, 1)), date(2026, 9, 28));
    }

    #[test]
    fn plan_status_display_roundtrip() {
        for status in [PlanStatus::Todo, PlanStatus::Doing, PlanStatus::Done] {
            let parsed: PlanStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn plan_status_rejects_unknown() {
        let err = "blocked".parse::<PlanStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid plan status: \"blocked\"");
    }

    #[test]
    fn assignment_deserializes_camel_case() {
        let json = r#"{
            "id": "a1",
            "title": "Essay",
            "dueDate": "2026-01-20",
            "courseName": "English",
            "estimatedMinutes": 45
        }"#;
        let a: Assignment = serde_json::from_str(json).unwrap();
        assert_eq!(a.due_date.as_deref(), Some("2026-01-20"));
        assert_eq!(a.course_name, "English");
        assert_eq!(a.estimated_minutes, Some(45));
        assert!(a.description.is_none());
        assert!(a.is_valid());
    }

    #[test]
    fn assignment_rejects_negative_minutes() {
        let json = r#"{"id":"a1","title":"T","courseName":"C","estimatedMinutes":-5}"#;
        assert!(serde_json::from_str::<Assignment>(json).is_err());
    }

    #[test]
    fn blank_title_is_invalid() {
        assert!(!Assignment::new("a1", "   ", "C").is_valid());
        assert!(!Assignment::new("", "Title", "C").is_valid());
    }

    #[test]
    fn weekly_plan_serializes_week_start_as_date() {
        let plan = WeeklyPlan::empty(date(2026, 1, 14));
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["weekStart"], "2026-01-12");
        assert_eq!(json["items"], serde_json::json!([]));
    }

    #[test]
    fn plan_item_status_defaults_to_todo() {
        let json = r#"{"id":"p1","title":"Start x","estimatedMinutes":15}"#;
        let item: PlanItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.status, PlanStatus::Todo);
        assert!(item.source_assignment_id.is_none());
    }

    #[test]
    fn assistant_message_is_stamped_utc() {
        let msg = ChatMessage::assistant("hi");
        assert_eq!(msg.role, ChatRole::Assistant);
        assert!(msg.timestamp.ends_with('Z'), "got {}", msg.timestamp);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn unique_id_replaces_taken_and_blank_candidates() {
        let mut used = HashSet::new();
        assert_eq!(unique_id(&mut used, Some("p1")), "p1");

        let repeat = unique_id(&mut used, Some("p1"));
        assert_ne!(repeat, "p1");
        let blank = unique_id(&mut used, Some("   "));
        assert!(!blank.trim().is_empty());
        let missing = unique_id(&mut used, None);
        assert_ne!(missing, repeat);
        assert_eq!(used.len(), 4);
    }

    #[test]
    fn clamp_minutes_bounds() {
        assert_eq!(clamp_minutes(0), 10);
        assert_eq!(clamp_minutes(15), 15);
        assert_eq!(clamp_minutes(60), 20);
    }
}
