//! Google Classroom coursework client.
//!
//! Lists the user's active courses, then each course's coursework, and
//! normalizes the results into [`Assignment`]s. Classroom has no effort
//! estimate, so `estimated_minutes` is always unset.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, SecondsFormat};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::trait_def::{AccessTokens, CourseworkError, CourseworkSource};
use crate::model::Assignment;

/// Production API root.
pub const CLASSROOM_API_BASE: &str = "https://classroom.googleapis.com/v1";

/// [`CourseworkSource`] backed by the Classroom REST API.
#[derive(Clone)]
pub struct ClassroomClient {
    base_url: String,
    tokens: Arc<dyn AccessTokens>,
    client: reqwest::Client,
}

impl ClassroomClient {
    /// Create a client for the production API.
    pub fn new(tokens: Arc<dyn AccessTokens>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: CLASSROOM_API_BASE.to_owned(),
            tokens,
            client,
        }
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    async fn list_courses(&self, token: &str) -> Result<Vec<Course>, CourseworkError> {
        let response = self
            .client
            .get(format!("{}/courses", self.base_url))
            .bearer_auth(token)
            .query(&[("courseStates", "ACTIVE")])
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                Err(CourseworkError::Unauthorized("google_unauthorized".to_owned()))
            }
            s if !s.is_success() => Err(CourseworkError::Unreachable(format!("courses: HTTP {s}"))),
            _ => {
                let page: CoursesPage = response.json().await.map_err(transport_error)?;
                Ok(page.courses)
            }
        }
    }

    async fn list_coursework(
        &self,
        token: &str,
        course_id: &str,
    ) -> Result<Vec<Value>, CourseworkError> {
        let response = self
            .client
            .get(format!("{}/courses/{course_id}/courseWork", self.base_url))
            .bearer_auth(token)
            .query(&[("orderBy", "dueDate desc")])
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::UNAUTHORIZED => {
                Err(CourseworkError::Unauthorized("google_unauthorized".to_owned()))
            }
            // Courses without coursework sometimes answer 404.
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            s if !s.is_success() => Err(CourseworkError::Unreachable(format!(
                "coursework for {course_id}: HTTP {s}"
            ))),
            _ => {
                let page: CourseWorkPage = response.json().await.map_err(transport_error)?;
                Ok(page.course_work)
            }
        }
    }
}

impl std::fmt::Debug for ClassroomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassroomClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl CourseworkSource for ClassroomClient {
    fn name(&self) -> &str {
        "classroom"
    }

    async fn fetch_assignments(&self, user_id: &str) -> Result<Vec<Assignment>, CourseworkError> {
        let token = self.tokens.access_token(user_id).await?;
        let courses = self.list_courses(&token).await?;

        let mut out = Vec::new();
        for course in courses {
            let Some(course_id) = course.id.filter(|id| !id.is_empty()) else {
                continue;
            };
            let course_name = course
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Course".to_owned());
            let work = self.list_coursework(&token, &course_id).await?;
            debug!(course_id = %course_id, items = work.len(), "fetched coursework");
            let before = out.len();
            out.extend(work.iter().filter_map(|w| normalize_coursework(w, &course_name)));
            let skipped = work.len() - (out.len() - before);
            if skipped > 0 {
                debug!(course_id = %course_id, skipped, "skipped coursework without an id");
            }
        }
        Ok(out)
    }
}

fn transport_error(err: reqwest::Error) -> CourseworkError {
    CourseworkError::Unreachable(err.without_url().to_string())
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CoursesPage {
    #[serde(default)]
    courses: Vec<Course>,
}

#[derive(Debug, Deserialize)]
struct Course {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

// Coursework entries stay loosely typed: one odd entry must not sink the page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseWorkPage {
    #[serde(default)]
    course_work: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Convert one raw coursework entry into an [`Assignment`]. Entries without
/// a usable id are dropped.
pub fn normalize_coursework(work: &Value, course_name: &str) -> Option<Assignment> {
    let text = |key: &str| work.get(key).and_then(Value::as_str).map(str::to_owned);

    let id = match work.get("id")? {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let title = text("title")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Assignment".to_owned());

    Some(Assignment {
        id,
        title,
        due_date: due_iso(work.get("dueDate"), work.get("dueTime")),
        course_name: course_name.to_owned(),
        description: text("description"),
        url: text("alternateLink"),
        estimated_minutes: None,
    })
}

/// Combine Classroom's `dueDate` / `dueTime` objects into a UTC RFC 3339
/// string. Missing or impossible dates yield `None`.
pub fn due_iso(due_date: Option<&Value>, due_time: Option<&Value>) -> Option<String> {
    let date = due_date?.as_object()?;
    let part = |key: &str| date.get(key).and_then(Value::as_i64);
    let (year, month, day) = (part("year")?, part("month")?, part("day")?);
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?;

    let clock = |key: &str| {
        due_time
            .and_then(|t| t.get(key))
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    let time =
        NaiveTime::from_hms_opt(clock("hours"), clock("minutes"), 0).unwrap_or(NaiveTime::MIN);

    Some(
        date.and_time(time)
            .and_utc()
            .to_rfc3339_opts(SecondsFormat::Secs, false),
    )
}
