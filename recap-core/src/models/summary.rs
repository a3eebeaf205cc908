use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RecapError;

/// A persisted summary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Option<String>,
}

impl Summary {
    /// Build a fresh record stamped with `now`.
    pub fn from_new(new: NewSummary, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            url: new.url,
            summary_text: new.summary_text,
            created_at: now,
            updated_at: now,
            user_id: None,
        }
    }
}

/// Validated input for creating a summary. All three fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSummary {
    pub title: String,
    pub url: String,
    pub summary_text: String,
}

impl NewSummary {
    /// Validate raw request fields. Missing, empty and whitespace-only values
    /// are all reported, using their wire names.
    pub fn validate(
        title: Option<String>,
        url: Option<String>,
        summary_text: Option<String>,
    ) -> Result<Self, RecapError> {
        fn present(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.trim().is_empty())
        }

        let (title, url, summary_text) = (present(title), present(url), present(summary_text));

        let mut missing = Vec::new();
        if title.is_none() {
            missing.push("title");
        }
        if url.is_none() {
            missing.push("url");
        }
        if summary_text.is_none() {
            missing.push("summaryText");
        }

        match (title, url, summary_text) {
            (Some(title), Some(url), Some(summary_text)) => Ok(Self {
                title,
                url,
                summary_text,
            }),
            _ => Err(RecapError::Validation { missing }),
        }
    }
}

/// Listing filter. Date bounds are inclusive; `search` is a case-insensitive
/// substring match against title, summary text or url.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl SummaryFilter {
    /// Build a filter from raw query-string values. Empty values are ignored.
    pub fn from_query(
        start_date: Option<&str>,
        end_date: Option<&str>,
        search: Option<&str>,
    ) -> Result<Self, RecapError> {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        Ok(Self {
            start_date: non_empty(start_date)
                .map(|s| parse_bound(s, DayEdge::Start))
                .transpose()?,
            end_date: non_empty(end_date)
                .map(|s| parse_bound(s, DayEdge::End))
                .transpose()?,
            // Blank terms are dropped, others are matched exactly as given.
            search: search
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
        })
    }

    pub fn matches(&self, summary: &Summary) -> bool {
        if let Some(start) = self.start_date {
            if summary.created_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if summary.created_at > end {
                return false;
            }
        }
        match &self.search {
            Some(needle) => {
                let needle = needle.to_lowercase();
                [&summary.title, &summary.summary_text, &summary.url]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DayEdge {
    Start,
    End,
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` (read as UTC), or
/// bare `YYYY-MM-DD` dates, which expand to the first or last millisecond of
/// that UTC day.
fn parse_bound(raw: &str, edge: DayEdge) -> Result<DateTime<Utc>, RecapError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| RecapError::InvalidQuery(format!("unrecognized date '{}'", raw)))?;
    let naive = match edge {
        DayEdge::Start => date.and_hms_milli_opt(0, 0, 0, 0),
        DayEdge::End => date.and_hms_milli_opt(23, 59, 59, 999),
    };
    naive
        .map(|n| n.and_utc())
        .ok_or_else(|| RecapError::InvalidQuery(format!("unrecognized date '{}'", raw)))
}
