//! History event and team data model.

use serde::{Deserialize, Serialize};

/// A football club whose history is mined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Database ID.
    pub id: i64,
    /// Canonical name (e.g. "Manchester United").
    pub name: String,
    /// Name shown to users and used to address the generative source.
    pub display_name: String,
    /// Club crest URL, if known.
    pub logo_url: Option<String>,
}

/// What kind of history event this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// A match result or on-pitch record.
    Match,
    /// A player or manager transfer.
    Transfer,
    /// A birthday of a club legend.
    Birthday,
    /// Anything else.
    Other,
}

impl EventCategory {
    /// Parse a category string case-insensitively. Unrecognized values map
    /// to [`EventCategory::Other`] — the generative source is not trusted
    /// to stick to the enumeration.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "match" => Self::Match,
            "transfer" => Self::Transfer,
            "birthday" => Self::Birthday,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::Transfer => "transfer",
            Self::Birthday => "birthday",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One historical occurrence for a team on a calendar month/day.
///
/// For a given (team, month, day) no two stored records may share a year.
/// The store does not enforce this — the refresh runner checks it before
/// every insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Database ID; `None` until inserted.
    pub id: Option<i64>,
    pub team_id: i64,
    /// Calendar month, 1–12.
    pub month: u32,
    /// Calendar day, 1–31.
    pub day: u32,
    /// Year the event occurred.
    pub year: i32,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: EventCategory,
}

impl HistoryEvent {
    pub fn new(
        team_id: i64,
        month: u32,
        day: u32,
        year: i32,
        title: impl Into<String>,
        description: impl Into<String>,
        category: EventCategory,
    ) -> Self {
        Self {
            id: None,
            team_id,
            month,
            day,
            year,
            title: title.into(),
            description: description.into(),
            image_url: None,
            category,
        }
    }

    /// Set the image URL on this event.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(EventCategory::parse_lenient("MATCH"), EventCategory::Match);
        assert_eq!(EventCategory::parse_lenient("Match"), EventCategory::Match);
        assert_eq!(
            EventCategory::parse_lenient("transfer"),
            EventCategory::Transfer
        );
        assert_eq!(
            EventCategory::parse_lenient(" Birthday "),
            EventCategory::Birthday
        );
    }

    #[test]
    fn category_parse_unknown_defaults_to_other() {
        assert_eq!(
            EventCategory::parse_lenient("derby_win"),
            EventCategory::Other
        );
        assert_eq!(EventCategory::parse_lenient(""), EventCategory::Other);
    }

    #[test]
    fn category_serde_roundtrip() {
        let json = serde_json::to_string(&EventCategory::Birthday).unwrap();
        assert_eq!(json, "\"birthday\"");
        let parsed: EventCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EventCategory::Birthday);
    }

    #[test]
    fn new_event_has_no_id_or_image() {
        let event = HistoryEvent::new(1, 5, 12, 1999, "Treble", "...", EventCategory::Match);
        assert!(event.id.is_none());
        assert!(event.image_url.is_none());
        assert_eq!(event.year, 1999);

        let event = event.with_image_url("https://example.com/treble.jpg");
        assert_eq!(
            event.image_url.as_deref(),
            Some("https://example.com/treble.jpg")
        );
    }
}
