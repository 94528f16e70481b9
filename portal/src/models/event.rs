use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Tone;

/// The six calendar categories. Anything unrecognised is filed under `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventCategory {
    Meeting,
    Training,
    Appointment,
    Workshop,
    Holiday,
    Other,
}

impl EventCategory {
    pub const ALL: [EventCategory; 6] = [
        EventCategory::Meeting,
        EventCategory::Training,
        EventCategory::Appointment,
        EventCategory::Workshop,
        EventCategory::Holiday,
        EventCategory::Other,
    ];

    pub fn categorize(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "reuniao" | "reunião" | "meeting" => EventCategory::Meeting,
            "treinamento" | "training" => EventCategory::Training,
            "atendimento" | "appointment" => EventCategory::Appointment,
            "workshop" | "oficina" => EventCategory::Workshop,
            "feriado" | "holiday" => EventCategory::Holiday,
            _ => EventCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Meeting => "reuniao",
            EventCategory::Training => "treinamento",
            EventCategory::Appointment => "atendimento",
            EventCategory::Workshop => "workshop",
            EventCategory::Holiday => "feriado",
            EventCategory::Other => "outro",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            EventCategory::Meeting => Tone::Blue,
            EventCategory::Training => Tone::Magenta,
            EventCategory::Appointment => Tone::Green,
            EventCategory::Workshop => Tone::Yellow,
            EventCategory::Holiday => Tone::Red,
            EventCategory::Other => Tone::Gray,
        }
    }
}

impl From<String> for EventCategory {
    fn from(value: String) -> Self {
        EventCategory::categorize(&value)
    }
}

impl From<EventCategory> for String {
    fn from(category: EventCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    pub category: EventCategory,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub category: EventCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}

impl EventDraft {
    pub fn new(
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        category: EventCategory,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_time,
            end_time,
            location: None,
            category,
            created_by: None,
        }
    }
}

impl From<&Event> for EventDraft {
    fn from(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location.clone(),
            category: event.category,
            created_by: None,
        }
    }
}
