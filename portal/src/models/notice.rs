use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Tone;

/// Clinic sector a notice or document belongs to. Unknown labels are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sector {
    General,
    Administrative,
    Clinical,
    Financial,
    HumanResources,
    Other(String),
}

impl From<String> for Sector {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "geral" | "general" => Sector::General,
            "administrativo" | "administrative" => Sector::Administrative,
            "clinico" | "clínico" | "clinical" => Sector::Clinical,
            "financeiro" | "financial" => Sector::Financial,
            "rh" | "hr" | "recursos humanos" => Sector::HumanResources,
            _ => Sector::Other(value.trim().to_string()),
        }
    }
}

impl From<&str> for Sector {
    fn from(value: &str) -> Self {
        Sector::from(value.to_string())
    }
}

impl From<Sector> for String {
    fn from(sector: Sector) -> Self {
        sector.as_str().to_string()
    }
}

impl Sector {
    pub fn as_str(&self) -> &str {
        match self {
            Sector::General => "geral",
            Sector::Administrative => "administrativo",
            Sector::Clinical => "clinico",
            Sector::Financial => "financeiro",
            Sector::HumanResources => "rh",
            Sector::Other(label) => label,
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Sector::General => Tone::Blue,
            Sector::Administrative => Tone::Yellow,
            Sector::Clinical => Tone::Green,
            Sector::Financial => Tone::Magenta,
            Sector::HumanResources => Tone::Cyan,
            Sector::Other(_) => Tone::Gray,
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub sector: Sector,
    #[serde(default)]
    pub author_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Insert/update payload for `notices`.
#[derive(Debug, Clone, Serialize)]
pub struct NoticeDraft {
    pub title: String,
    pub content: String,
    pub sector: Sector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<Uuid>,
}

impl NoticeDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>, sector: Sector) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            sector,
            author_id: None,
        }
    }

    pub fn with_author(mut self, author_id: Uuid) -> Self {
        self.author_id = Some(author_id);
        self
    }
}
