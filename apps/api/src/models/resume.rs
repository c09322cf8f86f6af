//! The resume aggregate as the enhancement pipeline sees it.
//!
//! Only the fields the pipeline reads or rewrites are modelled. Everything else the
//! editor sends along (dates, links, titles, template settings) rides in the flattened
//! `extra` maps so a load → enhance → save cycle never drops data.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;

/// Opaque identifier supplied by the document store. Never generated or rewritten here.
pub type EntryId = String;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDocument {
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub skill_categories: Vec<SkillCategory>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default)]
    pub summary: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillCategory {
    pub id: EntryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: EntryId,
    pub name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_level"
    )]
    pub level: Option<SkillLevel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    /// Case-insensitive match on the four level names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(SkillLevel::Beginner),
            "intermediate" => Some(SkillLevel::Intermediate),
            "advanced" => Some(SkillLevel::Advanced),
            "expert" => Some(SkillLevel::Expert),
            _ => None,
        }
    }
}

/// Unrecognised levels become `None` rather than failing the whole document.
fn lenient_level<'de, D>(deserializer: D) -> Result<Option<SkillLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(SkillLevel::parse))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: EntryId,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: EntryId,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Skill {
    pub fn new(id: impl Into<EntryId>, name: impl Into<String>, level: Option<SkillLevel>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
            extra: Map::new(),
        }
    }
}

impl SkillCategory {
    pub fn new(id: impl Into<EntryId>, name: impl Into<String>, skills: Vec<Skill>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            skills,
            extra: Map::new(),
        }
    }
}

impl Project {
    pub fn new(id: impl Into<EntryId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            extra: Map::new(),
        }
    }
}

impl Experience {
    pub fn new(id: impl Into<EntryId>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            extra: Map::new(),
        }
    }
}

/// The columns of a `resumes` row the service reads. The document is stored as JSONB;
/// `version` is bumped on every write.
#[derive(Debug, Clone, FromRow)]
pub struct ResumeRow {
    pub document: Json<ResumeDocument>,
    pub version: i64,
}
