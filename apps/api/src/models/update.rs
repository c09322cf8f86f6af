//! Sparse updates produced by the section enhancers.
//!
//! `None` at the top level means "this stage asked for no change". `Some(vec![])` is a
//! present-but-empty list and is applied as a no-op by the reconciler.

use serde::{Deserialize, Serialize};

use crate::models::resume::{EntryId, Skill};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<PersonalInfoUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_categories: Option<Vec<SkillCategoryUpdate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<DescriptionUpdate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiences: Option<Vec<DescriptionUpdate>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfoUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Replacement skill list for one category, matched by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillCategoryUpdate {
    pub id: EntryId,
    #[serde(default)]
    pub skills: Vec<Skill>,
}

/// New `description` for one project or experience, matched by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionUpdate {
    pub id: EntryId,
    pub description: String,
}

impl PartialUpdate {
    pub fn summary(&self) -> Option<&str> {
        self.personal_info
            .as_ref()
            .and_then(|p| p.summary.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.summary().is_none()
            && self.skill_categories.as_ref().map_or(true, Vec::is_empty)
            && self.projects.as_ref().map_or(true, Vec::is_empty)
            && self.experiences.as_ref().map_or(true, Vec::is_empty)
    }

    /// Folds another stage's update into this one. A later summary wins; lists are
    /// concatenated in arrival order.
    pub fn absorb(&mut self, other: PartialUpdate) {
        if let Some(summary) = other.personal_info.and_then(|p| p.summary) {
            self.personal_info = Some(PersonalInfoUpdate {
                summary: Some(summary),
            });
        }
        extend_section(&mut self.skill_categories, other.skill_categories);
        extend_section(&mut self.projects, other.projects);
        extend_section(&mut self.experiences, other.experiences);
    }
}

fn extend_section<T>(target: &mut Option<Vec<T>>, incoming: Option<Vec<T>>) {
    match (target.as_mut(), incoming) {
        (Some(existing), Some(more)) => existing.extend(more),
        (None, Some(more)) => *target = Some(more),
        (_, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(id: &str, text: &str) -> DescriptionUpdate {
        DescriptionUpdate {
            id: id.to_string(),
            description: text.to_string(),
        }
    }

    #[test]
    fn test_absent_keys_deserialize_as_none() {
        let update: PartialUpdate =
            serde_json::from_str(r#"{"projects": [{"id": "p1", "description": "x"}]}"#).unwrap();
        assert!(update.personal_info.is_none());
        assert!(update.skill_categories.is_none());
        assert!(update.experiences.is_none());
        assert_eq!(update.projects.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_present_but_empty_is_distinct_from_absent() {
        let update: PartialUpdate = serde_json::from_str(r#"{"experiences": []}"#).unwrap();
        assert_eq!(update.experiences, Some(vec![]));
        assert!(update.is_empty());
    }

    #[test]
    fn test_absorb_keeps_disjoint_sections() {
        let mut combined = PartialUpdate {
            personal_info: Some(PersonalInfoUpdate {
                summary: Some("Summary".to_string()),
            }),
            ..Default::default()
        };
        combined.absorb(PartialUpdate {
            experiences: Some(vec![description("e1", "Shipped it")]),
            ..Default::default()
        });
        combined.absorb(PartialUpdate::default());

        assert_eq!(combined.summary(), Some("Summary"));
        assert_eq!(combined.experiences, Some(vec![description("e1", "Shipped it")]));
        assert!(combined.projects.is_none());
    }

    #[test]
    fn test_absorb_concatenates_same_section() {
        let mut combined = PartialUpdate {
            projects: Some(vec![description("p1", "a")]),
            ..Default::default()
        };
        combined.absorb(PartialUpdate {
            projects: Some(vec![description("p2", "b")]),
            ..Default::default()
        });
        assert_eq!(
            combined.projects,
            Some(vec![description("p1", "a"), description("p2", "b")])
        );
    }
}
