//! Merge reconciler: folds a combined `PartialUpdate` into the canonical document.
//!
//! Pure: no I/O, no id generation, no insertion or removal of list entries.
//! - summary: overwritten when present
//! - skill categories: the matched category's `skills` list is REPLACED wholesale
//! - projects / experiences: only `description` of the matched entry is overwritten
//!
//! Update entries whose id is not in the original are dropped (logged at warn).
//! Original entries without an update are left verbatim (logged at debug).

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::models::resume::{EntryId, ResumeDocument};
use crate::models::update::{DescriptionUpdate, PartialUpdate};

pub fn merge(original: &ResumeDocument, update: &PartialUpdate) -> ResumeDocument {
    let mut merged = original.clone();

    if let Some(summary) = update.summary() {
        merged.personal_info.summary = summary.to_string();
    }

    if let Some(categories) = &update.skill_categories {
        let mut touched = HashSet::new();
        for category_update in categories {
            match merged
                .skill_categories
                .iter_mut()
                .find(|c| c.id == category_update.id)
            {
                Some(category) => {
                    category.skills = category_update.skills.clone();
                    touched.insert(category.id.as_str().to_owned());
                }
                None => warn!(
                    "Merge: dropping skill category update for unknown id '{}'",
                    category_update.id
                ),
            }
        }
        log_untouched("skill category", merged.skill_categories.iter().map(|c| &c.id), &touched);
    }

    if let Some(projects) = &update.projects {
        let touched = apply_descriptions(
            "project",
            merged.projects.iter_mut().map(|p| (&p.id, &mut p.description)),
            projects,
        );
        log_untouched("project", merged.projects.iter().map(|p| &p.id), &touched);
    }

    if let Some(experiences) = &update.experiences {
        let touched = apply_descriptions(
            "experience",
            merged
                .experiences
                .iter_mut()
                .map(|e| (&e.id, &mut e.description)),
            experiences,
        );
        log_untouched("experience", merged.experiences.iter().map(|e| &e.id), &touched);
    }

    merged
}

/// Overwrites the description of the first entry matching each update's id and
/// returns the ids that were matched.
fn apply_descriptions<'a>(
    kind: &str,
    entries: impl Iterator<Item = (&'a EntryId, &'a mut String)>,
    updates: &[DescriptionUpdate],
) -> HashSet<EntryId> {
    let mut entries: Vec<(&EntryId, &mut String)> = entries.collect();
    let mut touched = HashSet::new();

    for update in updates {
        match entries.iter_mut().find(|(id, _)| **id == update.id) {
            Some((id, description)) => {
                **description = update.description.clone();
                touched.insert((*id).clone());
            }
            None => warn!("Merge: dropping {kind} update for unknown id '{}'", update.id),
        }
    }

    touched
}

fn log_untouched<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a EntryId>,
    touched: &HashSet<EntryId>,
) {
    for id in ids.filter(|id| !touched.contains(*id)) {
        debug!("Merge: no {kind} update provided for '{id}'; left unchanged");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::{Experience, Project, Skill, SkillCategory, SkillLevel};
    use crate::models::update::{PersonalInfoUpdate, SkillCategoryUpdate};

    fn original() -> ResumeDocument {
        let mut doc = ResumeDocument::default();
        doc.personal_info.summary = "Original summary".to_string();
        doc.skill_categories = vec![
            SkillCategory::new(
                "s1",
                "Web",
                vec![Skill::new("a", "JS", None), Skill::new("b", "CSS", None)],
            ),
            SkillCategory::new("s2", "Data", vec![Skill::new("c", "SQL", None)]),
        ];
        doc.projects = vec![Project::new("p1", "todo app"), Project::new("p2", "blog")];
        doc.experiences = vec![Experience::new("e1", "worked on backend")];
        doc
    }

    fn full_update() -> PartialUpdate {
        PartialUpdate {
            personal_info: Some(PersonalInfoUpdate {
                summary: Some("Backend engineer".to_string()),
            }),
            skill_categories: Some(vec![SkillCategoryUpdate {
                id: "s1".to_string(),
                skills: vec![Skill::new("a", "JavaScript", Some(SkillLevel::Advanced))],
            }]),
            projects: Some(vec![DescriptionUpdate {
                id: "p2".to_string(),
                description: "Technical blog with 10k monthly readers".to_string(),
            }]),
            experiences: Some(vec![DescriptionUpdate {
                id: "e1".to_string(),
                description: "Re-architected backend service, reducing latency 30%".to_string(),
            }]),
        }
    }

    #[test]
    fn test_empty_update_is_a_no_op() {
        let doc = original();
        assert_eq!(merge(&doc, &PartialUpdate::default()), doc);
    }

    #[test]
    fn test_present_but_empty_sections_are_a_no_op() {
        let doc = original();
        let update = PartialUpdate {
            personal_info: Some(PersonalInfoUpdate { summary: None }),
            skill_categories: Some(vec![]),
            projects: Some(vec![]),
            experiences: Some(vec![]),
        };
        assert_eq!(merge(&doc, &update), doc);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let doc = original();
        let update = full_update();
        let once = merge(&doc, &update);
        let twice = merge(&once, &update);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_skill_category_skills_are_replaced_wholesale() {
        let merged = merge(&original(), &full_update());
        let s1 = &merged.skill_categories[0];
        assert_eq!(s1.id, "s1");
        assert_eq!(s1.name, "Web");
        assert_eq!(
            s1.skills,
            vec![Skill::new("a", "JavaScript", Some(SkillLevel::Advanced))]
        );
        // Untouched category stays verbatim.
        assert_eq!(merged.skill_categories[1], original().skill_categories[1]);
    }

    #[test]
    fn test_only_description_changes_on_matched_entries() {
        let mut doc = original();
        doc.projects[1]
            .extra
            .insert("url".to_string(), serde_json::json!("https://blog.example"));

        let merged = merge(&doc, &full_update());

        assert_eq!(merged.projects[0], doc.projects[0]);
        assert_eq!(merged.projects[1].description, "Technical blog with 10k monthly readers");
        assert_eq!(merged.projects[1].extra, doc.projects[1].extra);
        assert_eq!(
            merged.experiences[0].description,
            "Re-architected backend service, reducing latency 30%"
        );
        assert_eq!(merged.personal_info.summary, "Backend engineer");
    }

    #[test]
    fn test_unmatched_ids_are_dropped() {
        let doc = original();
        let update = PartialUpdate {
            projects: Some(vec![DescriptionUpdate {
                id: "zz".to_string(),
                description: "Invented".to_string(),
            }]),
            skill_categories: Some(vec![SkillCategoryUpdate {
                id: "s404".to_string(),
                skills: vec![Skill::new("q", "Cobol", None)],
            }]),
            experiences: Some(vec![DescriptionUpdate {
                id: "e404".to_string(),
                description: "Invented".to_string(),
            }]),
            ..Default::default()
        };

        let merged = merge(&doc, &update);
        assert_eq!(merged.projects, doc.projects);
        assert_eq!(merged.skill_categories, doc.skill_categories);
        assert_eq!(merged.experiences, doc.experiences);
    }

    #[test]
    fn test_merge_never_changes_list_lengths_or_ids() {
        let doc = original();
        let merged = merge(&doc, &full_update());
        let ids = |d: &ResumeDocument| {
            (
                d.skill_categories.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
                d.projects.iter().map(|p| p.id.clone()).collect::<Vec<_>>(),
                d.experiences.iter().map(|e| e.id.clone()).collect::<Vec<_>>(),
            )
        };
        assert_eq!(ids(&merged), ids(&doc));
    }

    #[test]
    fn test_later_update_for_same_id_wins() {
        let update = PartialUpdate {
            projects: Some(vec![
                DescriptionUpdate {
                    id: "p1".to_string(),
                    description: "first".to_string(),
                },
                DescriptionUpdate {
                    id: "p1".to_string(),
                    description: "second".to_string(),
                },
            ]),
            ..Default::default()
        };
        let merged = merge(&original(), &update);
        assert_eq!(merged.projects[0].description, "second");
    }
}
