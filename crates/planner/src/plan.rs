//! The plan data model and the session's current-plan slot.

use chrono::Local;

/// Lifecycle state of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    /// Freshly created or loaded, not yet run
    Draft,
    /// Adjusted by a revision request
    Revised,
    /// Ran to completion at least once
    Executed,
}

/// A named, ordered step sequence synthesized from a task description.
///
/// `template` is kept verbatim as the model produced it. The engine never
/// interprets it except at execution and load-time parse checking, so
/// save/load round-trips byte-for-byte.
#[derive(Debug, Clone)]
pub struct Plan {
    /// `<yyyyMMddHHmm>-<task-slug>`
    pub id: String,

    /// Creation timestamp, `yyyyMMddHHmm`. Save reuses it as the file prefix.
    pub stamp: String,

    /// The verbatim template text.
    pub template: String,

    pub status: PlanStatus,
}

impl Plan {
    pub fn new(task: &str, template: String, status: PlanStatus) -> Self {
        let stamp = timestamp_prefix();
        Self {
            id: format!("{stamp}-{}", slugify(task)),
            stamp,
            template,
            status,
        }
    }

    /// A plan reconstituted from a saved file. The stamp comes from the
    /// filename prefix when it carries one (and is stripped from the slug,
    /// so the id does not repeat it), otherwise from the clock.
    pub fn from_file(file_stem: &str, template: String) -> Self {
        let (stamp, name) = match file_stem.split_once('-') {
            Some((prefix, rest))
                if prefix.len() == 12 && prefix.chars().all(|c| c.is_ascii_digit()) =>
            {
                (prefix.to_string(), rest)
            }
            _ => (timestamp_prefix(), file_stem),
        };
        Self {
            id: format!("{stamp}-{}", slugify(name)),
            stamp,
            template,
            status: PlanStatus::Draft,
        }
    }
}

/// The single mutable current-plan slot for one operator session.
///
/// Creating or loading a plan replaces the slot wholesale; the engine never
/// deletes plan files.
#[derive(Debug, Default)]
pub struct PlanSession {
    pub current: Option<Plan>,
}

impl PlanSession {
    pub fn replace(&mut self, plan: Plan) {
        self.current = Some(plan);
    }
}

/// Local clock formatted as `yyyyMMddHHmm`.
pub fn timestamp_prefix() -> String {
    Local::now().format("%Y%m%d%H%M").to_string()
}

/// Filesystem-safe slug: lowercase alphanumerics, runs of everything else
/// collapsed to a single dash.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("plan");
    }
    slug.truncate(40);
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Organize a 2-day offsite!"), "organize-a-2-day-offsite");
        assert_eq!(slugify("***"), "plan");
    }

    #[test]
    fn plan_id_carries_stamp_and_slug() {
        let plan = Plan::new("Book a venue", "{{json 1}}".into(), PlanStatus::Draft);
        assert!(plan.id.ends_with("-book-a-venue"));
        assert_eq!(plan.stamp.len(), 12);
        assert!(plan.stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn from_file_reuses_filename_stamp() {
        let plan = Plan::from_file("202501011200-offsite", "{{json 1}}".into());
        assert_eq!(plan.stamp, "202501011200");
        assert_eq!(plan.status, PlanStatus::Draft);
    }

    #[test]
    fn from_file_id_does_not_repeat_the_stamp() {
        let plan = Plan::from_file("202501011200-offsite-dinner", "{{json 1}}".into());
        assert_eq!(plan.id, "202501011200-offsite-dinner");
    }

    #[test]
    fn from_file_without_stamp_mints_one() {
        let plan = Plan::from_file("offsite", "{{json 1}}".into());
        assert_eq!(plan.stamp.len(), 12);
    }

    #[test]
    fn session_replace_swaps_slot() {
        let mut session = PlanSession::default();
        assert!(session.current.is_none());
        session.replace(Plan::new("a", "x".into(), PlanStatus::Draft));
        session.replace(Plan::new("b", "y".into(), PlanStatus::Draft));
        assert_eq!(session.current.as_ref().map(|p| p.template.as_str()), Some("y"));
    }
}
