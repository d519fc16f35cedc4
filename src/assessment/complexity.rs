//! Complexity assessment for incoming tasks
//!
//! Heuristic, deterministic classification:
//! - Routing: acceptance-criteria count alone picks the tier
//! - Reporting: a weighted composite score is computed alongside it
//! - Total: empty or unparseable text never fails, it assesses as one criterion

use crate::assessment::tiers::TierTable;
use crate::assessment::types::{
    ComplexityAnalysis, ComplexityMetrics, ComplexityTier, ResourceEnvelope,
};
use crate::types::TaskDescriptor;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Numbered list item at line start, e.g. `3. Show an error`
static NUMBERED_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\d+\.[ \t]+\S").expect("NUMBERED_ITEM_RE regex should compile")
});

/// Start of a Given/When/Then block
static GIVEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:[-*][ \t]*)?given\b").expect("GIVEN_RE regex should compile")
});

/// `Acceptance criteria:` header
static AC_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)acceptance[ \t]+criteria[ \t]*:").expect("AC_HEADER_RE regex should compile")
});

/// `AC:` / `AC1:` marker
static AC_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bAC[ \t]*\d*[ \t]*:").expect("AC_MARKER_RE regex should compile")
});

/// `story points: 5` phrase
static STORY_POINTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)story[ \t]*points?[ \t]*:[ \t]*(\d+)").expect("STORY_POINTS_RE regex should compile")
});

const TECHNICAL_KEYWORDS: &[&str] = &[
    "api",
    "database",
    "backend",
    "endpoint",
    "schema",
    "migration",
    "server",
    "performance",
    "security",
    "authentication",
];

const UI_KEYWORDS: &[&str] = &[
    "user interface",
    "frontend",
    "screen",
    "page",
    "button",
    "form",
    "layout",
    "responsive",
    "display",
    "modal",
];

const INTEGRATION_KEYWORDS: &[&str] = &[
    "integration",
    "integrate",
    "third-party",
    "third party",
    "webhook",
    "external",
    "sync",
    "oauth",
    "payment",
    "import",
];

const FILE_KEYWORDS: &[&str] = &[
    "component",
    "service",
    "controller",
    "model",
    "view",
    "template",
    "style",
    "test",
    "config",
];

/// Complexity assessor with a 4-factor weighted score
pub struct ComplexityAssessor {
    /// Envelope configuration shared across runs
    tiers: Arc<TierTable>,

    /// Weight per acceptance criterion (0.4)
    weight_criteria: f64,

    /// Weight per story point (0.2)
    weight_story_points: f64,

    /// Weight per requirement flag that is set (0.1)
    weight_flag: f64,

    /// Weight per estimated file (0.1)
    weight_files: f64,
}

impl ComplexityAssessor {
    /// Create an assessor over a shared tier table
    pub fn new(tiers: Arc<TierTable>) -> Self {
        Self {
            tiers,
            weight_criteria: 0.4,
            weight_story_points: 0.2,
            weight_flag: 0.1,
            weight_files: 0.1,
        }
    }

    /// Shared tier table
    pub fn tiers(&self) -> &Arc<TierTable> {
        &self.tiers
    }

    /// Classify a task. Criteria count is the single routing input.
    pub fn assess(&self, task: &TaskDescriptor) -> ComplexityTier {
        ComplexityTier::from_criteria_count(self.count_criteria(&task.description))
    }

    /// Classify bare task text (treated as the description)
    pub fn assess_text(&self, text: &str) -> ComplexityTier {
        ComplexityTier::from_criteria_count(self.count_criteria(text))
    }

    /// Envelope configured for a tier
    pub fn envelope_for(&self, tier: ComplexityTier) -> &ResourceEnvelope {
        self.tiers.envelope(tier)
    }

    /// Tier, metrics, envelope and a human-readable recommendation
    pub fn analyze(&self, task: &TaskDescriptor) -> ComplexityAnalysis {
        let metrics = self.metrics(task);
        let tier = ComplexityTier::from_criteria_count(metrics.criteria_count);
        let envelope = self.envelope_for(tier).clone();
        let recommendation = recommendation(tier, &metrics, &envelope);

        debug!(
            tier = %tier,
            criteria = metrics.criteria_count,
            score = metrics.score,
            "task assessed"
        );

        ComplexityAnalysis {
            tier,
            metrics,
            envelope,
            recommendation,
        }
    }

    /// Derive all metrics for a task
    ///
    /// Formula:
    /// score = 0.4 × criteria + 0.2 × story_points + 0.1 × flags_set
    ///       + 0.1 × estimated_files   (rounded to 2 decimals)
    pub fn metrics(&self, task: &TaskDescriptor) -> ComplexityMetrics {
        let text = task.full_text().to_lowercase();

        let criteria_count = self.count_criteria(&task.description);
        let story_points = self.extract_story_points(task);
        let has_technical_requirements = contains_any(&text, TECHNICAL_KEYWORDS);
        let has_ui_requirements = contains_any(&text, UI_KEYWORDS);
        let has_integration_requirements = contains_any(&text, INTEGRATION_KEYWORDS);
        let estimated_files = self.estimate_files(&text);

        let flags = [
            has_technical_requirements,
            has_ui_requirements,
            has_integration_requirements,
        ]
        .iter()
        .filter(|set| **set)
        .count();

        let raw = self.weight_criteria * criteria_count as f64
            + self.weight_story_points * story_points.unwrap_or(0) as f64
            + self.weight_flag * flags as f64
            + self.weight_files * estimated_files as f64;

        ComplexityMetrics {
            criteria_count,
            story_points,
            has_technical_requirements,
            has_ui_requirements,
            has_integration_requirements,
            estimated_files,
            score: (raw * 100.0).round() / 100.0,
        }
    }

    /// Count acceptance criteria in a description
    ///
    /// Heuristics, first non-zero wins:
    /// 1. Numbered list items (`<n>. ` at line start)
    /// 2. Given blocks + `acceptance criteria:` headers + `AC:` markers
    /// 3. Exactly one criterion
    pub fn count_criteria(&self, description: &str) -> usize {
        let numbered = NUMBERED_ITEM_RE.find_iter(description).count();
        if numbered > 0 {
            return numbered;
        }

        let phrases = GIVEN_RE.find_iter(description).count()
            + AC_HEADER_RE.find_iter(description).count()
            + AC_MARKER_RE.find_iter(description).count();
        if phrases > 0 {
            return phrases;
        }

        1
    }

    /// Story points from a `*story*point*` field or a `story points: N` phrase
    pub fn extract_story_points(&self, task: &TaskDescriptor) -> Option<u32> {
        let from_field = task
            .fields
            .iter()
            .filter(|(name, _)| {
                let name = name.to_lowercase();
                name.contains("story") && name.contains("point")
            })
            .find_map(|(_, value)| story_points_value(value));

        from_field.or_else(|| {
            STORY_POINTS_RE
                .captures(&task.full_text())
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
    }

    /// Distinct artifact nouns mentioned, floored at 1
    fn estimate_files(&self, lowered_text: &str) -> usize {
        let hits: BTreeSet<&str> = FILE_KEYWORDS
            .iter()
            .copied()
            .filter(|keyword| lowered_text.contains(keyword))
            .collect();

        hits.len().max(1)
    }
}

impl Default for ComplexityAssessor {
    fn default() -> Self {
        Self::new(Arc::new(TierTable::default()))
    }
}

fn contains_any(lowered_text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| lowered_text.contains(keyword))
}

fn story_points_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn recommendation(tier: ComplexityTier, metrics: &ComplexityMetrics, envelope: &ResourceEnvelope) -> String {
    let steps: Vec<&str> = envelope.pipeline_steps.iter().map(|s| s.id()).collect();
    let advice = match tier {
        ComplexityTier::Simple => "lean pipeline, skip work the plan rules out",
        ComplexityTier::Medium => "standard pipeline with a test pass",
        ComplexityTier::Complex => "full pipeline with architecture and review",
    };

    format!(
        "{} tier ({} criteria, score {:.2}): {} [{}], ceilings {} messages / ${:.2} / {}s",
        tier,
        metrics.criteria_count,
        metrics.score,
        advice,
        steps.join(" -> "),
        envelope.max_messages,
        envelope.max_cost,
        envelope.max_duration_secs
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::types::PipelineStep;
    use serde_json::json;

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("{}. Criterion number {}", i, i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_numbered_criteria_drive_tier() {
        let assessor = ComplexityAssessor::default();
        assert_eq!(assessor.assess_text(&numbered(2)), ComplexityTier::Simple);
        assert_eq!(assessor.assess_text(&numbered(3)), ComplexityTier::Medium);
        assert_eq!(assessor.assess_text(&numbered(5)), ComplexityTier::Medium);
        assert_eq!(assessor.assess_text(&numbered(6)), ComplexityTier::Complex);
    }

    #[test]
    fn test_empty_text_defaults_to_one_criterion() {
        let assessor = ComplexityAssessor::default();
        assert_eq!(assessor.count_criteria(""), 1);
        assert_eq!(assessor.assess(&TaskDescriptor::default()), ComplexityTier::Simple);
    }

    #[test]
    fn test_phrase_fallback() {
        let assessor = ComplexityAssessor::default();
        let text = "Given a logged in user\nWhen they click logout\nThen the session ends\n\n\
                    Given an expired session\nWhen they reload\nThen they see the login page\n\
                    AC: audit entry written";
        assert_eq!(assessor.count_criteria(text), 3);
    }

    #[test]
    fn test_numbered_list_beats_phrases() {
        let assessor = ComplexityAssessor::default();
        let text = "Acceptance criteria:\n1. One\n2. Two";
        assert_eq!(assessor.count_criteria(text), 2);
    }

    #[test]
    fn test_story_points_from_field() {
        let assessor = ComplexityAssessor::default();
        let task = TaskDescriptor::from_text("1. Do it").with_field("customfield_StoryPoints", json!(5));
        assert_eq!(assessor.extract_story_points(&task), Some(5));

        let task = TaskDescriptor::from_text("1. Do it").with_field("Story point estimate", json!("8"));
        assert_eq!(assessor.extract_story_points(&task), Some(8));
    }

    #[test]
    fn test_story_points_from_text() {
        let assessor = ComplexityAssessor::default();
        let task = TaskDescriptor::from_text("Story Points: 3\n1. Do it");
        assert_eq!(assessor.extract_story_points(&task), Some(3));

        let task = TaskDescriptor::from_text("1. Do it");
        assert_eq!(assessor.extract_story_points(&task), None);
    }

    #[test]
    fn test_flags_and_files() {
        let assessor = ComplexityAssessor::default();
        let task = TaskDescriptor::new(
            "Checkout page",
            "1. Add a payment webhook endpoint\n2. Render a checkout form component backed by a service",
        );
        let metrics = assessor.metrics(&task);
        assert!(metrics.has_technical_requirements);
        assert!(metrics.has_ui_requirements);
        assert!(metrics.has_integration_requirements);
        assert_eq!(metrics.estimated_files, 2);
    }

    #[test]
    fn test_score_formula() {
        let assessor = ComplexityAssessor::default();
        let task = TaskDescriptor::new("Plain", "1. One\n2. Two\n3. Three")
            .with_field("story_points", json!(2));
        let metrics = assessor.metrics(&task);
        // 0.4*3 + 0.2*2 + 0 flags + 0.1*1 file
        assert!((metrics.score - 1.7).abs() < 1e-9, "got {}", metrics.score);
    }

    #[test]
    fn test_score_does_not_drive_routing() {
        let assessor = ComplexityAssessor::default();
        let task = TaskDescriptor::new(
            "Huge API integration",
            "1. Database migration for the payment service, controller, model, view, template, style, test and config",
        )
        .with_field("story points", json!(40));
        let analysis = assessor.analyze(&task);
        assert!(analysis.metrics.score > 8.0);
        assert_eq!(analysis.tier, ComplexityTier::Simple);
    }

    #[test]
    fn test_analyze_complex_business_story() {
        let assessor = ComplexityAssessor::default();
        let description = format!(
            "As a business owner I want a reporting dashboard.\n{}",
            numbered(8)
        );
        let analysis = assessor.analyze(&TaskDescriptor::new("Reporting", description));
        assert_eq!(analysis.tier, ComplexityTier::Complex);
        assert_eq!(analysis.envelope.max_messages, 100);
        assert_eq!(analysis.envelope.max_cost, 10.00);
        assert_eq!(analysis.envelope.max_duration_secs, 3600);
        assert!(analysis.envelope.has_step(PipelineStep::Review));
        assert!(analysis.envelope.has_step(PipelineStep::Architecture));
        assert!(analysis.recommendation.contains("complex"));
    }
}
