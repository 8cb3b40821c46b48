//! Deterministic trend ranking, skill-gap extraction and recommendation text.
//!
//! `match_score = 0.6 * skill_overlap + 0.4 * interest_match`, where
//! `skill_overlap` is the share of a trend's required skills the profile holds and
//! `interest_match` is 1 when any interest appears in the trend name.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::profile::CareerProfile;
use super::sources::{JobCandidate, TrendCandidate};

const SKILL_WEIGHT: f64 = 0.6;
const INTEREST_WEIGHT: f64 = 0.4;

/// Trends kept after ranking.
pub const MAX_RANKED_TRENDS: usize = 5;
/// Skill gaps kept after ranking.
pub const MAX_SKILL_GAPS: usize = 5;

/// A trend scored against the profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedTrend {
    /// The underlying trend.
    #[serde(flatten)]
    pub trend: TrendCandidate,
    /// Share of required skills the profile holds.
    pub skill_overlap: f64,
    /// Whether an interest matched the trend name.
    pub interest_match: bool,
    /// Combined score in [0, 1].
    pub match_score: f64,
}

/// Share of the distinct `required` skills covered by the profile. Skills differing
/// only in case count once. Zero when nothing is required.
#[must_use]
pub fn skill_overlap(required: &[String], profile: &CareerProfile) -> f64 {
    let distinct: IndexSet<String> = required
        .iter()
        .map(|skill| skill.trim().to_lowercase())
        .filter(|skill| !skill.is_empty())
        .collect();
    let held = distinct
        .iter()
        .filter(|skill| profile.has_skill(skill))
        .count();
    ratio(held, distinct.len())
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Scores one trend.
#[must_use]
pub fn score_trend(trend: &TrendCandidate, profile: &CareerProfile) -> RankedTrend {
    let overlap = skill_overlap(&trend.skills_required, profile);
    let interest_match = profile.interested_in(&trend.name);
    RankedTrend {
        trend: trend.clone(),
        skill_overlap: overlap,
        interest_match,
        match_score: SKILL_WEIGHT * overlap + if interest_match { INTEREST_WEIGHT } else { 0.0 },
    }
}

/// Scores and sorts trends by descending match score, keeping input order on ties.
#[must_use]
pub fn rank_trends(candidates: &[TrendCandidate], profile: &CareerProfile) -> Vec<RankedTrend> {
    let mut ranked: Vec<RankedTrend> = candidates
        .iter()
        .map(|trend| score_trend(trend, profile))
        .collect();
    ranked.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    ranked.truncate(MAX_RANKED_TRENDS);
    ranked
}

/// Suggested way to learn a skill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningResource {
    /// Resource kind, e.g. `online_course`.
    pub kind: String,
    /// Title.
    pub title: String,
    /// Provider.
    pub provider: String,
    /// Estimated effort.
    pub duration_hours: u32,
    /// Cost label.
    pub cost: String,
    /// Provider rating out of 5.
    pub rating: f64,
}

/// Template suggestions for `skill`.
#[must_use]
pub fn learning_resources(skill: &str) -> Vec<LearningResource> {
    vec![
        LearningResource {
            kind: "online_course".to_string(),
            title: format!("Master {skill}"),
            provider: "Coursera".to_string(),
            duration_hours: 20,
            cost: "free".to_string(),
            rating: 4.6,
        },
        LearningResource {
            kind: "project".to_string(),
            title: format!("Hands-on {skill} projects"),
            provider: "freeCodeCamp".to_string(),
            duration_hours: 12,
            cost: "free".to_string(),
            rating: 4.4,
        },
    ]
}

/// A skill the profile lacks but ranked trends demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillGap {
    /// Skill name as first seen.
    pub skill: String,
    /// Share of ranked trends demanding it, in [0, 1].
    pub priority: f64,
    /// Names of the trends demanding it.
    pub demanded_by: Vec<String>,
    /// Suggested resources.
    pub learning_resources: Vec<LearningResource>,
}

/// Skills demanded by `trends` that the profile does not hold, highest priority first.
#[must_use]
pub fn identify_skill_gaps(trends: &[RankedTrend], profile: &CareerProfile) -> Vec<SkillGap> {
    if trends.is_empty() {
        return Vec::new();
    }
    let mut demand: IndexMap<String, (String, Vec<String>)> = IndexMap::new();
    for ranked in trends {
        for skill in &ranked.trend.skills_required {
            if profile.has_skill(skill) {
                continue;
            }
            let (_, demanded_by) = demand
                .entry(skill.to_lowercase())
                .or_insert_with(|| (skill.clone(), Vec::new()));
            if !demanded_by.contains(&ranked.trend.name) {
                demanded_by.push(ranked.trend.name.clone());
            }
        }
    }
    let total = trends.len();
    let mut gaps: Vec<SkillGap> = demand
        .into_values()
        .map(|(skill, demanded_by)| SkillGap {
            learning_resources: learning_resources(&skill),
            priority: ratio(demanded_by.len(), total),
            skill,
            demanded_by,
        })
        .collect();
    gaps.sort_by(|a, b| b.priority.total_cmp(&a.priority));
    gaps.truncate(MAX_SKILL_GAPS);
    gaps
}

/// Jobs scoring strictly above `threshold`, best first.
#[must_use]
pub fn qualifying_jobs(jobs: Vec<JobCandidate>, threshold: f64) -> Vec<JobCandidate> {
    let mut survivors: Vec<JobCandidate> = jobs
        .into_iter()
        .filter(|job| job.match_score > threshold)
        .collect();
    survivors.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    survivors
}

/// Whether two jobs describe the same posting.
#[must_use]
pub fn same_posting(a: &JobCandidate, b: &JobCandidate) -> bool {
    a.title == b.title && a.employer == b.employer
}

/// Actionable lines for the top trend, top gap and top opportunity.
#[must_use]
pub fn recommendations(
    trends: &[RankedTrend],
    gaps: &[SkillGap],
    opportunities: &[JobCandidate],
) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    if let Some(top) = trends.first() {
        lines.push(format!(
            "Focus on {} - growing at {:.0}% annually",
            top.trend.name,
            top.trend.growth_rate * 100.0
        ));
    }
    if let Some(gap) = gaps.first() {
        lines.push(format!(
            "Develop {} to stay competitive in your field",
            gap.skill
        ));
    }
    if let Some(job) = opportunities.first() {
        lines.push(format!(
            "Consider: {} (match: {:.0}%)",
            job.title,
            job.match_score * 100.0
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::career::sources::StaticTrendSource;
    use crate::career::sources::TrendSource;

    async fn default_trends() -> Vec<TrendCandidate> {
        StaticTrendSource::default()
            .fetch_trends("technology")
            .await
            .unwrap()
    }

    fn job(title: &str, score: f64) -> JobCandidate {
        JobCandidate {
            title: title.to_string(),
            employer: "Acme".to_string(),
            location: "Remote".to_string(),
            match_score: score,
            skills_match: Vec::new(),
            posted_days_ago: 1,
        }
    }

    #[tokio::test]
    async fn default_profile_ranks_on_device_ai_first() {
        let ranked = rank_trends(&default_trends().await, &CareerProfile::default());
        let names: Vec<&str> = ranked.iter().map(|r| r.trend.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["On-device AI", "Privacy-First Technology", "Edge Computing"]
        );
        assert!((ranked[0].match_score - 0.6).abs() < 1e-9);
        assert!((ranked[1].match_score - 0.4).abs() < 1e-9);
        assert!(ranked[2].match_score.abs() < f64::EPSILON);
    }

    #[test]
    fn ties_keep_input_order() {
        let profile = CareerProfile {
            interests: Vec::new(),
            ..CareerProfile::default()
        };
        let candidates: Vec<TrendCandidate> = ["Alpha", "Beta", "Gamma"]
            .into_iter()
            .map(|name| TrendCandidate::new(name, 0.1, ["rust"]))
            .collect();
        let ranked = rank_trends(&candidates, &profile);
        let names: Vec<&str> = ranked.iter().map(|r| r.trend.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
    }

    #[tokio::test]
    async fn gaps_are_capped_and_sorted() {
        let profile = CareerProfile::default();
        let ranked = rank_trends(&default_trends().await, &profile);
        let gaps = identify_skill_gaps(&ranked, &profile);
        assert_eq!(gaps.len(), MAX_SKILL_GAPS);
        assert!(gaps.windows(2).all(|w| w[0].priority >= w[1].priority));
        assert!(gaps.iter().all(|gap| (0.0..=1.0).contains(&gap.priority)));
        assert!(gaps.iter().all(|gap| gap.skill != "machine_learning"));
        assert_eq!(gaps[0].skill, "embedded_systems");
        assert_eq!(gaps[0].learning_resources[0].title, "Master embedded_systems");
    }

    #[test]
    fn shared_skill_raises_priority() {
        let profile = CareerProfile::default();
        let trends = vec![
            score_trend(&TrendCandidate::new("A", 0.2, ["security", "go"]), &profile),
            score_trend(&TrendCandidate::new("B", 0.2, ["Security"]), &profile),
        ];
        let gaps = identify_skill_gaps(&trends, &profile);
        assert_eq!(gaps[0].skill, "security");
        assert!((gaps[0].priority - 1.0).abs() < f64::EPSILON);
        assert_eq!(gaps[0].demanded_by, vec!["A".to_string(), "B".to_string()]);
        assert!((gaps[1].priority - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn repeated_required_skills_count_once() {
        let profile = CareerProfile::default();
        let held = profile.skills[0].clone();
        let required = vec![
            held.clone(),
            held.to_uppercase(),
            "quantum_annealing".to_string(),
        ];
        assert!((skill_overlap(&required, &profile) - 0.5).abs() < f64::EPSILON);
        let trend = TrendCandidate::new(
            "Annealing",
            0.1,
            [held.as_str(), "QUANTUM_ANNEALING", "quantum_annealing"],
        );
        assert!((score_trend(&trend, &profile).skill_overlap - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn jobs_filtered_strictly_above_threshold() {
        let kept = qualifying_jobs(vec![job("a", 0.75), job("b", 0.8), job("c", 0.9)], 0.75);
        let titles: Vec<&str> = kept.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn recommendation_lines_follow_templates() {
        let profile = CareerProfile::default();
        let ranked = rank_trends(&default_trends().await, &profile);
        let gaps = identify_skill_gaps(&ranked, &profile);
        let lines = recommendations(&ranked, &gaps, &[job("Senior AI Engineer", 0.85)]);
        assert_eq!(lines[0], "Focus on On-device AI - growing at 45% annually");
        assert_eq!(lines[1], "Develop embedded_systems to stay competitive in your field");
        assert_eq!(lines[2], "Consider: Senior AI Engineer (match: 85%)");
        assert!(recommendations(&[], &[], &[]).is_empty());
    }
}
