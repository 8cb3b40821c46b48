//! External trend, job, project and event feeds. Only static catalogues ship here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// An industry trend as reported by a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendCandidate {
    /// Trend name.
    pub name: String,
    /// Annual growth rate as a fraction.
    pub growth_rate: f64,
    /// Source-assigned relevance.
    pub relevance: f64,
    /// Skills the trend demands.
    pub skills_required: Vec<String>,
    /// Growth in job postings as a fraction.
    pub job_postings_growth: f64,
}

impl TrendCandidate {
    /// Creates a trend with no reported relevance or posting growth.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, growth_rate: f64, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            growth_rate,
            relevance: 0.0,
            skills_required: skills.into_iter().map(Into::into).collect(),
            job_postings_growth: 0.0,
        }
    }
}

/// A job posting with a source-supplied match score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobCandidate {
    /// Role title.
    pub title: String,
    /// Hiring organisation.
    pub employer: String,
    /// Location or `Remote`.
    pub location: String,
    /// Match score in [0, 1].
    pub match_score: f64,
    /// Skills that matched.
    pub skills_match: Vec<String>,
    /// Age of the posting.
    pub posted_days_ago: u32,
}

/// A side project that builds skills demanded by current trends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectIdea {
    /// Project title.
    pub title: String,
    /// What the project involves.
    pub description: String,
    /// Skills the project exercises.
    pub skills_gained: Vec<String>,
    /// Rough effort.
    pub estimated_hours: u32,
    /// Expected career impact in [0, 1].
    pub impact_score: f64,
}

/// A conference or meetup worth attending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkingEvent {
    /// Event name.
    pub title: String,
    /// ISO date (`YYYY-MM-DD`).
    pub date: String,
    /// City or `Online`.
    pub location: String,
    /// Relevance to the profile in [0, 1].
    pub relevance: f64,
    /// Expected attendance.
    pub attendees: u32,
}

/// Any career opportunity surfaced by an analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Opportunity {
    /// Job posting.
    Job(JobCandidate),
    /// Side project.
    Project(ProjectIdea),
    /// Networking event.
    Event(NetworkingEvent),
}

impl Opportunity {
    /// `job`, `project` or `event`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Job(_) => "job",
            Self::Project(_) => "project",
            Self::Event(_) => "event",
        }
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Job(job) => &job.title,
            Self::Project(project) => &project.title,
            Self::Event(event) => &event.title,
        }
    }
}

/// Supplies industry trends.
#[async_trait]
pub trait TrendSource: Send + Sync {
    /// Source name used in logs.
    fn name(&self) -> &str;

    /// Trends for `industry`.
    async fn fetch_trends(&self, industry: &str) -> Result<Vec<TrendCandidate>, AgentError>;
}

/// Supplies job postings relevant to a set of trends.
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    /// Source name used in logs.
    fn name(&self) -> &str;

    /// Job postings relevant to `trends`.
    async fn search_jobs(&self, trends: &[TrendCandidate]) -> Result<Vec<JobCandidate>, AgentError>;

    /// Side projects suited to `trends`. None by default.
    async fn suggest_projects(
        &self,
        _trends: &[TrendCandidate],
    ) -> Result<Vec<ProjectIdea>, AgentError> {
        Ok(Vec::new())
    }

    /// Networking events related to `trends`. None by default.
    async fn find_events(
        &self,
        _trends: &[TrendCandidate],
    ) -> Result<Vec<NetworkingEvent>, AgentError> {
        Ok(Vec::new())
    }
}

/// Fixed trend list, independent of industry.
#[derive(Debug, Clone)]
pub struct StaticTrendSource {
    trends: Vec<TrendCandidate>,
}

impl StaticTrendSource {
    /// Source returning exactly `trends`.
    #[must_use]
    pub const fn new(trends: Vec<TrendCandidate>) -> Self {
        Self { trends }
    }
}

impl Default for StaticTrendSource {
    fn default() -> Self {
        Self::new(vec![
            TrendCandidate {
                name: "On-device AI".to_string(),
                growth_rate: 0.45,
                relevance: 0.9,
                skills_required: vec![
                    "machine_learning".to_string(),
                    "embedded_systems".to_string(),
                    "optimization".to_string(),
                ],
                job_postings_growth: 0.35,
            },
            TrendCandidate {
                name: "Edge Computing".to_string(),
                growth_rate: 0.38,
                relevance: 0.85,
                skills_required: vec![
                    "distributed_systems".to_string(),
                    "networking".to_string(),
                    "security".to_string(),
                ],
                job_postings_growth: 0.28,
            },
            TrendCandidate {
                name: "Privacy-First Technology".to_string(),
                growth_rate: 0.42,
                relevance: 0.8,
                skills_required: vec![
                    "cryptography".to_string(),
                    "privacy_engineering".to_string(),
                    "compliance".to_string(),
                ],
                job_postings_growth: 0.31,
            },
        ])
    }
}

#[async_trait]
impl TrendSource for StaticTrendSource {
    fn name(&self) -> &str {
        "static-trends"
    }

    async fn fetch_trends(&self, _industry: &str) -> Result<Vec<TrendCandidate>, AgentError> {
        Ok(self.trends.clone())
    }
}

/// Fixed job, project and event lists.
#[derive(Debug, Clone)]
pub struct StaticOpportunitySource {
    jobs: Vec<JobCandidate>,
    projects: Vec<ProjectIdea>,
    events: Vec<NetworkingEvent>,
}

impl StaticOpportunitySource {
    /// Source returning exactly `jobs` and no projects or events.
    #[must_use]
    pub const fn new(jobs: Vec<JobCandidate>) -> Self {
        Self {
            jobs,
            projects: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Adds project templates.
    #[must_use]
    pub fn with_projects(mut self, projects: Vec<ProjectIdea>) -> Self {
        self.projects = projects;
        self
    }

    /// Adds event templates.
    #[must_use]
    pub fn with_events(mut self, events: Vec<NetworkingEvent>) -> Self {
        self.events = events;
        self
    }
}

impl Default for StaticOpportunitySource {
    fn default() -> Self {
        Self::new(vec![JobCandidate {
            title: "Senior AI Engineer - On-Device ML".to_string(),
            employer: "TechCorp".to_string(),
            location: "Remote".to_string(),
            match_score: 0.85,
            skills_match: vec![
                "machine_learning".to_string(),
                "python".to_string(),
                "optimization".to_string(),
            ],
            posted_days_ago: 3,
        }])
        .with_projects(vec![ProjectIdea {
            title: "Build a privacy-first mobile app".to_string(),
            description: "Leverage on-device AI for personal data processing".to_string(),
            skills_gained: vec!["on-device AI".to_string(), "privacy engineering".to_string()],
            estimated_hours: 40,
            impact_score: 0.8,
        }])
        .with_events(vec![NetworkingEvent {
            title: "AI on the Edge Summit".to_string(),
            date: "2025-08-15".to_string(),
            location: "San Francisco".to_string(),
            relevance: 0.9,
            attendees: 2500,
        }])
    }
}

#[async_trait]
impl OpportunitySource for StaticOpportunitySource {
    fn name(&self) -> &str {
        "static-opportunities"
    }

    async fn search_jobs(&self, _trends: &[TrendCandidate]) -> Result<Vec<JobCandidate>, AgentError> {
        Ok(self.jobs.clone())
    }

    async fn suggest_projects(
        &self,
        _trends: &[TrendCandidate],
    ) -> Result<Vec<ProjectIdea>, AgentError> {
        Ok(self.projects.clone())
    }

    async fn find_events(
        &self,
        _trends: &[TrendCandidate],
    ) -> Result<Vec<NetworkingEvent>, AgentError> {
        Ok(self.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opportunities_serialize_with_their_kind() {
        let event = Opportunity::Event(NetworkingEvent {
            title: "Local Rust Meetup".to_string(),
            date: "2026-11-05".to_string(),
            location: "Online".to_string(),
            relevance: 0.6,
            attendees: 80,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["attendees"], 80);
        assert_eq!(event.kind(), "event");
        assert_eq!(event.title(), "Local Rust Meetup");
    }

    #[tokio::test]
    async fn plain_job_source_has_no_projects_or_events() {
        let source = StaticOpportunitySource::new(Vec::new());
        assert!(source.suggest_projects(&[]).await.unwrap().is_empty());
        assert!(source.find_events(&[]).await.unwrap().is_empty());
        let catalogue = StaticOpportunitySource::default();
        assert_eq!(catalogue.suggest_projects(&[]).await.unwrap().len(), 1);
        assert_eq!(catalogue.find_events(&[]).await.unwrap()[0].attendees, 2500);
    }
}
