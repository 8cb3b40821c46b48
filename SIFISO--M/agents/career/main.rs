//! Career development: trend matching, skill gaps, jobs, side projects and events.

/// Static user profile and loose skill matching.
pub mod profile;
/// Trend ranking, skill gaps, opportunity filtering and recommendations.
pub mod scoring;
/// Pluggable trend and opportunity sources.
pub mod sources;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;
use sifiso_sensors::SensorSnapshot;
use tracing::{info, warn};

use crate::agent::{periodic, Agent, AgentCategory, AgentContext};
use crate::error::AgentError;
use crate::notification::{NotificationIntent, NotificationPriority};

use self::profile::CareerProfile;
use self::scoring::{
    identify_skill_gaps, qualifying_jobs, rank_trends, recommendations, same_posting,
    RankedTrend, SkillGap,
};
use self::sources::{
    JobCandidate, Opportunity, OpportunitySource, StaticOpportunitySource, StaticTrendSource,
    TrendSource,
};

/// Name and task namespace of the career agent.
pub const CAREER_AGENT_NAME: &str = "career";

const REQUIRED_PERMISSIONS: &[&str] = &["internet", "calendar_read"];

/// Loop periods and the opportunity cut-off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CareerConfig {
    /// Period of trend analysis and recommendation emission.
    pub trend_interval_secs: u64,
    /// Period of opportunity search and skill-gap refresh.
    pub opportunity_interval_secs: u64,
    /// Jobs must score strictly above this to be kept.
    pub opportunity_threshold: f64,
    /// Whether recommendations are also pushed as notifications.
    pub notify_recommendations: bool,
}

impl Default for CareerConfig {
    fn default() -> Self {
        Self {
            trend_interval_secs: 86_400,
            opportunity_interval_secs: 3_600,
            opportunity_threshold: 0.75,
            notify_recommendations: true,
        }
    }
}

impl CareerConfig {
    /// Trend loop period.
    #[must_use]
    pub fn trend_interval(&self) -> Duration {
        Duration::from_secs(self.trend_interval_secs.max(1))
    }

    /// Opportunity loop period.
    #[must_use]
    pub fn opportunity_interval(&self) -> Duration {
        Duration::from_secs(self.opportunity_interval_secs.max(1))
    }
}

/// Result of a full trend analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CareerAnalysis {
    /// Analysed industry.
    pub industry: String,
    /// Ranked trends.
    pub trends: Vec<RankedTrend>,
    /// Top skill gaps.
    pub skill_gaps: Vec<SkillGap>,
    /// Opportunities found in this run: qualifying jobs best first, then projects,
    /// then events.
    pub opportunities: Vec<Opportunity>,
    /// Actionable recommendation lines.
    pub recommendations: Vec<String>,
}

#[derive(Debug, Default)]
struct CareerState {
    trends: Vec<RankedTrend>,
    skill_gaps: Vec<SkillGap>,
    opportunities: Vec<JobCandidate>,
}

/// Agent tracking industry trends against a static profile.
pub struct CareerAgent {
    context: AgentContext,
    config: CareerConfig,
    profile: CareerProfile,
    trend_source: Arc<dyn TrendSource>,
    opportunity_source: Arc<dyn OpportunitySource>,
    state: Mutex<CareerState>,
}

impl std::fmt::Debug for CareerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CareerAgent")
            .field("profile", &self.profile)
            .field("trend_source", &self.trend_source.name())
            .field("opportunity_source", &self.opportunity_source.name())
            .finish_non_exhaustive()
    }
}

impl CareerAgent {
    /// Creates the agent with the static trend and job catalogues.
    #[must_use]
    pub fn new(context: AgentContext, profile: CareerProfile, config: CareerConfig) -> Self {
        Self {
            context,
            config,
            profile,
            trend_source: Arc::new(StaticTrendSource::default()),
            opportunity_source: Arc::new(StaticOpportunitySource::default()),
            state: Mutex::new(CareerState::default()),
        }
    }

    /// Replaces the trend source.
    #[must_use]
    pub fn with_trend_source(mut self, source: Arc<dyn TrendSource>) -> Self {
        self.trend_source = source;
        self
    }

    /// Replaces the job source.
    #[must_use]
    pub fn with_opportunity_source(mut self, source: Arc<dyn OpportunitySource>) -> Self {
        self.opportunity_source = source;
        self
    }

    /// Profile being matched.
    #[must_use]
    pub const fn profile(&self) -> &CareerProfile {
        &self.profile
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CareerConfig {
        &self.config
    }

    /// Last ranked trend list.
    #[must_use]
    pub fn ranked_trends(&self) -> Vec<RankedTrend> {
        self.state.lock().trends.clone()
    }

    /// Last computed skill gaps.
    #[must_use]
    pub fn skill_gaps(&self) -> Vec<SkillGap> {
        self.state.lock().skill_gaps.clone()
    }

    /// Accumulated, de-duplicated opportunities in discovery order.
    #[must_use]
    pub fn opportunities(&self) -> Vec<JobCandidate> {
        self.state.lock().opportunities.clone()
    }

    /// Fetches and ranks trends for the profile's industry.
    ///
    /// # Errors
    ///
    /// Propagates trend source failures.
    pub async fn refresh_trends(&self) -> Result<Vec<RankedTrend>, AgentError> {
        self.log_data_access("career_profile", "Match industry trends to skills and interests");
        let candidates = self
            .trend_source
            .fetch_trends(&self.profile.industry)
            .await?;
        let ranked = rank_trends(&candidates, &self.profile);
        self.state.lock().trends.clone_from(&ranked);
        Ok(ranked)
    }

    /// Recomputes skill gaps from the last ranked trends.
    pub fn refresh_skill_gaps(&self) -> Vec<SkillGap> {
        let mut state = self.state.lock();
        state.skill_gaps = identify_skill_gaps(&state.trends, &self.profile);
        state.skill_gaps.clone()
    }

    /// Searches jobs for the last ranked trends, keeping those above the threshold.
    ///
    /// Survivors are appended to the accumulated list unless already present, and the
    /// best survivor is recorded as a decision. Returns this run's survivors.
    ///
    /// # Errors
    ///
    /// Propagates job source failures.
    pub async fn search_opportunities(&self) -> Result<Vec<JobCandidate>, AgentError> {
        let trends: Vec<_> = self
            .ranked_trends()
            .into_iter()
            .map(|ranked| ranked.trend)
            .collect();
        let jobs = self.opportunity_source.search_jobs(&trends).await?;
        let survivors = qualifying_jobs(jobs, self.config.opportunity_threshold);
        {
            let mut state = self.state.lock();
            for job in &survivors {
                if !state
                    .opportunities
                    .iter()
                    .any(|known| same_posting(known, job))
                {
                    state.opportunities.push(job.clone());
                }
            }
        }
        if let Some(top) = survivors.first() {
            self.log_decision_with(
                "Surface career opportunity",
                &format!(
                    "{} at {} matches the profile at {:.0}%",
                    top.title,
                    top.employer,
                    top.match_score * 100.0
                ),
                top.match_score,
                json!({ "location": top.location, "skills_match": top.skills_match }),
            );
        }
        Ok(survivors)
    }

    /// Side projects and networking events for the last ranked trends.
    ///
    /// # Errors
    ///
    /// Propagates opportunity source failures.
    pub async fn discover_growth_opportunities(&self) -> Result<Vec<Opportunity>, AgentError> {
        let trends: Vec<_> = self
            .ranked_trends()
            .into_iter()
            .map(|ranked| ranked.trend)
            .collect();
        let projects = self.opportunity_source.suggest_projects(&trends).await?;
        let events = self.opportunity_source.find_events(&trends).await?;
        Ok(projects
            .into_iter()
            .map(Opportunity::Project)
            .chain(events.into_iter().map(Opportunity::Event))
            .collect())
    }

    /// Full pass: rank trends, derive gaps, search jobs, projects and events, build
    /// recommendations.
    ///
    /// # Errors
    ///
    /// Propagates trend or opportunity source failures.
    pub async fn analyze_trends(&self) -> Result<CareerAnalysis, AgentError> {
        let trends = self.refresh_trends().await?;
        let skill_gaps = self.refresh_skill_gaps();
        let jobs = self.search_opportunities().await?;
        let recommendations = recommendations(&trends, &skill_gaps, &jobs);
        let opportunities: Vec<Opportunity> = jobs
            .into_iter()
            .map(Opportunity::Job)
            .chain(self.discover_growth_opportunities().await?)
            .collect();
        if !recommendations.is_empty() {
            let confidence = trends.first().map_or(0.0, |top| top.match_score);
            self.log_decision_with(
                "Generate career recommendations",
                &format!(
                    "{} ranked trends and {} skill gaps for {}",
                    trends.len(),
                    skill_gaps.len(),
                    self.profile.industry
                ),
                confidence,
                json!({ "recommendations": recommendations }),
            );
        }
        let _ = self.context.telemetry().event(
            "career.analysis.completed",
            json!({
                "trends": trends.len(),
                "skill_gaps": skill_gaps.len(),
                "opportunities": opportunities.len(),
            }),
        );
        Ok(CareerAnalysis {
            industry: self.profile.industry.clone(),
            trends,
            skill_gaps,
            opportunities,
            recommendations,
        })
    }

    async fn run_daily(&self) -> Result<(), AgentError> {
        let analysis = self.analyze_trends().await?;
        if self.config.notify_recommendations && !analysis.recommendations.is_empty() {
            let intent = NotificationIntent::new(
                self.name(),
                "career",
                "Career Insights",
                analysis.recommendations.join("\n"),
            )
            .with_priority(NotificationPriority::Low)
            .with_data(json!({ "industry": analysis.industry }));
            self.context.notifier().notify(intent).await?;
        }
        Ok(())
    }

    async fn run_hourly(&self) -> Result<(), AgentError> {
        if self.state.lock().trends.is_empty() {
            self.refresh_trends().await?;
        }
        self.search_opportunities().await?;
        self.refresh_skill_gaps();
        Ok(())
    }

    fn report_failure(&self, cycle: &str, err: &AgentError) {
        warn!(agent = self.name(), cycle, error = %err, "career cycle failed");
        let _ = self.context.telemetry().log(
            LogLevel::Warn,
            "career.cycle.failed",
            json!({ "cycle": cycle, "error": err.to_string() }),
        );
    }
}

#[async_trait]
impl Agent for CareerAgent {
    fn name(&self) -> &str {
        CAREER_AGENT_NAME
    }

    fn category(&self) -> AgentCategory {
        AgentCategory::Career
    }

    fn required_permissions(&self) -> &'static [&'static str] {
        REQUIRED_PERMISSIONS
    }

    fn context(&self) -> &AgentContext {
        &self.context
    }

    async fn on_sensor_data(&self, _snapshot: Arc<SensorSnapshot>) -> Result<(), AgentError> {
        Ok(())
    }

    async fn process(&self) -> Result<(), AgentError> {
        let stop = self.context.stop_token();
        let mut daily = periodic(self.config.trend_interval());
        let mut hourly = periodic(self.config.opportunity_interval());
        info!(agent = self.name(), "career loops started");
        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                _ = daily.tick() => {
                    if let Err(err) = self.run_daily().await {
                        self.report_failure("daily", &err);
                    }
                }
                _ = hourly.tick() => {
                    if let Err(err) = self.run_hourly().await {
                        self.report_failure("hourly", &err);
                    }
                }
            }
        }
        info!(agent = self.name(), "career loops stopped");
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sifiso_audit::{AuditLog, LogType};

    use super::sources::TrendCandidate;
    use crate::notification::Notifier;

    struct FailingTrends;

    #[async_trait]
    impl TrendSource for FailingTrends {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch_trends(&self, _industry: &str) -> Result<Vec<TrendCandidate>, AgentError> {
            Err(AgentError::source_failure("failing", "feed unavailable"))
        }
    }

    fn agent() -> CareerAgent {
        CareerAgent::new(
            AgentContext::detached(AuditLog::default()),
            CareerProfile::default(),
            CareerConfig::default(),
        )
    }

    #[tokio::test]
    async fn analysis_matches_reference_profile() {
        let agent = agent();
        let analysis = agent.analyze_trends().await.unwrap();
        assert_eq!(analysis.industry, "technology");
        assert_eq!(analysis.trends[0].trend.name, "On-device AI");
        assert_eq!(analysis.skill_gaps.len(), 5);
        let kinds: Vec<&str> = analysis.opportunities.iter().map(Opportunity::kind).collect();
        assert_eq!(kinds, vec!["job", "project", "event"]);
        assert_eq!(analysis.opportunities[1].title(), "Build a privacy-first mobile app");
        assert_eq!(
            analysis.recommendations[2],
            "Consider: Senior AI Engineer - On-Device ML (match: 85%)"
        );
        let decisions: Vec<String> = agent
            .context()
            .audit()
            .all()
            .into_iter()
            .filter(|entry| entry.log_type == LogType::AiDecision)
            .map(|entry| entry.message)
            .collect();
        assert_eq!(
            decisions,
            vec![
                "Surface career opportunity".to_string(),
                "Generate career recommendations".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn projects_and_events_follow_qualifying_jobs() {
        let agent = agent().with_opportunity_source(Arc::new(
            StaticOpportunitySource::new(Vec::new()).with_events(vec![
                super::sources::NetworkingEvent {
                    title: "Privacy Engineering Day".to_string(),
                    date: "2026-12-01".to_string(),
                    location: "Berlin".to_string(),
                    relevance: 0.7,
                    attendees: 300,
                },
            ]),
        ));
        let analysis = agent.analyze_trends().await.unwrap();
        assert_eq!(analysis.opportunities.len(), 1);
        assert!(matches!(
            &analysis.opportunities[0],
            Opportunity::Event(event) if event.location == "Berlin"
        ));
        assert_eq!(analysis.recommendations.len(), 2);
        assert!(agent.opportunities().is_empty());
    }

    #[tokio::test]
    async fn opportunities_are_deduplicated() {
        let agent = agent();
        agent.refresh_trends().await.unwrap();
        agent.search_opportunities().await.unwrap();
        agent.search_opportunities().await.unwrap();
        assert_eq!(agent.opportunities().len(), 1);
    }

    #[tokio::test]
    async fn low_scoring_jobs_are_dropped() {
        let agent = agent().with_opportunity_source(Arc::new(StaticOpportunitySource::new(vec![
            JobCandidate {
                title: "Junior Analyst".to_string(),
                employer: "Elsewhere".to_string(),
                location: "Office".to_string(),
                match_score: 0.5,
                skills_match: Vec::new(),
                posted_days_ago: 10,
            },
        ])));
        assert!(agent.search_opportunities().await.unwrap().is_empty());
        assert!(agent.context().audit().is_empty());
    }

    #[tokio::test]
    async fn source_failure_is_reported() {
        let agent = agent().with_trend_source(Arc::new(FailingTrends));
        let err = agent.analyze_trends().await.unwrap_err();
        assert!(matches!(err, AgentError::Source { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn loops_survive_failures_and_stop() {
        let (notifier, bus) = Notifier::in_memory(8);
        let context = AgentContext::new(
            AuditLog::default(),
            notifier,
            crate::telemetry::RuntimeTelemetry::builder("career")
                .memory_log()
                .build()
                .unwrap(),
        );
        let agent = Arc::new(
            CareerAgent::new(
                context,
                CareerProfile::default(),
                CareerConfig {
                    trend_interval_secs: 10,
                    opportunity_interval_secs: 4,
                    ..CareerConfig::default()
                },
            )
            .with_trend_source(Arc::new(FailingTrends)),
        );
        let runner = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.process().await })
        };
        tokio::time::sleep(Duration::from_secs(11)).await;
        agent.stop();
        runner.await.unwrap().unwrap();
        let failures = agent
            .context()
            .telemetry()
            .records()
            .into_iter()
            .filter(|record| record.message == "career.cycle.failed")
            .count();
        assert_eq!(failures, 3);
        assert!(bus.snapshot().is_empty());
    }
}
