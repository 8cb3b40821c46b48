use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sifiso_agents::{CareerConfig, CareerProfile, WellnessConfig};
use sifiso_audit::AuditConfig;
use sifiso_sensors::SensorStreamConfig;

use crate::orchestrator::OrchestratorConfig;

/// Capabilities granted when the document names none.
pub const DEFAULT_GRANTS: [&str; 6] = [
    "body_sensors",
    "activity_recognition",
    "health_connect",
    "notifications",
    "internet",
    "calendar_read",
];

/// Career agent settings plus the user profile it scores against.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CareerSection {
    /// Loop periods and thresholds.
    #[serde(flatten)]
    pub agent: CareerConfig,
    /// User profile.
    pub profile: CareerProfile,
}

/// Static permission grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PermissionsConfig {
    /// Granted capability names.
    pub granted: Vec<String>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            granted: DEFAULT_GRANTS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Whole runtime configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SifisoConfig {
    /// Sensor stream tunables.
    pub sensors: SensorStreamConfig,
    /// Audit log tunables.
    pub audit: AuditConfig,
    /// Wellness agent thresholds.
    pub wellness: WellnessConfig,
    /// Career agent settings and profile.
    pub career: CareerSection,
    /// Orchestrator tuning.
    pub orchestrator: OrchestratorConfig,
    /// Permission grants.
    pub permissions: PermissionsConfig,
}

impl SifisoConfig {
    /// Loads and validates a TOML document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading sifiso config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses and validates a TOML string. Missing fields take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects zero periods and capacities and thresholds outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        let sensors = &self.sensors;
        positive("sensors.tick_ms", sensors.tick_ms)?;
        positive("sensors.history_capacity", sensors.history_capacity)?;
        positive("sensors.history_max_age_secs", sensors.history_max_age_secs)?;
        positive("sensors.subscriber_buffer", sensors.subscriber_buffer)?;

        positive("audit.recent_window", self.audit.recent_window)?;
        positive("audit.subscriber_buffer", self.audit.subscriber_buffer)?;
        positive("audit.retention_interval_secs", self.audit.retention_interval_secs)?;
        if self.audit.retention_days == Some(0) {
            bail!("audit.retention_days must be at least 1 when set");
        }

        let wellness = &self.wellness;
        positive("wellness.sitting_threshold_minutes", wellness.sitting_threshold_minutes)?;
        positive("wellness.sitting_cooldown_minutes", wellness.sitting_cooldown_minutes)?;
        positive("wellness.extended_sitting_minutes", wellness.extended_sitting_minutes)?;
        positive("wellness.hydration_interval_minutes", wellness.hydration_interval_minutes)?;
        positive("wellness.pattern_interval_secs", wellness.pattern_interval_secs)?;
        positive("wellness.stress_window_hours", wellness.stress_window_hours)?;
        positive("wellness.pattern_recent_readings", wellness.pattern_recent_readings)?;
        positive("wellness.trend_window_minutes", wellness.trend_window_minutes)?;
        if let Some(cooldown) = wellness.stress_cooldown_minutes {
            positive("wellness.stress_cooldown_minutes", cooldown)?;
        }
        unit("wellness.hydration_threshold", wellness.hydration_threshold)?;
        unit("wellness.low_activity_threshold", wellness.low_activity_threshold)?;
        if wellness.pattern_ratio.is_nan() || wellness.pattern_ratio <= 0.0 {
            bail!("wellness.pattern_ratio must be positive");
        }
        if wellness.sleep_target_hours.is_nan()
            || wellness.sleep_target_hours <= 0.0
            || wellness.average_sleep_hours.is_nan()
        {
            bail!("wellness sleep hours must be positive numbers");
        }

        let career = &self.career.agent;
        positive("career.trend_interval_secs", career.trend_interval_secs)?;
        positive("career.opportunity_interval_secs", career.opportunity_interval_secs)?;
        unit("career.opportunity_threshold", career.opportunity_threshold)?;

        positive(
            "orchestrator.shutdown_grace_ms",
            self.orchestrator.shutdown_grace_ms,
        )?;
        if self.permissions.granted.iter().any(|grant| grant.trim().is_empty()) {
            bail!("permissions.granted contains an empty entry");
        }
        Ok(())
    }
}

fn positive<T>(name: &str, value: T) -> Result<()>
where
    T: PartialOrd + Default + Copy + std::fmt::Display,
{
    if value <= T::default() {
        bail!("{name} must be positive (got {value})");
    }
    Ok(())
}

fn unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{name} must lie in [0, 1] (got {value})");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = SifisoConfig::from_toml_str("").unwrap();
        assert_eq!(config, SifisoConfig::default());
        assert_eq!(config.permissions.granted.len(), DEFAULT_GRANTS.len());
        assert_eq!(config.career.profile.industry, "technology");
    }

    #[test]
    fn sample_document_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/sifiso.toml");
        let config = SifisoConfig::load(path).unwrap();
        assert_eq!(config.sensors.tick_ms, 1_000);
        assert_eq!(config.wellness.sitting_threshold_minutes, 90);
        assert_eq!(config.wellness.stress_cooldown_minutes, None);
        assert!((config.career.agent.opportunity_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.career.profile.experience_years, 5);
        assert!(config
            .permissions
            .granted
            .iter()
            .any(|grant| grant == "body_sensors"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SifisoConfig::from_toml_str(
            r#"
            [wellness]
            stress_cooldown_minutes = 15

            [career]
            opportunity_threshold = 0.6

            [career.profile]
            industry = "healthcare"
            "#,
        )
        .unwrap();
        assert_eq!(config.wellness.stress_cooldown_minutes, Some(15));
        assert_eq!(config.wellness.hydration_interval_minutes, 120);
        assert!((config.career.agent.opportunity_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.career.agent.trend_interval_secs, 86_400);
        assert_eq!(config.career.profile.industry, "healthcare");
    }

    #[test]
    fn inconsistent_values_are_rejected() {
        for raw in [
            "[sensors]\ntick_ms = 0",
            "[sensors]\nsubscriber_buffer = 0",
            "[wellness]\nhydration_threshold = 1.5",
            "[wellness]\npattern_interval_secs = 0",
            "[wellness]\nstress_cooldown_minutes = 0",
            "[career]\nopportunity_threshold = -0.1",
            "[audit]\nretention_days = 0",
            "[audit]\nretention_interval_secs = 0",
            "[permissions]\ngranted = [\"\"]",
        ] {
            assert!(SifisoConfig::from_toml_str(raw).is_err(), "accepted {raw}");
        }
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = SifisoConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }
}
