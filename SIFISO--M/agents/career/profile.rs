use serde::{Deserialize, Serialize};

/// Static user profile the career agent matches against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CareerProfile {
    /// Industry whose trends are fetched.
    pub industry: String,
    /// Current skills.
    pub skills: Vec<String>,
    /// Interests matched against trend names.
    pub interests: Vec<String>,
    /// Years of experience.
    pub experience_years: u32,
    /// Free-form career goals.
    pub goals: Vec<String>,
}

impl Default for CareerProfile {
    fn default() -> Self {
        Self {
            industry: "technology".to_string(),
            skills: vec![
                "python".to_string(),
                "machine_learning".to_string(),
                "mobile_development".to_string(),
            ],
            interests: vec![
                "AI".to_string(),
                "privacy".to_string(),
                "health_tech".to_string(),
            ],
            experience_years: 5,
            goals: vec!["AI Architect within 2 years".to_string()],
        }
    }
}

impl CareerProfile {
    /// Whether any held skill matches `skill` (case-insensitive substring, either direction).
    #[must_use]
    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|held| loosely_matches(held, skill))
    }

    /// Whether any interest appears in `text` (case-insensitive).
    #[must_use]
    pub fn interested_in(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.interests
            .iter()
            .any(|interest| !interest.is_empty() && text.contains(&interest.to_lowercase()))
    }
}

/// Case-insensitive substring match in either direction. Empty strings never match.
#[must_use]
pub fn loosely_matches(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_matching_works_both_ways() {
        assert!(loosely_matches("Machine_Learning", "machine_learning"));
        assert!(loosely_matches("security", "network_security"));
        assert!(loosely_matches("network_security", "security"));
        assert!(!loosely_matches("", "security"));
        assert!(!loosely_matches("python", "cryptography"));
    }

    #[test]
    fn default_profile_interests() {
        let profile = CareerProfile::default();
        assert!(profile.interested_in("Privacy-First Technology"));
        assert!(!profile.interested_in("Edge Computing"));
        assert!(profile.has_skill("machine_learning"));
    }
}
