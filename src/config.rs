use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemedyConfig {
    pub recovery: RecoveryConfig,
    pub classifier: ClassifierConfig,
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Ceiling on strategy attempts across one recovery episode.
    pub max_recovery_attempts: u32,
    /// Ceiling in milliseconds across the entire episode, not per strategy.
    pub recovery_timeout_ms: u64,
    /// Bound on retained recovery history entries.
    pub max_history: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Bound on the failure history used for pattern detection.
    pub max_history_size: usize,
    /// Same-page/same-message occurrences within the window that flag a pattern.
    pub pattern_threshold: u32,
    pub pattern_window_ms: u64,
    /// Domains treated as the automated site for site-specific rules.
    pub site_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Bound on retained check records per selector.
    pub max_history: usize,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub check_timeout_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: 5,
            recovery_timeout_ms: 60_000,
            max_history: 1000,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_history_size: 1000,
            pattern_threshold: 3,
            pattern_window_ms: 300_000,
            site_domains: vec![],
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_history: 100,
            warning_threshold: 0.9,
            critical_threshold: 0.7,
            check_timeout_ms: 5000,
        }
    }
}
