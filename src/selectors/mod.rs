pub mod suggest;

pub use suggest::{suggest_selectors, SelectorSuggestion, SuggestionSource};

use crate::config::SelectorConfig;
use crate::driver::AutomationDriver;
use crate::errors::{RemedyError, Result};
use crate::types::LocatorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Instant;
use tracing::{debug, warn};

/// Registered element locator plus its configured fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorRecord {
    pub id: String,
    pub locator: String,
    pub kind: LocatorKind,
    pub description: String,
    /// Critical selectors gate whole operations; their failures matter more
    /// to alerting than cosmetic ones.
    pub critical: bool,
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorStatus {
    Unknown,
    Healthy,
    Warning,
    Critical,
}

/// One check outcome kept in the bounded per-selector history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    pub timestamp: DateTime<Utc>,
    pub found: bool,
    pub duration_ms: u64,
}

/// Result of checking one selector against a live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub selector_id: String,
    pub found: bool,
    /// Which locator actually resolved, when one did.
    pub used_locator: Option<String>,
    pub used_alternative: bool,
    pub duration_ms: u64,
    pub status: SelectorStatus,
}

/// Selector flagged for attention, bundled with its fallbacks so the
/// orchestrator's locator-fallback strategy can consume them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblematicSelector {
    pub record: SelectorRecord,
    pub status: SelectorStatus,
    pub failure_streak: u32,
    pub success_ratio: f64,
}

/// Aggregate health over all registered selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// passed/total x 100
    pub score: f64,
    pub results: Vec<CheckResult>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct SelectorStats {
    check_count: u64,
    success_count: u64,
    failure_streak: u32,
    status: SelectorStatus,
    history: VecDeque<CheckRecord>,
}

impl SelectorStats {
    fn new() -> Self {
        Self {
            check_count: 0,
            success_count: 0,
            failure_streak: 0,
            status: SelectorStatus::Unknown,
            history: VecDeque::new(),
        }
    }

    fn success_ratio(&self) -> f64 {
        if self.check_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.check_count as f64
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedSelector {
    record: SelectorRecord,
    stats: SelectorStats,
}

/// Per-selector snapshot for the health read model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorHealthSnapshot {
    pub record: SelectorRecord,
    pub status: SelectorStatus,
    pub check_count: u64,
    pub success_count: u64,
    pub failure_streak: u32,
    pub success_ratio: f64,
    pub recent_checks: Vec<CheckRecord>,
}

/// Tracks which registered locators still resolve, and how reliably.
///
/// Status derives from the rolling success ratio; the failure streak tracks
/// primary-locator drift separately so a selector kept alive by its
/// alternatives still gets flagged before it fails outright.
pub struct SelectorHealthTracker {
    config: SelectorConfig,
    selectors: RwLock<HashMap<String, TrackedSelector>>,
}

impl SelectorHealthTracker {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            selectors: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Idempotent upsert by id. CSS locators (primary and alternatives) are
    /// syntax-checked; existing statistics survive a config update.
    pub fn register_selector(&self, record: SelectorRecord) -> Result<()> {
        if record.kind == LocatorKind::Css {
            validate_css(&record.locator)?;
            for alternative in &record.alternatives {
                validate_css(alternative)?;
            }
        }

        let mut selectors = self.write_lock();
        match selectors.get_mut(&record.id) {
            Some(tracked) => tracked.record = record,
            None => {
                selectors.insert(
                    record.id.clone(),
                    TrackedSelector {
                        record,
                        stats: SelectorStats::new(),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn get_selector(&self, id: &str) -> Option<SelectorRecord> {
        self.read_lock().get(id).map(|t| t.record.clone())
    }

    /// Look a record up by its primary locator string. Used by the
    /// locator-fallback strategy, which only knows the locator that failed.
    pub fn find_by_locator(&self, locator: &str) -> Option<SelectorRecord> {
        self.read_lock()
            .values()
            .find(|t| t.record.locator == locator)
            .map(|t| t.record.clone())
    }

    pub fn registered_ids(&self) -> Vec<String> {
        self.read_lock().keys().cloned().collect()
    }

    /// Resolve a selector's primary locator, then its alternatives, against
    /// a live session, recording the outcome into the bounded history.
    pub async fn check_selector<D: AutomationDriver>(
        &self,
        driver: &D,
        session: &D::Session,
        id: &str,
    ) -> Result<CheckResult> {
        let record = self
            .get_selector(id)
            .ok_or_else(|| RemedyError::InvalidSelector(format!("unregistered selector: {}", id)))?;

        let started = Instant::now();
        let timeout = self.config.check_timeout_ms;

        let mut found = false;
        let mut used_locator = None;
        let mut used_alternative = false;

        match driver
            .resolve_locator(session, &record.locator, record.kind, timeout)
            .await
        {
            Ok(Some(_)) => {
                found = true;
                used_locator = Some(record.locator.clone());
            }
            Ok(None) => {}
            Err(e) => {
                debug!(selector = %id, error = %e, "primary locator resolution errored");
            }
        }

        if !found {
            for alternative in &record.alternatives {
                match driver
                    .resolve_locator(session, alternative, record.kind, timeout)
                    .await
                {
                    Ok(Some(_)) => {
                        found = true;
                        used_locator = Some(alternative.clone());
                        used_alternative = true;
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!(selector = %id, alternative = %alternative, error = %e,
                            "alternative locator resolution errored");
                    }
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let status = self.record_check(id, found, used_alternative, duration_ms);

        if !found && record.critical {
            warn!(selector = %id, locator = %record.locator, "critical selector unresolved");
        }

        Ok(CheckResult {
            selector_id: id.to_string(),
            found,
            used_locator,
            used_alternative,
            duration_ms,
            status,
        })
    }

    /// Run every registered selector and aggregate a health score.
    pub async fn check_all_selectors<D: AutomationDriver>(
        &self,
        driver: &D,
        session: &D::Session,
    ) -> Result<HealthReport> {
        let mut ids = self.registered_ids();
        ids.sort();

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            results.push(self.check_selector(driver, session, id).await?);
        }

        let total = results.len();
        let passed = results.iter().filter(|r| r.found).count();
        let score = if total == 0 {
            100.0
        } else {
            passed as f64 / total as f64 * 100.0
        };

        Ok(HealthReport {
            total,
            passed,
            failed: total - passed,
            score,
            results,
            timestamp: Utc::now(),
        })
    }

    /// Selectors at warning/critical status or with a failure streak of 3+,
    /// bundled with their alternatives for recovery to consume.
    pub fn problematic_selectors(&self) -> Vec<ProblematicSelector> {
        self.read_lock()
            .values()
            .filter(|t| {
                matches!(
                    t.stats.status,
                    SelectorStatus::Warning | SelectorStatus::Critical
                ) || t.stats.failure_streak >= 3
            })
            .map(|t| ProblematicSelector {
                record: t.record.clone(),
                status: t.stats.status,
                failure_streak: t.stats.failure_streak,
                success_ratio: t.stats.success_ratio(),
            })
            .collect()
    }

    /// Full per-selector snapshot for dashboards.
    pub fn health_report(&self) -> Vec<SelectorHealthSnapshot> {
        self.read_lock()
            .values()
            .map(|t| SelectorHealthSnapshot {
                record: t.record.clone(),
                status: t.stats.status,
                check_count: t.stats.check_count,
                success_count: t.stats.success_count,
                failure_streak: t.stats.failure_streak,
                success_ratio: t.stats.success_ratio(),
                recent_checks: t.stats.history.iter().cloned().collect(),
            })
            .collect()
    }

    /// Configuration-only export: locators, kinds, criticality, alternatives.
    pub fn export_config(&self) -> Vec<SelectorRecord> {
        let mut records: Vec<SelectorRecord> = self
            .read_lock()
            .values()
            .map(|t| t.record.clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Import previously exported configuration. Statistics start fresh at
    /// `Unknown`.
    pub fn import_config(&self, records: Vec<SelectorRecord>) -> Result<()> {
        for record in records {
            let id = record.id.clone();
            self.register_selector(record)?;
            let mut selectors = self.write_lock();
            if let Some(tracked) = selectors.get_mut(&id) {
                tracked.stats = SelectorStats::new();
            }
        }
        Ok(())
    }

    /// Feed a check outcome into the stats and recompute status.
    /// An alternative hit counts as a passing check but extends the primary
    /// failure streak, so drifting primaries surface before total failure.
    fn record_check(
        &self,
        id: &str,
        found: bool,
        used_alternative: bool,
        duration_ms: u64,
    ) -> SelectorStatus {
        let mut selectors = self.write_lock();
        let Some(tracked) = selectors.get_mut(id) else {
            return SelectorStatus::Unknown;
        };

        let stats = &mut tracked.stats;
        stats.check_count += 1;
        if found {
            stats.success_count += 1;
        }
        if found && !used_alternative {
            stats.failure_streak = 0;
        } else {
            stats.failure_streak += 1;
        }

        stats.history.push_back(CheckRecord {
            timestamp: Utc::now(),
            found,
            duration_ms,
        });
        while stats.history.len() > self.config.max_history {
            stats.history.pop_front();
        }

        stats.status = compute_status(
            stats.success_count,
            stats.check_count,
            self.config.warning_threshold,
            self.config.critical_threshold,
        );
        stats.status
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, TrackedSelector>> {
        match self.selectors.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, TrackedSelector>> {
        match self.selectors.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Status is a pure function of the rolling success ratio.
fn compute_status(
    success_count: u64,
    check_count: u64,
    warning_threshold: f64,
    critical_threshold: f64,
) -> SelectorStatus {
    if check_count == 0 {
        return SelectorStatus::Unknown;
    }
    let ratio = success_count as f64 / check_count as f64;
    if ratio >= warning_threshold {
        SelectorStatus::Healthy
    } else if ratio >= critical_threshold {
        SelectorStatus::Warning
    } else {
        SelectorStatus::Critical
    }
}

fn validate_css(locator: &str) -> Result<()> {
    scraper::Selector::parse(locator)
        .map(|_| ())
        .map_err(|e| RemedyError::InvalidSelector(format!("{}: {:?}", locator, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDriver;

    fn record(id: &str, locator: &str, alternatives: &[&str]) -> SelectorRecord {
        SelectorRecord {
            id: id.to_string(),
            locator: locator.to_string(),
            kind: LocatorKind::Css,
            description: format!("{} control", id),
            critical: false,
            alternatives: alternatives.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn tracker() -> SelectorHealthTracker {
        SelectorHealthTracker::new(SelectorConfig::default())
    }

    #[test]
    fn status_thresholds_are_pure() {
        assert_eq!(compute_status(9, 10, 0.9, 0.7), SelectorStatus::Healthy);
        assert_eq!(compute_status(7, 10, 0.9, 0.7), SelectorStatus::Warning);
        assert_eq!(compute_status(6, 10, 0.9, 0.7), SelectorStatus::Critical);
        assert_eq!(compute_status(0, 0, 0.9, 0.7), SelectorStatus::Unknown);
    }

    #[test]
    fn register_rejects_invalid_css() {
        let t = tracker();
        let result = t.register_selector(record("bad", "div[unclosed", &[]));
        assert!(matches!(result, Err(RemedyError::InvalidSelector(_))));
    }

    #[test]
    fn register_is_idempotent_upsert() {
        let t = tracker();
        t.register_selector(record("save", "#save", &[])).unwrap();
        t.register_selector(record("save", "#save-button", &["#save"]))
            .unwrap();
        let stored = t.get_selector("save").unwrap();
        assert_eq!(stored.locator, "#save-button");
        assert_eq!(t.registered_ids().len(), 1);
    }

    #[tokio::test]
    async fn check_uses_alternatives_on_primary_miss() {
        let t = tracker();
        t.register_selector(record("save", "#save-old", &["#save-new"]))
            .unwrap();

        let driver = ScriptedDriver::new().with_resolvable("#save-new");
        let session = driver.session();

        let result = t.check_selector(&driver, &session, "save").await.unwrap();
        assert!(result.found);
        assert!(result.used_alternative);
        assert_eq!(result.used_locator.as_deref(), Some("#save-new"));
    }

    #[tokio::test]
    async fn alternative_hits_extend_primary_failure_streak() {
        let t = tracker();
        t.register_selector(record("save", "#save-old", &["#save-new"]))
            .unwrap();

        let driver = ScriptedDriver::new().with_resolvable("#save-new");
        let session = driver.session();

        for _ in 0..3 {
            let result = t.check_selector(&driver, &session, "save").await.unwrap();
            assert!(result.found);
        }

        let problematic = t.problematic_selectors();
        assert_eq!(problematic.len(), 1);
        assert_eq!(problematic[0].failure_streak, 3);
        // The checks still passed, so status stays healthy
        assert_eq!(problematic[0].status, SelectorStatus::Healthy);
    }

    #[tokio::test]
    async fn statuses_follow_rolling_ratio() {
        let t = tracker();
        t.register_selector(record("flaky", "#flaky", &[])).unwrap();

        let present = ScriptedDriver::new().with_resolvable("#flaky");
        let absent = ScriptedDriver::new();
        let session = present.session();

        for _ in 0..7 {
            t.check_selector(&present, &session, "flaky").await.unwrap();
        }
        for _ in 0..3 {
            t.check_selector(&absent, &session, "flaky").await.unwrap();
        }

        let snapshot = &t.health_report()[0];
        assert_eq!(snapshot.check_count, 10);
        assert_eq!(snapshot.success_count, 7);
        assert_eq!(snapshot.status, SelectorStatus::Warning);
    }

    #[tokio::test]
    async fn aggregate_score_counts_passed_over_total() {
        let t = tracker();
        t.register_selector(record("a", "#a", &[])).unwrap();
        t.register_selector(record("b", "#b", &[])).unwrap();

        let driver = ScriptedDriver::new().with_resolvable("#a");
        let session = driver.session();

        let report = t.check_all_selectors(&driver, &session).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 1);
        assert!((report.score - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn export_import_round_trip_resets_stats() {
        let t = tracker();
        t.register_selector(SelectorRecord {
            id: "save".to_string(),
            locator: "#save".to_string(),
            kind: LocatorKind::Css,
            description: "save button".to_string(),
            critical: true,
            alternatives: vec!["button[data-testid=\"save\"]".to_string()],
        })
        .unwrap();

        let driver = ScriptedDriver::new().with_resolvable("#save");
        let session = driver.session();
        t.check_selector(&driver, &session, "save").await.unwrap();

        let exported = t.export_config();

        let fresh = tracker();
        fresh.import_config(exported.clone()).unwrap();

        let reimported = fresh.get_selector("save").unwrap();
        assert_eq!(reimported.locator, "#save");
        assert_eq!(reimported.kind, LocatorKind::Css);
        assert!(reimported.critical);
        assert_eq!(reimported.alternatives, exported[0].alternatives);

        let snapshot = &fresh.health_report()[0];
        assert_eq!(snapshot.status, SelectorStatus::Unknown);
        assert_eq!(snapshot.check_count, 0);
    }

    #[test]
    fn history_is_bounded_by_config() {
        let t = SelectorHealthTracker::new(SelectorConfig {
            max_history: 5,
            ..Default::default()
        });
        t.register_selector(record("save", "#save", &[])).unwrap();
        for _ in 0..20 {
            t.record_check("save", true, false, 1);
        }
        assert_eq!(t.health_report()[0].recent_checks.len(), 5);
    }
}
