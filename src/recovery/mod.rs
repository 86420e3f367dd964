pub mod builtin;
pub mod history;
pub mod state;
pub mod strategy;

pub use builtin::standard_registry;
pub use history::{HistoryEntry, OrchestratorStatistics, RecoveryHistory};
pub use state::{AttemptState, AttemptStateSnapshot, AttemptStateStore, EpisodeKey};
pub use strategy::{
    RecoveryStrategy, StrategyContext, StrategyDescriptor, StrategyOutcome, StrategyParams,
    StrategyRegistry,
};

use crate::classify::{Classification, ErrorClassifier};
use crate::config::RecoveryConfig;
use crate::driver::{AutomationDriver, SemanticLocator};
use crate::errors::Result;
use crate::selectors::SelectorHealthTracker;
use crate::types::{ExecutionContext, FailureRecord};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why an episode ended without recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalReason {
    #[serde(rename = "non-recoverable")]
    NonRecoverable,
    #[serde(rename = "max attempts reached")]
    MaxAttemptsReached,
    #[serde(rename = "timeout exceeded")]
    TimeoutExceeded,
    #[serde(rename = "all strategies failed")]
    AllStrategiesFailed,
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TerminalReason::NonRecoverable => "non-recoverable",
            TerminalReason::MaxAttemptsReached => "max attempts reached",
            TerminalReason::TimeoutExceeded => "timeout exceeded",
            TerminalReason::AllStrategiesFailed => "all strategies failed",
        };
        write!(f, "{}", text)
    }
}

/// Outcome of one `recover` call. Always well-formed; the orchestrator never
/// throws for episode outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub recovered: bool,
    pub classification: Classification,
    pub strategy_used: Option<String>,
    pub attempts: u32,
    pub strategies_attempted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TerminalReason>,
}

/// Multi-strategy recovery engine for one automation driver.
///
/// Classifies a failure, walks the taxonomy's strategy list in priority
/// order against the live session, and accounts every attempt against the
/// episode's attempt and timeout budgets.
pub struct RecoveryOrchestrator<D: AutomationDriver> {
    driver: Arc<D>,
    classifier: Arc<ErrorClassifier>,
    selectors: Arc<SelectorHealthTracker>,
    registry: StrategyRegistry<D>,
    semantic: Option<Arc<dyn SemanticLocator<D>>>,
    config: RecoveryConfig,
    states: AttemptStateStore,
    history: RecoveryHistory,
}

impl<D: AutomationDriver> RecoveryOrchestrator<D> {
    /// Build an orchestrator, validating every taxonomy descriptor against
    /// the registered strategy implementations up front.
    pub fn new(
        driver: Arc<D>,
        classifier: Arc<ErrorClassifier>,
        selectors: Arc<SelectorHealthTracker>,
        registry: StrategyRegistry<D>,
        config: RecoveryConfig,
    ) -> Result<Self> {
        for descriptor in classifier.taxonomy().all_descriptors() {
            registry.validate_descriptor(descriptor)?;
        }
        let history = RecoveryHistory::new(config.max_history);
        Ok(Self {
            driver,
            classifier,
            selectors,
            registry,
            semantic: None,
            config,
            states: AttemptStateStore::new(),
            history,
        })
    }

    pub fn with_semantic_locator(mut self, locator: Arc<dyn SemanticLocator<D>>) -> Self {
        self.semantic = Some(locator);
        self
    }

    /// Run one recovery pass for a failed operation.
    pub async fn recover(
        &self,
        session: &D::Session,
        failure: &FailureRecord,
        context: &ExecutionContext,
    ) -> RecoveryResult {
        let classification = self.classifier.classify(failure, context);
        let key = EpisodeKey::new(&context.client_id, &context.operation);

        if !classification.recoverable {
            info!(
                key = %key,
                classification = %classification.label(),
                "failure is non-recoverable, surfacing immediately"
            );
            let attempts = self.states.get(&key).map(|s| s.attempts).unwrap_or(0);
            return RecoveryResult {
                success: false,
                recovered: false,
                classification,
                strategy_used: None,
                attempts,
                strategies_attempted: vec![],
                reason: Some(TerminalReason::NonRecoverable),
            };
        }

        let mut state = self.states.load_or_create(&key);

        if state.attempts >= self.config.max_recovery_attempts {
            warn!(key = %key, attempts = state.attempts, "recovery attempt ceiling reached");
            return self.terminal(classification, &state, TerminalReason::MaxAttemptsReached);
        }

        if state.elapsed_ms() > self.config.recovery_timeout_ms {
            warn!(key = %key, elapsed_ms = state.elapsed_ms(), "recovery episode timed out");
            return self.terminal(classification, &state, TerminalReason::TimeoutExceeded);
        }

        let descriptors = self.classifier.strategies_for(&classification);
        let episode_started = Instant::now();
        let mut mid_loop_reason = None;

        for descriptor in &descriptors {
            if state.strategies_attempted.iter().any(|n| n == &descriptor.name) {
                debug!(key = %key, strategy = %descriptor.name, "strategy already attempted, skipping");
                continue;
            }
            let Some(strategy) = self.registry.get(&descriptor.name) else {
                debug!(key = %key, strategy = %descriptor.name, "no implementation registered, skipping");
                continue;
            };

            let remaining = self.remaining_budget(&state);
            if remaining.is_zero() {
                mid_loop_reason = Some(TerminalReason::TimeoutExceeded);
                break;
            }
            if state.attempts >= self.config.max_recovery_attempts {
                mid_loop_reason = Some(TerminalReason::MaxAttemptsReached);
                break;
            }

            state.attempts += 1;
            state.strategies_attempted.push(descriptor.name.clone());
            self.states.store(&key, state.clone());

            info!(
                key = %key,
                strategy = %descriptor.name,
                attempt = state.attempts,
                "executing recovery strategy"
            );

            let strategy_ctx = StrategyContext {
                driver: self.driver.as_ref(),
                session,
                failure,
                classification: &classification,
                exec: context,
                params: &descriptor.params,
                selectors: self.selectors.as_ref(),
                semantic: self.semantic.as_deref(),
                remaining_budget: remaining,
                locator_timeout_ms: self.selectors.config().check_timeout_ms,
            };

            // A strategy may never outlive the episode budget.
            let execution = tokio::time::timeout(remaining, strategy.execute(&strategy_ctx)).await;

            match execution {
                Ok(Ok(outcome)) if outcome.success => {
                    info!(
                        key = %key,
                        strategy = %descriptor.name,
                        attempts = state.attempts,
                        "recovery succeeded"
                    );
                    self.states.clear(&key);
                    self.append_history(&classification, context, &state, true, Some(&descriptor.name), episode_started);
                    return RecoveryResult {
                        success: true,
                        recovered: true,
                        classification,
                        strategy_used: Some(descriptor.name.clone()),
                        attempts: state.attempts,
                        strategies_attempted: state.strategies_attempted.clone(),
                        reason: None,
                    };
                }
                Ok(Ok(outcome)) => {
                    debug!(key = %key, strategy = %descriptor.name, message = %outcome.message,
                        "strategy did not resolve the failure");
                }
                Ok(Err(e)) => {
                    // A faulty strategy is a non-match, never an episode abort.
                    warn!(key = %key, strategy = %descriptor.name, error = %e, "strategy execution errored");
                }
                Err(_) => {
                    warn!(key = %key, strategy = %descriptor.name, "strategy hit the episode budget");
                }
            }
        }

        let reason = mid_loop_reason.unwrap_or(TerminalReason::AllStrategiesFailed);
        warn!(key = %key, reason = %reason, attempts = state.attempts, "recovery episode failed");
        // State is kept: later failures of the same key accumulate toward
        // the ceilings instead of starting over.
        self.append_history(&classification, context, &state, false, None, episode_started);
        RecoveryResult {
            success: false,
            recovered: false,
            classification,
            strategy_used: None,
            attempts: state.attempts,
            strategies_attempted: state.strategies_attempted.clone(),
            reason: Some(reason),
        }
    }

    pub fn clear_state(&self, client_id: &str, operation: &str) -> bool {
        self.states.clear(&EpisodeKey::new(client_id, operation))
    }

    pub fn clear_client_states(&self, client_id: &str) -> usize {
        self.states.clear_client(client_id)
    }

    pub fn inject_state(&self, key: EpisodeKey, state: AttemptState) {
        self.states.inject(key, state);
    }

    pub fn attempt_state(&self, client_id: &str, operation: &str) -> Option<AttemptState> {
        self.states.get(&EpisodeKey::new(client_id, operation))
    }

    pub fn attempt_states(&self) -> Vec<AttemptStateSnapshot> {
        self.states.snapshots()
    }

    pub fn statistics(&self) -> OrchestratorStatistics {
        self.history.statistics()
    }

    pub fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.recent(limit)
    }

    fn remaining_budget(&self, state: &AttemptState) -> Duration {
        let ceiling = Duration::from_millis(self.config.recovery_timeout_ms);
        ceiling.saturating_sub(state.start_time.elapsed())
    }

    fn terminal(
        &self,
        classification: Classification,
        state: &AttemptState,
        reason: TerminalReason,
    ) -> RecoveryResult {
        RecoveryResult {
            success: false,
            recovered: false,
            classification,
            strategy_used: None,
            attempts: state.attempts,
            strategies_attempted: state.strategies_attempted.clone(),
            reason: Some(reason),
        }
    }

    fn append_history(
        &self,
        classification: &Classification,
        context: &ExecutionContext,
        state: &AttemptState,
        success: bool,
        strategy_used: Option<&str>,
        episode_started: Instant,
    ) {
        self.history.append(HistoryEntry {
            episode_id: uuid::Uuid::new_v4().to_string(),
            classification: classification.clone(),
            operation: context.operation.clone(),
            client_id: context.client_id.clone(),
            success,
            attempts: state.attempts,
            strategies_attempted: state.strategies_attempted.clone(),
            strategy_used: strategy_used.map(|s| s.to_string()),
            duration_ms: episode_started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::taxonomy::{CategorySpec, ErrorCategory, Taxonomy};
    use crate::config::ClassifierConfig;
    use crate::selectors::SelectorRecord;
    use crate::testing::{ScriptedDriver, ScriptedSemanticLocator, TestHelper};
    use crate::types::LocatorKind;
    use std::collections::HashMap;

    fn orchestrator_with(
        driver: Arc<ScriptedDriver>,
        tracker: Arc<SelectorHealthTracker>,
    ) -> RecoveryOrchestrator<ScriptedDriver> {
        RecoveryOrchestrator::new(
            driver,
            TestHelper::classifier(),
            tracker,
            standard_registry(),
            RecoveryConfig::default(),
        )
        .unwrap()
    }

    fn register(tracker: &SelectorHealthTracker, id: &str, locator: &str, alternatives: &[&str]) {
        tracker
            .register_selector(SelectorRecord {
                id: id.to_string(),
                locator: locator.to_string(),
                kind: LocatorKind::Css,
                description: format!("{} control", id),
                critical: false,
                alternatives: alternatives.iter().map(|s| s.to_string()).collect(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn non_recoverable_short_circuits_without_strategies() {
        let driver = Arc::new(ScriptedDriver::new());
        let orchestrator = orchestrator_with(driver.clone(), TestHelper::tracker());
        let session = driver.session();

        let failure =
            FailureRecord::new("AutomationError", "Authentication failed: invalid credentials");
        let result = orchestrator
            .recover(&session, &failure, &TestHelper::context("sync_billing"))
            .await;

        assert!(!result.success);
        assert!(!result.recovered);
        assert_eq!(result.reason, Some(TerminalReason::NonRecoverable));
        assert_eq!(result.attempts, 0);
        assert!(result.strategies_attempted.is_empty());
        // No strategy executed, no state created
        assert!(driver.calls().is_empty());
        assert!(orchestrator
            .attempt_state("client-1", "sync_billing")
            .is_none());
    }

    #[tokio::test]
    async fn fallback_selector_recovers_element_drift() {
        let driver = Arc::new(ScriptedDriver::new().with_resolvable("#save-new"));
        let tracker = TestHelper::tracker();
        register(&tracker, "save", "#save-old", &["#save-new"]);

        let orchestrator = orchestrator_with(driver.clone(), tracker);
        let session = driver.session();

        let failure = TestHelper::element_not_found("#save-old");
        let context = TestHelper::context("update_menu").with_locator("#save-old");
        let result = orchestrator.recover(&session, &failure, &context).await;

        assert!(result.success);
        assert!(result.recovered);
        assert_eq!(result.strategy_used.as_deref(), Some("try_fallback_selectors"));
        assert_eq!(result.attempts, 1);
        assert!(result.reason.is_none());

        // Success clears the episode state immediately
        assert!(orchestrator.attempt_state("client-1", "update_menu").is_none());

        let stats = orchestrator.statistics();
        assert_eq!(stats.total_episodes, 1);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.by_strategy["try_fallback_selectors"].succeeded, 1);
    }

    #[tokio::test]
    async fn semantic_fallback_runs_after_registered_alternatives() {
        let driver = Arc::new(ScriptedDriver::new());
        let tracker = TestHelper::tracker();
        register(&tracker, "save", "#save-old", &[]);

        let orchestrator = orchestrator_with(driver.clone(), tracker)
            .with_semantic_locator(Arc::new(ScriptedSemanticLocator::new().with_semantic_hit(true)));
        let session = driver.session();

        let failure = TestHelper::element_not_found("#save-old");
        let context = TestHelper::context("update_menu").with_locator("#save-old");
        let result = orchestrator.recover(&session, &failure, &context).await;

        assert!(result.success);
        assert_eq!(result.strategy_used.as_deref(), Some("semantic_find"));
        assert_eq!(result.attempts, 2);
        assert_eq!(
            result.strategies_attempted,
            vec!["try_fallback_selectors", "semantic_find"]
        );
    }

    #[tokio::test]
    async fn exhausted_episode_keeps_state_and_never_repeats_strategies() {
        let driver = Arc::new(ScriptedDriver::new().with_condition_result(false));
        let orchestrator = orchestrator_with(driver.clone(), TestHelper::tracker());
        let session = driver.session();

        let failure = TestHelper::element_not_found("#gone");
        let context = TestHelper::context("update_menu").with_locator("#gone");

        let first = orchestrator.recover(&session, &failure, &context).await;
        assert!(!first.success);
        assert_eq!(first.reason, Some(TerminalReason::AllStrategiesFailed));
        assert_eq!(first.attempts, 4);

        let mut unique = first.strategies_attempted.clone();
        unique.dedup();
        assert_eq!(unique.len(), first.strategies_attempted.len());

        // Second call skips everything already attempted
        let resolves_before = driver.call_count("resolve_locator");
        let second = orchestrator.recover(&session, &failure, &context).await;
        assert_eq!(second.reason, Some(TerminalReason::AllStrategiesFailed));
        assert_eq!(second.attempts, 4);
        assert_eq!(driver.call_count("resolve_locator"), resolves_before);
    }

    #[tokio::test]
    async fn attempt_ceiling_blocks_further_strategies() {
        let driver = Arc::new(ScriptedDriver::new());
        let orchestrator = orchestrator_with(driver.clone(), TestHelper::tracker());
        let session = driver.session();

        let mut exhausted = AttemptState::new();
        exhausted.attempts = 5;
        exhausted.strategies_attempted = vec!["wait_and_retry".to_string()];
        orchestrator.inject_state(EpisodeKey::new("client-1", "update_menu"), exhausted);

        let failure = TestHelper::element_not_found("#gone");
        let context = TestHelper::context("update_menu").with_locator("#gone");
        let result = orchestrator.recover(&session, &failure, &context).await;

        assert!(!result.success);
        assert_eq!(result.reason, Some(TerminalReason::MaxAttemptsReached));
        assert_eq!(result.attempts, 5);
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn stale_episode_times_out_regardless_of_untried_strategies() {
        let driver = Arc::new(ScriptedDriver::new());
        let orchestrator = orchestrator_with(driver.clone(), TestHelper::tracker());
        let session = driver.session();

        orchestrator.inject_state(
            EpisodeKey::new("client-1", "update_menu"),
            AttemptState::started_ago(61_000),
        );

        let failure = TestHelper::element_not_found("#gone");
        let context = TestHelper::context("update_menu").with_locator("#gone");
        let result = orchestrator.recover(&session, &failure, &context).await;

        assert_eq!(result.reason, Some(TerminalReason::TimeoutExceeded));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn faulty_strategies_are_swallowed_not_propagated() {
        let driver = Arc::new(
            ScriptedDriver::new()
                .with_error_on("resolve_locator")
                .with_condition_result(false),
        );
        let tracker = TestHelper::tracker();
        register(&tracker, "save", "#save-old", &["#save-new"]);

        let orchestrator = orchestrator_with(driver.clone(), tracker);
        let session = driver.session();

        let failure = TestHelper::element_not_found("#save-old");
        let context = TestHelper::context("update_menu").with_locator("#save-old");
        let result = orchestrator.recover(&session, &failure, &context).await;

        // Every strategy errored or missed; the episode still ends cleanly
        assert!(!result.success);
        assert_eq!(result.reason, Some(TerminalReason::AllStrategiesFailed));
        assert_eq!(result.attempts, 4);
    }

    #[tokio::test]
    async fn unknown_strategy_names_are_skipped_without_consuming_attempts() {
        let mut categories = HashMap::new();
        categories.insert(
            ErrorCategory::Unknown,
            CategorySpec {
                recoverable: true,
                strategies: vec![
                    StrategyDescriptor::new("bogus_strategy", 1),
                    StrategyDescriptor::new("reload_page", 2),
                ],
            },
        );
        let taxonomy = Taxonomy::new(categories, HashMap::new(), vec![]);
        let classifier = Arc::new(ErrorClassifier::new(taxonomy, ClassifierConfig::default()));

        let driver = Arc::new(ScriptedDriver::new());
        let orchestrator = RecoveryOrchestrator::new(
            driver.clone(),
            classifier,
            TestHelper::tracker(),
            standard_registry(),
            RecoveryConfig::default(),
        )
        .unwrap();
        let session = driver.session();

        let failure = FailureRecord::new("WeirdError", "zorp gleeb");
        let result = orchestrator
            .recover(&session, &failure, &TestHelper::context("update_menu"))
            .await;

        assert!(result.success);
        assert_eq!(result.strategy_used.as_deref(), Some("reload_page"));
        assert_eq!(result.attempts, 1);
        assert!(!result
            .strategies_attempted
            .contains(&"bogus_strategy".to_string()));
    }

    #[tokio::test]
    async fn success_resets_budget_for_the_next_episode() {
        let driver = Arc::new(ScriptedDriver::new().with_resolvable("#save-new"));
        let tracker = TestHelper::tracker();
        register(&tracker, "save", "#save-old", &["#save-new"]);

        let orchestrator = orchestrator_with(driver.clone(), tracker);
        let session = driver.session();

        let failure = TestHelper::element_not_found("#save-old");
        let context = TestHelper::context("update_menu").with_locator("#save-old");

        let first = orchestrator.recover(&session, &failure, &context).await;
        assert_eq!(first.attempts, 1);

        let second = orchestrator.recover(&session, &failure, &context).await;
        assert_eq!(second.attempts, 1);
        assert!(second.success);
    }

    #[tokio::test]
    async fn mfa_wall_escalates_to_human_with_evidence() {
        let driver = Arc::new(ScriptedDriver::new());
        let orchestrator = orchestrator_with(driver.clone(), TestHelper::tracker());
        let session = driver.session();

        let failure = FailureRecord::new("AutomationError", "MFA verification code required");
        let result = orchestrator
            .recover(&session, &failure, &TestHelper::context("login"))
            .await;

        assert!(result.success);
        assert_eq!(result.strategy_used.as_deref(), Some("notify_human"));
        assert_eq!(result.classification.sub_category, "MFA_REQUIRED");
        assert_eq!(driver.call_count("capture_screenshot"), 1);
    }

    #[tokio::test]
    async fn clear_client_states_drops_only_that_client() {
        let driver = Arc::new(ScriptedDriver::new());
        let orchestrator = orchestrator_with(driver.clone(), TestHelper::tracker());

        orchestrator.inject_state(EpisodeKey::new("client-1", "op_a"), AttemptState::new());
        orchestrator.inject_state(EpisodeKey::new("client-1", "op_b"), AttemptState::new());
        orchestrator.inject_state(EpisodeKey::new("client-2", "op_a"), AttemptState::new());

        assert_eq!(orchestrator.clear_client_states("client-1"), 2);
        assert!(orchestrator.attempt_state("client-2", "op_a").is_some());
        assert_eq!(orchestrator.attempt_states().len(), 1);
    }

    #[test]
    fn terminal_reasons_render_machine_readable_strings() {
        assert_eq!(TerminalReason::NonRecoverable.to_string(), "non-recoverable");
        assert_eq!(
            TerminalReason::MaxAttemptsReached.to_string(),
            "max attempts reached"
        );
        assert_eq!(TerminalReason::TimeoutExceeded.to_string(), "timeout exceeded");
        assert_eq!(
            TerminalReason::AllStrategiesFailed.to_string(),
            "all strategies failed"
        );
    }
}
