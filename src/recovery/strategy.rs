use crate::classify::Classification;
use crate::driver::{AutomationDriver, SemanticLocator};
use crate::errors::{RemedyError, Result};
use crate::selectors::SelectorHealthTracker;
use crate::types::{ExecutionContext, FailureRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A named, parameterized recovery action from the taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub name: String,
    /// Lower runs first.
    pub priority: u32,
    #[serde(default)]
    pub params: StrategyParams,
}

impl StrategyDescriptor {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            params: StrategyParams::None,
        }
    }

    pub fn with_params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }
}

/// Parameter set for a strategy, one shape per strategy family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyParams {
    #[default]
    None,
    Retry {
        max_retries: u32,
        initial_delay_ms: u64,
        backoff: f64,
    },
    Reauth {
        login_url: Option<String>,
    },
    Locator {
        description: Option<String>,
    },
    Overlay {
        dismiss_selectors: Vec<String>,
    },
    Wait {
        timeout_ms: u64,
        poll_interval_ms: u64,
        condition: Option<String>,
    },
    SitePoll {
        check_expr: String,
        timeout_ms: u64,
        poll_interval_ms: u64,
    },
    Notify {
        channel: String,
        capture_screenshot: bool,
        skip_operation: bool,
    },
}

/// Result of one strategy execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub execution_time_ms: u64,
}

impl StrategyOutcome {
    pub fn resolved(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            execution_time_ms: 0,
        }
    }

    pub fn unresolved(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            execution_time_ms: 0,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_execution_time(mut self, time_ms: u64) -> Self {
        self.execution_time_ms = time_ms;
        self
    }
}

/// Everything a strategy may consult while repairing a live session.
pub struct StrategyContext<'a, D: AutomationDriver> {
    pub driver: &'a D,
    pub session: &'a D::Session,
    pub failure: &'a FailureRecord,
    pub classification: &'a Classification,
    pub exec: &'a ExecutionContext,
    pub params: &'a StrategyParams,
    pub selectors: &'a SelectorHealthTracker,
    pub semantic: Option<&'a dyn SemanticLocator<D>>,
    /// Episode budget left; a strategy must not block past it.
    pub remaining_budget: Duration,
    /// Default timeout for individual locator resolutions.
    pub locator_timeout_ms: u64,
}

impl<'a, D: AutomationDriver> StrategyContext<'a, D> {
    /// Locator resolution timeout clipped to the remaining episode budget.
    pub fn clipped_timeout(&self, wanted_ms: u64) -> u64 {
        wanted_ms.min(self.remaining_budget.as_millis() as u64)
    }
}

/// Base trait for recovery strategies.
#[async_trait]
pub trait RecoveryStrategy<D: AutomationDriver>: Send + Sync {
    /// Name of the strategy, matched against taxonomy descriptors
    fn name(&self) -> &str;

    /// Description of what the strategy repairs
    fn description(&self) -> &str;

    /// Execute against the live session
    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome>;

    /// Validate descriptor parameters before they reach execution.
    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        let _ = params;
        Ok(())
    }
}

/// Open map from strategy name to executable implementation.
///
/// Descriptors that name nothing registered here are skipped by the
/// orchestrator, not treated as failures.
pub struct StrategyRegistry<D: AutomationDriver> {
    strategies: HashMap<String, Arc<dyn RecoveryStrategy<D>>>,
}

impl<D: AutomationDriver> StrategyRegistry<D> {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    pub fn register<S: RecoveryStrategy<D> + 'static>(&mut self, strategy: S) {
        let name = strategy.name().to_string();
        self.strategies.insert(name, Arc::new(strategy));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RecoveryStrategy<D>>> {
        self.strategies.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Check a taxonomy descriptor against the registered implementation.
    /// Unknown names pass: they are skipped at execution time.
    pub fn validate_descriptor(&self, descriptor: &StrategyDescriptor) -> Result<()> {
        match self.strategies.get(&descriptor.name) {
            Some(strategy) => strategy.validate_params(&descriptor.params).map_err(|e| {
                RemedyError::StrategyRegistration(format!(
                    "invalid params for '{}': {}",
                    descriptor.name, e
                ))
            }),
            None => Ok(()),
        }
    }
}

impl<D: AutomationDriver> Default for StrategyRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}
