pub mod patterns;
pub mod taxonomy;

pub use patterns::{PatternDetector, PatternInfo, PatternSummary};
pub use taxonomy::{CategorySpec, ErrorCategory, MatchRule, SubCategorySpec, Taxonomy};

use crate::config::ClassifierConfig;
use crate::recovery::strategy::StrategyDescriptor;
use crate::types::{ExecutionContext, FailureRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use taxonomy::SUB_UNCLASSIFIED;
use tracing::debug;

/// Outcome of matching a failure against the taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: ErrorCategory,
    pub sub_category: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternInfo>,
}

impl Classification {
    pub fn label(&self) -> String {
        format!("{}/{}", self.category, self.sub_category)
    }
}

/// Read model over what the classifier has seen. No control-flow coupling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierStatistics {
    pub total_classified: u64,
    pub by_category: HashMap<String, u64>,
    pub recorded_failures: usize,
    pub active_patterns: Vec<PatternSummary>,
}

/// Taxonomy-driven failure classifier.
///
/// `classify` is synchronous and does no I/O; its only side effect is the
/// bounded pattern history. It never propagates an error to the caller:
/// anything unmatched degrades to `UNKNOWN/UNCLASSIFIED`.
pub struct ErrorClassifier {
    taxonomy: Taxonomy,
    config: ClassifierConfig,
    patterns: RwLock<PatternDetector>,
    total_classified: RwLock<u64>,
    category_counts: RwLock<HashMap<String, u64>>,
}

impl ErrorClassifier {
    pub fn new(taxonomy: Taxonomy, config: ClassifierConfig) -> Self {
        let detector = PatternDetector::new(
            config.pattern_window_ms,
            config.pattern_threshold,
            config.max_history_size,
        );
        Self {
            taxonomy,
            config,
            patterns: RwLock::new(detector),
            total_classified: RwLock::new(0),
            category_counts: RwLock::new(HashMap::new()),
        }
    }

    pub fn standard(config: ClassifierConfig) -> Self {
        Self::new(Taxonomy::standard(), config)
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Match a failure against the ordered rule set. First match wins;
    /// unmatched failures are `UNKNOWN/UNCLASSIFIED`, recoverable.
    pub fn classify(&self, failure: &FailureRecord, context: &ExecutionContext) -> Classification {
        let lowered = format!("{}: {}", failure.name, failure.message).to_lowercase();

        let (category, sub_category) = self
            .taxonomy
            .rules()
            .iter()
            .find(|rule| rule.matches(failure, context, &lowered, &self.config.site_domains))
            .map(|rule| (rule.category, rule.sub_category.to_string()))
            .unwrap_or((ErrorCategory::Unknown, SUB_UNCLASSIFIED.to_string()));

        let recoverable = self.taxonomy.recoverable(category, &sub_category);
        let pattern = self.record_pattern(failure, context);

        debug!(
            category = %category,
            sub_category = %sub_category,
            recoverable,
            operation = %context.operation,
            "classified failure"
        );

        self.bump_counters(category);

        Classification {
            category,
            sub_category,
            recoverable,
            pattern,
        }
    }

    /// Priority-ordered strategy descriptors for a classification.
    /// Duplicates across the sub/category merge are intentionally kept.
    pub fn strategies_for(&self, classification: &Classification) -> Vec<StrategyDescriptor> {
        self.taxonomy
            .strategies(classification.category, &classification.sub_category)
    }

    pub fn is_recoverable(&self, classification: &Classification) -> bool {
        classification.recoverable
    }

    pub fn statistics(&self) -> ClassifierStatistics {
        let patterns = match self.patterns.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let total = match self.total_classified.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        let by_category = match self.category_counts.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        ClassifierStatistics {
            total_classified: total,
            by_category,
            recorded_failures: patterns.recorded_count(),
            active_patterns: patterns.active_patterns(),
        }
    }

    fn record_pattern(
        &self,
        failure: &FailureRecord,
        context: &ExecutionContext,
    ) -> Option<PatternInfo> {
        let mut patterns = match self.patterns.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        patterns.record(&context.page(), &failure.message)
    }

    fn bump_counters(&self, category: ErrorCategory) {
        if let Ok(mut total) = self.total_classified.write() {
            *total += 1;
        }
        if let Ok(mut counts) = self.category_counts.write() {
            *counts.entry(category.to_string()).or_insert(0) += 1;
        }
    }
}
