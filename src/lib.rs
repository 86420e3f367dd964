pub mod chrome;
pub mod classify;
pub mod config;
pub mod driver;
pub mod errors;
pub mod recovery;
pub mod selectors;
pub mod testing;
pub mod types;

pub use classify::{Classification, ClassifierStatistics, ErrorCategory, ErrorClassifier, Taxonomy};
pub use config::{ClassifierConfig, RecoveryConfig, RemedyConfig, SelectorConfig};
pub use driver::{AutomationDriver, SemanticLocator};
pub use errors::{RemedyError, Result};
pub use recovery::{
    standard_registry, RecoveryOrchestrator, RecoveryResult, StrategyDescriptor, StrategyParams,
    StrategyRegistry, TerminalReason,
};
pub use selectors::{SelectorHealthTracker, SelectorRecord, SelectorStatus};
pub use types::*;
