use crate::recovery::strategy::{StrategyDescriptor, StrategyParams};
use crate::types::{ExecutionContext, FailureRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Network,
    Auth,
    Element,
    Navigation,
    Data,
    UiState,
    SiteSpecific,
    System,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Network => "NETWORK",
            ErrorCategory::Auth => "AUTH",
            ErrorCategory::Element => "ELEMENT",
            ErrorCategory::Navigation => "NAVIGATION",
            ErrorCategory::Data => "DATA",
            ErrorCategory::UiState => "UI_STATE",
            ErrorCategory::SiteSpecific => "SITE_SPECIFIC",
            ErrorCategory::System => "SYSTEM",
            ErrorCategory::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// Category-level defaults.
#[derive(Debug, Clone)]
pub struct CategorySpec {
    pub recoverable: bool,
    pub strategies: Vec<StrategyDescriptor>,
}

/// Sub-category override. A `recoverable` of `None` inherits the category
/// default; a present flag wins.
#[derive(Debug, Clone)]
pub struct SubCategorySpec {
    pub recoverable: Option<bool>,
    pub strategies: Vec<StrategyDescriptor>,
}

/// One ordered matching rule. All needle groups must be satisfied; a group
/// is satisfied when any of its needles is a substring of the lower-cased
/// "name: message" text.
#[derive(Debug, Clone)]
pub struct MatchRule {
    pub category: ErrorCategory,
    pub sub_category: &'static str,
    pub needle_groups: &'static [&'static [&'static str]],
    /// Rule only applies when the context carries the locator being resolved.
    pub requires_locator: bool,
    /// Rule only applies when the context domain matches the automated site.
    pub site_scoped: bool,
}

impl MatchRule {
    pub fn matches(
        &self,
        _failure: &FailureRecord,
        context: &ExecutionContext,
        lowered: &str,
        site_domains: &[String],
    ) -> bool {
        if self.requires_locator && context.locator.is_none() {
            return false;
        }
        if self.site_scoped {
            let Some(domain) = context.domain() else {
                return false;
            };
            if !site_domains.iter().any(|site| domain.ends_with(site)) {
                return false;
            }
        }
        self.needle_groups
            .iter()
            .all(|group| group.iter().any(|needle| lowered.contains(needle)))
    }
}

/// The full classification table: ordered match rules plus per-category and
/// per-sub-category recoverability and strategy lists.
///
/// Constructed once at startup and passed by reference into the classifier
/// and orchestrator, so independently configured instances can coexist.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: HashMap<ErrorCategory, CategorySpec>,
    sub_categories: HashMap<(ErrorCategory, String), SubCategorySpec>,
    rules: Vec<MatchRule>,
}

pub const SUB_UNCLASSIFIED: &str = "UNCLASSIFIED";

impl Taxonomy {
    pub fn new(
        categories: HashMap<ErrorCategory, CategorySpec>,
        sub_categories: HashMap<(ErrorCategory, String), SubCategorySpec>,
        rules: Vec<MatchRule>,
    ) -> Self {
        Self {
            categories,
            sub_categories,
            rules,
        }
    }

    /// Ordered rules, most-specific-context-first.
    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    pub fn category_spec(&self, category: ErrorCategory) -> Option<&CategorySpec> {
        self.categories.get(&category)
    }

    pub fn sub_category_spec(
        &self,
        category: ErrorCategory,
        sub_category: &str,
    ) -> Option<&SubCategorySpec> {
        self.sub_categories
            .get(&(category, sub_category.to_string()))
    }

    pub fn recoverable(&self, category: ErrorCategory, sub_category: &str) -> bool {
        let category_default = self
            .categories
            .get(&category)
            .map(|spec| spec.recoverable)
            .unwrap_or(true);
        self.sub_category_spec(category, sub_category)
            .and_then(|spec| spec.recoverable)
            .unwrap_or(category_default)
    }

    /// Sub-category strategies first, then category defaults, stable-sorted
    /// ascending by priority. Duplicate names are kept; the orchestrator
    /// skips repeats within an episode.
    pub fn strategies(&self, category: ErrorCategory, sub_category: &str) -> Vec<StrategyDescriptor> {
        let mut merged: Vec<StrategyDescriptor> = Vec::new();
        if let Some(spec) = self.sub_category_spec(category, sub_category) {
            merged.extend(spec.strategies.iter().cloned());
        }
        if let Some(spec) = self.categories.get(&category) {
            merged.extend(spec.strategies.iter().cloned());
        }
        merged.sort_by_key(|descriptor| descriptor.priority);
        merged
    }

    /// Every descriptor in the table, for registration-time validation.
    pub fn all_descriptors(&self) -> impl Iterator<Item = &StrategyDescriptor> {
        self.categories
            .values()
            .flat_map(|spec| spec.strategies.iter())
            .chain(
                self.sub_categories
                    .values()
                    .flat_map(|spec| spec.strategies.iter()),
            )
    }

    /// The standard table for POS back-office automation.
    pub fn standard() -> Self {
        let mut categories = HashMap::new();
        let mut subs: HashMap<(ErrorCategory, String), SubCategorySpec> = HashMap::new();

        let mut sub = |category: ErrorCategory,
                       name: &str,
                       recoverable: Option<bool>,
                       strategies: Vec<StrategyDescriptor>| {
            subs.insert(
                (category, name.to_string()),
                SubCategorySpec {
                    recoverable,
                    strategies,
                },
            );
        };

        categories.insert(
            ErrorCategory::Network,
            CategorySpec {
                recoverable: true,
                strategies: vec![
                    StrategyDescriptor::new("wait_and_retry", 10).with_params(
                        StrategyParams::Retry {
                            max_retries: 3,
                            initial_delay_ms: 1000,
                            backoff: 2.0,
                        },
                    ),
                    StrategyDescriptor::new("reload_page", 20),
                ],
            },
        );
        sub(
            ErrorCategory::Network,
            "TIMEOUT",
            None,
            vec![StrategyDescriptor::new("wait_and_retry", 5).with_params(
                StrategyParams::Retry {
                    max_retries: 3,
                    initial_delay_ms: 2000,
                    backoff: 2.0,
                },
            )],
        );
        sub(ErrorCategory::Network, "CONNECTION", None, vec![]);
        sub(ErrorCategory::Network, "REQUEST_FAILED", None, vec![]);

        categories.insert(
            ErrorCategory::Auth,
            CategorySpec {
                recoverable: true,
                strategies: vec![
                    StrategyDescriptor::new("reauthenticate", 10),
                    StrategyDescriptor::new("refresh_session", 20),
                ],
            },
        );
        sub(
            ErrorCategory::Auth,
            "SESSION_EXPIRED",
            Some(true),
            vec![
                StrategyDescriptor::new("reauthenticate", 5),
                StrategyDescriptor::new("refresh_session", 8),
            ],
        );
        sub(ErrorCategory::Auth, "INVALID_CREDENTIALS", Some(false), vec![]);
        sub(ErrorCategory::Auth, "PERMISSION_DENIED", Some(false), vec![]);
        sub(
            ErrorCategory::Auth,
            "MFA_REQUIRED",
            Some(true),
            vec![StrategyDescriptor::new("notify_human", 5).with_params(
                StrategyParams::Notify {
                    channel: "ops".to_string(),
                    capture_screenshot: true,
                    skip_operation: true,
                },
            )],
        );

        categories.insert(
            ErrorCategory::Element,
            CategorySpec {
                recoverable: true,
                strategies: vec![StrategyDescriptor::new("wait_and_retry", 40).with_params(
                    StrategyParams::Retry {
                        max_retries: 2,
                        initial_delay_ms: 500,
                        backoff: 2.0,
                    },
                )],
            },
        );
        sub(
            ErrorCategory::Element,
            "NOT_FOUND",
            None,
            vec![
                StrategyDescriptor::new("try_fallback_selectors", 10),
                StrategyDescriptor::new("semantic_find", 20)
                    .with_params(StrategyParams::Locator { description: None }),
                StrategyDescriptor::new("visual_find", 30)
                    .with_params(StrategyParams::Locator { description: None }),
            ],
        );
        sub(
            ErrorCategory::Element,
            "NOT_INTERACTABLE",
            None,
            vec![
                StrategyDescriptor::new("scroll_into_view", 10),
                StrategyDescriptor::new("dismiss_overlay", 20),
                StrategyDescriptor::new("wait_for_element_ready", 30).with_params(
                    StrategyParams::Wait {
                        timeout_ms: 10_000,
                        poll_interval_ms: 250,
                        condition: None,
                    },
                ),
                StrategyDescriptor::new("force_interaction", 35),
            ],
        );
        sub(
            ErrorCategory::Element,
            "STALE_REFERENCE",
            None,
            vec![StrategyDescriptor::new("reacquire_element", 10)],
        );

        categories.insert(
            ErrorCategory::Navigation,
            CategorySpec {
                recoverable: true,
                strategies: vec![
                    StrategyDescriptor::new("reload_page", 10),
                    StrategyDescriptor::new("wait_and_retry", 20).with_params(
                        StrategyParams::Retry {
                            max_retries: 2,
                            initial_delay_ms: 1000,
                            backoff: 2.0,
                        },
                    ),
                ],
            },
        );
        sub(
            ErrorCategory::Navigation,
            "LOAD_TIMEOUT",
            None,
            vec![StrategyDescriptor::new("reload_page", 5)],
        );
        sub(
            ErrorCategory::Navigation,
            "UNEXPECTED_REDIRECT",
            None,
            vec![StrategyDescriptor::new("reauthenticate", 5)],
        );

        categories.insert(
            ErrorCategory::Data,
            CategorySpec {
                recoverable: false,
                strategies: vec![],
            },
        );
        sub(ErrorCategory::Data, "MISSING_REQUIRED", Some(false), vec![]);
        sub(ErrorCategory::Data, "VALIDATION_FAILED", Some(false), vec![]);
        sub(ErrorCategory::Data, "PARSE_ERROR", Some(false), vec![]);

        categories.insert(
            ErrorCategory::UiState,
            CategorySpec {
                recoverable: true,
                strategies: vec![
                    StrategyDescriptor::new("dismiss_overlay", 10),
                    StrategyDescriptor::new("wait_for_element_ready", 20).with_params(
                        StrategyParams::Wait {
                            timeout_ms: 10_000,
                            poll_interval_ms: 250,
                            condition: None,
                        },
                    ),
                    StrategyDescriptor::new("reload_page", 30),
                ],
            },
        );
        sub(
            ErrorCategory::UiState,
            "MODAL_BLOCKING",
            None,
            vec![StrategyDescriptor::new("dismiss_overlay", 5)],
        );
        sub(
            ErrorCategory::UiState,
            "LOADING_STUCK",
            None,
            vec![StrategyDescriptor::new("wait_for_element_ready", 5).with_params(
                StrategyParams::Wait {
                    timeout_ms: 15_000,
                    poll_interval_ms: 500,
                    condition: Some("document.readyState === 'complete'".to_string()),
                },
            )],
        );

        categories.insert(
            ErrorCategory::SiteSpecific,
            CategorySpec {
                recoverable: true,
                strategies: vec![StrategyDescriptor::new("wait_and_retry", 20).with_params(
                    StrategyParams::Retry {
                        max_retries: 2,
                        initial_delay_ms: 5000,
                        backoff: 2.0,
                    },
                )],
            },
        );
        sub(
            ErrorCategory::SiteSpecific,
            "LOCATION_LOCKED",
            Some(true),
            vec![
                StrategyDescriptor::new("wait_for_unlock", 5).with_params(StrategyParams::SitePoll {
                    check_expr: "!document.body.innerText.toLowerCase().includes('locked')"
                        .to_string(),
                    timeout_ms: 30_000,
                    poll_interval_ms: 2000,
                }),
                StrategyDescriptor::new("notify_human", 30).with_params(StrategyParams::Notify {
                    channel: "ops".to_string(),
                    capture_screenshot: true,
                    skip_operation: true,
                }),
            ],
        );
        sub(
            ErrorCategory::SiteSpecific,
            "RATE_LIMITED",
            None,
            vec![StrategyDescriptor::new("wait_and_retry", 5).with_params(
                StrategyParams::Retry {
                    max_retries: 2,
                    initial_delay_ms: 15_000,
                    backoff: 2.0,
                },
            )],
        );
        sub(
            ErrorCategory::SiteSpecific,
            "MAINTENANCE",
            Some(true),
            vec![StrategyDescriptor::new("notify_human", 10).with_params(
                StrategyParams::Notify {
                    channel: "ops".to_string(),
                    capture_screenshot: false,
                    skip_operation: true,
                },
            )],
        );

        categories.insert(
            ErrorCategory::System,
            CategorySpec {
                recoverable: false,
                strategies: vec![],
            },
        );
        sub(
            ErrorCategory::System,
            "BROWSER_CRASHED",
            Some(true),
            vec![StrategyDescriptor::new("restart_session", 5)],
        );
        sub(ErrorCategory::System, "OUT_OF_MEMORY", Some(false), vec![]);
        sub(ErrorCategory::System, "DISK_FULL", Some(false), vec![]);

        categories.insert(
            ErrorCategory::Unknown,
            CategorySpec {
                recoverable: true,
                strategies: vec![
                    StrategyDescriptor::new("wait_and_retry", 10).with_params(
                        StrategyParams::Retry {
                            max_retries: 2,
                            initial_delay_ms: 1000,
                            backoff: 2.0,
                        },
                    ),
                    StrategyDescriptor::new("reload_page", 20),
                ],
            },
        );
        sub(ErrorCategory::Unknown, SUB_UNCLASSIFIED, None, vec![]);

        Self::new(categories, subs, standard_rules())
    }
}

/// Ordered rule set: locator-scoped rules first, then site-scoped, then
/// generic message rules. First match wins.
fn standard_rules() -> Vec<MatchRule> {
    vec![
        // Element rules gated on the locator being known
        MatchRule {
            category: ErrorCategory::Element,
            sub_category: "NOT_FOUND",
            needle_groups: &[&[
                "not found",
                "no such element",
                "unable to locate",
                "failed to find",
            ]],
            requires_locator: true,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Element,
            sub_category: "NOT_INTERACTABLE",
            needle_groups: &[&[
                "not interactable",
                "not clickable",
                "intercept",
                "obscured",
                "not visible",
            ]],
            requires_locator: true,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Element,
            sub_category: "STALE_REFERENCE",
            needle_groups: &[&["stale", "detached"]],
            requires_locator: true,
            site_scoped: false,
        },
        // Site-scoped rules
        MatchRule {
            category: ErrorCategory::SiteSpecific,
            sub_category: "LOCATION_LOCKED",
            needle_groups: &[&["locked"]],
            requires_locator: false,
            site_scoped: true,
        },
        MatchRule {
            category: ErrorCategory::SiteSpecific,
            sub_category: "RATE_LIMITED",
            needle_groups: &[&["rate limit", "too many requests", "429"]],
            requires_locator: false,
            site_scoped: true,
        },
        MatchRule {
            category: ErrorCategory::SiteSpecific,
            sub_category: "MAINTENANCE",
            needle_groups: &[&["maintenance", "temporarily unavailable"]],
            requires_locator: false,
            site_scoped: true,
        },
        // Auth
        MatchRule {
            category: ErrorCategory::Auth,
            sub_category: "SESSION_EXPIRED",
            needle_groups: &[&["session"], &["expired", "invalid", "not logged in"]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Auth,
            sub_category: "INVALID_CREDENTIALS",
            needle_groups: &[&[
                "invalid credentials",
                "login failed",
                "incorrect password",
                "authentication failed",
            ]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Auth,
            sub_category: "PERMISSION_DENIED",
            needle_groups: &[&["permission denied", "forbidden", "access denied", "403"]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Auth,
            sub_category: "MFA_REQUIRED",
            needle_groups: &[&["mfa", "two-factor", "verification code"]],
            requires_locator: false,
            site_scoped: false,
        },
        // Navigation before generic network timeout so page-load timeouts
        // classify as navigation failures.
        MatchRule {
            category: ErrorCategory::Navigation,
            sub_category: "LOAD_TIMEOUT",
            needle_groups: &[&["navigation", "page load"], &["timeout", "timed out"]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Navigation,
            sub_category: "UNEXPECTED_REDIRECT",
            needle_groups: &[&["redirect"]],
            requires_locator: false,
            site_scoped: false,
        },
        // Network
        MatchRule {
            category: ErrorCategory::Network,
            sub_category: "TIMEOUT",
            needle_groups: &[&["timeout", "timed out"]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Network,
            sub_category: "CONNECTION",
            needle_groups: &[&[
                "connection refused",
                "connection reset",
                "dns",
                "net::err",
                "socket hang up",
            ]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Network,
            sub_category: "REQUEST_FAILED",
            needle_groups: &[&["network request failed", "fetch failed"]],
            requires_locator: false,
            site_scoped: false,
        },
        // Element rules reachable without a locator in context
        MatchRule {
            category: ErrorCategory::Element,
            sub_category: "NOT_FOUND",
            needle_groups: &[&["element not found", "no such element"]],
            requires_locator: false,
            site_scoped: false,
        },
        // Data
        MatchRule {
            category: ErrorCategory::Data,
            sub_category: "MISSING_REQUIRED",
            needle_groups: &[&["missing required", "required field"]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Data,
            sub_category: "VALIDATION_FAILED",
            needle_groups: &[&["validation"]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::Data,
            sub_category: "PARSE_ERROR",
            needle_groups: &[&["parse error", "unexpected token", "malformed"]],
            requires_locator: false,
            site_scoped: false,
        },
        // UI state
        MatchRule {
            category: ErrorCategory::UiState,
            sub_category: "MODAL_BLOCKING",
            needle_groups: &[&["modal", "overlay", "dialog"]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::UiState,
            sub_category: "LOADING_STUCK",
            needle_groups: &[&["spinner", "still loading"]],
            requires_locator: false,
            site_scoped: false,
        },
        // System
        MatchRule {
            category: ErrorCategory::System,
            sub_category: "BROWSER_CRASHED",
            needle_groups: &[&[
                "browser crashed",
                "target closed",
                "disconnected",
                "websocket",
            ]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::System,
            sub_category: "OUT_OF_MEMORY",
            needle_groups: &[&["out of memory", "oom"]],
            requires_locator: false,
            site_scoped: false,
        },
        MatchRule {
            category: ErrorCategory::System,
            sub_category: "DISK_FULL",
            needle_groups: &[&["disk full", "no space left"]],
            requires_locator: false,
            site_scoped: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_category_recoverable_flag_wins() {
        let taxonomy = Taxonomy::standard();
        assert!(!taxonomy.recoverable(ErrorCategory::Auth, "INVALID_CREDENTIALS"));
        assert!(taxonomy.recoverable(ErrorCategory::Auth, "SESSION_EXPIRED"));
        // Category default applies when the sub carries no flag
        assert!(taxonomy.recoverable(ErrorCategory::Network, "TIMEOUT"));
        // System default is non-recoverable, crashed browser overrides
        assert!(taxonomy.recoverable(ErrorCategory::System, "BROWSER_CRASHED"));
        assert!(!taxonomy.recoverable(ErrorCategory::System, "OUT_OF_MEMORY"));
    }

    #[test]
    fn not_found_strategy_order() {
        let taxonomy = Taxonomy::standard();
        let names: Vec<String> = taxonomy
            .strategies(ErrorCategory::Element, "NOT_FOUND")
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "try_fallback_selectors",
                "semantic_find",
                "visual_find",
                "wait_and_retry"
            ]
        );
    }

    #[test]
    fn merge_is_stable_on_equal_priority() {
        let mut categories = HashMap::new();
        categories.insert(
            ErrorCategory::Network,
            CategorySpec {
                recoverable: true,
                strategies: vec![StrategyDescriptor::new("b", 10)],
            },
        );
        let mut subs = HashMap::new();
        subs.insert(
            (ErrorCategory::Network, "TIMEOUT".to_string()),
            SubCategorySpec {
                recoverable: None,
                strategies: vec![StrategyDescriptor::new("a", 10)],
            },
        );
        let taxonomy = Taxonomy::new(categories, subs, vec![]);
        let names: Vec<String> = taxonomy
            .strategies(ErrorCategory::Network, "TIMEOUT")
            .into_iter()
            .map(|d| d.name)
            .collect();
        // Sub-category entries come first on priority ties
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn unknown_category_defaults_to_recoverable() {
        let taxonomy = Taxonomy::standard();
        assert!(taxonomy.recoverable(ErrorCategory::Unknown, SUB_UNCLASSIFIED));
        assert!(!taxonomy
            .strategies(ErrorCategory::Unknown, SUB_UNCLASSIFIED)
            .is_empty());
    }
}
