use crate::driver::AutomationDriver;
use crate::errors::{RemedyError, Result};
use crate::recovery::strategy::{
    RecoveryStrategy, StrategyContext, StrategyOutcome, StrategyParams, StrategyRegistry,
};
use crate::types::LocatorKind;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Registry with every built-in strategy family installed.
pub fn standard_registry<D: AutomationDriver>() -> StrategyRegistry<D> {
    let mut registry = StrategyRegistry::new();
    registry.register(WaitAndRetry);
    registry.register(Reauthenticate);
    registry.register(RefreshSession);
    registry.register(TryFallbackSelectors);
    registry.register(SemanticFind);
    registry.register(VisualFind);
    registry.register(ScrollIntoView);
    registry.register(DismissOverlay);
    registry.register(WaitForElementReady);
    registry.register(ForceInteraction);
    registry.register(ReacquireElement);
    registry.register(ReloadPage);
    registry.register(RestartSession);
    registry.register(WaitForUnlock);
    registry.register(NotifyHuman);
    registry.register(SkipOperation);
    registry
}

/// Locator strings carry no kind; XPath is recognized by shape.
fn locator_kind_of(locator: &str) -> LocatorKind {
    if locator.starts_with('/') || locator.starts_with('(') {
        LocatorKind::XPath
    } else {
        LocatorKind::Css
    }
}

fn escape_js(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// JS predicate: element present, enabled and laid out.
fn readiness_expr(locator: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector('{}'); \
         return !!el && !el.disabled && el.offsetParent !== null; }})()",
        escape_js(locator)
    )
}

const DEFAULT_OVERLAY_SELECTORS: &[&str] = &[
    ".modal-close",
    ".modal .close",
    "[aria-label=\"Close\"]",
    ".overlay-dismiss",
    ".dialog-dismiss",
    "button[data-dismiss]",
];

const OVERLAY_PROBE_TIMEOUT_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// Retry family
// ---------------------------------------------------------------------------

/// Backoff-delayed waiting; verifies the failed locator when one is known.
pub struct WaitAndRetry;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for WaitAndRetry {
    fn name(&self) -> &str {
        "wait_and_retry"
    }

    fn description(&self) -> &str {
        "Wait with backoff, then verify the failed locator resolves"
    }

    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        match params {
            StrategyParams::None => Ok(()),
            StrategyParams::Retry {
                max_retries,
                backoff,
                ..
            } => {
                if *max_retries == 0 {
                    return Err(RemedyError::ConfigurationError(
                        "max_retries must be at least 1".to_string(),
                    ));
                }
                if *backoff < 1.0 {
                    return Err(RemedyError::ConfigurationError(
                        "backoff must be >= 1.0".to_string(),
                    ));
                }
                Ok(())
            }
            other => Err(RemedyError::ConfigurationError(format!(
                "wait_and_retry does not accept {:?}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let (max_retries, initial_delay_ms, backoff) = match ctx.params {
            StrategyParams::Retry {
                max_retries,
                initial_delay_ms,
                backoff,
            } => (*max_retries, *initial_delay_ms, *backoff),
            _ => (2, 1000, 2.0),
        };

        let mut delay_ms = initial_delay_ms;
        for round in 0..max_retries {
            let remaining = ctx.remaining_budget.as_millis() as u64;
            if remaining == 0 {
                return Ok(StrategyOutcome::unresolved("episode budget exhausted"));
            }
            tokio::time::sleep(Duration::from_millis(delay_ms.min(remaining))).await;

            match ctx.exec.locator.as_deref() {
                Some(locator) => {
                    let timeout = ctx.clipped_timeout(ctx.locator_timeout_ms);
                    if ctx
                        .driver
                        .resolve_locator(ctx.session, locator, locator_kind_of(locator), timeout)
                        .await?
                        .is_some()
                    {
                        return Ok(StrategyOutcome::resolved(format!(
                            "locator resolved after {} wait round(s)",
                            round + 1
                        )));
                    }
                }
                // Nothing to verify against; one settled wait is the repair.
                None => return Ok(StrategyOutcome::resolved("waited for conditions to settle")),
            }

            delay_ms = (delay_ms as f64 * backoff) as u64;
        }

        Ok(StrategyOutcome::unresolved(
            "locator still unresolved after retries",
        ))
    }
}

// ---------------------------------------------------------------------------
// Auth family
// ---------------------------------------------------------------------------

/// Drive the session back to the login flow; the job loop owns credentials.
pub struct Reauthenticate;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for Reauthenticate {
    fn name(&self) -> &str {
        "reauthenticate"
    }

    fn description(&self) -> &str {
        "Send the session to the login flow for the caller to re-authenticate"
    }

    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        match params {
            StrategyParams::None | StrategyParams::Reauth { .. } => Ok(()),
            other => Err(RemedyError::ConfigurationError(format!(
                "reauthenticate does not accept {:?}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        if let StrategyParams::Reauth {
            login_url: Some(login_url),
        } = ctx.params
        {
            ctx.driver
                .evaluate(
                    ctx.session,
                    &format!("window.location.href = '{}'", escape_js(login_url)),
                )
                .await?;
        } else {
            ctx.driver.reload(ctx.session).await?;
        }

        let settled = ctx
            .driver
            .wait_for_condition(
                ctx.session,
                "document.readyState === 'complete'",
                ctx.clipped_timeout(10_000),
            )
            .await?;

        if settled {
            Ok(
                StrategyOutcome::resolved("session parked on login flow for re-authentication")
                    .with_data(json!({ "requires_login": true })),
            )
        } else {
            Ok(StrategyOutcome::unresolved("login page never settled"))
        }
    }
}

/// Reload the current page to pick up refreshed session cookies.
pub struct RefreshSession;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for RefreshSession {
    fn name(&self) -> &str {
        "refresh_session"
    }

    fn description(&self) -> &str {
        "Reload the page so refreshed session state takes effect"
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        ctx.driver.reload(ctx.session).await?;
        let settled = ctx
            .driver
            .wait_for_condition(
                ctx.session,
                "document.readyState === 'complete'",
                ctx.clipped_timeout(10_000),
            )
            .await?;
        if settled {
            Ok(StrategyOutcome::resolved("page reloaded with fresh session state"))
        } else {
            Ok(StrategyOutcome::unresolved("page did not settle after reload"))
        }
    }
}

// ---------------------------------------------------------------------------
// Locator fallback family
// ---------------------------------------------------------------------------

/// Try the registered alternatives for the locator that failed.
pub struct TryFallbackSelectors;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for TryFallbackSelectors {
    fn name(&self) -> &str {
        "try_fallback_selectors"
    }

    fn description(&self) -> &str {
        "Resolve the element through registered alternative locators"
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let Some(locator) = ctx.exec.locator.as_deref() else {
            return Ok(StrategyOutcome::unresolved("no locator in context"));
        };
        let Some(record) = ctx.selectors.find_by_locator(locator) else {
            return Ok(StrategyOutcome::unresolved(format!(
                "no registered selector for {}",
                locator
            )));
        };
        if record.alternatives.is_empty() {
            return Ok(StrategyOutcome::unresolved("selector has no alternatives"));
        }

        for alternative in &record.alternatives {
            let timeout = ctx.clipped_timeout(ctx.locator_timeout_ms);
            if ctx
                .driver
                .resolve_locator(ctx.session, alternative, record.kind, timeout)
                .await?
                .is_some()
            {
                info!(selector = %record.id, alternative = %alternative, "fallback locator resolved");
                return Ok(StrategyOutcome::resolved(format!(
                    "alternative locator {} resolved",
                    alternative
                ))
                .with_data(json!({ "locator": alternative, "selector_id": record.id })));
            }
        }

        Ok(StrategyOutcome::unresolved("no alternative locator resolved"))
    }
}

/// Element lookup by meaning, through the injected semantic locator.
pub struct SemanticFind;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for SemanticFind {
    fn name(&self) -> &str {
        "semantic_find"
    }

    fn description(&self) -> &str {
        "Locate the element from a semantic description"
    }

    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        match params {
            StrategyParams::None | StrategyParams::Locator { .. } => Ok(()),
            other => Err(RemedyError::ConfigurationError(format!(
                "semantic_find does not accept {:?}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let Some(semantic) = ctx.semantic else {
            return Ok(StrategyOutcome::unresolved("no semantic locator injected"));
        };
        let Some(description) = lookup_description(ctx) else {
            return Ok(StrategyOutcome::unresolved("nothing to describe the element by"));
        };

        match semantic
            .find_by_semantic_description(ctx.session, &description)
            .await?
        {
            Some(_) => Ok(StrategyOutcome::resolved(format!(
                "element found semantically: {}",
                description
            ))
            .with_data(json!({ "description": description }))),
            None => Ok(StrategyOutcome::unresolved("semantic lookup found nothing")),
        }
    }
}

/// Element lookup by appearance, through the injected visual locator.
pub struct VisualFind;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for VisualFind {
    fn name(&self) -> &str {
        "visual_find"
    }

    fn description(&self) -> &str {
        "Locate the element from a visual description"
    }

    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        match params {
            StrategyParams::None | StrategyParams::Locator { .. } => Ok(()),
            other => Err(RemedyError::ConfigurationError(format!(
                "visual_find does not accept {:?}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let Some(semantic) = ctx.semantic else {
            return Ok(StrategyOutcome::unresolved("no visual locator injected"));
        };
        let Some(description) = lookup_description(ctx) else {
            return Ok(StrategyOutcome::unresolved("nothing to describe the element by"));
        };

        match semantic
            .find_by_visual_description(ctx.session, &description)
            .await?
        {
            Some(_) => Ok(StrategyOutcome::resolved(format!(
                "element found visually: {}",
                description
            ))
            .with_data(json!({ "description": description }))),
            None => Ok(StrategyOutcome::unresolved("visual lookup found nothing")),
        }
    }
}

/// Best available description: explicit params, then the selector registry,
/// then the raw locator itself.
fn lookup_description<D: AutomationDriver>(ctx: &StrategyContext<'_, D>) -> Option<String> {
    if let StrategyParams::Locator {
        description: Some(description),
    } = ctx.params
    {
        return Some(description.clone());
    }
    if let Some(locator) = ctx.exec.locator.as_deref() {
        if let Some(record) = ctx.selectors.find_by_locator(locator) {
            if !record.description.is_empty() {
                return Some(record.description);
            }
        }
        return Some(locator.to_string());
    }
    None
}

// ---------------------------------------------------------------------------
// Viewport / visibility family
// ---------------------------------------------------------------------------

pub struct ScrollIntoView;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for ScrollIntoView {
    fn name(&self) -> &str {
        "scroll_into_view"
    }

    fn description(&self) -> &str {
        "Scroll the target element into the viewport"
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let Some(locator) = ctx.exec.locator.as_deref() else {
            return Ok(StrategyOutcome::unresolved("no locator in context"));
        };
        let timeout = ctx.clipped_timeout(ctx.locator_timeout_ms);
        match ctx
            .driver
            .resolve_locator(ctx.session, locator, locator_kind_of(locator), timeout)
            .await?
        {
            Some(element) => {
                ctx.driver.scroll_into_view(ctx.session, &element).await?;
                Ok(StrategyOutcome::resolved("element scrolled into view"))
            }
            None => Ok(StrategyOutcome::unresolved("element not present to scroll")),
        }
    }
}

/// Close whatever overlay is intercepting interaction.
pub struct DismissOverlay;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for DismissOverlay {
    fn name(&self) -> &str {
        "dismiss_overlay"
    }

    fn description(&self) -> &str {
        "Click known overlay dismissors to unblock the page"
    }

    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        match params {
            StrategyParams::None | StrategyParams::Overlay { .. } => Ok(()),
            other => Err(RemedyError::ConfigurationError(format!(
                "dismiss_overlay does not accept {:?}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let configured;
        let selectors: Vec<&str> = match ctx.params {
            StrategyParams::Overlay { dismiss_selectors } if !dismiss_selectors.is_empty() => {
                configured = dismiss_selectors.clone();
                configured.iter().map(|s| s.as_str()).collect()
            }
            _ => DEFAULT_OVERLAY_SELECTORS.to_vec(),
        };

        for selector in selectors {
            let timeout = ctx.clipped_timeout(OVERLAY_PROBE_TIMEOUT_MS);
            if let Some(element) = ctx
                .driver
                .resolve_locator(ctx.session, selector, LocatorKind::Css, timeout)
                .await?
            {
                ctx.driver.click(ctx.session, &element).await?;
                return Ok(StrategyOutcome::resolved(format!(
                    "overlay dismissed via {}",
                    selector
                ))
                .with_data(json!({ "dismissed_with": selector })));
            }
        }

        Ok(StrategyOutcome::unresolved("no dismissable overlay found"))
    }
}

/// Wait until the element is present, enabled and laid out.
pub struct WaitForElementReady;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for WaitForElementReady {
    fn name(&self) -> &str {
        "wait_for_element_ready"
    }

    fn description(&self) -> &str {
        "Wait for the target element to become interactable"
    }

    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        match params {
            StrategyParams::None => Ok(()),
            StrategyParams::Wait { timeout_ms, .. } => {
                if *timeout_ms == 0 {
                    return Err(RemedyError::ConfigurationError(
                        "wait timeout must be positive".to_string(),
                    ));
                }
                Ok(())
            }
            other => Err(RemedyError::ConfigurationError(format!(
                "wait_for_element_ready does not accept {:?}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let (timeout_ms, condition) = match ctx.params {
            StrategyParams::Wait {
                timeout_ms,
                condition,
                ..
            } => (*timeout_ms, condition.clone()),
            _ => (10_000, None),
        };

        let expr = match condition {
            Some(expr) => expr,
            None => match ctx.exec.locator.as_deref() {
                Some(locator) => readiness_expr(locator),
                None => return Ok(StrategyOutcome::unresolved("no locator or condition to wait on")),
            },
        };

        let met = ctx
            .driver
            .wait_for_condition(ctx.session, &expr, ctx.clipped_timeout(timeout_ms))
            .await?;
        if met {
            Ok(StrategyOutcome::resolved("element became ready"))
        } else {
            Ok(StrategyOutcome::unresolved("element never became ready"))
        }
    }
}

/// Dispatch the interaction below the normal input simulation layer.
pub struct ForceInteraction;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for ForceInteraction {
    fn name(&self) -> &str {
        "force_interaction"
    }

    fn description(&self) -> &str {
        "Bypass input simulation with a direct element dispatch"
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let Some(locator) = ctx.exec.locator.as_deref() else {
            return Ok(StrategyOutcome::unresolved("no locator in context"));
        };
        let timeout = ctx.clipped_timeout(ctx.locator_timeout_ms);
        match ctx
            .driver
            .resolve_locator(ctx.session, locator, locator_kind_of(locator), timeout)
            .await?
        {
            Some(element) => {
                ctx.driver.force_click(ctx.session, &element).await?;
                Ok(StrategyOutcome::resolved("forced interaction dispatched"))
            }
            None => Ok(StrategyOutcome::unresolved("element not present to force")),
        }
    }
}

/// Resolve the locator fresh after a stale reference.
pub struct ReacquireElement;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for ReacquireElement {
    fn name(&self) -> &str {
        "reacquire_element"
    }

    fn description(&self) -> &str {
        "Re-resolve a stale element reference"
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let Some(locator) = ctx.exec.locator.as_deref() else {
            return Ok(StrategyOutcome::unresolved("no locator in context"));
        };
        let timeout = ctx.clipped_timeout(ctx.locator_timeout_ms);
        match ctx
            .driver
            .resolve_locator(ctx.session, locator, locator_kind_of(locator), timeout)
            .await?
        {
            Some(_) => Ok(StrategyOutcome::resolved("element reference re-acquired")),
            None => Ok(StrategyOutcome::unresolved("element no longer present")),
        }
    }
}

// ---------------------------------------------------------------------------
// Page / session restart family
// ---------------------------------------------------------------------------

pub struct ReloadPage;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for ReloadPage {
    fn name(&self) -> &str {
        "reload_page"
    }

    fn description(&self) -> &str {
        "Reload the current page"
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        ctx.driver.reload(ctx.session).await?;
        let settled = ctx
            .driver
            .wait_for_condition(
                ctx.session,
                "document.readyState === 'complete'",
                ctx.clipped_timeout(10_000),
            )
            .await?;
        if settled {
            Ok(StrategyOutcome::resolved("page reloaded"))
        } else {
            Ok(StrategyOutcome::unresolved("page did not settle after reload"))
        }
    }
}

pub struct RestartSession;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for RestartSession {
    fn name(&self) -> &str {
        "restart_session"
    }

    fn description(&self) -> &str {
        "Tear down and re-establish the browser session"
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        ctx.driver.restart(ctx.session).await?;
        Ok(StrategyOutcome::resolved("session restarted"))
    }
}

// ---------------------------------------------------------------------------
// Site-specific family
// ---------------------------------------------------------------------------

/// Bounded poll until a site-side lock clears.
pub struct WaitForUnlock;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for WaitForUnlock {
    fn name(&self) -> &str {
        "wait_for_unlock"
    }

    fn description(&self) -> &str {
        "Poll until the back office releases its edit lock"
    }

    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        match params {
            StrategyParams::SitePoll {
                check_expr,
                timeout_ms,
                poll_interval_ms,
            } => {
                if check_expr.is_empty() {
                    return Err(RemedyError::ConfigurationError(
                        "check_expr must not be empty".to_string(),
                    ));
                }
                if *timeout_ms == 0 || *poll_interval_ms == 0 {
                    return Err(RemedyError::ConfigurationError(
                        "poll timings must be positive".to_string(),
                    ));
                }
                Ok(())
            }
            other => Err(RemedyError::ConfigurationError(format!(
                "wait_for_unlock requires site poll params, got {:?}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let StrategyParams::SitePoll {
            check_expr,
            timeout_ms,
            poll_interval_ms,
        } = ctx.params
        else {
            return Ok(StrategyOutcome::unresolved("missing site poll params"));
        };

        let deadline = Duration::from_millis(ctx.clipped_timeout(*timeout_ms));
        let started = std::time::Instant::now();

        while started.elapsed() < deadline {
            let value = ctx.driver.evaluate(ctx.session, check_expr).await?;
            if value.as_bool().unwrap_or(false) {
                return Ok(StrategyOutcome::resolved("lock released"));
            }
            tokio::time::sleep(Duration::from_millis(*poll_interval_ms)).await;
        }

        Ok(StrategyOutcome::unresolved("still locked at poll deadline"))
    }
}

// ---------------------------------------------------------------------------
// Terminal notify family
// ---------------------------------------------------------------------------

/// Succeeds at the orchestration level while flagging that a human or
/// downstream system must act.
pub struct NotifyHuman;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for NotifyHuman {
    fn name(&self) -> &str {
        "notify_human"
    }

    fn description(&self) -> &str {
        "Escalate to a human with optional screenshot evidence"
    }

    fn validate_params(&self, params: &StrategyParams) -> Result<()> {
        match params {
            StrategyParams::None => Ok(()),
            StrategyParams::Notify { channel, .. } => {
                if channel.is_empty() {
                    return Err(RemedyError::ConfigurationError(
                        "notify channel must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
            other => Err(RemedyError::ConfigurationError(format!(
                "notify_human does not accept {:?}",
                other
            ))),
        }
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        let (channel, capture, skip) = match ctx.params {
            StrategyParams::Notify {
                channel,
                capture_screenshot,
                skip_operation,
            } => (channel.clone(), *capture_screenshot, *skip_operation),
            _ => ("ops".to_string(), false, true),
        };

        let mut data = json!({
            "channel": channel,
            "skip_operation": skip,
            "operation": ctx.exec.operation,
            "client_id": ctx.exec.client_id,
            "classification": ctx.classification.label(),
        });

        if capture {
            match ctx.driver.capture_screenshot(ctx.session).await {
                Ok(bytes) => {
                    data["screenshot_base64"] = json!(BASE64.encode(bytes));
                }
                Err(e) => {
                    warn!(error = %e, "screenshot capture for escalation failed");
                }
            }
        }

        warn!(
            channel = %channel,
            operation = %ctx.exec.operation,
            client_id = %ctx.exec.client_id,
            classification = %ctx.classification.label(),
            "escalating failure to human operator"
        );

        Ok(StrategyOutcome::resolved("escalated to human operator").with_data(data))
    }
}

/// Mark the unit of work skipped and let the pipeline move on.
pub struct SkipOperation;

#[async_trait]
impl<D: AutomationDriver> RecoveryStrategy<D> for SkipOperation {
    fn name(&self) -> &str {
        "skip_operation"
    }

    fn description(&self) -> &str {
        "Skip the failing operation and continue"
    }

    async fn execute(&self, ctx: &StrategyContext<'_, D>) -> Result<StrategyOutcome> {
        info!(
            operation = %ctx.exec.operation,
            client_id = %ctx.exec.client_id,
            "skipping operation after unrecoverable step"
        );
        Ok(StrategyOutcome::resolved("operation skipped").with_data(json!({ "skipped": true })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDriver;

    #[test]
    fn registry_contains_all_builtins() {
        let registry: StrategyRegistry<ScriptedDriver> = standard_registry();
        for name in [
            "wait_and_retry",
            "reauthenticate",
            "refresh_session",
            "try_fallback_selectors",
            "semantic_find",
            "visual_find",
            "scroll_into_view",
            "dismiss_overlay",
            "wait_for_element_ready",
            "force_interaction",
            "reacquire_element",
            "reload_page",
            "restart_session",
            "wait_for_unlock",
            "notify_human",
            "skip_operation",
        ] {
            assert!(registry.get(name).is_some(), "missing builtin {}", name);
        }
    }

    #[test]
    fn xpath_locators_are_recognized_by_shape() {
        assert_eq!(locator_kind_of("//button[1]"), LocatorKind::XPath);
        assert_eq!(locator_kind_of("(//a)[2]"), LocatorKind::XPath);
        assert_eq!(locator_kind_of("#submit"), LocatorKind::Css);
    }

    #[test]
    fn retry_params_are_validated() {
        let strategy = WaitAndRetry;
        let bad = StrategyParams::Retry {
            max_retries: 0,
            initial_delay_ms: 100,
            backoff: 2.0,
        };
        assert!(RecoveryStrategy::<ScriptedDriver>::validate_params(&strategy, &bad).is_err());

        let mismatched = StrategyParams::Notify {
            channel: "ops".to_string(),
            capture_screenshot: false,
            skip_operation: false,
        };
        assert!(
            RecoveryStrategy::<ScriptedDriver>::validate_params(&strategy, &mismatched).is_err()
        );
    }

    #[test]
    fn site_poll_params_are_validated() {
        let strategy = WaitForUnlock;
        let empty_expr = StrategyParams::SitePoll {
            check_expr: String::new(),
            timeout_ms: 1000,
            poll_interval_ms: 100,
        };
        assert!(
            RecoveryStrategy::<ScriptedDriver>::validate_params(&strategy, &empty_expr).is_err()
        );
    }

    #[test]
    fn readiness_expr_escapes_quotes() {
        let expr = readiness_expr("button[name='save']");
        assert!(expr.contains("\\'save\\'"));
    }
}
