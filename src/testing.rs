use crate::classify::ErrorClassifier;
use crate::config::{ClassifierConfig, RecoveryConfig, SelectorConfig};
use crate::driver::{AutomationDriver, SemanticLocator};
use crate::errors::{RemedyError, Result};
use crate::recovery::{standard_registry, RecoveryOrchestrator};
use crate::selectors::SelectorHealthTracker;
use crate::types::{ExecutionContext, FailureRecord, LocatorKind};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// In-memory driver whose behavior is scripted per test: which locators
/// resolve, what evaluations return, which methods fail.
pub struct ScriptedDriver {
    resolvable: RwLock<HashSet<String>>,
    appear_after_reload: RwLock<Vec<String>>,
    url: RwLock<String>,
    condition_result: RwLock<bool>,
    eval_results: RwLock<HashMap<String, Value>>,
    erroring_methods: RwLock<HashSet<String>>,
    calls: RwLock<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ScriptedSession {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ScriptedElement {
    pub locator: String,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            resolvable: RwLock::new(HashSet::new()),
            appear_after_reload: RwLock::new(Vec::new()),
            url: RwLock::new("https://pos.example.com/restaurants/home".to_string()),
            condition_result: RwLock::new(true),
            eval_results: RwLock::new(HashMap::new()),
            erroring_methods: RwLock::new(HashSet::new()),
            calls: RwLock::new(Vec::new()),
        }
    }

    pub fn session(&self) -> ScriptedSession {
        ScriptedSession {
            id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_resolvable(self, locator: &str) -> Self {
        self.resolvable.write().unwrap().insert(locator.to_string());
        self
    }

    /// Locator that only starts resolving once the page has been reloaded.
    pub fn with_resolvable_after_reload(self, locator: &str) -> Self {
        self.appear_after_reload
            .write()
            .unwrap()
            .push(locator.to_string());
        self
    }

    pub fn with_url(self, url: &str) -> Self {
        *self.url.write().unwrap() = url.to_string();
        self
    }

    pub fn with_condition_result(self, met: bool) -> Self {
        *self.condition_result.write().unwrap() = met;
        self
    }

    pub fn with_eval_result(self, expr: &str, value: Value) -> Self {
        self.eval_results
            .write()
            .unwrap()
            .insert(expr.to_string(), value);
        self
    }

    /// Make a driver method return an error, by method name.
    pub fn with_error_on(self, method: &str) -> Self {
        self.erroring_methods
            .write()
            .unwrap()
            .insert(method.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(method))
            .count()
    }

    fn log(&self, method: &str, arg: &str) {
        self.calls
            .write()
            .unwrap()
            .push(format!("{}:{}", method, arg));
    }

    fn fail_if_scripted(&self, method: &str) -> Result<()> {
        if self.erroring_methods.read().unwrap().contains(method) {
            Err(RemedyError::DriverError(format!(
                "scripted failure in {}",
                method
            )))
        } else {
            Ok(())
        }
    }
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationDriver for ScriptedDriver {
    type Session = ScriptedSession;
    type Element = ScriptedElement;

    async fn resolve_locator(
        &self,
        _session: &Self::Session,
        locator: &str,
        _kind: LocatorKind,
        _timeout_ms: u64,
    ) -> Result<Option<Self::Element>> {
        self.log("resolve_locator", locator);
        self.fail_if_scripted("resolve_locator")?;
        if self.resolvable.read().unwrap().contains(locator) {
            Ok(Some(ScriptedElement {
                locator: locator.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn click(&self, _session: &Self::Session, element: &Self::Element) -> Result<()> {
        self.log("click", &element.locator);
        self.fail_if_scripted("click")
    }

    async fn type_text(
        &self,
        _session: &Self::Session,
        element: &Self::Element,
        text: &str,
    ) -> Result<()> {
        self.log("type_text", &format!("{}={}", element.locator, text));
        self.fail_if_scripted("type_text")
    }

    async fn select_option(
        &self,
        _session: &Self::Session,
        element: &Self::Element,
        value: &str,
    ) -> Result<()> {
        self.log("select_option", &format!("{}={}", element.locator, value));
        self.fail_if_scripted("select_option")
    }

    async fn scroll_into_view(
        &self,
        _session: &Self::Session,
        element: &Self::Element,
    ) -> Result<()> {
        self.log("scroll_into_view", &element.locator);
        self.fail_if_scripted("scroll_into_view")
    }

    async fn force_click(&self, _session: &Self::Session, element: &Self::Element) -> Result<()> {
        self.log("force_click", &element.locator);
        self.fail_if_scripted("force_click")
    }

    async fn current_url(&self, _session: &Self::Session) -> Result<String> {
        self.log("current_url", "");
        self.fail_if_scripted("current_url")?;
        Ok(self.url.read().unwrap().clone())
    }

    async fn wait_for_condition(
        &self,
        _session: &Self::Session,
        expr: &str,
        _timeout_ms: u64,
    ) -> Result<bool> {
        self.log("wait_for_condition", expr);
        self.fail_if_scripted("wait_for_condition")?;
        Ok(*self.condition_result.read().unwrap())
    }

    async fn reload(&self, _session: &Self::Session) -> Result<()> {
        self.log("reload", "");
        self.fail_if_scripted("reload")?;
        let appearing: Vec<String> = self.appear_after_reload.write().unwrap().drain(..).collect();
        let mut resolvable = self.resolvable.write().unwrap();
        for locator in appearing {
            resolvable.insert(locator);
        }
        Ok(())
    }

    async fn restart(&self, _session: &Self::Session) -> Result<()> {
        self.log("restart", "");
        self.fail_if_scripted("restart")
    }

    async fn evaluate(&self, _session: &Self::Session, expr: &str) -> Result<Value> {
        self.log("evaluate", expr);
        self.fail_if_scripted("evaluate")?;
        Ok(self
            .eval_results
            .read()
            .unwrap()
            .get(expr)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn capture_screenshot(&self, _session: &Self::Session) -> Result<Vec<u8>> {
        self.log("capture_screenshot", "");
        self.fail_if_scripted("capture_screenshot")?;
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }
}

/// Scripted stand-in for an externally injected semantic/visual locator.
pub struct ScriptedSemanticLocator {
    semantic_succeeds: bool,
    visual_succeeds: bool,
}

impl ScriptedSemanticLocator {
    pub fn new() -> Self {
        Self {
            semantic_succeeds: false,
            visual_succeeds: false,
        }
    }

    pub fn with_semantic_hit(mut self, succeeds: bool) -> Self {
        self.semantic_succeeds = succeeds;
        self
    }

    pub fn with_visual_hit(mut self, succeeds: bool) -> Self {
        self.visual_succeeds = succeeds;
        self
    }
}

impl Default for ScriptedSemanticLocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SemanticLocator<ScriptedDriver> for ScriptedSemanticLocator {
    async fn find_by_semantic_description(
        &self,
        _session: &ScriptedSession,
        description: &str,
    ) -> Result<Option<ScriptedElement>> {
        Ok(self.semantic_succeeds.then(|| ScriptedElement {
            locator: format!("semantic:{}", description),
        }))
    }

    async fn find_by_visual_description(
        &self,
        _session: &ScriptedSession,
        description: &str,
    ) -> Result<Option<ScriptedElement>> {
        Ok(self.visual_succeeds.then(|| ScriptedElement {
            locator: format!("visual:{}", description),
        }))
    }
}

pub struct TestHelper;

impl TestHelper {
    pub fn classifier() -> Arc<ErrorClassifier> {
        Arc::new(ErrorClassifier::standard(ClassifierConfig {
            site_domains: vec!["pos.example.com".to_string()],
            ..Default::default()
        }))
    }

    pub fn tracker() -> Arc<SelectorHealthTracker> {
        Arc::new(SelectorHealthTracker::new(SelectorConfig::default()))
    }

    pub fn orchestrator(driver: Arc<ScriptedDriver>) -> RecoveryOrchestrator<ScriptedDriver> {
        Self::orchestrator_with_config(driver, RecoveryConfig::default())
    }

    pub fn orchestrator_with_config(
        driver: Arc<ScriptedDriver>,
        config: RecoveryConfig,
    ) -> RecoveryOrchestrator<ScriptedDriver> {
        RecoveryOrchestrator::new(
            driver,
            Self::classifier(),
            Self::tracker(),
            standard_registry(),
            config,
        )
        .expect("standard taxonomy validates against builtin registry")
    }

    pub fn context(operation: &str) -> ExecutionContext {
        ExecutionContext::new("session-1", "client-1", operation)
            .with_url("https://pos.example.com/restaurants/menus")
    }

    pub fn element_not_found(locator: &str) -> FailureRecord {
        FailureRecord::new("AutomationError", format!("Element not found: {}", locator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_driver_resolves_only_scripted_locators() {
        let driver = ScriptedDriver::new().with_resolvable("#save");
        let session = driver.session();

        let hit = driver
            .resolve_locator(&session, "#save", LocatorKind::Css, 1000)
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = driver
            .resolve_locator(&session, "#other", LocatorKind::Css, 1000)
            .await
            .unwrap();
        assert!(miss.is_none());
        assert_eq!(driver.call_count("resolve_locator"), 2);
    }

    #[tokio::test]
    async fn reload_promotes_deferred_locators() {
        let driver = ScriptedDriver::new().with_resolvable_after_reload("#late");
        let session = driver.session();

        assert!(driver
            .resolve_locator(&session, "#late", LocatorKind::Css, 1000)
            .await
            .unwrap()
            .is_none());

        driver.reload(&session).await.unwrap();

        assert!(driver
            .resolve_locator(&session, "#late", LocatorKind::Css, 1000)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn scripted_errors_propagate() {
        let driver = ScriptedDriver::new().with_error_on("reload");
        let session = driver.session();
        assert!(driver.reload(&session).await.is_err());
    }
}
