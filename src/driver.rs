use crate::errors::Result;
use crate::types::LocatorKind;
use async_trait::async_trait;
use serde_json::Value;

/// Capability surface the recovery core consumes from a browser driver.
///
/// The core never drives pages directly; strategies call this narrow surface
/// plus the selector tracker and an optionally injected [`SemanticLocator`].
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    type Session: Send + Sync;
    type Element: Send + Sync;

    /// Resolve a locator with a bounded timeout. `None` means the element
    /// was not present in time; errors are reserved for driver breakage.
    async fn resolve_locator(
        &self,
        session: &Self::Session,
        locator: &str,
        kind: LocatorKind,
        timeout_ms: u64,
    ) -> Result<Option<Self::Element>>;

    /// Click through the driver's normal input simulation
    async fn click(&self, session: &Self::Session, element: &Self::Element) -> Result<()>;

    async fn type_text(
        &self,
        session: &Self::Session,
        element: &Self::Element,
        text: &str,
    ) -> Result<()>;

    async fn select_option(
        &self,
        session: &Self::Session,
        element: &Self::Element,
        value: &str,
    ) -> Result<()>;

    async fn scroll_into_view(
        &self,
        session: &Self::Session,
        element: &Self::Element,
    ) -> Result<()>;

    /// Low-level dispatch that bypasses normal input simulation. Used by the
    /// forced-interaction strategy when ordinary clicks are intercepted.
    async fn force_click(&self, session: &Self::Session, element: &Self::Element) -> Result<()>;

    async fn current_url(&self, session: &Self::Session) -> Result<String>;

    /// Poll a JavaScript predicate expression until it is truthy or the
    /// timeout elapses. Returns whether the condition was met.
    async fn wait_for_condition(
        &self,
        session: &Self::Session,
        expr: &str,
        timeout_ms: u64,
    ) -> Result<bool>;

    async fn reload(&self, session: &Self::Session) -> Result<()>;

    /// Tear down and re-establish the page/session. Strategies fall back to
    /// this when the session itself is wedged.
    async fn restart(&self, session: &Self::Session) -> Result<()>;

    async fn evaluate(&self, session: &Self::Session, expr: &str) -> Result<Value>;

    async fn capture_screenshot(&self, session: &Self::Session) -> Result<Vec<u8>>;
}

/// Externally supplied semantic/visual element lookup.
///
/// Implementations typically sit on top of a vision or language model; the
/// core only calls them, it never embeds that logic itself.
#[async_trait]
pub trait SemanticLocator<D: AutomationDriver>: Send + Sync {
    async fn find_by_semantic_description(
        &self,
        session: &D::Session,
        description: &str,
    ) -> Result<Option<D::Element>>;

    async fn find_by_visual_description(
        &self,
        session: &D::Session,
        description: &str,
    ) -> Result<Option<D::Element>>;
}
