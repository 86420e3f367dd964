use crate::driver::AutomationDriver;
use crate::errors::{RemedyError, Result};
use crate::types::LocatorKind;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Launch settings for the bundled Chrome adapter.
#[derive(Debug, Clone)]
pub struct ChromeDriverConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
}

impl Default for ChromeDriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 720,
            user_agent: None,
            args: vec![],
        }
    }
}

/// Resolved element token. Interactions re-find by locator so tokens stay
/// valid across DOM churn instead of holding live node handles.
#[derive(Debug, Clone)]
pub struct ChromeElement {
    pub locator: String,
    pub kind: LocatorKind,
}

/// `AutomationDriver` over a headless Chrome instance. One tab per session.
pub struct ChromeDriver {
    browser: Browser,
}

const POLL_INTERVAL_MS: u64 = 100;

impl ChromeDriver {
    pub fn launch(config: &ChromeDriverConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.window_width, config.window_height
        );
        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];
        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }
        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .build()
            .map_err(|e| RemedyError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| RemedyError::LaunchFailed(e.to_string()))?;

        Ok(Self { browser })
    }

    pub fn new_session(&self) -> Result<Arc<Tab>> {
        self.browser
            .new_tab()
            .map_err(|e| RemedyError::SessionUnavailable(e.to_string()))
    }

    pub fn navigate(&self, session: &Arc<Tab>, url: &str) -> Result<()> {
        session
            .navigate_to(url)
            .map_err(|e| RemedyError::NavigationFailed(e.to_string()))?;
        session
            .wait_until_navigated()
            .map_err(|e| RemedyError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    fn eval(&self, session: &Arc<Tab>, script: &str) -> Result<Value> {
        let result = session
            .evaluate(script, false)
            .map_err(|e| RemedyError::JavaScriptFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }
}

fn escape_js(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// JS expression evaluating to the target element or null.
fn element_expr(locator: &str, kind: LocatorKind) -> String {
    match kind {
        LocatorKind::Css => format!("document.querySelector('{}')", escape_js(locator)),
        LocatorKind::XPath => format!(
            "document.evaluate('{}', document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            escape_js(locator)
        ),
    }
}

#[async_trait]
impl AutomationDriver for ChromeDriver {
    type Session = Arc<Tab>;
    type Element = ChromeElement;

    async fn resolve_locator(
        &self,
        session: &Self::Session,
        locator: &str,
        kind: LocatorKind,
        timeout_ms: u64,
    ) -> Result<Option<Self::Element>> {
        let probe = format!("!!({})", element_expr(locator, kind));
        let started = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        loop {
            if let Ok(value) = self.eval(session, &probe) {
                if value.as_bool().unwrap_or(false) {
                    return Ok(Some(ChromeElement {
                        locator: locator.to_string(),
                        kind,
                    }));
                }
            }
            if started.elapsed() >= timeout {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn click(&self, session: &Self::Session, element: &Self::Element) -> Result<()> {
        match element.kind {
            LocatorKind::Css => session
                .find_element(&element.locator)
                .map_err(|e| RemedyError::ElementNotFound(e.to_string()))?
                .click()
                .map(|_| ())
                .map_err(|e| RemedyError::DriverError(e.to_string())),
            LocatorKind::XPath => session
                .find_element_by_xpath(&element.locator)
                .map_err(|e| RemedyError::ElementNotFound(e.to_string()))?
                .click()
                .map(|_| ())
                .map_err(|e| RemedyError::DriverError(e.to_string())),
        }
    }

    async fn type_text(
        &self,
        session: &Self::Session,
        element: &Self::Element,
        text: &str,
    ) -> Result<()> {
        self.click(session, element).await?;
        session
            .type_str(text)
            .map(|_| ())
            .map_err(|e| RemedyError::DriverError(e.to_string()))
    }

    async fn select_option(
        &self,
        session: &Self::Session,
        element: &Self::Element,
        value: &str,
    ) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; \
             el.value = '{}'; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            element_expr(&element.locator, element.kind),
            escape_js(value)
        );
        let result = self.eval(session, &script)?;
        if result.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(RemedyError::ElementNotFound(element.locator.clone()))
        }
    }

    async fn scroll_into_view(
        &self,
        session: &Self::Session,
        element: &Self::Element,
    ) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; \
             el.scrollIntoView({{ block: 'center', inline: 'center' }}); return true; }})()",
            element_expr(&element.locator, element.kind)
        );
        let result = self.eval(session, &script)?;
        if result.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(RemedyError::ElementNotFound(element.locator.clone()))
        }
    }

    async fn force_click(&self, session: &Self::Session, element: &Self::Element) -> Result<()> {
        // Direct DOM dispatch, skipping CDP input simulation entirely
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
            element_expr(&element.locator, element.kind)
        );
        let result = self.eval(session, &script)?;
        if result.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(RemedyError::ElementNotFound(element.locator.clone()))
        }
    }

    async fn current_url(&self, session: &Self::Session) -> Result<String> {
        Ok(session.get_url())
    }

    async fn wait_for_condition(
        &self,
        session: &Self::Session,
        expr: &str,
        timeout_ms: u64,
    ) -> Result<bool> {
        let started = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        while started.elapsed() < timeout {
            let result = self.eval(session, expr)?;
            if result.as_bool().unwrap_or(false) {
                return Ok(true);
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
        Ok(false)
    }

    async fn reload(&self, session: &Self::Session) -> Result<()> {
        session
            .reload(false, None)
            .map(|_| ())
            .map_err(|e| RemedyError::NavigationFailed(e.to_string()))
    }

    async fn restart(&self, session: &Self::Session) -> Result<()> {
        // Hard reload bypassing cache rebuilds the page context in place;
        // the tab handle held by the caller stays valid.
        session
            .reload(true, None)
            .map(|_| ())
            .map_err(|e| RemedyError::NavigationFailed(e.to_string()))?;
        session
            .wait_until_navigated()
            .map(|_| ())
            .map_err(|e| RemedyError::NavigationFailed(e.to_string()))
    }

    async fn evaluate(&self, session: &Self::Session, expr: &str) -> Result<Value> {
        self.eval(session, expr)
    }

    async fn capture_screenshot(&self, session: &Self::Session) -> Result<Vec<u8>> {
        session
            .capture_screenshot(
                headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption::Png,
                None,
                None,
                true,
            )
            .map_err(|e| RemedyError::DriverError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_expr_escapes_quotes() {
        let expr = element_expr("button[name='save']", LocatorKind::Css);
        assert!(expr.contains("\\'save\\'"));
        let xpath = element_expr("//button[@name='save']", LocatorKind::XPath);
        assert!(xpath.contains("document.evaluate"));
    }
}
