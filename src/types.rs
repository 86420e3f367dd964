use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized view of a raised automation error. Immutable once captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub name: String,
    pub message: String,
    pub code: Option<String>,
    pub trace: Option<String>,
}

impl FailureRecord {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            code: None,
            trace: None,
        }
    }

    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        Self::new(std::any::type_name::<E>(), err.to_string())
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

/// Ambient facts at failure time, supplied by the caller.
///
/// The recovery core never infers any of these: the job loop knows which
/// session, page and tenant an operation was running against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub session_id: String,
    pub operation: String,
    pub client_id: String,
    pub url: Option<String>,
    pub locator: Option<String>,
}

impl ExecutionContext {
    pub fn new(
        session_id: impl Into<String>,
        client_id: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            operation: operation.into(),
            client_id: client_id.into(),
            url: None,
            locator: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Host portion of the context URL, when one was supplied and parses.
    pub fn domain(&self) -> Option<String> {
        let raw = self.url.as_deref()?;
        url::Url::parse(raw)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }

    /// Page identifier used for pattern grouping: last meaningful path
    /// segment of the URL, falling back to the host.
    pub fn page(&self) -> String {
        let Some(raw) = self.url.as_deref() else {
            return "unknown".to_string();
        };
        match url::Url::parse(raw) {
            Ok(parsed) => parsed
                .path_segments()
                .and_then(|segments| {
                    segments
                        .filter(|s| !s.is_empty())
                        .next_back()
                        .map(|s| s.to_string())
                })
                .or_else(|| parsed.host_str().map(|h| h.to_string()))
                .unwrap_or_else(|| "unknown".to_string()),
            Err(_) => raw.to_string(),
        }
    }
}

/// Kind of element locator expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    Css,
    XPath,
}

impl std::fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocatorKind::Css => write!(f, "css"),
            LocatorKind::XPath => write!(f, "xpath"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Snapshot of a page element, as captured by the caller's DOM tooling.
/// Input to selector suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag_name: String,
    pub element_id: Option<String>,
    pub class_name: Option<String>,
    pub text_content: Option<String>,
    pub attributes: HashMap<String, String>,
    pub rect: Option<ElementRect>,
}

impl ElementInfo {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            element_id: None,
            class_name: None,
            text_content: None,
            attributes: HashMap::new(),
            rect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_domain_parses_host() {
        let ctx = ExecutionContext::new("s1", "client-1", "update_menu")
            .with_url("https://pos.example.com/restaurants/admin/menus");
        assert_eq!(ctx.domain().as_deref(), Some("pos.example.com"));
        assert_eq!(ctx.page(), "menus");
    }

    #[test]
    fn context_page_falls_back_without_url() {
        let ctx = ExecutionContext::new("s1", "client-1", "update_menu");
        assert_eq!(ctx.page(), "unknown");
        assert!(ctx.domain().is_none());
    }
}
