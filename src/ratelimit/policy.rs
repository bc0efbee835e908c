//! Rate Limit Policy
//!
//! Endpoint classes, their limits and the rules that map a request onto a
//! class.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{CacheError, Result};

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);
const ONE_MINUTE: Duration = Duration::from_secs(60);

// == Endpoint Class ==
/// Closed set of endpoint classes, each limited independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointClass {
    General,
    Analysis,
    Upload,
    Auth,
}

impl EndpointClass {
    pub const ALL: [EndpointClass; 4] = [
        EndpointClass::General,
        EndpointClass::Analysis,
        EndpointClass::Upload,
        EndpointClass::Auth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::General => "general",
            EndpointClass::Analysis => "analysis",
            EndpointClass::Upload => "upload",
            EndpointClass::Auth => "auth",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Class Limit ==
/// Request budget for one class within one fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLimit {
    pub max_requests: u32,
    pub window: Duration,
    /// Requests that finish with a status below 400 are refunded
    pub skip_successful_requests: bool,
}

impl ClassLimit {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            skip_successful_requests: false,
        }
    }

    pub fn skipping_successful(mut self) -> Self {
        self.skip_successful_requests = true;
        self
    }

    /// Default limit for `class`.
    pub fn default_for(class: EndpointClass) -> Self {
        match class {
            EndpointClass::General => Self::new(100, FIFTEEN_MINUTES),
            EndpointClass::Analysis => Self::new(10, ONE_MINUTE),
            EndpointClass::Upload => Self::new(20, FIFTEEN_MINUTES),
            EndpointClass::Auth => Self::new(5, FIFTEEN_MINUTES).skipping_successful(),
        }
    }
}

// == Route Rule ==
/// Maps requests onto a class by optional method and path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    /// Matches any method when None
    pub method: Option<String>,
    pub path_prefix: String,
    pub class: EndpointClass,
}

impl RouteRule {
    pub fn new(path_prefix: impl Into<String>, class: EndpointClass) -> Self {
        Self {
            method: None,
            path_prefix: path_prefix.into(),
            class,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        let method_matches = self
            .method
            .as_deref()
            .map_or(true, |expected| expected.eq_ignore_ascii_case(method));
        method_matches && path.starts_with(&self.path_prefix)
    }
}

// == Failure Mode ==
/// What the limiter decides when its counter store cannot be consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Let the request through
    #[default]
    Open,
    /// Reject the request for one window
    Closed,
}

impl FromStr for FailureMode {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailureMode::Open),
            "closed" => Ok(FailureMode::Closed),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown rate limit failure mode '{}'",
                other
            ))),
        }
    }
}

// == Rate Limit Config ==
/// Limits per class plus the ordered classification rules.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub general: ClassLimit,
    pub analysis: ClassLimit,
    pub upload: ClassLimit,
    pub auth: ClassLimit,
    /// Checked in order; the first match wins
    pub rules: Vec<RouteRule>,
    pub failure_mode: FailureMode,
    /// Take the client id from `x-client-id`/`x-forwarded-for` instead of
    /// the peer address. Only safe behind a proxy that sets them.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general: ClassLimit::default_for(EndpointClass::General),
            analysis: ClassLimit::default_for(EndpointClass::Analysis),
            upload: ClassLimit::default_for(EndpointClass::Upload),
            auth: ClassLimit::default_for(EndpointClass::Auth),
            rules: vec![
                RouteRule::new("/auth", EndpointClass::Auth),
                RouteRule::new("/upload", EndpointClass::Upload),
                RouteRule::new("/analyze", EndpointClass::Analysis),
                RouteRule::new("/responses", EndpointClass::Analysis).with_method("PUT"),
            ],
            failure_mode: FailureMode::Open,
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    pub fn limit_for(&self, class: EndpointClass) -> &ClassLimit {
        match class {
            EndpointClass::General => &self.general,
            EndpointClass::Analysis => &self.analysis,
            EndpointClass::Upload => &self.upload,
            EndpointClass::Auth => &self.auth,
        }
    }

    pub fn set_limit(&mut self, class: EndpointClass, limit: ClassLimit) {
        match class {
            EndpointClass::General => self.general = limit,
            EndpointClass::Analysis => self.analysis = limit,
            EndpointClass::Upload => self.upload = limit,
            EndpointClass::Auth => self.auth = limit,
        }
    }

    pub fn with_limit(mut self, class: EndpointClass, limit: ClassLimit) -> Self {
        self.set_limit(class, limit);
        self
    }

    pub fn with_rules(mut self, rules: Vec<RouteRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Class for a request; unmatched requests fall back to `General`.
    pub fn classify(&self, method: &str, path: &str) -> EndpointClass {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map_or(EndpointClass::General, |rule| rule.class)
    }

    pub fn validate(&self) -> Result<()> {
        for class in EndpointClass::ALL {
            let limit = self.limit_for(class);
            if limit.max_requests == 0 {
                return Err(CacheError::InvalidConfig(format!(
                    "{} limit must allow at least one request",
                    class
                )));
            }
            if limit.window.is_zero() {
                return Err(CacheError::InvalidConfig(format!(
                    "{} window must be positive",
                    class
                )));
            }
        }
        Ok(())
    }
}
