//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration of an application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub debug: DebugConfig,

    /// Absolute home URL; request paths are made relative to it.
    pub home_url: String,

    /// Base for admin and ajax URLs. Empty means `{home_url}admin/`.
    pub admin_url: String,

    pub listener: ListenerConfig,

    pub observability: ObservabilityConfig,

    pub middleware: MiddlewareConfig,

    /// Group defaults per request context.
    pub routes: RoutesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: DebugConfig::default(),
            home_url: "http://localhost:8080/".to_string(),
            admin_url: String::new(),
            listener: ListenerConfig::default(),
            observability: ObservabilityConfig::default(),
            middleware: MiddlewareConfig::default(),
            routes: RoutesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Detailed error responses. Never enable in production.
    pub enabled: bool,

    /// Render configuration errors as a diagnostic page instead of failing.
    pub render_configuration_errors: bool,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest accepted request body.
    pub max_body_bytes: usize,

    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format (compact, pretty).
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Middleware aliases, groups and ordering.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    /// Short name → registered middleware key.
    pub aliases: BTreeMap<String, String>,

    /// Group name → molecule specs (aliases, keys, other groups, "name:a,b").
    pub groups: BTreeMap<String, Vec<String>>,

    /// Highest priority first.
    pub priority: Vec<String>,

    /// Groups prepended to every main group, in order.
    pub special_groups: Vec<String>,

    /// The main groups.
    pub prepend_special_groups_to: Vec<String>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            groups: BTreeMap::new(),
            priority: Vec::new(),
            special_groups: vec!["core".to_string(), "global".to_string()],
            prepend_special_groups_to: vec!["web".to_string(), "admin".to_string(), "ajax".to_string()],
        }
    }
}

/// Default group attributes of one request context.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteDefaults {
    pub middleware: Vec<String>,

    /// Prefix tried when a controller class is not found as given.
    pub namespace: String,

    /// Default handler for routes that do not set one.
    pub handler: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub web: RouteDefaults,
    pub admin: RouteDefaults,
    pub ajax: RouteDefaults,
    pub rest: RouteDefaults,
}

impl RoutesConfig {
    pub fn get(&self, context: &str) -> Option<&RouteDefaults> {
        match context {
            "web" => Some(&self.web),
            "admin" => Some(&self.admin),
            "ajax" => Some(&self.ajax),
            "rest" => Some(&self.rest),
            _ => None,
        }
    }
}
