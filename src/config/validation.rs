//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check URLs parse and logging values are known
//! - Detect middleware group cycles and conflicting priority entries
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Middleware keys are not checked here; they only exist once the registry is built

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::config::schema::{AppConfig, MiddlewareConfig};

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
pub const LOG_FORMATS: &[&str] = &["compact", "pretty"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid absolute URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("unknown log level \"{0}\"")]
    UnknownLogLevel(String),

    #[error("unknown log format \"{0}\"")]
    UnknownLogFormat(String),

    #[error("middleware group \"{0}\" is both a special group and a main group")]
    SpecialGroupIsMainGroup(String),

    #[error("middleware group cycle: {0}")]
    GroupCycle(String),

    #[error("middleware \"{0}\" is listed more than once in the priority list")]
    DuplicatePriority(String),

    #[error("listener bind address is empty")]
    EmptyBindAddress,
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "home_url", &config.home_url);
    if !config.admin_url.is_empty() {
        check_url(&mut errors, "admin_url", &config.admin_url);
    }

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }
    if !LOG_FORMATS.contains(&config.observability.log_format.as_str()) {
        errors.push(ValidationError::UnknownLogFormat(config.observability.log_format.clone()));
    }

    validate_middleware(&mut errors, &config.middleware);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if url::Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

fn validate_middleware(errors: &mut Vec<ValidationError>, middleware: &MiddlewareConfig) {
    for special in &middleware.special_groups {
        if middleware.prepend_special_groups_to.contains(special) {
            errors.push(ValidationError::SpecialGroupIsMainGroup(special.clone()));
        }
    }

    let mut seen = HashSet::new();
    for entry in &middleware.priority {
        if !seen.insert(entry) {
            errors.push(ValidationError::DuplicatePriority(entry.clone()));
        }
    }

    let mut reported = HashSet::new();
    for name in middleware.groups.keys() {
        if let Some(cycle) = find_cycle(middleware, name, &mut Vec::new()) {
            // One report per distinct set of groups.
            let mut key: Vec<&str> = cycle.split(" -> ").collect();
            key.sort_unstable();
            key.dedup();
            if reported.insert(key.join(",")) {
                errors.push(ValidationError::GroupCycle(cycle));
            }
        }
    }
}

/// Members of `group` that name other groups, including prepended special groups.
fn nested_groups<'a>(middleware: &'a MiddlewareConfig, group: &str) -> Vec<&'a str> {
    let groups: &BTreeMap<String, Vec<String>> = &middleware.groups;
    let mut nested = Vec::new();

    if middleware.prepend_special_groups_to.iter().any(|main| main == group) {
        nested.extend(middleware.special_groups.iter().map(String::as_str));
    }
    if let Some(members) = groups.get(group) {
        nested.extend(
            members
                .iter()
                .filter(|member| !member.contains(':') && groups.contains_key(member.as_str()))
                .map(String::as_str),
        );
    }
    nested
}

fn find_cycle(middleware: &MiddlewareConfig, group: &str, stack: &mut Vec<String>) -> Option<String> {
    if stack.iter().any(|entered| entered == group) {
        let mut path = stack.clone();
        path.push(group.to_string());
        return Some(path.join(" -> "));
    }

    stack.push(group.to_string());
    for nested in nested_groups(middleware, group) {
        if let Some(cycle) = find_cycle(middleware, nested, stack) {
            return Some(cycle);
        }
    }
    stack.pop();
    None
}
