//! Route conditions.
//!
//! # Data Flow
//! ```text
//! declarative spec ("/posts/{id}", ["post_type", "book"], closure, ...)
//!     → factory.rs (type registry, `!` negation, merge)
//!     → ConditionRef (Arc<dyn Condition>)
//!     → Route::is_satisfied / Route::arguments
//! ```
//!
//! # Design Decisions
//! - Conditions are immutable after construction and shared through `Arc`
//! - `arguments` never depends on a previous `is_satisfied` call
//! - URL reversal is an optional capability (`Urlable`), not part of the base trait

pub mod custom;
pub mod factory;
pub mod host;
pub mod multiple;
pub mod negate;
pub mod url;

use std::fmt::Debug;
use std::sync::Arc;

use ::url::Url;

use crate::error::ConfigurationError;
use crate::http::Request;
use crate::routing::arguments::Arguments;

pub use custom::{CustomCondition, Predicate};
pub use factory::{ConditionArg, ConditionFactory, ConditionSpec};
pub use host::{
    AdminCondition, AjaxCondition, PostIdCondition, PostSlugCondition, PostStatusCondition,
    PostTemplateCondition, PostTypeCondition, QueryVarCondition, RestCondition,
};
pub use multiple::MultipleCondition;
pub use negate::NegateCondition;
pub use url::{UrlCondition, WILDCARD};

/// A predicate over a request plus the arguments it derives from it.
pub trait Condition: Send + Sync + Debug {
    fn is_satisfied(&self, request: &Request) -> bool;

    fn arguments(&self, request: &Request) -> Arguments;

    /// Present when this is a URL template condition.
    fn as_url(&self) -> Option<&UrlCondition> {
        None
    }

    /// Present when the condition can be reversed into a URL.
    fn as_urlable(&self) -> Option<&dyn Urlable> {
        None
    }
}

pub type ConditionRef = Arc<dyn Condition>;

/// Conditions that can generate a URL matching themselves.
pub trait Urlable {
    fn to_url(
        &self,
        arguments: &Arguments,
        context: &UrlContext,
    ) -> Result<String, ConfigurationError>;
}

/// Base URLs used for reversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlContext {
    pub home_url: Url,
    pub admin_url: Url,
}

impl UrlContext {
    pub fn new(home_url: Url, admin_url: Url) -> Self {
        Self {
            home_url,
            admin_url,
        }
    }

    /// Admin area assumed at `{home}/admin/`.
    pub fn from_home(home_url: Url) -> Self {
        let admin_url = home_url
            .join("admin/")
            .unwrap_or_else(|_| home_url.clone());
        Self {
            home_url,
            admin_url,
        }
    }
}
