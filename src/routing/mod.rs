//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route definition (at startup):
//!     blueprint.rs (fluent attributes)
//!     → attributes.rs (merge with the enclosing group frame)
//!     → conditions/ (build condition trees)
//!     → router.rs (validate, register in order)
//!
//! Incoming Request:
//!     → url.rs (path relative to the home URL)
//!     → router.rs (first route whose methods and condition match)
//!     → Return: matched Route or None
//! ```
//!
//! # Design Decisions
//! - Conditions are composable predicates, not just URL templates
//! - Deterministic: registration order decides overlapping routes
//! - Group frames exist only while routes are being defined

pub mod arguments;
pub mod attributes;
pub mod blueprint;
pub mod conditions;
pub mod route;
pub mod router;
pub mod url;

pub use arguments::Arguments;
pub use attributes::{QueryFilter, QueryVars, RouteAttributes};
pub use blueprint::RouteBlueprint;
pub use conditions::{Condition, ConditionFactory, ConditionRef, ConditionSpec, UrlContext, Urlable};
pub use route::{Route, ALL_METHODS};
pub use router::Router;
