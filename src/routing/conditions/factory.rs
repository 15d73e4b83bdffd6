//! Condition construction from declarative specs.
//!
//! # Responsibilities
//! - Map type names to constructors (registered at startup)
//! - Build conditions from specs: instances, URL strings, typed lists,
//!   conjunctions and bare predicates
//! - Merge a group condition with a route condition
//!
//! # Design Decisions
//! - The registry is an explicit name → constructor table; nothing is looked up
//!   by reflection
//! - A leading `!` on a type name wraps the result in a `NegateCondition`
//! - Unknown types and malformed arguments are configuration errors

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{
    AdminCondition, AjaxCondition, ConditionRef, CustomCondition, MultipleCondition,
    NegateCondition, PostIdCondition, PostSlugCondition, PostStatusCondition,
    PostTemplateCondition, PostTypeCondition, Predicate, QueryVarCondition, RestCondition,
    UrlCondition,
};
use crate::error::ConfigurationError;
use crate::http::Request;

/// Declarative description of a condition.
#[derive(Clone)]
pub enum ConditionSpec {
    /// Ready-made condition, used as is.
    Condition(ConditionRef),
    /// URL template.
    Url(String),
    /// Registered type name (optionally `!`-prefixed) plus arguments.
    Typed(String, Vec<ConditionArg>),
    /// Every nested spec must hold.
    All(Vec<ConditionSpec>),
    /// Custom predicate plus its fixed extra arguments.
    Predicate(Predicate, Vec<Value>),
}

impl ConditionSpec {
    pub fn typed<I, A>(kind: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ConditionArg>,
    {
        ConditionSpec::Typed(kind.into(), args.into_iter().map(Into::into).collect())
    }

    pub fn predicate<F>(predicate: F, extra: Vec<Value>) -> Self
    where
        F: Fn(&Request, &[Value]) -> bool + Send + Sync + 'static,
    {
        ConditionSpec::Predicate(Arc::new(predicate), extra)
    }

    /// URL template with `where` constraints.
    pub fn url_where<'a>(url: &str, constraints: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let constraints: serde_json::Map<String, Value> = constraints
            .into_iter()
            .map(|(parameter, pattern)| (parameter.to_string(), Value::from(pattern)))
            .collect();
        ConditionSpec::Typed(
            "url".to_string(),
            vec![ConditionArg::from(url), ConditionArg::Value(Value::Object(constraints))],
        )
    }
}

impl fmt::Debug for ConditionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionSpec::Condition(condition) => f.debug_tuple("Condition").field(condition).finish(),
            ConditionSpec::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ConditionSpec::Typed(kind, args) => f.debug_tuple("Typed").field(kind).field(args).finish(),
            ConditionSpec::All(specs) => f.debug_tuple("All").field(specs).finish(),
            ConditionSpec::Predicate(_, extra) => f.debug_tuple("Predicate").field(extra).finish(),
        }
    }
}

impl From<&str> for ConditionSpec {
    fn from(url: &str) -> Self {
        ConditionSpec::Url(url.to_string())
    }
}

impl From<String> for ConditionSpec {
    fn from(url: String) -> Self {
        ConditionSpec::Url(url)
    }
}

impl From<ConditionRef> for ConditionSpec {
    fn from(condition: ConditionRef) -> Self {
        ConditionSpec::Condition(condition)
    }
}

impl From<UrlCondition> for ConditionSpec {
    fn from(condition: UrlCondition) -> Self {
        ConditionSpec::Condition(Arc::new(condition))
    }
}

/// One argument of a typed spec.
#[derive(Clone)]
pub enum ConditionArg {
    Value(Value),
    Spec(ConditionSpec),
    Predicate(Predicate),
}

impl fmt::Debug for ConditionArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionArg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ConditionArg::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            ConditionArg::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<Value> for ConditionArg {
    fn from(value: Value) -> Self {
        ConditionArg::Value(value)
    }
}

impl From<&str> for ConditionArg {
    fn from(value: &str) -> Self {
        ConditionArg::Value(Value::from(value))
    }
}

impl From<String> for ConditionArg {
    fn from(value: String) -> Self {
        ConditionArg::Value(Value::from(value))
    }
}

impl From<bool> for ConditionArg {
    fn from(value: bool) -> Self {
        ConditionArg::Value(Value::from(value))
    }
}

impl From<u64> for ConditionArg {
    fn from(value: u64) -> Self {
        ConditionArg::Value(Value::from(value))
    }
}

impl From<ConditionSpec> for ConditionArg {
    fn from(spec: ConditionSpec) -> Self {
        ConditionArg::Spec(spec)
    }
}

/// Arguments of one typed spec, consumed front to back by a constructor.
#[derive(Debug)]
pub struct ConditionArgs {
    kind: String,
    args: VecDeque<ConditionArg>,
}

impl ConditionArgs {
    fn new(kind: &str, args: Vec<ConditionArg>) -> Self {
        Self {
            kind: kind.to_string(),
            args: args.into(),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigurationError {
        ConfigurationError::InvalidConditionArguments {
            kind: self.kind.clone(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn remaining(&self) -> usize {
        self.args.len()
    }

    /// Next argument as a string; numbers are stringified.
    pub fn string(&mut self, what: &str) -> Result<String, ConfigurationError> {
        self.optional_string(what)?
            .ok_or_else(|| self.invalid(format!("missing {what}")))
    }

    pub fn optional_string(&mut self, what: &str) -> Result<Option<String>, ConfigurationError> {
        match self.args.pop_front() {
            None | Some(ConditionArg::Value(Value::Null)) => Ok(None),
            Some(ConditionArg::Value(Value::String(text))) => Ok(Some(text)),
            Some(ConditionArg::Value(Value::Number(number))) => Ok(Some(number.to_string())),
            Some(_) => Err(self.invalid(format!("{what} must be a string"))),
        }
    }

    pub fn u64(&mut self, what: &str) -> Result<u64, ConfigurationError> {
        match self.args.pop_front() {
            Some(ConditionArg::Value(Value::Number(number))) => number
                .as_u64()
                .ok_or_else(|| self.invalid(format!("{what} must be a positive integer"))),
            Some(ConditionArg::Value(Value::String(text))) => text
                .trim()
                .parse()
                .map_err(|_| self.invalid(format!("{what} must be a positive integer"))),
            _ => Err(self.invalid(format!("missing {what}"))),
        }
    }

    pub fn bool_or(&mut self, what: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.args.pop_front() {
            None | Some(ConditionArg::Value(Value::Null)) => Ok(default),
            Some(ConditionArg::Value(Value::Bool(flag))) => Ok(flag),
            Some(_) => Err(self.invalid(format!("{what} must be a boolean"))),
        }
    }

    /// Next argument as a list of strings; a single string is a one-item list.
    pub fn string_list(&mut self, what: &str) -> Result<Vec<String>, ConfigurationError> {
        match self.args.pop_front() {
            None | Some(ConditionArg::Value(Value::Null)) => Ok(Vec::new()),
            Some(ConditionArg::Value(Value::String(text))) => Ok(vec![text]),
            Some(ConditionArg::Value(Value::Array(items))) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text),
                    _ => Err(self.invalid(format!("{what} must only contain strings"))),
                })
                .collect(),
            Some(_) => Err(self.invalid(format!("{what} must be a string or a list of strings"))),
        }
    }

    /// Next argument as a string → string map.
    pub fn string_map(&mut self, what: &str) -> Result<BTreeMap<String, String>, ConfigurationError> {
        match self.args.pop_front() {
            None | Some(ConditionArg::Value(Value::Null)) => Ok(BTreeMap::new()),
            Some(ConditionArg::Value(Value::Object(map))) => map
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(text) => Ok((key, text)),
                    _ => Err(self.invalid(format!("{what} values must be strings"))),
                })
                .collect(),
            Some(_) => Err(self.invalid(format!("{what} must be a map"))),
        }
    }

    pub fn predicate(&mut self) -> Result<Predicate, ConfigurationError> {
        match self.args.pop_front() {
            Some(ConditionArg::Predicate(predicate)) => Ok(predicate),
            _ => Err(self.invalid("missing predicate")),
        }
    }

    /// Next argument as a condition. Strings are URL templates.
    pub fn condition(&mut self, factory: &ConditionFactory) -> Result<ConditionRef, ConfigurationError> {
        match self.args.pop_front() {
            Some(ConditionArg::Spec(spec)) => factory.make(&spec),
            Some(ConditionArg::Value(Value::String(url))) => factory.make(&ConditionSpec::Url(url)),
            Some(ConditionArg::Predicate(predicate)) => {
                Ok(Arc::new(CustomCondition::from_predicate(predicate, Vec::new())))
            }
            _ => Err(self.invalid("missing condition")),
        }
    }

    /// Every remaining argument as a plain value.
    pub fn rest_values(&mut self) -> Result<Vec<Value>, ConfigurationError> {
        let mut values = Vec::new();
        while let Some(arg) = self.args.pop_front() {
            match arg {
                ConditionArg::Value(value) => values.push(value),
                _ => return Err(self.invalid("extra arguments must be plain values")),
            }
        }
        Ok(values)
    }

    /// Reject leftovers.
    pub fn finish(&self) -> Result<(), ConfigurationError> {
        if self.args.is_empty() {
            Ok(())
        } else {
            Err(self.invalid(format!("{} unexpected argument(s)", self.args.len())))
        }
    }
}

/// Builds a condition of one registered type.
pub type ConditionConstructor =
    Arc<dyn Fn(&ConditionFactory, &mut ConditionArgs) -> Result<ConditionRef, ConfigurationError> + Send + Sync>;

/// Registry of condition types.
#[derive(Clone, Default)]
pub struct ConditionFactory {
    types: HashMap<String, ConditionConstructor>,
}

impl fmt::Debug for ConditionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.types.keys().collect();
        types.sort();
        f.debug_struct("ConditionFactory").field("types", &types).finish()
    }
}

impl ConditionFactory {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in type.
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();

        factory.register("url", |_, args| {
            let url = args.string("url")?;
            let constraints = args.string_map("where")?;
            args.finish()?;
            Ok(Arc::new(UrlCondition::with_where(&url, constraints)?))
        });
        factory.register("custom", |_, args| {
            let predicate = args.predicate()?;
            let extra = args.rest_values()?;
            Ok(Arc::new(CustomCondition::from_predicate(predicate, extra)))
        });
        factory.register("multiple", |factory, args| {
            let mut conditions = Vec::with_capacity(args.remaining());
            while args.remaining() > 0 {
                conditions.push(args.condition(factory)?);
            }
            Ok(Arc::new(MultipleCondition::new(conditions)))
        });
        factory.register("negate", |factory, args| {
            let condition = args.condition(factory)?;
            args.finish()?;
            Ok(Arc::new(NegateCondition::new(condition)))
        });
        factory.register("post_id", |_, args| {
            let id = args.u64("post id")?;
            args.finish()?;
            Ok(Arc::new(PostIdCondition::new(id)))
        });
        factory.register("post_slug", |_, args| {
            let slug = args.string("post slug")?;
            args.finish()?;
            Ok(Arc::new(PostSlugCondition::new(slug)))
        });
        factory.register("post_status", |_, args| {
            let status = args.string("post status")?;
            args.finish()?;
            Ok(Arc::new(PostStatusCondition::new(status)))
        });
        factory.register("post_template", |_, args| {
            let template = args.string("post template")?;
            let post_types = args.string_list("post types")?;
            args.finish()?;
            Ok(Arc::new(PostTemplateCondition::new(template, post_types)))
        });
        factory.register("post_type", |_, args| {
            let post_type = args.string("post type")?;
            args.finish()?;
            Ok(Arc::new(PostTypeCondition::new(post_type)))
        });
        factory.register("query_var", |_, args| {
            let query_var = args.string("query var")?;
            let value = args.optional_string("value")?;
            args.finish()?;
            Ok(Arc::new(QueryVarCondition::new(query_var, value)))
        });
        factory.register("ajax", |_, args| {
            let action = args.string("action")?;
            let private = args.bool_or("private", true)?;
            let public = args.bool_or("public", false)?;
            args.finish()?;
            Ok(Arc::new(AjaxCondition::new(action, private, public)))
        });
        factory.register("admin", |_, args| {
            let menu = args.string("menu")?;
            let parent = args.optional_string("parent menu")?.unwrap_or_default();
            args.finish()?;
            Ok(Arc::new(AdminCondition::new(menu, parent)))
        });
        factory.register("rest", |_, args| {
            let route = args.string("route")?;
            args.finish()?;
            Ok(Arc::new(RestCondition::new(route)))
        });

        factory
    }

    /// Register (or replace) a condition type.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&ConditionFactory, &mut ConditionArgs) -> Result<ConditionRef, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.types.insert(kind.into(), Arc::new(constructor));
    }

    pub fn has_type(&self, kind: &str) -> bool {
        self.types.contains_key(kind)
    }

    /// Build a condition from a spec.
    pub fn make(&self, spec: &ConditionSpec) -> Result<ConditionRef, ConfigurationError> {
        match spec {
            ConditionSpec::Condition(condition) => Ok(condition.clone()),
            ConditionSpec::Url(url) => Ok(Arc::new(UrlCondition::new(url)?)),
            ConditionSpec::Typed(kind, args) => self.make_typed(kind, args.clone()),
            ConditionSpec::All(specs) => {
                let conditions = specs
                    .iter()
                    .map(|spec| self.make(spec))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arc::new(MultipleCondition::new(conditions)))
            }
            ConditionSpec::Predicate(predicate, extra) => Ok(Arc::new(
                CustomCondition::from_predicate(predicate.clone(), extra.clone()),
            )),
        }
    }

    fn make_typed(&self, kind: &str, args: Vec<ConditionArg>) -> Result<ConditionRef, ConfigurationError> {
        if let Some(inner) = kind.strip_prefix('!') {
            let condition = self.make_typed(inner, args)?;
            return Ok(Arc::new(NegateCondition::new(condition)));
        }

        let constructor = self
            .types
            .get(kind)
            .ok_or_else(|| ConfigurationError::UnknownConditionType(kind.to_string()))?;

        let mut args = ConditionArgs::new(kind, args);
        constructor(self, &mut args)
    }

    /// Combine a group condition with a route condition.
    ///
    /// URL conditions concatenate; anything else becomes a conjunction.
    pub fn merge(
        &self,
        old: Option<&ConditionSpec>,
        new: Option<&ConditionSpec>,
    ) -> Result<Option<ConditionRef>, ConfigurationError> {
        let (old, new) = match (old, new) {
            (old, None) => return old.map(|spec| self.make(spec)).transpose(),
            (None, Some(new)) => return self.make(new).map(Some),
            (Some(old), Some(new)) => (self.make(old)?, self.make(new)?),
        };

        if let (Some(leading), Some(trailing)) = (old.as_url(), new.as_url()) {
            return Ok(Some(Arc::new(leading.concatenate(trailing)?)));
        }

        Ok(Some(Arc::new(MultipleCondition::new(vec![old, new]))))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::{HostContext, PostContext};

    fn book_request() -> Request {
        Request::get("/books/dune").unwrap().with_host(HostContext {
            post: Some(PostContext {
                id: 3,
                post_type: "book".into(),
                ..PostContext::default()
            }),
            ..HostContext::default()
        })
    }

    #[test]
    fn test_make_url_from_string() {
        let factory = ConditionFactory::with_defaults();
        let condition = factory.make(&"/books/{slug}".into()).unwrap();
        assert_eq!(condition.as_url().map(UrlCondition::url), Some("/books/{slug}/"));
        assert!(condition.is_satisfied(&book_request()));
    }

    #[test]
    fn test_make_typed_and_negated() {
        let factory = ConditionFactory::with_defaults();
        let request = book_request();

        let is_book = factory.make(&ConditionSpec::typed("post_type", ["book"])).unwrap();
        assert!(is_book.is_satisfied(&request));

        let not_book = factory.make(&ConditionSpec::typed("!post_type", ["book"])).unwrap();
        assert!(!not_book.is_satisfied(&request));
        assert_eq!(not_book.arguments(&request), is_book.arguments(&request));

        let by_id = factory.make(&ConditionSpec::typed("post_id", [json!("3")])).unwrap();
        assert!(by_id.is_satisfied(&request));
    }

    #[test]
    fn test_make_url_with_where() {
        let factory = ConditionFactory::with_defaults();
        let condition = factory
            .make(&ConditionSpec::url_where("/items/{id}", [("id", r"^\d+$")]))
            .unwrap();
        assert!(condition.is_satisfied(&Request::get("/items/5").unwrap()));
        assert!(!condition.is_satisfied(&Request::get("/items/x").unwrap()));
    }

    #[test]
    fn test_make_nested_and_predicates() {
        let factory = ConditionFactory::with_defaults();
        let spec = ConditionSpec::typed(
            "multiple",
            [
                ConditionArg::from("/books/{slug}"),
                ConditionArg::Spec(ConditionSpec::predicate(
                    |request, _| request.host().is_some(),
                    vec![],
                )),
            ],
        );

        let condition = factory.make(&spec).unwrap();
        assert!(condition.is_satisfied(&book_request()));
        assert!(!condition.is_satisfied(&Request::get("/books/dune").unwrap()));
    }

    #[test]
    fn test_unknown_type_and_bad_arguments() {
        let factory = ConditionFactory::with_defaults();
        assert_eq!(
            factory.make(&ConditionSpec::typed("nope", Vec::<ConditionArg>::new())).unwrap_err(),
            ConfigurationError::UnknownConditionType("nope".into())
        );
        assert!(matches!(
            factory.make(&ConditionSpec::typed("post_type", Vec::<ConditionArg>::new())),
            Err(ConfigurationError::InvalidConditionArguments { .. })
        ));
        assert!(matches!(
            factory.make(&ConditionSpec::typed("rest", ["a", "b"])),
            Err(ConfigurationError::InvalidConditionArguments { .. })
        ));
    }

    #[test]
    fn test_merge_rules() {
        let factory = ConditionFactory::with_defaults();
        let prefix: ConditionSpec = "/books/".into();
        let suffix: ConditionSpec = "{slug}".into();

        assert!(factory.merge(None, None).unwrap().is_none());

        let only_old = factory.merge(Some(&prefix), None).unwrap().unwrap();
        assert_eq!(only_old.as_url().map(UrlCondition::url), Some("/books/"));

        let only_new = factory.merge(None, Some(&suffix)).unwrap().unwrap();
        assert_eq!(only_new.as_url().map(UrlCondition::url), Some("/{slug}/"));

        let joined = factory.merge(Some(&prefix), Some(&suffix)).unwrap().unwrap();
        assert_eq!(joined.as_url().map(UrlCondition::url), Some("/books/{slug}/"));

        let typed = ConditionSpec::typed("post_type", ["book"]);
        let both = factory.merge(Some(&prefix), Some(&typed)).unwrap().unwrap();
        assert!(both.as_url().is_none());
        assert!(both.is_satisfied(&Request::get("/books").unwrap().with_host(HostContext {
            post: Some(PostContext {
                post_type: "book".into(),
                ..PostContext::default()
            }),
            ..HostContext::default()
        })));
    }
}
