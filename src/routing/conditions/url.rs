//! URL template condition.
//!
//! Templates look like `/posts/{id}/{slug?}/`. A placeholder must sit between
//! two slashes, names start with a letter and continue with word characters,
//! and a trailing `?` makes it optional. `*` matches every request.
//!
//! # Design Decisions
//! - Templates are tokenized once at construction; the matching regex is
//!   compiled lazily on first use
//! - `where` constraints are plain regexes searched (not anchored) against the
//!   captured value; they are checked only after the template itself matched

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use super::{Condition, UrlContext, Urlable};
use crate::error::ConfigurationError;
use crate::http::Request;
use crate::routing::arguments::{scalar_to_string, Arguments};
use crate::routing::url::{
    add_leading_slash, add_trailing_slash, join_home, remove_trailing_slash, request_path,
};

pub const WILDCARD: &str = "*";

const PARAMETER_PATTERN: &str = "[^/]+";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Parameter { name: String, optional: bool },
}

#[derive(Debug, Clone)]
pub struct UrlCondition {
    url: String,
    segments: Vec<Segment>,
    constraints: BTreeMap<String, Regex>,
    pattern: OnceLock<Option<Regex>>,
}

impl UrlCondition {
    pub fn new(url: &str) -> Result<Self, ConfigurationError> {
        Self::from_parts(url, BTreeMap::new())
    }

    /// Template plus per-parameter constraints.
    pub fn with_where<I, K, V>(url: &str, constraints: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let constraints = constraints
            .into_iter()
            .map(|(parameter, pattern)| {
                let parameter = parameter.into();
                Regex::new(pattern.as_ref())
                    .map(|regex| (parameter.clone(), regex))
                    .map_err(|e| ConfigurationError::InvalidWherePattern {
                        parameter,
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Self::from_parts(url, constraints)
    }

    fn from_parts(
        url: &str,
        constraints: BTreeMap<String, Regex>,
    ) -> Result<Self, ConfigurationError> {
        let url = if url == WILDCARD {
            url.to_string()
        } else {
            add_leading_slash(&add_trailing_slash(url, false), false)
        };

        let segments = if url == WILDCARD {
            Vec::new()
        } else {
            tokenize(&url).map_err(|reason| ConfigurationError::InvalidUrlTemplate {
                template: url.clone(),
                reason,
            })?
        };

        Ok(Self {
            url,
            segments,
            constraints,
            pattern: OnceLock::new(),
        })
    }

    /// Normalized template (leading and trailing slash).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_wildcard(&self) -> bool {
        self.url == WILDCARD
    }

    pub fn where_patterns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.constraints
            .iter()
            .map(|(parameter, regex)| (parameter.as_str(), regex.as_str()))
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Parameter { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Anchored regex source the request path is tested against.
    pub fn validation_pattern(&self) -> String {
        let mut pattern = String::from("^");
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Parameter { name, optional: false } => {
                    pattern.push_str(&format!("/(?P<{name}>{PARAMETER_PATTERN})"));
                }
                Segment::Parameter { name, optional: true } => {
                    pattern.push_str(&format!("(?:/(?P<{name}>{PARAMETER_PATTERN}))?"));
                }
            }
        }
        // Templates always end in a slash; make it optional.
        pattern.push_str("?$");
        pattern
    }

    fn pattern(&self) -> Option<&Regex> {
        self.pattern
            .get_or_init(|| match Regex::new(&self.validation_pattern()) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::error!(template = %self.url, error = %e, "URL template failed to compile");
                    None
                }
            })
            .as_ref()
    }

    /// Append `other` to this template, e.g. for group prefixes.
    ///
    /// A wildcard on either side yields a wildcard. Constraints merge with
    /// `other` winning on collisions.
    pub fn concatenate(&self, other: &UrlCondition) -> Result<UrlCondition, ConfigurationError> {
        if self.is_wildcard() || other.is_wildcard() {
            return UrlCondition::new(WILDCARD);
        }

        let leading = add_leading_slash(remove_trailing_slash(&self.url), true);
        let trailing = add_leading_slash(&add_trailing_slash(&other.url, false), false);

        let mut constraints = self.constraints.clone();
        constraints.extend(
            other
                .constraints
                .iter()
                .map(|(parameter, regex)| (parameter.clone(), regex.clone())),
        );

        UrlCondition::from_parts(&format!("{leading}{trailing}"), constraints)
    }

    fn matched_path(request: &Request) -> String {
        add_trailing_slash(&request_path(request), false)
    }

    fn constraints_satisfied(&self, request: &Request) -> bool {
        let arguments = self.arguments(request);
        self.constraints.iter().all(|(parameter, regex)| {
            let value = arguments.get_str(parameter).unwrap_or("");
            regex.is_match(value)
        })
    }
}

impl Condition for UrlCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        if self.is_wildcard() {
            return true;
        }

        let Some(pattern) = self.pattern() else {
            return false;
        };

        if !pattern.is_match(&Self::matched_path(request)) {
            return false;
        }

        self.constraints.is_empty() || self.constraints_satisfied(request)
    }

    fn arguments(&self, request: &Request) -> Arguments {
        let mut arguments = Arguments::new();
        if self.is_wildcard() {
            return arguments;
        }

        let Some(pattern) = self.pattern() else {
            return arguments;
        };

        let path = Self::matched_path(request);
        let Some(captures) = pattern.captures(&path) else {
            return arguments;
        };

        for name in self.parameter_names() {
            let value = captures.name(name).map_or("", |capture| capture.as_str());
            arguments.insert(name, value);
        }
        arguments
    }

    fn as_url(&self) -> Option<&UrlCondition> {
        Some(self)
    }

    fn as_urlable(&self) -> Option<&dyn Urlable> {
        Some(self)
    }
}

impl Urlable for UrlCondition {
    fn to_url(
        &self,
        arguments: &Arguments,
        context: &UrlContext,
    ) -> Result<String, ConfigurationError> {
        if self.is_wildcard() {
            return Err(ConfigurationError::NotUrlable);
        }

        let mut url = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => url.push_str(text),
                Segment::Parameter { name, optional } => {
                    let value = arguments
                        .get(name)
                        .and_then(scalar_to_string)
                        .unwrap_or_default();
                    let encoded: String =
                        ::url::form_urlencoded::byte_serialize(value.as_bytes()).collect();

                    if !encoded.is_empty() {
                        url.push('/');
                        url.push_str(&encoded);
                    } else if !optional {
                        return Err(ConfigurationError::MissingUrlParameter(name.clone()));
                    }
                }
            }
        }

        Ok(join_home(&context.home_url, remove_trailing_slash(&url)))
    }
}

/// Split a normalized template into literals and placeholders.
fn tokenize(url: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut seen = HashSet::new();
    let mut rest = url;

    while let Some(ch) = rest.chars().next() {
        if let Some((name, optional, consumed)) = placeholder_at(rest) {
            if !seen.insert(name) {
                return Err(format!("parameter \"{name}\" is used more than once"));
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Parameter {
                name: name.to_string(),
                optional,
            });
            rest = &rest[consumed..];
            continue;
        }

        literal.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// `/{name}` or `/{name?}` at the start of `rest`, followed by a `/`.
fn placeholder_at(rest: &str) -> Option<(&str, bool, usize)> {
    let inner = rest.strip_prefix("/{")?;

    let name_len = inner
        .char_indices()
        .take_while(|(index, ch)| {
            if *index == 0 {
                ch.is_ascii_alphabetic()
            } else {
                ch.is_ascii_alphanumeric() || *ch == '_'
            }
        })
        .count();
    if name_len == 0 {
        return None;
    }

    let name = &inner[..name_len];
    let after = &inner[name_len..];
    let (optional, after) = match after.strip_prefix('?') {
        Some(after) => (true, after),
        None => (false, after),
    };
    let after = after.strip_prefix('}')?;
    if !after.starts_with('/') {
        return None;
    }

    Some((name, optional, rest.len() - after.len()))
}

#[cfg(test)]
mod tests {
    use ::url::Url;

    use super::*;

    fn context() -> UrlContext {
        UrlContext::from_home(Url::parse("http://example.com/").unwrap())
    }

    fn request(path: &str) -> Request {
        Request::get(&format!("http://example.com{path}"))
            .unwrap()
            .with_home_url(Url::parse("http://example.com/").unwrap())
    }

    #[test]
    fn test_template_is_normalized() {
        assert_eq!(UrlCondition::new("foo/{id}").unwrap().url(), "/foo/{id}/");
        assert_eq!(UrlCondition::new("*").unwrap().url(), "*");
    }

    #[test]
    fn test_validation_pattern() {
        let condition = UrlCondition::new("/foo/{id}/{slug?}/").unwrap();
        assert_eq!(
            condition.validation_pattern(),
            "^/foo/(?P<id>[^/]+)(?:/(?P<slug>[^/]+))?/?$"
        );
        assert_eq!(condition.parameter_names(), vec!["id", "slug"]);
    }

    #[test]
    fn test_placeholder_requires_slashes_around_it() {
        let condition = UrlCondition::new("/foo-{id}/").unwrap();
        assert!(condition.parameter_names().is_empty());
        assert!(!condition.validation_pattern().contains("(?P<"));
    }

    #[test]
    fn test_matches_and_extracts_arguments() {
        let condition = UrlCondition::new("/foo/{id}/").unwrap();
        let req = request("/foo/42");

        assert!(condition.is_satisfied(&req));
        assert_eq!(
            condition.arguments(&req),
            [("id", "42")].into_iter().collect::<Arguments>()
        );
        assert!(!condition.is_satisfied(&request("/foo/42/extra")));
        assert!(!condition.is_satisfied(&request("/foo/")));
    }

    #[test]
    fn test_optional_parameter() {
        let condition = UrlCondition::new("/posts/{slug?}").unwrap();
        assert!(condition.is_satisfied(&request("/posts")));
        assert_eq!(condition.arguments(&request("/posts")).get_str("slug"), Some(""));
        assert_eq!(
            condition.arguments(&request("/posts/hello/")).get_str("slug"),
            Some("hello")
        );
    }

    #[test]
    fn test_wildcard_always_matches() {
        let condition = UrlCondition::new(WILDCARD).unwrap();
        assert!(condition.is_satisfied(&request("/anything/at/all")));
        assert!(condition.arguments(&request("/x")).is_empty());
    }

    #[test]
    fn test_where_constraints() {
        let condition = UrlCondition::with_where("/foo/{id}", [("id", r"^\d+$")]).unwrap();
        assert!(condition.is_satisfied(&request("/foo/42")));
        assert!(!condition.is_satisfied(&request("/foo/abc")));

        // A constraint on an absent parameter checks the empty string.
        let condition = UrlCondition::with_where("/foo/", [("missing", r"^$")]).unwrap();
        assert!(condition.is_satisfied(&request("/foo")));
    }

    #[test]
    fn test_invalid_templates_and_patterns() {
        assert!(matches!(
            UrlCondition::new("/{id}/{id}/"),
            Err(ConfigurationError::InvalidUrlTemplate { .. })
        ));
        assert!(matches!(
            UrlCondition::with_where("/{id}/", [("id", "(")]),
            Err(ConfigurationError::InvalidWherePattern { .. })
        ));
    }

    #[test]
    fn test_concatenate() {
        let prefix = UrlCondition::with_where("/users/{user}/", [("user", r"^\d+$")]).unwrap();
        let suffix = UrlCondition::with_where("/posts/{post}", [("post", r"^\w+$")]).unwrap();

        let joined = prefix.concatenate(&suffix).unwrap();
        assert_eq!(joined.url(), "/users/{user}/posts/{post}/");
        assert_eq!(joined.where_patterns().count(), 2);
        assert!(joined.is_satisfied(&request("/users/7/posts/hello")));
        assert!(!joined.is_satisfied(&request("/users/x/posts/hello")));

        let wildcard = UrlCondition::new(WILDCARD).unwrap();
        assert!(prefix.concatenate(&wildcard).unwrap().is_wildcard());
        assert!(wildcard.concatenate(&suffix).unwrap().is_wildcard());
    }

    #[test]
    fn test_concatenate_overrides_constraints() {
        let old = UrlCondition::with_where("/a/{id}/", [("id", "old")]).unwrap();
        let new = UrlCondition::with_where("/b/", [("id", "new")]).unwrap();
        let joined = old.concatenate(&new).unwrap();
        assert_eq!(joined.where_patterns().collect::<Vec<_>>(), vec![("id", "new")]);
    }

    #[test]
    fn test_to_url() {
        let condition = UrlCondition::new("/foo/{id}/{slug?}/").unwrap();
        let args: Arguments = [("id", "4 2")].into_iter().collect();
        assert_eq!(
            condition.to_url(&args, &context()).unwrap(),
            "http://example.com/foo/4+2"
        );

        let args: Arguments = [("id", "1"), ("slug", "x")].into_iter().collect();
        assert_eq!(
            condition.to_url(&args, &context()).unwrap(),
            "http://example.com/foo/1/x"
        );

        assert_eq!(
            condition.to_url(&Arguments::new(), &context()),
            Err(ConfigurationError::MissingUrlParameter("id".into()))
        );
    }

    #[test]
    fn test_round_trip() {
        let condition = UrlCondition::new("/archive/{year}/{month}/").unwrap();
        let matching = request("/archive/2024/05");
        let url = condition
            .to_url(&condition.arguments(&matching), &context())
            .unwrap();

        let regenerated = Request::get(&url)
            .unwrap()
            .with_home_url(Url::parse("http://example.com/").unwrap());
        assert!(condition.is_satisfied(&regenerated));
    }
}
