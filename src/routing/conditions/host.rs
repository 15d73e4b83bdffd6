//! Conditions over host runtime facts.
//!
//! Each reads the `HostContext` attached to the request. A request without a
//! host context satisfies none of them.

use serde_json::Value;

use super::{Condition, UrlContext, Urlable};
use crate::error::ConfigurationError;
use crate::http::{admin_page_hook, HostContext, PostContext, Request};
use crate::routing::arguments::Arguments;

fn singular_post(request: &Request) -> Option<&PostContext> {
    request.host().and_then(|host| host.post.as_ref())
}

/// Singular item with the given id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostIdCondition {
    post_id: u64,
}

impl PostIdCondition {
    pub fn new(post_id: u64) -> Self {
        Self { post_id }
    }
}

impl Condition for PostIdCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        singular_post(request).is_some_and(|post| post.id == self.post_id)
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        Arguments::new().with("post_id", self.post_id)
    }
}

/// Singular item with the given slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSlugCondition {
    post_slug: String,
}

impl PostSlugCondition {
    pub fn new(post_slug: impl Into<String>) -> Self {
        Self {
            post_slug: post_slug.into(),
        }
    }
}

impl Condition for PostSlugCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        singular_post(request).is_some_and(|post| post.slug == self.post_slug)
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        Arguments::new().with("post_slug", self.post_slug.as_str())
    }
}

/// Singular item with the given status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostStatusCondition {
    post_status: String,
}

impl PostStatusCondition {
    pub fn new(post_status: impl Into<String>) -> Self {
        Self {
            post_status: post_status.into(),
        }
    }
}

impl Condition for PostStatusCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        singular_post(request).is_some_and(|post| post.status == self.post_status)
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        Arguments::new().with("post_status", self.post_status.as_str())
    }
}

/// Singular item using a template, optionally limited to some post types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTemplateCondition {
    post_template: String,
    post_types: Vec<String>,
}

impl PostTemplateCondition {
    pub fn new(post_template: impl Into<String>, post_types: Vec<String>) -> Self {
        Self {
            post_template: post_template.into(),
            post_types,
        }
    }
}

impl Condition for PostTemplateCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        let Some(host) = request.host() else {
            return false;
        };
        let Some(post) = host.post.as_ref() else {
            return false;
        };

        let type_matches =
            self.post_types.is_empty() || self.post_types.iter().any(|t| *t == post.post_type);

        type_matches && host.post_template() == Some(self.post_template.as_str())
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        Arguments::new()
            .with("post_template", self.post_template.as_str())
            .with("post_types", self.post_types.clone())
    }
}

/// Singular item of the given post type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTypeCondition {
    post_type: String,
}

impl PostTypeCondition {
    pub fn new(post_type: impl Into<String>) -> Self {
        Self {
            post_type: post_type.into(),
        }
    }
}

impl Condition for PostTypeCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        singular_post(request).is_some_and(|post| post.post_type == self.post_type)
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        Arguments::new().with("post_type", self.post_type.as_str())
    }
}

/// A query variable is set, optionally to a specific value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVarCondition {
    query_var: String,
    value: Option<String>,
}

impl QueryVarCondition {
    pub fn new(query_var: impl Into<String>, value: Option<String>) -> Self {
        Self {
            query_var: query_var.into(),
            value,
        }
    }
}

impl Condition for QueryVarCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        let Some(actual) = request.host().and_then(|host| host.query_var(&self.query_var)) else {
            return false;
        };

        match &self.value {
            Some(expected) => expected == actual,
            None => true,
        }
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        let value = self.value.clone().map_or(Value::Null, Value::String);
        Arguments::new()
            .with("query_var", self.query_var.as_str())
            .with("value", value)
    }
}

/// Background (ajax) request for an action.
///
/// `private` admits logged-in users, `public` admits anonymous ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxCondition {
    action: String,
    private: bool,
    public: bool,
}

impl AjaxCondition {
    pub fn new(action: impl Into<String>, private: bool, public: bool) -> Self {
        Self {
            action: action.into(),
            private,
            public,
        }
    }

    fn audience_matches(&self, host: &HostContext) -> bool {
        (self.private && host.logged_in) || (self.public && !host.logged_in)
    }
}

impl Condition for AjaxCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        let Some(host) = request.host().filter(|host| host.ajax) else {
            return false;
        };

        let action = request
            .body_param("action")
            .or_else(|| request.query("action"));

        action.as_deref() == Some(self.action.as_str()) && self.audience_matches(host)
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        Arguments::new().with("action", self.action.as_str())
    }

    fn as_urlable(&self) -> Option<&dyn Urlable> {
        Some(self)
    }
}

impl Urlable for AjaxCondition {
    fn to_url(&self, _arguments: &Arguments, context: &UrlContext) -> Result<String, ConfigurationError> {
        let mut url = context
            .admin_url
            .join("admin-ajax.php")
            .map_err(|_| ConfigurationError::NotUrlable)?;
        url.query_pairs_mut().append_pair("action", &self.action);
        Ok(url.into())
    }
}

/// Admin page registered under an optional parent menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCondition {
    menu: String,
    parent_menu: String,
}

impl AdminCondition {
    pub fn new(menu: impl Into<String>, parent_menu: impl Into<String>) -> Self {
        Self {
            menu: menu.into(),
            parent_menu: parent_menu.into(),
        }
    }

    pub fn hook(&self) -> String {
        admin_page_hook(&self.menu, &self.parent_menu)
    }
}

impl Condition for AdminCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        let Some(host) = request.host() else {
            return false;
        };

        if !host.admin || host.ajax {
            return false;
        }

        host.screen.as_deref() == Some(self.hook().as_str())
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        Arguments::new()
            .with("menu", self.menu.as_str())
            .with("parent_menu", self.parent_menu.as_str())
            .with("hook", self.hook())
    }

    fn as_urlable(&self) -> Option<&dyn Urlable> {
        Some(self)
    }
}

impl Urlable for AdminCondition {
    fn to_url(&self, _arguments: &Arguments, context: &UrlContext) -> Result<String, ConfigurationError> {
        let page = if self.parent_menu.contains(".php") {
            self.parent_menu.as_str()
        } else {
            "admin.php"
        };
        let mut url = context
            .admin_url
            .join(page)
            .map_err(|_| ConfigurationError::NotUrlable)?;
        url.query_pairs_mut().append_pair("page", &self.menu);
        Ok(url.into())
    }
}

/// REST API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestCondition {
    route: String,
}

impl RestCondition {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
        }
    }
}

impl Condition for RestCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        request.host().is_some_and(|host| host.rest)
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        Arguments::new().with("route", self.route.as_str())
    }
}
