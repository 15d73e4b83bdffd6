//! Host runtime facts.
//!
//! The kernel does not own sessions, users or content; the host does. Whatever
//! embeds the kernel describes the current request through a `HostContext`
//! attached to the `Request`. Host-attribute conditions and the user/csrf
//! middleware only ever read this value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Singular content item the host resolved for the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PostContext {
    pub id: u64,
    pub post_type: String,
    pub slug: String,
    pub status: String,
    /// Assigned template; empty means "default".
    pub template: String,
}

/// Snapshot of host state for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostContext {
    /// Request runs in the admin area.
    pub admin: bool,
    /// Request is a background (ajax) call.
    pub ajax: bool,
    /// Request targets the REST API.
    pub rest: bool,
    pub logged_in: bool,
    pub capabilities: BTreeSet<String>,
    /// Hook name of the current admin screen, if any.
    pub screen: Option<String>,
    /// Singular item being displayed, if any.
    pub post: Option<PostContext>,
    pub query_vars: BTreeMap<String, String>,
    /// Where unauthenticated users are sent.
    pub login_url: Option<String>,
}

impl HostContext {
    pub fn can(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn query_var(&self, name: &str) -> Option<&str> {
        self.query_vars.get(name).map(String::as_str)
    }

    /// Template of the singular item, `"default"` when none was assigned.
    pub fn post_template(&self) -> Option<&str> {
        self.post.as_ref().map(|post| {
            if post.template.is_empty() {
                "default"
            } else {
                post.template.as_str()
            }
        })
    }
}

/// Hook name the host gives an admin page registered under `parent`.
///
/// Top-level pages become `toplevel_page_{menu}`; sub pages drop the parent's
/// `.php` suffix, e.g. `tools.php` + `export` → `tools_page_export`.
pub fn admin_page_hook(menu: &str, parent: &str) -> String {
    if parent.is_empty() {
        return format!("toplevel_page_{menu}");
    }

    let parent = parent.split('?').next().unwrap_or(parent);
    let parent = parent.strip_suffix(".php").unwrap_or(parent);
    format!("{parent}_page_{menu}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_page_hook() {
        assert_eq!(admin_page_hook("reports", ""), "toplevel_page_reports");
        assert_eq!(admin_page_hook("export", "tools.php"), "tools_page_export");
        assert_eq!(
            admin_page_hook("settings", "edit.php?post_type=book"),
            "edit_page_settings"
        );
    }

    #[test]
    fn test_post_template_defaults() {
        let mut host = HostContext::default();
        assert_eq!(host.post_template(), None);

        host.post = Some(PostContext::default());
        assert_eq!(host.post_template(), Some("default"));

        host.post = Some(PostContext {
            template: "landing.php".into(),
            ..PostContext::default()
        });
        assert_eq!(host.post_template(), Some("landing.php"));
    }
}
