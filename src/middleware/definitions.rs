//! Middleware definitions: aliases, groups and priority.
//!
//! # Responsibilities
//! - Expand short names, `"name:arg1,arg2"` specs and groups into molecules
//! - Prepend the special groups to every main group
//! - Deduplicate (first occurrence wins) and sort by declared priority
//!
//! # Design Decisions
//! - Main groups get the special groups prepended even when they already
//!   include them; the later `unique` pass removes the repeats
//! - Group expansion keeps a stack and reports cycles instead of recursing forever
//! - Priority entries may be aliases; they are compared after alias resolution
//! - Sorting is a stable sort, so equal priorities keep their input order

use std::cmp::Reverse;
use std::collections::HashMap;

use super::registry::MiddlewareRegistry;
use crate::config::MiddlewareConfig;
use crate::error::ConfigurationError;

/// A resolved middleware: registry key plus literal arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Molecule {
    pub class: String,
    pub args: Vec<String>,
}

impl Molecule {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(class: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class: class.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Resolver for middleware specs.
#[derive(Debug, Clone)]
pub struct MiddlewareDefinitions {
    registry: MiddlewareRegistry,
    aliases: HashMap<String, String>,
    groups: HashMap<String, Vec<String>>,
    priority: Vec<String>,
    special_groups: Vec<String>,
    prepend_special_groups_to: Vec<String>,
}

impl MiddlewareDefinitions {
    /// Definitions over `registry` with empty `core` and `global` special
    /// groups prepended to `web`, `admin` and `ajax`.
    pub fn new(registry: MiddlewareRegistry) -> Self {
        let special_groups = vec!["core".to_string(), "global".to_string()];
        let groups = special_groups
            .iter()
            .map(|group| (group.clone(), Vec::new()))
            .collect();

        Self {
            registry,
            aliases: HashMap::new(),
            groups,
            priority: Vec::new(),
            special_groups,
            prepend_special_groups_to: vec!["web".into(), "admin".into(), "ajax".into()],
        }
    }

    /// Definitions from configuration. Special and main groups the
    /// configuration leaves out start empty.
    pub fn from_config(config: &MiddlewareConfig, registry: MiddlewareRegistry) -> Self {
        let mut definitions = Self::new(registry);
        definitions.aliases = config
            .aliases
            .iter()
            .map(|(alias, key)| (alias.clone(), key.clone()))
            .collect();
        for name in config.special_groups.iter().chain(&config.prepend_special_groups_to) {
            definitions.groups.entry(name.clone()).or_default();
        }
        for (name, members) in &config.groups {
            definitions.groups.insert(name.clone(), members.clone());
        }
        definitions.priority = config.priority.clone();
        definitions.special_groups = config.special_groups.clone();
        definitions.prepend_special_groups_to = config.prepend_special_groups_to.clone();
        definitions
    }

    pub fn registry(&self) -> &MiddlewareRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MiddlewareRegistry {
        &mut self.registry
    }

    pub fn alias(&mut self, alias: impl Into<String>, key: impl Into<String>) -> &mut Self {
        self.aliases.insert(alias.into(), key.into());
        self
    }

    pub fn group<I, S>(&mut self, name: impl Into<String>, members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(name.into(), members.into_iter().map(Into::into).collect());
        self
    }

    /// Highest priority first.
    pub fn set_priority<I, S>(&mut self, priority: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = priority.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_special_groups<I, S>(&mut self, groups: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.special_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn set_prepend_special_groups_to<I, S>(&mut self, groups: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prepend_special_groups_to = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Registry key for a name: alias target, else the name itself if registered.
    pub fn expand_atom(&self, name: &str) -> Result<String, ConfigurationError> {
        if let Some(key) = self.aliases.get(name) {
            return Ok(key.clone());
        }
        if self.registry.contains(name) {
            return Ok(name.to_string());
        }
        Err(ConfigurationError::UnknownMiddleware(name.to_string()))
    }

    /// Expand one spec: `"name:a,b"` is a single atom with arguments, a group
    /// name expands to its members, anything else is an atom.
    pub fn expand_molecule(&self, spec: &str) -> Result<Vec<Molecule>, ConfigurationError> {
        self.expand_molecule_guarded(spec, &mut Vec::new())
    }

    pub fn expand_group(&self, name: &str) -> Result<Vec<Molecule>, ConfigurationError> {
        self.expand_group_guarded(name, &mut Vec::new())
    }

    /// Expand every spec in order.
    pub fn expand<S: AsRef<str>>(&self, specs: &[S]) -> Result<Vec<Molecule>, ConfigurationError> {
        self.expand_guarded(specs, &mut Vec::new())
    }

    fn expand_guarded<S: AsRef<str>>(
        &self,
        specs: &[S],
        stack: &mut Vec<String>,
    ) -> Result<Vec<Molecule>, ConfigurationError> {
        let mut molecules = Vec::new();
        for spec in specs {
            molecules.extend(self.expand_molecule_guarded(spec.as_ref(), stack)?);
        }
        Ok(molecules)
    }

    fn expand_molecule_guarded(
        &self,
        spec: &str,
        stack: &mut Vec<String>,
    ) -> Result<Vec<Molecule>, ConfigurationError> {
        if let Some((name, args)) = spec.split_once(':') {
            let class = self.expand_atom(name)?;
            return Ok(vec![Molecule::with_args(class, args.split(','))]);
        }

        if self.groups.contains_key(spec) {
            return self.expand_group_guarded(spec, stack);
        }

        Ok(vec![Molecule::new(self.expand_atom(spec)?)])
    }

    fn expand_group_guarded(
        &self,
        name: &str,
        stack: &mut Vec<String>,
    ) -> Result<Vec<Molecule>, ConfigurationError> {
        let members = self
            .groups
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownMiddlewareGroup(name.to_string()))?;

        if stack.iter().any(|entered| entered == name) {
            let mut path = stack.clone();
            path.push(name.to_string());
            return Err(ConfigurationError::MiddlewareGroupCycle(path.join(" -> ")));
        }

        let mut specs: Vec<&str> = Vec::new();
        if self.prepend_special_groups_to.iter().any(|group| group == name) {
            specs.extend(self.special_groups.iter().map(String::as_str));
        }
        specs.extend(members.iter().map(String::as_str));

        stack.push(name.to_string());
        let expanded = self.expand_guarded(&specs, stack);
        stack.pop();
        expanded
    }

    /// Drop repeats, keeping the first occurrence.
    pub fn unique(molecules: Vec<Molecule>) -> Vec<Molecule> {
        let mut unique: Vec<Molecule> = Vec::with_capacity(molecules.len());
        for molecule in molecules {
            if !unique.contains(&molecule) {
                unique.push(molecule);
            }
        }
        unique
    }

    /// Position in the reversed priority list; `-1` when not listed.
    pub fn priority_of(&self, class: &str) -> i64 {
        self.priority
            .iter()
            .rev()
            .position(|entry| self.aliases.get(entry).unwrap_or(entry) == class)
            .map_or(-1, |index| index as i64)
    }

    /// Highest priority first; ties keep their relative order.
    pub fn sort(&self, mut molecules: Vec<Molecule>) -> Vec<Molecule> {
        molecules.sort_by_key(|molecule| Reverse(self.priority_of(&molecule.class)));
        molecules
    }

    /// Expand, deduplicate and sort.
    pub fn resolve<S: AsRef<str>>(&self, specs: &[S]) -> Result<Vec<Molecule>, ConfigurationError> {
        let expanded = self.expand(specs)?;
        let resolved = self.sort(Self::unique(expanded));
        tracing::trace!(specs = specs.len(), molecules = resolved.len(), "Middleware resolved");
        Ok(resolved)
    }

    /// Check every group expands cleanly.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut names: Vec<&String> = self.groups.keys().collect();
        names.sort();
        for name in names {
            self.expand_group(name)?;
        }
        Ok(())
    }
}
