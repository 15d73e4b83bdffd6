//! Ordered route arguments.
//!
//! Conditions derive arguments from a request; handlers receive them. Entries
//! keep insertion order. Named entries are unique and merging overrides them
//! in place, positional entries always append.

use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: Vec<(Option<String>, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a named argument, replacing an existing one in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(name, _)| name.as_deref() == Some(key.as_str()))
        {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((Some(key), value)),
        }
    }

    /// Append a positional argument.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.entries.push((None, value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_deref() == Some(key))
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: Arguments) {
        for (key, value) in other.entries {
            match key {
                Some(key) => self.insert(key, value),
                None => self.push(value),
            }
        }
    }

    pub fn merged(mut self, other: Arguments) -> Self {
        self.merge(other);
        self
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &Value)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_deref(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object of the named entries; positional entries are keyed by index.
    pub fn to_json(&self) -> Value {
        let mut position = 0;
        let map = self
            .entries
            .iter()
            .map(|(key, value)| {
                let key = key.clone().unwrap_or_else(|| {
                    position += 1;
                    (position - 1).to_string()
                });
                (key, value.clone())
            })
            .collect();
        Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut arguments = Arguments::new();
        for (key, value) in iter {
            arguments.insert(key, value);
        }
        arguments
    }
}

/// Stringify a scalar argument for URL substitution.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("1".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_named_override_in_place() {
        let mut args: Arguments = [("id", "1"), ("slug", "a")].into_iter().collect();
        args.merge([("id", "2")].into_iter().collect());

        let keys: Vec<_> = args.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![Some("id"), Some("slug")]);
        assert_eq!(args.get_str("id"), Some("2"));
    }

    #[test]
    fn test_positional_values_append() {
        let mut args = Arguments::new();
        args.push(1);
        let mut other = Arguments::new();
        other.push(1);
        args.merge(other);

        assert_eq!(args.len(), 2);
        assert_eq!(args.to_json(), json!({"0": 1, "1": 1}));
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&json!("x")).as_deref(), Some("x"));
        assert_eq!(scalar_to_string(&json!(42)).as_deref(), Some("42"));
        assert_eq!(scalar_to_string(&Value::Null), None);
    }
}
