use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::Condition;
use crate::http::Request;
use crate::routing::arguments::Arguments;

/// Predicate backing a custom condition. Receives the fixed extra arguments.
pub type Predicate = Arc<dyn Fn(&Request, &[Value]) -> bool + Send + Sync>;

/// Arbitrary predicate plus fixed extra arguments.
///
/// The arguments handed to the route are exactly the extras, positionally.
#[derive(Clone)]
pub struct CustomCondition {
    predicate: Predicate,
    extra: Vec<Value>,
}

impl CustomCondition {
    pub fn new<F>(predicate: F, extra: Vec<Value>) -> Self
    where
        F: Fn(&Request, &[Value]) -> bool + Send + Sync + 'static,
    {
        Self::from_predicate(Arc::new(predicate), extra)
    }

    pub fn from_predicate(predicate: Predicate, extra: Vec<Value>) -> Self {
        Self { predicate, extra }
    }

    pub fn extra(&self) -> &[Value] {
        &self.extra
    }
}

impl fmt::Debug for CustomCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCondition")
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

impl Condition for CustomCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        (self.predicate)(request, &self.extra)
    }

    fn arguments(&self, _request: &Request) -> Arguments {
        let mut arguments = Arguments::new();
        for value in &self.extra {
            arguments.push(value.clone());
        }
        arguments
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_predicate_sees_extras() {
        let condition = CustomCondition::new(
            |request, extra| request.query("lang").as_deref() == extra[0].as_str(),
            vec![json!("en")],
        );

        assert!(condition.is_satisfied(&Request::get("/?lang=en").unwrap()));
        assert!(!condition.is_satisfied(&Request::get("/?lang=fr").unwrap()));
    }

    #[test]
    fn test_arguments_are_the_fixed_extras() {
        let condition = CustomCondition::new(|_, _| false, vec![json!(1), json!("two")]);
        let arguments = condition.arguments(&Request::get("/anything").unwrap());

        assert_eq!(arguments.values().cloned().collect::<Vec<_>>(), vec![json!(1), json!("two")]);
        assert!(arguments.iter().all(|(key, _)| key.is_none()));
    }
}
