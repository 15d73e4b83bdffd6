use super::{Condition, ConditionRef};
use crate::http::Request;
use crate::routing::arguments::Arguments;

/// Inverts another condition. Arguments pass through untouched.
#[derive(Debug, Clone)]
pub struct NegateCondition {
    condition: ConditionRef,
}

impl NegateCondition {
    pub fn new(condition: ConditionRef) -> Self {
        Self { condition }
    }

    pub fn inner(&self) -> &ConditionRef {
        &self.condition
    }
}

impl Condition for NegateCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        !self.condition.is_satisfied(request)
    }

    fn arguments(&self, request: &Request) -> Arguments {
        self.condition.arguments(request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::routing::conditions::UrlCondition;

    #[test]
    fn test_negation_inverts_and_passes_arguments() {
        let inner: ConditionRef = Arc::new(UrlCondition::new("/foo/{id}").unwrap());
        let negated = NegateCondition::new(inner.clone());

        for path in ["/foo/1", "/bar"] {
            let request = Request::get(path).unwrap();
            assert_eq!(negated.is_satisfied(&request), !inner.is_satisfied(&request));
            assert_eq!(negated.arguments(&request), inner.arguments(&request));
        }
    }
}
