use super::{Condition, ConditionRef};
use crate::http::Request;
use crate::routing::arguments::Arguments;

/// AND of several conditions, evaluated in order.
#[derive(Debug, Clone)]
pub struct MultipleCondition {
    conditions: Vec<ConditionRef>,
}

impl MultipleCondition {
    pub fn new(conditions: Vec<ConditionRef>) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &[ConditionRef] {
        &self.conditions
    }
}

impl Condition for MultipleCondition {
    fn is_satisfied(&self, request: &Request) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.is_satisfied(request))
    }

    fn arguments(&self, request: &Request) -> Arguments {
        self.conditions
            .iter()
            .fold(Arguments::new(), |arguments, condition| {
                arguments.merged(condition.arguments(request))
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    struct Fixed {
        satisfied: bool,
        key: &'static str,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(satisfied: bool, key: &'static str) -> Arc<Self> {
            Arc::new(Self {
                satisfied,
                key,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Condition for Fixed {
        fn is_satisfied(&self, _request: &Request) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.satisfied
        }

        fn arguments(&self, _request: &Request) -> Arguments {
            Arguments::new().with(self.key, self.satisfied)
        }
    }

    #[test]
    fn test_all_must_hold_and_short_circuits() {
        let request = Request::get("/").unwrap();
        let first = Fixed::new(false, "a");
        let second = Fixed::new(true, "b");
        let condition = MultipleCondition::new(vec![first.clone(), second.clone()]);

        assert!(!condition.is_satisfied(&request));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);

        let both = MultipleCondition::new(vec![Fixed::new(true, "a"), Fixed::new(true, "b")]);
        assert!(both.is_satisfied(&request));
    }

    #[test]
    fn test_arguments_concatenate_in_order() {
        let request = Request::get("/").unwrap();
        let condition = MultipleCondition::new(vec![Fixed::new(true, "b"), Fixed::new(false, "a")]);

        let arguments = condition.arguments(&request);
        let keys: Vec<_> = arguments.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![Some("b"), Some("a")]);
        assert_eq!(arguments.to_json(), json!({"b": true, "a": false}));
    }

    #[test]
    fn test_empty_is_satisfied() {
        let condition = MultipleCondition::new(Vec::new());
        assert!(condition.is_satisfied(&Request::get("/").unwrap()));
    }
}
