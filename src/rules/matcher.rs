// ABOUTME: Header match that tags requests for the replacement slot during testing.
// ABOUTME: Builds the listener rule installed by test-traffic isolation.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::elb::{ForwardAction, MANAGED_TAG, NewRule, RuleCondition, TEST_ISOLATION_TAG};
use crate::types::TargetGroupArn;

/// Requests carrying `header` with one of `values` are routed to the replacement slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestTrafficRule {
    #[serde(default = "default_header")]
    pub header: String,

    #[serde(default = "default_values", deserialize_with = "deserialize_values")]
    pub values: NonEmpty<String>,

    /// Preferred rule priority; the next free one is used when taken.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_header() -> String {
    "counter_no".to_string()
}

fn default_values() -> NonEmpty<String> {
    NonEmpty::from(("88888".to_string(), vec!["99999".to_string()]))
}

fn deserialize_values<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one header value is required"))
}

fn default_priority() -> u32 {
    1
}

impl Default for TestTrafficRule {
    fn default() -> Self {
        Self {
            header: default_header(),
            values: default_values(),
            priority: default_priority(),
        }
    }
}

impl TestTrafficRule {
    /// Conditions of the isolation rule, with values in a canonical order.
    pub fn conditions(&self) -> Vec<RuleCondition> {
        let mut values: Vec<String> = self.values.iter().cloned().collect();
        values.sort();
        values.dedup();
        vec![RuleCondition::HttpHeader {
            name: self.header.clone(),
            values,
        }]
    }

    pub fn new_rule(&self, target: &TargetGroupArn, priority: u32) -> NewRule {
        let mut tags = BTreeMap::new();
        tags.insert(MANAGED_TAG.to_string(), TEST_ISOLATION_TAG.to_string());
        NewRule {
            priority,
            conditions: self.conditions(),
            action: ForwardAction::single(target.clone()),
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_books_setup() {
        let rule = TestTrafficRule::default();
        assert_eq!(rule.header, "counter_no");
        assert_eq!(rule.values.len(), 2);
        assert_eq!(rule.priority, 1);
    }

    #[test]
    fn conditions_are_canonical() {
        let rule = TestTrafficRule {
            values: NonEmpty::from((
                "99999".to_string(),
                vec!["88888".to_string(), "99999".to_string()],
            )),
            ..TestTrafficRule::default()
        };
        assert_eq!(
            rule.conditions(),
            vec![RuleCondition::HttpHeader {
                name: "counter_no".into(),
                values: vec!["88888".into(), "99999".into()],
            }]
        );
    }

    #[test]
    fn new_rule_is_tagged() {
        let rule = TestTrafficRule::default().new_rule(&TargetGroupArn::new("tg/green"), 4);
        assert_eq!(rule.priority, 4);
        assert_eq!(
            rule.tags.get(MANAGED_TAG).map(String::as_str),
            Some(TEST_ISOLATION_TAG)
        );
    }
}
