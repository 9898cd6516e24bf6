// ABOUTME: Load balancer data model: listeners, rules, forward actions and target groups.
// ABOUTME: Forward actions are weighted so a listener can split traffic between slots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{ListenerArn, LoadBalancerArn, RuleArn, TargetGroupArn};

/// Tag key marking rules created by this tool.
pub const MANAGED_TAG: &str = "switchyard.managed";

/// Tag value marking test-isolation rules.
pub const TEST_ISOLATION_TAG: &str = "test-isolation";

/// A target group and its registered targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub arn: TargetGroupArn,
    pub name: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

/// One leg of a forward action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedTarget {
    pub target_group: TargetGroupArn,
    /// Share of traffic in percent.
    pub weight: u8,
}

/// Forward traffic to one or more target groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardAction {
    pub targets: Vec<WeightedTarget>,
}

impl ForwardAction {
    /// Forward everything to a single target group.
    pub fn single(target_group: TargetGroupArn) -> Self {
        Self {
            targets: vec![WeightedTarget {
                target_group,
                weight: 100,
            }],
        }
    }

    /// Split traffic: `percent` to `to`, the remainder to `from`.
    pub fn split(from: TargetGroupArn, to: TargetGroupArn, percent: u8) -> Self {
        let percent = percent.min(100);
        if percent == 0 {
            return Self::single(from);
        }
        if percent == 100 {
            return Self::single(to);
        }
        Self {
            targets: vec![
                WeightedTarget {
                    target_group: from,
                    weight: 100 - percent,
                },
                WeightedTarget {
                    target_group: to,
                    weight: percent,
                },
            ],
        }
    }

    /// Weight currently assigned to a target group.
    pub fn weight_of(&self, target_group: &TargetGroupArn) -> u8 {
        self.targets
            .iter()
            .filter(|t| &t.target_group == target_group)
            .map(|t| t.weight)
            .sum()
    }

    /// The only target group receiving traffic, if traffic is not split.
    pub fn sole_target(&self) -> Option<&TargetGroupArn> {
        let mut receiving = self.targets.iter().filter(|t| t.weight > 0);
        let first = receiving.next()?;
        match receiving.next() {
            None => Some(&first.target_group),
            Some(_) => None,
        }
    }

    pub fn references(&self, target_group: &TargetGroupArn) -> bool {
        self.targets.iter().any(|t| &t.target_group == target_group)
    }
}

/// Condition a rule matches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "kebab-case")]
pub enum RuleCondition {
    HttpHeader { name: String, values: Vec<String> },
    PathPattern { values: Vec<String> },
}

impl RuleCondition {
    /// Header name if this is an http-header condition.
    pub fn header_name(&self) -> Option<&str> {
        match self {
            RuleCondition::HttpHeader { name, .. } => Some(name),
            RuleCondition::PathPattern { .. } => None,
        }
    }
}

/// A non-default rule on a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerRule {
    pub arn: RuleArn,
    pub priority: u32,
    pub conditions: Vec<RuleCondition>,
    pub action: ForwardAction,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ListenerRule {
    /// Whether this rule isolates test traffic keyed on `header`.
    ///
    /// Rules we created carry the managed tag; rules created elsewhere are
    /// recognised by their first condition matching the header.
    pub fn is_test_isolation(&self, header: &str) -> bool {
        let tagged = self
            .tags
            .get(MANAGED_TAG)
            .is_some_and(|v| v == TEST_ISOLATION_TAG);
        let header_match = self
            .conditions
            .first()
            .and_then(RuleCondition::header_name)
            .is_some_and(|name| name.eq_ignore_ascii_case(header));
        tagged || header_match
    }
}

/// A rule to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRule {
    pub priority: u32,
    pub conditions: Vec<RuleCondition>,
    pub action: ForwardAction,
    pub tags: BTreeMap<String, String>,
}

/// A listener with its default action and rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub arn: ListenerArn,
    pub load_balancer: LoadBalancerArn,
    pub port: u16,
    pub default_action: ForwardAction,
    #[serde(default)]
    pub rules: Vec<ListenerRule>,
}
