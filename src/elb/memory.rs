// ABOUTME: In-process load balancer backend with serializable state and fault injection.
// ABOUTME: Backs the CLI's local state file and drives failure scenarios in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::error::BalancerError;
use super::model::{ForwardAction, Listener, ListenerRule, NewRule, TargetGroup};
use super::sealed::Sealed;
use super::traits::{ListenerOps, TargetGroupOps};
use crate::types::{ListenerArn, LoadBalancerArn, RuleArn, TargetGroupArn};

/// Complete balancer state, persisted between CLI invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerState {
    #[serde(default)]
    pub load_balancers: BTreeSet<LoadBalancerArn>,
    #[serde(default)]
    pub listeners: BTreeMap<ListenerArn, Listener>,
    #[serde(default)]
    pub target_groups: BTreeMap<TargetGroupArn, TargetGroup>,
    #[serde(default)]
    pub next_rule_id: u64,
}

/// Operations that faults can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DescribeListener,
    DescribeRules,
    CreateRule,
    DeleteRule,
    ModifyDefaultAction,
    DescribeTargetGroup,
    RegisterTargets,
    DeregisterTargets,
}

#[derive(Debug)]
struct Fault {
    operation: Operation,
    error: BalancerError,
    remaining: usize,
}

/// A load balancer held in memory.
#[derive(Debug, Default)]
pub struct MemoryBalancer {
    state: Mutex<BalancerState>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<BTreeMap<String, usize>>,
}

impl Sealed for MemoryBalancer {}

impl MemoryBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: BalancerState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> BalancerState {
        self.state.lock().clone()
    }

    /// Make the next `times` calls of `operation` fail with `error`.
    pub fn inject(&self, operation: Operation, error: BalancerError, times: usize) {
        self.faults.lock().push(Fault {
            operation,
            error,
            remaining: times,
        });
    }

    /// Number of calls made to `operation`, including failed ones.
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .get(&format!("{operation:?}"))
            .copied()
            .unwrap_or(0)
    }

    pub fn add_load_balancer(&self, arn: LoadBalancerArn) {
        self.state.lock().load_balancers.insert(arn);
    }

    pub fn add_target_group(&self, arn: TargetGroupArn, name: impl Into<String>) {
        let mut state = self.state.lock();
        state
            .target_groups
            .entry(arn.clone())
            .or_insert_with(|| TargetGroup {
                arn,
                name: name.into(),
                targets: Vec::new(),
            });
    }

    /// Add a listener forwarding all traffic to `default_target`.
    pub fn add_listener(
        &self,
        load_balancer: &LoadBalancerArn,
        arn: ListenerArn,
        port: u16,
        default_target: &TargetGroupArn,
    ) -> Result<(), BalancerError> {
        let mut state = self.state.lock();
        if !state.load_balancers.contains(load_balancer) {
            return Err(BalancerError::LoadBalancerNotFound(load_balancer.to_string()));
        }
        if !state.target_groups.contains_key(default_target) {
            return Err(BalancerError::TargetGroupNotFound(default_target.to_string()));
        }
        state.listeners.entry(arn.clone()).or_insert_with(|| Listener {
            arn,
            load_balancer: load_balancer.clone(),
            port,
            default_action: ForwardAction::single(default_target.clone()),
            rules: Vec::new(),
        });
        Ok(())
    }

    fn enter(&self, operation: Operation) -> Result<(), BalancerError> {
        *self
            .calls
            .lock()
            .entry(format!("{operation:?}"))
            .or_default() += 1;

        let mut faults = self.faults.lock();
        let Some(pos) = faults
            .iter()
            .position(|f| f.operation == operation && f.remaining > 0)
        else {
            return Ok(());
        };
        let fault = &mut faults[pos];
        fault.remaining -= 1;
        let error = fault.error.clone();
        if fault.remaining == 0 {
            faults.remove(pos);
        }
        tracing::debug!("Injected fault on {:?}: {}", operation, error);
        Err(error)
    }
}

fn check_targets(state: &BalancerState, action: &ForwardAction) -> Result<(), BalancerError> {
    for target in &action.targets {
        if !state.target_groups.contains_key(&target.target_group) {
            return Err(BalancerError::TargetGroupNotFound(
                target.target_group.to_string(),
            ));
        }
    }
    let total: u32 = action.targets.iter().map(|t| u32::from(t.weight)).sum();
    if total != 100 {
        return Err(BalancerError::Backend(format!(
            "forward weights must sum to 100, got {total}"
        )));
    }
    Ok(())
}

#[async_trait]
impl ListenerOps for MemoryBalancer {
    async fn describe_listener(&self, listener: &ListenerArn) -> Result<Listener, BalancerError> {
        self.enter(Operation::DescribeListener)?;
        self.state
            .lock()
            .listeners
            .get(listener)
            .cloned()
            .ok_or_else(|| BalancerError::ListenerNotFound(listener.to_string()))
    }

    async fn describe_rules(
        &self,
        listener: &ListenerArn,
    ) -> Result<Vec<ListenerRule>, BalancerError> {
        self.enter(Operation::DescribeRules)?;
        self.state
            .lock()
            .listeners
            .get(listener)
            .map(|l| l.rules.clone())
            .ok_or_else(|| BalancerError::ListenerNotFound(listener.to_string()))
    }

    async fn create_rule(
        &self,
        listener: &ListenerArn,
        rule: &NewRule,
    ) -> Result<RuleArn, BalancerError> {
        self.enter(Operation::CreateRule)?;
        let mut state = self.state.lock();
        check_targets(&state, &rule.action)?;

        state.next_rule_id += 1;
        let arn = RuleArn::new(format!("{}/rule/{}", listener, state.next_rule_id));

        let entry = state
            .listeners
            .get_mut(listener)
            .ok_or_else(|| BalancerError::ListenerNotFound(listener.to_string()))?;
        if entry.rules.iter().any(|r| r.priority == rule.priority) {
            return Err(BalancerError::PriorityInUse(rule.priority));
        }
        entry.rules.push(ListenerRule {
            arn: arn.clone(),
            priority: rule.priority,
            conditions: rule.conditions.clone(),
            action: rule.action.clone(),
            tags: rule.tags.clone(),
        });
        entry.rules.sort_by_key(|r| r.priority);
        Ok(arn)
    }

    async fn delete_rule(&self, rule: &RuleArn) -> Result<(), BalancerError> {
        self.enter(Operation::DeleteRule)?;
        let mut state = self.state.lock();
        for listener in state.listeners.values_mut() {
            if let Some(pos) = listener.rules.iter().position(|r| &r.arn == rule) {
                listener.rules.remove(pos);
                return Ok(());
            }
        }
        Err(BalancerError::RuleNotFound(rule.to_string()))
    }

    async fn modify_default_action(
        &self,
        listener: &ListenerArn,
        action: &ForwardAction,
    ) -> Result<(), BalancerError> {
        self.enter(Operation::ModifyDefaultAction)?;
        let mut state = self.state.lock();
        check_targets(&state, action)?;
        let entry = state
            .listeners
            .get_mut(listener)
            .ok_or_else(|| BalancerError::ListenerNotFound(listener.to_string()))?;
        entry.default_action = action.clone();
        Ok(())
    }
}

#[async_trait]
impl TargetGroupOps for MemoryBalancer {
    async fn describe_target_group(
        &self,
        target_group: &TargetGroupArn,
    ) -> Result<TargetGroup, BalancerError> {
        self.enter(Operation::DescribeTargetGroup)?;
        self.state
            .lock()
            .target_groups
            .get(target_group)
            .cloned()
            .ok_or_else(|| BalancerError::TargetGroupNotFound(target_group.to_string()))
    }

    async fn register_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[String],
    ) -> Result<(), BalancerError> {
        self.enter(Operation::RegisterTargets)?;
        let mut state = self.state.lock();
        let entry = state
            .target_groups
            .get_mut(target_group)
            .ok_or_else(|| BalancerError::TargetGroupNotFound(target_group.to_string()))?;
        for target in targets {
            if !entry.targets.contains(target) {
                entry.targets.push(target.clone());
            }
        }
        Ok(())
    }

    async fn deregister_targets(
        &self,
        target_group: &TargetGroupArn,
        targets: &[String],
    ) -> Result<(), BalancerError> {
        self.enter(Operation::DeregisterTargets)?;
        let mut state = self.state.lock();
        let entry = state
            .target_groups
            .get_mut(target_group)
            .ok_or_else(|| BalancerError::TargetGroupNotFound(target_group.to_string()))?;
        entry.targets.retain(|t| !targets.contains(t));
        Ok(())
    }
}
