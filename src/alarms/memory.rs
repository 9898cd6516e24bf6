// ABOUTME: In-memory alarm source with scripted state changes.
// ABOUTME: Lets tests fire an alarm on the Nth poll of a traffic shift.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{AlarmError, AlarmSource, AlarmState};
use crate::types::AlarmName;

#[derive(Debug)]
struct Scheduled {
    on_poll: usize,
    state: AlarmState,
}

#[derive(Debug, Default)]
struct Inner {
    states: BTreeMap<AlarmName, AlarmState>,
    polls: BTreeMap<AlarmName, usize>,
    schedule: BTreeMap<AlarmName, Vec<Scheduled>>,
}

/// Alarm states held in memory.
#[derive(Debug, Default)]
pub struct MemoryAlarms {
    inner: Mutex<Inner>,
}

impl MemoryAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_states(states: BTreeMap<AlarmName, AlarmState>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                states,
                ..Inner::default()
            }),
        }
    }

    /// Create or overwrite an alarm's state.
    pub fn set(&self, alarm: AlarmName, state: AlarmState) {
        self.inner.lock().states.insert(alarm, state);
    }

    /// Switch `alarm` to `state` when it is polled for the `on_poll`-th time (1-based).
    pub fn schedule(&self, alarm: AlarmName, on_poll: usize, state: AlarmState) {
        self.inner
            .lock()
            .schedule
            .entry(alarm)
            .or_default()
            .push(Scheduled { on_poll, state });
    }

    /// How many times an alarm has been read.
    pub fn polls(&self, alarm: &AlarmName) -> usize {
        self.inner.lock().polls.get(alarm).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<AlarmName, AlarmState> {
        self.inner.lock().states.clone()
    }
}

#[async_trait]
impl AlarmSource for MemoryAlarms {
    async fn alarm_state(&self, alarm: &AlarmName) -> Result<AlarmState, AlarmError> {
        let mut inner = self.inner.lock();
        if !inner.states.contains_key(alarm) {
            return Err(AlarmError::NotFound(alarm.to_string()));
        }

        let count = {
            let polls = inner.polls.entry(alarm.clone()).or_default();
            *polls += 1;
            *polls
        };

        let due = inner
            .schedule
            .get(alarm)
            .and_then(|s| s.iter().find(|entry| entry.on_poll == count))
            .map(|entry| entry.state);
        if let Some(state) = due {
            tracing::debug!("Alarm {} switches to {} on poll {}", alarm, state, count);
            inner.states.insert(alarm.clone(), state);
        }

        inner
            .states
            .get(alarm)
            .copied()
            .ok_or_else(|| AlarmError::NotFound(alarm.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_alarm_is_not_found() {
        let alarms = MemoryAlarms::new();
        let err = alarms.alarm_state(&AlarmName::new("nope")).await.unwrap_err();
        assert_eq!(err, AlarmError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn scheduled_state_applies_on_requested_poll() {
        let alarms = MemoryAlarms::new();
        let name = AlarmName::new("books-green-5xx");
        alarms.set(name.clone(), AlarmState::Ok);
        alarms.schedule(name.clone(), 3, AlarmState::Alarm);

        assert_eq!(alarms.alarm_state(&name).await.unwrap(), AlarmState::Ok);
        assert_eq!(alarms.alarm_state(&name).await.unwrap(), AlarmState::Ok);
        assert_eq!(alarms.alarm_state(&name).await.unwrap(), AlarmState::Alarm);
        assert_eq!(alarms.alarm_state(&name).await.unwrap(), AlarmState::Alarm);
        assert_eq!(alarms.polls(&name), 4);
    }
}
