// ABOUTME: Blue/green slot identity and the pair of target groups backing the slots.
// ABOUTME: Slots are symmetric so promote and rollback logic never branches on colour.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::TargetGroupArn;

/// One of the two interchangeable service endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Blue,
    Green,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Blue, Slot::Green];

    /// The opposite slot.
    pub fn other(self) -> Slot {
        match self {
            Slot::Blue => Slot::Green,
            Slot::Green => Slot::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Blue => "blue",
            Slot::Green => "green",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current role of a slot, derived from listener state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotRole {
    /// Receives production traffic.
    Active,
    /// Receives nothing.
    Standby,
    /// Reachable only through the test-isolation rule.
    TestOnly,
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotRole::Active => "ACTIVE",
            SlotRole::Standby => "STANDBY",
            SlotRole::TestOnly => "TEST-ONLY",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotPairError {
    #[error("blue and green slots must use different target groups (both are {0})")]
    SameTargetGroup(String),
}

/// The fixed pair of target groups behind the blue and green slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPair {
    blue: TargetGroupArn,
    green: TargetGroupArn,
}

impl SlotPair {
    pub fn new(blue: TargetGroupArn, green: TargetGroupArn) -> Result<Self, SlotPairError> {
        if blue == green {
            return Err(SlotPairError::SameTargetGroup(blue.to_string()));
        }
        Ok(Self { blue, green })
    }

    /// Target group backing the given slot.
    pub fn get(&self, slot: Slot) -> &TargetGroupArn {
        match slot {
            Slot::Blue => &self.blue,
            Slot::Green => &self.green,
        }
    }

    /// Which slot a target group belongs to, if any.
    pub fn slot_of(&self, target_group: &TargetGroupArn) -> Option<Slot> {
        Slot::ALL
            .into_iter()
            .find(|slot| self.get(*slot) == target_group)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &TargetGroupArn)> {
        Slot::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }
}
