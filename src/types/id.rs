// ABOUTME: Phantom-typed identifiers for compile-time type safety.
// ABOUTME: Prevents accidental swapping of listener, target group, rule and alarm references.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
/// Using empty enums prevents instantiation and requires no trait bounds.
pub enum LoadBalancerMarker {}
pub enum ListenerMarker {}
pub enum TargetGroupMarker {}
pub enum RuleMarker {}
pub enum AlarmMarker {}
pub enum DeploymentMarker {}

/// A type-safe identifier that prevents accidental mixing of different ID types.
///
/// A `ListenerArn` can't be passed where a `TargetGroupArn` is expected even
/// though both are plain strings on the wire.
#[must_use = "IDs reference resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// Manual trait implementations that don't require T to implement the trait.
// This is necessary because T is only used as a phantom type marker.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

pub type LoadBalancerArn = Id<LoadBalancerMarker>;
pub type ListenerArn = Id<ListenerMarker>;
pub type TargetGroupArn = Id<TargetGroupMarker>;
pub type RuleArn = Id<RuleMarker>;
pub type AlarmName = Id<AlarmMarker>;
pub type DeploymentId = Id<DeploymentMarker>;

impl DeploymentId {
    /// Generate a deployment id in the `d-XXXXXXXXX` shape used by the deployment service.
    pub fn generate() -> Self {
        let now = chrono::Utc::now();
        let seed = now.timestamp_micros().unsigned_abs() ^ u64::from(std::process::id());
        let mut digits = String::with_capacity(9);
        let mut n = seed;
        for _ in 0..9 {
            let c = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ"[(n % 36) as usize];
            digits.push(c as char);
            n /= 36;
        }
        Self::new(format!("d-{digits}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_by_value() {
        let a = ListenerArn::new("arn:listener/a");
        let b = ListenerArn::new("arn:listener/b");
        assert!(a < b);
        assert_eq!(a, ListenerArn::new("arn:listener/a"));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TargetGroupArn::new("arn:tg/blue");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"arn:tg/blue\"");

        let back: TargetGroupArn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn generated_deployment_ids_have_expected_shape() {
        let id = DeploymentId::generate();
        assert!(id.as_str().starts_with("d-"));
        assert_eq!(id.as_str().len(), 11);
    }
}
