// ABOUTME: Sealed trait pattern for load balancer traits.
// ABOUTME: Prevents external implementations, allowing non-breaking evolution.

/// Sealed trait to prevent external implementations.
///
/// New methods can be added to the balancer traits without breaking semver.
/// Only types that implement Sealed (our internal balancer types) can
/// implement the capability traits.
pub trait Sealed {}
