// ABOUTME: Diagnostics accumulator for non-fatal warnings during a cutover.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

/// Collects non-fatal warnings during deployment operations.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a cutover.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn alarm_unknown(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::AlarmUnknown,
            message: message.into(),
        }
    }

    pub fn hook_replayed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::HookReplayed,
            message: message.into(),
        }
    }

    pub fn stale_rules_removed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::StaleRulesRemoved,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a cutover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// An alarm had no data while traffic was shifting.
    AlarmUnknown,
    /// A hook was invoked again for a deployment where it already succeeded.
    HookReplayed,
    /// Test-isolation rules from an earlier deployment were still attached.
    StaleRulesRemoved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::alarm_unknown("green-5xx has no data at 30%"));
        diag.warn(Warning::hook_replayed("BeforeInstall already succeeded"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
        assert_eq!(diag.warnings()[0].kind, WarningKind::AlarmUnknown);
    }
}
