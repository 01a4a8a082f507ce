//! Escalation rules over an external diagnostic stream. A rule counts
//! consecutive observations of one diagnostic at one level and, at its
//! threshold, yields a single escalation. The rule re-arms only after a
//! non-matching observation resets the streak.

use crate::wire::{DiagnosticState, NotificationType};

/// One escalation rule.
#[derive(Debug, Clone)]
pub struct DangerRule {
    pub diagnostic: String,
    pub target: DiagnosticState,
    pub min_consecutive: u32,
    pub escalation: NotificationType,
}

/// One entry of a diagnostic array message.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub name: String,
    pub level: DiagnosticState,
    pub message: String,
}

/// A pending escalation produced by [`DangerMonitor::observe`]. The caller
/// forwards it to `Link::send_notification`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Escalation {
    pub severity: NotificationType,
    pub sensor: String,
    pub message: String,
}

struct RuleState {
    rule: DangerRule,
    streak: u32,
    latched: bool,
}

pub struct DangerMonitor {
    rules: Vec<RuleState>,
}

impl DangerMonitor {
    pub fn new(rules: Vec<DangerRule>) -> DangerMonitor {
        DangerMonitor {
            rules: rules
                .into_iter()
                .map(|rule| RuleState {
                    rule,
                    streak: 0,
                    latched: false,
                })
                .collect(),
        }
    }

    /// Feeds one diagnostic observation through every rule watching that
    /// diagnostic name. Returns the escalations that fired on this message.
    pub fn observe(
        &mut self,
        diagnostic: &str,
        level: DiagnosticState,
        message: &str,
    ) -> Vec<Escalation> {
        let mut fired = Vec::new();

        for state in self
            .rules
            .iter_mut()
            .filter(|state| state.rule.diagnostic == diagnostic)
        {
            if level == state.rule.target {
                state.streak = state.streak.saturating_add(1);

                if state.streak >= state.rule.min_consecutive && !state.latched {
                    state.latched = true;
                    fired.push(Escalation {
                        severity: state.rule.escalation,
                        sensor: diagnostic.to_string(),
                        message: message.to_string(),
                    });
                }
            } else {
                state.streak = 0;
                state.latched = false;
            }
        }

        fired
    }

    /// Feeds a whole diagnostic array, as a diagnostics subscriber delivers
    /// it, and collects every escalation the batch raised.
    pub fn observe_array(&mut self, reports: &[DiagnosticReport]) -> Vec<Escalation> {
        let mut fired = Vec::new();

        for report in reports {
            fired.extend(self.observe(&report.name, report.level, &report.message));
        }

        fired
    }
}
