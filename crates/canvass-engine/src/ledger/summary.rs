use canvass_common::ledger::{DispatchPath, LedgerEntry, QuestionOutcome};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FamilyStats {
    pub attempts: usize,
    pub successes: usize,
    pub deferrals: usize,
    pub mean_confidence: f64,
}

/// Aggregate statistics over ledger entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub sessions: usize,
    pub questions: usize,
    pub automated: usize,
    pub deferred: usize,
    pub successes: usize,
    pub failures: usize,
    /// Share of questions answered without the operator, in [0, 1].
    pub automation_rate: f64,
    /// Deferral count per reason code.
    pub reasons: BTreeMap<String, usize>,
    pub families: BTreeMap<String, FamilyStats>,
    pub total_elapsed_ms: u64,
    pub questions_per_minute: f64,
}

impl LedgerSummary {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut summary = LedgerSummary {
            questions: entries.len(),
            ..Default::default()
        };
        let mut sessions = BTreeSet::new();
        let mut confidence_sums: BTreeMap<String, f64> = BTreeMap::new();

        for entry in entries {
            sessions.insert(entry.session_id.as_str());
            summary.total_elapsed_ms += entry.elapsed_ms;
            match entry.path {
                DispatchPath::Automated => summary.automated += 1,
                DispatchPath::Deferred => summary.deferred += 1,
            }
            match entry.outcome {
                QuestionOutcome::Success => summary.successes += 1,
                QuestionOutcome::Failure => summary.failures += 1,
                QuestionOutcome::Deferred => {}
            }
            if let Some(reason) = entry.reason {
                *summary.reasons.entry(reason.to_string()).or_default() += 1;
            }

            let family = summary.families.entry(entry.family.clone()).or_default();
            family.attempts += 1;
            if entry.path == DispatchPath::Automated && entry.outcome == QuestionOutcome::Success {
                family.successes += 1;
            }
            if entry.path == DispatchPath::Deferred {
                family.deferrals += 1;
            }
            *confidence_sums.entry(entry.family.clone()).or_default() += entry.confidence;
        }

        for (name, stats) in summary.families.iter_mut() {
            let sum = confidence_sums.get(name).copied().unwrap_or_default();
            stats.mean_confidence = sum / stats.attempts as f64;
        }
        summary.sessions = sessions.len();
        if summary.questions > 0 {
            summary.automation_rate = summary.automated as f64 / summary.questions as f64;
        }
        if summary.total_elapsed_ms > 0 {
            summary.questions_per_minute =
                summary.questions as f64 * 60_000.0 / summary.total_elapsed_ms as f64;
        }
        summary
    }
}
