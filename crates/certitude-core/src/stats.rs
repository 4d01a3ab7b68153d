//! Aggregate statistics computed from the audit trail.

use std::collections::BTreeMap;

use audit_ledger::AuditRecord;
use serde::{Deserialize, Serialize};

/// Bucket for halt records that carry no error code.
pub const UNKNOWN_CODE: &str = "UNKNOWN";

/// Uncertainty-halt totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStats {
    pub total_halts: usize,
    /// Halt count per error code.
    pub error_codes: BTreeMap<String, usize>,
    pub keyword_count: usize,
}

impl GateStats {
    pub fn from_halt_records(records: &[AuditRecord], keyword_count: usize) -> Self {
        let mut error_codes = BTreeMap::new();
        let mut total_halts = 0;
        for record in records.iter().filter(|r| r.is_uncertainty_halt()) {
            total_halts += 1;
            let code = record
                .context()
                .and_then(|ctx| ctx.get("error_code"))
                .and_then(|code| code.as_str())
                .unwrap_or(UNKNOWN_CODE);
            *error_codes.entry(code.to_string()).or_insert(0) += 1;
        }
        Self {
            total_halts,
            error_codes,
            keyword_count,
        }
    }
}

/// Success/failure counts over the most recent application records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    /// Number of records inspected.
    pub window: usize,
    pub successes: usize,
    /// Uncertainty-halt records.
    pub failures: usize,
}

impl RecentActivity {
    pub fn from_records(records: &[AuditRecord]) -> Self {
        Self {
            window: records.len(),
            successes: records
                .iter()
                .filter(|r| r.is_success() && r.operation_id.is_some())
                .count(),
            failures: records
                .iter()
                .filter(|r| r.is_uncertainty_halt() && r.operation_id.is_some())
                .count(),
        }
    }

    /// Share of successes among successes and failures; `None` when neither
    /// occurred.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.successes + self.failures;
        (total > 0).then(|| self.successes as f64 / total as f64)
    }

    /// Percentage with two decimals, or `N/A`.
    pub fn success_rate_label(&self) -> String {
        match self.success_rate() {
            Some(rate) => format!("{:.2}%", rate * 100.0),
            None => "N/A".to_string(),
        }
    }
}

/// Combined statistics reported by the facade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub uncertainty: GateStats,
    pub recent: RecentActivity,
    pub success_rate: String,
}

impl ExecutionStats {
    pub fn new(uncertainty: GateStats, recent: RecentActivity) -> Self {
        let success_rate = recent.success_rate_label();
        Self {
            uncertainty,
            recent,
            success_rate,
        }
    }
}
