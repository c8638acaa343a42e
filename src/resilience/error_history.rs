//! # Error History
//!
//! Bounded in-memory record of classified failures. Keeps the most recent
//! [`ERROR_HISTORY_CAPACITY`] contexts (oldest evicted first) plus cumulative
//! counts by category and severity that survive eviction. Nothing is persisted.

use crate::constants::history::{ERROR_HISTORY_CAPACITY, RECENT_ERRORS_IN_SNAPSHOT};
use crate::resilience::circuit_breaker::CircuitBreakerMetrics;
use crate::resilience::{ErrorCategory, ErrorContext, ErrorSeverity};
use crate::security::Sanitizer;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Default)]
struct HistoryState {
    entries: VecDeque<ErrorContext>,
    total: u64,
    by_category: BTreeMap<ErrorCategory, u64>,
    by_severity: BTreeMap<ErrorSeverity, u64>,
    escalations: u64,
}

/// Thread-safe bounded history of [`ErrorContext`] values
#[derive(Debug)]
pub struct ErrorHistory {
    capacity: usize,
    state: Mutex<HistoryState>,
}

impl ErrorHistory {
    pub fn new() -> Self {
        Self::with_capacity(ERROR_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(HistoryState::default()),
        }
    }

    pub fn record(&self, error: ErrorContext) {
        let mut state = self.state.lock();
        state.total += 1;
        *state.by_category.entry(error.category).or_default() += 1;
        *state.by_severity.entry(error.severity).or_default() += 1;
        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(error);
    }

    pub fn record_escalation(&self) {
        self.state.lock().escalations += 1;
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Up to `limit` most recent entries, newest last
    pub fn recent(&self, limit: usize) -> Vec<ErrorContext> {
        let state = self.state.lock();
        let skip = state.entries.len().saturating_sub(limit);
        state.entries.iter().skip(skip).cloned().collect()
    }

    /// Counts and the most recent errors with messages and diagnostic data sanitized
    pub fn summary(&self, sanitizer: &Sanitizer) -> ErrorSummary {
        let recent = self
            .recent(RECENT_ERRORS_IN_SNAPSHOT)
            .into_iter()
            .map(|error| RecentError {
                error_id: error.error_id.to_string(),
                operation: error.operation,
                category: error.category,
                severity: error.severity,
                message: sanitizer.text(&error.message),
                retry_count: error.retry_count,
                timestamp: error.timestamp,
                additional_data: error.additional_data.as_ref().map(|data| sanitizer.map(data)),
            })
            .collect();

        let state = self.state.lock();
        ErrorSummary {
            total_errors: state.total,
            retained: state.entries.len(),
            escalations: state.escalations,
            by_category: state.by_category.clone(),
            by_severity: state.by_severity.clone(),
            recent_errors: recent,
        }
    }
}

impl Default for ErrorHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Sanitized view of one history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentError {
    pub error_id: String,
    pub operation: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
    pub additional_data: Option<std::collections::HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Every error ever recorded, including evicted ones
    pub total_errors: u64,
    pub retained: usize,
    pub escalations: u64,
    pub by_category: BTreeMap<ErrorCategory, u64>,
    pub by_severity: BTreeMap<ErrorSeverity, u64>,
    pub recent_errors: Vec<RecentError>,
}

/// Statistics snapshot for a logging or monitoring sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    #[serde(flatten)]
    pub errors: ErrorSummary,
    pub circuit_breaker: CircuitBreakerMetrics,
    pub trading_halted: bool,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{ErrorClassifier, StandardErrorClassifier};
    use crate::RpcError;
    use std::collections::HashMap;

    fn context(message: &str) -> ErrorContext {
        StandardErrorClassifier::default().classify(&RpcError::Other(message.into()), "swap", None)
    }

    #[test]
    fn test_oldest_entries_evicted() {
        let history = ErrorHistory::with_capacity(3);
        for n in 0..5 {
            history.record(context(&format!("failure {n}")));
        }

        assert_eq!(history.len(), 3);
        let messages: Vec<String> = history.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["failure 2", "failure 3", "failure 4"]);
    }

    #[test]
    fn test_counts_survive_eviction() {
        let history = ErrorHistory::with_capacity(2);
        history.record(context("rate limit"));
        history.record(context("rate limit"));
        history.record(context("slippage"));

        let summary = history.summary(&Sanitizer::new(true));
        assert_eq!(summary.total_errors, 3);
        assert_eq!(summary.retained, 2);
        assert_eq!(summary.by_category[&ErrorCategory::RpcRateLimit], 2);
        assert_eq!(summary.by_category[&ErrorCategory::SlippageExceeded], 1);
        assert_eq!(summary.by_severity[&ErrorSeverity::High], 2);
    }

    #[test]
    fn test_summary_is_sanitized() {
        let history = ErrorHistory::new();
        let mut data = HashMap::new();
        data.insert("wallet_secret".to_string(), serde_json::json!("hunter2"));
        let error = StandardErrorClassifier::default().classify(
            &RpcError::Other("password=hunter2 rejected".into()),
            "sign",
            Some(data),
        );
        history.record(error);

        let summary = history.summary(&Sanitizer::new(true));
        let recent = &summary.recent_errors[0];
        assert!(!recent.message.contains("hunter2"));
        let rendered = serde_json::to_string(&recent.additional_data).unwrap();
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_summary_keeps_last_ten() {
        let history = ErrorHistory::new();
        for n in 0..25 {
            history.record(context(&format!("failure {n}")));
        }
        let summary = history.summary(&Sanitizer::new(false));
        assert_eq!(summary.recent_errors.len(), RECENT_ERRORS_IN_SNAPSHOT);
        assert_eq!(summary.recent_errors.last().unwrap().message, "failure 24");
    }
}
