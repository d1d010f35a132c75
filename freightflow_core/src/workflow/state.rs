use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Active,
    Approved,
    Rejected,
    Skipped,
    Processing,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Skipped => "SKIPPED",
            Self::Processing => "PROCESSING",
        }
    }

    /// Waiting on a human (ACTIVE) or on settlement (PROCESSING).
    pub fn is_current(&self) -> bool {
        matches!(self, Self::Active | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowHistoryItem {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl WorkflowHistoryItem {
    pub fn new(step_id: &str, status: StepStatus) -> Self {
        Self {
            step_id: step_id.to_owned(),
            status,
            approver_name: None,
            approver_role: None,
            timestamp: None,
            comment: None,
        }
    }

    pub fn stamp(
        &mut self,
        status: StepStatus,
        actor: &Actor,
        at: DateTime<Utc>,
        comment: Option<&str>,
    ) {
        self.status = status;
        self.approver_name = Some(actor.name.clone());
        self.approver_role = Some(actor.role.clone());
        self.timestamp = Some(at);
        self.comment = comment.map(str::to_owned);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn current_and_terminal_are_disjoint() {
        let all = [
            StepStatus::Pending,
            StepStatus::Active,
            StepStatus::Approved,
            StepStatus::Rejected,
            StepStatus::Skipped,
            StepStatus::Processing,
        ];

        for status in all {
            assert!(!(status.is_current() && status.is_terminal()), "{status}");
        }
        assert!(!StepStatus::Pending.is_current());
        assert!(!StepStatus::Pending.is_terminal());
    }

    #[test]
    fn stamp_records_actor_and_time() {
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 14, 30, 0).unwrap();
        let mut item = WorkflowHistoryItem::new("L1", StepStatus::Active);

        item.stamp(
            StepStatus::Approved,
            &Actor::new("Priya Nair", "Ops Manager", "ops_manager"),
            at,
            Some("Rates match contract"),
        );

        assert_eq!(item.status, StepStatus::Approved);
        assert_eq!(item.approver_name.as_deref(), Some("Priya Nair"));
        assert_eq!(item.approver_role.as_deref(), Some("Ops Manager"));
        assert_eq!(item.timestamp, Some(at));
        assert_eq!(item.comment.as_deref(), Some("Rates match contract"));
    }
}
