use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Open,
    VendorResponded,
    UnderReview,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeActor {
    Vendor,
    #[serde(rename = "SCM")]
    Scm,
    System,
}

/// What a carrier can do from the vendor portal on a disputed invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VendorAction {
    SubmitJustification,
    Reupload,
}

impl VendorAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SubmitJustification => "Justification Submitted",
            Self::Reupload => "Corrected Invoice Uploaded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeEntry {
    pub actor: DisputeActor,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispute {
    pub status: DisputeStatus,
    #[serde(default)]
    pub history: Vec<DisputeEntry>,
}

impl Dispute {
    /// Returns a new dispute with the vendor's response appended.
    /// A missing dispute is treated as an empty open one.
    pub fn with_vendor_response(
        previous: Option<&Dispute>,
        action: VendorAction,
        comment: Option<&str>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut history = previous.map(|d| d.history.clone()).unwrap_or_default();

        history.push(DisputeEntry {
            actor: DisputeActor::Vendor,
            timestamp: at,
            action: action.label().to_string(),
            comment: comment.map(str::to_owned),
        });

        Self {
            status: DisputeStatus::VendorResponded,
            history,
        }
    }
}
