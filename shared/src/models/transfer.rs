//! Inventory transfer state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Transfer status. `Completed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Completed => "completed",
            TransferStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferStatus::Pending),
            "approved" => Some(TransferStatus::Approved),
            "completed" => Some(TransferStatus::Completed),
            "rejected" => Some(TransferStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Rejected)
    }

    /// pending -> approved -> completed, pending -> rejected
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::Approved)
                | (TransferStatus::Pending, TransferStatus::Rejected)
                | (TransferStatus::Approved, TransferStatus::Completed)
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator actions on a transfer request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferAction {
    Approve,
    Reject,
    Complete,
}

impl TransferAction {
    /// Status the transfer must currently be in
    pub fn required_status(&self) -> TransferStatus {
        match self {
            TransferAction::Approve | TransferAction::Reject => TransferStatus::Pending,
            TransferAction::Complete => TransferStatus::Approved,
        }
    }

    /// Status the transfer ends up in
    pub fn target_status(&self) -> TransferStatus {
        match self {
            TransferAction::Approve => TransferStatus::Approved,
            TransferAction::Reject => TransferStatus::Rejected,
            TransferAction::Complete => TransferStatus::Completed,
        }
    }

    /// Whether the action re-validates source stock before proceeding
    pub fn rechecks_stock(&self) -> bool {
        !matches!(self, TransferAction::Reject)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            TransferAction::Approve => "approve",
            TransferAction::Reject => "reject",
            TransferAction::Complete => "complete",
        }
    }

    /// Resolve the next status for a transfer currently in `current`
    pub fn apply(&self, current: TransferStatus) -> Result<TransferStatus, DomainError> {
        let target = self.target_status();
        if current == self.required_status() && current.can_transition_to(target) {
            Ok(target)
        } else {
            Err(DomainError::InvalidTransition {
                action: self.verb(),
                current,
            })
        }
    }
}
