//! Tiered action execution: records, transitions, and the executor seam.

mod machine;

pub use machine::ResponseMachine;

use crate::fusion::Tier;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Executed,
    PendingApproval,
    Approved,
    Rejected,
    RolledBack,
    Failed,
}

impl ActionStatus {
    /// No further automatic progress from these states. A later rollback of
    /// an executed action remains legal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Executed
                | ActionStatus::Rejected
                | ActionStatus::RolledBack
                | ActionStatus::Failed
        )
    }
}

/// One append-only history entry. The audit trail is the sequence of these;
/// it is never rewritten in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub status: ActionStatus,
    pub at: DateTime<Utc>,
}

/// One attempted response action. `status` is the current state; `history`
/// reconstructs every transition since creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub event_id: String,
    pub tier: Tier,
    pub action: String,
    pub status: ActionStatus,
    /// Stage name when the pipeline failed before a tier decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    pub history: Vec<Transition>,
    pub created_at: DateTime<Utc>,
}

impl ActionRecord {
    pub(crate) fn new(event_id: String, tier: Tier, action: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_id,
            tier,
            action,
            status: ActionStatus::Pending,
            failed_stage: None,
            history: vec![Transition {
                status: ActionStatus::Pending,
                at: now,
            }],
            created_at: now,
        }
    }

    pub(crate) fn transition(&mut self, status: ActionStatus) {
        self.status = status;
        self.history.push(Transition {
            status,
            at: Utc::now(),
        });
    }
}

/// Side-effecting execution of a decided action. Out-of-scope mechanics
/// (blocking an IP, locking an account) live behind this seam.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, record: &ActionRecord) -> Result<(), String>;
}

/// Default executor: the action's effect is the audit log line itself.
pub struct LogOnlyExecutor;

#[async_trait]
impl ActionExecutor for LogOnlyExecutor {
    async fn execute(&self, record: &ActionRecord) -> Result<(), String> {
        tracing::info!(
            record_id = %record.id,
            event_id = %record.event_id,
            action = %record.action,
            tier = ?record.tier,
            "action executed"
        );
        Ok(())
    }
}

/// Emitted when a YELLOW action auto-executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub record_id: Uuid,
    pub event_id: String,
    pub tier: Tier,
    pub action: String,
}
