//! Response state machine. Tier decides autonomy: GREEN and YELLOW actions
//! execute immediately, RED parks until a human approves or rejects. Every
//! transition is appended to the record's history.

use super::{ActionExecutor, ActionRecord, ActionStatus, Notification};
use crate::error::{Result, TriageError};
use crate::fusion::{Tier, Verdict};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct ResponseMachine {
    executor: Arc<dyn ActionExecutor>,
    // Per-record async mutex so approve/reject/rollback on one record
    // serialize without blocking unrelated records.
    records: RwLock<HashMap<Uuid, Arc<tokio::sync::Mutex<ActionRecord>>>>,
    notifications: Option<mpsc::UnboundedSender<Notification>>,
}

impl ResponseMachine {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            executor,
            records: RwLock::new(HashMap::new()),
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, sender: mpsc::UnboundedSender<Notification>) -> Self {
        self.notifications = Some(sender);
        self
    }

    /// Admit a verdict. GREEN executes silently, YELLOW executes and emits a
    /// notification, RED creates a record parked at pending approval.
    pub async fn submit(&self, verdict: &Verdict) -> ActionRecord {
        let action = action_for(verdict.tier);
        let record = ActionRecord::new(verdict.event_id.clone(), verdict.tier, action.to_string());
        let slot = self.insert(record);
        let mut record = slot.lock().await;

        match record.tier {
            Tier::Green => {
                self.run_executor(&mut record).await;
            }
            Tier::Yellow => {
                self.run_executor(&mut record).await;
                self.notify(&record);
            }
            Tier::Red => {
                record.transition(ActionStatus::PendingApproval);
                info!(
                    record_id = %record.id,
                    event_id = %record.event_id,
                    "action awaiting approval"
                );
            }
        }

        record.clone()
    }

    /// Terminal record for an event whose pipeline failed before a verdict.
    /// Tagged with the failed stage; no action is attempted.
    pub fn submit_failed(&self, event_id: &str, stage: &'static str) -> ActionRecord {
        let mut record = ActionRecord::new(event_id.to_string(), Tier::Red, "none".to_string());
        record.failed_stage = Some(stage.to_string());
        record.transition(ActionStatus::Failed);
        let snapshot = record.clone();
        self.insert(record);
        snapshot
    }

    /// Approve a pending RED action and execute it. Approving a record that
    /// already executed is a no-op returning its current status.
    pub async fn approve(&self, id: Uuid) -> Result<ActionStatus> {
        let slot = self.get(id)?;
        let mut record = slot.lock().await;
        match record.status {
            ActionStatus::Executed => Ok(ActionStatus::Executed),
            ActionStatus::PendingApproval => {
                record.transition(ActionStatus::Approved);
                self.run_executor(&mut record).await;
                Ok(record.status)
            }
            from => Err(TriageError::InvalidTransition {
                from,
                requested: "approve",
            }),
        }
    }

    /// Reject a pending RED action. Legal only from pending approval.
    pub async fn reject(&self, id: Uuid) -> Result<ActionStatus> {
        let slot = self.get(id)?;
        let mut record = slot.lock().await;
        match record.status {
            ActionStatus::PendingApproval => {
                record.transition(ActionStatus::Rejected);
                info!(record_id = %record.id, "action rejected");
                Ok(ActionStatus::Rejected)
            }
            from => Err(TriageError::InvalidTransition {
                from,
                requested: "reject",
            }),
        }
    }

    /// Mark an executed action as rolled back. The rollback mechanics are the
    /// operator's; the record only tracks that it happened.
    pub async fn rollback(&self, id: Uuid) -> Result<ActionStatus> {
        let slot = self.get(id)?;
        let mut record = slot.lock().await;
        match record.status {
            ActionStatus::Executed => {
                record.transition(ActionStatus::RolledBack);
                info!(record_id = %record.id, "action rolled back");
                Ok(ActionStatus::RolledBack)
            }
            from => Err(TriageError::InvalidTransition {
                from,
                requested: "rollback",
            }),
        }
    }

    /// Drop terminal records whose last transition is older than `before`.
    /// Parked and in-flight records are kept. The alert store holds the
    /// durable copy; a pruned executed record can no longer be rolled back
    /// through this machine. Returns the number removed.
    pub async fn prune_terminal(&self, before: DateTime<Utc>) -> usize {
        let snapshot: Vec<(Uuid, Arc<tokio::sync::Mutex<ActionRecord>>)> = {
            let records = self.records.read().expect("lock");
            records.iter().map(|(id, slot)| (*id, slot.clone())).collect()
        };

        let mut stale = Vec::new();
        for (id, slot) in snapshot {
            let record = slot.lock().await;
            let last = record
                .history
                .last()
                .map(|t| t.at)
                .unwrap_or(record.created_at);
            if record.status.is_terminal() && last < before {
                stale.push(id);
            }
        }

        let mut records = self.records.write().expect("lock");
        stale.iter().filter(|id| records.remove(id).is_some()).count()
    }

    /// Snapshot of a record's current state and history.
    pub async fn record(&self, id: Uuid) -> Option<ActionRecord> {
        let slot = {
            let records = self.records.read().expect("lock");
            records.get(&id)?.clone()
        };
        let record = slot.lock().await;
        Some(record.clone())
    }

    async fn run_executor(&self, record: &mut ActionRecord) {
        match self.executor.execute(record).await {
            Ok(()) => record.transition(ActionStatus::Executed),
            Err(reason) => {
                warn!(
                    record_id = %record.id,
                    event_id = %record.event_id,
                    %reason,
                    "action execution failed"
                );
                record.transition(ActionStatus::Failed);
            }
        }
    }

    fn notify(&self, record: &ActionRecord) {
        if let Some(sender) = &self.notifications {
            let _ = sender.send(Notification {
                record_id: record.id,
                event_id: record.event_id.clone(),
                tier: record.tier,
                action: record.action.clone(),
            });
        }
    }

    fn insert(&self, record: ActionRecord) -> Arc<tokio::sync::Mutex<ActionRecord>> {
        let id = record.id;
        let slot = Arc::new(tokio::sync::Mutex::new(record));
        self.records
            .write()
            .expect("lock")
            .insert(id, slot.clone());
        slot
    }

    fn get(&self, id: Uuid) -> Result<Arc<tokio::sync::Mutex<ActionRecord>>> {
        let records = self.records.read().expect("lock");
        records
            .get(&id)
            .cloned()
            .ok_or(TriageError::UnknownRecord(id))
    }
}

fn action_for(tier: Tier) -> &'static str {
    match tier {
        Tier::Green => "log_only",
        Tier::Yellow => "notify",
        Tier::Red => "contain",
    }
}
