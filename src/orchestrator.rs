//! Pipeline sequencing for one event: vectorize, score, retrieve, reason,
//! fuse, respond, persist. Stage failures produce a failed-tagged record
//! instead of tearing down the pipeline; the cost-control short circuit
//! skips retrieval and reasoning entirely for unremarkable scores.

use crate::config::{IntelConfig, SchemaConfig, ScorerConfig};
use crate::event::LogEvent;
use crate::fusion::{DecisionFuser, Verdict};
use crate::intel::{IntelIndex, RetrievalResult, TextEmbedder};
use crate::model::ScorerHandle;
use crate::reason::Reasoner;
use crate::response::{ActionRecord, ResponseMachine};
use crate::storage::AlertStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stages that can fatally fail an event, tagging its record. Retrieval and
/// reasoning degrade instead of failing, fusion is total, and persistence is
/// best-effort, so none of those ever tags a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vectorize,
    Score,
    Respond,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Vectorize => "vectorize",
            Stage::Score => "score",
            Stage::Respond => "respond",
        }
    }
}

/// Result of triaging one event. `verdict` is None when a stage failed before
/// fusion; the record is then failed-tagged with that stage.
pub struct TriageOutcome {
    pub verdict: Option<Verdict>,
    pub record: ActionRecord,
    pub failed_stage: Option<Stage>,
}

pub struct Orchestrator {
    vectorizer: crate::features::Vectorizer,
    scorer: Arc<ScorerHandle>,
    index: Arc<dyn IntelIndex>,
    embedder: TextEmbedder,
    reasoner: Reasoner,
    fuser: DecisionFuser,
    machine: Arc<ResponseMachine>,
    alerts: Option<Arc<AlertStore>>,
    schema_version: u32,
    anomaly_threshold: f32,
    top_k: usize,
    query_timeout: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schema: SchemaConfig,
        scorer_config: &ScorerConfig,
        intel_config: &IntelConfig,
        scorer: Arc<ScorerHandle>,
        index: Arc<dyn IntelIndex>,
        reasoner: Reasoner,
        fuser: DecisionFuser,
        machine: Arc<ResponseMachine>,
        alerts: Option<Arc<AlertStore>>,
    ) -> Self {
        Self {
            schema_version: schema.version,
            vectorizer: crate::features::Vectorizer::new(schema),
            scorer,
            embedder: TextEmbedder::new(intel_config.embedding_dim),
            index,
            reasoner,
            fuser,
            machine,
            alerts,
            anomaly_threshold: scorer_config.anomaly_threshold,
            top_k: intel_config.top_k,
            query_timeout: Duration::from_millis(intel_config.query_timeout_ms),
        }
    }

    /// Triage one event end to end. Always yields an action record; the
    /// verdict is absent only when a stage failed before fusion.
    pub async fn triage(&self, event: LogEvent) -> TriageOutcome {
        let features = match self.vectorizer.vectorize(&event, self.schema_version) {
            Ok(features) => features,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "vectorization rejected event");
                return self.fail(&event, Stage::Vectorize);
            }
        };

        let score = match self.scorer.score(&features) {
            Ok(score) => score,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "scoring failed");
                return self.fail(&event, Stage::Score);
            }
        };

        // Cost control: unremarkable events skip retrieval and reasoning.
        if score.value < self.anomaly_threshold {
            debug!(event_id = %event.id, score = score.value, "below anomaly threshold");
            let verdict = self.fuser.benign(&event.id, &score);
            return self.respond(event, verdict).await;
        }

        info!(event_id = %event.id, score = score.value, "anomalous event");

        let retrieval = self.retrieve(&event).await;
        let assessment = self.reasoner.assess(&event, &score, &retrieval).await;
        let verdict = self
            .fuser
            .fuse(&event.id, &score, &retrieval, &assessment);

        info!(
            event_id = %event.id,
            severity = ?verdict.severity,
            tier = ?verdict.tier,
            confidence = verdict.confidence,
            threat_type = %verdict.threat_type,
            "verdict"
        );

        self.respond(event, verdict).await
    }

    /// Query the intel index under a timeout. Retrieval trouble degrades to
    /// an empty result; the reasoner still runs, ungrounded.
    async fn retrieve(&self, event: &LogEvent) -> RetrievalResult {
        let embedding = self.embedder.embed(&event.summary());
        match tokio::time::timeout(self.query_timeout, self.index.query(&embedding, self.top_k))
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(event_id = %event.id, error = %e, "intel query failed");
                RetrievalResult::empty()
            }
            Err(_) => {
                warn!(event_id = %event.id, "intel query timed out");
                RetrievalResult::empty()
            }
        }
    }

    /// Submit the verdict on a spawned task and await it, so cancelling the
    /// triage future cannot abandon an action mid-execution.
    async fn respond(&self, event: LogEvent, verdict: Verdict) -> TriageOutcome {
        let machine = self.machine.clone();
        let submitted = verdict.clone();
        let handle = tokio::spawn(async move { machine.submit(&submitted).await });

        let record = match handle.await {
            Ok(record) => record,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "response task aborted");
                return self.fail(&event, Stage::Respond);
            }
        };

        self.persist(&event, &verdict, &record).await;

        TriageOutcome {
            verdict: Some(verdict),
            record,
            failed_stage: None,
        }
    }

    /// Best-effort alert persistence. A storage failure is logged, never
    /// propagated into the triage result.
    async fn persist(&self, event: &LogEvent, verdict: &Verdict, record: &ActionRecord) {
        let Some(alerts) = &self.alerts else {
            return;
        };
        if let Err(e) = alerts.insert_alert(verdict, record, event) {
            warn!(event_id = %event.id, error = %e, "alert persistence failed");
        }
    }

    fn fail(&self, event: &LogEvent, stage: Stage) -> TriageOutcome {
        let record = self.machine.submit_failed(&event.id, stage.as_str());
        TriageOutcome {
            verdict: None,
            record,
            failed_stage: Some(stage),
        }
    }
}
