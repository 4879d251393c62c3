//! Integration tests: full triage runs through vectorize, score, retrieve,
//! reason, fuse, respond, persist.

use autosec_core::{
    config::{AutosecConfig, FusionConfig, IntelConfig, ReasonerConfig, SchemaConfig, ScorerConfig},
    event::{LogEvent, LogSource, Outcome},
    fusion::{DecisionFuser, Severity, Tier},
    intel::{IntelDocument, IntelIndex, MemoryIntelIndex, RetrievalResult, SourceType, TextEmbedder},
    model::{ScorerHandle, StaticModel},
    orchestrator::{Orchestrator, Stage},
    reason::{MockReasoner, Reasoner},
    response::{ActionStatus, LogOnlyExecutor, Notification, ResponseMachine},
    storage::AlertStore,
    TriageError,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const DIM: usize = 64;

/// Index wrapper that counts queries, so tests can assert the short circuit
/// skipped retrieval.
struct CountingIndex {
    inner: MemoryIntelIndex,
    queries: AtomicUsize,
}

impl CountingIndex {
    fn new(dim: usize) -> Self {
        Self {
            inner: MemoryIntelIndex::new(dim),
            queries: AtomicUsize::new(0),
        }
    }

    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IntelIndex for CountingIndex {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult, TriageError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(embedding, k).await
    }

    async fn upsert(&self, doc: IntelDocument) -> Result<(), TriageError> {
        self.inner.upsert(doc).await
    }

    async fn remove(&self, id: &str) -> Result<bool, TriageError> {
        self.inner.remove(id).await
    }

    async fn get(&self, id: &str) -> Option<Arc<IntelDocument>> {
        self.inner.get(id).await
    }

    async fn len(&self) -> usize {
        self.inner.len().await
    }
}

struct TestBed {
    orchestrator: Orchestrator,
    mock: Arc<MockReasoner>,
    machine: Arc<ResponseMachine>,
    alerts: Arc<AlertStore>,
    index: Arc<CountingIndex>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    _dir: tempfile::TempDir,
}

async fn testbed(model_score: Option<f32>, intel_texts: &[(&str, &str)]) -> TestBed {
    let dir = tempfile::tempdir().unwrap();
    let alerts = Arc::new(AlertStore::open(&dir.path().join("alerts.db"), b"test").unwrap());

    let scorer = match model_score {
        Some(v) => Arc::new(ScorerHandle::with_model(Arc::new(StaticModel::new(v, "t")))),
        None => Arc::new(ScorerHandle::empty()),
    };

    let intel_config = IntelConfig {
        embedding_dim: DIM,
        ..IntelConfig::default()
    };
    let index = Arc::new(CountingIndex::new(DIM));
    let embedder = TextEmbedder::new(DIM);
    for (id, text) in intel_texts {
        let doc = IntelDocument {
            id: id.to_string(),
            source: SourceType::Technique,
            embedding: embedder.embed(text),
            text: text.to_string(),
        };
        index.upsert(doc).await.unwrap();
    }

    let mock = Arc::new(MockReasoner::new());
    let reasoner = Reasoner::new(
        mock.clone(),
        index.clone(),
        ReasonerConfig {
            max_attempts: 2,
            backoff_base_ms: 1,
            timeout_ms: 1_000,
            ..ReasonerConfig::default()
        },
    );

    let (tx, notifications) = mpsc::unbounded_channel();
    let machine =
        Arc::new(ResponseMachine::new(Arc::new(LogOnlyExecutor)).with_notifications(tx));

    let orchestrator = Orchestrator::new(
        SchemaConfig::default(),
        &ScorerConfig::default(),
        &intel_config,
        scorer,
        index.clone(),
        reasoner,
        DecisionFuser::new(FusionConfig::default()),
        machine.clone(),
        Some(alerts.clone()),
    );

    TestBed {
        orchestrator,
        mock,
        machine,
        alerts,
        index,
        notifications,
        _dir: dir,
    }
}

fn event() -> LogEvent {
    LogEvent::new(
        LogSource::System,
        "svc_deploy",
        "privilege_change",
        "/admin/roles",
        Outcome::Denied,
    )
}

#[test]
fn config_load_default() {
    let c = AutosecConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.schema.feature_dim, 32);
    assert_eq!(c.scorer.anomaly_threshold, 0.5);
    assert!(c.reasoner.endpoint.is_none());
}

#[tokio::test]
async fn benign_event_short_circuits() {
    let mut bed = testbed(Some(0.05), &[]).await;
    let outcome = bed.orchestrator.triage(event()).await;

    let verdict = outcome.verdict.unwrap();
    assert_eq!(verdict.severity, Severity::Low);
    assert_eq!(verdict.tier, Tier::Green);
    assert_eq!(verdict.threat_type, "benign");
    assert_eq!(outcome.record.status, ActionStatus::Executed);
    // Cost control: neither the index nor the reasoner was touched.
    assert_eq!(bed.index.queries(), 0);
    assert_eq!(bed.mock.calls(), 0);
    assert!(bed.notifications.try_recv().is_err());
}

#[tokio::test]
async fn high_anomaly_grounded_confident_goes_red() {
    let ev = event();
    let bed = testbed(Some(0.9), &[("T1110", &ev.summary())]).await;
    bed.mock.push_text(
        r#"{"threat_type": "privilege_escalation", "rationale": "denied admin role change",
            "technique_ids": ["T1110"], "confidence": 0.8}"#,
    );

    let outcome = bed.orchestrator.triage(ev.clone()).await;
    let verdict = outcome.verdict.unwrap();
    assert_eq!(verdict.severity, Severity::High);
    assert_eq!(verdict.tier, Tier::Red);
    // RED never executes without approval.
    assert_eq!(outcome.record.status, ActionStatus::PendingApproval);

    // The prompt carried the retrieved intel, from exactly one index query.
    assert_eq!(bed.index.queries(), 1);
    let prompts = bed.mock.prompts();
    assert!(prompts[0].contains("T1110"));

    // Alert was persisted with the parked record.
    let stored = bed.alerts.get_alert(&ev.id).unwrap().unwrap();
    assert_eq!(stored.verdict.threat_type, "privilege_escalation");
    assert_eq!(stored.record.status, ActionStatus::PendingApproval);

    // Approval executes the action.
    let status = bed.machine.approve(outcome.record.id).await.unwrap();
    assert_eq!(status, ActionStatus::Executed);
}

#[tokio::test]
async fn reasoner_outage_degrades_not_stalls() {
    let bed = testbed(Some(0.9), &[]).await;
    // Empty mock script: every call is unavailable, retries exhaust.
    let outcome = bed.orchestrator.triage(event()).await;

    let verdict = outcome.verdict.unwrap();
    assert_eq!(verdict.threat_type, "unknown");
    // 0.6 * 0.9 weighted puts this at medium, but confidence is too low for
    // autonomous escalation.
    assert_eq!(verdict.severity, Severity::Medium);
    assert_eq!(verdict.tier, Tier::Green);
    assert_eq!(outcome.record.status, ActionStatus::Executed);
    assert_eq!(bed.mock.calls(), 2);
}

#[tokio::test]
async fn yellow_verdict_notifies_operator() {
    let ev = event();
    let mut bed = testbed(Some(0.75), &[("T1078", &ev.summary())]).await;
    bed.mock.push_text(
        r#"{"threat_type": "valid_accounts", "rationale": "unusual role use", "confidence": 0.5}"#,
    );

    let outcome = bed.orchestrator.triage(ev).await;
    let verdict = outcome.verdict.unwrap();
    assert_eq!(verdict.tier, Tier::Yellow);
    assert_eq!(outcome.record.status, ActionStatus::Executed);

    let notification = bed.notifications.recv().await.unwrap();
    assert_eq!(notification.record_id, outcome.record.id);
}

#[tokio::test]
async fn malformed_event_fails_at_vectorize() {
    let bed = testbed(Some(0.9), &[]).await;
    let mut ev = event();
    ev.subject = String::new();

    let outcome = bed.orchestrator.triage(ev).await;
    assert!(outcome.verdict.is_none());
    assert_eq!(outcome.failed_stage, Some(Stage::Vectorize));
    assert_eq!(outcome.record.status, ActionStatus::Failed);
    assert_eq!(outcome.record.failed_stage.as_deref(), Some("vectorize"));
    assert_eq!(bed.mock.calls(), 0);
}

#[tokio::test]
async fn missing_model_fails_at_score() {
    let bed = testbed(None, &[]).await;
    let outcome = bed.orchestrator.triage(event()).await;
    assert!(outcome.verdict.is_none());
    assert_eq!(outcome.failed_stage, Some(Stage::Score));
}

#[tokio::test]
async fn identical_events_get_identical_verdicts() {
    let ev = event();
    let bed = testbed(Some(0.9), &[("T1110", &ev.summary())]).await;
    let reply = r#"{"threat_type": "brute_force", "rationale": "r", "confidence": 0.8}"#;
    bed.mock.push_text(reply);
    bed.mock.push_text(reply);

    let first = bed.orchestrator.triage(ev.clone()).await.verdict.unwrap();
    let second = bed.orchestrator.triage(ev).await.verdict.unwrap();
    assert_eq!(first.severity, second.severity);
    assert_eq!(first.tier, second.tier);
    assert_eq!(first.confidence, second.confidence);
}
