//! AutoSec Core entrypoint: loads the anomaly model and intel corpus, then
//! triages JSONL event batches from a spool directory. Runs a single pass or
//! a polling loop with a configurable interval.

use autosec_core::{
    config::AutosecConfig,
    fusion::DecisionFuser,
    intel::{IntelIndex, MemoryIntelIndex, TextEmbedder},
    logging::{AuditLine, StructuredLogger},
    model::{OnnxModel, ScorerHandle, StaticModel},
    orchestrator::Orchestrator,
    reason::{DisabledReasoner, HttpReasoner, Reasoner, ReasoningService},
    response::{LogOnlyExecutor, ResponseMachine},
    storage::{load_corpus, AlertStore},
    LogEvent,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Triage every event in every `.jsonl` file under the spool directory.
/// Consumed files are renamed to `.done` so a later pass skips them.
async fn run_spool_pass(
    orchestrator: &Arc<Orchestrator>,
    spool_dir: &Path,
    max_in_flight: usize,
) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
    let mut batch_files: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(spool_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            batch_files.push(path);
        }
    }
    batch_files.sort();

    let mut triaged = 0usize;
    for path in batch_files {
        let data = std::fs::read_to_string(&path)?;
        let mut tasks: JoinSet<()> = JoinSet::new();

        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: LogEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(file = %path.display(), line = lineno + 1, error = %e, "skipping event");
                    continue;
                }
            };

            if tasks.len() >= max_in_flight {
                tasks.join_next().await;
            }
            let orchestrator = orchestrator.clone();
            tasks.spawn(async move {
                let outcome = orchestrator.triage(event).await;
                let record_id = outcome.record.id.to_string();
                let line = match &outcome.verdict {
                    Some(verdict) => AuditLine {
                        ts: chrono::Utc::now().to_rfc3339(),
                        event_id: &verdict.event_id,
                        severity: match verdict.severity {
                            autosec_core::Severity::Low => "low",
                            autosec_core::Severity::Medium => "medium",
                            autosec_core::Severity::High => "high",
                        },
                        tier: match verdict.tier {
                            autosec_core::Tier::Green => "GREEN",
                            autosec_core::Tier::Yellow => "YELLOW",
                            autosec_core::Tier::Red => "RED",
                        },
                        confidence: verdict.confidence,
                        threat_type: &verdict.threat_type,
                        record_id: Some(&record_id),
                        failed_stage: None,
                    },
                    None => AuditLine {
                        ts: chrono::Utc::now().to_rfc3339(),
                        event_id: &outcome.record.event_id,
                        severity: "none",
                        tier: "NONE",
                        confidence: 0.0,
                        threat_type: "none",
                        record_id: Some(&record_id),
                        failed_stage: outcome.failed_stage.map(|s| s.as_str()),
                    },
                };
                StructuredLogger::emit_json(&line, &mut std::io::stdout());
            });
            triaged += 1;
        }

        while tasks.join_next().await.is_some() {}

        let mut done = path.clone();
        done.set_extension("jsonl.done");
        if let Err(e) = std::fs::rename(&path, &done) {
            warn!(file = %path.display(), error = %e, "could not mark batch consumed");
        }
    }

    Ok(triaged)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("AUTOSEC_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = AutosecConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(data_dir = ?config.data_dir, "autosec core starting");

    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::create_dir_all(&config.ingest.spool_dir)?;

    let secret = std::env::var("AUTOSEC_STORE_SECRET")
        .unwrap_or_else(|_| "store-secret-placeholder".to_string());
    let alerts = Arc::new(AlertStore::open(
        &config.data_dir.join("alerts.db"),
        secret.as_bytes(),
    )?);

    let scorer = Arc::new(ScorerHandle::empty());
    match OnnxModel::load(
        &config.model_path,
        config.schema.feature_dim,
        &config.model_version,
    ) {
        Ok(model) => scorer.install(Arc::new(model)),
        Err(e) => {
            warn!(error = %e, "model load failed, using fixed-score fallback");
            scorer.install(Arc::new(StaticModel::new(0.0, "static-fallback")));
        }
    }

    let index: Arc<dyn IntelIndex> = Arc::new(MemoryIntelIndex::new(config.intel.embedding_dim));
    let embedder = TextEmbedder::new(config.intel.embedding_dim);
    if config.intel.corpus_dir.exists() {
        load_corpus(&config.intel.corpus_dir, &embedder, index.as_ref()).await?;
    } else {
        warn!(dir = %config.intel.corpus_dir.display(), "no corpus directory, index starts empty");
    }

    let mut reasoner_config = config.reasoner.clone();
    let service: Arc<dyn ReasoningService> = match HttpReasoner::new(&reasoner_config) {
        Some(client) => Arc::new(client),
        None => {
            warn!("no reasoning endpoint configured, assessments will degrade");
            reasoner_config.max_attempts = 1;
            Arc::new(DisabledReasoner)
        }
    };
    let reasoner = Reasoner::new(service, index.clone(), reasoner_config);

    let (notify_tx, mut notify_rx) =
        tokio::sync::mpsc::unbounded_channel::<autosec_core::response::Notification>();
    tokio::spawn(async move {
        while let Some(n) = notify_rx.recv().await {
            info!(
                record_id = %n.record_id,
                event_id = %n.event_id,
                action = %n.action,
                "operator notification"
            );
        }
    });

    let machine = Arc::new(
        ResponseMachine::new(Arc::new(LogOnlyExecutor)).with_notifications(notify_tx),
    );

    let orchestrator = Arc::new(Orchestrator::new(
        config.schema.clone(),
        &config.scorer,
        &config.intel,
        scorer,
        index,
        reasoner,
        DecisionFuser::new(config.fusion.clone()),
        machine.clone(),
        Some(alerts),
    ));

    let interval_secs = config.ingest.poll_interval_secs;
    if interval_secs > 0 {
        info!(interval_secs, "polling spool (Ctrl+C to stop)");
        static STOP: AtomicBool = AtomicBool::new(false);
        let _ = ctrlc::set_handler(|| {
            STOP.store(true, Ordering::Relaxed);
        });

        while !STOP.load(Ordering::Relaxed) {
            match run_spool_pass(
                &orchestrator,
                &config.ingest.spool_dir,
                config.ingest.max_in_flight,
            )
            .await
            {
                Ok(n) if n > 0 => info!(count = n, "spool pass complete"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "spool pass failed"),
            }
            let cutoff = chrono::Utc::now()
                - chrono::Duration::seconds(config.ingest.record_retention_secs as i64);
            let pruned = machine.prune_terminal(cutoff).await;
            if pruned > 0 {
                info!(count = pruned, "pruned terminal action records");
            }
            for _ in 0..interval_secs {
                if STOP.load(Ordering::Relaxed) {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
        info!("autosec core stopping");
    } else {
        let n = run_spool_pass(
            &orchestrator,
            &config.ingest.spool_dir,
            config.ingest.max_in_flight,
        )
        .await?;
        info!(count = n, "single pass complete");
    }

    Ok(())
}
