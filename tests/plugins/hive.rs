use clap::Parser;
use omt::core::error::OmtError;
use omt::core::hive_state::{
    AgentStatus, ConsensusGuard, ConsensusStatus, ConsensusUpdate, ExecutionUpdate, HivePhase,
    HiveRole, HiveStateLedger,
};
use omt::core::store::{DocumentStore, FsDocumentStore, HIVE_STATE_DOC};
use omt::core::workspace::{self, Workspace};
use omt::plugins::hive::{self, HiveCli};
use serde_json::json;
use tempfile::tempdir;

fn test_workspace() -> (tempfile::TempDir, Workspace) {
    let tmp = tempdir().unwrap();
    workspace::init_workspace(tmp.path(), "local").unwrap();
    let ws = Workspace::new(tmp.path());
    (tmp, ws)
}

fn hive_cli(args: &[&str]) -> HiveCli {
    let mut argv = vec!["hive"];
    argv.extend_from_slice(args);
    HiveCli::parse_from(argv)
}

#[test]
fn test_init_placeholder_is_not_resumable_until_started() {
    let (_tmp, ws) = test_workspace();
    let ledger = ws.hive_ledger();

    let placeholder = ledger.load_state().unwrap().unwrap();
    assert_eq!(placeholder.phase, None);
    assert!(placeholder.agents.is_none());
    assert!(!placeholder.is_resumable());
    assert!(!ledger.is_resumable().unwrap());

    ledger.start("ship v2").unwrap();
    assert!(ledger.is_resumable().unwrap());
    ledger.set_phase(HivePhase::Completed).unwrap();
    assert!(!ledger.is_resumable().unwrap());
}

#[test]
fn test_missing_document_is_not_resumable_and_rejects_writes() {
    let tmp = tempdir().unwrap();
    let ledger = HiveStateLedger::new(FsDocumentStore::new(tmp.path()));
    assert!(!ledger.is_resumable().unwrap());
    assert!(matches!(
        ledger.set_phase(HivePhase::Pm),
        Err(OmtError::MissingDocument(_))
    ));
}

#[test]
fn test_start_writes_all_pending_document() {
    let (_tmp, ws) = test_workspace();
    ws.hive_ledger().start("ship v2").unwrap();

    let raw = ws.store().read(HIVE_STATE_DOC).unwrap().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["phase"], "init");
    assert_eq!(doc["goal"], "ship v2");
    assert_eq!(doc["agents"]["pm"], json!({"status": "pending", "output": null}));
    assert_eq!(doc["agents"]["arch"], json!({"status": "pending", "output": null}));
    assert_eq!(doc["consensus"]["status"], "pending");
    assert_eq!(doc["consensus"]["decision_points"], json!([]));
    assert_eq!(doc["execution"]["max_failures"], 3);
    assert!(raw.ends_with('\n'));
}

#[test]
fn test_phase_writes_are_permissive() {
    let (_tmp, ws) = test_workspace();
    let ledger = ws.hive_ledger();
    ledger.start("ship v2").unwrap();

    ledger.set_phase(HivePhase::Completed).unwrap();
    let state = ledger.set_phase(HivePhase::Pm).unwrap();
    assert_eq!(state.phase, Some(HivePhase::Pm));
}

#[test]
fn test_consensus_guard_blocks_execution_until_approved() {
    let (_tmp, ws) = test_workspace();
    ws.hive_ledger().start("ship v2").unwrap();
    let guarded = ws.hive_ledger().with_guard(ConsensusGuard);

    assert!(matches!(
        guarded.set_phase(HivePhase::Execution),
        Err(OmtError::TransitionRejected(_))
    ));
    assert_eq!(
        ws.hive_ledger().load_state().unwrap().unwrap().phase,
        Some(HivePhase::Init)
    );

    guarded
        .update_consensus(ConsensusUpdate {
            status: Some(ConsensusStatus::Approved),
            ..ConsensusUpdate::default()
        })
        .unwrap();
    let state = guarded.set_phase(HivePhase::Execution).unwrap();
    assert_eq!(state.phase, Some(HivePhase::Execution));
}

#[test]
fn test_agent_output_can_be_kept_or_cleared() {
    let (_tmp, ws) = test_workspace();
    let ledger = ws.hive_ledger();
    ledger.start("ship v2").unwrap();

    ledger
        .update_agent_status(HiveRole::Arch, AgentStatus::Running, Some(Some("arch.md".into())))
        .unwrap();
    let kept = ledger
        .update_agent_status(HiveRole::Arch, AgentStatus::Completed, None)
        .unwrap();
    assert_eq!(kept.agents.as_ref().unwrap().arch.output.as_deref(), Some("arch.md"));
    assert_eq!(kept.agents.as_ref().unwrap().pm.status, AgentStatus::Pending);

    let cleared = ledger
        .update_agent_status(HiveRole::Arch, AgentStatus::Failed, Some(None))
        .unwrap();
    assert_eq!(cleared.agents.unwrap().arch.output, None);
}

#[test]
fn test_execution_update_merges_counters() {
    let (_tmp, ws) = test_workspace();
    let ledger = ws.hive_ledger();
    ledger.start("ship v2").unwrap();

    ledger
        .update_execution(ExecutionUpdate {
            tasks_total: Some(5),
            current_task: Some(Some("T-1".into())),
            ..ExecutionUpdate::default()
        })
        .unwrap();
    let state = ledger
        .update_execution(ExecutionUpdate {
            tasks_completed: Some(2),
            failure_count: Some(1),
            ..ExecutionUpdate::default()
        })
        .unwrap();
    let execution = state.execution.unwrap();
    assert_eq!(execution.tasks_total, 5);
    assert_eq!(execution.tasks_completed, 2);
    assert_eq!(execution.failure_count, 1);
    assert_eq!(execution.max_failures, 3);
    assert_eq!(execution.current_task, Some(json!("T-1")));
}

#[test]
fn test_every_write_restamps_updated_at() {
    let (_tmp, ws) = test_workspace();
    let ledger = ws.hive_ledger();
    let started = ledger.start("ship v2").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let moved = ledger.set_phase(HivePhase::Pm).unwrap();
    assert_eq!(moved.started_at, started.started_at);
    assert!(moved.updated_at > started.updated_at);
}

#[test]
fn test_cli_commands_drive_the_ledger() {
    let (_tmp, ws) = test_workspace();

    assert!(hive::run_hive_cli(&ws, hive_cli(&["start", "--goal", "ship v2"])).unwrap());
    assert!(hive::run_hive_cli(
        &ws,
        hive_cli(&["agent", "--role", "pm", "--status", "completed", "--output", "pm.md"])
    )
    .unwrap());
    assert!(hive::run_hive_cli(
        &ws,
        hive_cli(&[
            "consensus",
            "--status",
            "modified",
            "--decision-points",
            r#"[{"topic": "storage"}]"#,
            "--user-decisions",
            r#"{"storage": "sqlite"}"#,
        ])
    )
    .unwrap());
    assert!(hive::run_hive_cli(
        &ws,
        hive_cli(&["exec", "--tasks-total", "4", "--current-task", "T-2"])
    )
    .unwrap());
    assert!(hive::run_hive_cli(&ws, hive_cli(&["exec", "--clear-current-task"])).unwrap());

    let state = ws.hive_ledger().load_state().unwrap().unwrap();
    let consensus = state.consensus.unwrap();
    assert_eq!(consensus.status, ConsensusStatus::Modified);
    assert_eq!(consensus.decision_points, vec![json!({"topic": "storage"})]);
    assert_eq!(consensus.user_decisions, Some(json!({"storage": "sqlite"})));
    assert_eq!(state.agents.unwrap().pm.output.as_deref(), Some("pm.md"));
    let execution = state.execution.unwrap();
    assert_eq!(execution.tasks_total, 4);
    assert_eq!(execution.current_task, None);
}

#[test]
fn test_cli_strict_phase_and_resumable() {
    let (_tmp, ws) = test_workspace();
    hive::run_hive_cli(&ws, hive_cli(&["start", "--goal", "ship v2"])).unwrap();

    let refused = hive::run_hive_cli(&ws, hive_cli(&["phase", "execution", "--strict"]));
    assert!(matches!(refused, Err(OmtError::TransitionRejected(_))));

    assert!(hive::run_hive_cli(&ws, hive_cli(&["phase", "aborted"])).unwrap());
    assert!(!hive::run_hive_cli(&ws, hive_cli(&["resumable"])).unwrap());
}

#[test]
fn test_cli_rejects_malformed_json_arguments() {
    let (_tmp, ws) = test_workspace();
    hive::run_hive_cli(&ws, hive_cli(&["start", "--goal", "ship v2"])).unwrap();
    let result = hive::run_hive_cli(
        &ws,
        hive_cli(&["consensus", "--decision-points", "{not json"]),
    );
    assert!(matches!(result, Err(OmtError::MalformedInput(_))));
}

#[test]
fn test_schema_lists_every_subcommand() {
    let schema = hive::schema();
    let names: Vec<&str> = schema["commands"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(
        names,
        vec!["start", "phase", "agent", "exec", "consensus", "resumable", "show"]
    );
}
