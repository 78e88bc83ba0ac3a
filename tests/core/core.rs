use omt::core::consistency::{ArtifactLayout, ConsistencyChecker, FsArtifactProbe, StateCheckOutcome};
use omt::core::contract::{
    self, AgentContract, AgentExecutionContext, FieldStatus, ValidationPhase,
};
use omt::core::error::OmtError;
use omt::core::hive_state::{
    AgentStatus, ConsensusStatus, ConsensusUpdate, ExecutionUpdate, HivePhase, HiveRole,
    HiveStateLedger,
};
use omt::core::store::{DocumentStore, FsDocumentStore, HIVE_STATE_DOC};
use omt::core::task_state::{TaskPhase, TaskStateLedger};
use omt::core::workspace::{self, Workspace};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn reviewer_contract() -> AgentContract {
    serde_json::from_value(json!({
        "agent": "reviewer",
        "description": "Reviews a change",
        "method": {"name": "review", "description": "read the diff", "steps": ["read", "comment"]},
        "input_contract": {
            "required": [
                {"field_name": "summary", "description": "change summary", "type": "string", "validation": ["minLength:5", "maxLength:200"]},
                {"field_name": "files", "description": "touched files", "type": "array", "validation": ["minItems:1"]}
            ],
            "optional": [
                {"field_name": "ticket", "description": "tracker id", "type": "string", "validation": ["pattern:^[A-Z]+-[0-9]+$"]},
                {"field_name": "notes", "description": "free form", "type": "any"}
            ],
            "source": [{"location": ".agents/outputs/arch.md", "description": "architecture"}]
        },
        "output_contract": {
            "required": [
                {"field_name": "verdict", "description": "approve/reject", "type": "string", "validation": ["pattern:^(approve|reject)$"]}
            ],
            "optional": [
                {"field_name": "report_path", "description": "report file", "type": "string", "validation": ["fileExists"]}
            ],
            "destination": [".agents/outputs/review.md"]
        },
        "validation": ["verdict must be justified"]
    }))
    .expect("reviewer contract")
}

fn context(phase: ValidationPhase, data: Value) -> AgentExecutionContext {
    let map: Map<String, Value> = data.as_object().cloned().unwrap_or_default();
    AgentExecutionContext {
        agent: "reviewer".to_string(),
        task_id: "T-42".to_string(),
        phase,
        input_data: if phase == ValidationPhase::Input { map.clone() } else { Map::new() },
        output_data: (phase == ValidationPhase::Output).then_some(map),
    }
}

#[test]
fn input_valid_iff_every_required_field_passes() {
    let c = reviewer_contract();
    let ok = contract::validate_input(
        &c,
        &context(ValidationPhase::Input, json!({"summary": "Fix the parser", "files": ["a.rs"]})),
    );
    assert!(ok.valid, "{:?}", ok.errors);

    let short = contract::validate_input(
        &c,
        &context(ValidationPhase::Input, json!({"summary": "Fix", "files": ["a.rs"]})),
    );
    assert!(!short.valid);
    assert_eq!(short.errors[0].field, "summary");
    assert_eq!(short.errors[0].status, FieldStatus::Invalid);
    assert_eq!(short.errors[0].actual_value, Some(json!("Fix")));

    let wrong_type = contract::validate_input(
        &c,
        &context(ValidationPhase::Input, json!({"summary": "Fix the parser", "files": "a.rs"})),
    );
    assert!(!wrong_type.valid);
    assert!(wrong_type.errors[0].message.as_deref().unwrap().contains("\"array\""));
}

#[test]
fn errors_are_reported_in_declaration_order() {
    let r = contract::validate_input(&reviewer_contract(), &context(ValidationPhase::Input, json!({})));
    let fields: Vec<_> = r.errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["summary", "files"]);
    assert!(r.errors.iter().all(|e| e.status == FieldStatus::Missing));
}

#[test]
fn optional_fields_only_warn_when_present_and_invalid() {
    let c = reviewer_contract();
    let base = json!({"summary": "Fix the parser", "files": ["a.rs"], "ticket": "omt-1"});
    let r = contract::validate_input(&c, &context(ValidationPhase::Input, base));
    assert!(r.valid);
    assert_eq!(r.warnings.len(), 1);
    assert_eq!(r.warnings[0].field, "ticket");

    let absent = contract::validate_input(
        &c,
        &context(ValidationPhase::Input, json!({"summary": "Fix the parser", "files": ["a.rs"]})),
    );
    assert!(absent.warnings.is_empty());
}

#[test]
fn output_validation_and_report() {
    let c = reviewer_contract();
    let r = contract::validate_output(
        &c,
        &context(ValidationPhase::Output, json!({"verdict": "maybe", "report_path": "/nowhere"})),
    );
    assert!(!r.valid);
    let report = contract::format_validation_result(&r, ValidationPhase::Output);
    assert_eq!(report, contract::format_validation_result(&r, ValidationPhase::Output));
    assert!(report.starts_with("OUTPUT Contract Validation:\nStatus: ✗ FAILED\n"));
    assert!(report.contains("  ✗ verdict: \"verdict\" does not match required pattern: ^(approve|reject)$"));
    assert!(!report.contains("All required fields validated successfully."));
}

#[test]
fn load_contract_distinguishes_missing_and_malformed() {
    let tmp = tempdir().expect("tempdir");
    assert!(matches!(
        contract::load_contract(tmp.path(), "ghost"),
        Err(OmtError::NotFound(_))
    ));
    fs::write(tmp.path().join("broken.json"), "{\"agent\": ").expect("write");
    assert!(matches!(
        contract::load_contract(tmp.path(), "broken"),
        Err(OmtError::MalformedInput(_))
    ));
    fs::write(
        tmp.path().join("reviewer.json"),
        serde_json::to_string(&reviewer_contract()).expect("serialize"),
    )
    .expect("write");
    assert_eq!(
        contract::load_contract(tmp.path(), "reviewer").expect("load"),
        reviewer_contract()
    );
}

#[test]
fn validation_feeds_the_task_ledger_on_disk() {
    let tmp = tempdir().expect("tempdir");
    workspace::init_workspace(tmp.path(), "local").expect("init");
    let ws = Workspace::new(tmp.path());
    let ledger = ws.task_ledger();
    ledger.init_task("T-42", "Review parser fix").expect("init task");

    let result = contract::validate_input(&reviewer_contract(), &context(ValidationPhase::Input, json!({})));
    ledger
        .record_planning_agent("reviewer", ".agents/outputs/reviewer.md", &result)
        .expect("record");
    ledger.set_phase(TaskPhase::Execution).expect("phase");

    let raw = fs::read_to_string(ws.state_dir().join("state.json")).expect("read state.json");
    let doc: Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(doc["current_phase"], "execution");
    assert_eq!(doc["planning"]["agents_executed"], json!(["reviewer"]));
    assert_eq!(doc["planning"]["outputs"]["reviewer"]["contract_validated"], false);
    assert_eq!(
        doc["planning"]["outputs"]["reviewer"]["validation_results"]["summary"],
        "✗ Required field \"summary\" is missing"
    );
}

#[test]
fn last_writer_wins_between_two_ledger_handles() {
    let tmp = tempdir().expect("tempdir");
    let store = FsDocumentStore::new(tmp.path());
    let a = TaskStateLedger::new(store.clone());
    let b = TaskStateLedger::new(store.clone());
    a.init_task("T-1", "race").expect("init");

    let mut stale = b.read_state().expect("read").expect("doc");
    a.set_phase(TaskPhase::Review).expect("a writes");
    stale.current_phase = Some(TaskPhase::Complete);
    b.save_state(&stale).expect("b overwrites");

    let final_state = a.read_state().expect("read").expect("doc");
    assert_eq!(final_state.current_phase, Some(TaskPhase::Complete));
}

#[test]
fn end_to_end_execution_without_consensus() {
    let tmp = tempdir().expect("tempdir");
    workspace::init_workspace(tmp.path(), "local").expect("init");
    let ws = Workspace::new(tmp.path());
    let hive = ws.hive_ledger();
    hive.start("ship v2").expect("start");
    hive.set_phase(HivePhase::Execution).expect("permissive phase write");

    let layout = ArtifactLayout::default();
    let outcome = ConsistencyChecker::new(&layout)
        .run(&hive, &FsArtifactProbe::new(tmp.path()))
        .expect("check");
    match outcome {
        StateCheckOutcome::Checked { issues } => {
            assert_eq!(issues.len(), 1, "{issues:?}");
            assert!(issues[0].contains("pending"));
            assert!(!issues[0].contains("tasks_completed"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn checker_sees_artifacts_on_disk() {
    let tmp = tempdir().expect("tempdir");
    workspace::init_workspace(tmp.path(), "local").expect("init");
    let ws = Workspace::new(tmp.path());
    let hive = ws.hive_ledger();
    hive.start("ship v2").expect("start");
    hive.update_agent_status(HiveRole::Pm, AgentStatus::Completed, Some(Some("pm.md".into())))
        .expect("pm");
    hive.update_consensus(ConsensusUpdate {
        status: Some(ConsensusStatus::Approved),
        ..ConsensusUpdate::default()
    })
    .expect("consensus");
    hive.set_phase(HivePhase::Execution).expect("phase");
    hive.update_execution(ExecutionUpdate {
        tasks_total: Some(3),
        tasks_completed: Some(1),
        ..ExecutionUpdate::default()
    })
    .expect("exec");

    let layout = ArtifactLayout::default();
    let checker = ConsistencyChecker::new(&layout);
    let probe = FsArtifactProbe::new(tmp.path());
    let before = checker.run(&hive, &probe).expect("check");
    assert_eq!(
        before,
        StateCheckOutcome::Checked {
            issues: vec![
                "agents.pm.status is completed but .agents/outputs/pm.md does not exist".to_string(),
                "execution.tasks_completed is 1 but neither .agents/outputs/execution.md nor .agents/outputs/execution exists".to_string(),
            ]
        }
    );

    fs::write(ws.outputs_dir().join("pm.md"), "# PRD").expect("pm artifact");
    fs::create_dir_all(ws.outputs_dir().join("execution")).expect("exec dir");
    assert!(checker.run(&hive, &probe).expect("check").passed());
}

#[test]
fn checker_accepts_a_known_path_set() {
    let tmp = tempdir().expect("tempdir");
    let store = FsDocumentStore::new(tmp.path());
    store
        .replace(
            HIVE_STATE_DOC,
            r#"{"phase": "arch", "agents": {"pm": {"status": "pending", "output": null}}}"#,
        )
        .expect("seed");
    let hive = HiveStateLedger::new(store);
    let layout = ArtifactLayout::default();
    let known: BTreeSet<PathBuf> = [layout.pm.clone()].into_iter().collect();
    let outcome = ConsistencyChecker::new(&layout).run(&hive, &known).expect("check");
    assert!(!outcome.passed());
}

#[test]
fn malformed_hive_document_aborts_the_check() {
    let tmp = tempdir().expect("tempdir");
    let store = FsDocumentStore::new(tmp.path());
    store.replace(HIVE_STATE_DOC, "{\"phase\": \"sideways\"}").expect("seed");
    let hive = HiveStateLedger::new(store);
    let layout = ArtifactLayout::default();
    assert!(matches!(
        ConsistencyChecker::new(&layout).run(&hive, &FsArtifactProbe::new(tmp.path())),
        Err(OmtError::MalformedInput(_))
    ));
}
