use super::*;
use crate::fixes::testing::{context, toolkit, FakeRunner, MemoryReader};
use crate::netcdf::{AttrValue, FileMetadata};
use crate::rules::RuleBook;
use chrono::TimeZone;
use std::collections::BTreeMap;

const TAS_X: &str = "/data/tas_Amon_Model-X_exp_r1i1p1f1_gn_195001-195012.nc";
const TAS_Y: &str = "/data/tas_Amon_Model-Y_exp_r1i1p1f1_gn_195001-195012.nc";
const TAS_Z: &str = "/data/tas_Amon_Model-Z_exp_r1i1p1f1_gn_195001-195012.nc";

/// Fix names keyed by model.
struct ModelStore(BTreeMap<&'static str, Vec<&'static str>>);

impl ModelStore {
    fn new(entries: &[(&'static str, &[&'static str])]) -> Self {
        Self(
            entries
                .iter()
                .map(|(model, fixes)| (*model, fixes.to_vec()))
                .collect(),
        )
    }
}

impl RulesStore for ModelStore {
    fn select_fixes(&self, identity: &FileIdentity) -> Selection {
        match self.0.get(identity.model.as_str()) {
            Some(fixes) => Selection::Matched(fixes.iter().map(|name| name.to_string()).collect()),
            None => Selection::NotFound,
        }
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn branch_time(value: &str) -> MemoryReader {
    MemoryReader::new(
        FileMetadata::default().with_global("branch_time_in_parent", AttrValue::text(value)),
    )
}

#[test]
fn applies_selected_fix_then_records_history() {
    let store = ModelStore::new(&[("Model-X", &["ParentBranchTimeDoubleFix"])]);
    let catalog = FixCatalog::default();
    let runner = FakeRunner::new();
    let reader = branch_time("1080.0");
    let kit = toolkit();
    let submission =
        Submission::new(&store, &catalog, context(&runner, &reader, &kit)).with_clock(noon);

    let report = submission.process_file(Path::new(TAS_X));

    assert_eq!(report.status, FileStatus::Fixed);
    assert_eq!(
        report.applied,
        vec![AppliedFix {
            fix: "ParentBranchTimeDoubleFix".to_string(),
            timestamp: "2024-03-05T12:00:00Z".to_string(),
        }]
    );
    assert_eq!(
        runner.rendered(),
        vec![
            format!("ncatted -h -a branch_time_in_parent,global,o,d,1080.0 {TAS_X}"),
            format!(
                "ncatted -h -a 'history,global,a,c,2024-03-05T12:00:00Z ParentBranchTimeDoubleFix' {TAS_X}"
            ),
        ]
    );
    assert_eq!(
        report.identity.as_ref().map(|identity| identity.model.as_str()),
        Some("Model-X")
    );
}

#[test]
fn not_found_and_no_fixes_are_reported_separately() {
    let store = ModelStore::new(&[("Model-Y", &[])]);
    let catalog = FixCatalog::default();
    let runner = FakeRunner::new();
    let reader = MemoryReader::default();
    let kit = toolkit();
    let submission = Submission::new(&store, &catalog, context(&runner, &reader, &kit));

    assert_eq!(
        submission.process_file(Path::new(TAS_X)).status,
        FileStatus::NoRules
    );
    assert_eq!(
        submission.process_file(Path::new(TAS_Y)).status,
        FileStatus::NoFixes
    );
    assert!(runner.commands().is_empty());
}

#[test]
fn unknown_fix_name_fails_before_any_fix_runs() {
    let store = ModelStore::new(&[("Model-X", &["ProductAdd", "NoSuchFix"])]);
    let catalog = FixCatalog::default();
    let runner = FakeRunner::new();
    let reader = MemoryReader::default();
    let kit = toolkit();
    let submission = Submission::new(&store, &catalog, context(&runner, &reader, &kit));

    let report = submission.process_file(Path::new(TAS_X));

    assert_eq!(report.status, FileStatus::Failed);
    let failure = report.failure.expect("failure recorded");
    assert_eq!(failure.fix.as_deref(), Some("NoSuchFix"));
    assert!(failure.error.contains("unknown fix"));
    assert!(report.applied.is_empty());
    assert!(runner.commands().is_empty());
}

#[test]
fn failing_fix_stops_remaining_fixes() {
    let store = ModelStore::new(&[(
        "Model-X",
        &["ProductAdd", "ParentBranchTimeDoubleFix", "TrackingIdNew"],
    )]);
    let catalog = FixCatalog::default();
    let runner = FakeRunner::new();
    let reader = MemoryReader::default();
    let kit = toolkit();
    let submission =
        Submission::new(&store, &catalog, context(&runner, &reader, &kit)).with_clock(noon);

    let report = submission.process_file(Path::new(TAS_X));

    assert_eq!(report.status, FileStatus::Failed);
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].fix, "ProductAdd");
    let failure = report.failure.expect("failure recorded");
    assert_eq!(failure.fix.as_deref(), Some("ParentBranchTimeDoubleFix"));
    assert!(failure.error.contains("branch_time_in_parent"));
    // ProductAdd plus its history line; nothing after the failure.
    assert_eq!(runner.commands().len(), 2);
}

#[test]
fn history_lines_follow_application_order() {
    let store = ModelStore::new(&[("Model-X", &["ProductAdd", "MipEraAdd"])]);
    let catalog = FixCatalog::default();
    let runner = FakeRunner::new();
    let reader = MemoryReader::default();
    let kit = toolkit();
    let submission =
        Submission::new(&store, &catalog, context(&runner, &reader, &kit)).with_clock(noon);

    let report = submission.process_file(Path::new(TAS_X));
    assert_eq!(report.status, FileStatus::Fixed);

    let commands = runner.commands();
    assert_eq!(commands.len(), 4);
    assert!(commands[0].args[2].starts_with("product,global,o,c,"));
    assert_eq!(commands[1].args[2], "history,global,a,c,2024-03-05T12:00:00Z ProductAdd");
    assert!(commands[2].args[2].starts_with("mip_era,global,o,c,"));
    assert_eq!(commands[3].args[2], "history,global,a,c,2024-03-05T12:00:00Z MipEraAdd");
}

#[test]
fn batch_continues_past_failures() {
    let store = ModelStore::new(&[
        ("Model-X", &["ParentBranchTimeDoubleFix"]),
        ("Model-Y", &["ProductAdd"]),
    ]);
    let catalog = FixCatalog::default();
    let runner = FakeRunner::new();
    let reader = MemoryReader::default();
    let kit = toolkit();
    let submission = Submission::new(&store, &catalog, context(&runner, &reader, &kit));

    let batch = submission.process_batch(&["/data/not-a-cmip-name.nc", TAS_X, TAS_Y, TAS_Z]);

    let statuses: Vec<FileStatus> = batch.files.iter().map(|file| file.status).collect();
    assert_eq!(
        statuses,
        vec![
            FileStatus::InvalidName,
            FileStatus::Failed,
            FileStatus::Fixed,
            FileStatus::NoRules,
        ]
    );
    assert_eq!((batch.fixed, batch.failed, batch.skipped), (1, 1, 2));
    assert!(batch.has_failures());
}

#[test]
fn institution_rules_read_institution_from_metadata() {
    let book: RuleBook = serde_json::from_str(
        r#"{"schema_version": 1, "rules": [{"institution": "AWI", "fixes": ["ProductAdd"]}]}"#,
    )
    .expect("parse rules");
    let store = book.compile().expect("compile rules");
    let catalog = FixCatalog::default();
    let runner = FakeRunner::new();
    let reader = MemoryReader::new(
        FileMetadata::default().with_global("institution_id", AttrValue::text("AWI")),
    );
    let kit = toolkit();
    let submission = Submission::new(&store, &catalog, context(&runner, &reader, &kit));

    let report = submission.process_file(Path::new(TAS_X));
    assert_eq!(report.status, FileStatus::Fixed);
    assert_eq!(
        report
            .identity
            .as_ref()
            .and_then(|identity| identity.institution.as_deref()),
        Some("AWI")
    );
}

#[test]
fn report_serializes_snake_case_status() {
    let store = ModelStore::new(&[]);
    let catalog = FixCatalog::default();
    let runner = FakeRunner::new();
    let reader = MemoryReader::default();
    let kit = toolkit();
    let submission = Submission::new(&store, &catalog, context(&runner, &reader, &kit));

    let batch = submission.process_batch(&[TAS_X]);
    let json = serde_json::to_value(&batch).expect("serialize report");
    assert_eq!(json["files"][0]["status"], "no_rules");
    assert_eq!(json["files"][0]["identity"]["variable"], "tas");
    assert!(json["files"][0].get("failure").is_none());
    assert_eq!(json["skipped"], 1);
}
