use super::*;

fn identity(model: &str, experiment: &str, table: &str, variable: &str) -> FileIdentity {
    FileIdentity::new(model, experiment, table, variable)
}

fn criteria(model: Option<&str>, variable: Option<&str>) -> Criteria {
    Criteria {
        model: model.map(str::to_string),
        variable: variable.map(str::to_string),
        ..Criteria::default()
    }
}

fn book_from(text: &str) -> RuleBook {
    let book: RuleBook = serde_json::from_str(text).expect("parse rules");
    book.validate().expect("valid rules");
    book
}

#[test]
fn not_found_is_distinct_from_matched_without_fixes() {
    let book = book_from(
        r#"{
            "schema_version": 1,
            "rules": [
                {"model": "Model-X", "fixes": []},
                {"model": "Model-Y", "fixes": ["ProductAdd"]}
            ]
        }"#,
    );
    let rules = book.compile().expect("compile");

    assert_eq!(
        rules.select_fixes(&identity("Model-X", "historical", "Amon", "tas")),
        Selection::Matched(Vec::new())
    );
    assert_eq!(
        rules.select_fixes(&identity("Other", "historical", "Amon", "tas")),
        Selection::NotFound
    );
}

#[test]
fn selection_concatenates_in_file_order_without_duplicates() {
    let book = book_from(
        r#"{
            "schema_version": 1,
            "rules": [
                {"model": "Model-*", "fixes": ["ParentBranchTimeDoubleFix", "ProductAdd"]},
                {"variable": "tas", "table": "?mon", "fixes": ["ProductAdd", "TrackingIdNew"]},
                {"variable": "pr", "fixes": ["ToDegC"]}
            ]
        }"#,
    );
    let rules = book.compile().expect("compile");

    assert_eq!(
        rules.select_fixes(&identity("Model-X", "historical", "Amon", "tas")),
        Selection::Matched(vec![
            "ParentBranchTimeDoubleFix".to_string(),
            "ProductAdd".to_string(),
            "TrackingIdNew".to_string(),
        ])
    );
}

#[test]
fn exclusions_suppress_a_rule() {
    let book = book_from(
        r#"{
            "schema_version": 1,
            "rules": [
                {
                    "model": "Model-X",
                    "exclude": [{"experiment": "piControl"}, {"table": "fx"}],
                    "fixes": ["ProductAdd"]
                }
            ]
        }"#,
    );
    let rules = book.compile().expect("compile");

    assert_eq!(
        rules.select_fixes(&identity("Model-X", "piControl", "Amon", "tas")),
        Selection::NotFound
    );
    assert_eq!(
        rules.select_fixes(&identity("Model-X", "historical", "fx", "areacella")),
        Selection::NotFound
    );
    assert_eq!(
        rules.select_fixes(&identity("Model-X", "historical", "Amon", "tas")),
        Selection::Matched(vec!["ProductAdd".to_string()])
    );
}

#[test]
fn institution_criterion_requires_known_institution() {
    let book = book_from(
        r#"{
            "schema_version": 1,
            "rules": [{"institution": "AWI", "fixes": ["ProductAdd"]}]
        }"#,
    );
    let rules = book.compile().expect("compile");
    let bare = identity("AWI-CM-1-0", "historical", "Amon", "tas");

    assert_eq!(rules.select_fixes(&bare), Selection::NotFound);
    assert_eq!(
        rules.select_fixes(&bare.with_institution(Some("AWI".to_string()))),
        Selection::Matched(vec!["ProductAdd".to_string()])
    );
}

#[test]
fn glob_patterns_are_anchored_and_literal_otherwise() {
    let pattern = glob_regex("MPI-ESM1.2-*").expect("compile glob");
    assert!(pattern.is_match("MPI-ESM1.2-HR"));
    assert!(!pattern.is_match("MPI-ESM1x2-HR"));
    assert!(!pattern.is_match("X-MPI-ESM1.2-HR"));

    let single = glob_regex("?mon").expect("compile glob");
    assert!(single.is_match("Amon"));
    assert!(!single.is_match("Omon2"));
}

#[test]
fn validate_rejects_bad_books() {
    let book = RuleBook {
        schema_version: 7,
        rules: Vec::new(),
    };
    let err = book.validate().expect_err("schema rejected");
    assert!(err.to_string().contains("schema_version 7"));

    let mut book = RuleBook::default();
    book.rules.push(Rule {
        exclude: vec![Criteria::default()],
        ..Rule::default()
    });
    let err = book.validate().expect_err("empty exclusion rejected");
    assert!(err.to_string().contains("exclude[0]"));

    let mut book = RuleBook::default();
    book.rules.push(Rule {
        criteria: criteria(Some(""), None),
        ..Rule::default()
    });
    let err = format!("{:#}", book.validate().expect_err("empty pattern rejected"));
    assert!(err.contains("model pattern must be non-empty"), "{err}");
}

#[test]
fn add_fix_targets_rule_with_identical_criteria() {
    let mut book = RuleBook::default();
    let tas = criteria(Some("Model-X"), Some("tas"));

    assert!(book.add_fix(&tas, "ProductAdd").expect("add"));
    assert!(book.add_fix(&tas, "TrackingIdNew").expect("add"));
    assert!(!book.add_fix(&tas, "ProductAdd").expect("add duplicate"));
    assert!(book
        .add_fix(&criteria(Some("Model-X"), None), "ProductAdd")
        .expect("add"));

    assert_eq!(book.rules.len(), 2);
    assert_eq!(book.rules[0].fixes, vec!["ProductAdd", "TrackingIdNew"]);
    assert_eq!(book.rules[1].fixes, vec!["ProductAdd"]);
}

#[test]
fn remove_fix_counts_changed_rules() {
    let mut book = RuleBook::default();
    let tas = criteria(Some("Model-X"), Some("tas"));
    book.add_fix(&tas, "ProductAdd").expect("add");
    book.add_fix(&criteria(Some("Model-X"), None), "ProductAdd")
        .expect("add");

    assert_eq!(book.remove_fix(&tas, "ProductAdd"), 1);
    assert_eq!(book.remove_fix(&tas, "ProductAdd"), 0);
    assert!(book.rules[0].fixes.is_empty());
    assert_eq!(book.rules[1].fixes, vec!["ProductAdd"]);
}

#[test]
fn write_then_load_round_trips_and_missing_file_is_empty() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("rules.json");

    let empty = load_rules(&path, true).expect("missing allowed");
    assert!(empty.rules.is_empty());
    assert!(load_rules(&path, false).is_err());

    let mut book = RuleBook::default();
    book.add_fix(&criteria(Some("Model-X"), Some("tas")), "ProductAdd")
        .expect("add");
    write_rules(&path, &book).expect("write rules");

    let text = std::fs::read_to_string(&path).expect("read rules");
    assert!(text.contains("\"model\": \"Model-X\""));
    assert!(!text.contains("institution"));
    assert_eq!(load_rules(&path, false).expect("load rules"), book);
}

#[test]
fn institution_lookup_only_when_some_rule_uses_it() {
    let plain = book_from(r#"{"schema_version": 1, "rules": [{"model": "M", "fixes": []}]}"#);
    assert!(!plain.compile().expect("compile").needs_institution());

    let excluded = book_from(
        r#"{"schema_version": 1, "rules": [{"model": "M", "exclude": [{"institution": "X"}]}]}"#,
    );
    assert!(excluded.compile().expect("compile").needs_institution());
}
