//! Template Loading Tests
//!
//! Loads the templates shipped with the crate and runs real log lines
//! through a parser built from them.

use std::path::Path;

use tailscribe::{overflow::MemoryOverflow, Error, ParserStateMachine, TemplateSet, ValidationError};

fn shipped_templates() -> TemplateSet {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates.yaml");
    TemplateSet::from_yaml_file(&path).unwrap()
}

#[test]
fn test_shipped_templates_load() {
    let templates = shipped_templates();
    assert_eq!(templates.len(), 3);
    assert!(templates.get("system-info").unwrap().is_multiline());
    assert_eq!(
        templates.get("hauling-pick-created").unwrap().label(),
        Some("Hauling Pick Created")
    );
}

#[test]
fn test_shipped_templates_parse_game_lines() {
    let mut parser = ParserStateMachine::new(shipped_templates(), MemoryOverflow::new());

    let line = r#"<2025-05-01T18:22:31.117Z> [Notice] <ContextEstablisher Model Change State> The Model is changing state meaning views must update their model state. oldState=11 newState=12 localState=13 remoteState=0 modelState=11 ViewName="GameClient <local>:16" connection={2, 1} node_id=00000000-0000-0000-0000-00000000e999 playerGEID=201990709661 sessionId="b42779d5860da28ff910aaa9db2746b1" [Team_Network][Replication]"#;
    let entry = parser.handle_line(line).unwrap().unwrap();
    assert_eq!(entry.template.id(), "context-establisher-state-change");
    assert_eq!(entry.fields["view"], "GameClient <local>:16");
    assert_eq!(entry.fields["connection_b"], "1");
    assert_eq!(entry.tags, vec!["Team_Network", "Replication"]);

    let line = "<2025-05-01T18:22:32.000Z> [Notice] <CreateHaulingObjectiveHandler> Pick created - [Cient] sourcename: HaulCargo_OpenDelivery, missionId: 00000000-0000-0000-0000-000000000000, locationName: UNKNOWN LOCATION NAME, locationHash: 0, locationSuperGUID: , objectiveId: , objectiveTokenDebugName: Cargo Hauling, itemGuid: a789f57a-e12b-4bcd-8132-e0c03d84fc89";
    let entry = parser.handle_line(line).unwrap().unwrap();
    assert_eq!(entry.template.id(), "hauling-pick-created");
    assert_eq!(entry.fields["location_name"], "UNKNOWN LOCATION NAME");
    assert_eq!(entry.fields["token_debug_name"], "Cargo Hauling");
    assert!(entry.tags.is_empty());

    assert!(parser
        .handle_line("<2025-05-01T18:22:33.000Z> --- System info (memory)")
        .unwrap()
        .is_none());
    assert!(parser.handle_line("total: 32768 MB").unwrap().is_none());
    let entry = parser
        .handle_line("<2025-05-01T18:22:33.001Z> --- End system info")
        .unwrap()
        .unwrap();
    assert_eq!(entry.template.id(), "system-info");
    assert_eq!(entry.fields["section"], "memory");
    assert_eq!(entry.line_count(), 3);

    assert!(parser.overflow().lines.is_empty());
}

#[test]
fn test_asymmetric_block_is_a_load_error() {
    let yaml = r#"
- id: half-block
  starts-with: "BEGIN"
"#;
    let err = TemplateSet::from_yaml_str(yaml).unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::UnpairedMarker { .. })
    ));
    assert_eq!(
        err.to_string(),
        "template 'half-block' defines 'starts-with' without 'ends-with'"
    );
}
