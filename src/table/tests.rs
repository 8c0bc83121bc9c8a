//! Tests for table definitions

use super::*;
use crate::error::Error;
use crate::query::Operator;
use crate::types::ColumnType;
use std::io::Write;

const MINIMAL: &str = r#"
name: custom_things
endpoint: things
columns:
  - name: id
  - name: display_name
    operators: ["=", "<>"]
"#;

// ============================================================================
// Parsing Tests
// ============================================================================

#[test]
fn test_defaults() {
    let def = load_table_from_str(MINIMAL).unwrap();
    assert_eq!(def.api_version, ApiVersion::V1);
    assert_eq!(def.page_size_max, 999);
    assert!(def.supports_top);
    assert!(!def.singleton);
    assert!(!def.advanced_query);
    assert_eq!(def.key, "id");
    assert!(def.ignore_errors.is_empty());
    assert_eq!(def.column_names(), vec!["id", "display_name"]);
}

#[test]
fn test_column_defaults() {
    let def = load_table_from_str(MINIMAL).unwrap();
    let column = def.column("display_name").unwrap();
    assert_eq!(column.column_type, ColumnType::String);
    assert_eq!(column.operators, vec![Operator::Eq, Operator::Ne]);
    assert_eq!(
        column.source(),
        ColumnSource::Field {
            field: "displayName".to_string(),
            path: None
        }
    );
    assert_eq!(column.filter_property().as_deref(), Some("displayName"));
    assert!(column.supports(Operator::Ne));
    assert!(!column.supports(Operator::Gt));
}

#[test]
fn test_column_sources() {
    let def = load_table("entra_user").unwrap();

    assert_eq!(
        def.column("member_of").unwrap().source(),
        ColumnSource::Expand {
            relation: "memberOf".to_string(),
            select: vec!["id".to_string(), "displayName".to_string()],
        }
    );
    assert_eq!(
        def.column("tenant_id").unwrap().source(),
        ColumnSource::Synthetic(SyntheticKind::TenantId)
    );
    assert!(def.column("member_of").unwrap().filter_property().is_none());
    assert!(def.column("title").unwrap().filter_property().is_none());
}

#[test]
fn test_beta_singleton() {
    let def = load_table("entra_admin_consent_request_policy").unwrap();
    assert_eq!(def.api_version, ApiVersion::Beta);
    assert_eq!(def.api_version.as_str(), "beta");
    assert!(def.singleton);
    assert!(!def.supports_get());
}

#[test]
fn test_get_endpoint_template() {
    let def = load_table_from_str(MINIMAL).unwrap();
    assert_eq!(def.get_endpoint_template(), "things/{{ key }}");

    let def = load_table_from_str(
        r#"
name: custom
endpoint: things/
get_endpoint: "things/{{ key }}/details"
columns:
  - name: id
"#,
    )
    .unwrap();
    assert_eq!(def.get_endpoint_template(), "things/{{ key }}/details");
}

#[test]
fn test_require_column() {
    let def = load_table_from_str(MINIMAL).unwrap();
    assert!(def.require_column("id").is_ok());
    let err = def.require_column("nope").unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound { .. }));
}

// ============================================================================
// Ignore Error Tests
// ============================================================================

#[test]
fn test_ignore_errors_match_code_and_message() {
    let ignore = IgnoreErrors {
        codes: vec!["Request_ResourceNotFound".to_string()],
        messages: vec!["premium license".to_string()],
    };

    assert!(ignore.matches(&Error::provider(404, "Request_ResourceNotFound", "gone")));
    assert!(ignore.matches(&Error::provider(
        403,
        "Forbidden",
        "Tenant does not have a premium license"
    )));
    assert!(!ignore.matches(&Error::provider(403, "Authorization_RequestDenied", "denied")));
    assert!(!ignore.matches(&Error::config("Request_ResourceNotFound")));
}

#[test]
fn test_ignore_errors_codes_builder() {
    let ignore = IgnoreErrors::codes(["A", "B"]);
    assert!(ignore.matches(&Error::provider(400, "B", "")));
    assert!(!ignore.matches(&Error::provider(400, "C", "")));
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_builtin_by_name() {
    let def = load_table("entra_group").unwrap();
    assert_eq!(def.name, "entra_group");
    assert_eq!(def.endpoint, "groups");
}

#[test]
fn test_load_unknown_name() {
    let err = load_table("entra_nothing").unwrap_err();
    assert!(matches!(err, Error::TableNotFound { .. }));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();

    let def = load_table(file.path()).unwrap();
    assert_eq!(def.name, "custom_things");
}

#[test]
fn test_load_missing_file_lists_builtins() {
    let err = load_table("./missing/table.yaml").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("entra_user"));
}

// ============================================================================
// Validation Tests
// ============================================================================

fn invalid(yaml: &str) -> String {
    load_table_from_str(yaml).unwrap_err().to_string()
}

#[test]
fn test_reject_empty_endpoint() {
    assert!(invalid("name: t\nendpoint: \"/\"\ncolumns:\n  - name: id\n").contains("endpoint"));
}

#[test]
fn test_reject_zero_page_size() {
    let yaml = "name: t\nendpoint: x\npage_size_max: 0\ncolumns:\n  - name: id\n";
    assert!(invalid(yaml).contains("page_size_max"));
}

#[test]
fn test_reject_no_columns() {
    assert!(invalid("name: t\nendpoint: x\ncolumns: []\n").contains("at least one column"));
}

#[test]
fn test_reject_duplicate_columns() {
    let yaml = "name: t\nendpoint: x\ncolumns:\n  - name: id\n  - name: id\n";
    assert!(invalid(yaml).contains("duplicate column"));
}

#[test]
fn test_reject_operators_on_synthetic() {
    let yaml = r#"
name: t
endpoint: x
columns:
  - name: id
  - name: title
    synthetic: title
    operators: ["="]
"#;
    assert!(invalid(yaml).contains("synthetic"));
}

#[test]
fn test_reject_template_on_non_title() {
    let yaml = r#"
name: t
endpoint: x
columns:
  - name: id
  - name: tenant_id
    synthetic: tenant_id
    template: "{{ item.id }}"
"#;
    assert!(invalid(yaml).contains("template"));
}

#[test]
fn test_reject_operators_on_expand_and_json() {
    let yaml = r#"
name: t
endpoint: x
columns:
  - name: id
  - name: owners
    expand: owners
    operators: ["="]
"#;
    assert!(invalid(yaml).contains("expanded column"));

    let yaml = r#"
name: t
endpoint: x
columns:
  - name: id
  - name: tags
    type: json
    operators: ["="]
"#;
    assert!(invalid(yaml).contains("json column"));
}

#[test]
fn test_reject_empty_relation() {
    let yaml = "name: t\nendpoint: x\ncolumns:\n  - name: id\n  - name: owners\n    expand: \" \"\n";
    assert!(invalid(yaml).contains("empty relation"));
}

#[test]
fn test_reject_missing_key() {
    let yaml = "name: t\nendpoint: x\nkey: object_id\ncolumns:\n  - name: id\n";
    assert!(invalid(yaml).contains("key column 'object_id'"));
}

#[test]
fn test_reject_unknown_operator() {
    let yaml = "name: t\nendpoint: x\ncolumns:\n  - name: id\n    operators: [\"~\"]\n";
    assert!(invalid(yaml).contains("Failed to parse table YAML"));
}
