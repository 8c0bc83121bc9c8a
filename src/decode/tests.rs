//! Tests for row decoding

use super::*;
use crate::table::{load_table, load_table_from_str};
use crate::types::ColumnType;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Path Tests
// ============================================================================

#[test]
fn test_simple_paths() {
    let item = json!({
        "status": {"errorCode": 50126, "failureReason": "Invalid password"},
        "addresses": [{"city": "Oslo"}, {"city": "Bergen"}],
        "matrix": [[1, 2], [3, 4]]
    });

    assert_eq!(extract_path(&item, "status.errorCode").unwrap(), Some(json!(50126)));
    assert_eq!(extract_path(&item, "$.status.failureReason").unwrap(), Some(json!("Invalid password")));
    assert_eq!(extract_path(&item, "addresses[0].city").unwrap(), Some(json!("Oslo")));
    assert_eq!(extract_path(&item, "addresses[-1].city").unwrap(), Some(json!("Bergen")));
    assert_eq!(extract_path(&item, "matrix[1][0]").unwrap(), Some(json!(3)));
    assert_eq!(extract_path(&item, "addresses[5].city").unwrap(), None);
    assert_eq!(extract_path(&item, "addresses[-5]").unwrap(), None);
    assert_eq!(extract_path(&item, "status.missing").unwrap(), None);
    assert_eq!(extract_path(&item, "status[0]").unwrap(), None);
}

#[test]
fn test_jsonpath_wildcard() {
    let item = json!({"members": [{"id": "a"}, {"id": "b"}]});
    assert_eq!(
        extract_path(&item, "$.members[*].id").unwrap(),
        Some(json!(["a", "b"]))
    );

    let empty = json!({"members": []});
    assert_eq!(extract_path(&empty, "$.members[*].id").unwrap(), Some(json!([])));

    let absent = json!({"id": "x"});
    assert_eq!(extract_path(&absent, "$.members[*].id").unwrap(), None);
}

#[test]
fn test_jsonpath_detection() {
    assert!(is_jsonpath("$.members[*].id"));
    assert!(is_jsonpath("$..id"));
    assert!(!is_jsonpath("$.status.errorCode"));
    assert!(!is_jsonpath("members[0].id"));
    assert!(validate_jsonpath("status.errorCode").is_ok());
    assert!(validate_jsonpath("$.members[*].id").is_ok());
    assert!(validate_jsonpath("$.members[?(@.id == ").is_err());
}

// ============================================================================
// Coercion Tests
// ============================================================================

#[test]
fn test_coerce_scalars() {
    assert_eq!(coerce(json!(42), ColumnType::String).unwrap(), json!("42"));
    assert_eq!(coerce(json!(["a"]), ColumnType::String).unwrap(), json!("[\"a\"]"));
    assert_eq!(coerce(json!("TRUE"), ColumnType::Bool).unwrap(), json!(true));
    assert_eq!(coerce(json!("12"), ColumnType::Int).unwrap(), json!(12));
    assert_eq!(coerce(json!(3.0), ColumnType::Int).unwrap(), json!(3));
    assert_eq!(coerce(json!("1.5"), ColumnType::Double).unwrap(), json!(1.5));
    assert_eq!(coerce(json!({"a": 1}), ColumnType::Json).unwrap(), json!({"a": 1}));
}

#[test]
fn test_coerce_timestamps() {
    assert_eq!(
        coerce(json!("2024-01-01T10:00:00+02:00"), ColumnType::Timestamp).unwrap(),
        json!("2024-01-01T08:00:00Z")
    );
    assert_eq!(
        coerce(json!("2024-05-06T07:08:09.123Z"), ColumnType::Timestamp).unwrap(),
        json!("2024-05-06T07:08:09.123Z")
    );
    assert_eq!(
        coerce(json!(0), ColumnType::Timestamp).unwrap(),
        json!("1970-01-01T00:00:00Z")
    );
    assert!(parse_timestamp("2024-01-01T00:00:00").is_some());
}

#[test]
fn test_coerce_mismatches() {
    assert!(coerce(json!("maybe"), ColumnType::Bool).is_err());
    assert!(coerce(json!("1.5"), ColumnType::Int).is_err());
    assert!(coerce(json!({}), ColumnType::Double).is_err());
    assert!(coerce(json!("last tuesday"), ColumnType::Timestamp).is_err());
}

// ============================================================================
// Flattener Tests
// ============================================================================

fn user_item() -> serde_json::Value {
    json!({
        "id": "11111111-2222-3333-4444-555555555555",
        "displayName": "Alice Smith",
        "userPrincipalName": "alice@contoso.com",
        "accountEnabled": true,
        "createdDateTime": "2023-06-01T12:00:00Z",
        "businessPhones": ["+1 555 0100"],
        "memberOf": [{"@odata.type": "#microsoft.graph.group", "id": "g1", "displayName": "Admins"}]
    })
}

#[test]
fn test_flatten_user() {
    let table = load_table("entra_user").unwrap();
    let context = FlattenContext::new()
        .with_tenant(Some("contoso-tenant".to_string()))
        .with_filter(Some("accountEnabled eq true".to_string()));
    let flattener = RowFlattener::new(&table, context);

    let row = flattener.flatten(&user_item()).unwrap();

    assert_eq!(row["id"], json!("11111111-2222-3333-4444-555555555555"));
    assert_eq!(row["display_name"], json!("Alice Smith"));
    assert_eq!(row["account_enabled"], json!(true));
    assert_eq!(row["created_date_time"], json!("2023-06-01T12:00:00Z"));
    assert_eq!(row["business_phones"], json!(["+1 555 0100"]));
    assert_eq!(row["member_of"][0]["displayName"], json!("Admins"));
    assert_eq!(row["mail"], serde_json::Value::Null);
    assert_eq!(row["title"], json!("Alice Smith"));
    assert_eq!(row["tenant_id"], json!("contoso-tenant"));
    assert_eq!(row["filter"], json!("accountEnabled eq true"));
    assert_eq!(row.len(), table.columns.len());
}

#[test]
fn test_flatten_keeps_column_order() {
    let table = load_table("entra_user").unwrap();
    let flattener =
        RowFlattener::with_columns(&table, &["title", "id"], FlattenContext::new()).unwrap();

    let row = flattener.flatten(&user_item()).unwrap();
    let keys: Vec<&str> = row.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["title", "id"]);
    assert_eq!(flattener.column_names(), vec!["title", "id"]);
}

#[test]
fn test_flatten_unknown_column() {
    let table = load_table("entra_user").unwrap();
    assert!(RowFlattener::with_columns(&table, &["nope"], FlattenContext::new()).is_err());
}

#[test]
fn test_flatten_nested_path_and_annotation() {
    let table = load_table("entra_sign_in_report").unwrap();
    let flattener =
        RowFlattener::with_columns(&table, &["error_code", "title"], FlattenContext::new()).unwrap();

    let row = flattener
        .flatten(&json!({
            "id": "s1",
            "userPrincipalName": "bob@contoso.com",
            "createdDateTime": "2024-02-02T02:02:02Z",
            "status": {"errorCode": 0}
        }))
        .unwrap();
    assert_eq!(row["error_code"], json!(0));
    assert_eq!(row["title"], json!("bob@contoso.com 2024-02-02T02:02:02Z"));

    let providers = load_table("entra_identity_provider").unwrap();
    let row = RowFlattener::with_columns(&providers, &["provider_type"], FlattenContext::new())
        .unwrap()
        .flatten(&json!({"@odata.type": "#microsoft.graph.socialIdentityProvider"}))
        .unwrap();
    assert_eq!(row["provider_type"], json!("#microsoft.graph.socialIdentityProvider"));
}

#[test]
fn test_flatten_expand_with_jsonpath() {
    let table = load_table("entra_group").unwrap();
    let flattener =
        RowFlattener::with_columns(&table, &["member_ids"], FlattenContext::new()).unwrap();

    let row = flattener
        .flatten(&json!({"id": "g", "members": [{"id": "u1"}, {"id": "u2"}]}))
        .unwrap();
    assert_eq!(row["member_ids"], json!(["u1", "u2"]));

    let row = flattener.flatten(&json!({"id": "g"})).unwrap();
    assert_eq!(row["member_ids"], serde_json::Value::Null);
}

#[test]
fn test_title_fallbacks() {
    let table = load_table_from_str(
        r#"
name: t
endpoint: things
columns:
  - name: id
  - name: title
    synthetic: title
    template: "{{ item.name }} ({{ item.kind }})"
"#,
    )
    .unwrap();
    let flattener = RowFlattener::new(&table, FlattenContext::new());

    let row = flattener.flatten(&json!({"id": "1", "name": "n", "kind": "k"})).unwrap();
    assert_eq!(row["title"], json!("n (k)"));

    let row = flattener.flatten(&json!({"id": "1", "displayName": "shown"})).unwrap();
    assert_eq!(row["title"], json!("shown"));

    let row = flattener.flatten(&json!({"id": "1"})).unwrap();
    assert_eq!(row["title"], json!("1"));

    let row = flattener.flatten(&json!({})).unwrap();
    assert_eq!(row["title"], serde_json::Value::Null);
}

#[test]
fn test_flatten_type_error_names_column() {
    let table = load_table("entra_user").unwrap();
    let flattener =
        RowFlattener::with_columns(&table, &["account_enabled"], FlattenContext::new()).unwrap();

    let err = flattener
        .flatten(&json!({"accountEnabled": "sometimes"}))
        .unwrap_err();
    assert!(err.to_string().contains("account_enabled"));
}

#[test]
fn test_invalid_jsonpath_rejected_by_table_validation() {
    let yaml = r#"
name: t
endpoint: things
columns:
  - name: id
  - name: broken
    type: json
    path: "$.members[*"
"#;
    assert!(load_table_from_str(yaml).is_err());
}
