//! Built-in table definitions embedded in the binary
//!
//! Every supported table's YAML is compiled in, so `entra_user` works
//! without a file path.

use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Built-in table YAML definitions
pub static BUILTIN_TABLES: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = BTreeMap::new();

    // Directory objects
    m.insert("entra_user", include_str!("../tables/user.yaml"));
    m.insert("entra_group", include_str!("../tables/group.yaml"));
    m.insert("entra_application", include_str!("../tables/application.yaml"));
    m.insert(
        "entra_service_principal",
        include_str!("../tables/service_principal.yaml"),
    );
    m.insert("entra_device", include_str!("../tables/device.yaml"));
    m.insert("entra_domain", include_str!("../tables/domain.yaml"));

    // Roles
    m.insert(
        "entra_directory_role",
        include_str!("../tables/directory_role.yaml"),
    );
    m.insert(
        "entra_directory_role_assignment",
        include_str!("../tables/directory_role_assignment.yaml"),
    );

    // Identity and policy
    m.insert(
        "entra_conditional_access_policy",
        include_str!("../tables/conditional_access_policy.yaml"),
    );
    m.insert(
        "entra_identity_provider",
        include_str!("../tables/identity_provider.yaml"),
    );
    m.insert(
        "entra_authorization_policy",
        include_str!("../tables/authorization_policy.yaml"),
    );
    m.insert(
        "entra_admin_consent_request_policy",
        include_str!("../tables/admin_consent_request_policy.yaml"),
    );

    // Reports
    m.insert(
        "entra_sign_in_report",
        include_str!("../tables/sign_in_report.yaml"),
    );
    m.insert(
        "entra_directory_audit_report",
        include_str!("../tables/directory_audit_report.yaml"),
    );

    m
});

/// Get a built-in table by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_TABLES.get(name).copied()
}

/// Check if a name is a built-in table
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_TABLES.contains_key(name)
}

/// List all built-in table names, sorted
pub fn list_builtin() -> Vec<&'static str> {
    BUILTIN_TABLES.keys().copied().collect()
}
