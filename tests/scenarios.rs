//! End-to-end scenarios from the planner's concrete-scenario catalog (§8.2).
//! Each test builds two `Ir` snapshots with [`IrBuilder`] and asserts on the
//! rendered script or change-set `plan()` produces.

use pgschema_plan::ir::builder::IrBuilder;
use pgschema_plan::ir::{
    DefaultPrivilege, DefaultPrivilegeObjectType, ObjectKind, ObjectRef, Policy, PolicyCommand,
    Privilege, PrivilegeKind,
};
use pgschema_plan::{plan_silent, IgnoreFile, PlannerConfig};

fn plan_default(old: pgschema_plan::Ir, new: pgschema_plan::Ir) -> pgschema_plan::PlanOutput {
    plan_silent(old, new, &PlannerConfig::default(), &IgnoreFile::new()).expect("plan should succeed")
}

/// S1 — Add UNIQUE and CHECK to an existing table.
#[test]
fn add_unique_and_check_constraints() {
    let old = IrBuilder::new()
        .table("public", "changesets", |t| {
            t.column("id", "integer", false)
                .column("repo_id", "integer", false)
                .column("external_id", "text", false)
                .column("external_service_type", "text", false);
        })
        .build();

    let new = IrBuilder::new()
        .table("public", "changesets", |t| {
            t.column("id", "integer", false)
                .column("repo_id", "integer", false)
                .column("external_id", "text", false)
                .column("external_service_type", "text", false)
                .unique("changesets_repo_id_external_id_key", &["repo_id", "external_id"])
                .check(
                    "changesets_external_service_type_check",
                    "external_service_type = ANY (ARRAY['github', 'gitlab', 'bitbucket'])",
                );
        })
        .build();

    let output = plan_default(old, new);
    assert_eq!(output.script.matches("ALTER TABLE changesets ADD CONSTRAINT").count(), 2);
    let unique_pos = output.script.find("changesets_repo_id_external_id_key").unwrap();
    let check_pos = output.script.find("changesets_external_service_type_check").unwrap();
    assert!(unique_pos < check_pos, "constraints should be emitted in stable name order");
}

/// S1 continued — under online mode, each CHECK becomes NOT VALID + VALIDATE.
#[test]
fn online_mode_splits_check_constraint_into_not_valid_then_validate() {
    let old = IrBuilder::new()
        .table("public", "changesets", |t| {
            t.column("id", "integer", false)
                .column("external_service_type", "text", false);
        })
        .build();
    let new = IrBuilder::new()
        .table("public", "changesets", |t| {
            t.column("id", "integer", false)
                .column("external_service_type", "text", false)
                .check("changesets_type_check", "external_service_type = 'github'");
        })
        .build();

    let config = PlannerConfig {
        online: true,
        transactional: false,
        ..PlannerConfig::default()
    };
    let output = plan_silent(old, new, &config, &IgnoreFile::new()).unwrap();
    assert!(output.script.contains("ADD CONSTRAINT changesets_type_check CHECK (external_service_type = 'github') NOT VALID"));
    assert!(output.script.contains("VALIDATE CONSTRAINT changesets_type_check"));
}

/// S2 — Concurrent index creation is marked non-transactional and carries a
/// wait sentinel.
#[test]
fn concurrent_index_creation_is_marked_non_transactional() {
    let old = IrBuilder::new()
        .table("public", "users", |t| {
            t.column("id", "integer", false)
                .column("email", "text", false)
                .column("status", "text", false);
        })
        .build();

    let mut new = IrBuilder::new()
        .table("public", "users", |t| {
            t.column("id", "integer", false)
                .column("email", "text", false)
                .column("status", "text", false);
        })
        .build();
    new.tables.get_mut("public.users").unwrap().indexes.push(pgschema_plan::ir::Index {
        name: "idx_users_email_status".to_string(),
        method: "btree".to_string(),
        entries: vec![
            pgschema_plan::ir::IndexKey::Column {
                name: "email".to_string(),
                collation: None,
                opclass: None,
                sort: pgschema_plan::ir::SortDirection::Asc,
                nulls: pgschema_plan::ir::NullsOrder::Last,
            },
            pgschema_plan::ir::IndexKey::Column {
                name: "status".to_string(),
                collation: None,
                opclass: None,
                sort: pgschema_plan::ir::SortDirection::Asc,
                nulls: pgschema_plan::ir::NullsOrder::Last,
            },
        ],
        include: vec![],
        predicate: Some("status = 'active'".to_string()),
        unique: false,
        concurrent: true,
    });

    let output = plan_default(old, new);
    assert!(output.script.contains("CREATE INDEX CONCURRENTLY idx_users_email_status"));
    assert!(output.script.contains("pgschema:wait"));
    assert!(output.script.to_lowercase().contains("non-transactional"));
}

/// S3 — A base-table column addition forces a dependent view to be dropped
/// and recreated with its `*` expanded to include the new column.
#[test]
fn view_column_addition_forces_downstream_recreate() {
    let old = IrBuilder::new()
        .table("public", "item", |t| {
            t.column("id", "integer", false)
                .column("title", "text", false)
                .column("status", "text", false);
        })
        .table("public", "category", |t| {
            t.column("id", "integer", false).column("name", "text", false);
        })
        .view(
            "public",
            "item_extended",
            "SELECT i.*, c.name AS category_name FROM item i JOIN category c ON c.id = i.id",
            &["id", "title", "status", "category_name"],
        )
        .build();

    let new = IrBuilder::new()
        .table("public", "item", |t| {
            t.column("id", "integer", false)
                .column("title", "text", false)
                .column("status", "text", false)
                .column("new_col", "text", true);
        })
        .table("public", "category", |t| {
            t.column("id", "integer", false).column("name", "text", false);
        })
        .view(
            "public",
            "item_extended",
            "SELECT i.*, c.name AS category_name FROM item i JOIN category c ON c.id = i.id",
            &[],
        )
        .build();

    let output = plan_default(old, new);
    assert!(output.script.contains("ADD COLUMN new_col"));
    assert!(output.script.contains("DROP VIEW item_extended"));
    assert!(output.script.contains("CREATE VIEW item_extended"));
    assert!(output.script.contains("i.id, i.title, i.status, i.new_col"));
    let add_col_pos = output.script.find("ADD COLUMN new_col").unwrap();
    let drop_pos = output.script.find("DROP VIEW item_extended").unwrap();
    let create_pos = output.script.find("CREATE VIEW item_extended").unwrap();
    assert!(drop_pos > add_col_pos, "the view rewrite must come after the column add");
    assert!(drop_pos < create_pos, "the stale view must be dropped before its replacement is created");
}

/// S4 — A function body reference to another function forces the
/// referenced function to be created first, regardless of name order.
#[test]
fn function_body_reference_forces_dependency_order() {
    let old = pgschema_plan::Ir::new();
    let new = IrBuilder::new()
        .function("public", "z_helper", |f| {
            f.arg("input", "text").returns("text").body("SELECT upper(input)");
        })
        .function("public", "a_wrapper", |f| {
            f.arg("input", "text").returns("text").body("SELECT z_helper(input)");
        })
        .build();

    let output = plan_default(old, new);
    let helper_pos = output.script.find("FUNCTION z_helper").unwrap();
    let wrapper_pos = output.script.find("FUNCTION a_wrapper").unwrap();
    assert!(helper_pos < wrapper_pos, "z_helper must be created before a_wrapper despite alphabetical order");
}

/// S5 — Changing a policy's command recreates it (policies have no ALTER
/// equivalent for command changes).
#[test]
fn policy_command_change_drops_and_recreates() {
    let policy_table = "public.users";
    let old_policy = Policy {
        name: "user_tenant_isolation".to_string(),
        table: pgschema_plan::ir::QualifiedName::qualified("public", "users"),
        command: PolicyCommand::All,
        roles: vec!["PUBLIC".to_string()],
        using: Some("tenant_id = 1".to_string()),
        with_check: None,
        permissive: true,
    };
    let new_policy = Policy {
        command: PolicyCommand::Select,
        ..old_policy.clone()
    };

    let old = IrBuilder::new()
        .table("public", "users", |t| {
            t.column("id", "integer", false).column("tenant_id", "integer", false);
        })
        .build();
    let mut old = old;
    old.tables.get_mut(policy_table).unwrap().policies.push(old_policy);

    let new = IrBuilder::new()
        .table("public", "users", |t| {
            t.column("id", "integer", false).column("tenant_id", "integer", false);
        })
        .build();
    let mut new = new;
    new.tables.get_mut(policy_table).unwrap().policies.push(new_policy);

    let output = plan_default(old, new);
    assert!(output.script.contains("DROP POLICY user_tenant_isolation ON users"));
    assert!(output.script.contains("CREATE POLICY user_tenant_isolation ON users FOR SELECT"));
    let drop_pos = output.script.find("DROP POLICY user_tenant_isolation ON users").unwrap();
    let create_pos = output.script.find("CREATE POLICY user_tenant_isolation ON users FOR SELECT").unwrap();
    assert!(drop_pos < create_pos, "the old policy must be dropped before its replacement is created");
}

/// S6 — An explicit grant that merely restates a default-privilege
/// declaration produces no diff when the explicit grant is dropped.
#[test]
fn default_privilege_covers_explicit_grant_idempotently() {
    let default_priv = DefaultPrivilege {
        grantor: "owner_role".to_string(),
        schema: "public".to_string(),
        object_type: DefaultPrivilegeObjectType::Tables,
        grantee: "app_role".to_string(),
        privileges: vec![
            PrivilegeKind::Select,
            PrivilegeKind::Insert,
            PrivilegeKind::Update,
            PrivilegeKind::Delete,
        ],
        with_grant_option: false,
    };

    let mut old = IrBuilder::new()
        .table("public", "users", |t| {
            t.column("id", "integer", false);
        })
        .build();
    old.default_privileges.push(default_priv.clone());
    old.privileges.push(Privilege {
        grantee: "app_role".to_string(),
        object: ObjectRef::new(ObjectKind::Table, "public", "users"),
        privilege: PrivilegeKind::Select,
        with_grant_option: false,
        columns: None,
    });

    let mut new = IrBuilder::new()
        .table("public", "users", |t| {
            t.column("id", "integer", false);
        })
        .build();
    new.default_privileges.push(default_priv);

    let output = plan_default(old, new);
    assert!(output.changes.is_empty(), "explicit grant covered by default privilege must not produce a REVOKE");
}
