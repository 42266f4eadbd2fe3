//! `ChangeRecord`: the unit the Differ produces, the dependency graph
//! orders, and the Emitter renders into DDL (§4.2).
//!
//! Records carry only *structural* data — never rendered SQL text. Turning
//! a record into DDL (including the online-mode rewrites in §4.3) is the
//! Emitter's job; it looks up full entity definitions from the `new` (or,
//! for drops, `old`) [`crate::ir::Ir`] by the record's [`ObjectRef`], and
//! uses the nested payloads here (a trigger, a policy, a constraint, …) for
//! entities that are not themselves top-level IR map entries.

use crate::ir::{Constraint, Index, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    Create,
    Drop,
    Alter,
}

use crate::ir::ObjectRef;

/// One planned change to a single object. `sub_ops` is empty for `Create`
/// and `Drop` — it only carries content for `Alter`, where it enumerates
/// the individual operations that together transform the old definition
/// into the new one (e.g. `AddColumn` + `SetNotNull` for one ALTER TABLE).
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub object: ObjectRef,
    pub kind: ChangeKind,
    pub sub_ops: Vec<SubOp>,
}

impl ChangeRecord {
    pub fn create(object: ObjectRef) -> Self {
        Self {
            object,
            kind: ChangeKind::Create,
            sub_ops: vec![],
        }
    }

    pub fn drop(object: ObjectRef) -> Self {
        Self {
            object,
            kind: ChangeKind::Drop,
            sub_ops: vec![],
        }
    }

    pub fn alter(object: ObjectRef, sub_ops: Vec<SubOp>) -> Self {
        Self {
            object,
            kind: ChangeKind::Alter,
            sub_ops,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.kind, ChangeKind::Alter) && self.sub_ops.is_empty()
    }

    /// The `(kind_rank, schema, name, subop_rank)` ordering key (§4.4). Drop
    /// records sort with an inverted kind rank so that, within one
    /// topological layer, dependents drop before the things they depend on.
    pub fn sort_key(&self) -> (u16, String, String, u8) {
        let kind_rank = self.object.kind.rank() as u16;
        let kind_rank = match self.kind {
            ChangeKind::Drop => u16::MAX - kind_rank,
            _ => kind_rank,
        };
        let subop_rank = self.sub_ops.first().map(SubOp::rank).unwrap_or(0);
        (
            kind_rank,
            self.object.schema.clone(),
            self.object.name.clone(),
            subop_rank,
        )
    }
}

/// Per-kind alter sub-operations (§4.2). For a `Table`-kind record these are
/// column-level rewrites. For `Constraint`/`Index`-kind records these only
/// ever appear after the Emitter rewrites a plain Create (e.g. splitting it
/// into `AddConstraint{not_valid: true}` + `ValidateConstraint` under online
/// mode, §4.3) — the Differ itself never emits a constraint or index Alter;
/// both kinds are always drop-then-create at the Differ stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SubOp {
    AddColumn {
        name: String,
        type_name: TypeName,
        nullable: bool,
        default: Option<String>,
    },
    DropColumn {
        name: String,
    },
    SetType {
        column: String,
        new_type: TypeName,
        using: Option<String>,
    },
    SetNotNull {
        column: String,
    },
    DropNotNull {
        column: String,
    },
    SetDefault {
        column: String,
        default: String,
    },
    DropDefault {
        column: String,
    },
    SetIdentity {
        column: String,
        kind: crate::ir::IdentityKind,
    },
    DropIdentity {
        column: String,
    },
    SetGenerated {
        column: String,
        expression: String,
    },
    DropGenerated {
        column: String,
    },
    AttachPartition {
        child: String,
    },
    EnableRowSecurity,
    DisableRowSecurity,
    ForceRowSecurity,
    NoForceRowSecurity,
    SetComment {
        /// `None` targets the object itself (the table, sequence, domain,
        /// …); `Some(name)` targets one of its columns. Only ever `Some` on
        /// a `Table`-kind record.
        column: Option<String>,
        text: Option<String>,
    },

    // Domain sub-ops (ALTER DOMAIN ... ADD/DROP CONSTRAINT mirrors table
    // constraints, but a domain's named checks are inline fields rather
    // than their own top-level IR entity, so they get their own sub-ops
    // instead of separate Constraint-kind change records).
    AddCheck {
        name: Option<String>,
        expression: String,
    },
    DropCheck {
        name: String,
    },

    // Enum type sub-op: a label can only ever be added in place (removal
    // or reordering has no in-place representation and is a drop+create
    // at the Differ stage instead).
    AddEnumValue {
        value: String,
        after: Option<String>,
    },

    // Sequence sub-ops — every mutable attribute collapses to one sub-op
    // since they are all set together in a single `ALTER SEQUENCE`.
    AlterSequenceOptions {
        increment: Option<i64>,
        min_value: Option<Option<i64>>,
        max_value: Option<Option<i64>>,
        cache: Option<i64>,
        cycle: Option<bool>,
    },
    SetSequenceOwner {
        owner: Option<(crate::ir::QualifiedName, String)>,
    },

    // Constraint/index rewrites, synthesized by the Emitter from a plain
    // Create record (§4.3) — never produced directly by the Differ.
    AddConstraint {
        constraint: Constraint,
    },
    ValidateConstraint {
        name: String,
    },
    CreateIndexConcurrently {
        index: Index,
    },
    ReplaceIndex {
        old_name: String,
        new_index: Index,
    },
}

impl SubOp {
    /// Sub-op ordering within one `Alter` record's rendering position —
    /// mirrors the §4.4 stable-key table's last component.
    pub fn rank(&self) -> u8 {
        match self {
            SubOp::DropNotNull { .. } => 0,
            SubOp::SetType { .. } => 1,
            SubOp::DropColumn { .. } => 2,
            SubOp::AddColumn { .. } => 3,
            SubOp::DropDefault { .. } => 4,
            SubOp::SetDefault { .. } => 5,
            SubOp::SetNotNull { .. } => 6,
            SubOp::DropIdentity { .. } => 7,
            SubOp::SetIdentity { .. } => 8,
            SubOp::DropGenerated { .. } => 9,
            SubOp::SetGenerated { .. } => 10,
            SubOp::AddConstraint { .. } => 11,
            SubOp::ValidateConstraint { .. } => 12,
            SubOp::CreateIndexConcurrently { .. } => 13,
            SubOp::ReplaceIndex { .. } => 14,
            SubOp::AttachPartition { .. } => 15,
            SubOp::EnableRowSecurity => 16,
            SubOp::DisableRowSecurity => 17,
            SubOp::ForceRowSecurity => 18,
            SubOp::NoForceRowSecurity => 19,
            SubOp::DropCheck { .. } => 20,
            SubOp::AddCheck { .. } => 21,
            SubOp::AddEnumValue { .. } => 22,
            SubOp::AlterSequenceOptions { .. } => 23,
            SubOp::SetSequenceOwner { .. } => 24,
            SubOp::SetComment { .. } => 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ObjectKind;

    #[test]
    fn drop_records_sort_after_create_records_of_a_dependent_kind() {
        let drop_table = ChangeRecord::drop(ObjectRef::new(ObjectKind::Table, "public", "orders"));
        let create_index =
            ChangeRecord::create(ObjectRef::new(ObjectKind::Index, "public", "idx_status"));
        // Table drops (inverted rank) sort after index creates within the
        // same batch, since index creation rank < table rank but table's
        // drop rank is inverted above everything.
        assert!(drop_table.sort_key() > create_index.sort_key());
    }

    #[test]
    fn empty_alter_is_noop() {
        let record = ChangeRecord::alter(ObjectRef::new(ObjectKind::Table, "public", "orders"), vec![]);
        assert!(record.is_noop());
    }
}
