//! Table, column, constraint, and index IR entities (§3.1).

use crate::ir::common::{QualifiedName, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: QualifiedName,
    /// Ordered, dense, 1-based positions (§3.2 invariant).
    pub columns: Vec<Column>,
    pub constraints: Vec<Constraint>,
    pub indexes: Vec<Index>,
    pub triggers: Vec<crate::ir::trigger::Trigger>,
    pub policies: Vec<crate::ir::policy::Policy>,
    pub row_security_enabled: bool,
    pub row_security_forced: bool,
    pub partition: Option<PartitionSpec>,
    /// Catalog key of the parent, for `PARTITION OF` children.
    pub partition_of: Option<String>,
    pub comment: Option<String>,
    pub grants: Vec<crate::ir::privilege::Privilege>,
}

impl Table {
    pub fn catalog_key(&self) -> String {
        self.name.catalog_key()
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name.as_deref() == Some(name))
    }

    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSpec {
    pub strategy: PartitionStrategy,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStrategy {
    Range,
    List,
    Hash,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub position: usize,
    pub name: String,
    pub type_name: TypeName,
    pub nullable: bool,
    /// `Some` only when this is a plain (non-identity, non-generated) default.
    pub default: Option<String>,
    pub identity: IdentityKind,
    pub generated: GeneratedKind,
    pub comment: Option<String>,
}

impl Column {
    /// §3.2: at most one of default / identity / generated_stored may be set.
    pub fn is_consistent(&self) -> bool {
        let set_count = [
            self.default.is_some(),
            self.identity != IdentityKind::None,
            self.generated != GeneratedKind::None,
        ]
        .into_iter()
        .filter(|b| *b)
        .count();
        set_count <= 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    None,
    Always,
    ByDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedKind {
    None,
    /// `GENERATED ALWAYS AS (<expr>) STORED` — expression is the canonical
    /// normalized text.
    Stored(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: Option<String>,
    pub kind: ConstraintKind,
    pub not_valid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    PrimaryKey {
        columns: Vec<String>,
    },
    Unique {
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        ref_table: QualifiedName,
        ref_columns: Vec<String>,
        on_update: FkAction,
        on_delete: FkAction,
        match_kind: FkMatch,
        deferrable: bool,
        initially_deferred: bool,
    },
    Check {
        expression: String,
    },
    Exclude {
        method: String,
        elements: Vec<ExcludeElement>,
        predicate: Option<String>,
    },
}

impl Constraint {
    pub fn columns(&self) -> &[String] {
        match &self.kind {
            ConstraintKind::PrimaryKey { columns } => columns,
            ConstraintKind::Unique { columns } => columns,
            ConstraintKind::ForeignKey { columns, .. } => columns,
            ConstraintKind::Check { .. } | ConstraintKind::Exclude { .. } => &[],
        }
    }

    pub fn involves_column(&self, col: &str) -> bool {
        match &self.kind {
            ConstraintKind::Check { expression } => expression_mentions_column(expression, col),
            ConstraintKind::Exclude { elements, .. } => {
                elements.iter().any(|e| e.column.as_deref() == Some(col))
            }
            _ => self.columns().iter().any(|c| c == col),
        }
    }
}

/// Splits on non-identifier characters and checks for an exact token match —
/// avoids false positives like `ts` matching inside `timestamp`.
pub fn expression_mentions_column(expression: &str, column: &str) -> bool {
    expression
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|token| token == column)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExcludeElement {
    /// `Some` for a plain column element, `None` for an expression element.
    pub column: Option<String>,
    pub expression: Option<String>,
    pub operator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkMatch {
    Simple,
    Full,
    Partial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    pub name: String,
    pub method: String,
    pub entries: Vec<IndexKey>,
    pub include: Vec<String>,
    pub predicate: Option<String>,
    pub unique: bool,
    /// Desired concurrency — whether the *emitted* `CREATE INDEX` should use
    /// `CONCURRENTLY`. Orthogonal to `PlannerConfig::online`, which governs
    /// whether the planner is *allowed* to choose concurrent rewrites.
    pub concurrent: bool,
}

impl Index {
    pub fn references_column(&self, col: &str) -> bool {
        self.entries.iter().any(|e| match e {
            IndexKey::Column { name, .. } => name == col,
            IndexKey::Expression {
                referenced_columns, ..
            } => referenced_columns.iter().any(|c| c == col),
        }) || self.include.iter().any(|c| c == col)
    }

    pub fn is_partial(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn has_expressions(&self) -> bool {
        self.entries.iter().any(|e| matches!(e, IndexKey::Expression { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexKey {
    Column {
        name: String,
        collation: Option<String>,
        opclass: Option<String>,
        sort: SortDirection,
        nulls: NullsOrder,
    },
    Expression {
        text: String,
        referenced_columns: Vec<String>,
        sort: SortDirection,
        nulls: NullsOrder,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_mentions_column_no_substring_false_positive() {
        assert!(!expression_mentions_column("(id_type = 'foo')", "id"));
        assert!(expression_mentions_column("date_trunc('month', ts)", "ts"));
    }

    #[test]
    fn column_consistency_rejects_default_and_identity_together() {
        let col = Column {
            position: 1,
            name: "id".into(),
            type_name: TypeName::simple("integer"),
            nullable: false,
            default: Some("0".into()),
            identity: IdentityKind::Always,
            generated: GeneratedKind::None,
            comment: None,
        };
        assert!(!col.is_consistent());
    }
}
