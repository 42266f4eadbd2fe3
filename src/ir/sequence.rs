//! Sequence IR entity (§3.1).

use crate::ir::common::{QualifiedName, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: QualifiedName,
    pub data_type: TypeName,
    pub start: i64,
    pub increment: i64,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    pub cache: i64,
    pub cycle: bool,
    /// `(owning_table, owning_column)` for `OWNED BY` sequences (e.g.
    /// `serial`/`identity` backing sequences).
    pub owned_by: Option<(QualifiedName, String)>,
    pub comment: Option<String>,
}
