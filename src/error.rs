//! Planner error kinds.
//!
//! Every error here is fatal to a single `plan()` invocation — none are
//! retried, and no "best-effort partial script" is ever produced. Each
//! variant carries a structured payload identifying the object(s) involved,
//! following the teacher's `ConfigError` / `LoadError` shape (one enum per
//! fallible boundary, `thiserror`-derived, `#[source]` chained where there is
//! an underlying cause).

use crate::ir::ObjectRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    /// Source DDL text is not valid SQL. Surfaced by the (external) parser
    /// collaborator; the planner only wraps it when an IR provider hands
    /// back a parse failure instead of a finished IR.
    #[error("parse error in {object}: {message}")]
    ParseError { object: String, message: String },

    /// An object references another object that does not resolve within the
    /// IR and is not declared external.
    #[error("{object} references undefined object '{unresolved_name}'")]
    ReferenceResolution {
        object: ObjectRef,
        unresolved_name: String,
    },

    /// A dependency edge was required but neither endpoint exists in either
    /// IR (e.g. an ignore pattern silently dropped the referenced object).
    #[error("dangling reference: {from} depends on {to}, which exists in neither schema")]
    DanglingReference { from: ObjectRef, to: ObjectRef },

    /// The dependency graph contains a cycle that none of the §4.4
    /// cycle-breaking rules can resolve.
    #[error("unresolvable dependency cycle among: {}", objects_to_string(.0))]
    UnresolvableCycle(Vec<ObjectRef>),

    /// The requested transition has no safe DDL representation — e.g. a
    /// column type change with no implicit cast and no caller-supplied
    /// `USING` clause.
    #[error("unsupported change on {object}: {reason}")]
    UnsupportedChange { object: ObjectRef, reason: String },

    /// `online = true` was requested together with `transactional = true`.
    /// Concurrent operations cannot run inside a transaction, so this
    /// combination is rejected outright rather than silently downgraded.
    #[error("online mode requires transactional = false, but both were requested")]
    PolicyConflict,
}

fn objects_to_string(objects: &[ObjectRef]) -> String {
    objects
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type PlanResult<T> = Result<T, PlanError>;
