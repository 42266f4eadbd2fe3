//! Function and procedure IR entities (§3.1).
//!
//! Identity is `(schema, name, ordered IN+INOUT argument types)` — two
//! routines with the same name but different argument lists are distinct
//! entities (overloads), never compared against each other by the differ.

use crate::ir::common::{QualifiedName, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub kind: RoutineKind,
    pub name: QualifiedName,
    pub args: Vec<Argument>,
    /// `None` for procedures.
    pub returns: Option<ReturnType>,
    pub language: String,
    pub volatility: Volatility,
    pub strict: bool,
    pub security: Security,
    pub parallel: Parallelism,
    pub leakproof: bool,
    /// Body text, trimmed only at outer edges (§3.3) — internal whitespace
    /// preserved byte-for-byte.
    pub body: String,
    pub set_clauses: Vec<(String, String)>,
    pub comment: Option<String>,
}

impl Routine {
    /// The identity key the differ and dependency graph key off: includes
    /// the IN+INOUT argument types so overloads never collide.
    pub fn signature_key(&self) -> String {
        let arg_types: Vec<String> = self
            .args
            .iter()
            .filter(|a| matches!(a.mode, ArgMode::In | ArgMode::InOut | ArgMode::Variadic))
            .map(|a| a.type_name.to_string())
            .collect();
        format!("{}({})", self.name.catalog_key(), arg_types.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Function,
    Procedure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub mode: ArgMode,
    pub name: Option<String>,
    pub type_name: TypeName,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgMode {
    In,
    Out,
    InOut,
    Variadic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnType {
    Scalar(TypeName),
    SetOf(TypeName),
    Table(Vec<(String, TypeName)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatility {
    Volatile,
    Stable,
    Immutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Invoker,
    Definer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    Unsafe,
    Restricted,
    Safe,
}

/// Every name mentioned in a routine body, found by a best-effort textual
/// scan (§4.4 dependency source 7 — "soft" edges: a missing edge weakens
/// ordering but never fails the plan).
pub fn scan_body_references(body: &str, candidates: &[QualifiedName]) -> Vec<QualifiedName> {
    candidates
        .iter()
        .filter(|c| crate::ir::table::expression_mentions_column(body, &c.name))
        .cloned()
        .collect()
}
