//! Row-level security policy IR entity (§3.1).

use crate::ir::common::QualifiedName;

#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub name: String,
    pub table: QualifiedName,
    pub command: PolicyCommand,
    pub roles: Vec<String>,
    pub using: Option<String>,
    pub with_check: Option<String>,
    pub permissive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCommand {
    All,
    Select,
    Insert,
    Update,
    Delete,
}
