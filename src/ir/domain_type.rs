//! Domain and composite/enum type IR entities (§3.1).

use crate::ir::common::{QualifiedName, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub name: QualifiedName,
    pub base_type: TypeName,
    pub default: Option<String>,
    pub not_null: bool,
    pub checks: Vec<NamedCheck>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedCheck {
    pub name: Option<String>,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserType {
    pub name: QualifiedName,
    pub kind: TypeKind,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Enum { labels: Vec<String> },
    Composite { columns: Vec<(String, TypeName)> },
}
