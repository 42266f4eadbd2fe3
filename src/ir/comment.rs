//! Standalone comment records (§3.1).
//!
//! Most objects carry their comment inline (`Table::comment`,
//! `Column::comment`, …). This record exists for completeness of the
//! `COMMENT ON` surface and is used by the differ/emitter for objects whose
//! IR entity does not otherwise carry a comment field (e.g. a schema).

use crate::ir::common::ObjectRef;

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub object: ObjectRef,
    pub text: String,
}
