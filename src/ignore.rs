//! Ignore-file model (§6.4).
//!
//! Declarative: one ordered list of shell-style glob patterns per object
//! kind. Applied after normalization — matched objects vanish from both
//! IRs before the differ ever sees them. Loading the file from disk is
//! the caller's job (the planner core only consumes the parsed shape);
//! this module still owns matching since that logic is the same whether
//! the patterns came from a file, a CLI flag, or a test fixture.
//!
//! Open Question 3 (§9): when an ignored object is referenced by a
//! non-ignored object, the source appears to let the reference dangle.
//! This crate does not guess — filtering happens before the dependency
//! graph is built, so a reference to a filtered-out object surfaces later
//! as an ordinary [`crate::error::PlanError::DanglingReference`], exactly
//! as spec.md directs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ir::Ir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreSection {
    Tables,
    Views,
    Functions,
    Procedures,
    Types,
    Sequences,
}

/// Parsed ignore-file contents: a glob pattern list per object-kind
/// section. Absence of the file means an empty [`IgnoreFile`] — no
/// filtering (§6.4).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IgnoreFile {
    #[serde(flatten)]
    sections: BTreeMap<IgnoreSection, Vec<String>>,
}

impl IgnoreFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(mut self, section: IgnoreSection, patterns: Vec<String>) -> Self {
        self.sections.insert(section, patterns);
        self
    }

    pub fn parse_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn matches(&self, section: IgnoreSection, qualified_name: &str) -> bool {
        self.sections
            .get(&section)
            .is_some_and(|patterns| patterns.iter().any(|p| glob_match(p, qualified_name)))
    }

    /// Remove every object matching this ignore file's patterns from `ir`,
    /// in place. Called once per IR, after normalization and before the
    /// differ runs.
    pub fn apply(&self, ir: &mut Ir) {
        ir.tables.retain(|key, _| !self.matches(IgnoreSection::Tables, key));
        ir.views.retain(|key, _| !self.matches(IgnoreSection::Views, key));
        ir.materialized_views
            .retain(|key, _| !self.matches(IgnoreSection::Views, key));
        ir.routines.retain(|key, routine| {
            let section = match routine.kind {
                crate::ir::RoutineKind::Function => IgnoreSection::Functions,
                crate::ir::RoutineKind::Procedure => IgnoreSection::Procedures,
            };
            !self.matches(section, key)
        });
        ir.types.retain(|key, _| !self.matches(IgnoreSection::Types, key));
        ir.domains.retain(|key, _| !self.matches(IgnoreSection::Types, key));
        ir.sequences
            .retain(|key, _| !self.matches(IgnoreSection::Sequences, key));
    }
}

/// Shell-style glob match (`*` and `?` wildcards only, no character
/// classes) over a qualified `schema.name` string.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..]))
            }
            (Some(b'?'), Some(_)) => inner(&p[1..], &t[1..]),
            (Some(pc), Some(tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_star_matches_any_suffix() {
        assert!(glob_match("public.tmp_*", "public.tmp_scratch"));
        assert!(!glob_match("public.tmp_*", "public.orders"));
    }

    #[test]
    fn glob_question_matches_single_char() {
        assert!(glob_match("public.v?", "public.v1"));
        assert!(!glob_match("public.v?", "public.v12"));
    }

    #[test]
    fn apply_removes_matching_tables() {
        let mut ir = crate::ir::builder::IrBuilder::new()
            .table("public", "tmp_scratch", |t| {
                t.column("id", "integer", false);
            })
            .build();
        let ignore = IgnoreFile::new()
            .with_patterns(IgnoreSection::Tables, vec!["public.tmp_*".to_string()]);
        ignore.apply(&mut ir);
        assert!(!ir.tables.contains_key("public.tmp_scratch"));
    }

    #[test]
    fn no_patterns_means_no_filtering() {
        let mut ir = crate::ir::builder::IrBuilder::new()
            .table("public", "orders", |t| {
                t.column("id", "integer", false);
            })
            .build();
        IgnoreFile::new().apply(&mut ir);
        assert!(ir.tables.contains_key("public.orders"));
    }
}
