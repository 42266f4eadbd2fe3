//! Explicit tracer handle (§9 Design Notes: "Global logger / debug flag...
//! recast as an explicit tracer handle threaded through the pipeline").
//!
//! The teacher has no tracing crate — replay warnings go to `eprintln!`
//! directly. This crate keeps that "no hidden global logger" discipline
//! but gives callers a seam: `plan()` takes an optional `&dyn PlanTracer`
//! (default [`SilentTracer`], a no-op) instead of printing anything
//! itself. A caller that wants visibility into normalization folds,
//! cycle-breaking decisions, and fan-out recreates supplies its own
//! tracer; library code never calls `println!`.

use crate::ir::ObjectRef;

/// One observable decision point in a single `plan()` run.
#[derive(Debug, Clone)]
pub enum TraceEvent<'a> {
    /// An expression or type name was folded to a different canonical
    /// spelling during normalization.
    NormalizedFold {
        object: &'a ObjectRef,
        before: &'a str,
        after: &'a str,
    },
    /// A change record was produced by the differ.
    ChangeDetected { object: &'a ObjectRef, summary: &'a str },
    /// The dependency graph broke a cycle using one of the §4.4 rules.
    CycleBroken { objects: &'a [ObjectRef], strategy: &'a str },
    /// A fan-out recreate (drop dependents / alter base / recreate
    /// dependents) was inserted ahead of an alter.
    FanOutRecreate { base: &'a ObjectRef, dependent: &'a ObjectRef },
}

/// Receives [`TraceEvent`]s as the pipeline runs. Implementations must not
/// panic — a tracer is diagnostic, never load-bearing.
pub trait PlanTracer {
    fn trace(&self, event: TraceEvent<'_>);
}

/// The default tracer: discards every event.
pub struct SilentTracer;

impl PlanTracer for SilentTracer {
    fn trace(&self, _event: TraceEvent<'_>) {}
}

/// A tracer that accumulates events in-process, useful for tests and for
/// callers that want to render a trace after the fact rather than stream
/// it live.
#[derive(Default)]
pub struct RecordingTracer {
    events: std::sync::Mutex<Vec<String>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("tracer mutex poisoned").clone()
    }
}

impl PlanTracer for RecordingTracer {
    fn trace(&self, event: TraceEvent<'_>) {
        let rendered = match event {
            TraceEvent::NormalizedFold { object, before, after } => {
                format!("normalized {object}: {before:?} -> {after:?}")
            }
            TraceEvent::ChangeDetected { object, summary } => {
                format!("change on {object}: {summary}")
            }
            TraceEvent::CycleBroken { objects, strategy } => {
                let names: Vec<String> = objects.iter().map(|o| o.to_string()).collect();
                format!("cycle broken ({strategy}): {}", names.join(" -> "))
            }
            TraceEvent::FanOutRecreate { base, dependent } => {
                format!("fan-out recreate of {dependent} for base change {base}")
            }
        };
        self.events.lock().expect("tracer mutex poisoned").push(rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ObjectKind;

    #[test]
    fn recording_tracer_accumulates_events() {
        let tracer = RecordingTracer::new();
        let obj = ObjectRef::new(ObjectKind::Table, "public", "orders");
        tracer.trace(TraceEvent::ChangeDetected {
            object: &obj,
            summary: "add column",
        });
        assert_eq!(tracer.events().len(), 1);
        assert!(tracer.events()[0].contains("add column"));
    }

    #[test]
    fn silent_tracer_does_not_panic() {
        let obj = ObjectRef::new(ObjectKind::Table, "public", "orders");
        SilentTracer.trace(TraceEvent::ChangeDetected {
            object: &obj,
            summary: "noop",
        });
    }
}
