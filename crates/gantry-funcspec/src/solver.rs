//! The argument-mapper solver.
//!
//! Given a set of target slots, the values a caller provided, and a list of
//! registered converters, the solver finds a sequence of converter
//! applications that covers every slot. Converters are treated as edges in
//! a directed graph between typed-value nodes; resolution walks that graph
//! depth-first.
//!
//! Candidate converters for a slot are tried in registration order (earlier
//! registrations win), recursing into each candidate's own inputs. Cycles
//! are detected via the active resolution stack and rejected. The resulting
//! [`Plan`] invokes each converter at most once, no matter how many slots
//! its outputs feed; converters routinely have side effects (opening
//! sub-streams, allocating broker ids), so the func-once discipline is part
//! of the contract, not an optimisation.

use std::collections::HashSet;

use tracing::trace;

use crate::error::FuncError;
use crate::func::FuncDef;
use crate::set::ValueSet;
use crate::value::ValueKey;

/// An ordered, deduplicated list of converter invocations that covers a set
/// of target slots.
#[derive(Clone, Debug)]
pub struct Plan {
    steps: Vec<FuncDef>,
}

impl Plan {
    /// Returns the converters in invocation order.
    #[must_use]
    pub fn steps(&self) -> &[FuncDef] {
        &self.steps
    }

    /// Returns `true` when no converter needs to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every converter in dependency order, inserting outputs into the
    /// set as they are produced.
    ///
    /// # Errors
    ///
    /// Returns [`FuncError::ConversionFailed`] wrapping the first converter
    /// error; no further converters run after a failure.
    pub fn execute(&self, set: &mut ValueSet) -> Result<(), FuncError> {
        for func in &self.steps {
            let outputs = func
                .invoke(set)
                .map_err(|source| FuncError::ConversionFailed {
                    converter: func.name().to_owned(),
                    source: Box::new(source),
                })?;
            for value in outputs {
                set.insert(value);
            }
        }
        Ok(())
    }
}

/// Resolves the target slots against the available values and converters.
///
/// # Errors
///
/// Returns [`FuncError::Unsatisfied`] naming the first slot (or transitive
/// converter input) nothing can cover, or [`FuncError::CyclicConversion`]
/// when the only way to cover a slot runs through a conversion cycle.
pub fn solve(
    targets: &[ValueKey],
    available: &ValueSet,
    converters: &[FuncDef],
) -> Result<Plan, FuncError> {
    let mut resolution = Resolution {
        available,
        converters,
        plan: Vec::new(),
        planned: HashSet::new(),
    };

    let mut stack = Vec::new();
    for slot in targets {
        resolution.resolve(slot, &mut stack)?;
    }

    let steps: Vec<FuncDef> = resolution
        .plan
        .into_iter()
        .map(|idx| converters[idx].clone())
        .collect();
    trace!(
        target: "gantry_funcspec::solver",
        steps = ?steps.iter().map(FuncDef::name).collect::<Vec<_>>(),
        "solved conversion plan"
    );
    Ok(Plan { steps })
}

struct Resolution<'a> {
    available: &'a ValueSet,
    converters: &'a [FuncDef],
    plan: Vec<usize>,
    planned: HashSet<usize>,
}

impl Resolution<'_> {
    fn slot_satisfied(&self, slot: &ValueKey) -> bool {
        if self.available.contains(slot) {
            return true;
        }
        self.plan.iter().any(|&idx| {
            self.converters[idx]
                .outputs()
                .iter()
                .any(|out| out.key().satisfies(slot))
        })
    }

    fn resolve(&mut self, slot: &ValueKey, stack: &mut Vec<usize>) -> Result<(), FuncError> {
        if self.slot_satisfied(slot) {
            return Ok(());
        }

        let mut first_failure: Option<FuncError> = None;
        for (idx, converter) in self.converters.iter().enumerate() {
            let produces = converter
                .outputs()
                .iter()
                .any(|out| out.key().satisfies(slot));
            if !produces || self.planned.contains(&idx) {
                continue;
            }
            if stack.contains(&idx) {
                if first_failure.is_none() {
                    first_failure = Some(FuncError::CyclicConversion {
                        converter: converter.name().to_owned(),
                    });
                }
                continue;
            }

            stack.push(idx);
            let checkpoint = self.plan.len();
            let result = converter
                .inputs()
                .iter()
                .try_for_each(|param| self.resolve(param.key(), stack));
            stack.pop();

            match result {
                Ok(()) => {
                    self.plan.push(idx);
                    self.planned.insert(idx);
                    return Ok(());
                }
                Err(err) => {
                    // Discard the trial's partial commitments.
                    for dropped in self.plan.drain(checkpoint..) {
                        self.planned.remove(&dropped);
                    }
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        Err(first_failure.unwrap_or_else(|| FuncError::Unsatisfied {
            slot: slot.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests;
