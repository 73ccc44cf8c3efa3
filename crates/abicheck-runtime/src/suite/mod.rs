//! Case driver
//!
//! Runs cases strictly one after another through a single call context,
//! reset before every case. A failing case never stops the run.
//!
//! - `TestCase`, `CaseTable`: signature text plus target function
//! - `Harness`: call context, registry and expected values
//! - `CaseSelection`: which cases to run
//! - `CaseOutcome`, `RunSummary`: results, serializable to JSON

pub mod builtin;

use crate::engine::{CallVm, FfiVm};
use crate::error::{CaseError, FailureKind};
use crate::invoke::invoke;
use crate::registry::AggregateRegistry;
use crate::signature::Signature;
use crate::values::ValueTable;
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info_span, warn};

/// One case: signature text and the function it describes
#[derive(Debug, Clone, Copy)]
pub struct TestCase {
    signature: &'static str,
    target: *const (),
}

impl TestCase {
    /// # Safety
    ///
    /// `target` must point to an `extern "C"` function whose parameters and
    /// return type are exactly those spelled by `signature`.
    pub unsafe fn new(signature: &'static str, target: *const ()) -> Self {
        Self { signature, target }
    }

    pub fn signature(&self) -> &'static str {
        self.signature
    }

    pub fn target(&self) -> *const () {
        self.target
    }
}

/// Ordered case list plus the argument bound the value tables need
#[derive(Debug, Clone, Default)]
pub struct CaseTable {
    cases: Vec<TestCase>,
    max_args: usize,
}

impl CaseTable {
    pub fn new(cases: Vec<TestCase>, max_args: usize) -> Self {
        Self { cases, max_args }
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn get(&self, index: usize) -> Option<&TestCase> {
        self.cases.get(index)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn max_args(&self) -> usize {
        self.max_args
    }
}

/// Invalid case selections
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("case {index} does not exist (the table has {len} cases)")]
    OutOfRange { index: usize, len: usize },

    #[error("empty case range {from}..={to}")]
    EmptyRange { from: usize, to: usize },
}

/// Which cases to run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaseSelection {
    #[default]
    All,
    Indices(Vec<usize>),
    /// Inclusive range
    Range { from: usize, to: usize },
}

impl CaseSelection {
    /// Resolve to concrete indices for a table of `len` cases
    pub fn resolve(&self, len: usize) -> Result<Vec<usize>, SelectionError> {
        match self {
            CaseSelection::All => Ok((0..len).collect()),
            CaseSelection::Indices(indices) => {
                if let Some(&index) = indices.iter().find(|&&i| i >= len) {
                    return Err(SelectionError::OutOfRange { index, len });
                }
                Ok(indices.clone())
            }
            CaseSelection::Range { from, to } => {
                if from > to {
                    return Err(SelectionError::EmptyRange {
                        from: *from,
                        to: *to,
                    });
                }
                if *to >= len {
                    return Err(SelectionError::OutOfRange { index: *to, len });
                }
                Ok((*from..=*to).collect())
            }
        }
    }
}

/// Result of one case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub index: usize,
    pub signature: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub elapsed_us: u64,
}

impl CaseOutcome {
    fn new(index: usize, signature: &str, result: &Result<(), CaseError>, elapsed_us: u64) -> Self {
        let error = result.as_ref().err();
        Self {
            index,
            signature: signature.to_string(),
            passed: error.is_none(),
            failure: error.map(CaseError::kind),
            position: error.and_then(CaseError::position),
            diagnostic: error.map(ToString::to_string),
            elapsed_us,
        }
    }
}

/// Results of a run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<CaseOutcome>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// True when no case failed (an empty run passes)
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    /// Process exit code: 0 iff every case passed
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    pub fn total_elapsed_us(&self) -> u64 {
        self.outcomes.iter().map(|o| o.elapsed_us).sum()
    }
}

/// Sequential case runner owning one call context
pub struct Harness<V: CallVm> {
    vm: V,
    registry: AggregateRegistry,
    cases: CaseTable,
    expected: ValueTable,
}

impl Harness<FfiVm> {
    /// Built-in suite on a default libffi engine
    pub fn builtin() -> Self {
        Harness::new(FfiVm::new(), builtin::registry(), builtin::cases())
    }
}

impl<V: CallVm> Harness<V> {
    /// Seed the expected table for the case table's argument bound
    pub fn new(vm: V, registry: AggregateRegistry, cases: CaseTable) -> Self {
        let expected = ValueTable::seeded(cases.max_args(), registry.max_payload_size());
        Self {
            vm,
            registry,
            cases,
            expected,
        }
    }

    /// Reseed the expected table with a different argument bound
    ///
    /// Cases using positions past the bound then fail with
    /// `CaseError::PositionOutOfRange`.
    pub fn with_max_args(mut self, max_args: usize) -> Self {
        self.expected = ValueTable::seeded(max_args, self.registry.max_payload_size());
        self
    }

    pub fn registry(&self) -> &AggregateRegistry {
        &self.registry
    }

    pub fn cases(&self) -> &CaseTable {
        &self.cases
    }

    pub fn expected(&self) -> &ValueTable {
        &self.expected
    }

    pub fn vm(&self) -> &V {
        &self.vm
    }

    /// Lex, call and verify one case
    pub fn check(&mut self, case: &TestCase) -> Result<(), CaseError> {
        let sig = Signature::parse(case.signature, &self.registry)?;
        // SAFETY: TestCase::new requires the target to match its signature
        let observed = unsafe {
            invoke(
                &mut self.vm,
                &sig,
                case.target,
                &self.registry,
                &self.expected,
            )
        }?;
        crate::verify::verify(&sig, &self.registry, &observed, &self.expected)
    }

    /// Run the case at `index`; `None` if there is no such case
    pub fn run_case(&mut self, index: usize) -> Option<CaseOutcome> {
        let case = *self.cases.get(index)?;
        let span = info_span!("case", index, signature = case.signature);
        let _enter = span.enter();

        let start = Instant::now();
        let result = self.check(&case);
        let elapsed_us = start.elapsed().as_micros() as u64;

        match &result {
            Ok(()) => debug!(elapsed_us, "pass"),
            Err(err) => warn!(kind = %err.kind(), "{}", err),
        }
        Some(CaseOutcome::new(index, case.signature, &result, elapsed_us))
    }

    pub fn run_all(&mut self) -> RunSummary {
        let outcomes = (0..self.cases.len())
            .filter_map(|index| self.run_case(index))
            .collect();
        RunSummary { outcomes }
    }

    pub fn run_selected(&mut self, selection: &CaseSelection) -> Result<RunSummary, SelectionError> {
        let indices = selection.resolve(self.cases.len())?;
        let outcomes = indices
            .into_iter()
            .filter_map(|index| self.run_case(index))
            .collect();
        Ok(RunSummary { outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::all(CaseSelection::All, Ok(vec![0, 1, 2]))]
    #[case::indices(CaseSelection::Indices(vec![2, 0]), Ok(vec![2, 0]))]
    #[case::range(CaseSelection::Range { from: 1, to: 2 }, Ok(vec![1, 2]))]
    #[case::index_out_of_range(
        CaseSelection::Indices(vec![3]),
        Err(SelectionError::OutOfRange { index: 3, len: 3 })
    )]
    #[case::range_past_end(
        CaseSelection::Range { from: 0, to: 5 },
        Err(SelectionError::OutOfRange { index: 5, len: 3 })
    )]
    #[case::reversed_range(
        CaseSelection::Range { from: 2, to: 1 },
        Err(SelectionError::EmptyRange { from: 2, to: 1 })
    )]
    fn test_selection_resolve(
        #[case] selection: CaseSelection,
        #[case] expected: Result<Vec<usize>, SelectionError>,
    ) {
        assert_eq!(selection.resolve(3), expected);
    }

    fn outcome(index: usize, passed: bool) -> CaseOutcome {
        CaseOutcome {
            index,
            signature: "ii".to_string(),
            passed,
            failure: None,
            position: None,
            diagnostic: None,
            elapsed_us: 3,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            outcomes: vec![outcome(0, true), outcome(1, false), outcome(2, true)],
        };
        assert_eq!(summary.passed(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(!summary.all_passed());
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.total_elapsed_us(), 9);
    }

    #[test]
    fn test_empty_run_passes() {
        let summary = RunSummary::default();
        assert!(summary.all_passed());
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_outcome_from_error() {
        let err: Result<(), CaseError> = Err(CaseError::PositionOutOfRange {
            position: 4,
            max: 2,
        });
        let outcome = CaseOutcome::new(7, "viiii", &err, 0);
        assert!(!outcome.passed);
        assert_eq!(outcome.failure, Some(FailureKind::Engine));
        assert_eq!(outcome.position, Some(4));
        assert_eq!(
            outcome.diagnostic.as_deref(),
            Some("position 4 exceeds value table bound 2")
        );
    }

    #[test]
    fn test_outcome_json_omits_empty_fields() {
        let json = serde_json::to_value(outcome(0, true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "index": 0,
                "signature": "ii",
                "passed": true,
                "elapsed_us": 3
            })
        );
    }
}
