//! Predicate filter evaluation
//!
//! Evaluates a parsed predicate tree against an instrument's flat
//! field map. Evaluation is pure and tri-state: true, false, or an
//! error (unknown field, type mismatch, non-comparable operands).
//! At the dispatch gate the error state collapses to "does not
//! match": logged and swallowed, never a panic.

use tracing::warn;
use types::field::{FieldMap, FieldValue};
use types::predicate::{CompareOp, Predicate};

/// Errors raised during predicate evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown field: {field}")]
    UnknownField { field: String },

    #[error("expected a boolean operand, got {actual}")]
    NotBoolean { actual: &'static str },

    #[error("cannot order {lhs} against {rhs}")]
    NotComparable {
        lhs: &'static str,
        rhs: &'static str,
    },
}

/// Result of evaluating a sub-expression: either a value (var or
/// literal) or a boolean outcome (comparison, logical node).
enum Evaluated {
    Value(FieldValue),
    Truth(bool),
}

impl Evaluated {
    fn into_bool(self) -> Result<bool, EvalError> {
        match self {
            Evaluated::Truth(b) => Ok(b),
            Evaluated::Value(FieldValue::Bool(b)) => Ok(b),
            Evaluated::Value(v) => Err(EvalError::NotBoolean {
                actual: v.type_name(),
            }),
        }
    }

    fn into_value(self) -> Result<FieldValue, EvalError> {
        match self {
            Evaluated::Value(v) => Ok(v),
            Evaluated::Truth(b) => Ok(FieldValue::Bool(b)),
        }
    }
}

/// Evaluate a predicate tree against a snapshot field map.
///
/// Pure and side-effect-free; every error condition is reported, not
/// panicked on.
pub fn evaluate(predicate: &Predicate, fields: &FieldMap) -> Result<bool, EvalError> {
    eval_node(predicate, fields)?.into_bool()
}

/// Gate collapse: a missing predicate admits everything; an
/// evaluation error logs and counts as "does not match".
pub fn matches(predicate: Option<&Predicate>, fields: &FieldMap) -> bool {
    let Some(predicate) = predicate else {
        return true;
    };
    match evaluate(predicate, fields) {
        Ok(matched) => matched,
        Err(err) => {
            warn!(error = %err, "predicate evaluation failed, treating as non-match");
            false
        }
    }
}

fn eval_node(predicate: &Predicate, fields: &FieldMap) -> Result<Evaluated, EvalError> {
    match predicate {
        Predicate::Var(name) => fields
            .get(name.as_str())
            .cloned()
            .map(Evaluated::Value)
            .ok_or_else(|| EvalError::UnknownField {
                field: name.clone(),
            }),
        Predicate::Literal(value) => Ok(Evaluated::Value(value.clone())),
        Predicate::Compare { op, lhs, rhs } => {
            let lhs = eval_node(lhs, fields)?.into_value()?;
            let rhs = eval_node(rhs, fields)?.into_value()?;
            compare(*op, &lhs, &rhs).map(Evaluated::Truth)
        }
        Predicate::All(children) => {
            for child in children {
                if !eval_node(child, fields)?.into_bool()? {
                    return Ok(Evaluated::Truth(false));
                }
            }
            Ok(Evaluated::Truth(true))
        }
        Predicate::Any(children) => {
            for child in children {
                if eval_node(child, fields)?.into_bool()? {
                    return Ok(Evaluated::Truth(true));
                }
            }
            Ok(Evaluated::Truth(false))
        }
        Predicate::Not(inner) => {
            let truth = eval_node(inner, fields)?.into_bool()?;
            Ok(Evaluated::Truth(!truth))
        }
        Predicate::In { needle, haystack } => {
            let needle = eval_node(needle, fields)?.into_value()?;
            for candidate in haystack {
                let candidate = eval_node(candidate, fields)?.into_value()?;
                if values_equal(&needle, &candidate) {
                    return Ok(Evaluated::Truth(true));
                }
            }
            Ok(Evaluated::Truth(false))
        }
    }
}

/// Equality across the numeric family coerces timestamps to numbers
/// so `{"==": [{"var":"lastUpdate"}, 1700000000000]}` behaves.
fn values_equal(lhs: &FieldValue, rhs: &FieldValue) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn compare(op: CompareOp, lhs: &FieldValue, rhs: &FieldValue) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => Ok(values_equal(lhs, rhs)),
        CompareOp::Ne => Ok(!values_equal(lhs, rhs)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let (a, b) = match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(EvalError::NotComparable {
                        lhs: lhs.type_name(),
                        rhs: rhs.type_name(),
                    })
                }
            };
            Ok(match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Eq | CompareOp::Ne => unreachable!(),
            })
        }
    }
}
