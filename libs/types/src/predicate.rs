//! Declarative subscription filter trees
//!
//! Subscriptions may carry a predicate restricting which instruments
//! their deltas cover. The wire format is a recursive
//! `{ "operator": [operand, …] }` object with `{ "var": "fieldName" }`
//! leaves referencing instrument fields; JSON scalars are literals.
//!
//! Parsing happens once at subscribe time so a malformed tree is a
//! request-boundary rejection, never a per-delta surprise. Evaluation
//! lives in the market-data crate's filter module.

use crate::field::FieldValue;
use serde_json::Value;
use thiserror::Error;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Wire token for this operator.
    pub fn token(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }
}

/// A parsed predicate tree with a closed operator set.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Reference to an instrument field by wire name
    Var(String),
    /// Literal operand
    Literal(FieldValue),
    /// Binary comparison
    Compare {
        op: CompareOp,
        lhs: Box<Predicate>,
        rhs: Box<Predicate>,
    },
    /// Logical conjunction ("and")
    All(Vec<Predicate>),
    /// Logical disjunction ("or")
    Any(Vec<Predicate>),
    /// Logical negation ("not")
    Not(Box<Predicate>),
    /// Membership test ("in"): needle against a literal list
    In {
        needle: Box<Predicate>,
        haystack: Vec<Predicate>,
    },
}

/// Errors raised while parsing a predicate tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    #[error("unsupported operator: {op}")]
    UnknownOperator { op: String },

    #[error("operator {op} expects {expected} operand(s), got {actual}")]
    Arity {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("malformed predicate: {message}")]
    Malformed { message: String },
}

impl Predicate {
    /// Parse the JSON wire form into a predicate tree.
    pub fn parse(value: &Value) -> Result<Predicate, PredicateError> {
        match value {
            Value::Object(map) => {
                if map.len() != 1 {
                    return Err(PredicateError::Malformed {
                        message: format!(
                            "expected a single-operator object, got {} keys",
                            map.len()
                        ),
                    });
                }
                // Single entry by construction
                let (op, args) = map.iter().next().expect("non-empty map");
                Self::parse_operator(op, args)
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                let literal =
                    FieldValue::from_json(value).ok_or_else(|| PredicateError::Malformed {
                        message: "literal is not representable".to_string(),
                    })?;
                Ok(Predicate::Literal(literal))
            }
            Value::Array(_) => Err(PredicateError::Malformed {
                message: "bare array is only valid as the second operand of \"in\"".to_string(),
            }),
            Value::Null => Err(PredicateError::Malformed {
                message: "null is not a valid operand".to_string(),
            }),
        }
    }

    fn parse_operator(op: &str, args: &Value) -> Result<Predicate, PredicateError> {
        if op == "var" {
            let name = args.as_str().ok_or_else(|| PredicateError::Malformed {
                message: "\"var\" expects a field-name string".to_string(),
            })?;
            return Ok(Predicate::Var(name.to_string()));
        }

        let operands = args.as_array().ok_or_else(|| PredicateError::Malformed {
            message: format!("operator {op} expects an operand array"),
        })?;

        if let Some(cmp) = CompareOp::from_token(op) {
            let [lhs, rhs] = operands.as_slice() else {
                return Err(PredicateError::Arity {
                    op: op.to_string(),
                    expected: 2,
                    actual: operands.len(),
                });
            };
            return Ok(Predicate::Compare {
                op: cmp,
                lhs: Box::new(Self::parse(lhs)?),
                rhs: Box::new(Self::parse(rhs)?),
            });
        }

        match op {
            "and" | "or" => {
                if operands.is_empty() {
                    return Err(PredicateError::Arity {
                        op: op.to_string(),
                        expected: 1,
                        actual: 0,
                    });
                }
                let parsed: Result<Vec<Predicate>, PredicateError> =
                    operands.iter().map(Self::parse).collect();
                let parsed = parsed?;
                Ok(if op == "and" {
                    Predicate::All(parsed)
                } else {
                    Predicate::Any(parsed)
                })
            }
            "not" => {
                let [inner] = operands.as_slice() else {
                    return Err(PredicateError::Arity {
                        op: "not".to_string(),
                        expected: 1,
                        actual: operands.len(),
                    });
                };
                Ok(Predicate::Not(Box::new(Self::parse(inner)?)))
            }
            "in" => {
                let [needle, haystack] = operands.as_slice() else {
                    return Err(PredicateError::Arity {
                        op: "in".to_string(),
                        expected: 2,
                        actual: operands.len(),
                    });
                };
                let items = haystack.as_array().ok_or_else(|| PredicateError::Malformed {
                    message: "\"in\" expects an array as its second operand".to_string(),
                })?;
                let parsed: Result<Vec<Predicate>, PredicateError> =
                    items.iter().map(Self::parse).collect();
                Ok(Predicate::In {
                    needle: Box::new(Self::parse(needle)?),
                    haystack: parsed?,
                })
            }
            other => Err(PredicateError::UnknownOperator {
                op: other.to_string(),
            }),
        }
    }
}
