use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The kind of values a domain ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Bool,
    Int,
    Float,
    Symbols,
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DomainKind::Bool => "bool",
            DomainKind::Int => "int",
            DomainKind::Float => "float",
            DomainKind::Symbols => "symbols",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restriction {
    Narrowed,
    Unchanged,
}

/// A typed set of candidate values carried by an observation or goal
/// attribute. Restriction narrows a domain toward a singleton; a restriction
/// that would empty the domain fails and leaves it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    Bool { values: BTreeSet<bool> },
    Int { min: i64, max: i64 },
    Float { min: f64, max: f64 },
    Symbols { values: BTreeSet<String> },
}

impl Domain {
    pub fn any_bool() -> Self {
        Domain::Bool {
            values: BTreeSet::from([false, true]),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Domain::Bool {
            values: BTreeSet::from([value]),
        }
    }

    pub fn int(min: i64, max: i64) -> Self {
        Domain::Int { min, max }
    }

    pub fn int_value(value: i64) -> Self {
        Domain::Int {
            min: value,
            max: value,
        }
    }

    pub fn float(min: f64, max: f64) -> Self {
        Domain::Float { min, max }
    }

    pub fn symbol(value: impl Into<String>) -> Self {
        Domain::Symbols {
            values: BTreeSet::from([value.into()]),
        }
    }

    pub fn symbols<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Domain::Symbols {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> DomainKind {
        match self {
            Domain::Bool { .. } => DomainKind::Bool,
            Domain::Int { .. } => DomainKind::Int,
            Domain::Float { .. } => DomainKind::Float,
            Domain::Symbols { .. } => DomainKind::Symbols,
        }
    }

    /// A singleton domain admits exactly one value.
    pub fn is_singleton(&self) -> bool {
        match self {
            Domain::Bool { values } => values.len() == 1,
            Domain::Int { min, max } => min == max,
            Domain::Float { min, max } => min == max,
            Domain::Symbols { values } => values.len() == 1,
        }
    }

    /// Narrows `self` to its intersection with `other`. Fails without
    /// modifying `self` when the kinds differ or the intersection is empty.
    pub fn restrict(&mut self, other: &Domain) -> Result<Restriction, DomainError> {
        let narrowed = match (&*self, other) {
            (Domain::Bool { values: a }, Domain::Bool { values: b }) => {
                let values: BTreeSet<bool> = a.intersection(b).copied().collect();
                if values.is_empty() {
                    return Err(DomainError::EmptyIntersection {
                        kind: DomainKind::Bool,
                    });
                }
                Domain::Bool { values }
            }
            (Domain::Int { min: a0, max: a1 }, Domain::Int { min: b0, max: b1 }) => {
                let min = (*a0).max(*b0);
                let max = (*a1).min(*b1);
                if min > max {
                    return Err(DomainError::EmptyIntersection {
                        kind: DomainKind::Int,
                    });
                }
                Domain::Int { min, max }
            }
            (Domain::Float { min: a0, max: a1 }, Domain::Float { min: b0, max: b1 }) => {
                let min = a0.max(*b0);
                let max = a1.min(*b1);
                if min > max {
                    return Err(DomainError::EmptyIntersection {
                        kind: DomainKind::Float,
                    });
                }
                Domain::Float { min, max }
            }
            (Domain::Symbols { values: a }, Domain::Symbols { values: b }) => {
                let values: BTreeSet<String> = a.intersection(b).cloned().collect();
                if values.is_empty() {
                    return Err(DomainError::EmptyIntersection {
                        kind: DomainKind::Symbols,
                    });
                }
                Domain::Symbols { values }
            }
            (lhs, rhs) => {
                return Err(DomainError::KindMismatch {
                    expected: lhs.kind(),
                    found: rhs.kind(),
                });
            }
        };

        if narrowed == *self {
            Ok(Restriction::Unchanged)
        } else {
            *self = narrowed;
            Ok(Restriction::Narrowed)
        }
    }
}

/// A named attribute binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
}

impl Variable {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Variable {
            name: name.into(),
            domain,
        }
    }
}
