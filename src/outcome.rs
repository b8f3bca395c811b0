//! Results that succeeded but left a dependency behind.
//!
//! Some cross-store steps are attempted once and tolerated when they fail:
//! publishing an extraction job, deleting the old blob after a rename and
//! each blob of a bin teardown. Those failures are not errors for the caller,
//! so they travel next to the value instead of replacing it.

use std::fmt;

/// Which external system a warning is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    ObjectStore,
    WorkQueue,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::ObjectStore => f.write_str("object-store"),
            Dependency::WorkQueue => f.write_str("work-queue"),
        }
    }
}

/// A non-fatal failure of a single dependency call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyWarning {
    pub dependency: Dependency,
    pub operation: &'static str,
    pub detail: String,
}

impl DependencyWarning {
    pub fn new(dependency: Dependency, operation: &'static str, detail: impl Into<String>) -> Self {
        Self {
            dependency,
            operation,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for DependencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} failed: {}", self.dependency, self.operation, self.detail)
    }
}

/// A successful value plus whatever was tolerated on the way.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<DependencyWarning>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<DependencyWarning>) -> Self {
        Self { value, warnings }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
