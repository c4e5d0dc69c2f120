//! Stage payload transforms
//!
//! A transform is an ordered list of named steps. The pipeline runs each
//! step in its own span, so the steps are plain synchronous functions over a
//! [`Table`].

mod cleaning;
mod processing;
mod records;

use std::fmt;

pub use cleaning::Cleaning;
pub use processing::Processing;
pub use records::{Record, Table, TransformError, as_number, is_null};

use crate::core::TransformKind;

type StepFn = Box<dyn Fn(&mut Table) -> Result<(), TransformError> + Send + Sync>;

/// One named unit of a transform
pub struct TransformStep {
    name: &'static str,
    attributes: Vec<(&'static str, String)>,
    apply: StepFn,
}

impl TransformStep {
    pub fn new<F>(name: &'static str, apply: F) -> Self
    where
        F: Fn(&mut Table) -> Result<(), TransformError> + Send + Sync + 'static,
    {
        Self {
            name,
            attributes: Vec::new(),
            apply: Box::new(apply),
        }
    }

    pub fn with_attribute(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.attributes.push((key, value.into()));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn attributes(&self) -> &[(&'static str, String)] {
        &self.attributes
    }

    pub fn apply(&self, table: &mut Table) -> Result<(), TransformError> {
        (self.apply)(table)
    }
}

impl fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformStep")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

pub trait Transform: Send + Sync {
    fn name(&self) -> &'static str;

    fn steps(&self) -> Vec<TransformStep>;
}

/// Copy-through: records are decoded and re-encoded unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn name(&self) -> &'static str {
        "none"
    }

    fn steps(&self) -> Vec<TransformStep> {
        Vec::new()
    }
}

pub fn from_kind(kind: TransformKind) -> Box<dyn Transform> {
    match kind {
        TransformKind::None => Box::new(Passthrough),
        TransformKind::Cleaning => Box::new(Cleaning),
        TransformKind::Processing => Box::new(Processing),
    }
}

/// Apply every step in order, outside any span
#[cfg(test)]
pub(crate) fn apply_all(transform: &dyn Transform, table: &mut Table) -> Result<(), TransformError> {
    for step in transform.steps() {
        step.apply(table)?;
    }
    Ok(())
}
