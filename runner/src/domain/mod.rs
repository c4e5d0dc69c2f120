//! Domain logic: trace linking, stage execution, payload transforms

pub mod linking;
pub mod stage;
pub mod transforms;
pub mod trigger;
