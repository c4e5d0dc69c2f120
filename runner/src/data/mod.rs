//! External collaborators: trace store, object storage, orchestrator

pub mod aws;
pub mod objects;
pub mod orchestrator;
pub mod traces;
