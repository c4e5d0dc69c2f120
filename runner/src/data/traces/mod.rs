//! Access to the external trace store

mod error;
mod memory;
mod store;
mod xray;

pub use error::TraceError;
pub use memory::MemoryTraceStore;
pub use store::{RawSegment, TraceStore};
pub use xray::XrayTraceStore;
