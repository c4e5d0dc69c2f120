//! Cross-service trace correlation

mod bridge;
mod graph;
mod linker;

pub use bridge::{
    BridgeError, CarrierContext, PropagationCarrier, build_carrier, check_field_value,
    extract_context, root_from_header,
};
pub use graph::{AwsMetadata, Segment, SegmentDocument, SegmentGraph, Subsegment};
pub use linker::{Link, LinkStep, TraceLinker};
