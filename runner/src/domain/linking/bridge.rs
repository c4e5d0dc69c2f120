//! Propagation between X-Ray trace headers and OpenTelemetry contexts
//!
//! Carrier grammar: `Root=<root>[;Parent=<parent>];Sampled=<0|1>`

use opentelemetry::Context;
use opentelemetry::trace::{
    SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
};
use thiserror::Error;

use crate::core::constants::XRAY_HEADER_KEY;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Invalid propagation carrier '{carrier}': {reason}")]
    InvalidCarrier { carrier: String, reason: String },
}

impl BridgeError {
    fn invalid(carrier: &str, reason: impl Into<String>) -> Self {
        BridgeError::InvalidCarrier {
            carrier: carrier.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single header-style key/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationCarrier {
    pub key: String,
    pub value: String,
}

impl PropagationCarrier {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            key: XRAY_HEADER_KEY.to_string(),
            value: value.into(),
        }
    }
}

/// Encode a root trace id and optional resolved parent as an always-sampled carrier
pub fn build_carrier(
    root_trace_id: &str,
    parent: Option<&str>,
) -> Result<PropagationCarrier, BridgeError> {
    check_field_value("Root", root_trace_id)?;
    let value = match parent {
        Some(parent) => {
            check_field_value("Parent", parent)?;
            format!("Root={root_trace_id};Parent={parent};Sampled=1")
        }
        None => format!("Root={root_trace_id};Sampled=1"),
    };
    Ok(PropagationCarrier::new(value))
}

/// Reject values that cannot be carried as a single `key=value` field
pub fn check_field_value(field: &str, value: &str) -> Result<(), BridgeError> {
    if value.is_empty() {
        return Err(BridgeError::invalid(value, format!("{field} must not be empty")));
    }
    if let Some(c) = value
        .chars()
        .find(|c| matches!(c, ';' | '=') || c.is_whitespace())
    {
        return Err(BridgeError::invalid(
            value,
            format!("{field} contains reserved character {c:?}"),
        ));
    }
    Ok(())
}

/// Decoded carrier fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierContext {
    pub root: String,
    pub parent: Option<String>,
    pub sampled: bool,
}

/// Decode a carrier, rejecting anything outside the grammar
pub fn extract_context(carrier: &PropagationCarrier) -> Result<CarrierContext, BridgeError> {
    let raw = carrier.value.as_str();
    if !carrier.key.eq_ignore_ascii_case(XRAY_HEADER_KEY) {
        return Err(BridgeError::invalid(
            raw,
            format!("unexpected carrier key {}", carrier.key),
        ));
    }

    let fields: Vec<(&str, &str)> = raw
        .split(';')
        .map(|field| {
            field
                .split_once('=')
                .filter(|(_, value)| !value.is_empty())
                .ok_or_else(|| BridgeError::invalid(raw, format!("malformed field '{field}'")))
        })
        .collect::<Result<_, _>>()?;

    let (root, parent, sampled) = match fields.as_slice() {
        [("Root", root), ("Sampled", sampled)] => (*root, None, *sampled),
        [("Root", root), ("Parent", parent), ("Sampled", sampled)] => {
            (*root, Some(*parent), *sampled)
        }
        _ => {
            return Err(BridgeError::invalid(
                raw,
                "expected Root, optional Parent, and Sampled fields in that order",
            ));
        }
    };

    let sampled = match sampled {
        "1" => true,
        "0" => false,
        other => {
            return Err(BridgeError::invalid(
                raw,
                format!("Sampled must be 0 or 1, got {other}"),
            ));
        }
    };

    Ok(CarrierContext {
        root: root.to_string(),
        parent: parent.map(str::to_string),
        sampled,
    })
}

impl CarrierContext {
    /// Parent context for new spans.
    ///
    /// Without a parent this is an empty context, so the first span opened
    /// under it starts a new trace.
    pub fn otel_context(&self) -> Result<Context, BridgeError> {
        let Some(ref parent) = self.parent else {
            return Ok(Context::new());
        };

        let trace_id = xray_trace_id(&self.root).ok_or_else(|| {
            BridgeError::invalid(&self.root, "root is not an X-Ray trace id")
        })?;
        let span_id = SpanId::from_hex(parent)
            .ok()
            .filter(|id| parent.len() == 16 && *id != SpanId::INVALID)
            .ok_or_else(|| BridgeError::invalid(parent, "parent is not a 16-digit hex span id"))?;

        let flags = if self.sampled {
            TraceFlags::SAMPLED
        } else {
            TraceFlags::default()
        };
        let span_context = SpanContext::new(trace_id, span_id, flags, true, TraceState::default());
        Ok(Context::new().with_remote_span_context(span_context))
    }
}

/// `1-<8 hex epoch>-<24 hex>` to the 128-bit trace id
fn xray_trace_id(root: &str) -> Option<TraceId> {
    let mut parts = root.split('-');
    let (Some("1"), Some(epoch), Some(unique), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    if epoch.len() != 8 || unique.len() != 24 {
        return None;
    }
    TraceId::from_hex(&format!("{epoch}{unique}"))
        .ok()
        .filter(|id| *id != TraceId::INVALID)
}

/// Root id from an `X-Amzn-Trace-Id` style header value
pub fn root_from_header(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|field| field.trim().split_once('='))
        .find(|(key, _)| *key == "Root")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
