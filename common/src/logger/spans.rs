use tracing::{Span, field};

use super::TraceId;

/// Create a root span for a request / batch / job
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id,
        actor = field::Empty
    )
}

/// Create a child span (inherits trace_id through the parent)
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("child", name = %name, group = field::Empty)
}
