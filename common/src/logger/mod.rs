mod init;
mod spans;
mod trace_id;

pub use init::{init_logger, warn_if_slow};
pub use spans::{child_span, root_span};
pub use trace_id::TraceId;
