//! L2 order-book feed: wire decoding, connection session and the ingest loop

pub mod ingest;
pub mod parser;
pub mod session;

pub use ingest::{IngestError, IngestStats, StreamIngestor};
pub use parser::{parse_snapshot, MalformedMessage};
pub use session::{SessionManager, SessionMetrics, SessionState, TransitionReason};
