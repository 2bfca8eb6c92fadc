pub mod history;

pub use history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
