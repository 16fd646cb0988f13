pub mod error;
pub mod process;
pub mod streaming;


pub use error::ProcessError;
pub use process::{Process, ProcessCommand};
pub use streaming::{StreamSource, StreamWatcher, WatchSummary};
