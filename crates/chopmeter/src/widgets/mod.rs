//! TUI widget modules

pub mod account_popup;
pub mod header;
pub mod history_popup;
pub mod predictions;
pub mod progress_bars;
pub mod shortcuts;
pub mod statistics;

pub use account_popup::*;
pub use header::*;
pub use history_popup::*;
pub use predictions::*;
pub use progress_bars::*;
pub use shortcuts::*;
pub use statistics::*;
