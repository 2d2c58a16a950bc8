mod buffer;
mod history_manager;

pub use buffer::HistoryBuffer;
pub use history_manager::HistoryManager;
