pub mod chat;
pub mod history;
pub mod session;
pub mod streaming;

pub use chat::ChatService;
pub use history::HistoryStore;
pub use session::{SessionManager, SessionSnapshot};
pub use streaming::{RoundObserver, StreamingCoordinator};
