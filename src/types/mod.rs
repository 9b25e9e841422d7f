pub mod errors;
pub mod events;
pub mod message;

pub use errors::{EngineError, ImageError, SessionError, StreamBreak};
pub use events::{ClientEvent, ServerEvent};
pub use message::{Content, Role, Turn};
