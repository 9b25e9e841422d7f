//! Producer/consumer streaming of generated fragments

mod coordinator;
mod sink;

pub use coordinator::{RoundObserver, StreamingCoordinator};
pub use sink::{token_sink, AbortSwitch, Delivery, StreamItem, TokenStream, TokenWriter};
