//! Streaming pipeline between provider events and the view
//!
//! fragment -> [`normalize`] -> [`buffer`] -> tick ([`scheduler`]) ->
//! [`tokens`] -> snapshot. [`session`] owns the state for one request.

pub mod buffer;
pub mod normalize;
pub mod scheduler;
pub mod scroll;
pub mod session;
pub mod tokens;

pub use normalize::Normalizer;
pub use scheduler::{RenderScheduler, TickReport};
pub use scroll::ScrollFollower;
pub use session::{Phase, SessionError, SessionSnapshot, StreamSession};
pub use tokens::{ChannelSnapshot, DisplayToken};
