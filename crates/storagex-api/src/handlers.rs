//! Request handlers.

pub mod health;
pub mod jobs;
pub mod notify;
pub mod videos;

pub use health::*;
pub use jobs::*;
pub use notify::*;
pub use videos::*;
