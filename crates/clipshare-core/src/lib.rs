//! clipshare-core: shared types, errors, configuration, and clip tokens.
//!
//! This crate is the foundational dependency for the other clipshare crates,
//! providing the unified error type, the JSON configuration model, the opaque
//! [`ClipToken`], the clip value types, and an injectable [`Clock`].

pub mod clip;
pub mod clock;
pub mod config;
pub mod error;
pub mod token;

// Re-export the most commonly used items at the crate root.
pub use clip::{ClipRecord, ExtractionRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use token::ClipToken;
