//! RESP framing between client and server.
//!
//! Requests are arrays of bulk strings. The command name and the `KEYS`
//! wildcard travel in plaintext; every other argument is ciphertext bytes.

mod frame;
mod reader;

pub use frame::Frame;
pub use reader::{read_frame, write_frame};

/// Default bound on a single request or reply.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;
