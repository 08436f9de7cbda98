//! TLS downgrade detection
//!
//! The prober speaks just enough TLS to read the server's ServerHello, which
//! is all it needs to learn the version and cipher suite the server accepts.

pub mod hello;
pub mod prober;

pub use hello::{version_label, TLS10, TLS11, TLS12, TLS13};
pub use prober::{negotiate, probe, Negotiated};
