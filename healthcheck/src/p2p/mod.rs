//! P2P node checking over the binary peer protocol

pub mod checker;
pub mod codec;
pub mod session;

pub use checker::{check_p2p, P2pCheckSettings};
pub use codec::{GoAwayReason, Handshake, PeerCodec, PeerMessage};
pub use session::{PeerError, PeerSession};
