//! Reusable test utilities:
//! - Mock chain RPC and Telegram servers (wiremock)
//! - Mock P2P peer and TLS endpoints on local TCP sockets
//! - Test configuration builders

// Not every test binary uses every fixture
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_chain;
pub mod mock_peer;
pub mod mock_telegram;
pub mod mock_tls;
pub mod test_config;

pub use mock_chain::MockChainServer;
pub use mock_peer::{MockPeer, PeerBehavior};
pub use mock_telegram::MockTelegramServer;
pub use mock_tls::MockTlsServer;
pub use test_config::{closed_port_addr, test_config, write_config_file};
