//! In-process P2P peer that answers our handshake with a scripted behavior

use chrono::{Duration, Utc};
use healthcheck::p2p::codec::{block_slot, GO_AWAY_MESSAGE, SIGNED_BLOCK_MESSAGE, TIME_MESSAGE};
use std::time::Duration as StdDuration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, Copy)]
pub enum PeerBehavior {
    /// Sends a time message, then a signed block this many seconds old
    SendBlock { age_secs: i64 },
    /// Sends a go-away with the given reason code
    GoAway { reason: u8 },
    /// Hangs up right after reading the handshake
    Hangup,
    /// Reads the handshake and never answers
    Silent,
}

pub struct MockPeer {
    pub addr: String,
}

impl MockPeer {
    pub async fn start(behavior: PeerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, behavior));
            }
        });

        Self { addr }
    }
}

async fn serve(mut stream: TcpStream, behavior: PeerBehavior) {
    if read_frame(&mut stream).await.is_none() {
        return;
    }

    match behavior {
        PeerBehavior::SendBlock { age_secs } => {
            let _ = stream.write_all(&frame(TIME_MESSAGE, &[0u8; 32])).await;
            let block_time = Utc::now() - Duration::seconds(age_secs);
            let mut payload = block_slot(block_time).to_le_bytes().to_vec();
            payload.extend_from_slice(b"producer");
            let _ = stream.write_all(&frame(SIGNED_BLOCK_MESSAGE, &payload)).await;
            hold_open(stream).await;
        }
        PeerBehavior::GoAway { reason } => {
            let mut payload = vec![reason];
            payload.extend_from_slice(&[0u8; 32]);
            let _ = stream.write_all(&frame(GO_AWAY_MESSAGE, &payload)).await;
            hold_open(stream).await;
        }
        PeerBehavior::Hangup => {
            let _ = stream.shutdown().await;
        }
        PeerBehavior::Silent => hold_open(stream).await,
    }
}

/// Keeps the socket open until the client goes away.
async fn hold_open(mut stream: TcpStream) {
    let mut sink = [0u8; 1024];
    let _ = tokio::time::timeout(StdDuration::from_secs(10), async {
        while let Ok(n) = stream.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    })
    .await;
}

async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await.ok()?;
    let mut body = vec![0u8; u32::from_le_bytes(len) as usize];
    stream.read_exact(&mut body).await.ok()?;
    Some(body)
}

pub fn frame(msg_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = ((payload.len() + 1) as u32).to_le_bytes().to_vec();
    buf.push(msg_type);
    buf.extend_from_slice(payload);
    buf
}
