//! A fake TLS endpoint that reads the ClientHello and answers with a
//! ServerHello (or a handshake_failure alert) according to a fixed policy.
//! It never completes a real handshake; the prober does not need one.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct MockTlsServer {
    pub url: String,
}

#[derive(Debug, Clone)]
struct Policy {
    versions: Vec<u16>,
    suites: Vec<u16>,
}

impl MockTlsServer {
    /// Accepts only the listed versions and suites, preferring earlier
    /// suites in `suites`.
    pub async fn start(versions: &[u16], suites: &[u16]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let policy = Policy {
            versions: versions.to_vec(),
            suites: suites.to_vec(),
        };

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, policy.clone()));
            }
        });

        Self {
            url: format!("https://127.0.0.1:{}", port),
        }
    }
}

async fn serve(mut stream: TcpStream, policy: Policy) {
    let mut header = [0u8; 5];
    if stream.read_exact(&mut header).await.is_err() {
        return;
    }
    let mut body = vec![0u8; u16::from_be_bytes([header[3], header[4]]) as usize];
    if stream.read_exact(&mut body).await.is_err() {
        return;
    }

    let Some((offered_versions, offered_suites)) = parse_client_hello(&body) else {
        return;
    };

    let version = offered_versions
        .iter()
        .copied()
        .filter(|v| policy.versions.contains(v))
        .max();
    let suite = policy
        .suites
        .iter()
        .copied()
        .find(|s| offered_suites.contains(s));

    let reply = match (version, suite) {
        (Some(version), Some(suite)) => server_hello(version, suite),
        _ => vec![0x15, 0x03, 0x01, 0x00, 0x02, 0x02, 0x28],
    };
    let _ = stream.write_all(&reply).await;
    let _ = stream.shutdown().await;
}

fn parse_client_hello(body: &[u8]) -> Option<(Vec<u16>, Vec<u16>)> {
    let mut pos = 4; // handshake type and length
    let legacy_version = u16::from_be_bytes([*body.get(pos)?, *body.get(pos + 1)?]);
    pos += 2 + 32;
    pos += 1 + *body.get(pos)? as usize;

    let suites_len = u16::from_be_bytes([*body.get(pos)?, *body.get(pos + 1)?]) as usize;
    pos += 2;
    let suites = body
        .get(pos..pos + suites_len)?
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    pos += suites_len;
    pos += 1 + *body.get(pos)? as usize;

    let mut versions = vec![legacy_version];
    let ext_len = u16::from_be_bytes([*body.get(pos)?, *body.get(pos + 1)?]) as usize;
    pos += 2;
    let end = pos + ext_len;
    while pos + 4 <= end {
        let ext_type = u16::from_be_bytes([body[pos], body[pos + 1]]);
        let len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
        pos += 4;
        if ext_type == 0x002b {
            versions = body
                .get(pos + 1..pos + len)?
                .chunks(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
        }
        pos += len;
    }

    Some((versions, suites))
}

fn server_hello(version: u16, suite: u16) -> Vec<u8> {
    let legacy = version.min(0x0303);
    let mut hello = Vec::new();
    hello.extend_from_slice(&legacy.to_be_bytes());
    hello.extend_from_slice(&[0x42; 32]);
    hello.push(0);
    hello.extend_from_slice(&suite.to_be_bytes());
    hello.push(0);
    if version == 0x0304 {
        hello.extend_from_slice(&[0x00, 0x06, 0x00, 0x2b, 0x00, 0x02]);
        hello.extend_from_slice(&version.to_be_bytes());
    }

    let mut record = vec![0x16];
    record.extend_from_slice(&legacy.to_be_bytes());
    record.extend_from_slice(&((hello.len() + 4) as u16).to_be_bytes());
    record.push(0x02);
    record.extend_from_slice(&(hello.len() as u32).to_be_bytes()[1..]);
    record.extend_from_slice(&hello);
    record
}
