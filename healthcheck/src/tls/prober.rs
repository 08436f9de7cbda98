use super::hello::{
    self, ClientHelloSpec, HelloError, ServerHello, ServerReply, ALL_SUITES, TLS10, TLS11, TLS12,
    TLS13, WEAK_SUITES,
};
use crate::constants::tls::{DIAL_TIMEOUT, HANDSHAKE_TIMEOUT, MAX_HELLO_BYTES};
use bytes::BytesMut;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

/// Versions considered too old to accept. TLS 1.1 is left out on purpose.
pub const OLD_VERSIONS: [u16; 1] = [TLS10];
pub const ANY_VERSION: [u16; 4] = [TLS10, TLS11, TLS12, TLS13];

/// Candidate sets tried in order until one yields a finding
const ATTEMPT_SETS: [(&[u16], &[u16]); 3] = [
    (&OLD_VERSIONS, &WEAK_SUITES),
    (&OLD_VERSIONS, &ALL_SUITES),
    (&ANY_VERSION, &WEAK_SUITES),
];

/// What a client offering everything ends up with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub version: u16,
    pub cipher_suite: u16,
}

#[derive(Debug)]
enum AttemptError {
    Dial(String),
    Io(std::io::Error),
    Timeout,
    Closed,
    Alert(u8),
    Hello(HelloError),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Dial(reason) => write!(f, "dial failed: {}", reason),
            AttemptError::Io(e) => write!(f, "io error: {}", e),
            AttemptError::Timeout => write!(f, "handshake timed out"),
            AttemptError::Closed => write!(f, "connection closed before server hello"),
            AttemptError::Alert(desc) => write!(f, "server sent alert {}", desc),
            AttemptError::Hello(e) => write!(f, "bad server hello: {}", e),
        }
    }
}

#[derive(Debug, Clone)]
struct Target {
    addr: String,
    server_name: Option<String>,
}

impl Target {
    /// `None` for anything that is not an https URL with a host.
    fn from_url(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        if url.scheme() != "https" {
            return None;
        }
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(Self {
            addr: format!("{}:{}", host, port),
            server_name: url.domain().map(str::to_string),
        })
    }
}

/// Looks for a downgrade the server will accept: TLS 1.0, or a weak cipher
/// suite at any version. Returns the first finding, e.g.
/// `"TLS v1.0 TLS_RSA_WITH_RC4_128_SHA"`.
pub async fn probe(url: &str) -> Option<String> {
    let target = Target::from_url(url)?;

    for (versions, suites) in ATTEMPT_SETS {
        for &version in versions {
            match attempt(&target, &[version], suites, HANDSHAKE_TIMEOUT).await {
                Ok(hello) => {
                    if let Some(finding) = finding_for(&hello) {
                        debug!("TLS probe on {}: {}", target.addr, finding);
                        return Some(finding);
                    }
                }
                Err(AttemptError::Dial(reason)) => {
                    debug!("TLS probe on {} aborted: {}", target.addr, reason);
                    return None;
                }
                Err(e) => {
                    debug!(
                        "TLS probe on {} rejected {}: {}",
                        target.addr,
                        hello::version_label(version),
                        e
                    );
                }
            }
        }
    }

    None
}

/// Offers every version and suite at once and reports what the server picks.
pub async fn negotiate(url: &str, handshake_timeout: Duration) -> Option<Negotiated> {
    let target = Target::from_url(url)?;
    match attempt(&target, &[TLS13, TLS12, TLS11, TLS10], &ALL_SUITES, handshake_timeout).await {
        Ok(hello) => Some(Negotiated {
            version: hello.version,
            cipher_suite: hello.cipher_suite,
        }),
        Err(e) => {
            debug!("TLS negotiation with {} failed: {}", target.addr, e);
            None
        }
    }
}

/// Empty findings mean the server behaved; the probe moves on.
fn finding_for(hello: &ServerHello) -> Option<String> {
    let mut parts = Vec::new();
    if matches!(hello.version, TLS10 | TLS11) {
        parts.push(hello::version_label(hello.version));
    }
    if let Some(name) = hello::weak_suite_name(hello.cipher_suite) {
        parts.push(name.to_string());
    }

    let finding = parts.join(" ");
    let finding = finding.trim();
    if finding.is_empty() {
        None
    } else {
        Some(finding.to_string())
    }
}

async fn attempt(
    target: &Target,
    versions: &[u16],
    suites: &[u16],
    handshake_timeout: Duration,
) -> Result<ServerHello, AttemptError> {
    let mut stream = match timeout(DIAL_TIMEOUT, TcpStream::connect(&target.addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(AttemptError::Dial(e.to_string())),
        Err(_) => return Err(AttemptError::Dial("dial timed out".to_string())),
    };

    let client_hello = ClientHelloSpec {
        versions,
        cipher_suites: suites,
        server_name: target.server_name.as_deref(),
        random: rand::random(),
        x25519_share: rand::random(),
    }
    .encode();

    let exchange = async {
        stream
            .write_all(&client_hello)
            .await
            .map_err(AttemptError::Io)?;
        read_reply(&mut stream).await
    };

    let reply = timeout(handshake_timeout, exchange)
        .await
        .map_err(|_| AttemptError::Timeout)??;

    match reply {
        ServerReply::Hello(hello) => Ok(hello),
        ServerReply::Alert { description, .. } => Err(AttemptError::Alert(description)),
    }
}

async fn read_reply(stream: &mut TcpStream) -> Result<ServerReply, AttemptError> {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        if let Some(reply) = hello::parse_server_reply(&buf).map_err(AttemptError::Hello)? {
            return Ok(reply);
        }
        if buf.len() >= MAX_HELLO_BYTES {
            return Err(AttemptError::Hello(HelloError::Unexpected(
                "oversized server flight".to_string(),
            )));
        }
        if stream.read_buf(&mut buf).await.map_err(AttemptError::Io)? == 0 {
            return Err(AttemptError::Closed);
        }
    }
}
