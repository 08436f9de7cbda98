//! Hand-assembled ClientHello and a minimal ServerHello reader
//!
//! Only the first server flight is ever inspected: the negotiated version
//! and cipher suite are known once the ServerHello arrives, so nothing here
//! verifies certificates or derives keys.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

pub const TLS10: u16 = 0x0301;
pub const TLS11: u16 = 0x0302;
pub const TLS12: u16 = 0x0303;
pub const TLS13: u16 = 0x0304;

const RECORD_HANDSHAKE: u8 = 0x16;
const RECORD_ALERT: u8 = 0x15;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const HANDSHAKE_SERVER_HELLO: u8 = 0x02;

const EXT_SERVER_NAME: u16 = 0x0000;
const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
const EXT_EC_POINT_FORMATS: u16 = 0x000b;
const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
const EXT_ALPN: u16 = 0x0010;
const EXT_SESSION_TICKET: u16 = 0x0023;
const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;
const EXT_PSK_KEY_EXCHANGE_MODES: u16 = 0x002d;
const EXT_KEY_SHARE: u16 = 0x0033;

const GROUP_X25519: u16 = 0x001d;
const GROUP_SECP256R1: u16 = 0x0017;

const SIGNATURE_SCHEMES: [u16; 5] = [
    0x0203, // ecdsa_sha1
    0x0201, // rsa_pkcs1_sha1
    0x0403, // ecdsa_secp256r1_sha256
    0x0804, // rsa_pss_rsae_sha256
    0x0401, // rsa_pkcs1_sha256
];

pub mod suites {
    pub const TLS_RSA_WITH_RC4_128_SHA: u16 = 0x0005;
    pub const TLS_RSA_WITH_3DES_EDE_CBC_SHA: u16 = 0x000a;
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: u16 = 0x002f;
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: u16 = 0x0035;
    pub const TLS_RSA_WITH_AES_128_CBC_SHA256: u16 = 0x003c;
    pub const TLS_RSA_WITH_AES_128_GCM_SHA256: u16 = 0x009c;
    pub const TLS_RSA_WITH_AES_256_GCM_SHA384: u16 = 0x009d;
    pub const TLS_ECDHE_ECDSA_WITH_RC4_128_SHA: u16 = 0xc007;
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA: u16 = 0xc009;
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA: u16 = 0xc00a;
    pub const TLS_ECDHE_RSA_WITH_RC4_128_SHA: u16 = 0xc011;
    pub const TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA: u16 = 0xc012;
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: u16 = 0xc013;
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: u16 = 0xc014;
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256: u16 = 0xc023;
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: u16 = 0xc027;
    pub const TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02b;
    pub const TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384: u16 = 0xc02c;
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: u16 = 0xc02f;
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: u16 = 0xc030;
    pub const TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305: u16 = 0xcca8;
    pub const TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305: u16 = 0xcca9;
    pub const TLS_AES_128_GCM_SHA256: u16 = 0x1301;
    pub const TLS_AES_256_GCM_SHA384: u16 = 0x1302;
    pub const TLS_CHACHA20_POLY1305_SHA256: u16 = 0x1303;
}

/// RC4 and 3DES-CBC suites
pub const WEAK_SUITES: [u16; 5] = [
    suites::TLS_RSA_WITH_RC4_128_SHA,
    suites::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
    suites::TLS_ECDHE_ECDSA_WITH_RC4_128_SHA,
    suites::TLS_ECDHE_RSA_WITH_RC4_128_SHA,
    suites::TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA,
];

pub const ALL_SUITES: [u16; 25] = [
    suites::TLS_RSA_WITH_RC4_128_SHA,
    suites::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
    suites::TLS_RSA_WITH_AES_128_CBC_SHA,
    suites::TLS_RSA_WITH_AES_256_CBC_SHA,
    suites::TLS_RSA_WITH_AES_128_CBC_SHA256,
    suites::TLS_RSA_WITH_AES_128_GCM_SHA256,
    suites::TLS_RSA_WITH_AES_256_GCM_SHA384,
    suites::TLS_ECDHE_ECDSA_WITH_RC4_128_SHA,
    suites::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA,
    suites::TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA,
    suites::TLS_ECDHE_RSA_WITH_RC4_128_SHA,
    suites::TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA,
    suites::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    suites::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    suites::TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256,
    suites::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
    suites::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    suites::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    suites::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    suites::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    suites::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305,
    suites::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305,
    suites::TLS_AES_128_GCM_SHA256,
    suites::TLS_AES_256_GCM_SHA384,
    suites::TLS_CHACHA20_POLY1305_SHA256,
];

pub fn weak_suite_name(suite: u16) -> Option<&'static str> {
    match suite {
        suites::TLS_RSA_WITH_RC4_128_SHA => Some("TLS_RSA_WITH_RC4_128_SHA"),
        suites::TLS_RSA_WITH_3DES_EDE_CBC_SHA => Some("TLS_RSA_WITH_3DES_EDE_CBC_SHA"),
        suites::TLS_ECDHE_ECDSA_WITH_RC4_128_SHA => Some("TLS_ECDHE_ECDSA_WITH_RC4_128_SHA"),
        suites::TLS_ECDHE_RSA_WITH_RC4_128_SHA => Some("TLS_ECDHE_RSA_WITH_RC4_128_SHA"),
        suites::TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA => Some("TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA"),
        _ => None,
    }
}

pub fn version_label(version: u16) -> String {
    match version {
        TLS10 => "TLS v1.0".to_string(),
        TLS11 => "TLS v1.1".to_string(),
        TLS12 => "TLS v1.2".to_string(),
        TLS13 => "TLS v1.3".to_string(),
        other => format!("unknown (0x{:04x})", other),
    }
}

#[derive(Debug, Clone)]
pub struct ClientHelloSpec<'a> {
    /// Offered in supported_versions, highest preference first
    pub versions: &'a [u16],
    pub cipher_suites: &'a [u16],
    /// Omitted from the hello when `None` (IP literal targets)
    pub server_name: Option<&'a str>,
    pub random: [u8; 32],
    pub x25519_share: [u8; 32],
}

impl ClientHelloSpec<'_> {
    /// Encodes the hello as a single handshake record.
    pub fn encode(&self) -> Bytes {
        let legacy_version = self
            .versions
            .iter()
            .copied()
            .max()
            .unwrap_or(TLS12)
            .min(TLS12);

        let mut body = BytesMut::with_capacity(512);
        body.put_u16(legacy_version);
        body.put_slice(&self.random);
        body.put_u8(0); // empty session id

        body.put_u16((self.cipher_suites.len() * 2) as u16);
        for suite in self.cipher_suites {
            body.put_u16(*suite);
        }

        body.put_u8(1);
        body.put_u8(0); // null compression

        let extensions = self.encode_extensions();
        body.put_u16(extensions.len() as u16);
        body.put_slice(&extensions);

        let mut handshake = BytesMut::with_capacity(body.len() + 4);
        handshake.put_u8(HANDSHAKE_CLIENT_HELLO);
        put_u24(&mut handshake, body.len());
        handshake.put_slice(&body);

        let mut record = BytesMut::with_capacity(handshake.len() + 5);
        record.put_u8(RECORD_HANDSHAKE);
        record.put_u16(TLS10);
        record.put_u16(handshake.len() as u16);
        record.put_slice(&handshake);
        record.freeze()
    }

    fn encode_extensions(&self) -> BytesMut {
        let mut ext = BytesMut::with_capacity(256);

        if let Some(name) = self.server_name {
            let name = name.as_bytes();
            put_extension(&mut ext, EXT_SERVER_NAME, |b| {
                b.put_u16((name.len() + 3) as u16);
                b.put_u8(0); // host_name
                b.put_u16(name.len() as u16);
                b.put_slice(name);
            });
        }

        put_extension(&mut ext, EXT_SUPPORTED_GROUPS, |b| {
            b.put_u16(4);
            b.put_u16(GROUP_X25519);
            b.put_u16(GROUP_SECP256R1);
        });

        put_extension(&mut ext, EXT_EC_POINT_FORMATS, |b| {
            b.put_u8(1);
            b.put_u8(0); // uncompressed
        });

        put_extension(&mut ext, EXT_SESSION_TICKET, |_| {});

        put_extension(&mut ext, EXT_ALPN, |b| {
            let proto = b"http/1.1";
            b.put_u16((proto.len() + 1) as u16);
            b.put_u8(proto.len() as u8);
            b.put_slice(proto);
        });

        put_extension(&mut ext, EXT_SIGNATURE_ALGORITHMS, |b| {
            b.put_u16((SIGNATURE_SCHEMES.len() * 2) as u16);
            for scheme in SIGNATURE_SCHEMES {
                b.put_u16(scheme);
            }
        });

        put_extension(&mut ext, EXT_KEY_SHARE, |b| {
            b.put_u16(2 + 2 + 32);
            b.put_u16(GROUP_X25519);
            b.put_u16(32);
            b.put_slice(&self.x25519_share);
        });

        put_extension(&mut ext, EXT_PSK_KEY_EXCHANGE_MODES, |b| {
            b.put_u8(1);
            b.put_u8(1); // psk_dhe_ke
        });

        put_extension(&mut ext, EXT_SUPPORTED_VERSIONS, |b| {
            b.put_u8((self.versions.len() * 2) as u8);
            for version in self.versions {
                b.put_u16(*version);
            }
        });

        ext
    }
}

fn put_extension(buf: &mut BytesMut, ext_type: u16, fill: impl FnOnce(&mut BytesMut)) {
    let mut data = BytesMut::new();
    fill(&mut data);
    buf.put_u16(ext_type);
    buf.put_u16(data.len() as u16);
    buf.put_slice(&data);
}

fn put_u24(buf: &mut BytesMut, value: usize) {
    buf.put_u8((value >> 16) as u8);
    buf.put_u16(value as u16);
}

/// What the server picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHello {
    pub version: u16,
    pub cipher_suite: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerReply {
    Hello(ServerHello),
    Alert { level: u8, description: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloError {
    /// A length field points past the end of its container
    Truncated(&'static str),
    /// The server sent something other than a ServerHello or alert
    Unexpected(String),
}

impl fmt::Display for HelloError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelloError::Truncated(field) => write!(f, "truncated {}", field),
            HelloError::Unexpected(what) => write!(f, "unexpected {}", what),
        }
    }
}

impl std::error::Error for HelloError {}

/// Reads the server's first flight. `Ok(None)` means more bytes are needed.
pub fn parse_server_reply(buf: &[u8]) -> Result<Option<ServerReply>, HelloError> {
    let mut records = buf;
    let mut handshake = BytesMut::new();

    while records.len() >= 5 {
        let content_type = records[0];
        let length = u16::from_be_bytes([records[3], records[4]]) as usize;
        if records.len() < 5 + length {
            return Ok(None);
        }
        let fragment = &records[5..5 + length];
        records = &records[5 + length..];

        match content_type {
            RECORD_ALERT if handshake.is_empty() => {
                if fragment.len() < 2 {
                    return Err(HelloError::Truncated("alert"));
                }
                return Ok(Some(ServerReply::Alert {
                    level: fragment[0],
                    description: fragment[1],
                }));
            }
            RECORD_HANDSHAKE => handshake.extend_from_slice(fragment),
            other => {
                return Err(HelloError::Unexpected(format!("record type {}", other)));
            }
        }

        if handshake.len() >= 4 {
            let msg_type = handshake[0];
            let msg_len = ((handshake[1] as usize) << 16)
                | ((handshake[2] as usize) << 8)
                | handshake[3] as usize;
            if msg_type != HANDSHAKE_SERVER_HELLO {
                return Err(HelloError::Unexpected(format!("handshake type {}", msg_type)));
            }
            if handshake.len() >= 4 + msg_len {
                let hello = parse_server_hello(&handshake[4..4 + msg_len])?;
                return Ok(Some(ServerReply::Hello(hello)));
            }
        }
    }

    Ok(None)
}

fn parse_server_hello(mut body: &[u8]) -> Result<ServerHello, HelloError> {
    need(&body, 2 + 32 + 1, "server hello")?;
    let mut version = body.get_u16();
    body.advance(32);

    let session_id_len = body.get_u8() as usize;
    need(&body, session_id_len + 2 + 1, "session id")?;
    body.advance(session_id_len);
    let cipher_suite = body.get_u16();
    body.advance(1); // compression

    if body.remaining() >= 2 {
        let ext_len = body.get_u16() as usize;
        need(&body, ext_len, "extensions")?;
        let mut extensions = &body[..ext_len];
        while extensions.remaining() >= 4 {
            let ext_type = extensions.get_u16();
            let len = extensions.get_u16() as usize;
            need(&extensions, len, "extension")?;
            if ext_type == EXT_SUPPORTED_VERSIONS && len == 2 {
                version = u16::from_be_bytes([extensions[0], extensions[1]]);
            }
            extensions.advance(len);
        }
    }

    Ok(ServerHello {
        version,
        cipher_suite,
    })
}

fn need(buf: &[u8], len: usize, field: &'static str) -> Result<(), HelloError> {
    if buf.remaining() < len {
        return Err(HelloError::Truncated(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_hello_record(version: u16, suite: u16, selected: Option<u16>) -> Vec<u8> {
        let mut body = BytesMut::new();
        body.put_u16(version);
        body.put_slice(&[7u8; 32]);
        body.put_u8(0);
        body.put_u16(suite);
        body.put_u8(0);
        if let Some(selected) = selected {
            body.put_u16(6);
            body.put_u16(EXT_SUPPORTED_VERSIONS);
            body.put_u16(2);
            body.put_u16(selected);
        }

        let mut record = BytesMut::new();
        record.put_u8(RECORD_HANDSHAKE);
        record.put_u16(version);
        record.put_u16((body.len() + 4) as u16);
        record.put_u8(HANDSHAKE_SERVER_HELLO);
        put_u24(&mut record, body.len());
        record.put_slice(&body);
        record.to_vec()
    }

    #[test]
    fn test_client_hello_layout() {
        let spec = ClientHelloSpec {
            versions: &[TLS10],
            cipher_suites: &WEAK_SUITES,
            server_name: Some("api.example.com"),
            random: [1; 32],
            x25519_share: [2; 32],
        };
        let record = spec.encode();

        assert_eq!(record[0], RECORD_HANDSHAKE);
        assert_eq!(u16::from_be_bytes([record[3], record[4]]) as usize, record.len() - 5);
        assert_eq!(record[5], HANDSHAKE_CLIENT_HELLO);
        // legacy_version follows the 4 byte handshake header
        assert_eq!(u16::from_be_bytes([record[9], record[10]]), TLS10);
        // the supported_versions extension is last: type, len, list len, one version
        assert_eq!(&record[record.len() - 7..], &[0x00, 0x2b, 0x00, 0x03, 0x02, 0x03, 0x01]);
    }

    #[test]
    fn test_client_hello_caps_legacy_version_for_tls13() {
        let spec = ClientHelloSpec {
            versions: &[TLS13, TLS12],
            cipher_suites: &ALL_SUITES,
            server_name: None,
            random: [0; 32],
            x25519_share: [0; 32],
        };
        let record = spec.encode();
        assert_eq!(u16::from_be_bytes([record[9], record[10]]), TLS12);
    }

    #[test]
    fn test_parse_plain_server_hello() {
        let record = server_hello_record(TLS10, suites::TLS_RSA_WITH_RC4_128_SHA, None);
        let reply = parse_server_reply(&record).unwrap();
        assert_eq!(
            reply,
            Some(ServerReply::Hello(ServerHello {
                version: TLS10,
                cipher_suite: suites::TLS_RSA_WITH_RC4_128_SHA,
            }))
        );
    }

    #[test]
    fn test_parse_tls13_selected_version() {
        let record = server_hello_record(TLS12, suites::TLS_AES_128_GCM_SHA256, Some(TLS13));
        match parse_server_reply(&record).unwrap() {
            Some(ServerReply::Hello(hello)) => assert_eq!(hello.version, TLS13),
            other => panic!("expected hello, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_reply_needs_more_bytes() {
        let record = server_hello_record(TLS12, suites::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256, None);
        assert_eq!(parse_server_reply(&record[..record.len() - 3]).unwrap(), None);
        assert_eq!(parse_server_reply(&record[..3]).unwrap(), None);
    }

    #[test]
    fn test_parse_alert() {
        let alert = [RECORD_ALERT, 0x03, 0x01, 0x00, 0x02, 0x02, 0x28];
        assert_eq!(
            parse_server_reply(&alert).unwrap(),
            Some(ServerReply::Alert {
                level: 2,
                description: 40
            })
        );
    }

    #[test]
    fn test_weak_suite_names() {
        for suite in WEAK_SUITES {
            assert!(weak_suite_name(suite).is_some());
            assert!(ALL_SUITES.contains(&suite));
        }
        assert_eq!(weak_suite_name(suites::TLS_AES_128_GCM_SHA256), None);
    }
}
