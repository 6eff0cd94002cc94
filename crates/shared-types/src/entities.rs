//! # Core Domain Entities
//!
//! Defines the entities that flow through the message relay.
//!
//! ## Clusters
//!
//! - **Messages**: `Cid`, `SignedMessage`, `MessageBatch`
//! - **Nodes**: `NodeId`, `NodeDescriptor`
//! - **Records**: `MessageRecord`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// CLUSTER A: MESSAGES
// =============================================================================

/// A 20-byte sender address.
pub type Address = [u8; 20];

/// Content identifier of a message: SHA-256 over its canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cid(pub [u8; 32]);

/// Errors from parsing a hex-encoded [`Cid`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CidParseError {
    #[error("invalid hex in cid: {0}")]
    InvalidHex(String),

    #[error("cid must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl Cid {
    /// Hash arbitrary bytes into a content identifier.
    #[must_use]
    pub fn digest(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "Cid({})", &hex::encode(self.0)[..12])
    }
}

impl FromStr for Cid {
    type Err = CidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| CidParseError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CidParseError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Wire shape of a signed message, used for (de)serialization only.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignedMessageFields {
    from: Address,
    nonce: u64,
    #[serde(with = "hex_bytes")]
    payload: Vec<u8>,
    #[serde(with = "hex_bytes")]
    signature: Vec<u8>,
}

/// A signed message ready for broadcast.
///
/// Immutable once built. The canonical encoding and the CID are computed
/// at construction, so every publisher stage sees the same identity and
/// forwards the same bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SignedMessageFields", into = "SignedMessageFields")]
pub struct SignedMessage {
    from: Address,
    nonce: u64,
    payload: Vec<u8>,
    signature: Vec<u8>,
    serialized: Vec<u8>,
    cid: Cid,
}

impl SignedMessage {
    /// Build a message and derive its encoding and CID.
    #[must_use]
    pub fn new(from: Address, nonce: u64, payload: Vec<u8>, signature: Vec<u8>) -> Self {
        let serialized = encode(&from, nonce, &payload, &signature);
        let cid = Cid::digest(&serialized);
        Self {
            from,
            nonce,
            payload,
            signature,
            serialized,
            cid,
        }
    }

    #[must_use]
    pub fn cid(&self) -> Cid {
        self.cid
    }

    #[must_use]
    pub fn from(&self) -> &Address {
        &self.from
    }

    #[must_use]
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Canonical encoding forwarded unchanged to transports.
    #[must_use]
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }
}

impl fmt::Debug for SignedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedMessage")
            .field("cid", &self.cid)
            .field("from", &hex::encode(self.from))
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

impl From<SignedMessageFields> for SignedMessage {
    fn from(f: SignedMessageFields) -> Self {
        Self::new(f.from, f.nonce, f.payload, f.signature)
    }
}

impl From<SignedMessage> for SignedMessageFields {
    fn from(m: SignedMessage) -> Self {
        Self {
            from: m.from,
            nonce: m.nonce,
            payload: m.payload,
            signature: m.signature,
        }
    }
}

/// Canonical encoding: `from | nonce_le | len_le | payload | len_le | signature`.
///
/// Lengths are 64-bit so every field size is representable and the
/// encoding stays unambiguous.
fn encode(from: &Address, nonce: u64, payload: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(20 + 8 + 8 + payload.len() + 8 + signature.len());
    out.extend_from_slice(from);
    out.extend_from_slice(&nonce.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&(signature.len() as u64).to_le_bytes());
    out.extend_from_slice(signature);
    out
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

/// An ordered group of messages submitted to a publisher in one call.
///
/// Shared immutably between pipeline stages; a stage that narrows a batch
/// builds a new one.
pub type MessageBatch = Arc<[SignedMessage]>;

// =============================================================================
// CLUSTER B: NODES
// =============================================================================

/// Stable identifier of a downstream node in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct NodeId(pub String);

impl NodeId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Connection descriptor of one downstream consensus node.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// RPC endpoint.
    pub url: String,
    /// Bearer token for the RPC endpoint.
    pub token: String,
}

impl NodeDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            id: NodeId(id.into()),
            name: name.into(),
            url: url.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// CLUSTER C: RECORDS
// =============================================================================

/// Stored record of a message, as kept by the message store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MessageRecord {
    /// Store-assigned record identifier.
    pub id: String,
    pub cid: Cid,
    /// Last persistent delivery failure; empty when none was recorded.
    pub error_msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(nonce: u64) -> SignedMessage {
        SignedMessage::new([7u8; 20], nonce, vec![1, 2, 3], vec![9; 65])
    }

    #[test]
    fn test_cid_is_deterministic() {
        assert_eq!(msg(1).cid(), msg(1).cid());
        assert_ne!(msg(1).cid(), msg(2).cid());
    }

    #[test]
    fn test_cid_covers_signature() {
        let a = SignedMessage::new([7u8; 20], 1, vec![1], vec![1]);
        let b = SignedMessage::new([7u8; 20], 1, vec![1], vec![2]);
        assert_ne!(a.cid(), b.cid());
    }

    #[test]
    fn test_encoding_carries_full_width_lengths() {
        let m = SignedMessage::new([7u8; 20], 1, vec![0xaa; 3], vec![0xbb; 2]);
        let bytes = m.serialized();

        assert_eq!(bytes.len(), 20 + 8 + 8 + 3 + 8 + 2);
        assert_eq!(&bytes[28..36], &3u64.to_le_bytes());
        assert_eq!(&bytes[39..47], &2u64.to_le_bytes());
    }

    #[test]
    fn test_field_boundary_changes_cid() {
        let a = SignedMessage::new([7u8; 20], 1, vec![1, 2], vec![3]);
        let b = SignedMessage::new([7u8; 20], 1, vec![1], vec![2, 3]);
        assert_ne!(a.cid(), b.cid());
    }

    #[test]
    fn test_cid_hex_parse() {
        let cid = msg(3).cid();
        let parsed: Cid = cid.to_string().parse().unwrap();
        assert_eq!(parsed, cid);

        assert!(matches!(
            "abcd".parse::<Cid>(),
            Err(CidParseError::InvalidLength(2))
        ));
        assert!(matches!(
            "zz".parse::<Cid>(),
            Err(CidParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_json_keeps_identity() {
        let m = msg(5);
        let json = serde_json::to_string(&m).unwrap();
        let back: SignedMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cid(), m.cid());
        assert_eq!(back.serialized(), m.serialized());
    }

    #[test]
    fn test_descriptor_debug_redacts_token() {
        let node = NodeDescriptor::new("a", "node-a", "http://a:1234", "secret");
        let rendered = format!("{node:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("node-a"));
    }
}
