// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cache tier for collected block structures.
//!
//! Structures are stored as CBOR blobs (via `ciborium`) wrapped in a small
//! envelope carrying a format version and the root they were built for.
//! Every blob is recorded with its BLAKE3 content digest; a blob whose bytes
//! no longer match their digest, or that fails to decode, is a cache miss.
//!
//! [`MemoryStructureStore`] implements [`course_blocks::StructureCache`] for
//! a single process.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

mod memory;
pub use memory::MemoryStructureStore;

use course_blocks::{BlockStructure, UsageKey};
use serde::{Deserialize, Serialize};

/// Envelope format written by [`encode_structure`].
pub const STRUCTURE_FORMAT_VERSION: u32 = 1;

/// A 32-byte BLAKE3 content digest of an encoded structure.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlobHash(pub [u8; 32]);

impl BlobHash {
    /// View the digest as bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for BlobHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Content digest of an encoded structure: `BLAKE3(bytes)`, no domain prefix.
pub fn structure_digest(bytes: &[u8]) -> BlobHash {
    BlobHash(*blake3::hash(bytes).as_bytes())
}

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),
    /// The bytes are not a valid structure envelope.
    #[error("decode failed: {0}")]
    Decode(String),
    /// The envelope was written by an incompatible format.
    #[error("unsupported structure format {found} (expected {expected})")]
    UnsupportedFormat {
        /// Format found in the blob.
        found: u32,
        /// Format this build writes.
        expected: u32,
    },
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format: u32,
    root: &'a UsageKey,
    structure: &'a BlockStructure,
}

#[derive(Deserialize)]
struct Envelope {
    format: u32,
    root: UsageKey,
    structure: BlockStructure,
}

/// Serializes `structure` into a CBOR envelope.
///
/// # Errors
/// [`CodecError::Encode`] if serialization fails.
pub fn encode_structure(structure: &BlockStructure) -> Result<Vec<u8>, CodecError> {
    let envelope = EnvelopeRef {
        format: STRUCTURE_FORMAT_VERSION,
        root: structure.root(),
        structure,
    };
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&envelope, &mut bytes)
        .map_err(|err| CodecError::Encode(err.to_string()))?;
    Ok(bytes)
}

/// Deserializes a structure written by [`encode_structure`].
///
/// # Errors
/// [`CodecError::Decode`] for malformed bytes, an envelope whose root
/// disagrees with its structure, or a graph whose relations do not line up
/// (see [`BlockStructure::relations_consistent`]);
/// [`CodecError::UnsupportedFormat`] for a foreign format version.
pub fn decode_structure(bytes: &[u8]) -> Result<BlockStructure, CodecError> {
    let envelope: Envelope =
        ciborium::de::from_reader(bytes).map_err(|err| CodecError::Decode(err.to_string()))?;
    if envelope.format != STRUCTURE_FORMAT_VERSION {
        return Err(CodecError::UnsupportedFormat {
            found: envelope.format,
            expected: STRUCTURE_FORMAT_VERSION,
        });
    }
    if envelope.structure.root() != &envelope.root {
        return Err(CodecError::Decode(format!(
            "envelope root {} does not match structure root {}",
            envelope.root,
            envelope.structure.root()
        )));
    }
    if !envelope.structure.relations_consistent() {
        return Err(CodecError::Decode(format!(
            "structure under {} has inconsistent relations",
            envelope.root
        )));
    }
    Ok(envelope.structure)
}
