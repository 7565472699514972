// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Push request encoding.
//!
//! Entries are grouped into streams by their canonical label string, the
//! streams are serialized as a protobuf push request and the result is
//! compressed with zstd. This is the payload the HTTP transport would post;
//! the debug sink only base64s it for display.
//!
//! The frame is zstd, not snappy, so a displayed payload cannot be replayed
//! as-is against a `/loki/api/v1/push` endpoint, which expects snappy. Decode
//! it with `zstd -d` before re-compressing for such an endpoint.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use fnv::FnvHasher;
use prost::Message;
use std::hash::Hasher;
use tracing::trace;
use zstd::zstd_safe::CompressionLevel;

use crate::constants::DEFAULT_COMPRESSION_LEVEL;
use crate::entry::{Entry, LabelSet};
use crate::errors::EncodeError;

/// Turns an ordered list of entries into a wire payload.
///
/// Implementations must be deterministic for identical input and must not
/// panic on bad input: report it as an [`EncodeError`].
pub trait Encoder: Send + Sync {
    fn encode(&self, entries: &[Entry]) -> Result<Vec<u8>, EncodeError>;
}

#[derive(Clone, PartialEq, Message)]
pub struct PushRequest {
    #[prost(message, repeated, tag = "1")]
    pub streams: Vec<StreamProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct StreamProto {
    #[prost(string, tag = "1")]
    pub labels: String,
    #[prost(message, repeated, tag = "2")]
    pub entries: Vec<EntryProto>,
    #[prost(uint64, tag = "3")]
    pub hash: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct EntryProto {
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<TimestampProto>,
    #[prost(string, tag = "2")]
    pub line: String,
    #[prost(message, repeated, tag = "3")]
    pub structured_metadata: Vec<LabelPairProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LabelPairProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimestampProto {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// Output of a successful batch encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub payload: Vec<u8>,
    /// Number of entries the payload carries.
    pub entries: usize,
}

impl EncodedBatch {
    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Standard, padded base64 of the payload.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.payload)
    }
}

/// Default encoder: protobuf push request compressed with zstd.
#[derive(Debug, Clone)]
pub struct PushRequestEncoder {
    compression_level: CompressionLevel,
}

impl Default for PushRequestEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl PushRequestEncoder {
    #[must_use]
    pub fn new(compression_level: CompressionLevel) -> Self {
        Self { compression_level }
    }

    /// Builds the uncompressed request. Streams keep the order in which their
    /// label set was first seen so the output does not depend on hashing.
    pub fn push_request(entries: &[Entry]) -> Result<PushRequest, EncodeError> {
        let mut streams: Vec<StreamProto> = Vec::new();
        for entry in entries {
            validate_label_names(entry.labels())?;
            validate_label_names(entry.structured_metadata())?;

            let labels = entry.labels().to_string();
            let idx = match streams.iter().position(|s| s.labels == labels) {
                Some(idx) => idx,
                None => {
                    streams.push(StreamProto {
                        hash: stream_hash(&labels),
                        labels,
                        entries: Vec::new(),
                    });
                    streams.len() - 1
                }
            };
            streams[idx].entries.push(entry_proto(entry));
        }
        Ok(PushRequest { streams })
    }
}

impl Encoder for PushRequestEncoder {
    fn encode(&self, entries: &[Entry]) -> Result<Vec<u8>, EncodeError> {
        let request = Self::push_request(entries)?;
        let mut buf = Vec::with_capacity(request.encoded_len());
        request.encode(&mut buf)?;
        let compressed = zstd::bulk::compress(&buf, self.compression_level)?;
        trace!(
            "Encoded {} streams: {} bytes, {} compressed",
            request.streams.len(),
            buf.len(),
            compressed.len()
        );
        Ok(compressed)
    }
}

fn entry_proto(entry: &Entry) -> EntryProto {
    let ts = entry.timestamp();
    // Below 2e9 even during a leap second.
    let nanos = i32::try_from(ts.timestamp_subsec_nanos()).unwrap_or(i32::MAX);
    EntryProto {
        timestamp: Some(TimestampProto {
            seconds: ts.timestamp(),
            nanos,
        }),
        line: entry.line().to_string(),
        structured_metadata: entry
            .structured_metadata()
            .iter()
            .map(|(name, value)| LabelPairProto {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}

fn stream_hash(labels: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(labels.as_bytes());
    hasher.finish()
}

fn validate_label_names(labels: &LabelSet) -> Result<(), EncodeError> {
    for (name, _) in labels.iter() {
        if !is_valid_label_name(name) {
            return Err(EncodeError::InvalidLabelName {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`
fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
