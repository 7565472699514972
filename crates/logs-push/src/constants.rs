// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Number of entries accumulated in the multi-entry window before it is
/// encoded and rendered as one batch.
pub const EVENT_BATCH_SIZE: usize = 3;

/// Byte budget for the batches built by the debug sink. Large enough that
/// `Batch::add` never has to reject anything on this path.
pub const DEBUG_BATCH_MAX_BYTES: usize = 999_999;

/// Default zstd level used by the push request encoder.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Separator printed after every rendered entry.
pub(crate) const ENTRY_SEPARATOR: &str = "----------------------------\n";

/// Separator printed between configured clients.
pub(crate) const CLIENT_SEPARATOR: &str = "----------------------\n";
