// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for buffer construction.

/// Errors that can occur while building a buffer.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    /// The underlying resource failed.
    #[error("memory error: {0}")]
    Memory(#[from] mem_resource::MemoryError),

    /// A jagged construction was given mismatched input vectors.
    #[error("length mismatch: {sizes} sizes against {capacities} capacities")]
    LengthMismatch { sizes: usize, capacities: usize },

    /// An initial size does not fit its capacity.
    #[error("initial size {size} exceeds capacity {capacity}")]
    SizeExceedsCapacity { size: u32, capacity: u32 },
}
