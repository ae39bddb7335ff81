// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Flat buffer: one allocation, an optional size header, and a payload.

use crate::{BufferError, VectorView};
use mem_resource::{align_up, MemoryResource, UniqueAlloc};
use std::mem;

/// Owning counterpart of [`VectorView`]: a single allocation from a
/// memory resource holding `capacity` elements of `T`.
///
/// Two shapes exist:
///
/// - **Fixed** ([`new`](VectorBuffer::new)): exactly `capacity` elements,
///   no header; the size always equals the capacity.
/// - **Resizable** ([`with_capacity_and_size`](VectorBuffer::with_capacity_and_size)):
///   a `u32` size header followed by the payload in one contiguous
///   allocation, laid out so the payload is properly aligned right after
///   the header (aligned multi-placement). The header is initialised at
///   construction.
///
/// The allocation is released when the buffer is dropped.
///
/// # Example
/// ```
/// use device_buffer::VectorBuffer;
/// use mem_resource::HostMemoryResource;
///
/// let resource = HostMemoryResource;
/// let buffer = VectorBuffer::<i32>::with_capacity_and_size(100, 0, &resource).unwrap();
/// assert_eq!(buffer.capacity(), 100);
/// assert_eq!(buffer.size(), 0);
/// ```
pub struct VectorBuffer<'r, T: Copy> {
    capacity: u32,
    size_ptr: *mut u32,
    ptr: *mut T,
    _alloc: UniqueAlloc<'r>,
}

impl<'r, T: Copy> VectorBuffer<'r, T> {
    /// Fixed-size buffer of `capacity` elements of `T`.
    pub fn new(capacity: u32, resource: &'r dyn MemoryResource) -> Result<Self, BufferError> {
        let alloc = UniqueAlloc::for_type::<T>(resource, capacity as usize)?;
        tracing::debug!("created fixed vector buffer of {} elements", capacity);
        Ok(Self {
            capacity,
            size_ptr: std::ptr::null_mut(),
            ptr: alloc.as_ptr().cast(),
            _alloc: alloc,
        })
    }

    /// Resizable buffer: a size header and `capacity` elements of payload
    /// in one aligned multi-placement allocation. The header starts out as
    /// `initial_size`.
    pub fn with_capacity_and_size(
        capacity: u32,
        initial_size: u32,
        resource: &'r dyn MemoryResource,
    ) -> Result<Self, BufferError> {
        if initial_size > capacity {
            return Err(BufferError::SizeExceedsCapacity {
                size: initial_size,
                capacity,
            });
        }
        let payload_offset = align_up(mem::size_of::<u32>(), mem::align_of::<T>());
        let total_bytes = payload_offset + capacity as usize * mem::size_of::<T>();
        let alignment = mem::align_of::<T>().max(mem::align_of::<u32>());
        let alloc = UniqueAlloc::new(resource, total_bytes, alignment)?;

        let size_ptr = alloc.as_ptr().cast::<u32>();
        let ptr = unsafe { alloc.as_ptr().add(payload_offset) }.cast::<T>();
        unsafe { size_ptr.write(initial_size) };

        tracing::debug!(
            "created resizable vector buffer of {} elements ({} live)",
            capacity,
            initial_size
        );
        Ok(Self {
            capacity,
            size_ptr,
            ptr,
            _alloc: alloc,
        })
    }

    /// Maximum number of elements the buffer can hold.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Current number of live elements. For a fixed buffer this equals the
    /// capacity; for a resizable buffer the size header is consulted.
    pub fn size(&self) -> u32 {
        if self.size_ptr.is_null() {
            self.capacity
        } else {
            unsafe { *self.size_ptr }
        }
    }

    /// Whether this buffer carries a size header.
    pub fn is_resizable(&self) -> bool {
        !self.size_ptr.is_null()
    }

    /// Base pointer of the payload.
    pub fn ptr(&self) -> *mut T {
        self.ptr
    }

    /// A non-owning view over this buffer's memory.
    ///
    /// The view stays valid only as long as the buffer is alive.
    pub fn view(&self) -> VectorView<T> {
        VectorView::new(self.capacity, self.size_ptr, self.ptr)
    }
}
