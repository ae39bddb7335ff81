// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Jagged buffer: an outer array of views over one shared payload arena.
//!
//! The outer array holds one [`VectorView`] record per inner vector; the
//! inner arena holds every vector's payload back to back, in index order,
//! with no padding between slices. When a separate host-access resource is
//! supplied the outer array exists twice — one copy on the primary
//! (device-visible) resource and one on the host-visible resource — and
//! the records are written into the host copy, then mirrored into the
//! device copy bitwise.

use crate::{BufferError, JaggedVectorView, VectorView};
use mem_resource::{align_up, MemoryError, MemoryResource, UniqueAlloc};
use std::mem;

/// Owning counterpart of [`JaggedVectorView`]: `N` inner vectors backed by
/// one shared payload arena.
///
/// Two shapes exist, as for [`VectorBuffer`](crate::VectorBuffer):
///
/// - **Fixed** ([`new`](JaggedVectorBuffer::new)): capacities equal sizes
///   and there is no size-header array.
/// - **Resizable** ([`with_capacities`](JaggedVectorBuffer::with_capacities)):
///   the inner arena starts with a `u32` size-header array of `N` entries
///   (initialised from `sizes`), followed by the payload of
///   `Σ capacities` elements in the aligned multi-placement layout.
///
/// # Example
/// ```
/// use device_buffer::JaggedVectorBuffer;
/// use mem_resource::HostMemoryResource;
///
/// let resource = HostMemoryResource;
/// let buffer =
///     JaggedVectorBuffer::<f32>::new(&[3, 0, 2], &resource, None).unwrap();
/// assert_eq!(buffer.len(), 3);
/// assert_eq!(buffer.host_ptr(), buffer.device_ptr());
/// ```
pub struct JaggedVectorBuffer<'r, T: Copy> {
    len: usize,
    device_ptr: *mut VectorView<T>,
    host_ptr: *mut VectorView<T>,
    _outer: UniqueAlloc<'r>,
    _host_outer: Option<UniqueAlloc<'r>>,
    _inner: UniqueAlloc<'r>,
}

impl<'r, T: Copy> JaggedVectorBuffer<'r, T> {
    /// Fixed-shape buffer: one inner vector of `sizes[i]` elements per
    /// entry, capacities equal to sizes.
    pub fn new(
        sizes: &[usize],
        resource: &'r dyn MemoryResource,
        host_access: Option<&'r dyn MemoryResource>,
    ) -> Result<Self, BufferError> {
        Self::build(sizes, sizes, false, resource, host_access)
    }

    /// Resizable-shape buffer: every inner vector starts at `sizes[i]` live
    /// elements with room for `capacities[i]`.
    pub fn with_capacities(
        sizes: &[usize],
        capacities: &[usize],
        resource: &'r dyn MemoryResource,
        host_access: Option<&'r dyn MemoryResource>,
    ) -> Result<Self, BufferError> {
        if sizes.len() != capacities.len() {
            return Err(BufferError::LengthMismatch {
                sizes: sizes.len(),
                capacities: capacities.len(),
            });
        }
        for (&size, &capacity) in sizes.iter().zip(capacities) {
            if size > capacity {
                return Err(BufferError::SizeExceedsCapacity {
                    size: size as u32,
                    capacity: capacity as u32,
                });
            }
        }
        Self::build(sizes, capacities, true, resource, host_access)
    }

    fn build(
        sizes: &[usize],
        capacities: &[usize],
        resizable: bool,
        resource: &'r dyn MemoryResource,
        host_access: Option<&'r dyn MemoryResource>,
    ) -> Result<Self, BufferError> {
        let len = sizes.len();
        let total_elements: usize = capacities.iter().sum();

        // Outer array of view records on the primary resource, duplicated
        // on the host-access resource when one is given.
        let outer = UniqueAlloc::for_type::<VectorView<T>>(resource, len)?;
        let host_outer = match host_access {
            Some(host) => Some(UniqueAlloc::for_type::<VectorView<T>>(host, len)?),
            None => None,
        };

        // Inner payload arena. The resizable shape prepends a size-header
        // array inside the same allocation (aligned multi-placement).
        let header_bytes = if resizable {
            len * mem::size_of::<u32>()
        } else {
            0
        };
        let payload_offset = align_up(header_bytes, mem::align_of::<T>());
        let payload_bytes = total_elements
            .checked_mul(mem::size_of::<T>())
            .ok_or(MemoryError::UnsupportedSize {
                requested_bytes: usize::MAX,
            })?;
        let inner_alignment = mem::align_of::<T>().max(mem::align_of::<u32>());
        let inner = UniqueAlloc::new(resource, payload_offset + payload_bytes, inner_alignment)?;

        let header_base = inner.as_ptr().cast::<u32>();
        let payload_base = unsafe { inner.as_ptr().add(payload_offset) }.cast::<T>();

        let device_ptr = outer.as_ptr().cast::<VectorView<T>>();
        let host_ptr = host_outer
            .as_ref()
            .map_or(device_ptr, |alloc| alloc.as_ptr().cast::<VectorView<T>>());

        // Lay the views over consecutive slices of the arena, writing the
        // records into the host-visible outer array.
        let mut offset = 0usize;
        for i in 0..len {
            let size_ptr = if resizable {
                let entry = unsafe { header_base.add(i) };
                unsafe { entry.write(sizes[i] as u32) };
                entry
            } else {
                std::ptr::null_mut()
            };
            let view = VectorView::new(capacities[i] as u32, size_ptr, unsafe {
                payload_base.add(offset)
            });
            unsafe { host_ptr.add(i).write(view) };
            offset += capacities[i];
        }

        // With a separate host-access resource, the device copy of the
        // outer array receives the same records bitwise.
        if host_outer.is_some() && len > 0 {
            unsafe { std::ptr::copy_nonoverlapping(host_ptr, device_ptr, len) };
        }

        tracing::debug!(
            "created jagged buffer with {} views over {} elements",
            len,
            total_elements
        );
        Ok(Self {
            len,
            device_ptr,
            host_ptr,
            _outer: outer,
            _host_outer: host_outer,
            _inner: inner,
        })
    }

    /// Number of inner vectors.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no inner vectors.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The device-visible outer array.
    pub fn device_ptr(&self) -> *mut VectorView<T> {
        self.device_ptr
    }

    /// The host-visible outer array. Without a host-access resource this is
    /// the same array as [`device_ptr`](JaggedVectorBuffer::device_ptr).
    pub fn host_ptr(&self) -> *mut VectorView<T> {
        self.host_ptr
    }

    /// The host-visible view records as a slice.
    pub fn host_views(&self) -> &[VectorView<T>] {
        if self.len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.host_ptr, self.len) }
        }
    }

    /// A non-owning view over the device-visible outer array.
    ///
    /// The view stays valid only as long as the buffer is alive.
    pub fn view(&self) -> JaggedVectorView<T> {
        JaggedVectorView::new(self.len, self.device_ptr)
    }
}
