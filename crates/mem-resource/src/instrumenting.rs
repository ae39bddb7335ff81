// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Instrumenting passthrough resource.
//!
//! Wraps any other resource, forwarding every call unchanged while
//! recording a timed event per call and firing user-supplied hooks. The
//! event log is append-only and preserves call order, which makes it the
//! ground truth for allocation profiling and for tests that assert on a
//! resource's traffic.

use crate::{MemoryError, MemoryResource};
use std::fmt;
use std::ptr::NonNull;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// What kind of call produced a [`MemoryEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EventKind {
    Allocation,
    Deallocation,
}

/// One timed allocation or deallocation observed by an
/// [`InstrumentingMemoryResource`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryEvent {
    pub kind: EventKind,
    pub size_bytes: usize,
    pub alignment: usize,
    /// Address handed out (or released). Zero for a failed allocation.
    pub addr: usize,
    /// Wall-clock time the upstream call took.
    pub elapsed_ns: u64,
}

type PreAllocateHook = Box<dyn Fn(usize, usize)>;
type PostAllocateHook = Box<dyn Fn(usize, usize, Option<NonNull<u8>>)>;
type PreDeallocateHook = Box<dyn Fn(NonNull<u8>, usize, usize)>;

/// Transparent wrapper recording timed allocation events and invoking
/// user hooks around each upstream call.
///
/// Hooks are registered before the resource is shared and fire in
/// insertion order. A failed upstream allocation still produces an event
/// (with a zero address) and still reaches the post-allocate hooks before
/// the error is surfaced to the caller.
///
/// # Example
/// ```
/// use mem_resource::{HostMemoryResource, InstrumentingMemoryResource, MemoryResource};
///
/// let host = HostMemoryResource;
/// let instr = InstrumentingMemoryResource::new(&host);
/// let ptr = instr.allocate(128, 8).unwrap();
/// unsafe { instr.deallocate(ptr, 128, 8) };
/// assert_eq!(instr.event_count(), 2);
/// ```
pub struct InstrumentingMemoryResource<'u> {
    upstream: &'u dyn MemoryResource,
    events: Mutex<Vec<MemoryEvent>>,
    pre_allocate_hooks: Vec<PreAllocateHook>,
    post_allocate_hooks: Vec<PostAllocateHook>,
    pre_deallocate_hooks: Vec<PreDeallocateHook>,
}

impl<'u> InstrumentingMemoryResource<'u> {
    /// Creates a wrapper around `upstream` with an empty event log and no
    /// hooks.
    pub fn new(upstream: &'u dyn MemoryResource) -> Self {
        Self {
            upstream,
            events: Mutex::new(Vec::new()),
            pre_allocate_hooks: Vec::new(),
            post_allocate_hooks: Vec::new(),
            pre_deallocate_hooks: Vec::new(),
        }
    }

    /// Registers a hook fired before every allocation with
    /// `(size_bytes, alignment)`.
    pub fn add_pre_allocate_hook(&mut self, hook: impl Fn(usize, usize) + 'static) {
        self.pre_allocate_hooks.push(Box::new(hook));
    }

    /// Registers a hook fired after every allocation with
    /// `(size_bytes, alignment, ptr)`; `ptr` is `None` when the upstream
    /// failed.
    pub fn add_post_allocate_hook(
        &mut self,
        hook: impl Fn(usize, usize, Option<NonNull<u8>>) + 'static,
    ) {
        self.post_allocate_hooks.push(Box::new(hook));
    }

    /// Registers a hook fired before every deallocation with
    /// `(ptr, size_bytes, alignment)`.
    pub fn add_pre_deallocate_hook(
        &mut self,
        hook: impl Fn(NonNull<u8>, usize, usize) + 'static,
    ) {
        self.pre_deallocate_hooks.push(Box::new(hook));
    }

    /// Snapshot of all events recorded so far, in call order.
    pub fn events(&self) -> Vec<MemoryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events recorded so far.
    pub fn event_count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn record(&self, event: MemoryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl MemoryResource for InstrumentingMemoryResource<'_> {
    fn allocate(
        &self,
        size_bytes: usize,
        alignment: usize,
    ) -> Result<NonNull<u8>, MemoryError> {
        for hook in &self.pre_allocate_hooks {
            hook(size_bytes, alignment);
        }

        let start = Instant::now();
        // A failed upstream allocation is held back until the bookkeeping
        // below has completed, so the event log never misses a call.
        let outcome = self.upstream.allocate(size_bytes, alignment);
        let elapsed_ns = start.elapsed().as_nanos() as u64;

        let ptr = outcome.as_ref().ok().copied();
        self.record(MemoryEvent {
            kind: EventKind::Allocation,
            size_bytes,
            alignment,
            addr: ptr.map_or(0, |p| p.as_ptr() as usize),
            elapsed_ns,
        });

        for hook in &self.post_allocate_hooks {
            hook(size_bytes, alignment, ptr);
        }

        outcome
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size_bytes: usize, alignment: usize) {
        for hook in &self.pre_deallocate_hooks {
            hook(ptr, size_bytes, alignment);
        }

        let start = Instant::now();
        unsafe { self.upstream.deallocate(ptr, size_bytes, alignment) };
        let elapsed_ns = start.elapsed().as_nanos() as u64;

        self.record(MemoryEvent {
            kind: EventKind::Deallocation,
            size_bytes,
            alignment,
            addr: ptr.as_ptr() as usize,
            elapsed_ns,
        });
    }
}

impl fmt::Debug for InstrumentingMemoryResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentingMemoryResource")
            .field("event_count", &self.event_count())
            .field("pre_allocate_hooks", &self.pre_allocate_hooks.len())
            .field("post_allocate_hooks", &self.post_allocate_hooks.len())
            .field("pre_deallocate_hooks", &self.pre_deallocate_hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostMemoryResource;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Failing;
    impl MemoryResource for Failing {
        fn allocate(
            &self,
            size_bytes: usize,
            alignment: usize,
        ) -> Result<NonNull<u8>, MemoryError> {
            Err(MemoryError::OutOfMemory {
                requested_bytes: size_bytes,
                alignment,
            })
        }
        unsafe fn deallocate(&self, _p: NonNull<u8>, _s: usize, _a: usize) {}
    }

    #[test]
    fn test_one_event_per_call() {
        let host = HostMemoryResource;
        let instr = InstrumentingMemoryResource::new(&host);

        let ptr = instr.allocate(512, 32).unwrap();
        unsafe { instr.deallocate(ptr, 512, 32) };

        let events = instr.events();
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].kind, EventKind::Allocation);
        assert_eq!(events[0].size_bytes, 512);
        assert_eq!(events[0].alignment, 32);
        assert_eq!(events[0].addr, ptr.as_ptr() as usize);

        assert_eq!(events[1].kind, EventKind::Deallocation);
        assert_eq!(events[1].size_bytes, 512);
        assert_eq!(events[1].addr, ptr.as_ptr() as usize);
    }

    #[test]
    fn test_failed_allocation_is_recorded_and_rethrown() {
        let upstream = Failing;
        let mut instr = InstrumentingMemoryResource::new(&upstream);

        let seen = Rc::new(RefCell::new(None));
        let seen_in_hook = Rc::clone(&seen);
        instr.add_post_allocate_hook(move |_, _, ptr| {
            *seen_in_hook.borrow_mut() = Some(ptr);
        });

        let result = instr.allocate(64, 8);
        assert!(matches!(result, Err(MemoryError::OutOfMemory { .. })));

        // The event was recorded with a null address, and the post hook
        // observed the failure before the error surfaced.
        let events = instr.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].addr, 0);
        assert_eq!(*seen.borrow(), Some(None));
    }

    #[test]
    fn test_hooks_fire_in_insertion_order() {
        let host = HostMemoryResource;
        let mut instr = InstrumentingMemoryResource::new(&host);

        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            instr.add_pre_allocate_hook(move |_, _| order.borrow_mut().push(tag));
        }

        let ptr = instr.allocate(16, 1).unwrap();
        unsafe { instr.deallocate(ptr, 16, 1) };
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_pre_deallocate_hook_sees_exact_tuple() {
        let host = HostMemoryResource;
        let mut instr = InstrumentingMemoryResource::new(&host);

        let seen = Rc::new(RefCell::new(None));
        let seen_in_hook = Rc::clone(&seen);
        instr.add_pre_deallocate_hook(move |ptr, size, align| {
            *seen_in_hook.borrow_mut() = Some((ptr.as_ptr() as usize, size, align));
        });

        let ptr = instr.allocate(256, 64).unwrap();
        unsafe { instr.deallocate(ptr, 256, 64) };
        assert_eq!(*seen.borrow(), Some((ptr.as_ptr() as usize, 256, 64)));
    }

    #[test]
    fn test_events_serialize() {
        let host = HostMemoryResource;
        let instr = InstrumentingMemoryResource::new(&host);
        let ptr = instr.allocate(32, 8).unwrap();
        unsafe { instr.deallocate(ptr, 32, 8) };

        let json = serde_json::to_string(&instr.events()).unwrap();
        assert!(json.contains("\"Allocation\""));
        assert!(json.contains("\"Deallocation\""));
        assert!(json.contains("\"size_bytes\":32"));
    }
}
