// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A "typed" arena-index crate.
//!
//! Routers, channels and flits all reference each other in cycles (a
//! channel points back at the router that owns it, a router holds channels
//! to its neighbours). Rather than model those references as owning
//! pointers, every cross-reference is a small `Copy` index into an arena
//! the driver owns. This type gives those indices a compile-time type tag
//! so that, say, a `PortId` can never be handed to code expecting a
//! `NodeId`.

use core::fmt::{Debug, Formatter};
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

/// A typed arena index.
///
/// The goal of this type is to create compile-time associations between
/// plain integers and the arena they index into, so that code cannot
/// conflate indices belonging to different arenas while paying no more at
/// runtime than a `u32`.
///
/// # Example
///
/// ```
/// # use interconnect_id::Id;
/// pub struct Router {
///     id: Id<Self>,
/// }
///
/// pub struct Channel {
///     id: Id<Self>,
///     src: Id<Router>,
///     dst: Id<Router>,
/// }
/// ```
///
/// Attempting to assign a `Id<Channel>` where a `Id<Router>` is expected is
/// a compile error, which is exactly the point.
pub type Id<T> = AbstractIdType<*const T, u32>;

/// An abstract, typed index.
///
/// <div class="warning">
///
/// Unless you need something besides `u32`, use the [Id] type alias
/// instead.
///
/// </div>
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbstractIdType<T, U = u32>(U, PhantomData<T>);

impl<T> AsRef<u32> for Id<T> {
    fn as_ref(&self) -> &u32 {
        &self.0
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl<T> Id<T> {
    /// Build an `Id<T>` from a raw index.
    ///
    /// Use this when the index is already known (e.g. the position a value
    /// was pushed to in a `Vec`-backed arena); use [`IdAllocator`] when you
    /// need to mint fresh, never-reused indices instead.
    #[must_use]
    pub const fn from_raw(index: u32) -> Self {
        Self(index, PhantomData)
    }

    /// Strip type safety and return the wrapped (untyped) index.
    #[must_use]
    pub const fn into_raw(self) -> u32 {
        self.0
    }

    /// Return the wrapped index as a `usize`, suitable for `Vec` indexing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Return a reference to the underlying (untyped) index.
    #[must_use]
    pub const fn as_raw(&self) -> &u32 {
        &self.0
    }
}

impl<T> From<Id<T>> for u32 {
    fn from(value: Id<T>) -> Self {
        value.0
    }
}

impl<T> From<u32> for Id<T> {
    fn from(value: u32) -> Self {
        Self::from_raw(value)
    }
}

/// Mints fresh, monotonically increasing [`Id`]s for a single arena.
///
/// One allocator is owned by whatever struct owns the arena (e.g. the
/// driver owns one `IdAllocator<Router>` per simulation). Ids are never
/// reused even if the underlying arena slot is freed, which keeps stale
/// indices from one generation pointing at an unrelated value from a later
/// one.
pub struct IdAllocator<T> {
    next: AtomicU32,
    _marker: PhantomData<T>,
}

impl<T> Default for IdAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IdAllocator<T> {
    /// Create an allocator that starts minting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
            _marker: PhantomData,
        }
    }

    /// Mint the next id in sequence.
    #[must_use]
    pub fn alloc(&self) -> Id<T> {
        Id::from_raw(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids minted so far.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Router;
    struct Channel;

    #[test]
    fn allocator_mints_sequentially() {
        let alloc = IdAllocator::<Router>::new();
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert_eq!(a.into_raw(), 0);
        assert_eq!(b.into_raw(), 1);
        assert_eq!(alloc.count(), 2);
    }

    #[test]
    fn from_raw_roundtrips() {
        let id = Id::<Router>::from_raw(7);
        assert_eq!(id.into_raw(), 7);
        assert_eq!(id.index(), 7usize);
    }

    #[test]
    fn distinct_types_do_not_compare() {
        let r = Id::<Router>::from_raw(3);
        let c = Id::<Channel>::from_raw(3);
        assert_eq!(r.into_raw(), c.into_raw());
    }
}
