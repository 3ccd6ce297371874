#[cfg(not(feature = "std"))]
use alloc::collections::BTreeMap;
#[cfg(feature = "std")]
use std::collections::HashMap;

use crate::SlotId;

#[cfg(feature = "std")]
pub(crate) type KeySlotMap<K> = HashMap<K, SlotId>;
#[cfg(not(feature = "std"))]
pub(crate) type KeySlotMap<K> = BTreeMap<K, SlotId>;

/// Bound for item keys used to match slots across reorders.
#[cfg(feature = "std")]
pub trait SlotKey: core::hash::Hash + Eq + Clone {}
#[cfg(feature = "std")]
impl<K: core::hash::Hash + Eq + Clone> SlotKey for K {}

/// Bound for item keys used to match slots across reorders.
#[cfg(not(feature = "std"))]
pub trait SlotKey: Ord + Clone {}
#[cfg(not(feature = "std"))]
impl<K: Ord + Clone> SlotKey for K {}
