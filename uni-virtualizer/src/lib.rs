//! A headless engine for virtualized lists of variable-size items.
//!
//! The engine renders only the items near the viewport into a small set of reusable slots, and
//! estimates the positions of everything else from a running average of measured sizes. As real
//! measurements arrive it corrects its estimates without visible jumps: whichever item is anchored
//! on screen stays put and the coordinate origin is shifted instead.
//!
//! It is UI-agnostic. A host (see [`Host`]) provides:
//! - the viewport size and scroll offset
//! - slot creation, placement, visibility and measurement
//!
//! For an in-memory host with element and fragment insertion, see the `uni-virtualizer-host`
//! crate.
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod error;
mod host;
mod key;
mod layout;
mod metrics;
mod options;
mod physical;
mod pool;
mod px;
mod resize;
mod scheduler;
mod types;
mod virtualizer;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use host::Host;
pub use layout::{Anchor, Layout1d};
pub use metrics::{ItemMetrics, MetricsStore};
pub use options::{LayoutOptions, VirtualizerOptions};
pub use pool::RecyclePool;
pub use resize::{NoopResizeObserver, ResizeCoordinator, ResizeObserver, ResizeTarget};
pub use scheduler::{Scheduler, TickWork};
pub use types::{
    Direction, IndexRange, ItemBox, ItemKey, LayoutEvent, Position, RangeChange, ScrollToIndex,
    ScrollToPosition, Size, SlotId, VisibleRange,
};
pub use virtualizer::{ListenerId, Virtualizer};

#[doc(hidden)]
pub use key::SlotKey;
