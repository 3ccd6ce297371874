//! An in-memory host for the `uni-virtualizer` crate.
//!
//! `uni-virtualizer` only talks to a [`uni_virtualizer::Host`]. This crate provides one over a
//! retained node tree, which is handy for tests, headless rendering and as a template for real
//! UI bindings:
//!
//! - [`NodeTree`]: a single-level container of nodes in document order
//! - [`Insertion`]: one wrapper node per item, or marker-delimited fragments
//! - [`ScrollTarget`]: a self-scrolling container or an outer scroller, with viewport clipping
//! - [`ListController`]: items, an optional item-count cap, scroll-to-index and range listeners
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod adapter;
mod controller;
mod error;
mod observer;
mod scroll;
mod tree;


pub use adapter::{HostStats, Insertion, RenderedItem, TreeHost};
pub use controller::ListController;
pub use error::{HostError, Result};
pub use observer::PollingObserver;
pub use scroll::{Rect, ScrollTarget};
pub use tree::{Node, NodeId, NodeKind, NodeTree};
