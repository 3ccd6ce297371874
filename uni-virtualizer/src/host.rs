use core::fmt;

use crate::{ItemBox, Position, Size, SlotId};

/// The rendering environment the engine drives.
///
/// The engine never holds UI objects. It names rendered children by [`SlotId`] and asks the host
/// to create, move, show, hide and measure them. Document order is the host's: slots are placed
/// with [`Host::insert_before`] and walked with [`Host::next_sibling`].
pub trait Host {
    type Error: fmt::Display;

    /// Creates a fresh slot bound to `index`. The slot is not yet attached.
    fn create_slot(&mut self, slot: SlotId, index: usize) -> Result<(), Self::Error>;

    /// Re-binds an existing slot to `index`.
    fn update_slot(&mut self, slot: SlotId, index: usize);

    /// Called when a slot leaves the active window for good and goes back to the free list.
    fn recycle_slot(&mut self, slot: SlotId) {
        let _ = slot;
    }

    /// Destroys a slot; it will never be referenced again.
    fn remove_slot(&mut self, slot: SlotId);

    /// Moves (or attaches) `slot` before `before`, or at the end when `before` is `None`.
    fn insert_before(&mut self, slot: SlotId, before: Option<SlotId>);

    /// The slot attached right after `slot`, in document order.
    fn next_sibling(&self, slot: SlotId) -> Option<SlotId>;

    /// Whether `slot` is in the container, hidden or not. A reset with no rendered slots starts
    /// from an attached first slot instead of moving it.
    fn is_attached(&self, slot: SlotId) -> bool;

    fn hide(&mut self, slot: SlotId);

    fn show(&mut self, slot: SlotId);

    /// Reads the outer box of a rendered slot.
    fn measure(&mut self, slot: SlotId) -> ItemBox;

    fn position_slot(&mut self, slot: SlotId, position: Position);

    /// Current viewport size and scroll offset of the scroll target.
    fn viewport(&self) -> (Size, Position);

    /// Sizes the scrollable content; `None` clears any explicit size.
    fn size_container(&mut self, size: Option<Size>);

    /// Shifts the real scroll offset by `-error` so the content stays put on screen.
    fn correct_scroll_error(&mut self, error: Position);
}
