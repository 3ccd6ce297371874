use uni_virtualizer::{Direction, Position, Size};

/// A client rectangle in viewport coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Where scrolling happens.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollTarget {
    /// The list container scrolls its own content.
    Container { size: Size, scroll: Position },
    /// An outer scroller (an ancestor or the window) scrolls and the list container moves within
    /// it. Both rects are client rects in the same coordinate space.
    External { container: Rect, scroller: Rect },
}

impl ScrollTarget {
    pub fn container(size: Size) -> Self {
        Self::Container {
            size,
            scroll: Position::default(),
        }
    }

    pub fn external(container: Rect, scroller: Rect) -> Self {
        Self::External {
            container,
            scroller,
        }
    }

    /// The visible part of the list and its scroll offset within the list.
    ///
    /// For an external scroller the viewport is the scroller's box clipped to the container on
    /// the scroll axis; the cross axis keeps the scroller's full extent. The offset is how far
    /// the container's leading edge has scrolled past the scroller's.
    pub fn viewport(&self, direction: Direction) -> (Size, Position) {
        match *self {
            Self::Container { size, scroll } => (size, scroll),
            Self::External {
                container,
                scroller,
            } => {
                let (w, h) = (scroller.width, scroller.height);
                let left = (container.left - scroller.left).clamp(0.0, w.max(0.0));
                let top = (container.top - scroller.top).clamp(0.0, h.max(0.0));
                let right = match direction {
                    Direction::Vertical => {
                        (container.right() - scroller.left).clamp(0.0, w.max(0.0))
                    }
                    Direction::Horizontal => w,
                };
                let bottom = match direction {
                    Direction::Vertical => h,
                    Direction::Horizontal => {
                        (container.bottom() - scroller.top).clamp(0.0, h.max(0.0))
                    }
                };
                let size = Size::new(right - left, bottom - top);
                let scroll = Position::new(
                    (scroller.top - container.top).max(0.0),
                    (scroller.left - container.left).max(0.0),
                );
                (size, scroll)
            }
        }
    }

    /// The raw scroll offset, unclipped.
    pub fn scroll(&self) -> Position {
        match *self {
            Self::Container { scroll, .. } => scroll,
            Self::External {
                container,
                scroller,
            } => Position::new(scroller.top - container.top, scroller.left - container.left),
        }
    }

    /// Scrolls to an absolute offset.
    pub fn set_scroll(&mut self, offset: Position) {
        match self {
            Self::Container { scroll, .. } => *scroll = offset,
            Self::External {
                container,
                scroller,
            } => {
                container.top = scroller.top - offset.top;
                container.left = scroller.left - offset.left;
            }
        }
    }

    /// Resizes the box that scrolls: the container itself, or the outer scroller.
    pub fn set_size(&mut self, new_size: Size) {
        match self {
            Self::Container { size, .. } => *size = new_size,
            Self::External { scroller, .. } => {
                scroller.width = new_size.width;
                scroller.height = new_size.height;
            }
        }
    }

    /// Subtracts `error` from the scroll offset, so content shifted by the layout stays in place
    /// on screen.
    pub fn correct_scroll_error(&mut self, error: Position) {
        let scroll = self.scroll();
        self.set_scroll(Position::new(scroll.top - error.top, scroll.left - error.left));
    }
}
