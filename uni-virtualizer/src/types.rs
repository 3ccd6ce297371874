use alloc::collections::BTreeMap;
use core::fmt;
use core::str::FromStr;

use crate::Error;

/// The scroll axis of a layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    #[default]
    Vertical,
    Horizontal,
}

impl Direction {
    /// Parses a direction leniently: `"horizontal"` selects the horizontal axis, any other value
    /// falls back to vertical.
    pub fn from_name(name: &str) -> Self {
        if name == "horizontal" {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }

    pub fn main(self, size: Size) -> f64 {
        match self {
            Self::Vertical => size.height,
            Self::Horizontal => size.width,
        }
    }

    pub fn cross(self, size: Size) -> f64 {
        match self {
            Self::Vertical => size.width,
            Self::Horizontal => size.height,
        }
    }

    /// Builds a size from main/cross axis extents.
    pub fn size(self, main: f64, cross: f64) -> Size {
        match self {
            Self::Vertical => Size {
                width: cross,
                height: main,
            },
            Self::Horizontal => Size {
                width: main,
                height: cross,
            },
        }
    }

    pub fn offset(self, position: Position) -> f64 {
        match self {
            Self::Vertical => position.top,
            Self::Horizontal => position.left,
        }
    }

    /// Builds a position from main/cross axis offsets.
    pub fn position(self, main: f64, cross: f64) -> Position {
        match self {
            Self::Vertical => Position {
                top: main,
                left: cross,
            },
            Self::Horizontal => Position {
                top: cross,
                left: main,
            },
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertical => f.write_str("vertical"),
            Self::Horizontal => f.write_str("horizontal"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

impl Position {
    pub const fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }
}

/// A measured border box plus margins, as reported by a host.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemBox {
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
}

impl ItemBox {
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
        }
    }

    pub fn with_margins(mut self, top: f64, right: f64, bottom: f64, left: f64) -> Self {
        self.margin_top = top;
        self.margin_right = right;
        self.margin_bottom = bottom;
        self.margin_left = left;
        self
    }

    /// The outer size: border box plus margins on each axis.
    pub fn outer(&self) -> Size {
        Size {
            width: self.width + self.margin_left + self.margin_right,
            height: self.height + self.margin_top + self.margin_bottom,
        }
    }
}

/// An inclusive, non-empty range of item indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexRange {
    pub first: usize,
    pub last: usize,
}

impl IndexRange {
    pub fn new(first: usize, last: usize) -> Self {
        debug_assert!(first <= last, "IndexRange: first={first} > last={last}");
        Self { first, last }
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.first && index <= self.last
    }

    pub fn iter(&self) -> core::ops::RangeInclusive<usize> {
        self.first..=self.last
    }
}

/// Where a `scroll_to_index` target should land within the viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScrollToPosition {
    #[default]
    Start,
    Center,
    End,
    Nearest,
}

impl FromStr for ScrollToPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "center" => Ok(Self::Center),
            "end" => Ok(Self::End),
            "nearest" => Ok(Self::Nearest),
            other => Err(Error::InvalidScrollPosition(other.into())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollToIndex {
    pub index: usize,
    pub position: ScrollToPosition,
}

impl ScrollToIndex {
    pub fn new(index: usize, position: ScrollToPosition) -> Self {
        Self { index, position }
    }
}

/// `rangechange`: the active window and the visible sub-range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeChange {
    pub range: Option<IndexRange>,
    pub stable: bool,
    pub first_visible: usize,
    pub last_visible: usize,
    pub remeasure: bool,
}

impl RangeChange {
    pub fn num(&self) -> usize {
        self.range.map_or(0, |r| r.len())
    }

    /// First active index, or `-1` when nothing is active.
    pub fn first(&self) -> isize {
        self.range.map_or(-1, |r| r.first as isize)
    }

    /// Last active index, or `-1` when nothing is active.
    pub fn last(&self) -> isize {
        self.range.map_or(-1, |r| r.last as isize)
    }
}

/// Layout notifications, in the order a reflow emits them.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LayoutEvent {
    /// `rangechange`
    RangeChange(RangeChange),
    /// `scrollsizechange`: only the active axis is meaningful.
    ScrollSizeChange(Size),
    /// `scrollerrorchange`: subtract from the real scroll position.
    ScrollErrorChange(Position),
    /// `itempositionchange`: indexes whose position changed since the last emission.
    ItemPositionChange(BTreeMap<usize, Position>),
}

/// What a host container is told after a render settles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VisibleRange {
    pub first: usize,
    pub last: usize,
    pub first_visible: usize,
    pub last_visible: usize,
}

/// Identifies a reusable rendered unit owned by a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotId(pub u32);

pub type ItemKey = u64;
