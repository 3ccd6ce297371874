use crate::ScrollToIndex;

/// Work folded into one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickWork {
    pub update_view: bool,
    pub reset: bool,
    pub remeasure: bool,
    pub scroll_to: Option<ScrollToIndex>,
}

impl TickWork {
    pub fn is_empty(&self) -> bool {
        !self.update_view && !self.reset && !self.remeasure && self.scroll_to.is_none()
    }
}

/// Coalesces render requests into single ticks.
///
/// Any number of requests between two ticks produce one pending tick. The `bool` returned by the
/// request methods is `true` only for the request that made a tick pending, which is when a host
/// should arrange a callback.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    pending: bool,
    work: TickWork,
    ticks: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self) -> bool {
        !core::mem::replace(&mut self.pending, true)
    }

    pub fn request_update_view(&mut self) -> bool {
        self.work.update_view = true;
        self.schedule()
    }

    pub fn request_reset(&mut self) -> bool {
        self.work.reset = true;
        self.schedule()
    }

    pub fn request_remeasure(&mut self) -> bool {
        self.work.remeasure = true;
        self.schedule()
    }

    /// Latches a scroll-to request; a newer request replaces an older one.
    pub fn request_scroll_to(&mut self, request: ScrollToIndex) -> bool {
        self.work.scroll_to = Some(request);
        self.schedule()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Work requested so far, without consuming it.
    pub fn peek(&self) -> &TickWork {
        &self.work
    }

    /// Starts a tick: clears the pending flag and hands over the requested work.
    pub fn begin_tick(&mut self) -> TickWork {
        self.pending = false;
        self.ticks += 1;
        core::mem::take(&mut self.work)
    }

    /// Ticks started so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
