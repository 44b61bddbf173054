//! A fixed-capacity window of materialized objects over an ordered extent.
//!
//! With a capacity of 5, an extent of `[0, 714]` and a start at 300 the ring
//! holds `[298, 299, 300, 301, 302]`:
//!
//! ```text
//!  298  299  300  301  302
//!   ^         ^         ^
//!  tail    selected    head
//! ```
//!
//! Selection always moves one step per `next`/`prev`. The window itself only
//! slides once the selection is more than half a window away from the trailing
//! end, so it catches up with the selection instead of shifting on every step.

use connectome_core::{ConnectomeError, RingConfig, Result};
use metrics::counter;
use std::collections::VecDeque;
use std::fmt::Write as _;
use tracing::debug;

/// Lifecycle hooks invoked by [`SlidingRing`].
///
/// `on_push(n)` always precedes any `on_selected`/`on_unselected` for `n`,
/// and `on_evict(n, _)` is only called once `n` is no longer selected. The
/// materialized object is handed back by value on eviction, exactly once.
pub trait RingCallbacks<T> {
    fn on_push(&mut self, n: i64) -> T;
    fn on_selected(&mut self, n: i64, obj: &T);
    fn on_unselected(&mut self, n: i64, obj: &T);
    fn on_evict(&mut self, n: i64, obj: T);
}

/// Adapts four closures to [`RingCallbacks`].
pub struct ClosureCallbacks<P, S, U, E> {
    pub on_push: P,
    pub on_selected: S,
    pub on_unselected: U,
    pub on_evict: E,
}

impl<T, P, S, U, E> RingCallbacks<T> for ClosureCallbacks<P, S, U, E>
where
    P: FnMut(i64) -> T,
    S: FnMut(i64, &T),
    U: FnMut(i64, &T),
    E: FnMut(i64, T),
{
    fn on_push(&mut self, n: i64) -> T {
        (self.on_push)(n)
    }

    fn on_selected(&mut self, n: i64, obj: &T) {
        (self.on_selected)(n, obj)
    }

    fn on_unselected(&mut self, n: i64, obj: &T) {
        (self.on_unselected)(n, obj)
    }

    fn on_evict(&mut self, n: i64, obj: T) {
        (self.on_evict)(n, obj)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingOptions {
    pub capacity: usize,
    /// Inclusive `[min, max]`.
    pub extent: (i64, i64),
    pub start_at: i64,
}

impl From<&RingConfig> for RingOptions {
    fn from(config: &RingConfig) -> Self {
        Self {
            capacity: config.capacity,
            extent: (config.min, config.max),
            start_at: config.start_at,
        }
    }
}

#[derive(Debug)]
struct RingSlot<T> {
    n: i64,
    o: T,
}

pub struct SlidingRing<T, C: RingCallbacks<T>> {
    extent: (i64, i64),
    capacity: usize,
    /// Window ordered from tail to head.
    slots: VecDeque<RingSlot<T>>,
    /// Index of the selected slot within `slots`.
    pos: usize,
    callbacks: C,
}

impl<T, C: RingCallbacks<T>> SlidingRing<T, C> {
    pub fn new(options: RingOptions, callbacks: C) -> Result<Self> {
        let (min, max) = options.extent;

        if options.capacity < 3 {
            return Err(ConnectomeError::Configuration(format!(
                "ring capacity must be at least 3, got {}",
                options.capacity
            )));
        }
        if min >= max {
            return Err(ConnectomeError::Configuration(format!(
                "extent should be [min, max] with min < max, got [{}, {}]",
                min, max
            )));
        }
        if options.start_at < min || options.start_at > max {
            return Err(ConnectomeError::Configuration(format!(
                "start position {} is outside [{}, {}]",
                options.start_at, min, max
            )));
        }
        let extent_size = max.checked_sub(min).ok_or_else(|| {
            ConnectomeError::Configuration(format!(
                "extent [{}, {}] is too large to address",
                min, max
            ))
        })?;
        if extent_size < 3 {
            return Err(ConnectomeError::Configuration(format!(
                "extent [{}, {}] is too small, its size must be at least 3",
                min, max
            )));
        }

        let capacity = match i64::try_from(options.capacity) {
            Ok(requested) if requested <= extent_size => options.capacity,
            _ => extent_size as usize,
        };

        let mut ring = Self {
            extent: options.extent,
            capacity,
            slots: VecDeque::with_capacity(capacity),
            pos: 0,
            callbacks,
        };
        ring.init(options.start_at);
        Ok(ring)
    }

    fn init(&mut self, at: i64) {
        let (min, max) = self.extent;
        let cap = self.capacity as i64;

        let mut tail = at.saturating_sub(cap / 2);
        if tail < min {
            tail = min;
        }
        if tail > max - (cap - 1) {
            tail = max - (cap - 1);
        }

        for n in tail..=tail + (cap - 1) {
            let o = self.callbacks.on_push(n);
            counter!("sliding_ring_pushes_total").increment(1);
            self.slots.push_back(RingSlot { n, o });
        }

        self.pos = (at - tail) as usize;
        self.callbacks.on_selected(at, &self.slots[self.pos].o);
        debug!(selected = at, tail, head = tail + (cap - 1), "sliding ring initialized");
    }

    fn half(&self) -> i64 {
        (self.capacity / 2) as i64
    }

    /// Select the following position. Returns `false`, without invoking any
    /// callback, when the selection already sits on the extent maximum.
    pub fn next(&mut self) -> bool {
        let (_, max) = self.extent;
        let current = self.slots[self.pos].n;
        if current >= max || self.pos + 1 >= self.slots.len() {
            return false;
        }
        let next_n = current + 1;

        let next_pos = self.pos + 1;
        self.callbacks.on_unselected(current, &self.slots[self.pos].o);
        self.callbacks.on_selected(next_n, &self.slots[next_pos].o);
        self.pos = next_pos;

        let can_slide_further = next_n - self.tail() > self.half();
        if self.head() < max && can_slide_further {
            let next_head = self.head() + 1;
            if let Some(evicted) = self.slots.pop_front() {
                self.callbacks.on_evict(evicted.n, evicted.o);
                counter!("sliding_ring_evictions_total").increment(1);
                self.pos -= 1;
            }
            let o = self.callbacks.on_push(next_head);
            counter!("sliding_ring_pushes_total").increment(1);
            self.slots.push_back(RingSlot { n: next_head, o });
            counter!("sliding_ring_slides_total").increment(1);
            debug!(selected = next_n, head = next_head, "sliding ring slid forward");
        }

        true
    }

    /// Select the preceding position. Returns `false`, without invoking any
    /// callback, when the selection already sits on the extent minimum.
    pub fn prev(&mut self) -> bool {
        let (min, _) = self.extent;
        let current = self.slots[self.pos].n;
        if current <= min || self.pos == 0 {
            return false;
        }
        let prev_n = current - 1;

        let prev_pos = self.pos - 1;
        self.callbacks.on_unselected(current, &self.slots[self.pos].o);
        self.callbacks.on_selected(prev_n, &self.slots[prev_pos].o);
        self.pos = prev_pos;

        let can_slide_backwards = self.head() - prev_n > self.half();
        if self.tail() > min && can_slide_backwards {
            let next_tail = self.tail() - 1;
            if let Some(evicted) = self.slots.pop_back() {
                self.callbacks.on_evict(evicted.n, evicted.o);
                counter!("sliding_ring_evictions_total").increment(1);
            }
            let o = self.callbacks.on_push(next_tail);
            counter!("sliding_ring_pushes_total").increment(1);
            self.slots.push_front(RingSlot { n: next_tail, o });
            self.pos += 1;
            counter!("sliding_ring_slides_total").increment(1);
            debug!(selected = prev_n, tail = next_tail, "sliding ring slid backwards");
        }

        true
    }

    /// Jump to `n`: the whole window is evicted and rebuilt around `n`.
    pub fn goto(&mut self, n: i64) -> Result<()> {
        let (min, max) = self.extent;
        if n < min || n > max {
            return Err(ConnectomeError::Configuration(format!(
                "position {} is outside [{}, {}]",
                n, min, max
            )));
        }

        self.release();
        self.init(n);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(selected) = self.slots.get(self.pos) {
            self.callbacks.on_unselected(selected.n, &selected.o);
        }
        for slot in self.slots.drain(..) {
            self.callbacks.on_evict(slot.n, slot.o);
            counter!("sliding_ring_evictions_total").increment(1);
        }
        self.pos = 0;
    }

    pub fn selected(&self) -> i64 {
        self.slots[self.pos].n
    }

    pub fn selected_object(&self) -> &T {
        &self.slots[self.pos].o
    }

    pub fn get(&self, n: i64) -> Option<&T> {
        let offset = n.checked_sub(self.tail())?;
        if offset < 0 {
            return None;
        }
        self.slots.get(offset as usize).map(|slot| &slot.o)
    }

    pub fn tail(&self) -> i64 {
        self.slots[0].n
    }

    pub fn head(&self) -> i64 {
        self.slots[self.slots.len() - 1].n
    }

    /// Held positions, ascending.
    pub fn held_positions(&self) -> Vec<i64> {
        self.slots.iter().map(|slot| slot.n).collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn extent(&self) -> (i64, i64) {
        self.extent
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    /// Window rendering: `*` marks the selection, `-` the tail, `+` the head.
    pub fn debug_string(&self) -> String {
        let last = self.slots.len() - 1;
        let mut text = String::from("[");
        for (i, slot) in self.slots.iter().enumerate() {
            if i == self.pos {
                text.push('*');
            } else if i == 0 {
                text.push('-');
            } else if i == last {
                text.push('+');
            }
            let _ = write!(text, "{}", slot.n);
            if i != last {
                text.push_str(", ");
            }
        }
        text.push(']');
        text
    }

    pub fn trace_window(&self) {
        debug!(window = %self.debug_string(), "sliding ring window");
    }
}

impl<T, C: RingCallbacks<T>> Drop for SlidingRing<T, C> {
    fn drop(&mut self) {
        self.release();
    }
}
