use std::collections::{BTreeMap, HashMap};

/// Handle to a scheduled one-shot timer. Ids are handed out in scheduling
/// order, which is also the firing order among timers with equal deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// A timer taken off the queue, ready to be fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer<K> {
    pub id: TimerId,
    pub due_ms: u64,
    /// Queue epoch at scheduling time. A timer from an older epoch is stale.
    pub epoch: u64,
    pub kind: K,
}

/// Cancellable one-shot timers ordered by deadline.
///
/// The queue does not sleep; a driver asks for the next deadline, waits, and
/// pops. `reset` cancels everything and bumps the epoch so any timer that was
/// already popped but not yet fired can be recognized as stale.
#[derive(Debug)]
pub struct TimerQueue<K> {
    pending: BTreeMap<(u64, TimerId), (u64, K)>,
    due_by_id: HashMap<TimerId, u64>,
    next_id: u64,
    epoch: u64,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            due_by_id: HashMap::new(),
            next_id: 0,
            epoch: 0,
        }
    }
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: u64, kind: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert((due_ms, id), (self.epoch, kind));
        self.due_by_id.insert(id, due_ms);
        id
    }

    /// Returns `false` if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.due_by_id.remove(&id) {
            Some(due_ms) => self.pending.remove(&(due_ms, id)).is_some(),
            None => false,
        }
    }

    /// Cancels the timer held in `slot`, if any, and empties the slot.
    pub fn cancel_slot(&mut self, slot: &mut Option<TimerId>) {
        if let Some(id) = slot.take() {
            self.cancel(id);
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.due_by_id.clear();
    }

    /// Cancels every pending timer and starts a new epoch.
    pub fn reset(&mut self) -> u64 {
        self.clear();
        self.epoch += 1;
        self.epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self, timer: &Timer<K>) -> bool {
        timer.epoch == self.epoch
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.due_by_id.contains_key(&id)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.keys().next().map(|(due_ms, _)| *due_ms)
    }

    /// Removes the earliest timer regardless of the current time.
    pub fn pop_next(&mut self) -> Option<Timer<K>> {
        let ((due_ms, id), (epoch, kind)) = self.pending.pop_first()?;
        self.due_by_id.remove(&id);
        Some(Timer {
            id,
            due_ms,
            epoch,
            kind,
        })
    }

    /// Removes the earliest timer if it is due at `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Timer<K>> {
        match self.next_deadline() {
            Some(due_ms) if due_ms <= now_ms => self.pop_next(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_deadline_order_then_fifo() {
        let mut queue = TimerQueue::new();
        queue.schedule(300, "c");
        queue.schedule(100, "a");
        queue.schedule(300, "d");
        queue.schedule(200, "b");

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_next())
            .map(|t| (t.due_ms, t.kind))
            .collect();
        assert_eq!(order, vec![(100, "a"), (200, "b"), (300, "c"), (300, "d")]);
    }

    #[test]
    fn cancelled_timers_never_pop() {
        let mut queue = TimerQueue::new();
        let a = queue.schedule(100, 1);
        let mut slot = Some(queue.schedule(50, 2));
        assert!(queue.cancel(a));
        assert!(!queue.cancel(a));
        queue.cancel_slot(&mut slot);
        assert!(slot.is_none());
        assert!(queue.is_empty());
        assert_eq!(queue.pop_next(), None);
    }

    #[test]
    fn pop_due_respects_now() {
        let mut queue = TimerQueue::new();
        queue.schedule(500, ());
        assert!(queue.pop_due(499).is_none());
        assert_eq!(queue.pop_due(500).map(|t| t.due_ms), Some(500));
    }

    #[test]
    fn reset_makes_popped_timers_stale() {
        let mut queue = TimerQueue::new();
        queue.schedule(10, ());
        queue.schedule(20, ());
        let popped = queue.pop_next().unwrap();
        assert!(queue.is_current(&popped));

        queue.reset();
        assert!(queue.is_empty());
        assert!(!queue.is_current(&popped));
    }
}
