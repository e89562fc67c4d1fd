use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::OsRng;

pub const DEFAULT_DURATION: Duration = Duration::from_millis(5000);
/// How long a dismissed entry stays visible in its leaving state before it is
/// dropped from the queue, so it is never erased mid-frame.
pub const LEAVING_GRACE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

impl NotificationKind {
    pub fn icon(self) -> &'static str {
        match self {
            Self::Success => "✅",
            Self::Error => "❌",
            Self::Info => "📣",
        }
    }
}

#[derive(Debug)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub duration: Duration,
    pub created_at: Instant,
    pub leaving: bool,
    pub hovered: bool,
    deadline: Option<Instant>,
    remove_at: Option<Instant>,
}

/// Transient outcome messages, stacked in creation order. Every entry runs an
/// independent countdown; hovering clears the timer and un-hovering restarts
/// the full duration (deliberately not a resume of remaining time). Both timed
/// and manual dismissal pass through the leaving grace before removal.
pub struct NotificationQueue {
    items: Vec<Notification>,
    seq: u64,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            seq: 0,
        }
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.push(message, NotificationKind::Success, DEFAULT_DURATION)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.push(message, NotificationKind::Error, DEFAULT_DURATION)
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.push(message, NotificationKind::Info, DEFAULT_DURATION)
    }

    pub fn push(
        &mut self,
        message: impl Into<String>,
        kind: NotificationKind,
        duration: Duration,
    ) -> u64 {
        self.push_at(Instant::now(), message, kind, duration)
    }

    pub fn push_at(
        &mut self,
        now: Instant,
        message: impl Into<String>,
        kind: NotificationKind,
        duration: Duration,
    ) -> u64 {
        let id = self.next_id();
        self.items.push(Notification {
            id,
            message: message.into(),
            kind,
            duration,
            created_at: now,
            leaving: false,
            hovered: false,
            deadline: Some(now + duration),
            remove_at: None,
        });
        id
    }

    /// Ids stay strictly increasing across pushes even with the random low
    /// bits, so creation order is recoverable from the id alone.
    fn next_id(&mut self) -> u64 {
        self.seq += 1;
        (self.seq << 10) | OsRng.gen_range(0..1024u64)
    }

    pub fn dismiss(&mut self, id: u64) {
        self.dismiss_at(Instant::now(), id);
    }

    pub fn dismiss_at(&mut self, now: Instant, id: u64) {
        if let Some(item) = self.items.iter_mut().find(|n| n.id == id) {
            begin_leaving(item, now);
        }
    }

    /// Advance countdowns: expire deadlines into the leaving state and drop
    /// entries whose grace has elapsed.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        for item in &mut self.items {
            if !item.leaving && !item.hovered && item.deadline.is_some_and(|d| d <= now) {
                begin_leaving(item, now);
            }
        }
        self.items
            .retain(|item| !(item.leaving && item.remove_at.is_some_and(|r| r <= now)));
    }

    pub fn set_hovered(&mut self, id: Option<u64>) {
        self.set_hovered_at(Instant::now(), id);
    }

    /// Hover pauses by clearing the deadline; leaving hover restarts the full
    /// duration. Entries already leaving are past the point of rescue.
    pub fn set_hovered_at(&mut self, now: Instant, id: Option<u64>) {
        for item in &mut self.items {
            let hovered = !item.leaving && Some(item.id) == id;
            if hovered && !item.hovered {
                item.deadline = None;
            } else if item.hovered && !hovered && !item.leaving {
                item.deadline = Some(now + item.duration);
            }
            item.hovered = hovered;
        }
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn begin_leaving(item: &mut Notification, now: Instant) {
    item.leaving = true;
    item.hovered = false;
    item.deadline = None;
    item.remove_at = Some(now + LEAVING_GRACE);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn ids_are_monotonic() {
        let mut queue = NotificationQueue::new();
        let a = queue.success("one");
        let b = queue.error("two");
        let c = queue.info("three");
        assert!(a < b && b < c);
    }

    #[test]
    fn shorter_duration_leaves_first_and_stack_order_holds() {
        let t0 = Instant::now();
        let mut queue = NotificationQueue::new();
        let long = queue.push_at(t0, "slow", NotificationKind::Success, ms(5000));
        let short = queue.push_at(t0, "fast", NotificationKind::Success, ms(3000));

        queue.tick_at(t0 + ms(3000) + LEAVING_GRACE);
        let remaining: Vec<u64> = queue.items().iter().map(|n| n.id).collect();
        assert_eq!(remaining, vec![long]);

        queue.tick_at(t0 + ms(5000) + LEAVING_GRACE);
        assert!(queue.is_empty());
        let _ = short;
    }

    #[test]
    fn removal_is_two_phase() {
        let t0 = Instant::now();
        let mut queue = NotificationQueue::new();
        queue.push_at(t0, "msg", NotificationKind::Info, ms(1000));

        queue.tick_at(t0 + ms(1000));
        assert_eq!(queue.items().len(), 1);
        assert!(queue.items()[0].leaving);

        queue.tick_at(t0 + ms(1000) + LEAVING_GRACE);
        assert!(queue.is_empty());
    }

    #[test]
    fn manual_dismiss_goes_through_leaving() {
        let t0 = Instant::now();
        let mut queue = NotificationQueue::new();
        let id = queue.push_at(t0, "msg", NotificationKind::Error, ms(5000));

        queue.dismiss_at(t0 + ms(100), id);
        assert!(queue.items()[0].leaving);
        queue.tick_at(t0 + ms(100) + LEAVING_GRACE);
        assert!(queue.is_empty());
    }

    #[test]
    fn hover_pauses_and_unhover_restarts_full_duration() {
        let t0 = Instant::now();
        let mut queue = NotificationQueue::new();
        let id = queue.push_at(t0, "msg", NotificationKind::Success, ms(1000));

        queue.set_hovered_at(t0 + ms(900), Some(id));
        // Well past the original deadline, but paused.
        queue.tick_at(t0 + ms(5000));
        assert_eq!(queue.items().len(), 1);
        assert!(!queue.items()[0].leaving);

        // Unhover restarts the whole 1000ms, not the remaining 100ms.
        queue.set_hovered_at(t0 + ms(5000), None);
        queue.tick_at(t0 + ms(5500));
        assert!(!queue.items()[0].leaving);
        queue.tick_at(t0 + ms(6000));
        assert!(queue.items()[0].leaving);
    }

    #[test]
    fn hover_on_leaving_entry_is_ignored() {
        let t0 = Instant::now();
        let mut queue = NotificationQueue::new();
        let id = queue.push_at(t0, "msg", NotificationKind::Success, ms(1000));
        queue.tick_at(t0 + ms(1000));
        assert!(queue.items()[0].leaving);

        queue.set_hovered_at(t0 + ms(1100), Some(id));
        assert!(!queue.items()[0].hovered);
        queue.tick_at(t0 + ms(1000) + LEAVING_GRACE);
        assert!(queue.is_empty());
    }
}
