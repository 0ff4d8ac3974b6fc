use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{runtime::Handle, task::JoinHandle};

use crate::{models::Severity, sink::DisplaySink};

/// Pause between hiding one message and showing the next.
pub const HIDE_TRANSITION: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub text: String,
    pub duration: Duration,
    pub severity: Severity,
}

/// FIFO message board: one message visible at a time, each auto-dismissed
/// after its own duration.
///
/// Cloning yields another handle onto the same queue and display. The display
/// cycle runs as a Tokio task on the runtime the board was built in, so `post`
/// may be called from any thread.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

struct Inner {
    // Lock order: `queue` before `display`.
    queue: Mutex<QueueState>,
    display: Mutex<Box<dyn DisplaySink>>,
    transition: Duration,
    runtime: Option<Handle>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Message>,
    showing: bool,
    /// Bumped by `clear` so a cycle started earlier can tell it is stale.
    epoch: u64,
    cycle: Option<JoinHandle<()>>,
}

impl Notifier {
    pub fn new(display: impl DisplaySink + 'static) -> Self {
        Self::with_transition(display, HIDE_TRANSITION)
    }

    pub fn with_transition(display: impl DisplaySink + 'static, transition: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(QueueState::default()),
                display: Mutex::new(Box::new(display)),
                transition,
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    /// Queue a message. Returns immediately; display happens on a background task.
    pub fn post(&self, text: impl Into<String>, duration: Duration, severity: Severity) {
        let message = Message {
            text: text.into(),
            duration,
            severity,
        };
        tracing::debug!(?severity, "queueing message: {}", message.text);

        let mut state = self.inner.lock_queue();
        state.pending.push_back(message);
        if state.showing {
            return;
        }
        let Some(runtime) = self.inner.runtime() else {
            tracing::warn!("no Tokio runtime available, message stays queued");
            return;
        };
        let cycle = runtime.spawn(display_cycle(Arc::clone(&self.inner), state.epoch));
        state.cycle = Some(cycle);
        state.showing = true;
    }

    pub fn info(&self, text: impl Into<String>, duration: Duration) {
        self.post(text, duration, Severity::Info);
    }

    pub fn warning(&self, text: impl Into<String>, duration: Duration) {
        self.post(text, duration, Severity::Warning);
    }

    pub fn success(&self, text: impl Into<String>, duration: Duration) {
        self.post(text, duration, Severity::Success);
    }

    pub fn error(&self, text: impl Into<String>, duration: Duration) {
        self.post(text, duration, Severity::Error);
    }

    /// Drop everything queued or on screen and go idle immediately.
    pub fn clear(&self) {
        let mut state = self.inner.lock_queue();
        let dropped = state.pending.len();
        state.pending.clear();
        state.showing = false;
        state.epoch += 1;
        if let Some(cycle) = state.cycle.take() {
            cycle.abort();
        }
        self.inner.lock_display().hide();
        tracing::debug!("notifier cleared, {dropped} queued messages dropped");
    }

    pub fn is_showing(&self) -> bool {
        self.inner.lock_queue().showing
    }

    /// Messages still waiting behind the visible one.
    pub fn pending(&self) -> usize {
        self.inner.lock_queue().pending.len()
    }
}

impl Inner {
    /// The caller's runtime when there is one, else the one the board was built in.
    fn runtime(&self) -> Option<Handle> {
        Handle::try_current().ok().or_else(|| self.runtime.clone())
    }

    fn lock_queue(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_display(&self) -> MutexGuard<'_, Box<dyn DisplaySink>> {
        self.display.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Show the head of the queue, or mark the board idle when it is empty.
    /// Returns how long the shown message stays up.
    fn show_next(&self, epoch: u64) -> Option<Duration> {
        let mut state = self.lock_queue();
        if state.epoch != epoch {
            return None;
        }
        let Some(message) = state.pending.pop_front() else {
            state.showing = false;
            state.cycle = None;
            return None;
        };
        self.lock_display()
            .display(&message.text, message.severity);
        Some(message.duration)
    }

    fn hide_current(&self, epoch: u64) -> bool {
        let state = self.lock_queue();
        if state.epoch != epoch {
            return false;
        }
        self.lock_display().hide();
        true
    }
}

async fn display_cycle(inner: Arc<Inner>, epoch: u64) {
    while let Some(duration) = inner.show_next(epoch) {
        tokio::time::sleep(duration).await;
        if !inner.hide_current(epoch) {
            return;
        }
        tokio::time::sleep(inner.transition).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{DisplayEvent, MemoryDisplay};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[tokio::test(start_paused = true)]
    async fn messages_are_shown_one_at_a_time_in_order() {
        let display = MemoryDisplay::default();
        let notifier = Notifier::new(display.clone());

        notifier.info("A", ms(1000));
        notifier.success("B", ms(1500));
        assert!(notifier.is_showing());

        tokio::time::sleep(ms(5000)).await;

        assert_eq!(
            display.timeline(),
            vec![
                (ms(0), DisplayEvent::Shown("A".into(), Severity::Info)),
                (ms(1000), DisplayEvent::Hidden),
                (ms(1400), DisplayEvent::Shown("B".into(), Severity::Success)),
                (ms(2900), DisplayEvent::Hidden),
            ]
        );
        assert!(!notifier.is_showing());
        assert_eq!(notifier.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_mid_display_prevents_later_messages() {
        let display = MemoryDisplay::default();
        let notifier = Notifier::new(display.clone());

        notifier.info("A", ms(1000));
        notifier.info("B", ms(1500));
        tokio::time::sleep(ms(500)).await;
        assert_eq!(notifier.pending(), 1);

        notifier.clear();
        assert!(!notifier.is_showing());
        tokio::time::sleep(ms(5000)).await;

        assert_eq!(display.shown(), vec!["A".to_string()]);
        assert_eq!(
            display.timeline().last(),
            Some(&(ms(500), DisplayEvent::Hidden))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn post_after_idle_restarts_the_cycle() {
        let display = MemoryDisplay::default();
        let notifier = Notifier::new(display.clone());

        notifier.warning("first", ms(100));
        tokio::time::sleep(ms(1000)).await;
        assert!(!notifier.is_showing());

        notifier.error("second", ms(100));
        tokio::time::sleep(ms(1000)).await;

        assert_eq!(display.shown(), vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn post_from_a_plain_thread_uses_the_owning_runtime() {
        let display = MemoryDisplay::default();
        let notifier = Notifier::new(display.clone());

        let remote = notifier.clone();
        std::thread::spawn(move || remote.info("from the UI thread", ms(500)))
            .join()
            .unwrap();
        assert!(notifier.is_showing());

        tokio::time::sleep(ms(2000)).await;
        assert_eq!(display.shown(), vec!["from the UI thread".to_string()]);
        assert!(!notifier.is_showing());
    }

    #[test]
    fn messages_posted_without_a_runtime_wait_for_one() {
        let display = MemoryDisplay::default();
        let notifier = Notifier::new(display.clone());

        notifier.info("early", ms(100));
        assert!(!notifier.is_showing());
        assert_eq!(notifier.pending(), 1);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(async {
            notifier.info("later", ms(100));
            tokio::time::sleep(ms(2000)).await;
        });

        assert_eq!(display.shown(), vec!["early".to_string(), "later".to_string()]);
        assert!(!notifier.is_showing());
    }

    #[tokio::test(start_paused = true)]
    async fn post_after_clear_is_displayed() {
        let display = MemoryDisplay::default();
        let notifier = Notifier::new(display.clone());

        notifier.info("dropped soon", ms(1000));
        notifier.info("never shown", ms(1000));
        tokio::time::sleep(ms(10)).await;
        notifier.clear();
        notifier.info("after clear", ms(1000));
        tokio::time::sleep(ms(3000)).await;

        assert_eq!(
            display.shown(),
            vec!["dropped soon".to_string(), "after clear".to_string()]
        );
    }
}
