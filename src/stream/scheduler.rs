//! Render scheduler - moves buffered text into the token stores on a fixed cadence
//!
//! Fragments can arrive far faster than a terminal can usefully redraw.
//! Instead of re-rendering per fragment, the scheduler drains both channel
//! buffers once per tick, so the view updates at most once per interval no
//! matter how chatty the backend is.

use super::session::StreamSession;
use super::tokens::{DisplayToken, split_units};
use crate::config::RenderConfig;
use crate::event::Channel;
use std::time::Duration;

/// What one tick changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Units pushed to the thinking store
    pub thinking: usize,
    /// Units pushed to the answer store
    pub answer: usize,
    /// Units folded into committed text across both stores
    pub committed: usize,
}

impl TickReport {
    pub fn changed(&self) -> bool {
        self.thinking > 0 || self.answer > 0 || self.committed > 0
    }

    fn add(&mut self, channel: Channel, count: usize) {
        match channel {
            Channel::Thinking => self.thinking += count,
            Channel::Answer => self.answer += count,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderScheduler {
    interval: Duration,
}

impl RenderScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_config(render: &RenderConfig) -> Self {
        Self::new(render.tick_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One render tick. Does nothing unless a request is in flight.
    pub fn tick(&self, session: &mut StreamSession) -> TickReport {
        if !session.is_active() {
            return TickReport::default();
        }
        flush(session)
    }
}

/// Drain both buffers into their stores regardless of cadence.
///
/// Used by every tick and once more when the backend signals completion so
/// text arriving after the last tick is never lost.
pub fn flush(session: &mut StreamSession) -> TickReport {
    let mut report = TickReport::default();

    for channel in Channel::ALL {
        let Some(pending) = session.channel_mut(channel).buffer.drain_if_non_empty() else {
            continue;
        };

        let tokens: Vec<DisplayToken> = split_units(&pending)
            .into_iter()
            .map(|unit| DisplayToken {
                id: session.issue_token_id(),
                text: unit.to_string(),
            })
            .collect();
        report.add(channel, tokens.len());

        let store = &mut session.channel_mut(channel).store;
        report.committed += store.push(tokens);
        report.committed += store.settle();

        session.advance_phase(channel);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::normalize::Normalizer;
    use crate::stream::session::Phase;

    fn active_session(soft: usize, hard: usize) -> StreamSession {
        let mut session = StreamSession::new(Normalizer::default(), soft, hard);
        session.submit("prompt").unwrap();
        session
    }

    fn scheduler() -> RenderScheduler {
        RenderScheduler::new(Duration::from_millis(60))
    }

    #[test]
    fn test_tick_batches_fragments() {
        let mut s = active_session(20, 100);
        for word in ["one ", "two ", "three"] {
            s.on_fragment(Channel::Answer, word);
        }
        // Nothing visible until the tick.
        assert!(s.store(Channel::Answer).is_empty());

        let report = scheduler().tick(&mut s);
        assert_eq!(report.answer, 5);
        assert_eq!(report.thinking, 0);
        assert_eq!(s.store(Channel::Answer).text(), "one two three");
    }

    #[test]
    fn test_idle_tick_is_noop() {
        let mut s = active_session(20, 100);
        let report = scheduler().tick(&mut s);
        assert!(!report.changed());
        assert_eq!(s.tokens_issued(), 0);
    }

    #[test]
    fn test_ids_increase_across_channels_and_ticks() {
        let mut s = active_session(20, 100);
        s.on_fragment(Channel::Thinking, "a b");
        s.on_fragment(Channel::Answer, "c");
        scheduler().tick(&mut s);
        s.on_fragment(Channel::Answer, " d");
        scheduler().tick(&mut s);

        let thinking: Vec<u64> = s.store(Channel::Thinking).in_flight().map(|t| t.id).collect();
        let answer: Vec<u64> = s.store(Channel::Answer).in_flight().map(|t| t.id).collect();
        assert_eq!(thinking, vec![1, 2, 3]);
        assert_eq!(answer, vec![4, 5, 6]);
    }

    #[test]
    fn test_large_burst_respects_bounds() {
        let mut s = active_session(20, 100);
        let burst = "w ".repeat(1000);
        s.on_fragment(Channel::Answer, &burst);

        let report = scheduler().tick(&mut s);
        assert_eq!(report.answer, 2000);
        assert_eq!(report.committed, 1980);
        let store = s.store(Channel::Answer);
        assert_eq!(store.in_flight_len(), 20);
        assert_eq!(store.text(), burst);
    }

    #[test]
    fn test_soft_bound_applies_each_tick() {
        let mut s = active_session(3, 10);
        s.on_fragment(Channel::Thinking, "a b c");
        let report = scheduler().tick(&mut s);
        assert_eq!(report.thinking, 5);
        assert_eq!(report.committed, 2);
        assert_eq!(s.store(Channel::Thinking).committed(), "a ");
        assert_eq!(s.store(Channel::Thinking).in_flight_len(), 3);
    }

    #[test]
    fn test_tick_after_completion_does_nothing() {
        let mut s = active_session(20, 100);
        s.on_fragment(Channel::Answer, "done");
        s.complete();
        assert_eq!(s.phase(), Phase::Complete);
        assert!(!scheduler().tick(&mut s).changed());
        assert_eq!(s.store(Channel::Answer).text(), "done");
    }

    #[test]
    fn test_lossless_for_fragmented_input() {
        let fragments = [
            "\n\n",
            "  Let me",
            " think.\n\n\n",
            "\n\nStep one",
            ": add\r\n",
            "\n\n\n\nStep two.",
        ];
        let mut s = active_session(4, 8);
        for (i, fragment) in fragments.iter().enumerate() {
            s.on_fragment(Channel::Thinking, fragment);
            if i % 2 == 1 {
                scheduler().tick(&mut s);
            }
        }
        s.complete();

        let normalizer = Normalizer::default();
        let expected: String = fragments.iter().map(|f| normalizer.apply(f)).collect();
        assert_eq!(
            s.store(Channel::Thinking).text(),
            expected.trim_start()
        );
    }
}
