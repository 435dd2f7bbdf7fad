//! The timestamp-ordered coincidence queue.
//!
//! Events from both frontends are buffered sorted by trigger time, in any
//! arrival order. An event leaves the buffer once it is provably unmatched
//! by anything still to come (the buffered span exceeds `max_span`) or on a
//! flush. Leaving the buffer means one `on_single` emission, preceded by an
//! `on_coinc` emission for every cross-source partner within the window.
//! Each matched pair is reported from both vantages: once while popping the
//! earlier event and once, roles swapped, while popping the later one.

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use super::constants::*;
use super::error::{QueueError, SinkError};
use super::event::Event;

/// Size of the per-event-id singles counters in [`Diagnostics`].
pub const MAX_TYPES: usize = 8;

/// Queue statistics, refreshed on every push.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Buffered events after the push.
    pub size: usize,
    /// Incoming event time minus the oldest buffered time, microseconds.
    pub time_diff: f64,
    /// Pops that found at least one coincidence.
    pub n_coinc: u64,
    /// Singles emitted, indexed by event id.
    pub n_singles: [u64; MAX_TYPES],
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics {
            size: 0,
            time_diff: 0.0,
            n_coinc: 0,
            n_singles: [0; MAX_TYPES],
        }
    }

    /// All counters back to zero.
    pub fn reset(&mut self) {
        *self = Diagnostics::new();
    }

    fn record_pop(&mut self, found_coinc: bool, singles_id: u16) {
        if found_coinc {
            self.n_coinc += 1;
        }
        if (singles_id as usize) < MAX_TYPES {
            self.n_singles[singles_id as usize] += 1;
        } else {
            spdlog::warn!(
                "Singles event id {} >= {}, not counted in diagnostics",
                singles_id,
                MAX_TYPES
            );
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new()
    }
}

/// Receives the queue's emissions.
///
/// Errors propagate unchanged out of `push`/`flush`; the event that was
/// being handled counts as consumed either way.
pub trait EventHandler {
    /// An event leaving the queue in its singles role. Called exactly once
    /// per buffered event, in trigger-time order.
    fn on_single(&mut self, event: Event) -> Result<(), SinkError>;

    /// A matched cross-source pair. `popped` is the event currently leaving
    /// the queue, `partner` its match (still buffered, or already emitted
    /// when this is the swapped report).
    fn on_coinc(&mut self, popped: &Event, partner: &Event) -> Result<(), SinkError>;
}

/// Queue tuning. All times are in ticks of [`CLOCK_HZ`].
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Coincidence window.
    pub window: u64,
    /// Maximum buffered time span before events are drained.
    pub max_span: u64,
    /// Hard bound on buffered events; the exhaustion path runs beyond it.
    pub max_events: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            window: us_to_ticks(DEFAULT_COINC_WINDOW_US),
            max_span: sec_to_ticks(DEFAULT_MAX_BUFFERED_SEC),
            max_events: DEFAULT_MAX_QUEUED_EVENTS,
        }
    }
}

/// The queue itself. Single-threaded; owns every buffered event.
#[derive(Debug, Default)]
pub struct Queue {
    config: QueueConfig,
    /// Buffered events, keyed by (trigger time, insertion sequence) so ties
    /// stay in arrival order.
    events: BTreeMap<(u64, u64), Event>,
    /// Recently popped events still within one window of the pop frontier,
    /// kept for the swapped half of each pair report.
    recent: VecDeque<(u64, Event)>,
    seq: u64,
}

impl Queue {
    pub fn new(config: QueueConfig) -> Self {
        Queue {
            config,
            events: BTreeMap::new(),
            recent: VecDeque::new(),
            seq: 0,
        }
    }

    /// Number of buffered events.
    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Buffered time span in ticks (newest minus oldest).
    pub fn span(&self) -> u64 {
        match (self.events.first_key_value(), self.events.last_key_value()) {
            (Some((&(oldest, _), _)), Some((&(newest, _), _))) => newest - oldest,
            _ => 0,
        }
    }

    /// Insert an event with its trigger time, then drain until the buffered
    /// span is back within bounds. Every drained event goes through the
    /// handler synchronously.
    pub fn push<H: EventHandler>(
        &mut self,
        time: u64,
        event: Event,
        mut diagnostics: Option<&mut Diagnostics>,
        handler: &mut H,
    ) -> Result<(), QueueError> {
        if self.events.len() >= self.config.max_events {
            spdlog::error!(
                "Event queue exceeded {} buffered events; draining it completely and \
                 retrying. This can cause coincidences to be missed!",
                self.config.max_events
            );
            self.flush(None, diagnostics.as_deref_mut(), handler)?;
            if self.events.len() >= self.config.max_events {
                return Err(QueueError::Exhausted(self.events.len()));
            }
        }

        self.seq += 1;
        self.events.insert((time, self.seq), event);

        let oldest = self
            .events
            .first_key_value()
            .map(|(&(t, _), _)| t)
            .unwrap_or(time);
        let tdiff = tick_diff_to_us(time as i64 - oldest as i64);

        while self.span() > self.config.max_span {
            self.pop(diagnostics.as_deref_mut(), handler)?;
        }

        if let Some(d) = diagnostics {
            d.size = self.events.len();
            d.time_diff = tdiff;
        }
        Ok(())
    }

    /// Emit the earliest buffered event: its coincidences first, then the
    /// event itself as a single.
    fn pop<H: EventHandler>(
        &mut self,
        diagnostics: Option<&mut Diagnostics>,
        handler: &mut H,
    ) -> Result<(), QueueError> {
        let ((t0, _), event) = match self.events.pop_first() {
            Some(entry) => entry,
            None => return Ok(()),
        };

        // Drop history that can no longer match anything being popped.
        while let Some(&(t, _)) = self.recent.front() {
            if t < t0 && t0 - t > self.config.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }

        let mut found_coinc = false;

        // Partners still buffered (at or after t0, contiguous by sort order).
        for (&(t, _), partner) in self.events.iter() {
            if t - t0 > self.config.window {
                break;
            }
            if partner.header.event_id != event.header.event_id {
                found_coinc = true;
                handler
                    .on_coinc(&event, partner)
                    .map_err(QueueError::Handler)?;
            }
        }

        // Partners already emitted: the swapped half of each pair report.
        for (t, earlier) in self.recent.iter() {
            if t.abs_diff(t0) <= self.config.window
                && earlier.header.event_id != event.header.event_id
            {
                found_coinc = true;
                handler
                    .on_coinc(&event, earlier)
                    .map_err(QueueError::Handler)?;
            }
        }

        let singles_id = event.header.event_id;
        self.recent.push_back((t0, event.clone()));
        handler.on_single(event).map_err(QueueError::Handler)?;

        if let Some(d) = diagnostics {
            d.record_pop(found_coinc, singles_id);
        }
        Ok(())
    }

    /// Drain the queue. `max_time` bounds the wall-clock seconds spent; on
    /// expiry the remainder is discarded with a warning and `Ok(true)` is
    /// returned. `None` drains to empty.
    pub fn flush<H: EventHandler>(
        &mut self,
        max_time: Option<f64>,
        mut diagnostics: Option<&mut Diagnostics>,
        handler: &mut H,
    ) -> Result<bool, QueueError> {
        let begin = Instant::now();
        while !self.events.is_empty() {
            if let Some(limit) = max_time {
                if begin.elapsed().as_secs_f64() >= limit {
                    spdlog::warn!(
                        "Flush deadline of {} s reached, clearing the event queue \
                         (skipping {} events)",
                        limit,
                        self.events.len()
                    );
                    self.events.clear();
                    self.recent.clear();
                    if let Some(d) = diagnostics {
                        d.size = 0;
                        d.time_diff = 0.0;
                    }
                    return Ok(true);
                }
            }
            self.pop(diagnostics.as_deref_mut(), handler)?;
            if let Some(d) = diagnostics.as_deref_mut() {
                d.size = self.events.len();
                d.time_diff = 0.0;
            }
        }
        self.recent.clear();
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{head_event, tail_event};

    /// Records emissions as (event id, trigger time) pairs.
    #[derive(Default)]
    struct Collector {
        singles: Vec<(u16, u64)>,
        coincs: Vec<((u16, u64), (u16, u64))>,
        fail_after_singles: Option<usize>,
    }

    fn id_time(event: &Event) -> (u16, u64) {
        let time = crate::modules::trigger_time(event)
            .expect("fixture event decodes")
            .expect("fixture event has a trigger time");
        (event.header.event_id, time)
    }

    impl EventHandler for Collector {
        fn on_single(&mut self, event: Event) -> Result<(), SinkError> {
            if let Some(limit) = self.fail_after_singles {
                if self.singles.len() >= limit {
                    return Err("consumer failed".into());
                }
            }
            self.singles.push(id_time(&event));
            Ok(())
        }

        fn on_coinc(&mut self, popped: &Event, partner: &Event) -> Result<(), SinkError> {
            self.coincs.push((id_time(popped), id_time(partner)));
            Ok(())
        }
    }

    fn queue(window: u64, max_span: u64) -> Queue {
        Queue::new(QueueConfig {
            window,
            max_span,
            max_events: 1 << 20,
        })
    }

    const HEAD: u16 = crate::constants::HEAD_EVENT;
    const TAIL: u16 = crate::constants::TAIL_EVENT;

    #[test]
    fn simple_pair_in_order() {
        let mut q = queue(10, 1_000_000);
        let mut c = Collector::default();
        q.push(1000, head_event(1000, 0), None, &mut c).unwrap();
        q.push(1005, tail_event(1005, 0), None, &mut c).unwrap();
        assert!(c.singles.is_empty()); // nothing drained yet
        assert!(!q.flush(None, None, &mut c).unwrap());

        assert_eq!(c.singles, vec![(HEAD, 1000), (TAIL, 1005)]);
        assert_eq!(
            c.coincs,
            vec![
                ((HEAD, 1000), (TAIL, 1005)),
                ((TAIL, 1005), (HEAD, 1000)),
            ]
        );
    }

    #[test]
    fn pair_reversed_arrival() {
        let mut q = queue(10, 1_000_000);
        let mut c = Collector::default();
        q.push(1005, tail_event(1005, 0), None, &mut c).unwrap();
        q.push(1000, head_event(1000, 1), None, &mut c).unwrap();
        q.flush(None, None, &mut c).unwrap();

        // Emission order follows trigger time, not arrival.
        assert_eq!(c.singles, vec![(HEAD, 1000), (TAIL, 1005)]);
        assert_eq!(
            c.coincs,
            vec![
                ((HEAD, 1000), (TAIL, 1005)),
                ((TAIL, 1005), (HEAD, 1000)),
            ]
        );
    }

    #[test]
    fn outside_window_no_coincidence() {
        let mut q = queue(10, 1_000_000);
        let mut c = Collector::default();
        q.push(1000, head_event(1000, 0), None, &mut c).unwrap();
        q.push(1100, tail_event(1100, 0), None, &mut c).unwrap();
        q.flush(None, None, &mut c).unwrap();
        assert_eq!(c.singles.len(), 2);
        assert!(c.coincs.is_empty());
    }

    #[test]
    fn three_heads_one_tail() {
        let mut q = queue(10, 1_000_000);
        let mut c = Collector::default();
        for (i, t) in [100u64, 102, 103].into_iter().enumerate() {
            q.push(t, head_event(t, i as u32), None, &mut c).unwrap();
        }
        q.push(105, tail_event(105, 0), None, &mut c).unwrap();
        q.flush(None, None, &mut c).unwrap();

        assert_eq!(c.singles.len(), 4);
        assert_eq!(c.coincs.len(), 6);
        // Forward reports while popping each head...
        assert!(c.coincs.contains(&((HEAD, 100), (TAIL, 105))));
        assert!(c.coincs.contains(&((HEAD, 102), (TAIL, 105))));
        assert!(c.coincs.contains(&((HEAD, 103), (TAIL, 105))));
        // ...and the swapped reports while popping the tail.
        assert!(c.coincs.contains(&((TAIL, 105), (HEAD, 100))));
        assert!(c.coincs.contains(&((TAIL, 105), (HEAD, 102))));
        assert!(c.coincs.contains(&((TAIL, 105), (HEAD, 103))));
        // Never a head paired with a head.
        assert!(c
            .coincs
            .iter()
            .all(|&((id_a, _), (id_b, _))| id_a != id_b));
    }

    #[test]
    fn span_drain_pops_stale_events() {
        let mut q = queue(10, 1000);
        let mut c = Collector::default();
        q.push(0, head_event(0, 0), None, &mut c).unwrap();
        q.push(999, head_event(999, 1), None, &mut c).unwrap();
        assert!(c.singles.is_empty());
        // Span jumps to 2000 > 1000: the queue drains until it is bounded
        // again, which also takes the event at 999 (span 1001 on its own).
        q.push(2000, head_event(2000, 2), None, &mut c).unwrap();
        assert_eq!(c.singles, vec![(HEAD, 0), (HEAD, 999)]);
        assert_eq!(q.size(), 1);
        assert!(q.span() <= 1000);
    }

    #[test]
    fn span_bound_holds_after_every_push() {
        let mut q = queue(5, 100);
        let mut c = Collector::default();
        for (i, t) in [50u64, 10, 400, 30, 401, 900].into_iter().enumerate() {
            q.push(t, head_event(t, i as u32), None, &mut c).unwrap();
            assert!(q.span() <= 100);
        }
    }

    #[test]
    fn emission_order_is_monotone() {
        let mut q = queue(2, 50);
        let mut c = Collector::default();
        for (i, t) in [500u64, 300, 800, 600, 900, 1200, 1100].into_iter().enumerate() {
            // Stragglers within the buffered span sort back in.
            q.push(t, head_event(t, i as u32), None, &mut c).unwrap();
        }
        q.flush(None, None, &mut c).unwrap();
        let times: Vec<u64> = c.singles.iter().map(|&(_, t)| t).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(times.len(), 7);
    }

    #[test]
    fn equal_times_keep_arrival_order() {
        let mut q = queue(0, 1_000_000);
        let mut c = Collector::default();
        q.push(700, tail_event(700, 5), None, &mut c).unwrap();
        q.push(700, head_event(700, 6), None, &mut c).unwrap();
        q.flush(None, None, &mut c).unwrap();

        // Arrival order on the tie, and a zero-width window still pairs.
        assert_eq!(c.singles, vec![(TAIL, 700), (HEAD, 700)]);
        assert_eq!(
            c.coincs,
            vec![((TAIL, 700), (HEAD, 700)), ((HEAD, 700), (TAIL, 700))]
        );
    }

    #[test]
    fn flush_deadline_discards_remainder() {
        let mut q = queue(10, 1_000_000);
        let mut c = Collector::default();
        let mut diag = Diagnostics::new();
        for i in 0..1000u64 {
            q.push(i * 20, head_event(i * 20, i as u32), Some(&mut diag), &mut c)
                .unwrap();
        }
        let timed_out = q.flush(Some(0.0), Some(&mut diag), &mut c).unwrap();
        assert!(timed_out);
        assert!(q.is_empty());
        assert_eq!(diag.size, 0);
        // Discarded events were never reported as singles.
        let emitted: u64 = diag.n_singles.iter().sum();
        assert!(emitted <= 1000);
        assert_eq!(emitted as usize, c.singles.len());
    }

    #[test]
    fn capacity_exhaustion_drains_and_retries() {
        let mut q = Queue::new(QueueConfig {
            window: 10,
            max_span: 1_000_000,
            max_events: 2,
        });
        let mut c = Collector::default();
        q.push(10, head_event(10, 0), None, &mut c).unwrap();
        q.push(20, head_event(20, 1), None, &mut c).unwrap();
        assert_eq!(q.size(), 2);
        // The third push hits the bound: everything drains, then it inserts.
        q.push(30, head_event(30, 2), None, &mut c).unwrap();
        assert_eq!(q.size(), 1);
        assert_eq!(c.singles, vec![(HEAD, 10), (HEAD, 20)]);
    }

    #[test]
    fn zero_capacity_is_fatal() {
        let mut q = Queue::new(QueueConfig {
            window: 10,
            max_span: 1_000_000,
            max_events: 0,
        });
        let mut c = Collector::default();
        let err = q.push(10, head_event(10, 0), None, &mut c);
        assert!(matches!(err, Err(QueueError::Exhausted(_))));
    }

    #[test]
    fn handler_errors_propagate() {
        let mut q = queue(10, 1_000_000);
        let mut c = Collector {
            fail_after_singles: Some(1),
            ..Default::default()
        };
        q.push(100, head_event(100, 0), None, &mut c).unwrap();
        q.push(5000, head_event(5000, 1), None, &mut c).unwrap();
        let result = q.flush(None, None, &mut c);
        assert!(matches!(result, Err(QueueError::Handler(_))));
        // The offending event was consumed before the error surfaced.
        assert_eq!(q.size(), 0);
        assert_eq!(c.singles.len(), 1);
    }

    #[test]
    fn diagnostics_track_pushes_and_pops() {
        let mut q = queue(10, 1_000_000);
        let mut c = Collector::default();
        let mut diag = Diagnostics::new();
        q.push(1000, head_event(1000, 0), Some(&mut diag), &mut c)
            .unwrap();
        assert_eq!(diag.size, 1);
        assert_eq!(diag.time_diff, 0.0);

        q.push(1004, tail_event(1004, 0), Some(&mut diag), &mut c)
            .unwrap();
        assert_eq!(diag.size, 2);
        // 4 ns at the nanosecond clock.
        assert!((diag.time_diff - 0.004).abs() < 1e-12);

        q.flush(None, Some(&mut diag), &mut c).unwrap();
        assert_eq!(diag.n_singles[HEAD as usize], 1);
        assert_eq!(diag.n_singles[TAIL as usize], 1);
        // Both pops saw the same pair.
        assert_eq!(diag.n_coinc, 2);
        assert_eq!(diag.size, 0);
    }
}
