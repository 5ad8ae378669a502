use std::fmt;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::{unwrap_payload, FormatError, Snapshot};

/// An ordered list of snapshots and a cursor into it.
///
/// Moving the cursor never changes the snapshots: playback shows recorded
/// states, it does not re-simulate the game.
#[derive(Debug, Default)]
pub struct History {
    snapshots: Vec<Snapshot>,
    /// `None` exactly when there are no snapshots.
    cursor: Option<usize>,
    autoplay: Option<Autoplay>,
}

/// The single autoplay timer.
#[derive(Clone, Copy, Debug)]
struct Autoplay {
    interval: Duration,
    next_due: Instant,
}

/// The outcome of [`History::load()`].
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: usize,
    /// Index in the file and reason for every record that was skipped.
    pub dropped: Vec<(usize, FormatError)>,
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loaded {} states", self.loaded)?;
        if let Some((idx, err)) = self.dropped.first() {
            write!(
                f,
                ", dropped {} (record {}: {})",
                self.dropped.len(),
                idx,
                err
            )?;
        }
        Ok(())
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The snapshot at the cursor.
    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|idx| self.snapshots.get(idx))
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Replaces the whole history with a recorded game.
    ///
    /// `file` must be a JSON list of records. Records that fail to convert are
    /// dropped with a warning and reported in the summary. If `file` is not a
    /// list at all, nothing changes.
    pub fn load(&mut self, file: Value) -> Result<LoadSummary, FormatError> {
        let Value::Array(records) = unwrap_payload(file)? else {
            return Err(FormatError::NotAList);
        };
        let mut summary = LoadSummary::default();
        let mut snapshots = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            match Snapshot::from_json(record) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(err) => {
                    warn!(record = idx, "Dropping malformed record: {}", err);
                    summary.dropped.push((idx, err));
                }
            }
        }
        summary.loaded = snapshots.len();
        self.cursor = if snapshots.is_empty() { None } else { Some(0) };
        self.snapshots = snapshots;
        self.stop_autoplay();
        debug!(
            loaded = summary.loaded,
            dropped = summary.dropped.len(),
            "Loaded history"
        );
        Ok(summary)
    }

    /// Appends a live update and moves the cursor to it.
    ///
    /// A malformed record is not appended and leaves the cursor alone.
    pub fn append(&mut self, record: Value) -> Result<usize, FormatError> {
        let snapshot = Snapshot::from_json(record).map_err(|err| {
            warn!("Dropping malformed update: {}", err);
            err
        })?;
        self.snapshots.push(snapshot);
        let last = self.snapshots.len() - 1;
        self.cursor = Some(last);
        Ok(last)
    }

    /// Moves the cursor by `delta`, stopping at either end.
    ///
    /// Returns whether the cursor moved.
    pub fn seek(&mut self, delta: isize) -> bool {
        match self.cursor {
            Some(idx) => self.seek_to(idx.saturating_add_signed(delta)),
            None => false,
        }
    }

    /// Moves the cursor to `index`, or to the last snapshot if `index` is past the end.
    pub fn seek_to(&mut self, index: usize) -> bool {
        let Some(last) = self.snapshots.len().checked_sub(1) else {
            return false;
        };
        let target = index.min(last);
        let moved = self.cursor != Some(target);
        self.cursor = Some(target);
        moved
    }

    pub fn next(&mut self) -> bool {
        self.seek(1)
    }

    pub fn previous(&mut self) -> bool {
        self.seek(-1)
    }

    pub fn reset(&mut self) -> bool {
        self.seek_to(0)
    }

    pub fn at_end(&self) -> bool {
        match self.cursor {
            Some(idx) => idx + 1 >= self.snapshots.len(),
            None => true,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.autoplay.is_some()
    }

    pub fn autoplay_interval(&self) -> Option<Duration> {
        self.autoplay.map(|timer| timer.interval)
    }

    /// Starts stepping forward once per `interval`, replacing any running timer.
    ///
    /// Returns `false` without starting when there is nothing left to play.
    pub fn start_autoplay(&mut self, interval: Duration, now: Instant) -> bool {
        self.autoplay = None;
        if self.at_end() {
            return false;
        }
        self.autoplay = Some(Autoplay {
            interval,
            next_due: now + interval,
        });
        true
    }

    /// Changes the speed of a running autoplay. The next step is one new
    /// `interval` after `now`.
    pub fn set_autoplay_interval(&mut self, interval: Duration, now: Instant) {
        if self.autoplay.is_some() {
            self.start_autoplay(interval, now);
        }
    }

    /// Stopping a stopped autoplay does nothing.
    pub fn stop_autoplay(&mut self) {
        self.autoplay = None;
    }

    /// Performs the steps that are due at `now` and returns how many there were.
    ///
    /// The timer is stopped as soon as the cursor reaches the last snapshot.
    pub fn poll_autoplay(&mut self, now: Instant) -> usize {
        let mut steps = 0;
        while let Some(timer) = self.autoplay.as_mut() {
            if now < timer.next_due {
                break;
            }
            timer.next_due += timer.interval;
            if self.next() {
                steps += 1;
            }
            if self.at_end() {
                self.autoplay = None;
            }
        }
        steps
    }

    /// When the next autoplay step is due, if autoplay is running.
    pub fn next_autoplay_step(&self) -> Option<Instant> {
        self.autoplay.map(|timer| timer.next_due)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::snapshot::tests::record;

    fn records(n: usize) -> Value {
        let names = ["alice", "bob"];
        Value::Array((0..n).map(|i| record(names[i % 2], json!({}))).collect())
    }

    #[test]
    fn empty_history() {
        let mut history = History::new();
        let summary = history.load(json!([])).unwrap();
        assert_eq!(summary.loaded, 0);
        assert_eq!(summary.to_string(), "Loaded 0 states");
        assert_eq!(history.cursor(), None);
        assert!(history.current().is_none());
        assert!(!history.next());
        assert!(!history.reset());
        assert!(!history.seek_to(3));
        assert!(!history.start_autoplay(Duration::from_millis(10), Instant::now()));
    }

    #[test]
    fn malformed_records_are_dropped_on_load() {
        let mut file = records(3);
        file[1].as_object_mut().unwrap().remove("players");
        let mut history = History::new();
        let summary = history.load(file).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(summary.loaded, 2);
        assert_eq!(summary.dropped.len(), 1);
        assert_eq!(summary.dropped[0].0, 1);
        assert!(summary
            .to_string()
            .starts_with("Loaded 2 states, dropped 1 (record 1: "));
    }

    #[test]
    fn load_rejects_non_lists_without_changes() {
        let mut history = History::new();
        history.load(records(2)).unwrap();
        history.next();
        assert!(matches!(
            history.load(json!({"rep": {}})),
            Err(FormatError::NotAList)
        ));
        assert_eq!(history.len(), 2);
        assert_eq!(history.cursor(), Some(1));
    }

    #[test]
    fn append_moves_cursor_to_the_end() {
        let mut history = History::new();
        history.load(records(3)).unwrap();
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.append(record("bob", json!({}))).unwrap(), 3);
        assert_eq!(history.len(), 4);
        assert_eq!(history.cursor(), Some(3));

        history.seek_to(1);
        assert!(history.append(json!({"rep": {"env": {}}})).is_err());
        assert_eq!(history.len(), 4);
        assert_eq!(history.cursor(), Some(1));
    }

    #[test]
    fn seeking_is_clamped() {
        let mut history = History::new();
        history.load(records(5)).unwrap();
        assert!(!history.previous());
        assert_eq!(history.cursor(), Some(0));
        assert!(history.seek(10));
        assert_eq!(history.cursor(), Some(4));
        assert!(!history.next());
        assert!(history.seek(-2));
        assert_eq!(history.cursor(), Some(2));
        assert!(history.seek(-100));
        assert_eq!(history.cursor(), Some(0));
        assert!(history.seek_to(99));
        assert_eq!(history.cursor(), Some(4));
        assert!(history.reset());
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.current().unwrap().next_player_name(), "alice");
    }

    #[test]
    fn autoplay_steps_once_per_interval_and_stops_at_the_end() {
        let mut history = History::new();
        history.load(records(5)).unwrap();
        let interval = Duration::from_millis(100);
        let start = Instant::now();
        assert!(history.start_autoplay(interval, start));

        assert_eq!(history.poll_autoplay(start + Duration::from_millis(99)), 0);
        assert_eq!(history.cursor(), Some(0));
        for step in 1..=4 {
            let now = start + interval * step;
            assert_eq!(history.poll_autoplay(now), 1);
            assert_eq!(history.cursor(), Some(step as usize));
        }
        assert!(!history.is_playing());
        assert_eq!(history.next_autoplay_step(), None);
        assert_eq!(history.poll_autoplay(start + interval * 10), 0);
        assert_eq!(history.cursor(), Some(4));
    }

    #[test]
    fn late_polls_catch_up() {
        let mut history = History::new();
        history.load(records(5)).unwrap();
        let interval = Duration::from_millis(50);
        let start = Instant::now();
        history.start_autoplay(interval, start);
        assert_eq!(history.poll_autoplay(start + Duration::from_millis(120)), 2);
        assert_eq!(history.cursor(), Some(2));
        assert!(history.is_playing());
    }

    #[test]
    fn changing_the_interval_replaces_the_timer() {
        let mut history = History::new();
        history.load(records(5)).unwrap();
        let start = Instant::now();
        history.start_autoplay(Duration::from_millis(100), start);
        let later = start + Duration::from_millis(60);
        history.set_autoplay_interval(Duration::from_millis(500), later);
        assert_eq!(history.autoplay_interval(), Some(Duration::from_millis(500)));
        // The old deadline is gone.
        assert_eq!(history.poll_autoplay(start + Duration::from_millis(100)), 0);
        assert_eq!(history.poll_autoplay(later + Duration::from_millis(500)), 1);
        assert_eq!(history.cursor(), Some(1));

        history.stop_autoplay();
        history.stop_autoplay();
        assert!(!history.is_playing());
        history.set_autoplay_interval(Duration::from_millis(10), later);
        assert!(!history.is_playing());
    }

    #[test]
    fn loading_stops_autoplay() {
        let mut history = History::new();
        history.load(records(3)).unwrap();
        history.start_autoplay(Duration::from_millis(10), Instant::now());
        history.load(records(3)).unwrap();
        assert!(!history.is_playing());
    }
}
