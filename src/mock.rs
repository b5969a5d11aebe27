//! Recording pins for unit tests.

use crate::pins::SpiPins;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ChipSelect(bool),
    Clock(bool),
    DataOut(bool),
    /// MISO sampled, with the level returned
    DataIn(bool),
    Delay(u32),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

enum Miso {
    /// Echo the last MOSI level
    Loopback,
    /// Pop levels in order, low once exhausted
    Script(VecDeque<bool>),
}

pub struct RecordingPins {
    log: EventLog,
    miso: Miso,
    mosi: bool,
}

impl RecordingPins {
    pub fn loopback() -> (Self, EventLog) {
        Self::with_miso(Miso::Loopback)
    }

    /// MISO replays `levels`, one per sample
    pub fn scripted(levels: impl IntoIterator<Item = bool>) -> (Self, EventLog) {
        Self::with_miso(Miso::Script(levels.into_iter().collect()))
    }

    fn with_miso(miso: Miso) -> (Self, EventLog) {
        let log = EventLog::default();
        let pins = RecordingPins {
            log: Arc::clone(&log),
            miso,
            mosi: false,
        };
        (pins, log)
    }

    fn push(&self, event: Event) {
        self.log.lock().push(event);
    }
}

impl SpiPins for RecordingPins {
    fn set_chip_select(&mut self, level: bool) {
        self.push(Event::ChipSelect(level));
    }

    fn set_clock(&mut self, level: bool) {
        self.push(Event::Clock(level));
    }

    fn set_data_out(&mut self, level: bool) {
        self.mosi = level;
        self.push(Event::DataOut(level));
    }

    fn read_data_in(&mut self) -> bool {
        let level = match &mut self.miso {
            Miso::Loopback => self.mosi,
            Miso::Script(levels) => levels.pop_front().unwrap_or(false),
        };
        self.push(Event::DataIn(level));
        level
    }

    fn delay_us(&mut self, us: u32) {
        self.push(Event::Delay(us));
    }
}

/// Levels driven on MOSI, in order
pub fn mosi_levels(log: &EventLog) -> Vec<bool> {
    log.lock()
        .iter()
        .filter_map(|e| match e {
            Event::DataOut(level) => Some(*level),
            _ => None,
        })
        .collect()
}

/// Empties the log, returning what it held
pub fn take(log: &EventLog) -> Vec<Event> {
    std::mem::take(&mut *log.lock())
}
