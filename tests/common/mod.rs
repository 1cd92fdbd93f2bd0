//! Recording doubles for the pin, peripheral and cycle counter traits.
//!
//! Every double writes into one shared `Recorder`, so tests can check the
//! relative order of chip-select edges, direction switches and transfers, and
//! the counter value at which each of them happened.

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use embedded_hal::digital::PinState;
use tle5012_ssc::{
    BusConfiguration, ChipSelectBinding, ClockError, CycleCounter, DigitalPin, HalfDuplexBus,
    HalfDuplexPeripheral, LineDirection, PeripheralError, PinMode, Polarity, SlaveNumber,
};

pub const CS_NAMES: [&str; 4] = ["cs0", "cs1", "cs2", "cs3"];

/// Counter ticks a mocked transfer takes per word
pub const TICKS_PER_WORD: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CounterStart,
    Configure(&'static str, PinMode),
    Write(&'static str, PinState),
    Direction(LineDirection),
    Transmit(Vec<u16>),
    Receive(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transmit,
    Receive,
    Direction(LineDirection),
}

/// Error reported by a [`MockPin`] told to fail, naming the pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFault(pub &'static str);

#[derive(Debug)]
pub struct Recorder {
    events: RefCell<Vec<(u32, Event)>>,
    ticks: Cell<u32>,
    clock_hz: Cell<u32>,
    counter_fails: Cell<Option<ClockError>>,
    responses: RefCell<VecDeque<u16>>,
    faults: RefCell<Vec<(Stage, PeripheralError)>>,
    pin_faults: RefCell<Vec<(&'static str, PinState)>>,
}

impl Recorder {
    pub fn new(clock_hz: u32) -> Rc<Self> {
        Rc::new(Self {
            events: RefCell::new(Vec::new()),
            ticks: Cell::new(0),
            clock_hz: Cell::new(clock_hz),
            counter_fails: Cell::new(None),
            responses: RefCell::new(VecDeque::new()),
            faults: RefCell::new(Vec::new()),
            pin_faults: RefCell::new(Vec::new()),
        })
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push((self.ticks.get(), event));
    }

    fn advance(&self, ticks: u32) -> u32 {
        let now = self.ticks.get().wrapping_add(ticks);
        self.ticks.set(now);
        now
    }

    fn take_fault(&self, stage: Stage) -> Option<PeripheralError> {
        let mut faults = self.faults.borrow_mut();
        let position = faults.iter().position(|(s, _)| *s == stage)?;
        Some(faults.remove(position).1)
    }

    fn take_pin_fault(&self, name: &'static str, level: PinState) -> bool {
        let mut faults = self.pin_faults.borrow_mut();
        match faults.iter().position(|f| *f == (name, level)) {
            Some(position) => {
                faults.remove(position);
                true
            }
            None => false,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn timed_events(&self) -> Vec<(u32, Event)> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn set_clock_hz(&self, clock_hz: u32) {
        self.clock_hz.set(clock_hz);
    }

    pub fn set_ticks(&self, ticks: u32) {
        self.ticks.set(ticks);
    }

    pub fn fail_counter(&self, error: ClockError) {
        self.counter_fails.set(Some(error));
    }

    pub fn queue_response(&self, words: &[u16]) {
        self.responses.borrow_mut().extend(words.iter().copied());
    }

    pub fn fail_next(&self, stage: Stage, error: PeripheralError) {
        self.faults.borrow_mut().push((stage, error));
    }

    /// Make the next write of `level` to pin `name` fail without changing it
    pub fn fail_write(&self, name: &'static str, level: PinState) {
        self.pin_faults.borrow_mut().push((name, level));
    }

    /// Counter value at which the first event equal to `event` was recorded
    pub fn tick_of(&self, event: &Event) -> u32 {
        self.events
            .borrow()
            .iter()
            .find(|(_, e)| e == event)
            .map(|(t, _)| *t)
            .unwrap_or_else(|| panic!("event {event:?} not recorded"))
    }
}

#[derive(Debug)]
pub struct MockPin {
    name: &'static str,
    polarity: Polarity,
    level: PinState,
    recorder: Rc<Recorder>,
}

impl MockPin {
    pub fn new(recorder: &Rc<Recorder>, name: &'static str, polarity: Polarity) -> Self {
        Self {
            name,
            polarity,
            level: PinState::Low,
            recorder: Rc::clone(recorder),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn level(&self) -> PinState {
        self.level
    }
}

impl DigitalPin for MockPin {
    type Error = PinFault;

    fn configure(&mut self, mode: PinMode) -> Result<(), Self::Error> {
        self.recorder.record(Event::Configure(self.name, mode));
        Ok(())
    }

    fn read(&mut self) -> Result<PinState, Self::Error> {
        Ok(self.level)
    }

    fn write(&mut self, level: PinState) -> Result<(), Self::Error> {
        if self.recorder.take_pin_fault(self.name, level) {
            return Err(PinFault(self.name));
        }
        self.level = level;
        self.recorder.record(Event::Write(self.name, level));
        Ok(())
    }

    fn polarity(&self) -> Polarity {
        self.polarity
    }
}

#[derive(Debug)]
pub struct MockPeripheral {
    recorder: Rc<Recorder>,
}

impl MockPeripheral {
    pub fn new(recorder: &Rc<Recorder>) -> Self {
        Self {
            recorder: Rc::clone(recorder),
        }
    }
}

impl HalfDuplexPeripheral for MockPeripheral {
    fn set_direction(&mut self, direction: LineDirection) -> Result<(), PeripheralError> {
        self.recorder.record(Event::Direction(direction));
        match self.recorder.take_fault(Stage::Direction(direction)) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn transmit(&mut self, words: &[u16], _timeout_ms: u32) -> Result<(), PeripheralError> {
        self.recorder.record(Event::Transmit(words.to_vec()));
        if let Some(error) = self.recorder.take_fault(Stage::Transmit) {
            return Err(error);
        }
        self.recorder.advance(TICKS_PER_WORD * words.len() as u32);
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u16], _timeout_ms: u32) -> Result<(), PeripheralError> {
        self.recorder.record(Event::Receive(buffer.len()));
        if let Some(error) = self.recorder.take_fault(Stage::Receive) {
            return Err(error);
        }
        let mut responses = self.recorder.responses.borrow_mut();
        for word in buffer.iter_mut() {
            *word = responses.pop_front().unwrap_or(0xFFFF);
        }
        self.recorder.advance(TICKS_PER_WORD * buffer.len() as u32);
        Ok(())
    }
}

/// Counter that moves forward by one tick on every read
#[derive(Debug)]
pub struct MockCounter {
    recorder: Rc<Recorder>,
}

impl MockCounter {
    pub fn new(recorder: &Rc<Recorder>) -> Self {
        Self {
            recorder: Rc::clone(recorder),
        }
    }
}

impl CycleCounter for MockCounter {
    fn start(&mut self) -> Result<(), ClockError> {
        if let Some(error) = self.recorder.counter_fails.get() {
            return Err(error);
        }
        self.recorder.record(Event::CounterStart);
        Ok(())
    }

    fn clock_hz(&self) -> u32 {
        self.recorder.clock_hz.get()
    }

    fn ticks(&self) -> u32 {
        self.recorder.advance(1)
    }
}

pub type MockBus = HalfDuplexBus<MockPeripheral, MockPin, MockPin, MockPin, MockCounter>;

pub fn chip_select(recorder: &Rc<Recorder>, slave: SlaveNumber) -> ChipSelectBinding<MockPin> {
    ChipSelectBinding::new(
        slave,
        MockPin::new(recorder, CS_NAMES[slave.index()], Polarity::ActiveLow),
    )
}

pub fn configuration(
    recorder: &Rc<Recorder>,
) -> BusConfiguration<MockPeripheral, MockPin, MockPin> {
    BusConfiguration::new(
        MockPeripheral::new(recorder),
        MockPin::new(recorder, "sck", Polarity::ActiveHigh),
        MockPin::new(recorder, "mosi", Polarity::ActiveHigh),
    )
}

/// Uninitialized bus with chip-selects attached for `slaves`
pub fn bus(recorder: &Rc<Recorder>, slaves: &[SlaveNumber]) -> MockBus {
    let mut bus = HalfDuplexBus::new(configuration(recorder), MockCounter::new(recorder));
    for &slave in slaves {
        bus.attach_select(chip_select(recorder, slave)).unwrap();
    }
    bus
}

/// Initialized bus with `slave` bound, event log cleared
pub fn ready_bus(recorder: &Rc<Recorder>, slaves: &[SlaveNumber], slave: SlaveNumber) -> MockBus {
    let mut bus = bus(recorder, slaves);
    bus.initialize().unwrap();
    bus.bind_select(slave).unwrap();
    recorder.clear();
    bus
}

/// Replays the log and checks no two chip-selects were ever low together
pub fn assert_single_select(events: &[Event]) {
    let mut low = [false; 4];
    for event in events {
        if let Event::Write(name, level) = event {
            if let Some(index) = CS_NAMES.iter().position(|n| n == name) {
                low[index] = *level == PinState::Low;
                let active = low.iter().filter(|l| **l).count();
                assert!(active <= 1, "{active} chip-selects active after {event:?}");
            }
        }
    }
}

/// Number of writes recorded for pin `name`
pub fn writes_to(events: &[Event], name: &str) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::Write(n, _) if *n == name))
        .count()
}
