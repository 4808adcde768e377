//! Scripted hardware for host-side unit tests.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::constants::kbc::{DATA_PORT, STATUS_COMMAND_PORT};
use crate::error::{Error, Result};
use crate::irq::InterruptController;
use crate::port::{Delay, PortIo};

/// Status byte with only OBF set
pub const OBF: u8 = 0x01;
/// Status byte with OBF and AUX set
pub const OBF_AUX: u8 = 0x21;
/// Status byte with only IBF set
pub const IBF: u8 = 0x02;

/// Mock controller: every read pops the next scripted byte for that port,
/// falling back to an idle value once the script runs dry.
#[derive(Debug, Default)]
pub struct MockPorts {
    reads: HashMap<u16, VecDeque<u8>>,
    idle: HashMap<u16, u8>,
    failing_reads: BTreeSet<u16>,
    failing_writes: BTreeSet<u16>,
    writes: Vec<(u16, u8)>,
    read_count: HashMap<u16, usize>,
}

impl MockPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, port: u16, value: u8) {
        self.reads.entry(port).or_default().push_back(value);
    }

    pub fn push_status(&mut self, status: u8) {
        self.push(STATUS_COMMAND_PORT, status);
    }

    pub fn push_data(&mut self, data: u8) {
        self.push(DATA_PORT, data);
    }

    /// Queue a byte as it would arrive from an interrupt: status then data
    pub fn push_byte(&mut self, status: u8, data: u8) {
        self.push_status(status);
        self.push_data(data);
    }

    /// Script one passthrough exchange answered with `ack`
    pub fn push_exchange(&mut self, ack: u8) {
        // command write, argument write, acknowledge read
        self.push_status(0x00);
        self.push_status(0x00);
        self.push_status(OBF);
        self.push_data(ack);
    }

    pub fn set_idle(&mut self, port: u16, value: u8) {
        self.idle.insert(port, value);
    }

    pub fn fail_reads_on(&mut self, port: u16) {
        self.failing_reads.insert(port);
    }

    pub fn fail_writes_on(&mut self, port: u16) {
        self.failing_writes.insert(port);
    }

    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes
    }

    pub fn writes_to(&self, port: u16) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(p, _)| *p == port)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn reads_of(&self, port: u16) -> usize {
        self.read_count.get(&port).copied().unwrap_or(0)
    }

    pub fn pending_reads(&self, port: u16) -> usize {
        self.reads.get(&port).map_or(0, VecDeque::len)
    }
}

impl PortIo for MockPorts {
    fn read(&mut self, port: u16) -> Result<u8> {
        if self.failing_reads.contains(&port) {
            return Err(Error::ReadFailed { port });
        }
        *self.read_count.entry(port).or_default() += 1;
        let scripted = self.reads.get_mut(&port).and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| self.idle.get(&port).copied().unwrap_or(0)))
    }

    fn write(&mut self, port: u16, value: u8) -> Result<()> {
        if self.failing_writes.contains(&port) {
            return Err(Error::WriteFailed { port });
        }
        self.writes.push((port, value));
        Ok(())
    }
}

/// Delay that returns immediately and remembers how often it was asked to wait
#[derive(Debug, Default)]
pub struct NoDelay {
    pub calls: u32,
    pub total_us: u64,
}

impl Delay for NoDelay {
    fn delay_us(&mut self, micros: u32) {
        self.calls += 1;
        self.total_us += u64::from(micros);
    }
}

/// Interrupt controller that records mask state per line
#[derive(Debug)]
pub struct MockPic {
    pub masked: BTreeSet<u8>,
    pub log: Vec<(u8, bool)>,
    /// Lines whose unmask fails with `InvalidLine`
    pub refuse_unmask: BTreeSet<u8>,
}

impl Default for MockPic {
    fn default() -> Self {
        Self {
            masked: (0..16).collect(),
            log: Vec::new(),
            refuse_unmask: BTreeSet::new(),
        }
    }
}

impl InterruptController for MockPic {
    fn mask(&mut self, line: u8) -> Result<()> {
        self.masked.insert(line);
        self.log.push((line, true));
        Ok(())
    }

    fn unmask(&mut self, line: u8) -> Result<()> {
        if self.refuse_unmask.contains(&line) {
            return Err(Error::InvalidLine(line));
        }
        self.masked.remove(&line);
        self.log.push((line, false));
        Ok(())
    }
}
