//! Test support utilities - only compiled in test builds.

use std::{collections::BTreeMap, vec::Vec};

use crate::{
    NdpError,
    device::Ndp,
    loader::{HEADER_MAGIC, Tag},
    regs::*,
    transfer::{Data, Space, Transfer},
};

/// Firmware state block used by most tests.
pub const FW_STATE: u32 = 0x2000_8000;
/// Tank base address used by most tests.
pub const TANK_BASE: u32 = 0x2001_0000;

/// Bootrom words the slow-read window sees once the clock is good.
pub const BOOTROM_WORDS: [u32; 2] = [0x2000_4000, 0x0100_00c1];

/// One successful transfer seen by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write { space: Space, addr: u32, bytes: Vec<u8> },
    Read { space: Space, addr: u32, len: usize },
}

/// Simulated NDP10x behind the [`Transfer`] boundary.
///
/// MCU memory is sparse and reads as zero where nothing was written. SPI
/// space is a 256 byte register file with a few live registers: the
/// write-1-to-clear interrupt status, the sample FIFO, the MADDR slow-read
/// window and the mailbox pair.
pub struct SimChip {
    pub mcu: BTreeMap<u32, u8>,
    pub spi: [u8; 256],
    pub samples: Vec<u8>,
    pub ops: Vec<Op>,
    /// Every call, including failed ones.
    pub calls: usize,
    /// Fail every call after this many successful ones.
    pub fail_after: Option<usize>,
    /// Fail every call targeting this address.
    pub fail_on: Option<(Space, u32)>,

    /// Control writes with the external clock bit set before the slow-read
    /// window starts returning fresh data.
    pub ext_clk_settle: u32,
    pub ext_clk_writes: u32,
    /// FLLSTS0 reads that report an unlocked PLL.
    pub fll_lock_after: u32,
    pub fll_reads: u32,
    /// MBIN_RESP reads before the mailbox answers a host request.
    pub mb_delay: u32,
    /// Response code placed in the low bits of MBIN_RESP.
    pub mb_code: u8,

    maddr: u32,
    maddr_stale: u32,
    mb_pending: Option<u32>,
}

impl SimChip {
    pub fn new() -> Self {
        let mut sim = SimChip {
            mcu: BTreeMap::new(),
            spi: [0; 256],
            samples: Vec::new(),
            ops: Vec::new(),
            calls: 0,
            fail_after: None,
            fail_on: None,
            ext_clk_settle: 0,
            ext_clk_writes: 0,
            fll_lock_after: 0,
            fll_reads: 0,
            mb_delay: 2,
            mb_code: MB_RESPONSE_SUCCESS,
            maddr: 0,
            maddr_stale: 0,
            mb_pending: None,
        };
        sim.store_words(BOOTROM, &BOOTROM_WORDS);
        sim
    }

    /// Copies `bytes` into MCU memory without recording an op.
    pub fn load_mcu(&mut self, addr: u32, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.mcu.insert(addr.wrapping_add(i as u32), *b);
        }
    }

    pub fn store_words(&mut self, addr: u32, words: &[u32]) {
        for (i, w) in words.iter().enumerate() {
            self.load_mcu(addr + 4 * i as u32, &w.to_le_bytes());
        }
    }

    pub fn mcu_bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.peek(addr.wrapping_add(i as u32)))
            .collect()
    }

    pub fn mcu_word(&self, addr: u32) -> u32 {
        let b = self.mcu_bytes(addr, 4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn peek(&self, addr: u32) -> u8 {
        self.mcu.get(&addr).copied().unwrap_or(0)
    }

    /// Points the firmware state pointer at `addr`.
    pub fn install_fw_state(&mut self, addr: u32) {
        self.store_words(FW_STATE_POINTER, &[addr]);
    }

    /// Programs tank geometry and the hardware write cursor.
    pub fn setup_tank(&mut self, base: u32, size: u32, cursor: u32) {
        self.store_words(DSP_CONFIG_TANK, &[size << 4 | 0x1, 0, base]);
        self.set_tank_cursor(cursor);
    }

    pub fn set_tank_cursor(&mut self, cursor: u32) {
        let fw = self.mcu_word(FW_STATE_POINTER);
        self.store_words(fw + FW_STATE_TANKPTR_OFFSET, &[cursor]);
    }

    /// Fills the tank so that byte `i` holds `i as u8`.
    pub fn fill_tank_pattern(&mut self, base: u32, size: u32) {
        let pattern: Vec<u8> = (0..size).map(|i| i as u8).collect();
        self.load_mcu(base, &pattern);
    }

    /// Firmware side of a match: writes ring entries, bumps the producer
    /// and signals a new mailbox event.
    pub fn push_matches(&mut self, ring_size: u32, entries: &[(u32, u32)]) {
        let fw = self.mcu_word(FW_STATE_POINTER);
        let mut producer = self.mcu_word(fw + FW_STATE_MATCH_PRODUCER_OFFSET);
        for &(summary, tankptr) in entries {
            let slot = fw + FW_STATE_MATCH_RING_OFFSET + producer * MATCH_ENTRY_SIZE;
            self.store_words(slot, &[summary, tankptr]);
            producer = (producer + 1) % ring_size;
        }
        self.store_words(fw + FW_STATE_MATCH_RING_SIZE_OFFSET, &[ring_size, producer]);
        self.raise_event();
    }

    /// Toggles the MCU-to-host owner bit and latches the mailbox interrupt.
    pub fn raise_event(&mut self) {
        self.spi[SPI_MBIN_RESP as usize] ^= mb_mcu_with_owner(0, 1);
        self.spi[SPI_INTSTS as usize] |= spi_intsts_with_mbin_int(0, 1);
    }

    fn clock_good(&self) -> bool {
        let ctl = self.spi[SPI_CTL as usize];
        spi_ctl_extclk(ctl) == 0 || self.ext_clk_writes > self.ext_clk_settle
    }

    fn spi_write(&mut self, addr: u32, bytes: &[u8]) {
        match addr {
            SPI_SAMPLE => self.samples.extend_from_slice(bytes),
            SPI_MADDR if bytes.len() == 4 => {
                self.maddr = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            SPI_INTSTS if bytes.len() == 1 => self.spi[SPI_INTSTS as usize] &= !bytes[0],
            SPI_MBIN if bytes.len() == 1 => {
                let old = self.spi[SPI_MBIN as usize];
                self.spi[SPI_MBIN as usize] = bytes[0];
                if mb_host_owner(old ^ bytes[0]) != 0 {
                    self.mb_pending = Some(self.mb_delay);
                }
            }
            _ => {
                if addr == SPI_CTL && spi_ctl_extclk(bytes[0]) != 0 {
                    self.ext_clk_writes += 1;
                }
                for (i, b) in bytes.iter().enumerate() {
                    self.spi[(addr as usize + i) & 0xff] = *b;
                }
            }
        }
    }

    fn spi_read(&mut self, addr: u32, buf: &mut [u8]) {
        match addr {
            SPI_MADDR if buf.len() == 8 => {
                let v = if self.clock_good() {
                    self.mcu_word(self.maddr)
                } else {
                    self.maddr_stale
                };
                self.maddr_stale = v;
                buf[..4].fill(0);
                buf[4..].copy_from_slice(&v.to_le_bytes());
            }
            SPI_MBIN_RESP if buf.len() == 1 => {
                match self.mb_pending {
                    Some(0) => {
                        let mbin = self.spi[SPI_MBIN as usize];
                        let resp = &mut self.spi[SPI_MBIN_RESP as usize];
                        *resp = (*resp & 0xf0) | (mbin & 0x08) | (self.mb_code & 0x07);
                        self.mb_pending = None;
                    }
                    Some(n) => self.mb_pending = Some(n - 1),
                    None => {}
                }
                buf[0] = self.spi[SPI_MBIN_RESP as usize];
            }
            _ => {
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = self.spi[(addr as usize + i) & 0xff];
                }
            }
        }
    }

    fn mcu_read(&mut self, addr: u32, buf: &mut [u8]) {
        if addr == CHIP_CONFIG_FLLSTS0 && buf.len() == 4 {
            self.fll_reads += 1;
            let mode = if self.fll_reads > self.fll_lock_after {
                FLLSTS0_MODE_LOCKED
            } else {
                0x3
            };
            buf.copy_from_slice(&fllsts0_with_mode(0x0000_0100, mode).to_le_bytes());
            return;
        }
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.peek(addr.wrapping_add(i as u32));
        }
    }
}

impl Transfer for SimChip {
    fn transfer(&mut self, space: Space, addr: u32, data: Data<'_>) -> Result<(), NdpError> {
        self.calls += 1;
        if self.fail_after.is_some_and(|n| self.ops.len() >= n)
            || self.fail_on == Some((space, addr))
        {
            return Err(NdpError::Fail);
        }

        match data {
            Data::Out(bytes) => {
                match space {
                    Space::Mcu => self.load_mcu(addr, bytes),
                    Space::Spi => self.spi_write(addr, bytes),
                }
                self.ops.push(Op::Write {
                    space,
                    addr,
                    bytes: bytes.to_vec(),
                });
            }
            Data::In(buf) => {
                let len = buf.len();
                match space {
                    Space::Mcu => self.mcu_read(addr, buf),
                    Space::Spi => self.spi_read(addr, buf),
                }
                self.ops.push(Op::Read { space, addr, len });
            }
        }
        Ok(())
    }
}

/// A simulated device with default limits.
pub fn sim_ndp() -> Ndp<SimChip> {
    Ndp::new(SimChip::new())
}

/// A simulated device with firmware state installed and an open loader.
pub fn booted_ndp() -> Ndp<SimChip> {
    let mut ndp = sim_ndp();
    ndp.transport.install_fw_state(FW_STATE);
    ndp
}

/// MCU-space writes in the op log, in order.
pub fn mcu_writes(sim: &SimChip) -> Vec<(u32, Vec<u8>)> {
    sim.ops
        .iter()
        .filter_map(|op| match op {
            Op::Write {
                space: Space::Mcu,
                addr,
                bytes,
            } => Some((*addr, bytes.clone())),
            _ => None,
        })
        .collect()
}

/// Builds TLV initialization logs.
#[derive(Default)]
pub struct LogBuilder {
    bytes: Vec<u8>,
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn word(mut self, w: u32) -> Self {
        self.bytes.extend_from_slice(&w.to_le_bytes());
        self
    }

    pub fn record(self, tag: Tag, value: &[u8]) -> Self {
        let mut b = self.word(tag as u32).word(value.len() as u32);
        b.bytes.extend_from_slice(value);
        while b.bytes.len() % 4 != 0 {
            b.bytes.push(0);
        }
        b
    }

    pub fn header(self) -> Self {
        self.record(Tag::Header, &HEADER_MAGIC.to_le_bytes())
    }

    pub fn checksum(self) -> Self {
        self.record(Tag::Checksum, &[0; 4])
    }

    fn write_record(self, tag: Tag, addr: u32, payload: &[u8]) -> Self {
        let mut value = addr.to_le_bytes().to_vec();
        value.extend_from_slice(payload);
        self.record(tag, &value)
    }

    pub fn mcu_write(self, addr: u32, payload: &[u8]) -> Self {
        self.write_record(Tag::McuWrite, addr, payload)
    }

    pub fn spi_write(self, addr: u32, payload: &[u8]) -> Self {
        self.write_record(Tag::SpiWrite, addr, payload)
    }

    pub fn mcu_read(self, addr: u32) -> Self {
        self.record(Tag::McuRead, &addr.to_le_bytes())
    }

    pub fn ext_clk(self) -> Self {
        self.record(Tag::ExtClk, &[])
    }

    pub fn int_clk(self) -> Self {
        self.record(Tag::IntClk, &[])
    }

    pub fn mb_nop(self) -> Self {
        self.record(Tag::MbNop, &[])
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Minimal `SpiDevice` that records transactions and serves scripted reads.
pub mod spi_mock {
    use std::{collections::VecDeque, vec::Vec};

    use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Step {
        Write(Vec<u8>),
        Read(usize),
        Delay(u32),
    }

    #[derive(Default)]
    pub struct MockSpi {
        /// One entry per transaction.
        pub transactions: Vec<Vec<Step>>,
        /// Bytes handed out to reads, in order.
        pub rx: VecDeque<u8>,
        pub fail: bool,
    }

    impl ErrorType for MockSpi {
        type Error = ErrorKind;
    }

    impl SpiDevice for MockSpi {
        fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            if self.fail {
                return Err(ErrorKind::Other);
            }
            let mut steps = Vec::new();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(b) => steps.push(Step::Write(b.to_vec())),
                    Operation::Read(b) => {
                        steps.push(Step::Read(b.len()));
                        for byte in b.iter_mut() {
                            *byte = self.rx.pop_front().unwrap_or(0);
                        }
                    }
                    Operation::DelayNs(ns) => steps.push(Step::Delay(*ns)),
                    Operation::Transfer(..) | Operation::TransferInPlace(..) => {
                        panic!("full duplex transfer not expected")
                    }
                }
            }
            self.transactions.push(steps);
            Ok(())
        }
    }
}
