//! Resumable replay of the TLV initialization log.
//!
//! The log is a sequence of little-endian `tag`, `length`, `value` records,
//! each padded to a 4-byte boundary. Chunks may split records at any 4-byte
//! boundary; the parse position survives between calls in [`LoaderState`].

use crate::{
    NdpError,
    device::Ndp,
    fmt::{trace, warning},
    transfer::{Space, Transfer},
};

/// Value carried by the header record.
pub const HEADER_MAGIC: u32 = 0x53bd_e5a1;

/// Record tags understood by the loader.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tag {
    Header = 1,
    Checksum = 4,
    ExtClk = 28,
    IntClk = 29,
    SpiWrite = 30,
    McuWrite = 31,
    MbNop = 74,
    McuRead = 75,
}

impl TryFrom<u32> for Tag {
    type Error = NdpError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        Ok(match v {
            1 => Tag::Header,
            4 => Tag::Checksum,
            28 => Tag::ExtClk,
            29 => Tag::IntClk,
            30 => Tag::SpiWrite,
            31 => Tag::McuWrite,
            74 => Tag::MbNop,
            75 => Tag::McuRead,
            _ => {
                warning!("unknown log tag {}", v);
                return Err(NdpError::Package);
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Phase {
    /// Expecting a tag word.
    #[default]
    Idle,
    /// Tag seen, expecting the length word.
    Tag,
    /// Length seen, expecting the first value word.
    Length,
    /// Streaming payload to MCU memory.
    Mcu,
    /// Streaming payload to SPI registers.
    Spi,
    /// Checksum reached.
    Done,
}

/// Loader continuation.
///
/// `tag_or_addr` holds the tag until the value starts, then the running
/// payload address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LoaderState {
    pub(crate) phase: Phase,
    pub(crate) tag_or_addr: u32,
    pub(crate) remaining: u32,
    pub(crate) read_addr: u32,
}

/// Outcome of [`Ndp::load_log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadStatus {
    /// The log is not complete, feed the next chunk.
    More,
    /// The checksum record was reached.
    Done,
}

/// Outcome of [`Ndp::load_log_read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadProgress {
    More,
    /// The checksum record was reached. `read_addr` is the address of the
    /// last MCU read record, `0` if the log had none.
    Done { read_addr: u32 },
}

impl From<LoadProgress> for LoadStatus {
    fn from(p: LoadProgress) -> Self {
        match p {
            LoadProgress::More => LoadStatus::More,
            LoadProgress::Done { .. } => LoadStatus::Done,
        }
    }
}

/// Splits the leading little-endian word off `log`.
fn take_word(log: &mut &[u8]) -> Result<u32, NdpError> {
    let Some((word, rest)) = log.split_first_chunk::<4>() else {
        return Err(NdpError::Arg);
    };
    *log = rest;
    Ok(u32::from_le_bytes(*word))
}

impl<T: Transfer> Ndp<T> {
    /// Feeds one chunk of the initialization log.
    ///
    /// An empty chunk resets the loader and must precede the first real
    /// chunk. After [`LoadStatus::Done`] further chunks keep answering
    /// `Done` until the next reset.
    ///
    /// # Errors
    /// * [`NdpError::Arg`] - chunk length not a multiple of 4
    /// * [`NdpError::Package`] - malformed record
    /// * anything reported by the bus or the clock and mailbox helpers
    ///
    /// The loader state is undefined after an error. Recover with an empty
    /// chunk and a replay from the start of the log.
    pub fn load_log(&mut self, chunk: &[u8]) -> Result<LoadStatus, NdpError> {
        self.load_log_read(chunk).map(LoadStatus::from)
    }

    /// Like [`load_log`](Self::load_log), also reporting the address of the
    /// last MCU read record once the log is complete.
    pub fn load_log_read(&mut self, chunk: &[u8]) -> Result<LoadProgress, NdpError> {
        #[cfg(feature = "arg-checks")]
        if chunk.len() % 4 != 0 {
            warning!("log chunk of {} bytes is not word aligned", chunk.len());
            return Err(NdpError::Arg);
        }

        if chunk.is_empty() {
            self.loader = LoaderState::default();
            return Ok(LoadProgress::More);
        }

        let mut st = self.loader;
        let mut log = chunk;

        while !log.is_empty() {
            match st.phase {
                Phase::Done => break,
                Phase::Idle => {
                    st.tag_or_addr = take_word(&mut log)?;
                    st.phase = Phase::Tag;
                }
                Phase::Tag => {
                    let len = take_word(&mut log)?;
                    let tag = Tag::try_from(st.tag_or_addr)?;
                    trace!("log record {:?}, {} bytes", tag, len);
                    st.remaining = len;
                    st.phase = Phase::Length;

                    match tag {
                        Tag::Header | Tag::Checksum | Tag::McuRead => expect_len(tag, len, 4)?,
                        Tag::SpiWrite | Tag::McuWrite => {
                            if len < 4 || (tag == Tag::McuWrite && len % 4 != 0) {
                                warning!("bad {:?} record length {}", tag, len);
                                return Err(NdpError::Package);
                            }
                        }
                        Tag::ExtClk | Tag::IntClk | Tag::MbNop => {
                            expect_len(tag, len, 0)?;
                            match tag {
                                Tag::ExtClk => self.ext_clk()?,
                                Tag::IntClk => self.int_clk()?,
                                _ => self.mb_nop()?,
                            }
                            st.phase = Phase::Idle;
                        }
                    }
                }
                Phase::Length => {
                    let v = take_word(&mut log)?;
                    st.remaining -= 4;
                    match Tag::try_from(st.tag_or_addr)? {
                        Tag::Header => {
                            if v != HEADER_MAGIC {
                                warning!("bad log magic {:#x}", v);
                                return Err(NdpError::Package);
                            }
                            st.phase = Phase::Idle;
                        }
                        Tag::Checksum => {
                            st.phase = Phase::Done;
                            self.loader = st;
                            trace!("log complete");
                            return Ok(LoadProgress::Done {
                                read_addr: st.read_addr,
                            });
                        }
                        Tag::McuRead => {
                            st.read_addr = v;
                            st.phase = Phase::Idle;
                        }
                        tag @ (Tag::SpiWrite | Tag::McuWrite) => {
                            st.phase = match (tag, st.remaining) {
                                (_, 0) => Phase::Idle,
                                (Tag::McuWrite, _) => Phase::Mcu,
                                _ => Phase::Spi,
                            };
                        }
                        // control records never reach the value phase
                        _ => return Err(NdpError::Package),
                    }
                    st.tag_or_addr = v;
                }
                Phase::Mcu | Phase::Spi => {
                    let space = if st.phase == Phase::Mcu {
                        Space::Mcu
                    } else {
                        Space::Spi
                    };
                    let n = log.len().min(st.remaining as usize);
                    self.write(space, st.tag_or_addr, &log[..n])?;
                    st.remaining -= n as u32;

                    let mut step = n;
                    if st.remaining == 0 {
                        // skip the record padding
                        step = n.next_multiple_of(4).min(log.len());
                        st.phase = Phase::Idle;
                    }
                    st.tag_or_addr = st.tag_or_addr.wrapping_add(step as u32);
                    log = &log[step..];
                }
            }
        }

        self.loader = st;
        Ok(match st.phase {
            Phase::Done => LoadProgress::Done {
                read_addr: st.read_addr,
            },
            _ => LoadProgress::More,
        })
    }
}

fn expect_len(tag: Tag, len: u32, want: u32) -> Result<(), NdpError> {
    if len != want {
        warning!("{:?} record length {}, expected {}", tag, len, want);
        return Err(NdpError::Package);
    }
    Ok(())
}
