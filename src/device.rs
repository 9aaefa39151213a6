use crate::{
    NdpError,
    config::{Limits, NdpBuilder, NeedTransport},
    fmt::{debug, warning},
    loader::LoaderState,
    regs::{FW_STATE_POINTER, is_fw_state_addr},
    transfer::Transfer,
};

/// Match ring geometry as last observed from the firmware.
///
/// `consumer` is host owned and only advances in [`Ndp::get_match`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MatchRing {
    pub size: u32,
    pub producer: u32,
    pub consumer: u32,
}

impl MatchRing {
    /// Returns true if unread matches are pending.
    #[inline]
    pub fn pending(&self) -> bool {
        self.producer != self.consumer
    }
}

/// Host read positions inside the tank, as 4-byte aligned byte offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TankCursors {
    /// Next unread byte.
    pub last: u32,
    /// Tank offset recorded by the most recent match.
    pub matched: u32,
    /// Raw hardware cursor seen by the previous extraction.
    pub cursor: u32,
    /// The hardware cursor has been observed to wrap since the last reset.
    ///
    /// Only a cursor that moved backwards between two extractions counts.
    /// A full tank period between extractions that ends past the previous
    /// cursor goes unnoticed until a later extraction sees it move back.
    pub wrapped: bool,
}

/// State of one NDP10x device.
///
/// Owned by the caller and passed by `&mut` to every operation. A fresh
/// device (or one after [`reset`](Self::reset)) is opened by feeding an
/// empty chunk to [`load_log`](Self::load_log).
pub struct Ndp<T> {
    pub(crate) transport: T,
    pub(crate) limits: Limits,
    pub(crate) fw_state_addr: u32,
    pub(crate) mbout: u8,
    pub(crate) ring: MatchRing,
    pub(crate) tank: TankCursors,
    pub(crate) loader: LoaderState,
}

impl Ndp<()> {
    /// Starts a typestate builder.
    pub fn builder() -> NdpBuilder<(), NeedTransport> {
        NdpBuilder::new()
    }
}

impl<T: Transfer> Ndp<T> {
    /// Creates a device with default [`Limits`].
    pub fn new(transport: T) -> Self {
        Self::with_limits(transport, Limits::DEFAULT)
    }

    pub(crate) fn with_limits(transport: T, limits: Limits) -> Self {
        Ndp {
            transport,
            limits,
            fw_state_addr: 0,
            mbout: 0,
            ring: MatchRing::default(),
            tank: TankCursors::default(),
            loader: LoaderState::default(),
        }
    }

    /// Forgets everything learned from the chip.
    ///
    /// Required after any error, and after the chip itself was reset,
    /// before replaying the initialization log. Limits and transport are kept.
    pub fn reset(&mut self) {
        debug!("ndp state reset");
        self.fw_state_addr = 0;
        self.mbout = 0;
        self.ring = MatchRing::default();
        self.tank = TankCursors::default();
        self.loader = LoaderState::default();
    }

    #[inline]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    #[inline]
    pub fn match_ring(&self) -> MatchRing {
        self.ring
    }

    #[inline]
    pub fn tank_cursors(&self) -> TankCursors {
        self.tank
    }

    /// Cached firmware state address, `0` while unresolved.
    #[inline]
    pub fn fw_state_addr(&self) -> u32 {
        self.fw_state_addr
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the device and returns the transport.
    pub fn release(self) -> T {
        self.transport
    }

    /// Returns the firmware state address, reading the pointer on first use.
    pub(crate) fn fw_state(&mut self) -> Result<u32, NdpError> {
        if self.fw_state_addr == 0 {
            let addr = self.read_word(FW_STATE_POINTER)?;
            if !is_fw_state_addr(addr) {
                warning!("fw state pointer {:#x} outside ram", addr);
                return Err(NdpError::Uninit);
            }
            debug!("fw state at {:#x}", addr);
            self.fw_state_addr = addr;
        }
        Ok(self.fw_state_addr)
    }
}
