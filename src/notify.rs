use bitmaps::Bitmap;

use crate::{
    NdpError,
    device::Ndp,
    fmt::trace,
    regs::*,
    transfer::Transfer,
};

/// Cause reported by [`Ndp::poll`].
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// The firmware finished a DNN frame.
    Dnn = 0,
    /// Unread match ring entries are pending.
    Match = 1,
}

/// Set of [`Notification`]s.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Notifications(Bitmap<8>);

impl Notifications {
    pub fn new() -> Self {
        Notifications(Bitmap::new())
    }

    #[inline]
    pub fn contains(&self, n: Notification) -> bool {
        self.0.get(n as usize)
    }

    #[inline]
    pub fn insert(&mut self, n: Notification) {
        self.0.set(n as usize, true);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Vendor-compatible cause mask: `0x01` DNN, `0x02` match.
    #[inline]
    pub fn bits(&self) -> u32 {
        u32::from(self.0.into_value())
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set()
            .entries(
                [Notification::Dnn, Notification::Match]
                    .into_iter()
                    .filter(|n| self.contains(*n)),
            )
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Notifications {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Notifications({=u32:#x})", self.bits());
    }
}

impl<T: Transfer> Ndp<T> {
    /// Checks for new firmware events without blocking.
    ///
    /// With `clear` the latched interrupt status is written back, which
    /// clears it. A mailbox event whose owner bit differs from the last one
    /// seen reports [`Notification::Dnn`], refreshes the match ring
    /// geometry and is acknowledged. [`Notification::Match`] reports the
    /// cached ring state and needs no fresh event.
    pub fn poll(&mut self, clear: bool) -> Result<Notifications, NdpError> {
        let mut causes = Notifications::new();

        let intsts = self.read_u8(SPI_INTSTS)?;
        if clear {
            self.write_u8(SPI_INTSTS, intsts)?;
        }

        if spi_intsts_mbin_int(intsts) != 0 {
            let mbout = self.read_u8(SPI_MBIN_RESP)?;
            if mb_mcu_owner(mbout ^ self.mbout) != 0 {
                causes.insert(Notification::Dnn);
                let fw = self.fw_state()?;
                let [size, producer] =
                    self.read_words::<2>(fw + FW_STATE_MATCH_RING_SIZE_OFFSET)?;
                self.ring.size = size;
                self.ring.producer = producer;
                trace!("dnn event, ring size {} producer {}", size, producer);

                let ack = mb_mcu_with_message(
                    mb_mcu_with_owner(0, mb_mcu_owner(mbout)),
                    MB_RESPONSE_SUCCESS,
                );
                self.write_u8(SPI_MBIN, ack)?;
            }
            self.mbout = mbout;
        }

        if self.ring.pending() {
            causes.insert(Notification::Match);
        }
        Ok(causes)
    }
}
