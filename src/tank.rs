//! Extraction from the tank, the circular sample buffer the DSP writes
//! continuously.
//!
//! Offsets are bytes from the tank base. The hardware write cursor lives in
//! the firmware state block and is the boundary between the newest and the
//! oldest byte.

use crate::{
    NdpError,
    device::Ndp,
    fmt::{trace, warning},
    regs::*,
    transfer::{Space, Transfer},
};

/// Reference point for [`Ndp::extract`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExtractFrom {
    /// The window ending at the most recent match.
    Match = 0,
    /// Continue after the last extracted byte.
    Unread = 1,
    /// The oldest byte still in the tank.
    Oldest = 2,
    /// The window ending at the write cursor.
    Newest = 3,
}

impl TryFrom<u32> for ExtractFrom {
    type Error = NdpError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ExtractFrom::Match),
            1 => Ok(ExtractFrom::Unread),
            2 => Ok(ExtractFrom::Oldest),
            3 => Ok(ExtractFrom::Newest),
            _ => Err(NdpError::Arg),
        }
    }
}

impl<T: Transfer> Ndp<T> {
    /// Copies tank bytes relative to `from` and returns how many bytes are
    /// available from the computed start up to the write cursor.
    ///
    /// At most `min(len, available)` bytes are copied, so compare the
    /// result with `len` to detect truncation. Every call leaves the unread
    /// position just after the window.
    ///
    /// Without a buffer, [`ExtractFrom::Unread`] and [`ExtractFrom::Oldest`]
    /// skip the window, while [`ExtractFrom::Match`] and
    /// [`ExtractFrom::Newest`] only move the unread position to the start
    /// of the window.
    ///
    /// # Errors
    /// * [`NdpError::Arg`] - `data` shorter than `len`. In validated builds
    ///   also `len` not a multiple of 4, and `Match` or `Newest` windows
    ///   reaching past the recorded history.
    /// * [`NdpError::Uninit`] - no firmware running
    pub fn extract(
        &mut self,
        from: ExtractFrom,
        data: Option<&mut [u8]>,
        len: u32,
    ) -> Result<u32, NdpError> {
        #[cfg(feature = "arg-checks")]
        if len % 4 != 0 {
            warning!("tank extract length {} not word aligned", len);
            return Err(NdpError::Arg);
        }
        if data.as_ref().is_some_and(|d| d.len() < len as usize) {
            return Err(NdpError::Arg);
        }

        let [tank, _, base] = self.read_words::<TANK_REGS_WORDS>(DSP_CONFIG_TANK)?;
        let size = dsp_tank_size(tank);

        let fw = self.fw_state()?;
        let cursor = self.read_word(fw + FW_STATE_TANKPTR_OFFSET)?;
        let raw = cursor & !0x3;
        let up = cursor.wrapping_add(3) & !0x3;
        if raw < self.tank.cursor {
            self.tank.wrapped = true;
        }
        self.tank.cursor = raw;

        let mut start = match from {
            ExtractFrom::Match => {
                let matched = self.tank.matched;
                #[cfg(feature = "arg-checks")]
                if matched.wrapping_add(if matched < up { size } else { 0 }) < up.wrapping_add(len) {
                    warning!("match window of {} bytes already overwritten", len);
                    return Err(NdpError::Arg);
                }
                matched.wrapping_add(size).wrapping_sub(len)
            }
            ExtractFrom::Unread => self.tank.last,
            ExtractFrom::Oldest => up,
            ExtractFrom::Newest => {
                #[cfg(feature = "arg-checks")]
                if size.saturating_sub(up.wrapping_sub(raw)) < len || (!self.tank.wrapped && len > raw) {
                    warning!("newest window of {} bytes exceeds history", len);
                    return Err(NdpError::Arg);
                }
                raw.wrapping_add(size).wrapping_sub(len)
            }
        };
        if start >= size {
            start = start.wrapping_sub(size);
        }

        let mut used = if size == 0 {
            0
        } else {
            raw.wrapping_add(size).wrapping_sub(start)
        };
        if used > size || (from == ExtractFrom::Unread && used == size) {
            used -= size;
        }

        let mut n = len;
        if data.is_none() && matches!(from, ExtractFrom::Match | ExtractFrom::Newest) {
            n = 0;
        }
        n = n.min(used);
        trace!("tank {:?}: start {} used {} copy {}", from, start, used, n);

        if let Some(buf) = data {
            if n > 0 {
                let buf = &mut buf[..n as usize];
                let Some(tail) = size.checked_sub(start) else {
                    warning!("tank window start {} outside {} byte tank", start, size);
                    return Err(NdpError::Arg);
                };
                if n > tail {
                    let (first, second) = buf.split_at_mut(tail as usize);
                    self.read(Space::Mcu, base.wrapping_add(start), first)?;
                    self.read(Space::Mcu, base, second)?;
                } else {
                    self.read(Space::Mcu, base.wrapping_add(start), buf)?;
                }
            }
        }

        let end = start.wrapping_add(n);
        self.tank.last = if end < size { end } else { end.wrapping_sub(size) };
        Ok(used)
    }

    /// Positions the unread cursor `prefix` bytes before the last match.
    pub fn set_extract_match(&mut self, prefix: u32) -> Result<u32, NdpError> {
        self.extract(ExtractFrom::Match, None, prefix)
    }

    /// Positions the unread cursor at the write cursor.
    pub fn set_extract_now(&mut self) -> Result<u32, NdpError> {
        self.extract(ExtractFrom::Newest, None, 0)
    }

    /// Fills `buf` from the unread cursor and returns the bytes that were
    /// available. Fewer than `buf.len()` were copied if the result is smaller.
    pub fn extract_unread(&mut self, buf: &mut [u8]) -> Result<u32, NdpError> {
        let len = buf.len() as u32;
        self.extract(ExtractFrom::Unread, Some(buf), len)
    }
}
