use crate::{NdpError, device::Ndp, regs::SPI_SAMPLE};

/// NDP address space targeted by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Space {
    /// Chip-internal MCU bus. Addresses and counts are word aligned.
    Mcu,
    /// SPI register space.
    Spi,
}

/// Payload of a single simplex transfer.
#[derive(Debug)]
pub enum Data<'a> {
    /// Bytes sent to the chip.
    Out(&'a [u8]),
    /// Bytes received from the chip.
    In(&'a mut [u8]),
}

impl Data<'_> {
    /// Number of bytes exchanged.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Data::Out(b) => b.len(),
            Data::In(b) => b.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capability to exchange bytes with an NDP device.
///
/// Implementations move exactly `data.len()` bytes in one bus transaction.
/// The core already splits requests into bursts no larger than
/// [`Limits::max_transfer`](crate::Limits::max_transfer) and never asks for
/// a burst that straddles a `max_transfer` aligned boundary.
pub trait Transfer {
    fn transfer(&mut self, space: Space, addr: u32, data: Data<'_>) -> Result<(), NdpError>;
}

impl<T: Transfer + ?Sized> Transfer for &mut T {
    #[inline]
    fn transfer(&mut self, space: Space, addr: u32, data: Data<'_>) -> Result<(), NdpError> {
        (**self).transfer(space, addr, data)
    }
}

/// Adapts a closure into a [`Transfer`].
///
/// ```
/// use ndp10x_micro::prelude::*;
///
/// let bus = FnTransfer(|_space: Space, _addr: u32, data: Data<'_>| {
///     if let Data::In(buf) = data {
///         buf.fill(0);
///     }
///     Ok(())
/// });
/// let mut ndp = Ndp::new(bus);
/// let mut v = [0xffu8; 4];
/// ndp.read(Space::Mcu, 0x2000_0000, &mut v).unwrap();
/// assert_eq!(v, [0; 4]);
/// ```
pub struct FnTransfer<F>(pub F)
where
    F: FnMut(Space, u32, Data<'_>) -> Result<(), NdpError>;

impl<F> Transfer for FnTransfer<F>
where
    F: FnMut(Space, u32, Data<'_>) -> Result<(), NdpError>,
{
    #[inline]
    fn transfer(&mut self, space: Space, addr: u32, data: Data<'_>) -> Result<(), NdpError> {
        (self.0)(space, addr, data)
    }
}

/// Returns true if bursts to `addr` advance the address.
///
/// The sample port is a FIFO: consecutive write bursts all target it.
#[inline]
fn advances(space: Space, addr: u32, data: &Data<'_>) -> bool {
    matches!(data, Data::In(_)) || space == Space::Mcu || addr != SPI_SAMPLE
}

impl<T: Transfer> Ndp<T> {
    /// Reads or writes bytes at an NDP address.
    ///
    /// Exactly one of `out` and `input` should be set. Primarily for
    /// diagnostics and for reading the address reported by
    /// [`Ndp::load_log_read`].
    ///
    /// # Errors
    /// * [`NdpError::Arg`] - both buffers set, or a misaligned MCU access
    ///   (validated builds only)
    /// * whatever the transport reports for the first failing burst
    pub fn transfer(
        &mut self,
        space: Space,
        addr: u32,
        out: Option<&[u8]>,
        input: Option<&mut [u8]>,
    ) -> Result<(), NdpError> {
        match (out, input) {
            #[cfg(feature = "arg-checks")]
            (Some(_), Some(_)) => Err(NdpError::Arg),
            #[cfg(not(feature = "arg-checks"))]
            (Some(out), Some(_)) => self.write(space, addr, out),
            (Some(out), None) => self.write(space, addr, out),
            (None, Some(input)) => self.read(space, addr, input),
            (None, None) => Ok(()),
        }
    }

    /// Reads `buf.len()` bytes starting at `addr`.
    pub fn read(&mut self, space: Space, addr: u32, buf: &mut [u8]) -> Result<(), NdpError> {
        self.burst(space, addr, Data::In(buf))
    }

    /// Writes `buf` starting at `addr`.
    pub fn write(&mut self, space: Space, addr: u32, buf: &[u8]) -> Result<(), NdpError> {
        self.burst(space, addr, Data::Out(buf))
    }

    pub(crate) fn read_u8(&mut self, addr: u32) -> Result<u8, NdpError> {
        let mut b = [0u8; 1];
        self.read(Space::Spi, addr, &mut b)?;
        Ok(b[0])
    }

    pub(crate) fn write_u8(&mut self, addr: u32, v: u8) -> Result<(), NdpError> {
        self.write(Space::Spi, addr, &[v])
    }

    pub(crate) fn read_word(&mut self, addr: u32) -> Result<u32, NdpError> {
        let mut b = [0u8; 4];
        self.read(Space::Mcu, addr, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    /// Reads consecutive little-endian MCU words.
    pub(crate) fn read_words<const N: usize>(&mut self, addr: u32) -> Result<[u32; N], NdpError> {
        // one read keeps multi-word snapshots coherent
        let mut raw = [[0u8; 4]; N];
        self.read(Space::Mcu, addr, raw.as_flattened_mut())?;
        Ok(raw.map(u32::from_le_bytes))
    }

    fn burst(&mut self, space: Space, mut addr: u32, data: Data<'_>) -> Result<(), NdpError> {
        #[cfg(feature = "arg-checks")]
        if space == Space::Mcu && (addr % 4 != 0 || data.len() % 4 != 0) {
            crate::fmt::warning!("misaligned MCU transfer at {:#x}, {} bytes", addr, data.len());
            return Err(NdpError::Arg);
        }

        let max = self.limits.max_transfer;
        let advance = advances(space, addr, &data);

        match data {
            Data::Out(mut out) => {
                while !out.is_empty() {
                    let n = burst_len(addr, out.len(), max);
                    let (head, tail) = out.split_at(n);
                    self.transport.transfer(space, addr, Data::Out(head))?;
                    if advance {
                        addr = addr.wrapping_add(n as u32);
                    }
                    out = tail;
                }
            }
            Data::In(mut input) => {
                while !input.is_empty() {
                    let n = burst_len(addr, input.len(), max);
                    let (head, tail) = core::mem::take(&mut input).split_at_mut(n);
                    self.transport.transfer(space, addr, Data::In(head))?;
                    addr = addr.wrapping_add(n as u32);
                    input = tail;
                }
            }
        }
        Ok(())
    }
}

/// Largest burst starting at `addr` that stays inside one `max` sized page.
#[inline]
fn burst_len(addr: u32, remaining: usize, max: u32) -> usize {
    let room = (max - addr % max) as usize;
    remaining.min(room)
}
