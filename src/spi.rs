//! NDP10x SPI wire protocol over an [`embedded_hal::spi::SpiDevice`].
//!
//! Every access starts with a command byte: the SPI register address, with
//! bit 7 set for reads. MCU memory is reached through the MADDR window: the
//! command is followed by the little-endian MCU address, then data. MCU
//! reads latch the address in one transaction and fetch in a second one,
//! after four dummy bytes.

use embedded_hal::spi::{Operation, SpiDevice};

use crate::{
    NdpError,
    fmt::error,
    regs::{SPI_MADDR, SPI_READ},
    transfer::{Data, Space, Transfer},
};

/// Delay before clocking out an MCU read, giving the chip time to fetch.
const MCU_READ_DELAY_NS: u32 = 1000;
const MADDR: u8 = SPI_MADDR as u8;

/// [`Transfer`] implementation for a chip on a real SPI bus.
///
/// The device owns chip select. Keep the bus in mode 0, MSB first.
pub struct SpiTransport<D> {
    spi: D,
}

impl<D: SpiDevice> SpiTransport<D> {
    pub fn new(spi: D) -> Self {
        SpiTransport { spi }
    }

    pub fn release(self) -> D {
        self.spi
    }
}

impl<D: SpiDevice> Transfer for SpiTransport<D> {
    fn transfer(&mut self, space: Space, addr: u32, data: Data<'_>) -> Result<(), NdpError> {
        let res = match space {
            Space::Spi => {
                let reg = u8::try_from(addr).map_err(|_| NdpError::Arg)?;
                match data {
                    Data::Out(out) => self
                        .spi
                        .transaction(&mut [Operation::Write(&[reg]), Operation::Write(out)]),
                    Data::In(input) => self.spi.transaction(&mut [
                        Operation::Write(&[SPI_READ | reg]),
                        Operation::Read(input),
                    ]),
                }
            }
            Space::Mcu => {
                if data.len() % 4 != 0 {
                    return Err(NdpError::Arg);
                }
                let [a0, a1, a2, a3] = addr.to_le_bytes();
                let cmd = [MADDR, a0, a1, a2, a3];
                match data {
                    Data::Out(out) => self
                        .spi
                        .transaction(&mut [Operation::Write(&cmd), Operation::Write(out)]),
                    Data::In(input) => {
                        let mut dummy = [0u8; 4];
                        self.spi
                            .transaction(&mut [Operation::Write(&cmd)])
                            .and_then(|()| {
                                self.spi.transaction(&mut [
                                    Operation::DelayNs(MCU_READ_DELAY_NS),
                                    Operation::Write(&[SPI_READ | MADDR]),
                                    Operation::Read(&mut dummy),
                                    Operation::Read(input),
                                ])
                            })
                    }
                }
            }
        };

        res.map_err(|_| {
            error!("spi bus error, {:?} at {:#x}", space, addr);
            NdpError::Fail
        })
    }
}
