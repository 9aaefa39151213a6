//! Clock bring-up and the mailbox no-op handshake.
//!
//! All three helpers spin on bus reads with a bounded iteration count taken
//! from [`Limits`](crate::Limits) and report [`NdpError::Timeout`] when it
//! runs out.

use crate::{
    NdpError,
    device::Ndp,
    fmt::{debug, warning},
    regs::*,
    transfer::{Space, Transfer},
};

impl<T: Transfer> Ndp<T> {
    /// Switches the chip to the external clock and waits for it to settle.
    ///
    /// The bootrom is read through the SPI MADDR window, which only returns
    /// fresh data while the MCU clock runs. A switch is confirmed when the
    /// second bootrom word differs from the first and the first reads back
    /// unchanged. Otherwise the control register is restored and the toggle
    /// retried.
    pub fn ext_clk(&mut self) -> Result<(), NdpError> {
        let ctl = self.read_u8(SPI_CTL)?;
        let ctl_ext = spi_ctl_with_extclk(ctl, 1);
        let baseline = self.slow_read(BOOTROM)?;

        for attempt in 0..self.limits.ext_clk_retries {
            self.write_u8(SPI_CTL, ctl_ext)?;
            if self.slow_read(BOOTROM + 4)? != baseline && self.slow_read(BOOTROM)? == baseline {
                debug!("external clock settled after {} toggles", attempt + 1);
                return Ok(());
            }
            self.write_u8(SPI_CTL, ctl)?;
        }

        warning!("external clock did not settle");
        Err(NdpError::Timeout)
    }

    /// Waits for the internal PLL to report lock.
    pub fn int_clk(&mut self) -> Result<(), NdpError> {
        for _ in 0..self.limits.pll_lock_retries {
            let sts = self.read_word(CHIP_CONFIG_FLLSTS0)?;
            if fllsts0_mode(sts) == FLLSTS0_MODE_LOCKED {
                debug!("pll locked");
                return Ok(());
            }
        }

        warning!("pll did not lock");
        Err(NdpError::Timeout)
    }

    /// Sends a no-op request through the host-to-MCU mailbox and waits
    /// for the firmware to answer it.
    ///
    /// Mailbox interrupts are masked for the duration and restored on
    /// every exit path.
    pub fn mb_nop(&mut self) -> Result<(), NdpError> {
        self.with_interrupts_masked(|ndp| {
            let mbin = ndp.read_u8(SPI_MBIN)?;
            let own = mb_host_owner(mbin) ^ 1;
            let req = mb_host_with_owner(mb_host_with_message(mbin, MB_REQUEST_NOP), own);
            ndp.write_u8(SPI_MBIN, req)?;

            for _ in 0..ndp.limits.nop_timeout {
                let resp = ndp.read_u8(SPI_MBIN_RESP)?;
                if mb_host_owner(resp) != own {
                    continue;
                }
                ndp.mbout = (ndp.mbout & 0xf0) | (resp & 0x0f);
                let code = mb_host_message(resp);
                if code != MB_RESPONSE_SUCCESS {
                    warning!("mailbox nop answered with {}", code);
                    return Err(NdpError::Fail);
                }
                return Ok(());
            }

            warning!("mailbox nop timed out");
            Err(NdpError::Timeout)
        })
    }

    /// Runs `f` with the SPI interrupt control register cleared, then
    /// restores it. The first error wins.
    fn with_interrupts_masked<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, NdpError>,
    ) -> Result<R, NdpError> {
        let intctl = self.read_u8(SPI_INTCTL)?;
        self.write_u8(SPI_INTCTL, 0)?;
        let res = f(self);
        let restored = self.write_u8(SPI_INTCTL, intctl);
        let v = res?;
        restored.map(|()| v)
    }

    /// Reads an MCU word through the SPI MADDR window.
    fn slow_read(&mut self, addr: u32) -> Result<u32, NdpError> {
        self.write(Space::Spi, SPI_MADDR, &addr.to_le_bytes())?;
        let mut buf = [0u8; 8];
        self.read(Space::Spi, SPI_MADDR, &mut buf)?;
        let [_, _, _, _, a, b, c, d] = buf;
        Ok(u32::from_le_bytes([a, b, c, d]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::NdpBuilder,
        test_support::{BOOTROM_WORDS, Op, SimChip, sim_ndp},
    };

    fn intctl_writes(sim: &SimChip) -> std::vec::Vec<u8> {
        sim.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write {
                    space: Space::Spi,
                    addr: SPI_INTCTL,
                    bytes,
                } => Some(bytes[0]),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn slow_read_returns_second_word() {
        let mut ndp = sim_ndp();
        assert_eq!(ndp.slow_read(BOOTROM), Ok(BOOTROM_WORDS[0]));
        assert_eq!(ndp.slow_read(BOOTROM + 4), Ok(BOOTROM_WORDS[1]));
    }

    #[test]
    fn ext_clk_settles_after_a_few_toggles() {
        let mut ndp = sim_ndp();
        ndp.transport.spi[SPI_CTL as usize] = 0x01;
        ndp.transport.ext_clk_settle = 3;

        assert_eq!(ndp.ext_clk(), Ok(()));
        assert_eq!(ndp.transport.ext_clk_writes, 4);
        assert_eq!(ndp.transport.spi[SPI_CTL as usize], 0x05);
    }

    #[test]
    fn ext_clk_times_out_and_leaves_control_restored() {
        let mut ndp = NdpBuilder::new()
            .transport(SimChip::new())
            .ext_clk_retries(5)
            .build();
        ndp.transport.spi[SPI_CTL as usize] = 0x01;
        ndp.transport.ext_clk_settle = u32::MAX;

        assert_eq!(ndp.ext_clk(), Err(NdpError::Timeout));
        assert_eq!(ndp.transport.ext_clk_writes, 5);
        assert_eq!(ndp.transport.spi[SPI_CTL as usize], 0x01);
    }

    #[test]
    fn int_clk_polls_until_locked() {
        let mut ndp = sim_ndp();
        ndp.transport.fll_lock_after = 10;
        assert_eq!(ndp.int_clk(), Ok(()));
        assert_eq!(ndp.transport.fll_reads, 11);
    }

    #[test]
    fn int_clk_gives_up() {
        let mut ndp = sim_ndp();
        ndp.transport.fll_lock_after = u32::MAX;
        assert_eq!(ndp.int_clk(), Err(NdpError::Timeout));
        assert_eq!(ndp.transport.fll_reads, 2500);
    }

    #[test]
    fn mb_nop_handshake() {
        let mut ndp = sim_ndp();
        ndp.transport.spi[SPI_INTCTL as usize] = 0x1f;
        ndp.mbout = 0x80;

        assert_eq!(ndp.mb_nop(), Ok(()));
        // owner toggled, NOP request
        assert_eq!(ndp.transport.spi[SPI_MBIN as usize], 0x08);
        // host-to-MCU half of mbout tracks the response, MCU half untouched
        assert_eq!(ndp.mbout, 0x88);
        assert_eq!(intctl_writes(&ndp.transport), [0x00, 0x1f]);

        // the next request toggles the owner back
        assert_eq!(ndp.mb_nop(), Ok(()));
        assert_eq!(ndp.transport.spi[SPI_MBIN as usize], 0x00);
        assert_eq!(ndp.mbout, 0x80);
    }

    #[test]
    fn mb_nop_failure_code_restores_interrupts() {
        let mut ndp = sim_ndp();
        ndp.transport.spi[SPI_INTCTL as usize] = 0x1f;
        ndp.transport.mb_code = 0x3;

        assert_eq!(ndp.mb_nop(), Err(NdpError::Fail));
        assert_eq!(ndp.transport.spi[SPI_INTCTL as usize], 0x1f);
        assert_eq!(ndp.mbout, 0x0b);
    }

    #[test]
    fn mb_nop_timeout_restores_interrupts() {
        let mut ndp = NdpBuilder::new()
            .transport(SimChip::new())
            .nop_timeout(16)
            .build();
        ndp.transport.spi[SPI_INTCTL as usize] = 0x07;
        ndp.transport.mb_delay = u32::MAX;

        assert_eq!(ndp.mb_nop(), Err(NdpError::Timeout));
        assert_eq!(intctl_writes(&ndp.transport), [0x00, 0x07]);
    }

    #[test]
    fn mb_nop_bus_error_still_restores_interrupts() {
        let mut ndp = sim_ndp();
        ndp.transport.spi[SPI_INTCTL as usize] = 0x07;
        ndp.transport.fail_on = Some((Space::Spi, SPI_MBIN_RESP));

        assert_eq!(ndp.mb_nop(), Err(NdpError::Fail));
        assert_eq!(ndp.transport.spi[SPI_INTCTL as usize], 0x07);
    }
}
