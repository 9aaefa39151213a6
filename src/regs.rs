//! NDP10x register and memory map.
//!
//! SPI-space registers are single bytes addressed by the SPI command byte.
//! MCU-space addresses are 32-bit words in the chip's internal bus.
//!
//! Bit-packed fields get a pair of accessors generated by [`field!`]:
//! `<reg>_<field>(v)` extracts the field and `<reg>_with_<field>(v, x)`
//! returns `v` with the field replaced by `x`.

/// Generates extract/insert accessors for one register field.
macro_rules! field {
    ($(#[$m:meta])* $reg:ident . $field:ident : $ty:ty, mask = $mask:literal, shift = $shift:literal) => {
        paste::paste! {
            $(#[$m])*
            #[doc = ""]
            #[doc = "Mask `" $mask "`, shift " $shift "."]
            #[inline]
            pub const fn [<$reg _ $field>](v: $ty) -> $ty {
                (v & $mask) >> $shift
            }

            #[doc = "Returns `v` with the `" $field "` field of `" $reg "` set to `x`."]
            #[inline]
            pub const fn [<$reg _with_ $field>](v: $ty, x: $ty) -> $ty {
                (v & !$mask) | ((x << $shift) & $mask)
            }
        }
    };
}

// ── SPI register space ──────────────────────────────────────────────────────

/// Interrupt status, write-1-to-clear.
pub const SPI_INTSTS: u32 = 0x02;
/// Interrupt enable control.
pub const SPI_INTCTL: u32 = 0x03;
/// Chip control.
pub const SPI_CTL: u32 = 0x04;
/// Streaming sample input port. Writes do not auto-increment.
pub const SPI_SAMPLE: u32 = 0x20;
/// Host-to-MCU mailbox.
pub const SPI_MBIN: u32 = 0x30;
/// MCU-to-host mailbox response.
pub const SPI_MBIN_RESP: u32 = 0x31;
/// MCU address window used for slow reads through SPI space.
pub const SPI_MADDR: u32 = 0x40;

/// Command-byte flag selecting a read in the SPI wire protocol.
pub const SPI_READ: u8 = 0x80;

field!(
    /// Mailbox-in interrupt pending.
    spi_intsts.mbin_int: u8, mask = 0x02, shift = 1
);
field!(
    /// Chip reset, active low.
    spi_ctl.resetn: u8, mask = 0x01, shift = 0
);
field!(
    /// External clock select.
    spi_ctl.extclk: u8, mask = 0x04, shift = 2
);

// ── Mailbox ─────────────────────────────────────────────────────────────────

field!(
    /// Host-to-MCU owner toggle.
    mb_host.owner: u8, mask = 0x08, shift = 3
);
field!(
    /// Host-to-MCU request or response code.
    mb_host.message: u8, mask = 0x07, shift = 0
);
field!(
    /// MCU-to-host owner toggle.
    mb_mcu.owner: u8, mask = 0x80, shift = 7
);
field!(
    /// MCU-to-host message code.
    mb_mcu.message: u8, mask = 0x70, shift = 4
);

pub const MB_REQUEST_NOP: u8 = 0x0;
pub const MB_RESPONSE_SUCCESS: u8 = 0x0;

// ── MCU memory space ────────────────────────────────────────────────────────

pub const BOOTROM: u32 = 0x0100_0000;
pub const BOOTRAM_REMAP: u32 = 0x1fff_c000;
pub const RAM: u32 = 0x2000_0000;
pub const RAM_SIZE: u32 = 0x0001_8000;

/// PLL/FLL status word.
pub const CHIP_CONFIG_FLLSTS0: u32 = 0x4000_9068;
/// `fllsts0_mode` value once the loop has locked.
pub const FLLSTS0_MODE_LOCKED: u32 = 0x5;

field!(
    /// FLL state machine mode.
    fllsts0.mode: u32, mask = 0x0000_0007, shift = 0
);

/// Tank control word, first of the tank register block.
pub const DSP_CONFIG_TANK: u32 = 0x4000_c0a8;
/// Tank base address.
pub const DSP_CONFIG_TANKADDR: u32 = 0x4000_c0b0;
/// Words read starting at [`DSP_CONFIG_TANK`] to reach [`DSP_CONFIG_TANKADDR`].
pub const TANK_REGS_WORDS: usize = ((DSP_CONFIG_TANKADDR - DSP_CONFIG_TANK) / 4) as usize + 1;

field!(
    /// Tank size in bytes.
    dsp_tank.size: u32, mask = 0x001f_fff0, shift = 4
);

/// Static DNN feature memory.
pub const DNN_STATIC_FEATURE: u32 = 0x6006_1000;
pub const DNN_STATIC_FEATURE_SIZE: u32 = 0x0000_1000;

// ── Firmware state ──────────────────────────────────────────────────────────

/// Word holding the address of the firmware state block.
pub const FW_STATE_POINTER: u32 = 0x1fff_c0c0;
pub const FW_STATE_TANKPTR_OFFSET: u32 = 0;
pub const FW_STATE_MATCH_RING_SIZE_OFFSET: u32 = 4;
pub const FW_STATE_MATCH_PRODUCER_OFFSET: u32 = 8;
pub const FW_STATE_MATCH_RING_OFFSET: u32 = 12;
/// Bytes per match ring entry: summary word and tank pointer word.
pub const MATCH_ENTRY_SIZE: u32 = 8;

field!(
    /// Winning class index.
    match_summary.winner: u32, mask = 0x3f, shift = 0
);
field!(
    /// A match was detected.
    match_summary.matched: u32, mask = 0x40, shift = 6
);
field!(
    /// More than one class won.
    match_summary.multiple: u32, mask = 0x80, shift = 7
);

/// Returns true if `addr` can hold the firmware state block.
pub const fn is_fw_state_addr(addr: u32) -> bool {
    BOOTRAM_REMAP <= addr && addr < RAM + RAM_SIZE
}
