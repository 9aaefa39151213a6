use core::marker::PhantomData;

use crate::{device::Ndp, transfer::Transfer};

/// Bounds on bus bursts and on the internal wait loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Limits {
    /// Largest single burst handed to the transport, in bytes.
    pub max_transfer: u32,
    /// Control-register toggles tried while engaging the external clock.
    pub ext_clk_retries: u32,
    /// Status reads while waiting for the internal PLL to lock.
    pub pll_lock_retries: u32,
    /// Mailbox response reads before a no-op request times out.
    pub nop_timeout: u32,
}

impl Limits {
    pub const DEFAULT: Limits = Limits {
        max_transfer: 2048,
        ext_clk_retries: 128,
        pll_lock_retries: 2500,
        nop_timeout: 1_000_000,
    };
}

impl Default for Limits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// Builder states
pub struct NeedTransport;
pub struct Ready;

/// Typestate builder for [`Ndp`].
///
/// ```
/// use ndp10x_micro::prelude::*;
///
/// let bus = FnTransfer(|_: Space, _: u32, _: Data<'_>| Ok(()));
/// let ndp = NdpBuilder::new()
///     .transport(bus)
///     .max_transfer(512)
///     .nop_timeout(10_000)
///     .build();
/// assert_eq!(ndp.limits().max_transfer, 512);
/// ```
pub struct NdpBuilder<T, State> {
    transport: Option<T>,
    limits: Limits,
    _phantom: PhantomData<State>,
}

impl NdpBuilder<(), NeedTransport> {
    pub fn new() -> Self {
        NdpBuilder {
            transport: None,
            limits: Limits::DEFAULT,
            _phantom: PhantomData,
        }
    }

    /// Set the transfer capability used for every bus access.
    pub fn transport<T: Transfer>(self, transport: T) -> NdpBuilder<T, Ready> {
        NdpBuilder {
            transport: Some(transport),
            limits: self.limits,
            _phantom: PhantomData,
        }
    }
}

impl Default for NdpBuilder<(), NeedTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transfer> NdpBuilder<T, Ready> {
    /// Replace all limits at once.
    pub fn limits(mut self, limits: Limits) -> Self {
        assert_max_transfer(limits.max_transfer);
        self.limits = limits;
        self
    }

    /// Set the maximum burst size.
    ///
    /// # Panics
    /// Panics if `bytes` is zero or not a multiple of 4.
    pub fn max_transfer(mut self, bytes: u32) -> Self {
        assert_max_transfer(bytes);
        self.limits.max_transfer = bytes;
        self
    }

    pub fn ext_clk_retries(mut self, n: u32) -> Self {
        self.limits.ext_clk_retries = n;
        self
    }

    pub fn pll_lock_retries(mut self, n: u32) -> Self {
        self.limits.pll_lock_retries = n;
        self
    }

    pub fn nop_timeout(mut self, n: u32) -> Self {
        self.limits.nop_timeout = n;
        self
    }

    /// Build the device state, ready for the opening `load_log(&[])`.
    pub fn build(self) -> Ndp<T> {
        match self.transport {
            Some(t) => Ndp::with_limits(t, self.limits),
            // Ready is only reachable through `transport()`
            None => unreachable!(),
        }
    }
}

fn assert_max_transfer(bytes: u32) {
    assert!(
        bytes != 0 && bytes % 4 == 0,
        "max_transfer {} must be a non-zero multiple of 4",
        bytes
    );
}
