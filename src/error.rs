/// Errors reported by NDP operations.
///
/// Any error leaves the device state undefined. The only recovery is
/// [`Ndp::reset`](crate::Ndp::reset) followed by replaying the
/// initialization log from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NdpError {
    /// Generic failure, including bus errors and failed mailbox requests.
    Fail,
    /// Caller violated an argument contract.
    Arg,
    /// Firmware state pointer is outside chip RAM, no firmware is running.
    Uninit,
    /// Malformed initialization log.
    Package,
    /// A bounded wait loop ran out of iterations.
    Timeout,
}

impl NdpError {
    /// Vendor status code for this error.
    pub const fn code(self) -> i32 {
        match self {
            NdpError::Fail => 1,
            NdpError::Arg => 2,
            NdpError::Uninit => 3,
            NdpError::Package => 4,
            NdpError::Timeout => 8,
        }
    }

    /// Vendor short name for this error.
    pub const fn name(self) -> &'static str {
        match self {
            NdpError::Fail => "fail",
            NdpError::Arg => "arg",
            NdpError::Uninit => "uninit",
            NdpError::Package => "package",
            NdpError::Timeout => "timeout",
        }
    }
}

/// Converts a vendor status code into a `Result`.
///
/// `0` is success. Codes without a dedicated variant map to
/// [`NdpError::Fail`].
pub fn status_from_code(code: i32) -> Result<(), NdpError> {
    match code {
        0 => Ok(()),
        2 => Err(NdpError::Arg),
        3 => Err(NdpError::Uninit),
        4 => Err(NdpError::Package),
        8 => Err(NdpError::Timeout),
        _ => Err(NdpError::Fail),
    }
}

impl core::fmt::Display for NdpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NdpError::Fail => write!(f, "general failure"),
            NdpError::Arg => write!(f, "invalid argument"),
            NdpError::Uninit => write!(f, "device uninitialized or no firmware loaded"),
            NdpError::Package => write!(f, "package format error"),
            NdpError::Timeout => write!(f, "operation timeout"),
        }
    }
}
