use crate::{
    NdpError,
    device::Ndp,
    regs::{DNN_STATIC_FEATURE, SPI_SAMPLE},
    transfer::{Space, Transfer},
};

#[cfg(feature = "arg-checks")]
use crate::regs::DNN_STATIC_FEATURE_SIZE;

/// Destination of [`Ndp::send_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendTarget {
    /// The streaming sample FIFO feeding the DSP front end.
    Streaming,
    /// Static feature memory, at a byte offset into it.
    StaticFeature { offset: u32 },
}

impl<T: Transfer> Ndp<T> {
    /// Sends host-produced input to the chip.
    ///
    /// # Errors
    /// [`NdpError::Arg`] in validated builds if a static feature write does
    /// not fit in feature memory or is not a whole number of words.
    pub fn send_data(&mut self, data: &[u8], target: SendTarget) -> Result<(), NdpError> {
        match target {
            SendTarget::Streaming => self.write(Space::Spi, SPI_SAMPLE, data),
            SendTarget::StaticFeature { offset } => {
                #[cfg(feature = "arg-checks")]
                {
                    let end = offset.checked_add(data.len() as u32);
                    if end.is_none_or(|e| e > DNN_STATIC_FEATURE_SIZE) || data.len() % 4 != 0 {
                        crate::fmt::warning!(
                            "static feature write of {} bytes at {:#x} out of range",
                            data.len(),
                            offset
                        );
                        return Err(NdpError::Arg);
                    }
                }
                self.write(Space::Mcu, DNN_STATIC_FEATURE + offset, data)
            }
        }
    }
}
