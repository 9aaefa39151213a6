use crate::{
    NdpError,
    device::Ndp,
    fmt::{debug, trace},
    regs::*,
    transfer::Transfer,
};

/// Decoded match ring summary word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MatchSummary(pub u32);

impl MatchSummary {
    #[inline]
    pub fn matched(self) -> bool {
        match_summary_matched(self.0) != 0
    }

    #[inline]
    pub fn multiple(self) -> bool {
        match_summary_multiple(self.0) != 0
    }

    /// Winning class, only for an unambiguous match.
    pub fn class(self) -> Option<u8> {
        (self.matched() && !self.multiple()).then(|| match_summary_winner(self.0) as u8)
    }
}

impl<T: Transfer> Ndp<T> {
    /// Consumes one match ring entry.
    ///
    /// Returns the winning class for an unambiguous match and records its
    /// tank position for [`ExtractFrom::Match`](crate::ExtractFrom::Match).
    /// Non-matches and ambiguous matches are consumed and reported as
    /// `None`, as is an empty ring. Call until [`poll`](Self::poll) stops
    /// reporting [`Notification::Match`](crate::Notification::Match).
    pub fn get_match(&mut self) -> Result<Option<u8>, NdpError> {
        if !self.ring.pending() {
            return Ok(None);
        }

        let fw = self.fw_state()?;
        let entry = fw + FW_STATE_MATCH_RING_OFFSET + self.ring.consumer * MATCH_ENTRY_SIZE;
        let [summary, tankptr] = self.read_words::<2>(entry)?;
        let summary = MatchSummary(summary);

        let class = summary.class();
        match class {
            Some(c) => {
                self.tank.matched = tankptr & !0x3;
                debug!("match class {} at tank {:#x}", c, self.tank.matched);
            }
            None => trace!("match entry {:#x} skipped", summary.0),
        }

        self.ring.consumer += 1;
        if self.ring.consumer >= self.ring.size {
            self.ring.consumer = 0;
        }
        Ok(class)
    }
}
