//! A `no_std`, no-alloc host driver core for the NDP10x neural decision
//! processor.
//!
//! The crate covers the parts of host integration with real state: a burst
//! limited transfer primitive over the chip's two address spaces, a
//! resumable replay of the TLV initialization log, and the notification,
//! match ring and tank extraction protocol used to pull samples around a
//! detected event.
//!
//! # Features
//!
//! - **Caller-owned state** - one [`Ndp`] per chip, no globals
//! - **Pluggable transport** - anything implementing [`Transfer`]; closures
//!   through [`FnTransfer`], real hardware through [`SpiTransport`]
//! - **Chunked log replay** - feed the log in any 4-byte aligned pieces
//! - **Compile-time argument checks** - the `arg-checks` feature (default)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐          ┌──────────────────────────┐
//! │   Host           │          │   NDP10x                 │
//! │                  │  SPI     │                          │
//! │  load_log()      │─────────▶│  registers, MCU memory   │
//! │  poll()          │◀─────────│  mailbox event           │
//! │  get_match()     │◀─────────│  match ring              │
//! │  extract()       │◀─────────│  tank (circular samples) │
//! └──────────────────┘          └──────────────────────────┘
//! ```
//!
//! Any error leaves the device in an undefined state. Recover with
//! [`Ndp::reset`] and a full replay of the log.
//!
//! # Example
//!
//! ```rust,no_run
//! use ndp10x_micro::prelude::*;
//!
//! fn run<T: Transfer>(ndp: &mut Ndp<T>, log: &[u8]) -> Result<(), NdpError> {
//!     // open the loader, then feed the log
//!     ndp.load_log(&[])?;
//!     for chunk in log.chunks(1024) {
//!         if ndp.load_log(chunk)? == LoadStatus::Done {
//!             break;
//!         }
//!     }
//!
//!     let mut audio = [0u8; 1600];
//!     loop {
//!         let causes = ndp.poll(true)?;
//!         if !causes.contains(Notification::Match) {
//!             continue;
//!         }
//!         if let Some(class) = ndp.get_match()? {
//!             // half a second of 16 kHz 16-bit audio before the match
//!             ndp.set_extract_match(16000)?;
//!             let n = ndp.extract_unread(&mut audio)?;
//!             let _ = (class, n);
//!         }
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![no_std]

#[cfg(test)]
extern crate std;

mod fmt;

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod image;
pub mod loader;
pub mod matches;
pub mod notify;
pub mod regs;
pub mod shared;
pub mod spi;
pub mod stream;
pub mod tank;
pub mod transfer;

#[cfg(test)]
mod test_support;

pub use config::{Limits, NdpBuilder};
pub use device::{MatchRing, Ndp, TankCursors};
pub use error::{NdpError, status_from_code};
pub use image::{Encoding, ImageIndex, ImageLoader};
pub use loader::{HEADER_MAGIC, LoadProgress, LoadStatus, Tag};
pub use matches::MatchSummary;
pub use notify::{Notification, Notifications};
pub use shared::SharedNdp;
pub use spi::SpiTransport;
pub use stream::SendTarget;
pub use tank::ExtractFrom;
pub use transfer::{Data, FnTransfer, Space, Transfer};

pub mod prelude {
    pub use crate::{
        Data, Encoding, ExtractFrom, FnTransfer, ImageIndex, ImageLoader, Limits, LoadProgress,
        LoadStatus, Ndp, NdpBuilder, NdpError, Notification, Notifications, SendTarget,
        SharedNdp, Space, SpiTransport, Transfer,
    };
}
