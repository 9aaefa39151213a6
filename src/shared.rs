use core::cell::RefCell;

use critical_section::Mutex;

use crate::{device::Ndp, transfer::Transfer};

/// An [`Ndp`] shared between foreground code and an interrupt handler.
///
/// Every access runs inside a critical section, so a poll from the
/// interrupt handler can never interleave with a foreground load or
/// extraction.
///
/// ```
/// use ndp10x_micro::prelude::*;
///
/// let bus = FnTransfer(|_: Space, _: u32, data: Data<'_>| {
///     if let Data::In(buf) = data {
///         buf.fill(0);
///     }
///     Ok(())
/// });
/// let shared = SharedNdp::new(Ndp::new(bus));
///
/// // in the interrupt handler
/// let causes = shared.with(|ndp| ndp.poll(true)).unwrap();
/// assert!(causes.is_empty());
/// ```
pub struct SharedNdp<T> {
    inner: Mutex<RefCell<Ndp<T>>>,
}

impl<T: Transfer> SharedNdp<T> {
    pub const fn new(ndp: Ndp<T>) -> Self {
        SharedNdp {
            inner: Mutex::new(RefCell::new(ndp)),
        }
    }

    /// Runs `f` with exclusive access to the device.
    ///
    /// # Panics
    /// Panics if called from inside another `with` on the same device.
    pub fn with<R>(&self, f: impl FnOnce(&mut Ndp<T>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Like [`with`](Self::with), but returns `None` instead of panicking
    /// when the device is already borrowed.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut Ndp<T>) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut ndp = self.inner.borrow(cs).try_borrow_mut().ok()?;
            Some(f(&mut ndp))
        })
    }

    pub fn into_inner(self) -> Ndp<T> {
        self.inner.into_inner().into_inner()
    }
}
