//! Lock-serialized handle for a link used from several threads.

use crate::link::SpiLink;
use crate::pins::SpiPins;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// One lock per physical bus.
///
/// Every transfer holds the lock from chip-select assertion to release, so
/// transfers issued from different clones never interleave on the wire.
pub struct SharedSpiLink<P> {
    inner: Arc<Mutex<SpiLink<P>>>,
}

impl<P> Clone for SharedSpiLink<P> {
    fn clone(&self) -> Self {
        SharedSpiLink {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: SpiPins> SharedSpiLink<P> {
    pub fn new(link: SpiLink<P>) -> Self {
        SharedSpiLink {
            inner: Arc::new(Mutex::new(link)),
        }
    }

    pub fn transfer(&self, buffer_in: &mut [u8], buffer_out: &[u8]) {
        self.inner.lock().transfer(buffer_in, buffer_out);
    }

    pub fn transfer_in_place(&self, buffer: &mut [u8]) {
        self.inner.lock().transfer_in_place(buffer);
    }

    /// Exclusive access across several transfers
    pub fn lock(&self) -> MutexGuard<'_, SpiLink<P>> {
        self.inner.lock()
    }

    /// Unwrap the link once no other clone is left
    pub fn try_unwrap(self) -> Result<SpiLink<P>, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| SharedSpiLink { inner })
    }
}

impl<P: SpiPins> From<SpiLink<P>> for SharedSpiLink<P> {
    fn from(link: SpiLink<P>) -> Self {
        Self::new(link)
    }
}
