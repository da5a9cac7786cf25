//! Reusable encode buffers for the fast compressor.
//!
//! # Purpose
//!
//! Re-encoding a large scan produces tens of megabytes of output. Allocating
//! a fresh buffer per item churns the allocator, so the fast compressor
//! encodes into a buffer checked out of a small pool and copies the finished
//! bytes out before returning it.
//!
//! # Invariants
//!
//! - **Bounded**: at most `slots` buffers exist, none retained above `cap` bytes
//! - **Leak-free**: [`ScratchBuffer`] is RAII and returns its buffer on drop,
//!   including during unwinding
//! - **Exclusive**: a checked-out buffer is owned by exactly one worker, so
//!   abandoned work can never be observed by another item
//!
//! The pipeline sizes the pool to its worker count, so `checkout` only
//! blocks if a caller shares one pool across more threads than slots.

use std::io;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Default per-buffer cap (64 MiB).
pub const DEFAULT_SCRATCH_BYTES: usize = 0x0400_0000;

#[derive(Debug)]
struct State {
    free: Vec<Vec<u8>>,
}

/// Fixed set of reusable byte buffers.
#[derive(Debug)]
pub struct ScratchPool {
    slots: usize,
    cap: usize,
    state: Mutex<State>,
    cv: Condvar,
}

impl ScratchPool {
    /// Create a pool of `slots` buffers (at least one), each capped at `cap` bytes.
    ///
    /// Buffers start empty and grow on first use.
    pub fn new(slots: usize, cap: usize) -> Self {
        let slots = slots.max(1);
        Self {
            slots,
            cap,
            state: Mutex::new(State {
                free: (0..slots).map(|_| Vec::new()).collect(),
            }),
            cv: Condvar::new(),
        }
    }

    #[inline]
    fn lock_or_recover(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave a buffer half-returned.
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Number of buffers in the pool.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Maximum bytes a single buffer may hold.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Buffers currently free. A snapshot only.
    pub fn available(&self) -> usize {
        self.lock_or_recover().free.len()
    }

    /// Check a buffer out, blocking while all are in use.
    pub fn checkout(&self) -> ScratchBuffer<'_> {
        let mut st = self.lock_or_recover();
        loop {
            if let Some(mut buf) = st.free.pop() {
                buf.clear();
                return ScratchBuffer {
                    pool: self,
                    buf: Some(buf),
                };
            }
            st = self
                .cv
                .wait(st)
                .unwrap_or_else(|poison| poison.into_inner());
        }
    }

    fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        if buf.capacity() > self.cap {
            buf.shrink_to(self.cap);
        }
        let mut st = self.lock_or_recover();
        st.free.push(buf);
        drop(st);
        self.cv.notify_one();
    }
}

/// A buffer checked out of a [`ScratchPool`].
///
/// Implements [`io::Write`]; writes past the pool's cap fail with
/// [`io::ErrorKind::OutOfMemory`] so an encoder writing into it aborts
/// instead of growing without bound.
#[derive(Debug)]
pub struct ScratchBuffer<'a> {
    pool: &'a ScratchPool,
    buf: Option<Vec<u8>>,
}

impl ScratchBuffer<'_> {
    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Copy the written bytes out. The buffer itself goes back to the pool on drop.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl io::Write for ScratchBuffer<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let cap = self.pool.cap;
        let buf = self
            .buf
            .as_mut()
            .ok_or_else(|| io::Error::other("scratch buffer already released"))?;
        if buf.len() + data.len() > cap {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                format!("encoded output exceeds scratch cap of {} bytes", cap),
            ));
        }
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ScratchBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
