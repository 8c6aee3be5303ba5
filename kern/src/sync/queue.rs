// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A bounded, non-blocking message queue.
//!
//! The source treats messages as opaque pointers; here the payload is a
//! small `Copy` type parameter instead, so callers can send typed tokens
//! (indices, small enums, raw pointers) without an unsafe cast at the call
//! site. The underlying representation is still a fixed-size ring.

use crate::err::{KernelError, Result};
use crate::sched;

/// The pure ring-buffer logic, directly unit-testable with no kernel
/// involvement at all: queue operations never touch task state.
pub struct QueueState<T, const N: usize> {
    buffer: [T; N],
    head: usize,
    tail: usize,
    count: usize,
}

impl<T: Copy, const N: usize> QueueState<T, N> {
    /// `fill` populates the otherwise-unused buffer slots; it is never
    /// observably read back before being overwritten by a `send`.
    pub const fn new(fill: T) -> Self {
        QueueState {
            buffer: [fill; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == N
    }

    pub fn send(&mut self, msg: T) -> Result<()> {
        if self.count == N {
            return Err(KernelError::QueueFull);
        }
        self.buffer[self.tail] = msg;
        self.tail = (self.tail + 1) % N;
        self.count += 1;
        Ok(())
    }

    pub fn receive(&mut self) -> Result<T> {
        if self.count == 0 {
            return Err(KernelError::QueueEmpty);
        }
        let msg = self.buffer[self.head];
        self.head = (self.head + 1) % N;
        self.count -= 1;
        Ok(msg)
    }
}

/// The kernel-global handle application code declares a `static` of.
pub struct Queue<T: Copy, const N: usize>(sched::CriticalCell<QueueState<T, N>>);

impl<T: Copy, const N: usize> Queue<T, N> {
    pub const fn new(fill: T) -> Self {
        Queue(sched::CriticalCell::new(QueueState::new(fill)))
    }

    pub fn send(&self, msg: T) -> Result<()> {
        self.0.with(|q| q.send(msg))
    }

    pub fn receive(&self) -> Result<T> {
        self.0.with(|q| q.receive())
    }

    pub fn len(&self) -> usize {
        self.0.with(|q| q.len())
    }

    pub fn is_empty(&self) -> bool {
        self.0.with(|q| q.is_empty())
    }
}

/// A queue of machine-word-sized tokens, sized by the board's configured
/// queue capacity — the default instantiation matching the source's
/// "opaque pointer" message type.
pub type DefaultQueue = Queue<usize, { crate::config::QUEUE_CAPACITY }>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_and_receive_preserve_fifo_order() {
        let mut q: QueueState<u32, 4> = QueueState::new(0);
        q.send(1).unwrap();
        q.send(2).unwrap();
        q.send(3).unwrap();
        assert_eq!(q.len(), 3);

        assert_eq!(q.receive().unwrap(), 1);
        assert_eq!(q.receive().unwrap(), 2);
        assert_eq!(q.receive().unwrap(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn send_to_full_queue_fails() {
        let mut q: QueueState<u32, 2> = QueueState::new(0);
        q.send(1).unwrap();
        q.send(2).unwrap();
        assert!(q.is_full());
        assert_eq!(q.send(3).unwrap_err(), KernelError::QueueFull);
    }

    #[test]
    fn receive_from_empty_queue_fails() {
        let mut q: QueueState<u32, 2> = QueueState::new(0);
        assert_eq!(q.receive().unwrap_err(), KernelError::QueueEmpty);
    }

    #[test]
    fn ring_buffer_wraps_around() {
        let mut q: QueueState<u32, 3> = QueueState::new(0);
        q.send(1).unwrap();
        q.send(2).unwrap();
        q.receive().unwrap();
        q.send(3).unwrap();
        q.send(4).unwrap();
        assert_eq!(q.receive().unwrap(), 2);
        assert_eq!(q.receive().unwrap(), 3);
        assert_eq!(q.receive().unwrap(), 4);
    }
}
