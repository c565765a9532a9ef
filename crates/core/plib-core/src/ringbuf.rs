//! Single-producer/single-consumer byte ring buffer.
//!
//! [`RingBuf`] sits between an interrupt handler and the foreground loop.
//! One side only ever pushes, the other only ever pops, and each side owns
//! exactly one index:
//!
//! - the producer advances `head` (next slot to fill),
//! - the consumer advances `tail` (next slot to drain).
//!
//! # Capacity
//!
//! The backing array has `SIZE` slots but at most `SIZE - 1` bytes can be
//! stored. One slot is always left empty so that `head == tail` means empty
//! and `head + 1 == tail` (mod `SIZE`) means full.
//!
//! # Memory ordering
//!
//! A byte is stored into its slot before the `Release` store of the index
//! that publishes it, and the other side reads the index with `Acquire`
//! before touching the slot. The same pairing on `tail` guarantees the
//! consumer has finished reading a slot before the producer reuses it.
//! Slots are `AtomicU8`, so even a caller that breaks the single-producer
//! rule only corrupts data order, never memory safety.
//!
//! # Examples
//!
//! ```ignore
//! use plib_core::ringbuf::RingBuf;
//!
//! // Size 8, capacity 7.
//! let ring = RingBuf::<8>::new();
//!
//! assert!(ring.push(1));
//! assert!(ring.push(2));
//! assert_eq!(ring.pop(), Some(1));
//! assert_eq!(ring.len(), 1);
//! ```

use crate::sync::loom_compat::{AtomicU8, AtomicUsize, Ordering};

/// A fixed-size SPSC ring of bytes.
///
/// # Type Parameters
///
/// - `SIZE`: number of slots in the backing array (usable capacity is
///   `SIZE - 1`, so `SIZE` must be at least 2).
pub struct RingBuf<const SIZE: usize> {
    buf: [AtomicU8; SIZE],
    /// Next slot to fill. Written only by the producer.
    head: AtomicUsize,
    /// Next slot to drain. Written only by the consumer.
    tail: AtomicUsize,
}

impl<const N: usize> Default for RingBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuf<N> {
    /// The total size of the backing array. The usable capacity is `SIZE - 1`.
    pub const SIZE: usize = N;

    const SIZE_CHECK: () = assert!(N >= 2, "ring buffer needs at least two slots");

    /// Creates an empty ring. Does not allocate.
    #[cfg(not(loom))]
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::SIZE_CHECK;
        Self {
            buf: [const { AtomicU8::new(0) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Creates an empty ring backed by loom atomics.
    #[cfg(loom)]
    #[must_use]
    pub fn new() -> Self {
        let () = Self::SIZE_CHECK;
        Self {
            buf: core::array::from_fn(|_| AtomicU8::new(0)),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    #[inline]
    const fn advance(idx: usize) -> usize {
        let next = idx + 1;
        if next == N { 0 } else { next }
    }

    /// Returns the maximum number of bytes the ring can hold (`SIZE - 1`).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Returns the number of bytes waiting to be popped.
    ///
    /// Safe to call from either side. The two indices are loaded separately,
    /// so a concurrent push or pop may make the result stale by the time it
    /// is returned.
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + N - tail) % N
    }

    /// Returns the number of bytes that can still be pushed.
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Returns `true` if there is nothing to pop.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Returns `true` if a push would fail.
    #[must_use]
    pub fn is_full(&self) -> bool {
        Self::advance(self.head.load(Ordering::Acquire)) == self.tail.load(Ordering::Acquire)
    }

    /// Pushes one byte. Producer side only.
    ///
    /// Returns `false` (and drops nothing from the ring) if it is full.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = Self::advance(head);
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }

        self.buf[head].store(byte, Ordering::Relaxed);
        self.head.store(next, Ordering::Release);
        true
    }

    /// Pops the oldest byte. Consumer side only.
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }

        let byte = self.buf[tail].load(Ordering::Relaxed);
        self.tail.store(Self::advance(tail), Ordering::Release);
        Some(byte)
    }

    /// Pushes bytes from `src` until it is exhausted or the ring is full.
    /// Producer side only.
    ///
    /// Each byte is published as soon as it is stored, so the consumer may
    /// start draining before this returns. Returns the number of bytes
    /// accepted, which may be less than `src.len()`.
    pub fn write(&self, src: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in src {
            if !self.push(byte) {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Pops bytes into `dest` until it is full or the ring is empty.
    /// Consumer side only.
    ///
    /// Works on a snapshot of the producer index and publishes the new read
    /// index once, after the copy. Returns the number of bytes copied.
    pub fn read(&self, dest: &mut [u8]) -> usize {
        let mut tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        let mut count = 0;
        for slot in dest.iter_mut() {
            if tail == head {
                break;
            }
            *slot = self.buf[tail].load(Ordering::Relaxed);
            tail = Self::advance(tail);
            count += 1;
        }

        self.tail.store(tail, Ordering::Release);
        count
    }

    /// Discards everything currently stored. Consumer side only.
    pub fn clear(&self) {
        let head = self.head.load(Ordering::Acquire);
        self.tail.store(head, Ordering::Release);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn new_ring_is_empty() {
        let ring = RingBuf::<1024>::new();
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.free(), 1023);
    }

    #[test]
    fn push_stores_in_order() {
        let ring = RingBuf::<1024>::new();
        assert!(ring.push(15));
        assert!(ring.push(42));
        assert_eq!(ring.buf[0].load(Ordering::Relaxed), 15);
        assert_eq!(ring.buf[1].load(Ordering::Relaxed), 42);
    }

    #[test]
    fn push_rollover() {
        let ring = RingBuf::<1024>::new();
        assert_eq!(ring.capacity(), 1023);
        for i in 0..1023u32 {
            assert!(ring.push((i % 255) as u8));
        }
        assert!(!ring.push(1));
        assert_eq!(ring.len(), 1023);

        assert_eq!(ring.pop(), Some(0));
        assert_eq!(ring.len(), 1022);
        assert!(ring.push(1));
        assert_eq!(ring.len(), 1023);
        assert!(ring.is_full());
    }

    #[test]
    fn pop_empty() {
        let ring = RingBuf::<8>::new();
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn push_pop_fifo_order() {
        let ring = RingBuf::<8>::new();
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn len_and_free_tracking() {
        let ring = RingBuf::<8>::new();
        assert_eq!(ring.len(), 0);
        ring.push(1);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.free(), 6);
        ring.push(2);
        assert_eq!(ring.len(), 2);
        let _ = ring.pop();
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.free(), 6);
    }

    #[test]
    fn is_full_check() {
        let ring = RingBuf::<4>::new();
        assert!(!ring.is_full());
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert!(ring.is_full());
        assert_eq!(ring.free(), 0);
    }

    #[test]
    fn wrap_around_multiple_times() {
        let ring = RingBuf::<4>::new();
        for round in 0u8..5 {
            ring.push(round * 3);
            ring.push(round * 3 + 1);
            ring.push(round * 3 + 2);
            assert_eq!(ring.pop(), Some(round * 3));
            assert_eq!(ring.pop(), Some(round * 3 + 1));
            assert_eq!(ring.pop(), Some(round * 3 + 2));
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn size_eight_scenario() {
        let ring = RingBuf::<8>::new();
        for b in 1..=7 {
            assert!(ring.push(b));
        }
        assert!(!ring.push(8));

        let mut out = [0u8; 5];
        assert_eq!(ring.read(&mut out), 5);
        assert_eq!(out, [1, 2, 3, 4, 5]);

        assert_eq!(ring.write(&[8, 9, 10]), 3);

        let mut rest = [0u8; 8];
        let n = ring.read(&mut rest);
        assert_eq!(&rest[..n], &[6, 7, 8, 9, 10]);
    }

    #[test]
    fn bulk_write_is_partial_when_full() {
        let ring = RingBuf::<4>::new();
        assert_eq!(ring.write(&[1, 2, 3, 4, 5]), 3);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.write(&[4, 5]), 1);

        let mut out = [0u8; 8];
        let n = ring.read(&mut out);
        assert_eq!(&out[..n], &[2, 3, 4]);
    }

    #[test]
    fn bulk_read_stops_at_dest_len() {
        let ring = RingBuf::<8>::new();
        ring.write(&[1, 2, 3, 4]);
        let mut out = [0u8; 2];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(out, [1, 2]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn clear_discards_pending() {
        let ring = RingBuf::<8>::new();
        ring.write(&[1, 2, 3]);
        ring.clear();
        assert!(ring.is_empty());
        assert!(ring.push(9));
        assert_eq!(ring.pop(), Some(9));
    }

    #[test]
    fn interleaved_pushes_and_pops_keep_order() {
        let ring = RingBuf::<5>::new();
        let mut expected = Vec::new();
        let mut seen = Vec::new();
        let mut next = 0u8;

        for step in 0..200u32 {
            if step % 3 == 2 {
                if let Some(b) = ring.pop() {
                    seen.push(b);
                }
            } else if ring.push(next) {
                expected.push(next);
                next = next.wrapping_add(1);
            }
        }
        while let Some(b) = ring.pop() {
            seen.push(b);
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn threaded_producer_consumer_preserves_order() {
        use std::sync::Arc;

        let ring = Arc::new(RingBuf::<16>::new());
        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for i in 0..10_000u32 {
                    while !ring.push(i as u8) {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        let mut received = 0u32;
        while received < 10_000 {
            if let Some(b) = ring.pop() {
                assert_eq!(b, received as u8);
                received += 1;
            }
        }
        producer.join().unwrap();
        assert!(ring.is_empty());
    }
}
