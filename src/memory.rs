//! Bounded buffer pool for the serialization path
//!
//! [`UcMemory`] hands out byte buffers carved from a fixed number of blocks.
//! A request that finds no block with enough free space suspends until some
//! reservation is released, so a slow writer downstream cannot make the
//! encoder buffer without bound.

use crate::encode::encode_uc_value;
use crate::error::Result;
use crate::value::UcValue;
use bytes::BytesMut;
use futures::channel::oneshot;
use futures::io::{AsyncWrite, AsyncWriteExt};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

struct Block {
    /// Unreserved tail of the block
    free: BytesMut,
    /// Reservations currently taken from this block
    users: usize,
}

#[derive(Default)]
struct PoolState {
    blocks: Vec<Block>,
    /// Block the round-robin search starts from
    last: usize,
    reserved: usize,
    waiters: Vec<oneshot::Sender<()>>,
}

/// Fixed-budget pool of byte blocks
///
/// Total bytes reserved at any moment never exceed
/// `block_size * block_count`. Blocks are allocated lazily and a block's space
/// is reclaimed once every reservation taken from it is released.
pub struct UcMemory {
    block_size: usize,
    block_count: usize,
    state: Mutex<PoolState>,
}

impl fmt::Debug for UcMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("UcMemory")
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .field("allocated", &state.blocks.len())
            .field("reserved", &state.reserved)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

impl UcMemory {
    /// Creates a pool; blocks hold at least one byte, and at least two
    /// blocks are always allowed
    pub fn new(block_size: usize, block_count: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            block_count: block_count.max(2),
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Bytes currently reserved across all blocks
    pub fn reserved(&self) -> usize {
        self.lock().reserved
    }

    /// Blocks allocated so far
    pub fn allocated_blocks(&self) -> usize {
        self.lock().blocks.len()
    }

    /// Runs `f` with exactly `size` bytes reserved from the pool
    ///
    /// `size` is clamped to the block size. Suspends while no block has
    /// room. The reservation is released when `f` completes or when the
    /// returned future is dropped.
    pub async fn use_block<F, R>(&self, size: usize, f: F) -> R
    where
        F: AsyncFnOnce(&mut [u8]) -> R,
    {
        let size = size.min(self.block_size);
        let mut reservation = self.reserve(size).await;
        f(&mut reservation.buf[..]).await
    }

    async fn reserve(&self, size: usize) -> Reservation<'_> {
        loop {
            let waiter = {
                let mut state = self.lock();
                if let Some(reservation) = self.try_reserve(&mut state, size) {
                    return reservation;
                }
                let (sender, receiver) = oneshot::channel();
                state.waiters.push(sender);
                receiver
            };

            debug!(size, "waiting for pool space");
            // A dropped sender wakes the waiter too
            let _ = waiter.await;
        }
    }

    fn try_reserve(&self, state: &mut PoolState, size: usize) -> Option<Reservation<'_>> {
        let count = state.blocks.len();
        let found = (0..count)
            .map(|offset| (state.last + offset) % count)
            .find(|&index| state.blocks[index].free.len() >= size);

        let (index, buf) = match found {
            Some(index) => {
                let block = &mut state.blocks[index];
                block.users += 1;
                (index, block.free.split_to(size))
            }
            None if count < self.block_count => {
                let mut free = BytesMut::zeroed(self.block_size);
                let buf = free.split_to(size);
                state.blocks.push(Block { free, users: 1 });
                trace!(block = count, size = self.block_size, "allocated pool block");
                (count, buf)
            }
            None => return None,
        };

        state.last = index;
        state.reserved += size;
        trace!(block = index, size, reserved = state.reserved, "reserved pool space");

        Some(Reservation {
            memory: self,
            block: index,
            buf,
        })
    }

    fn release(&self, block: usize, size: usize) {
        let mut state = self.lock();
        state.reserved -= size;

        let block_size = self.block_size;
        let entry = &mut state.blocks[block];
        entry.users -= 1;
        if entry.users == 0 {
            // Every split is gone, so the original allocation is reclaimed
            entry.free.clear();
            entry.free.reserve(block_size);
            entry.free.resize(block_size, 0);
        }

        trace!(block, size, reserved = state.reserved, "released pool space");
        for waiter in state.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Reservation<'m> {
    memory: &'m UcMemory,
    block: usize,
    buf: BytesMut,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let size = self.buf.len();
        drop(std::mem::take(&mut self.buf));
        self.memory.release(self.block, size);
    }
}

/// Writes a value as URI Charge, staging the text through pool buffers
pub async fn write_uc_value_async<W>(value: &UcValue, writer: &mut W, memory: &UcMemory) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let text = encode_uc_value(value);
    for chunk in text.as_bytes().chunks(memory.block_size()) {
        memory
            .use_block(chunk.len(), async |buf: &mut [u8]| {
                buf.copy_from_slice(chunk);
                writer.write_all(buf).await
            })
            .await?;
    }

    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_block_count_is_at_least_two() {
        let memory = UcMemory::new(8, 0);
        assert_eq!(memory.block_count(), 2);
    }

    #[test]
    fn test_zero_block_size_still_writes() {
        let memory = UcMemory::new(0, 2);
        assert_eq!(memory.block_size(), 1);

        let mut out = Vec::new();
        block_on(write_uc_value_async(&UcValue::from("ab"), &mut out, &memory)).unwrap();
        assert_eq!(out, b"ab");
        assert_eq!(memory.reserved(), 0);
    }

    #[test]
    fn test_sizes_clamped_and_third_request_waits() {
        let memory = Rc::new(UcMemory::new(10, 2));
        let log = Rc::new(RefCell::new(Vec::new()));
        let (release_first, first_released) = oneshot::channel::<()>();
        let (_release_second, second_released) = oneshot::channel::<()>();

        let mut pool = LocalPool::new();
        let spawner = pool.spawner();

        {
            let memory = memory.clone();
            let log = log.clone();
            spawner
                .spawn_local(async move {
                    memory
                        .use_block(12, async move |buf: &mut [u8]| {
                            log.borrow_mut().push(("first", buf.len()));
                            let _ = first_released.await;
                        })
                        .await
                })
                .unwrap();
        }
        {
            let memory = memory.clone();
            let log = log.clone();
            spawner
                .spawn_local(async move {
                    memory
                        .use_block(13, async move |buf: &mut [u8]| {
                            log.borrow_mut().push(("second", buf.len()));
                            let _ = second_released.await;
                        })
                        .await
                })
                .unwrap();
        }
        {
            let memory = memory.clone();
            let log = log.clone();
            spawner
                .spawn_local(async move {
                    memory
                        .use_block(5, async move |buf: &mut [u8]| {
                            log.borrow_mut().push(("third", buf.len()));
                        })
                        .await
                })
                .unwrap();
        }

        pool.run_until_stalled();
        assert_eq!(*log.borrow(), vec![("first", 10), ("second", 10)]);
        assert_eq!(memory.reserved(), 20);
        assert_eq!(memory.allocated_blocks(), 2);

        release_first.send(()).unwrap();
        pool.run_until_stalled();
        assert_eq!(
            *log.borrow(),
            vec![("first", 10), ("second", 10), ("third", 5)]
        );
        assert_eq!(memory.reserved(), 10);
    }

    #[test]
    fn test_blocks_are_shared_until_full() {
        let memory = UcMemory::new(10, 2);
        block_on(async {
            memory
                .use_block(4, async |outer: &mut [u8]| {
                    outer.fill(1);
                    memory
                        .use_block(6, async |inner: &mut [u8]| {
                            assert_eq!(inner, &[0u8; 6][..]);
                        })
                        .await;
                    assert_eq!(memory.allocated_blocks(), 1);
                    assert_eq!(memory.reserved(), 4);
                })
                .await;
        });
        assert_eq!(memory.reserved(), 0);
    }

    #[test]
    fn test_write_value_in_chunks() {
        let memory = UcMemory::new(4, 2);
        let value = UcValue::map([
            ("name", UcValue::from("churi")),
            ("tags", UcValue::list([UcValue::from("a"), UcValue::from("b")])),
        ]);
        let mut out = Vec::new();

        block_on(write_uc_value_async(&value, &mut out, &memory)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), encode_uc_value(&value));
        assert_eq!(memory.reserved(), 0);
    }
}
