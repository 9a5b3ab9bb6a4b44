//! Stack-ordered byte arena backing token and key buffers.
//!
//! A buffer is handed out *tentatively* at the cursor of the current block and
//! may be grown with [`Arena::realloc`] while a token is still being scanned.
//! Nothing is reserved until [`Arena::commit`] is called; the next `alloc`
//! simply reuses the same bytes. Committed buffers are released with
//! [`Arena::free`] in strict LIFO order, which mirrors the matcher's recursion:
//! a matched object key is committed before descending into its value and
//! freed as soon as that descent returns.
//!
//! Storage is an ordered chain of blocks. Only one block is current; earlier
//! blocks hold committed buffers from shallower recursion levels and are
//! resumed once everything above them has been freed. Blocks after the current
//! one are always empty and are kept around for reuse.

use std::collections::TryReserveError;

/// Default capacity of a freshly appended block.
pub const BLOCK_SIZE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("out of memory: failed to reserve {requested} bytes")]
    OutOfMemory {
        requested: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Handle to a byte range inside an [`Arena`].
///
/// A span returned by `alloc`/`realloc` covers the whole tentative capacity;
/// the tokenizer narrows it to the bytes actually written with [`Span::truncate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    block: usize,
    start: usize,
    len: usize,
}

impl Span {
    /// Shared sentinel for zero-sized allocations.
    pub const EMPTY: Span = Span {
        block: 0,
        start: 0,
        len: 0,
    };

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Narrow the span to its first `len` bytes.
    pub fn truncate(self, len: usize) -> Span {
        debug_assert!(len <= self.len, "truncate past end of span");
        Span { len, ..self }
    }
}

#[derive(Debug)]
struct Block {
    buf: Vec<u8>,
    used: usize,
}

impl Block {
    fn with_capacity(size: usize) -> Result<Self, ArenaError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|source| ArenaError::OutOfMemory {
                requested: size,
                source,
            })?;
        buf.resize(size, 0);
        Ok(Block { buf, used: 0 })
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.used
    }

    /// Grow in place, keeping existing contents.
    fn grow(&mut self, size: usize) -> Result<(), ArenaError> {
        if size <= self.buf.len() {
            return Ok(());
        }
        self.buf
            .try_reserve_exact(size - self.buf.len())
            .map_err(|source| ArenaError::OutOfMemory {
                requested: size,
                source,
            })?;
        self.buf.resize(size, 0);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Arena {
    blocks: Vec<Block>,
    current: usize,
    block_size: usize,
    /// Capacity of the tentative allocation sitting at the cursor.
    pending: usize,
    /// Sizes of committed, not yet freed buffers (top = most recent).
    #[cfg(debug_assertions)]
    outstanding: Vec<usize>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    pub fn new() -> Self {
        Self::with_block_size(BLOCK_SIZE)
    }

    /// Create an arena whose blocks default to `block_size` bytes.
    pub fn with_block_size(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Arena {
            blocks: vec![Block {
                buf: vec![0; block_size],
                used: 0,
            }],
            current: 0,
            block_size,
            pending: 0,
            #[cfg(debug_assertions)]
            outstanding: Vec::new(),
        }
    }

    /// Hand out a tentative buffer of `size` bytes at the cursor.
    pub fn alloc(&mut self, size: usize) -> Result<Span, ArenaError> {
        if size == 0 {
            self.pending = 0;
            return Ok(Span::EMPTY);
        }

        if size > self.blocks[self.current].remaining() {
            if self.blocks[self.current].used == 0 {
                // Nothing live in this block: a single oversized buffer.
                self.blocks[self.current].grow(size)?;
            } else {
                self.next_available_block(size.max(self.block_size))?;
            }
        }

        self.pending = size;
        Ok(self.tentative(size))
    }

    /// Grow the current tentative allocation to `new_size`, keeping its bytes.
    ///
    /// The returned span may live in a different block than the one returned
    /// by the preceding `alloc`.
    pub fn realloc(&mut self, new_size: usize) -> Result<Span, ArenaError> {
        if new_size == 0 {
            self.pending = 0;
            return Ok(Span::EMPTY);
        }

        if new_size > self.blocks[self.current].remaining() {
            if self.blocks[self.current].used == 0 {
                self.blocks[self.current].grow(new_size * 2)?;
            } else {
                let from = self.current;
                let start = self.blocks[from].used;
                let keep = self.pending.min(new_size);
                self.next_available_block(new_size.max(self.block_size))?;

                let (before, after) = self.blocks.split_at_mut(self.current);
                after[0].buf[..keep].copy_from_slice(&before[from].buf[start..start + keep]);
            }
        }

        self.pending = new_size;
        Ok(self.tentative(new_size))
    }

    /// Reserve the first `size` bytes of the tentative allocation so they
    /// survive subsequent allocations until the matching [`Arena::free`].
    pub fn commit(&mut self, size: usize) {
        if size == 0 {
            return;
        }
        let block = &mut self.blocks[self.current];
        debug_assert!(block.remaining() >= size, "commit exceeds block capacity");
        block.used += size;
        self.pending = 0;
        #[cfg(debug_assertions)]
        self.outstanding.push(size);
    }

    /// Release the most recently committed `size` bytes.
    pub fn free(&mut self, size: usize) {
        if size == 0 {
            return;
        }
        #[cfg(debug_assertions)]
        {
            let top = self.outstanding.pop();
            debug_assert_eq!(top, Some(size), "arena free out of LIFO order");
        }

        if self.blocks[self.current].used == 0 {
            // Everything in this block is gone already; the buffer being
            // released lives at the end of the previous block.
            debug_assert!(self.current > 0, "free on an empty arena");
            if self.current == 0 {
                return;
            }
            self.current -= 1;
        }

        let block = &mut self.blocks[self.current];
        debug_assert!(block.used >= size, "free exceeds committed bytes");
        block.used = block.used.saturating_sub(size);
        self.pending = 0;
    }

    pub fn get(&self, span: Span) -> &[u8] {
        &self.blocks[span.block].buf[span.start..span.start + span.len]
    }

    pub fn get_mut(&mut self, span: Span) -> &mut [u8] {
        &mut self.blocks[span.block].buf[span.start..span.start + span.len]
    }

    /// Total committed bytes across all blocks.
    pub fn committed(&self) -> usize {
        self.blocks[..=self.current].iter().map(|b| b.used).sum()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn tentative(&self, size: usize) -> Span {
        Span {
            block: self.current,
            start: self.blocks[self.current].used,
            len: size,
        }
    }

    /// Make the next block with at least `size` bytes current, dropping
    /// smaller spare blocks on the way or appending a new one.
    fn next_available_block(&mut self, size: usize) -> Result<(), ArenaError> {
        let next = self.current + 1;
        while next < self.blocks.len() {
            if self.blocks[next].capacity() >= size {
                debug_assert_eq!(self.blocks[next].used, 0);
                self.current = next;
                return Ok(());
            }
            self.blocks.remove(next);
        }

        log::debug!(
            "arena: appending block of {size} bytes (chain length {})",
            self.blocks.len() + 1
        );
        self.blocks.push(Block::with_capacity(size)?);
        self.current = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fill(arena: &mut Arena, span: Span, byte: u8) {
        arena.get_mut(span).fill(byte);
    }

    #[test]
    fn zero_size_is_sentinel() {
        let mut arena = Arena::new();
        assert_eq!(arena.alloc(0).unwrap(), Span::EMPTY);
        assert_eq!(arena.realloc(0).unwrap(), Span::EMPTY);
        assert!(arena.get(Span::EMPTY).is_empty());
        assert_eq!(arena.committed(), 0);
    }

    #[test]
    fn uncommitted_alloc_is_reused() {
        let mut arena = Arena::new();
        let a = arena.alloc(16).unwrap();
        let b = arena.alloc(16).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn commit_protects_bytes() {
        let mut arena = Arena::new();
        let key = arena.alloc(8).unwrap();
        fill(&mut arena, key, b'k');
        arena.commit(3);
        let key = key.truncate(3);

        let next = arena.alloc(32).unwrap();
        fill(&mut arena, next, b'x');
        assert_eq!(arena.get(key), b"kkk");
        assert_eq!(arena.committed(), 3);

        arena.free(3);
        assert_eq!(arena.committed(), 0);
    }

    #[test]
    fn free_then_alloc_aliases_freed_region() {
        let mut arena = Arena::new();
        let outer = arena.alloc(10).unwrap();
        arena.commit(10);
        let inner = arena.alloc(7).unwrap();
        arena.commit(7);
        arena.free(7);
        assert_eq!(arena.alloc(7).unwrap(), inner);
        arena.free(10);
        assert_eq!(arena.alloc(10).unwrap(), outer);
    }

    #[test]
    fn realloc_preserves_contents_across_blocks() {
        let mut arena = Arena::with_block_size(16);
        arena.alloc(10).unwrap();
        arena.commit(10);

        let span = arena.alloc(4).unwrap();
        arena.get_mut(span).copy_from_slice(b"abcd");
        let grown = arena.realloc(12).unwrap();
        assert_eq!(arena.block_count(), 2);
        assert_eq!(&arena.get(grown)[..4], b"abcd");
    }

    #[test]
    fn realloc_grows_empty_block_in_place() {
        let mut arena = Arena::with_block_size(8);
        let span = arena.alloc(8).unwrap();
        arena.get_mut(span).copy_from_slice(b"01234567");
        let grown = arena.realloc(16).unwrap();
        assert_eq!(arena.block_count(), 1);
        assert_eq!(&arena.get(grown)[..8], b"01234567");
    }

    #[test]
    fn oversized_alloc_grows_fresh_block() {
        let mut arena = Arena::with_block_size(8);
        let span = arena.alloc(100).unwrap();
        assert_eq!(span.len(), 100);
        assert_eq!(arena.block_count(), 1);
    }

    #[test]
    fn free_steps_back_across_blocks() {
        let mut arena = Arena::with_block_size(16);
        let a = arena.alloc(12).unwrap();
        fill(&mut arena, a, b'a');
        arena.commit(12);

        // Doesn't fit behind `a`: lands in a second block.
        let b = arena.alloc(12).unwrap();
        fill(&mut arena, b, b'b');
        arena.commit(12);
        assert_eq!(arena.block_count(), 2);

        arena.free(12);
        assert_eq!(arena.get(a.truncate(12)), [b'a'; 12]);
        arena.free(12);
        assert_eq!(arena.committed(), 0);

        // The spare block is reused rather than reallocated.
        arena.alloc(12).unwrap();
        arena.commit(12);
        arena.alloc(12).unwrap();
        assert_eq!(arena.block_count(), 2);
    }

    #[test]
    fn too_small_spare_blocks_are_dropped() {
        let mut arena = Arena::with_block_size(4);
        arena.alloc(4).unwrap();
        arena.commit(4);
        arena.alloc(4).unwrap();
        arena.commit(4);
        arena.free(4);
        arena.free(4);
        assert_eq!(arena.block_count(), 2);

        arena.alloc(2).unwrap();
        arena.commit(2);
        // Needs more than the spare 4-byte block offers.
        arena.alloc(64).unwrap();
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.blocks[1].capacity(), 64);
    }

    #[test]
    fn nested_commits_mirror_recursion() {
        let mut arena = Arena::with_block_size(32);
        let mut keys = Vec::new();
        for depth in 0..20u8 {
            let span = arena.alloc(64).unwrap();
            fill(&mut arena, span, depth);
            arena.commit(5);
            keys.push((span.truncate(5), depth));
        }
        while let Some((span, depth)) = keys.pop() {
            assert_eq!(arena.get(span), [depth; 5]);
            arena.free(5);
        }
        assert_eq!(arena.committed(), 0);
    }

    // -----------------------------------------------------------------------
    // Random recursion-shaped sequences
    // -----------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Step {
        /// Allocate `initial` bytes, grow to `grown`, commit and recurse.
        Enter { initial: usize, grown: usize },
        /// Return from the innermost level, freeing its buffer.
        Leave,
    }

    fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
        let step = prop_oneof![
            3 => (1usize..40, 0usize..80).prop_map(|(initial, extra)| Step::Enter {
                initial,
                grown: initial + extra,
            }),
            2 => Just(Step::Leave),
        ];
        prop::collection::vec(step, 0..200)
    }

    fn config() -> ProptestConfig {
        ProptestConfig {
            cases: 256,
            failure_persistence: None,
            ..ProptestConfig::default()
        }
    }

    proptest! {
        #![proptest_config(config())]

        #[test]
        fn lifo_sequences_keep_live_buffers_intact(steps in arb_steps()) {
            let mut arena = Arena::with_block_size(64);
            let mut live: Vec<(Span, u8)> = Vec::new();

            for (i, step) in steps.iter().enumerate() {
                match *step {
                    Step::Enter { initial, grown } => {
                        let tag = (i % 251) as u8 + 1;
                        let mut span = arena.alloc(initial).unwrap();
                        fill(&mut arena, span, tag);
                        if grown > initial {
                            span = arena.realloc(grown).unwrap();
                            prop_assert!(arena.get(span)[..initial].iter().all(|&b| b == tag));
                            fill(&mut arena, span, tag);
                        }
                        arena.commit(span.len());
                        live.push((span, tag));
                    }
                    Step::Leave => {
                        if let Some((span, _)) = live.pop() {
                            arena.free(span.len());
                            // The freed region is the next one handed out.
                            prop_assert_eq!(arena.alloc(span.len()).unwrap(), span);
                        }
                    }
                }

                for &(span, tag) in &live {
                    prop_assert!(arena.get(span).iter().all(|&b| b == tag));
                }
                let total: usize = live.iter().map(|(span, _)| span.len()).sum();
                prop_assert_eq!(arena.committed(), total);
            }

            while let Some((span, _)) = live.pop() {
                arena.free(span.len());
            }
            prop_assert_eq!(arena.committed(), 0);
        }
    }
}
