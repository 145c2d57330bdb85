//! A contiguous, aligned arena that many logical tensors are carved from.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::loader::LoadError;

/// Alignment of every arena, in bytes. Large enough for aligned vector
/// loads on all supported targets.
pub const ARENA_ALIGN: usize = 64;

/// One contiguous, 64-byte-aligned, zero-initialized block of `f32`s
/// with a table of per-tensor offsets.
///
/// Tensors are addressed by their index in the `sizes` table passed at
/// construction; no per-tensor allocation exists, and the whole block is
/// released at once on drop.
pub struct TensorArena {
    buf: AlignedBuf,
    offsets: Vec<usize>,
}

impl TensorArena {
    /// Allocates an arena holding one tensor per entry of `sizes`, each
    /// sized in `f32` elements.
    pub fn new(sizes: &[usize]) -> Result<Self, LoadError> {
        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        let mut total = 0usize;
        offsets.push(0);
        for size in sizes {
            total += size;
            offsets.push(total);
        }
        Ok(Self {
            buf: AlignedBuf::zeroed(total)?,
            offsets,
        })
    }

    /// Number of tensors in the arena.
    pub fn tensor_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of `f32` elements across all tensors.
    pub fn element_count(&self) -> usize {
        self.buf.len
    }

    /// Total size of the arena in bytes.
    pub fn byte_count(&self) -> usize {
        self.buf.len * std::mem::size_of::<f32>()
    }

    /// Element offset of tensor `index` inside the arena.
    pub fn offset_of(&self, index: usize) -> usize {
        self.offsets[index]
    }

    /// The tensor at `index`.
    pub fn tensor(&self, index: usize) -> &[f32] {
        &self.buf[self.offsets[index]..self.offsets[index + 1]]
    }

    /// The tensor at `index`, mutably.
    pub fn tensor_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.buf[self.offsets[index]..self.offsets[index + 1]]
    }

    /// The whole arena as one slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.buf
    }

    /// The whole arena as one mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.buf
    }

    /// The whole arena as raw bytes, for one contiguous read of
    /// little-endian float data.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.buf[..])
    }
}

/// Owned, 64-byte-aligned float storage.
struct AlignedBuf {
    ptr: NonNull<f32>,
    len: usize,
}

// The buffer is uniquely owned and carries no interior mutability.
unsafe impl Send for AlignedBuf {}
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    fn zeroed(len: usize) -> Result<Self, LoadError> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        let bytes = len * std::mem::size_of::<f32>();
        let layout = Layout::from_size_align(bytes, ARENA_ALIGN)
            .map_err(|_| LoadError::OutOfMemory { bytes })?;
        let ptr = unsafe { alloc_zeroed(layout) };
        match NonNull::new(ptr.cast::<f32>()) {
            Some(ptr) => Ok(Self { ptr, len }),
            None => Err(LoadError::OutOfMemory { bytes }),
        }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        let bytes = self.len * std::mem::size_of::<f32>();
        unsafe {
            let layout = Layout::from_size_align_unchecked(bytes, ARENA_ALIGN);
            dealloc(self.ptr.as_ptr().cast::<u8>(), layout);
        }
    }
}

impl Deref for AlignedBuf {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuf {
    fn deref_mut(&mut self) -> &mut [f32] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_the_size_table() {
        let arena = TensorArena::new(&[3, 0, 5, 1]).unwrap();
        assert_eq!(arena.tensor_count(), 4);
        assert_eq!(arena.element_count(), 9);
        assert_eq!(arena.offset_of(0), 0);
        assert_eq!(arena.offset_of(1), 3);
        assert_eq!(arena.offset_of(2), 3);
        assert_eq!(arena.offset_of(3), 8);
        assert_eq!(arena.tensor(2).len(), 5);
        assert_eq!(arena.tensor(1).len(), 0);
    }

    #[test]
    fn arena_is_aligned_and_zeroed() {
        let mut arena = TensorArena::new(&[17, 9]).unwrap();
        assert_eq!(arena.as_slice().as_ptr() as usize % ARENA_ALIGN, 0);
        assert!(arena.as_slice().iter().all(|&x| x == 0.0));

        arena.tensor_mut(1)[0] = 4.5;
        assert_eq!(arena.as_slice()[17], 4.5);
        assert_eq!(arena.tensor(0)[0], 0.0);
    }

    #[test]
    fn empty_arena_is_fine() {
        let arena = TensorArena::new(&[]).unwrap();
        assert_eq!(arena.element_count(), 0);
        assert_eq!(arena.byte_count(), 0);
    }
}
