//! The sliding token window that feeds the forward pass.

use thiserror::Error;

use crate::TokenId;

/// Errors from constructing a [TokenWindow].
#[derive(Debug, Error)]
pub enum TokenWindowError {
    /// The working sequence length cannot hold the sentinel plus a token.
    #[error("sequence length {len} is too short for a sliding window")]
    SequenceTooShort {
        /// The rejected length.
        len: usize,
    },
    /// The oversize ratio was outside the supported range.
    #[error("oversize ratio {ratio} is outside [1.0, 3.0]")]
    InvalidOversizeRatio {
        /// The rejected ratio.
        ratio: f32,
    },
}

/// A fixed-capacity token buffer that presents a sliding window of at
/// most `max_seq_len` positions to the forward pass.
///
/// The first position of every window holds the end-of-text sentinel.
/// The buffer is overallocated by the oversize ratio so that sliding the
/// window is a pointer bump; only when the backing buffer is exhausted
/// are the most recent `max_seq_len - 1` ids compacted to the front.
#[derive(Debug)]
pub struct TokenWindow {
    buf: Vec<TokenId>,
    max_seq_len: usize,
    eot_pos: usize,
    last_pos: usize,
    eot_token: TokenId,
}

impl TokenWindow {
    /// Creates a window of `max_seq_len` positions over a buffer of
    /// `⌊max_seq_len · oversize_ratio⌋ + 1` slots, seeded with the
    /// sentinel.
    pub fn new(
        max_seq_len: usize,
        oversize_ratio: f32,
        eot_token: TokenId,
    ) -> Result<Self, TokenWindowError> {
        if max_seq_len < 2 {
            return Err(TokenWindowError::SequenceTooShort { len: max_seq_len });
        }
        if !(1.0..=3.0).contains(&oversize_ratio) {
            return Err(TokenWindowError::InvalidOversizeRatio {
                ratio: oversize_ratio,
            });
        }

        let buffer_count = (max_seq_len as f32 * oversize_ratio) as usize + 1;
        let mut buf = vec![0; buffer_count];
        buf[0] = eot_token;
        Ok(Self {
            buf,
            max_seq_len,
            eot_pos: 0,
            last_pos: 0,
            eot_token,
        })
    }

    /// Advances to the next slot and returns the current window.
    ///
    /// The returned slice starts at the sentinel and contains every
    /// already-generated id in the window; its length is the effective
    /// sequence length for the next forward pass. The slot that the
    /// subsequent [update](Self::update) will fill is not part of it.
    pub fn step(&mut self) -> &[TokenId] {
        self.last_pos += 1;

        if self.last_pos >= self.buf.len() {
            let src = self.eot_pos + 1;
            self.buf.copy_within(src..src + self.max_seq_len - 1, 0);
            self.eot_pos = 0;
            self.last_pos = self.max_seq_len - 1;
        }

        if self.last_pos - self.eot_pos >= self.max_seq_len {
            self.eot_pos = self.last_pos - self.max_seq_len + 1;
        }

        self.buf[self.eot_pos] = self.eot_token;
        &self.buf[self.eot_pos..self.last_pos]
    }

    /// Stores the sampled id at the current slot.
    pub fn update(&mut self, id: TokenId) {
        self.buf[self.last_pos] = id;
    }

    /// The working sequence length.
    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    /// Total number of slots in the backing buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EOT: TokenId = 50256;

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(
            TokenWindow::new(1, 2.0, EOT),
            Err(TokenWindowError::SequenceTooShort { len: 1 })
        ));
        assert!(matches!(
            TokenWindow::new(8, 0.5, EOT),
            Err(TokenWindowError::InvalidOversizeRatio { .. })
        ));
        assert!(matches!(
            TokenWindow::new(8, 3.5, EOT),
            Err(TokenWindowError::InvalidOversizeRatio { .. })
        ));
    }

    #[test]
    fn capacity_follows_the_ratio() {
        let window = TokenWindow::new(4, 2.0, EOT).unwrap();
        assert_eq!(window.capacity(), 9);
        let window = TokenWindow::new(4, 1.0, EOT).unwrap();
        assert_eq!(window.capacity(), 5);
    }

    #[test]
    fn first_window_is_just_the_sentinel() {
        let mut window = TokenWindow::new(4, 2.0, EOT).unwrap();
        assert_eq!(window.step(), &[EOT]);
        window.update(7);
        assert_eq!(window.step(), &[EOT, 7]);
    }

    #[test]
    fn window_slides_once_full() {
        let mut window = TokenWindow::new(4, 2.0, EOT).unwrap();
        for id in 10..13 {
            window.step();
            window.update(id);
        }
        // Window is full; the sentinel reseats over the oldest id.
        assert_eq!(window.step(), &[EOT, 11, 12]);
        window.update(13);
        assert_eq!(window.step(), &[EOT, 12, 13]);
    }

    #[test]
    fn compaction_preserves_the_most_recent_ids() {
        // Capacity 9: the ninth step exhausts the buffer and compacts.
        let mut window = TokenWindow::new(4, 2.0, EOT).unwrap();
        let ids = [100, 101, 102, 103, 104, 105, 106, 107];
        for &id in &ids {
            window.step();
            window.update(id);
        }
        let view = window.step();
        assert_eq!(view, &[EOT, 106, 107]);
        assert_eq!(window.eot_pos, 0);
        assert_eq!(window.last_pos, 3);
        window.update(108);
        assert_eq!(&window.buf[..4], &[EOT, 106, 107, 108]);
    }

    #[test]
    fn sentinel_and_window_invariants_hold() {
        let mut window = TokenWindow::new(5, 1.3, EOT).unwrap();
        for id in 0..200 {
            let view = window.step().to_vec();
            assert_eq!(view[0], EOT);
            assert_eq!(window.buf[window.eot_pos], EOT);
            assert!(window.last_pos - window.eot_pos + 1 <= window.max_seq_len);
            assert!(!view.is_empty() && view.len() < window.max_seq_len);
            window.update(id);
        }
    }
}
