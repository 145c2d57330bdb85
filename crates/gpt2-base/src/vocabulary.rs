//! The decoder vocabulary: a fixed-record table mapping token ids to
//! their raw byte strings.
//!
//! The engine only ever decodes ids it has produced; there is no
//! encoder. A missing vocabulary file is not fatal to generation, the
//! driver simply falls back to printing decimal ids.

use std::io::Read;
use std::path::Path;

use crate::loader::{open_file, LoadError};
use crate::{util, TokenId};

/// File magic of the decoder vocabulary format.
pub const VOCABULARY_MAGIC: u32 = 20240328;
/// Supported vocabulary format version.
pub const VOCABULARY_VERSION: u32 = 1;

/// Slot stride of the dense decode table: the longest word (128 bytes)
/// plus its length byte.
const MAX_WORD_SIZE: usize = 129;

/// A dense, fixed-stride decode table: `vocab_count` slots of
/// [MAX_WORD_SIZE] bytes, each holding a length byte followed by the
/// word bytes.
pub struct Vocabulary {
    table: Vec<u8>,
    vocab_count: usize,
}

impl Vocabulary {
    /// Reads a vocabulary file: a 1024-byte header followed by
    /// `vocab_count` length-prefixed records.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let mut reader = open_file(path)?;

        let header = util::read_header(&mut reader)?;
        let magic = header[0] as u32;
        if magic != VOCABULARY_MAGIC {
            return Err(LoadError::InvalidMagic {
                path: path.to_owned(),
                magic,
            });
        }
        let version = header[1] as u32;
        if version != VOCABULARY_VERSION {
            return Err(LoadError::InvalidFormatVersion { version });
        }
        let vocab_count = usize::try_from(header[2])?;
        if vocab_count == 0 {
            return Err(LoadError::InvariantBroken {
                invariant: "the vocabulary must not be empty".to_string(),
            });
        }

        let mut table = vec![0u8; vocab_count * MAX_WORD_SIZE];
        for (index, slot) in table.chunks_exact_mut(MAX_WORD_SIZE).enumerate() {
            let mut size = [0u8; 1];
            reader
                .read_exact(&mut size)
                .map_err(|_| LoadError::TruncatedVocabulary { index })?;
            let size = size[0] as usize;
            if size > MAX_WORD_SIZE - 1 {
                return Err(LoadError::WordSizeTooLarge {
                    index,
                    size,
                    max: MAX_WORD_SIZE - 1,
                });
            }
            slot[0] = size as u8;
            reader
                .read_exact(&mut slot[1..1 + size])
                .map_err(|_| LoadError::TruncatedToken { index })?;
        }

        Ok(Self { table, vocab_count })
    }

    /// Number of token ids in the table.
    pub fn len(&self) -> usize {
        self.vocab_count
    }

    /// Whether the table is empty. A loaded vocabulary never is.
    pub fn is_empty(&self) -> bool {
        self.vocab_count == 0
    }

    /// The byte string of a token id, or `None` when the id is out of
    /// range.
    pub fn decode(&self, id: TokenId) -> Option<&[u8]> {
        let start = (id as usize).checked_mul(MAX_WORD_SIZE)?;
        let slot = self.table.get(start..start + MAX_WORD_SIZE)?;
        Some(&slot[1..1 + slot[0] as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_vocabulary(words: &[&[u8]], magic: u32, version: u32) -> Vec<u8> {
        let mut data = vec![];
        let mut header = [0i32; 256];
        header[0] = magic as i32;
        header[1] = version as i32;
        header[2] = words.len() as i32;
        for value in header {
            util::write_i32(&mut data, value).unwrap();
        }
        for word in words {
            data.push(word.len() as u8);
            data.write_all(word).unwrap();
        }
        data
    }

    fn load_from_bytes(data: &[u8]) -> Result<Vocabulary, LoadError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.bin");
        std::fs::write(&path, data).unwrap();
        Vocabulary::load(&path)
    }

    #[test]
    fn decodes_fixed_records() {
        let data = write_vocabulary(
            &[b"A", b"BC", b""],
            VOCABULARY_MAGIC,
            VOCABULARY_VERSION,
        );
        let vocabulary = load_from_bytes(&data).unwrap();
        assert_eq!(vocabulary.len(), 3);
        assert_eq!(vocabulary.decode(0), Some(&b"A"[..]));
        assert_eq!(vocabulary.decode(1), Some(&b"BC"[..]));
        assert_eq!(vocabulary.decode(2), Some(&b""[..]));
        assert_eq!(vocabulary.decode(3), None);
    }

    #[test]
    fn rejects_bad_headers() {
        let data = write_vocabulary(&[b"A"], 123, VOCABULARY_VERSION);
        assert!(matches!(
            load_from_bytes(&data),
            Err(LoadError::InvalidMagic { magic: 123, .. })
        ));

        let data = write_vocabulary(&[b"A"], VOCABULARY_MAGIC, 9);
        assert!(matches!(
            load_from_bytes(&data),
            Err(LoadError::InvalidFormatVersion { version: 9 })
        ));

        let data = write_vocabulary(&[], VOCABULARY_MAGIC, VOCABULARY_VERSION);
        assert!(matches!(
            load_from_bytes(&data),
            Err(LoadError::InvariantBroken { .. })
        ));
    }

    #[test]
    fn rejects_truncated_records() {
        let mut data = write_vocabulary(&[b"A", b"BC"], VOCABULARY_MAGIC, VOCABULARY_VERSION);
        // Chop the second record's bytes.
        data.truncate(data.len() - 2);
        assert!(matches!(
            load_from_bytes(&data),
            Err(LoadError::TruncatedToken { index: 1 })
        ));

        // Chop the second record entirely.
        let mut data = write_vocabulary(&[b"A", b"BC"], VOCABULARY_MAGIC, VOCABULARY_VERSION);
        data.truncate(data.len() - 3);
        assert!(matches!(
            load_from_bytes(&data),
            Err(LoadError::TruncatedVocabulary { index: 1 })
        ));
    }

    #[test]
    fn rejects_oversized_words() {
        let mut data = write_vocabulary(&[b"A"], VOCABULARY_MAGIC, VOCABULARY_VERSION);
        // Rewrite the record with a length byte beyond the slot size.
        data.truncate(1024);
        data.push(200);
        data.extend(std::iter::repeat(b'x').take(200));
        assert!(matches!(
            load_from_bytes(&data),
            Err(LoadError::WordSizeTooLarge {
                index: 0,
                size: 200,
                max: 128
            })
        ));
    }

    #[test]
    fn missing_file_is_open_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.bin");
        assert!(matches!(
            Vocabulary::load(&path),
            Err(LoadError::OpenFileFailed { .. })
        ));
    }
}
