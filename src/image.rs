//! Initialization logs stored in serial flash.
//!
//! Flash is divided into 1 MiB segments, one log per segment. The last
//! eight bytes of a used segment are its index: the stored length followed
//! by [`IMAGE_MAGIC`]. Images written by early tooling store three log bytes
//! per flash word in the upper bytes; their index words are shifted left by
//! eight, which is how the encoding is detected.

use heapless::Vec;

use crate::{
    NdpError,
    device::Ndp,
    fmt::{debug, warning},
    loader::LoadStatus,
    transfer::Transfer,
};

pub const FLASH_SEGMENT_SIZE: u32 = 0x10_0000;
pub const IMAGE_MAGIC: u32 = 0xa5b6_c7d8;
/// Offset of the index inside a segment.
pub const INDEX_OFFSET: u32 = FLASH_SEGMENT_SIZE - 8;

/// Byte layout of the stored words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Encoding {
    /// Four log bytes per word, little endian.
    Plain,
    /// Three log bytes per word in bits 8..32.
    Packed,
}

impl Encoding {
    /// Log bytes carried by one stored word.
    pub const fn bytes_per_word(self) -> usize {
        match self {
            Encoding::Plain => 4,
            Encoding::Packed => 3,
        }
    }

    /// Log bytes carried by `word`, borrowed from `out`.
    fn unpack(self, word: u32, out: &mut [u8; 4]) -> &[u8] {
        *out = word.to_le_bytes();
        match self {
            Encoding::Plain => &out[..],
            Encoding::Packed => &out[1..],
        }
    }
}

/// Decoded segment index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImageIndex {
    /// Stored bytes, always whole words.
    pub stored_len: u32,
    pub encoding: Encoding,
}

impl ImageIndex {
    /// Flash address of segment `record`.
    pub const fn segment_base(record: u8) -> u32 {
        (record as u32) << 20
    }

    /// Flash address of the index of segment `record`.
    pub const fn index_addr(record: u8) -> u32 {
        Self::segment_base(record) + INDEX_OFFSET
    }

    /// Decodes the index words, `None` if the segment holds no image.
    pub fn decode(length_word: u32, magic_word: u32) -> Option<Self> {
        let index = if magic_word == IMAGE_MAGIC {
            ImageIndex {
                stored_len: length_word,
                encoding: Encoding::Plain,
            }
        } else if magic_word == IMAGE_MAGIC << 8 {
            ImageIndex {
                stored_len: length_word >> 8,
                encoding: Encoding::Packed,
            }
        } else {
            return None;
        };
        debug!("flash image {:?}, {} bytes stored", index.encoding, index.stored_len);
        Some(index)
    }

    /// Decodes the raw eight index bytes as read from flash.
    pub fn from_bytes(raw: [u8; 8]) -> Option<Self> {
        let [l0, l1, l2, l3, m0, m1, m2, m3] = raw;
        Self::decode(
            u32::from_le_bytes([l0, l1, l2, l3]),
            u32::from_le_bytes([m0, m1, m2, m3]),
        )
    }

    /// Number of stored words to read from the start of the segment.
    pub fn words(&self) -> u32 {
        self.stored_len.div_ceil(4)
    }

    /// Length of the log once unpacked.
    pub fn log_len(&self) -> u32 {
        self.words() * self.encoding.bytes_per_word() as u32
    }
}

/// Unpacks stored flash words into loader chunks of `N` bytes.
///
/// `N` must be a non-zero multiple of 12 so that whole words of either
/// encoding fill a chunk exactly.
///
/// ```
/// use ndp10x_micro::prelude::*;
///
/// # fn run<T: Transfer>(ndp: &mut Ndp<T>, flash: &[u32]) -> Result<(), NdpError> {
/// let index = ImageIndex::decode(flash[0], flash[1]).ok_or(NdpError::Package)?;
/// let mut image = ImageLoader::<1032>::begin(ndp, index.encoding)?;
/// for w in &flash[2..2 + index.words() as usize] {
///     image.push_word(ndp, *w)?;
/// }
/// assert_eq!(image.finish(ndp)?, LoadStatus::Done);
/// # Ok(())
/// # }
/// ```
pub struct ImageLoader<const N: usize = 1032> {
    encoding: Encoding,
    buf: Vec<u8, N>,
    status: LoadStatus,
}

impl<const N: usize> ImageLoader<N> {
    const CHUNK_OK: () = assert!(N != 0 && N % 12 == 0, "chunk size must be a multiple of 12");

    /// Opens the device loader and starts a new image.
    pub fn begin<T: Transfer>(ndp: &mut Ndp<T>, encoding: Encoding) -> Result<Self, NdpError> {
        let () = Self::CHUNK_OK;
        ndp.load_log(&[])?;
        Ok(ImageLoader {
            encoding,
            buf: Vec::new(),
            status: LoadStatus::More,
        })
    }

    /// Adds one stored word, feeding the loader whenever a chunk fills up.
    pub fn push_word<T: Transfer>(
        &mut self,
        ndp: &mut Ndp<T>,
        word: u32,
    ) -> Result<LoadStatus, NdpError> {
        let mut raw = [0u8; 4];
        let bytes = self.encoding.unpack(word, &mut raw);
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| NdpError::Arg)?;
        if self.buf.len() == N {
            self.flush(ndp)?;
        }
        Ok(self.status)
    }

    /// Adds stored bytes as read from flash. Only whole words are taken,
    /// a trailing partial word is an argument error.
    pub fn push_bytes<T: Transfer>(
        &mut self,
        ndp: &mut Ndp<T>,
        stored: &[u8],
    ) -> Result<LoadStatus, NdpError> {
        let words = stored.chunks_exact(4);
        if !words.remainder().is_empty() {
            return Err(NdpError::Arg);
        }
        for w in words {
            self.push_word(ndp, u32::from_le_bytes([w[0], w[1], w[2], w[3]]))?;
        }
        Ok(self.status)
    }

    /// Pads the last partial chunk with `0xff` and feeds it.
    pub fn finish<T: Transfer>(mut self, ndp: &mut Ndp<T>) -> Result<LoadStatus, NdpError> {
        if !self.buf.is_empty() {
            while self.buf.push(0xff).is_ok() {}
            self.flush(ndp)?;
        }
        if self.status != LoadStatus::Done {
            warning!("flash image ended before its checksum");
        }
        Ok(self.status)
    }

    fn flush<T: Transfer>(&mut self, ndp: &mut Ndp<T>) -> Result<(), NdpError> {
        self.status = ndp.load_log(&self.buf)?;
        self.buf.clear();
        Ok(())
    }
}
