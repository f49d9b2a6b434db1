use crate::vlq::{decode_slice, VlqError, CONTINUE};
use log::trace;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::fs::File;
use std::io::{BufReader, Bytes, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// A byte-at-a-time reader over any `Read` with one byte of lookahead, a
/// current position, and an optional position limit for length-prefixed
/// chunks. SMF chunk fields are big-endian, RIFF chunk fields are little
/// endian; both reads are provided.
pub(crate) struct ByteIter<R: Read> {
    iter: Bytes<R>,
    position: Option<u64>,
    current: Option<u8>,
    peek: Option<u8>,
    position_limit: Option<u64>,
}

#[derive(Debug, Snafu)]
pub enum ByteError {
    #[snafu(display("io error around byte {}: {}", position, source))]
    Io {
        position: u64,
        source: std::io::Error,
    },

    #[snafu(display("unexpected end reached around byte {}", position))]
    End { position: u64 },

    #[snafu(display(
        "expected tag '{}' but found '{}' near position {}",
        expected,
        found,
        position
    ))]
    Tag {
        expected: String,
        found: String,
        position: u64,
    },

    #[snafu(display("too many bytes while reading vlq around {}", position))]
    VlqTooBig { position: u64 },

    #[snafu(display("problem decoding vlq around {}: {}", position, source))]
    VlqDecode { position: u64, source: VlqError },

    #[snafu(display("unable to open '{}': {}", path.display(), source,))]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub(crate) type ByteResult<T> = std::result::Result<T, ByteError>;

const BUF_CAPACITY: usize = 64 * 1024;

impl ByteIter<BufReader<File>> {
    pub(crate) fn new_file<P: AsRef<Path>>(path: P) -> ByteResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).context(FileOpenSnafu { path })?;
        let buf = BufReader::with_capacity(BUF_CAPACITY, f);
        Self::new(buf.bytes())
    }
}

impl<R: Read> ByteIter<R> {
    pub(crate) fn new(mut iter: Bytes<R>) -> ByteResult<Self> {
        let peek = Self::next_impl(&mut iter, 0)?;
        Ok(Self {
            iter,
            position: None,
            current: None,
            peek,
            position_limit: None,
        })
    }

    fn next_impl(iter: &mut Bytes<R>, position: u64) -> ByteResult<Option<u8>> {
        match iter.next() {
            None => Ok(None),
            Some(result) => match result {
                Ok(val) => Ok(Some(val)),
                Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
                Err(e) => Err(e).context(IoSnafu { position }),
            },
        }
    }

    /// Read a single byte and advance. Returns `None` at the end of the
    /// stream or at the position limit.
    pub(crate) fn read(&mut self) -> ByteResult<Option<u8>> {
        if let (Some(limit), Some(position)) = (self.position_limit, self.position) {
            if position >= limit {
                return Ok(None);
            }
        }
        if self.peek.is_some() {
            self.position = Some(self.position.map_or(0, |p| p + 1));
        }
        self.current = self.peek;
        self.peek = Self::next_impl(&mut self.iter, self.position.unwrap_or(0))?;
        if let Some(val) = self.current {
            trace!("read {:#x} at position {}", val, self.position.unwrap_or(0));
        }
        Ok(self.current)
    }

    pub(crate) fn read_or_die(&mut self) -> ByteResult<u8> {
        let position = self.position.unwrap_or(0);
        self.read()?.context(EndSnafu { position })
    }

    pub(crate) fn read2(&mut self) -> ByteResult<[u8; 2]> {
        Ok([self.read_or_die()?, self.read_or_die()?])
    }

    pub(crate) fn read4(&mut self) -> ByteResult<[u8; 4]> {
        Ok([
            self.read_or_die()?,
            self.read_or_die()?,
            self.read_or_die()?,
            self.read_or_die()?,
        ])
    }

    pub(crate) fn read_u16(&mut self) -> ByteResult<u16> {
        Ok(u16::from_be_bytes(self.read2()?))
    }

    pub(crate) fn read_u32(&mut self) -> ByteResult<u32> {
        Ok(u32::from_be_bytes(self.read4()?))
    }

    pub(crate) fn read_u16_le(&mut self) -> ByteResult<u16> {
        Ok(u16::from_le_bytes(self.read2()?))
    }

    pub(crate) fn read_u32_le(&mut self) -> ByteResult<u32> {
        Ok(u32::from_le_bytes(self.read4()?))
    }

    pub(crate) fn read_vlq_bytes(&mut self) -> ByteResult<Vec<u8>> {
        let mut retval = Vec::new();
        // initialize with the continue bit set
        let mut current_byte = CONTINUE;
        let mut byte_count = 0u8;
        while current_byte & CONTINUE == CONTINUE {
            ensure!(
                byte_count <= 4,
                VlqTooBigSnafu {
                    position: self.position.unwrap_or(0)
                }
            );
            current_byte = self.read_or_die()?;
            retval.push(current_byte);
            byte_count += 1;
        }
        Ok(retval)
    }

    pub(crate) fn read_vlq_u32(&mut self) -> ByteResult<u32> {
        let bytes = self.read_vlq_bytes()?;
        let decoded = decode_slice(&bytes).context(VlqDecodeSnafu {
            position: self.position.unwrap_or(0),
        })?;
        trace!("decoded vlq value {} from {} bytes", decoded, bytes.len());
        Ok(decoded)
    }

    /// Get the next value without advancing.
    pub(crate) fn peek(&self) -> Option<u8> {
        self.peek
    }

    pub(crate) fn is_end(&self) -> bool {
        if let Some(limit) = self.position_limit {
            debug_assert!(self.position.unwrap_or(0) <= limit);
            if self.position.unwrap_or(0) >= limit {
                return true;
            }
        }
        self.peek.is_none()
    }

    pub(crate) fn expect_tag(&mut self, expected_tag: &str) -> ByteResult<()> {
        let tag_bytes = self.read4()?;
        ensure!(
            expected_tag.as_bytes() == tag_bytes,
            TagSnafu {
                expected: expected_tag,
                found: String::from_utf8_lossy(&tag_bytes).to_string(),
                position: self.position.unwrap_or(0)
            }
        );
        Ok(())
    }

    /// When this is set, the iter reports that it is at the end after `size`
    /// more bytes have been read.
    pub(crate) fn set_size_limit(&mut self, size: u64) {
        self.position_limit = Some(self.position.unwrap_or(0) + size)
    }

    pub(crate) fn clear_size_limit(&mut self) {
        self.position_limit = None
    }

    pub(crate) fn read_n(&mut self, num_bytes: usize) -> ByteResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(num_bytes);
        for _ in 0..num_bytes {
            bytes.push(self.read_or_die()?)
        }
        Ok(bytes)
    }

    /// Fill as much of `buf` as the stream (and any position limit) allows.
    /// Returns the number of bytes placed.
    pub(crate) fn read_into(&mut self, buf: &mut [u8]) -> ByteResult<usize> {
        let mut count = 0;
        while count < buf.len() {
            match self.read()? {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    /// Discard `num_bytes` bytes, erroring if the stream ends first.
    pub(crate) fn skip(&mut self, num_bytes: u64) -> ByteResult<()> {
        for _ in 0..num_bytes {
            self.read_or_die()?;
        }
        Ok(())
    }
}
