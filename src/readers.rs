use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::decompression::{maybe_decompress, Compression};
use crate::error::ImportError;

/// Default size of a raw read before line alignment (500 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 500 * 1024;

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Open a dump for reading; `-` selects stdin.
///
/// Gzip and zstd input is decompressed on the fly.
pub fn open_input(path: &str) -> io::Result<(Box<dyn BufRead + Send>, Compression)> {
    let raw: Box<dyn Read + Send> = if path == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(Path::new(path))?)
    };
    let (decoded, compression) = maybe_decompress(raw)?;
    Ok((
        Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, decoded)),
        compression,
    ))
}

/// Reads a dump as a header line followed by newline-aligned chunks.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: BufRead> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read the header line. Must be called once, before any chunk.
    pub fn read_header(&mut self) -> Result<String, ImportError> {
        let mut raw = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut raw)
            .map_err(|source| ImportError::Read { source })?;
        if n == 0 {
            return Err(ImportError::MissingHeader);
        }

        let text = String::from_utf8_lossy(&raw);
        let header = text
            .trim_start_matches('\u{feff}')
            .trim_end_matches(['\r', '\n'])
            .to_string();
        if header.trim().is_empty() {
            return Err(ImportError::MissingHeader);
        }
        Ok(header)
    }

    /// Read the next chunk: up to `chunk_size` bytes, extended to the end of
    /// the line they stop in. Returns `Ok(None)` at end of input.
    ///
    /// On error the partially read block is dropped.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ImportError> {
        let mut buf = Vec::with_capacity(self.chunk_size.min(DEFAULT_CHUNK_SIZE));
        (&mut self.reader)
            .take(self.chunk_size as u64)
            .read_to_end(&mut buf)
            .map_err(|source| ImportError::Read { source })?;

        if buf.is_empty() {
            return Ok(None);
        }

        if !buf.ends_with(b"\n") {
            self.reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| ImportError::Read { source })?;
        }

        Ok(Some(buf))
    }
}
