use std::io::{Read, Seek, SeekFrom};

use crate::{Error, Result};

/// Random-access reader that remembers which file it reads, so every
/// failure can name it.
pub(crate) struct Source<'a, R> {
    inner: R,
    name: &'a str,
}

impl<'a, R: Read + Seek> Source<'a, R> {
    pub(crate) fn new(inner: R, name: &'a str) -> Self {
        Self { inner, name }
    }

    pub(crate) fn name(&self) -> &'a str {
        self.name
    }

    /// Total length in bytes.
    pub(crate) fn len(&mut self) -> Result<u64> {
        self.inner
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::io(self.name, 0, e))
    }

    /// Read exactly `N` bytes at absolute `offset`.
    pub(crate) fn read_at<const N: usize>(&mut self, offset: u64) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.inner.read_exact(&mut buf))
            .map_err(|e| Error::io(self.name, offset, e))?;
        Ok(buf)
    }

    /// Read exactly `len` bytes at absolute `offset` in a single request.
    pub(crate) fn read_vec(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.inner.read_exact(&mut buf))
            .map_err(|e| Error::io(self.name, offset, e))?;
        Ok(buf)
    }
}
