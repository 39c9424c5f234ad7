//! Host-side byte-stream contract for `copy_from_host`.
//!
//! Spec §6: "the source is an opaque byte-stream identifier; semantics are
//! open for reading, get its total length, read that many bytes, close."
//! `HostSource` captures exactly that contract as a trait, so tests can
//! supply an in-memory source instead of a real file, and `HostFile` gives
//! the natural implementation backed by the host filesystem.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// A host byte-stream: "open for reading, get its length, read that many
/// bytes, close" (spec §6).
pub trait HostSource {
    /// Total length of the stream, in bytes.
    fn len(&mut self) -> io::Result<u64>;

    /// Read the stream's full contents into `buf`, returning the number of
    /// bytes actually read.
    fn read_all(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// A `HostSource` backed by a file on the host filesystem.
pub struct HostFile(File);

impl HostFile {
    /// Open `path` for reading as a host source.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<HostFile> {
        Ok(HostFile(File::open(path)?))
    }
}

impl HostSource for HostFile {
    fn len(&mut self) -> io::Result<u64> {
        let end = self.0.seek(SeekFrom::End(0))?;
        self.0.seek(SeekFrom::Start(0))?;
        Ok(end)
    }

    fn read_all(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.0.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }
}

impl<T: AsRef<[u8]>> HostSource for io::Cursor<T> {
    fn len(&mut self) -> io::Result<u64> {
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(0))?;
        Ok(end)
    }

    fn read_all(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = Read::read(self, &mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }
}
