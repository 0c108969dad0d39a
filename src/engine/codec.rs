//! # Typed Numeric Codecs
//!
//! Array readers and writers for the FITS data types, layered on the byte
//! transfer engine. FITS data is big-endian; reads convert to native
//! order in place on the destination, writes encode into a big-endian
//! scratch buffer so the caller's slice is never mutated.
//!
//! Contiguous transfers (`stride == width`) pick the cached or direct
//! path by size, exactly like the raw byte calls. The direct path sets
//! the cursor straight to `byteloc` instead of seeking (seeking would
//! drag a record into the cache only to bypass it) and restores the
//! cursor afterwards. Strided transfers always run through the grouped
//! cached path with group size `width` and gap `stride - width`.
//!
//! Only IEEE hosts are supported: float conversion is byte order alone.

use zerocopy::IntoBytes;

use crate::config::MIN_DIRECT;
use crate::endian;
use crate::engine::{EofMode, FileId, IoEngine};
use crate::error::Result;

impl IoEngine {
    /// Shared transfer body for all readers. `bytes` is the destination
    /// viewed as raw bytes; conversion to native order happens in the
    /// typed wrappers afterwards.
    fn get_numeric(
        &mut self,
        id: FileId,
        byteloc: u64,
        width: usize,
        stride: usize,
        bytes: &mut [u8],
    ) -> Result<()> {
        debug_assert!(stride >= width, "stride cannot be below the element width");
        if bytes.is_empty() {
            return Ok(());
        }
        if stride == width {
            if bytes.len() < MIN_DIRECT {
                self.seek_to(id, byteloc as i64, EofMode::Report)?;
                self.get_bytes(id, bytes)
            } else {
                let saved = self.file(id).bytepos;
                self.file_mut(id).bytepos = byteloc;
                let result = self.get_bytes(id, bytes);
                self.file_mut(id).bytepos = saved;
                result
            }
        } else {
            self.seek_to(id, byteloc as i64, EofMode::Report)?;
            self.get_bytes_grouped(id, width, bytes.len() / width, stride - width, bytes)
        }
    }

    /// Shared transfer body for all writers. `bytes` must already be
    /// big-endian.
    fn put_numeric(
        &mut self,
        id: FileId,
        byteloc: u64,
        width: usize,
        stride: usize,
        bytes: &[u8],
    ) -> Result<()> {
        debug_assert!(stride >= width, "stride cannot be below the element width");
        if bytes.is_empty() {
            return Ok(());
        }
        if stride == width {
            if bytes.len() < MIN_DIRECT {
                self.seek_to(id, byteloc as i64, EofMode::Ignore)?;
                self.put_bytes(id, bytes)
            } else {
                let saved = self.file(id).bytepos;
                self.file_mut(id).bytepos = byteloc;
                let result = self.put_bytes(id, bytes);
                self.file_mut(id).bytepos = saved;
                result
            }
        } else {
            self.seek_to(id, byteloc as i64, EofMode::Ignore)?;
            self.put_bytes_grouped(id, width, bytes.len() / width, stride - width, bytes)
        }
    }

    /// Read `out.len()` bytes starting at `byteloc`, one every `stride`
    /// bytes.
    pub fn get_u8s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        out: &mut [u8],
    ) -> Result<()> {
        self.get_numeric(id, byteloc, 1, stride, out)
    }

    /// Write the bytes of `vals` starting at `byteloc`, one every
    /// `stride` bytes.
    pub fn put_u8s(&mut self, id: FileId, byteloc: u64, stride: usize, vals: &[u8]) -> Result<()> {
        self.put_numeric(id, byteloc, 1, stride, vals)
    }

    /// Read big-endian 16-bit integers starting at `byteloc`, one every
    /// `stride` bytes.
    pub fn get_i16s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        out: &mut [i16],
    ) -> Result<()> {
        self.get_numeric(id, byteloc, 2, stride, out.as_mut_bytes())?;
        endian::be_to_native_16(out.as_mut_bytes());
        Ok(())
    }

    /// Write `vals` as big-endian 16-bit integers starting at `byteloc`,
    /// one every `stride` bytes.
    pub fn put_i16s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        vals: &[i16],
    ) -> Result<()> {
        let mut buf = vals.as_bytes().to_vec();
        endian::native_to_be_16(&mut buf);
        self.put_numeric(id, byteloc, 2, stride, &buf)
    }

    /// Read big-endian 32-bit integers starting at `byteloc`, one every
    /// `stride` bytes.
    pub fn get_i32s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        out: &mut [i32],
    ) -> Result<()> {
        self.get_numeric(id, byteloc, 4, stride, out.as_mut_bytes())?;
        endian::be_to_native_32(out.as_mut_bytes());
        Ok(())
    }

    /// Write `vals` as big-endian 32-bit integers starting at `byteloc`,
    /// one every `stride` bytes.
    pub fn put_i32s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        vals: &[i32],
    ) -> Result<()> {
        let mut buf = vals.as_bytes().to_vec();
        endian::native_to_be_32(&mut buf);
        self.put_numeric(id, byteloc, 4, stride, &buf)
    }

    /// Read big-endian 64-bit integers starting at `byteloc`, one every
    /// `stride` bytes.
    pub fn get_i64s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        out: &mut [i64],
    ) -> Result<()> {
        self.get_numeric(id, byteloc, 8, stride, out.as_mut_bytes())?;
        endian::be_to_native_64(out.as_mut_bytes());
        Ok(())
    }

    /// Write `vals` as big-endian 64-bit integers starting at `byteloc`,
    /// one every `stride` bytes.
    pub fn put_i64s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        vals: &[i64],
    ) -> Result<()> {
        let mut buf = vals.as_bytes().to_vec();
        endian::native_to_be_64(&mut buf);
        self.put_numeric(id, byteloc, 8, stride, &buf)
    }

    /// Read big-endian IEEE 32-bit floats starting at `byteloc`, one
    /// every `stride` bytes.
    pub fn get_f32s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        out: &mut [f32],
    ) -> Result<()> {
        self.get_numeric(id, byteloc, 4, stride, out.as_mut_bytes())?;
        endian::be_to_native_32(out.as_mut_bytes());
        Ok(())
    }

    /// Write `vals` as big-endian IEEE 32-bit floats starting at
    /// `byteloc`, one every `stride` bytes.
    pub fn put_f32s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        vals: &[f32],
    ) -> Result<()> {
        let mut buf = vals.as_bytes().to_vec();
        endian::native_to_be_32(&mut buf);
        self.put_numeric(id, byteloc, 4, stride, &buf)
    }

    /// Read big-endian IEEE 64-bit floats starting at `byteloc`, one
    /// every `stride` bytes.
    pub fn get_f64s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        out: &mut [f64],
    ) -> Result<()> {
        self.get_numeric(id, byteloc, 8, stride, out.as_mut_bytes())?;
        endian::be_to_native_64(out.as_mut_bytes());
        Ok(())
    }

    /// Write `vals` as big-endian IEEE 64-bit floats starting at
    /// `byteloc`, one every `stride` bytes.
    pub fn put_f64s(
        &mut self,
        id: FileId,
        byteloc: u64,
        stride: usize,
        vals: &[f64],
    ) -> Result<()> {
        let mut buf = vals.as_bytes().to_vec();
        endian::native_to_be_64(&mut buf);
        self.put_numeric(id, byteloc, 8, stride, &buf)
    }
}
