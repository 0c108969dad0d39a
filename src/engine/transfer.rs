//! # Byte Transfer Engine
//!
//! Positioning and the three transfer shapes: small transfers that copy
//! through the record buffers, large transfers that bypass them, and
//! grouped strided transfers for column access in row-major tables.
//!
//! ## Path Selection
//!
//! Transfers of `MIN_DIRECT` bytes or more go directly to storage. A
//! direct transfer must coordinate with the cache or stale copies would
//! shadow it:
//!
//! - a direct *write* first flushes every overlapping buffer of the file
//!   and then unbinds it, so later cached reads reload the directly
//!   written bytes;
//! - a direct *read* flushes overlapping dirty buffers but keeps them
//!   bound, since their contents remain valid for reuse.
//!
//! The direct write never writes the trailing partial record straight to
//! disk. It stages the tail in the file's current buffer instead (reading
//! the underlying record first when one exists, or filling a fresh one),
//! so bytes the caller is not overwriting survive.
//!
//! ## The Boundary Convention
//!
//! After a cached transfer ends exactly at a record boundary the cursor
//! sits at `(record + 1) * RECORD_LEN` while the current buffer still
//! holds `record`. The next transfer observes zero remaining space and
//! loads the successor record before copying anything.

use smallvec::SmallVec;

use crate::config::{MIN_DIRECT, NBUF, RECORD_LEN};
use crate::engine::{EofMode, FileId, IoEngine};
use crate::error::{Error, Result};

const LEN: u64 = RECORD_LEN as u64;

impl IoEngine {
    /// Move the file's logical cursor to `pos`, loading the record that
    /// contains it if it is not already current.
    ///
    /// With [`EofMode::Ignore`] a position past EOF is legal: the record
    /// is synthesized from fill, as if the file were already extended.
    /// With [`EofMode::Report`] such a position fails with
    /// [`Error::EndOfFile`] and the cursor is unchanged.
    pub fn seek_to(&mut self, id: FileId, pos: i64, eof: EofMode) -> Result<()> {
        if pos < 0 {
            return Err(Error::NegativeFilePos);
        }
        let pos = pos as u64;
        let record = pos / LEN;
        if self.current_record(id) != Some(record) {
            self.load_record(id, record, eof)?;
        }
        self.file_mut(id).bytepos = pos;
        Ok(())
    }

    /// Write `src` at the current cursor, advancing it.
    ///
    /// Writes of `MIN_DIRECT` bytes or more bypass the cache for all
    /// whole records; smaller writes land in the record buffers and reach
    /// disk on flush or eviction.
    pub fn put_bytes(&mut self, id: FileId, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        if src.len() >= MIN_DIRECT {
            return self.put_bytes_direct(id, src);
        }

        let mut idx = self.ensure_covering(id, EofMode::Ignore)?;
        let mut bufpos = (self.file(id).bytepos - self.slots[idx].record * LEN) as usize;
        let mut off = 0usize;
        loop {
            let n = (src.len() - off).min(RECORD_LEN - bufpos);
            self.slots[idx].bytes[bufpos..bufpos + n].copy_from_slice(&src[off..off + n]);
            self.slots[idx].dirty = true;
            self.file_mut(id).bytepos += n as u64;
            off += n;
            if off == src.len() {
                return Ok(());
            }
            let next = self.file(id).bytepos / LEN;
            self.load_record(id, next, EofMode::Ignore)?;
            idx = self.current_slot(id).expect("load_record leaves a current buffer");
            bufpos = 0;
        }
    }

    /// Read into `dst` from the current cursor.
    ///
    /// Small reads copy out of the record buffers, advancing the cursor;
    /// reads of `MIN_DIRECT` bytes or more go directly to storage and
    /// leave the cursor where it was.
    pub fn get_bytes(&mut self, id: FileId, dst: &mut [u8]) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        if dst.len() >= MIN_DIRECT {
            return self.get_bytes_direct(id, dst);
        }

        let mut idx = self.ensure_covering(id, EofMode::Report)?;
        let mut bufpos = (self.file(id).bytepos - self.slots[idx].record * LEN) as usize;
        let mut off = 0usize;
        loop {
            let n = (dst.len() - off).min(RECORD_LEN - bufpos);
            dst[off..off + n].copy_from_slice(&self.slots[idx].bytes[bufpos..bufpos + n]);
            self.file_mut(id).bytepos += n as u64;
            off += n;
            if off == dst.len() {
                return Ok(());
            }
            let next = self.file(id).bytepos / LEN;
            self.load_record(id, next, EofMode::Report)?;
            idx = self.current_slot(id).expect("load_record leaves a current buffer");
            bufpos = 0;
        }
    }

    fn put_bytes_direct(&mut self, id: FileId, src: &[u8]) -> Result<()> {
        let idx = self.ensure_covering(id, EofMode::Ignore)?;
        let mut filepos = self.file(id).bytepos;
        let recstart = self.slots[idx].record;
        let recend = (filepos + src.len() as u64 - 1) / LEN;
        let bufpos = (filepos - recstart * LEN) as usize;
        let nspace = RECORD_LEN - bufpos;

        // Top up the current buffer so the bulk write below starts on a
        // record boundary.
        let mut off = 0usize;
        if nspace > 0 {
            self.slots[idx].bytes[bufpos..].copy_from_slice(&src[..nspace]);
            off += nspace;
            filepos += nspace as u64;
            self.slots[idx].dirty = true;
        }

        // Flush and unbind everything of ours the direct write overlaps,
        // current buffer included; it is rebound to the final record
        // below.
        let affected: SmallVec<[usize; 8]> = (0..NBUF)
            .filter(|&i| {
                let slot = &self.slots[i];
                slot.owner == Some(id) && slot.record >= recstart && slot.record <= recend
            })
            .collect();
        for i in affected {
            if self.slots[i].dirty {
                self.flush_slot(i)?;
            }
            self.slots[i].owner = None;
        }

        let remaining = src.len() - off;
        let nwrite = ((remaining - 1) / RECORD_LEN) * RECORD_LEN;
        {
            let file = self.files[id.0].as_mut().expect("operation on closed file");
            if file.io_pos != filepos {
                file.driver.seek(filepos)?;
            }
            file.driver.write(&src[off..off + nwrite])?;
            file.io_pos = filepos + nwrite as u64;
        }
        off += nwrite;

        // Stage the trailing partial record in the current buffer.
        let ntodo = src.len() - off;
        let fill = self.file(id).fill_byte();
        let file = self.files[id.0].as_mut().expect("operation on closed file");
        let slot = &mut self.slots[idx];
        if file.io_pos >= file.filesize {
            file.filesize = file.io_pos;
            slot.bytes.fill(fill);
        } else {
            file.driver.read(&mut slot.bytes[..])?;
            file.io_pos += LEN;
        }
        slot.bytes[..ntodo].copy_from_slice(&src[off..]);
        slot.dirty = true;
        slot.record = recend;
        slot.owner = Some(id);

        file.logfilesize = file.logfilesize.max((recend + 1) * LEN);
        file.bytepos = filepos + (nwrite + ntodo) as u64;
        Ok(())
    }

    fn get_bytes_direct(&mut self, id: FileId, dst: &mut [u8]) -> Result<()> {
        let filepos = self.file(id).bytepos;
        let recstart = filepos / LEN;
        let recend = (filepos + dst.len() as u64 - 1) / LEN;

        // Dirty overlapping buffers must reach disk first; they stay
        // bound, their contents are still good.
        let affected: SmallVec<[usize; 8]> = (0..NBUF)
            .filter(|&i| {
                let slot = &self.slots[i];
                slot.dirty
                    && slot.owner == Some(id)
                    && slot.record >= recstart
                    && slot.record <= recend
            })
            .collect();
        for i in affected {
            self.flush_slot(i)?;
        }

        let file = self.files[id.0].as_mut().expect("operation on closed file");
        if file.io_pos != filepos {
            file.driver.seek(filepos)?;
        }
        file.driver.read(dst)?;
        file.io_pos = filepos + dst.len() as u64;
        Ok(())
    }

    /// Write `ngroups` groups of `gsize` bytes from `src`, skipping `gap`
    /// bytes of the file between consecutive groups. Skipped bytes keep
    /// their previous contents. Afterwards the cursor sits one stride
    /// past the start of the last group:
    /// `bytepos += ngroups * gsize + (ngroups - 1) * gap`.
    pub fn put_bytes_grouped(
        &mut self,
        id: FileId,
        gsize: usize,
        ngroups: usize,
        gap: usize,
        src: &[u8],
    ) -> Result<()> {
        if ngroups == 0 || gsize == 0 {
            return Ok(());
        }
        debug_assert!(gsize <= RECORD_LEN, "group cannot exceed a record");
        debug_assert!(src.len() >= ngroups * gsize, "source shorter than the groups");

        let mut idx = self.ensure_covering(id, EofMode::Ignore)?;
        let mut record = self.slots[idx].record;
        let start = self.file(id).bytepos;
        let mut bufpos = (start - record * LEN) as i64;
        let mut nspace = RECORD_LEN as i64 - bufpos;
        let mut off = 0usize;

        for _ in 1..ngroups {
            let n = (gsize as i64).min(nspace).max(0) as usize;
            let at = bufpos as usize;
            self.slots[idx].bytes[at..at + n].copy_from_slice(&src[off..off + n]);
            off += n;

            if n < gsize {
                // Group split across the record boundary.
                self.slots[idx].dirty = true;
                record += 1;
                self.load_record(id, record, EofMode::Ignore)?;
                idx = self.current_slot(id).expect("load_record leaves a current buffer");

                let rest = gsize - n;
                self.slots[idx].bytes[..rest].copy_from_slice(&src[off..off + rest]);
                off += rest;
                bufpos = (gap + rest) as i64;
                nspace = RECORD_LEN as i64 - bufpos;
            } else {
                bufpos += (gap + n) as i64;
                nspace -= (gap + n) as i64;
            }

            if nspace <= 0 {
                // The stride carried the cursor out of this record.
                self.slots[idx].dirty = true;
                record += ((RECORD_LEN as i64 - nspace) / RECORD_LEN as i64) as u64;
                self.load_record(id, record, EofMode::Ignore)?;
                idx = self.current_slot(id).expect("load_record leaves a current buffer");
                bufpos = (-nspace).rem_euclid(RECORD_LEN as i64);
                nspace = RECORD_LEN as i64 - bufpos;
            }
        }

        // Last group: no trailing gap.
        let n = (gsize as i64).min(nspace).max(0) as usize;
        let at = bufpos as usize;
        self.slots[idx].bytes[at..at + n].copy_from_slice(&src[off..off + n]);
        off += n;
        if n < gsize {
            self.slots[idx].dirty = true;
            record += 1;
            self.load_record(id, record, EofMode::Ignore)?;
            idx = self.current_slot(id).expect("load_record leaves a current buffer");
            let rest = gsize - n;
            self.slots[idx].bytes[..rest].copy_from_slice(&src[off..off + rest]);
        }
        self.slots[idx].dirty = true;

        self.file_mut(id).bytepos =
            start + (ngroups * gsize) as u64 + ((ngroups - 1) * gap) as u64;
        Ok(())
    }

    /// Read `ngroups` groups of `gsize` bytes into `dst`, skipping `gap`
    /// bytes of the file between consecutive groups. The cursor advances
    /// as for [`put_bytes_grouped`](Self::put_bytes_grouped).
    pub fn get_bytes_grouped(
        &mut self,
        id: FileId,
        gsize: usize,
        ngroups: usize,
        gap: usize,
        dst: &mut [u8],
    ) -> Result<()> {
        if ngroups == 0 || gsize == 0 {
            return Ok(());
        }
        debug_assert!(gsize <= RECORD_LEN, "group cannot exceed a record");
        debug_assert!(dst.len() >= ngroups * gsize, "destination shorter than the groups");

        let mut idx = self.ensure_covering(id, EofMode::Report)?;
        let mut record = self.slots[idx].record;
        let start = self.file(id).bytepos;
        let mut bufpos = (start - record * LEN) as i64;
        let mut nspace = RECORD_LEN as i64 - bufpos;
        let mut off = 0usize;

        for _ in 1..ngroups {
            let n = (gsize as i64).min(nspace).max(0) as usize;
            let at = bufpos as usize;
            dst[off..off + n].copy_from_slice(&self.slots[idx].bytes[at..at + n]);
            off += n;

            if n < gsize {
                record += 1;
                self.load_record(id, record, EofMode::Report)?;
                idx = self.current_slot(id).expect("load_record leaves a current buffer");

                let rest = gsize - n;
                dst[off..off + rest].copy_from_slice(&self.slots[idx].bytes[..rest]);
                off += rest;
                bufpos = (gap + rest) as i64;
                nspace = RECORD_LEN as i64 - bufpos;
            } else {
                bufpos += (gap + n) as i64;
                nspace -= (gap + n) as i64;
            }

            if nspace <= 0 {
                record += ((RECORD_LEN as i64 - nspace) / RECORD_LEN as i64) as u64;
                self.load_record(id, record, EofMode::Report)?;
                idx = self.current_slot(id).expect("load_record leaves a current buffer");
                bufpos = (-nspace).rem_euclid(RECORD_LEN as i64);
                nspace = RECORD_LEN as i64 - bufpos;
            }
        }

        let n = (gsize as i64).min(nspace).max(0) as usize;
        let at = bufpos as usize;
        dst[off..off + n].copy_from_slice(&self.slots[idx].bytes[at..at + n]);
        off += n;
        if n < gsize {
            record += 1;
            self.load_record(id, record, EofMode::Report)?;
            idx = self.current_slot(id).expect("load_record leaves a current buffer");
            let rest = gsize - n;
            dst[off..off + rest].copy_from_slice(&self.slots[idx].bytes[..rest]);
        }

        self.file_mut(id).bytepos =
            start + (ngroups * gsize) as u64 + ((ngroups - 1) * gap) as u64;
        Ok(())
    }
}
