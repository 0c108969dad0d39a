//! Consecutive byte access into ASCII and binary table rows.
//!
//! Rows and characters are 1-based, following FITS convention. A transfer
//! may span multiple rows; reads are bounded by the table's row count
//! while writes extend it.

use crate::engine::{EofMode, FileId, IoEngine};
use crate::error::{Error, Result};

impl IoEngine {
    /// Read `dst.len()` consecutive bytes from the table data area,
    /// starting at character `first_char` of row `first_row` (both
    /// 1-based). Fails with [`Error::BadRowNum`] when the range runs past
    /// the last row.
    pub fn read_table_bytes(
        &mut self,
        id: FileId,
        first_row: i64,
        first_char: i64,
        dst: &mut [u8],
    ) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        let (pos, endrow) = self.table_span(id, first_row, first_char, dst.len() as u64)?;
        if endrow > self.file(id).hdu.numrows {
            return Err(Error::BadRowNum);
        }
        self.seek_to(id, pos as i64, EofMode::Report)?;
        self.get_bytes(id, dst)
    }

    /// Write `src` into the table data area, starting at character
    /// `first_char` of row `first_row` (both 1-based). Writing past the
    /// last row grows the table's row count.
    pub fn write_table_bytes(
        &mut self,
        id: FileId,
        first_row: i64,
        first_char: i64,
        src: &[u8],
    ) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        let (pos, endrow) = self.table_span(id, first_row, first_char, src.len() as u64)?;
        self.seek_to(id, pos as i64, EofMode::Ignore)?;
        self.put_bytes(id, src)?;

        let hdu = &mut self.file_mut(id).hdu;
        if endrow > hdu.numrows {
            hdu.numrows = endrow;
        }
        Ok(())
    }

    /// Validate a table access and map it to a byte position and the last
    /// row it touches.
    fn table_span(
        &self,
        id: FileId,
        first_row: i64,
        first_char: i64,
        nchars: u64,
    ) -> Result<(u64, u64)> {
        if first_row < 1 {
            return Err(Error::BadRowNum);
        }
        if first_char < 1 {
            return Err(Error::BadElemNum);
        }
        let hdu = &self.file(id).hdu;
        if hdu.rowlength == 0 {
            return Err(Error::BadRowNum);
        }
        let first_row = first_row as u64;
        let first_char = first_char as u64;
        let endrow = (first_char + nchars - 2) / hdu.rowlength + first_row;
        let pos = hdu.datastart + (first_row - 1) * hdu.rowlength + first_char - 1;
        Ok((pos, endrow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RECORD_LEN;
    use crate::engine::{HduInfo, HduKind};
    use crate::storage::MemBacking;

    fn table_engine(rowlength: u64, numrows: u64) -> (IoEngine, FileId, MemBacking) {
        let disk = MemBacking::with_data(vec![0u8; 2 * RECORD_LEN]);
        let mut engine = IoEngine::new();
        let size = disk.len();
        let id = engine.open(Box::new(disk.storage()), size);
        engine.set_hdu(
            id,
            HduInfo {
                kind: HduKind::BinaryTable,
                datastart: RECORD_LEN as u64,
                rowlength,
                numrows,
                bytes_per_pixel: 1,
            },
        );
        (engine, id, disk)
    }

    #[test]
    fn write_then_read_one_row() {
        let (mut engine, f, _disk) = table_engine(20, 0);

        engine.write_table_bytes(f, 1, 1, b"first row of data.. ").unwrap();
        assert_eq!(engine.hdu(f).numrows, 1);

        let mut out = [0u8; 20];
        engine.read_table_bytes(f, 1, 1, &mut out).unwrap();
        assert_eq!(&out, b"first row of data.. ");
    }

    #[test]
    fn access_lands_relative_to_datastart() {
        let (mut engine, f, disk) = table_engine(10, 0);

        engine.write_table_bytes(f, 2, 3, b"zz").unwrap();
        engine.flush_file(f, false).unwrap();

        // Row 2, char 3 => datastart + 1 row + 2 chars.
        let pos = RECORD_LEN + 10 + 2;
        assert_eq!(&disk.bytes()[pos..pos + 2], b"zz");
    }

    #[test]
    fn span_across_rows_updates_numrows_to_the_last_row_touched() {
        let (mut engine, f, _disk) = table_engine(10, 0);

        // 25 bytes from row 1 char 6 end in row 3.
        engine.write_table_bytes(f, 1, 6, &[7u8; 25]).unwrap();
        assert_eq!(engine.hdu(f).numrows, 3);

        // A shorter write cannot shrink the count.
        engine.write_table_bytes(f, 1, 1, &[1u8; 5]).unwrap();
        assert_eq!(engine.hdu(f).numrows, 3);
    }

    #[test]
    fn read_past_the_last_row_is_rejected() {
        let (mut engine, f, _disk) = table_engine(10, 2);

        let mut out = [0u8; 21];
        let err = engine.read_table_bytes(f, 1, 1, &mut out).unwrap_err();
        assert!(matches!(err, Error::BadRowNum));

        // Exactly to the end of row 2 is fine.
        let mut out = [0u8; 20];
        engine.read_table_bytes(f, 1, 1, &mut out).unwrap();
    }

    #[test]
    fn row_and_char_must_be_one_based() {
        let (mut engine, f, _disk) = table_engine(10, 2);

        let mut out = [0u8; 4];
        assert!(matches!(
            engine.read_table_bytes(f, 0, 1, &mut out).unwrap_err(),
            Error::BadRowNum
        ));
        assert!(matches!(
            engine.read_table_bytes(f, 1, 0, &mut out).unwrap_err(),
            Error::BadElemNum
        ));
        assert!(matches!(
            engine.write_table_bytes(f, -3, 1, &out).unwrap_err(),
            Error::BadRowNum
        ));
    }

    #[test]
    fn zero_row_length_cannot_be_accessed() {
        let (mut engine, f, _disk) = table_engine(0, 0);

        let mut out = [0u8; 4];
        assert!(matches!(
            engine.read_table_bytes(f, 1, 1, &mut out).unwrap_err(),
            Error::BadRowNum
        ));
    }

    #[test]
    fn empty_transfers_do_nothing() {
        let (mut engine, f, _disk) = table_engine(10, 1);

        engine.write_table_bytes(f, 99, 99, &[]).unwrap();
        let mut out = [];
        engine.read_table_bytes(f, 99, 99, &mut out).unwrap();
        assert_eq!(engine.hdu(f).numrows, 1);
    }
}
