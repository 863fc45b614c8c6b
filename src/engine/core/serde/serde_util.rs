use std::io::{self, Read, Write};

use super::{PageCodecMarker, SerializedPage};
use crate::engine::errors::SerdeError;

/// `u32 position_count | u8 markers | u32 uncompressed_size | u32 size`
pub const SERIALIZED_PAGE_HEADER_LEN: usize = 4 + 1 + 4 + 4;

/// Writes one framed page and returns the number of bytes written.
pub fn write_serialized_page<W: Write>(
    writer: &mut W,
    page: &SerializedPage,
) -> io::Result<usize> {
    let mut header = [0u8; SERIALIZED_PAGE_HEADER_LEN];
    header[..4].copy_from_slice(&page.position_count().to_le_bytes());
    header[4] = page.markers().bits();
    header[5..9].copy_from_slice(&page.uncompressed_size().to_le_bytes());
    header[9..].copy_from_slice(&(page.slice().len() as u32).to_le_bytes());
    writer.write_all(&header)?;
    writer.write_all(page.slice())?;
    Ok(SERIALIZED_PAGE_HEADER_LEN + page.slice().len())
}

pub fn read_serialized_pages<R: Read>(reader: R) -> SerializedPageReader<R> {
    SerializedPageReader {
        reader,
        done: false,
    }
}

/// Lazy reader over a stream of framed pages. Stops cleanly at a frame boundary
/// and reports a truncated frame as an error.
pub struct SerializedPageReader<R> {
    reader: R,
    done: bool,
}

impl<R: Read> SerializedPageReader<R> {
    fn read_header(&mut self) -> Result<Option<[u8; SERIALIZED_PAGE_HEADER_LEN]>, SerdeError> {
        let mut header = [0u8; SERIALIZED_PAGE_HEADER_LEN];
        let mut filled = 0;
        while filled < header.len() {
            match self.reader.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(SerdeError::UnexpectedEof("serialized page header")),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SerdeError::Io(e)),
            }
        }
        Ok(Some(header))
    }

    fn read_page(&mut self) -> Result<Option<SerializedPage>, SerdeError> {
        let Some(header) = self.read_header()? else {
            return Ok(None);
        };
        let position_count = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let markers = PageCodecMarker::from_bits_truncate(header[4]);
        let uncompressed_size = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
        let size = u32::from_le_bytes([header[9], header[10], header[11], header[12]]) as usize;

        let mut slice = vec![0u8; size];
        self.reader.read_exact(&mut slice).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                SerdeError::UnexpectedEof("serialized page body")
            } else {
                SerdeError::Io(e)
            }
        })?;
        Ok(Some(SerializedPage::new(
            slice,
            markers,
            position_count,
            uncompressed_size,
        )))
    }
}

impl<R: Read> Iterator for SerializedPageReader<R> {
    type Item = Result<SerializedPage, SerdeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_page() {
            Ok(Some(page)) => Some(Ok(page)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
