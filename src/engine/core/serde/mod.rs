pub mod block_encoding;
pub mod cipher;
pub mod compression;
pub mod pages_serde;
pub mod serde_util;

#[cfg(test)]
mod block_encoding_test;
#[cfg(test)]
mod serde_util_test;

use serde::{Deserialize, Serialize};

pub use cipher::PageCipher;
pub use compression::{CompressionCodec, Lz4Codec};
pub use pages_serde::PagesSerde;
pub use serde_util::{SerializedPageReader, read_serialized_pages, write_serialized_page};

bitflags::bitflags! {
    /// Transforms applied to a serialized page payload, recorded per page.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
    pub struct PageCodecMarker: u8 {
        const COMPRESSED  = 0b0000_0001;
        const ENCRYPTED   = 0b0000_0010;
        const MARKER_PAGE = 0b0000_0100;
    }
}

/// A page in wire form. `slice` holds the payload after compression and
/// encryption; `uncompressed_size` is the payload size before compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedPage {
    slice: Vec<u8>,
    markers: PageCodecMarker,
    position_count: u32,
    uncompressed_size: u32,
}

impl SerializedPage {
    pub fn new(
        slice: Vec<u8>,
        markers: PageCodecMarker,
        position_count: u32,
        uncompressed_size: u32,
    ) -> Self {
        Self {
            slice,
            markers,
            position_count,
            uncompressed_size,
        }
    }

    pub fn slice(&self) -> &[u8] {
        &self.slice
    }

    pub fn markers(&self) -> PageCodecMarker {
        self.markers
    }

    pub fn position_count(&self) -> u32 {
        self.position_count
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.uncompressed_size
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.slice.len() as u64
    }

    pub fn retained_size_in_bytes(&self) -> u64 {
        (std::mem::size_of::<Self>() + self.slice.capacity()) as u64
    }

    pub fn is_compressed(&self) -> bool {
        self.markers.contains(PageCodecMarker::COMPRESSED)
    }

    pub fn is_encrypted(&self) -> bool {
        self.markers.contains(PageCodecMarker::ENCRYPTED)
    }

    pub fn is_marker_page(&self) -> bool {
        self.markers.contains(PageCodecMarker::MARKER_PAGE)
    }
}
