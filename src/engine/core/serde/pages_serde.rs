use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use super::block_encoding::{read_block, write_block};
use super::{CompressionCodec, Lz4Codec, PageCipher, PageCodecMarker, SerializedPage};
use crate::engine::core::page::{MARKER_PAGE_BYTES, MarkerPage, Page};
use crate::engine::errors::SerdeError;

/// Converts pages to and from their wire form. Compression runs before
/// encryption; readers reverse the transforms recorded on each page.
#[derive(Clone, Default)]
pub struct PagesSerde {
    compression: Option<Arc<dyn CompressionCodec>>,
    cipher: Option<PageCipher>,
}

impl PagesSerde {
    pub fn new(compression: Option<Arc<dyn CompressionCodec>>, cipher: Option<PageCipher>) -> Self {
        Self {
            compression,
            cipher,
        }
    }

    /// Convenience constructor for the common toggles: lz4 and an optional key.
    pub fn with_options(compress: bool, cipher: Option<PageCipher>) -> Self {
        let compression: Option<Arc<dyn CompressionCodec>> = if compress {
            Some(Arc::new(Lz4Codec))
        } else {
            None
        };
        Self::new(compression, cipher)
    }

    pub fn is_compressing(&self) -> bool {
        self.compression.is_some()
    }

    pub fn is_encrypting(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn serialize(&self, page: &Page) -> Result<SerializedPage, SerdeError> {
        if let Some(marker) = page.as_marker() {
            return Ok(Self::serialize_marker(marker));
        }
        if page.position_count() == 0 {
            return Err(SerdeError::EmptyPage);
        }

        let mut out = BytesMut::with_capacity(page.size_in_bytes() as usize + 64);
        out.put_u32_le(page.channel_count() as u32);
        for block in page.blocks() {
            write_block(block, &mut out)?;
        }
        let mut payload = out.to_vec();
        let uncompressed_size = payload.len() as u32;
        let mut markers = PageCodecMarker::empty();

        if let Some(codec) = &self.compression {
            payload = codec.compress(&payload)?;
            markers |= PageCodecMarker::COMPRESSED;
        }
        if let Some(cipher) = &self.cipher {
            payload = cipher.encrypt(&payload)?;
            markers |= PageCodecMarker::ENCRYPTED;
        }

        trace!(
            target: "snapflow::serde",
            positions = page.position_count(),
            uncompressed = uncompressed_size,
            stored = payload.len(),
            ?markers,
            "Serialized page"
        );
        Ok(SerializedPage::new(
            payload,
            markers,
            page.position_count() as u32,
            uncompressed_size,
        ))
    }

    pub fn serialize_marker(marker: &MarkerPage) -> SerializedPage {
        SerializedPage::new(
            marker.serialize().to_vec(),
            PageCodecMarker::MARKER_PAGE,
            1,
            MARKER_PAGE_BYTES as u32,
        )
    }

    pub fn deserialize(&self, serialized: &SerializedPage) -> Result<Page, SerdeError> {
        if serialized.is_marker_page() {
            return Ok(Page::marker(MarkerPage::deserialize(serialized.slice())?));
        }

        let mut payload = serialized.slice().to_vec();
        if serialized.is_encrypted() {
            let cipher = self.cipher.as_ref().ok_or(SerdeError::MissingCodec {
                flag: "encrypted",
                component: "cipher",
            })?;
            payload = cipher.decrypt(&payload)?;
        }
        if serialized.is_compressed() {
            let codec = self.compression.as_ref().ok_or(SerdeError::MissingCodec {
                flag: "compressed",
                component: "compression codec",
            })?;
            payload = codec.decompress(&payload, serialized.uncompressed_size() as usize)?;
        }

        let mut buf = Bytes::from(payload);
        if buf.remaining() < 4 {
            return Err(SerdeError::UnexpectedEof("channel count"));
        }
        let channel_count = buf.get_u32_le() as usize;
        let mut blocks = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            blocks.push(read_block(&mut buf)?);
        }
        Ok(Page::with_position_count(
            serialized.position_count() as usize,
            blocks,
        )?)
    }
}

impl std::fmt::Debug for PagesSerde {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagesSerde")
            .field("compressing", &self.is_compressing())
            .field("encrypting", &self.is_encrypting())
            .finish()
    }
}
