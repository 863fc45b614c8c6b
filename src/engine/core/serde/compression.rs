use lz4_flex::block::{
    compress_prepend_size as lz4_compress, decompress_size_prepended as lz4_decompress,
};

use crate::engine::errors::SerdeError;

pub const ALGO_LZ4: u16 = 0x0001;

pub trait CompressionCodec: Send + Sync {
    fn algo_id(&self) -> u16;
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, SerdeError>;
    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, SerdeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Codec;

impl CompressionCodec for Lz4Codec {
    fn algo_id(&self) -> u16 {
        ALGO_LZ4
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, SerdeError> {
        Ok(lz4_compress(input))
    }

    fn decompress(&self, input: &[u8], uncompressed_len: usize) -> Result<Vec<u8>, SerdeError> {
        let out = lz4_decompress(input)
            .map_err(|e| SerdeError::Compression(format!("lz4 decompress: {e}")))?;
        if out.len() != uncompressed_len {
            return Err(SerdeError::Compression(format!(
                "lz4 decompressed {} bytes, header says {}",
                out.len(),
                uncompressed_len
            )));
        }
        Ok(out)
    }
}
