use crc32fast::Hasher as Crc32Hasher;
use std::io::{Error, ErrorKind, Read, Write};

/// Fixed 20-byte header at the start of every file the runtime writes:
/// `magic[8] | u16 version | u16 flags | u32 reserved | u32 crc32`, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryHeader {
    pub magic: [u8; 8],
    pub version: u16,
    pub flags: u16,
    pub reserved: u32,
    pub header_crc32: u32,
}

impl BinaryHeader {
    pub const LEN_WITHOUT_CRC: usize = 8 + 2 + 2 + 4;
    pub const TOTAL_LEN: usize = Self::LEN_WITHOUT_CRC + 4;

    pub fn new(magic: [u8; 8], version: u16, flags: u16) -> Self {
        let mut header = Self {
            magic,
            version,
            flags,
            reserved: 0,
            header_crc32: 0,
        };
        header.header_crc32 = header.compute_crc32();
        header
    }

    fn compute_crc32(&self) -> u32 {
        let mut hasher = Crc32Hasher::new();
        hasher.update(&self.magic);
        hasher.update(&self.version.to_le_bytes());
        hasher.update(&self.flags.to_le_bytes());
        hasher.update(&self.reserved.to_le_bytes());
        hasher.finalize()
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        let mut buf = [0u8; Self::TOTAL_LEN];
        buf[..8].copy_from_slice(&self.magic);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.flags.to_le_bytes());
        buf[12..16].copy_from_slice(&self.reserved.to_le_bytes());
        buf[16..20].copy_from_slice(&self.header_crc32.to_le_bytes());
        w.write_all(&buf)
    }

    pub fn read_from<R: Read>(mut r: R) -> std::io::Result<Self> {
        let mut buf = [0u8; Self::TOTAL_LEN];
        r.read_exact(&mut buf)?;

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&buf[..8]);
        let hdr = Self {
            magic,
            version: u16::from_le_bytes([buf[8], buf[9]]),
            flags: u16::from_le_bytes([buf[10], buf[11]]),
            reserved: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            header_crc32: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        };
        if hdr.compute_crc32() != hdr.header_crc32 {
            return Err(Error::new(ErrorKind::InvalidData, "header CRC mismatch"));
        }
        Ok(hdr)
    }
}

pub trait MagicFile {
    const MAGIC: [u8; 8];
    const VERSION: u16 = 1;

    fn write_header<W: Write>(writer: &mut W, flags: u16) -> std::io::Result<()> {
        BinaryHeader::new(Self::MAGIC, Self::VERSION, flags).write_to(writer)
    }

    fn read_and_validate_header<R: Read>(reader: &mut R) -> std::io::Result<BinaryHeader> {
        let header = BinaryHeader::read_from(reader)?;
        if header.magic != Self::MAGIC {
            return Err(Error::new(ErrorKind::InvalidData, "invalid magic"));
        }
        if header.version != Self::VERSION {
            return Err(Error::new(ErrorKind::InvalidData, "unsupported version"));
        }
        Ok(header)
    }
}

pub enum FileKind {
    SpillFile,
    OperatorSnapshot,
}

impl FileKind {
    pub const fn magic(&self) -> [u8; 8] {
        match self {
            FileKind::SpillFile => *b"SNFSPILL",
            FileKind::OperatorSnapshot => *b"SNFOPSNP",
        }
    }
}
