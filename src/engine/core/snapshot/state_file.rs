use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use super::state::OperatorState;
use crate::engine::errors::SnapshotError;
use crate::shared::storage_header::{FileKind, MagicFile};

pub struct OperatorStateFile;

impl MagicFile for OperatorStateFile {
    const MAGIC: [u8; 8] = FileKind::OperatorSnapshot.magic();
}

/// Writer for one captured operator state.
/// Format:
///   [BinaryHeader]
///   u32 len
///   [len bytes of bincode(OperatorState)]
pub struct StateFileWriter<'a> {
    path: &'a Path,
}

impl<'a> StateFileWriter<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    pub fn write(&self, state: &OperatorState) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.path)?;
        let mut writer = BufWriter::new(file);

        OperatorStateFile::write_header(&mut writer, 0)?;
        let bytes = bincode::serialize(state)?;
        writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
        writer.write_all(&bytes)?;
        writer.flush()?;

        debug!(target: "snapflow::snapshot::file", path = %self.path.display(), kind = state.kind(), bytes = bytes.len(), "Wrote operator state");
        Ok(())
    }
}

pub struct StateFileReader<'a> {
    path: &'a Path,
}

impl<'a> StateFileReader<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    pub fn read(&self) -> Result<OperatorState, SnapshotError> {
        let mut reader = BufReader::new(File::open(self.path)?);
        OperatorStateFile::read_and_validate_header(&mut reader)?;

        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        let state: OperatorState = bincode::deserialize(&buf)?;

        debug!(target: "snapflow::snapshot::file", path = %self.path.display(), kind = state.kind(), "Read operator state");
        Ok(state)
    }
}
