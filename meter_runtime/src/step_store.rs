//! Append-only step log — binary protobuf frames.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only; frames are never rewritten
//!   - fsync after every write
//!   - Sequence strictly increasing from 0 (validated on append)

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use thiserror::Error;

use crate::proto_types::ProtoFrame;

/// Frames larger than this are treated as corruption.
const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("step log I/O: {0}")]
    Io(#[from] io::Error),
    #[error("sequence violation in step log: expected {expected}, got {got}")]
    Sequence { expected: u64, got: u64 },
    #[error("invalid frame length {0}")]
    FrameLength(usize),
    #[error("truncated frame: {0}")]
    Truncated(io::Error),
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Append-only step log backed by a binary file.
pub struct StepStore {
    path: PathBuf,
    next_sequence: u64,
}

impl StepStore {
    /// Open or create a log at `path`, reading existing frames to find
    /// the next sequence number.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let next_sequence = if path.exists() {
            let frames = Self::read_all_from_file(path)?;
            frames.last().map(|f| f.sequence + 1).unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            path: path.to_path_buf(),
            next_sequence,
        })
    }

    /// Append one frame. Validates ordering, writes, fsyncs.
    pub fn append(&mut self, frame: &ProtoFrame) -> Result<(), StoreError> {
        if frame.sequence != self.next_sequence {
            return Err(StoreError::Sequence {
                expected: self.next_sequence,
                got: frame.sequence,
            });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let buf = frame.encode_to_vec();
        let len = buf.len() as u32;

        {
            let mut writer = BufWriter::new(&mut file);
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(&buf)?;
            writer.flush()?;
        }
        file.sync_all()?;

        self.next_sequence += 1;
        Ok(())
    }

    /// All frames in sequence order.
    pub fn load_all(&self) -> Result<Vec<ProtoFrame>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Self::read_all_from_file(&self.path)
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn is_empty(&self) -> bool {
        self.next_sequence == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all_from_file(path: &Path) -> Result<Vec<ProtoFrame>, StoreError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut frames = Vec::new();
        let mut len_buf = [0u8; 4];

        loop {
            match read_prefix(&mut reader, &mut len_buf)? {
                0 => break,
                4 => {}
                n => {
                    return Err(StoreError::Truncated(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("length prefix cut short after {} of 4 bytes", n),
                    )))
                }
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 || len > MAX_FRAME_LEN {
                return Err(StoreError::FrameLength(len));
            }

            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).map_err(StoreError::Truncated)?;

            let frame = ProtoFrame::decode(buf.as_slice())?;
            let expected = frames.len() as u64;
            if frame.sequence != expected {
                return Err(StoreError::Sequence {
                    expected,
                    got: frame.sequence,
                });
            }
            frames.push(frame);
        }

        Ok(frames)
    }
}

/// Fill `buf` as far as the stream allows. Returns the bytes read, which
/// is less than `buf.len()` only at end of file.
fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize, StoreError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto_bridge::{input_to_frame, run_started_frame};
    use meter_engine::domain::{Choice, Delta};
    use meter_engine::run::StepInput;

    fn temp_log(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("meter_step_store_tests").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("steps.log")
    }

    #[test]
    fn append_and_reload() {
        let path = temp_log("append_reload");
        {
            let mut store = StepStore::open(&path).unwrap();
            assert!(store.is_empty());
            store.append(&run_started_frame(42, 0)).unwrap();
            store
                .append(&input_to_frame(&StepInput::new(1, Choice::A, Delta::ZERO)))
                .unwrap();
        }
        let store = StepStore::open(&path).unwrap();
        assert_eq!(store.next_sequence(), 2);
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn out_of_order_append_is_rejected() {
        let path = temp_log("out_of_order");
        let mut store = StepStore::open(&path).unwrap();
        let err = store
            .append(&input_to_frame(&StepInput::new(1, Choice::A, Delta::ZERO)))
            .unwrap_err();
        assert!(matches!(err, StoreError::Sequence { expected: 0, got: 1 }));
    }

    #[test]
    fn truncated_log_is_detected() {
        let path = temp_log("truncated");
        {
            let mut store = StepStore::open(&path).unwrap();
            store.append(&run_started_frame(42, 0)).unwrap();
            store
                .append(&input_to_frame(&StepInput::new(1, Choice::B, Delta::new(1.0, 2.0, 3.0, 4.0, 5.0))))
                .unwrap();
        }
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 5]).unwrap();
        assert!(StepStore::open(&path).is_err());
    }

    #[test]
    fn torn_length_prefix_is_detected() {
        let path = temp_log("torn_prefix");
        {
            let mut store = StepStore::open(&path).unwrap();
            store.append(&run_started_frame(42, 0)).unwrap();
            store
                .append(&input_to_frame(&StepInput::new(1, Choice::A, Delta::ZERO)))
                .unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[7, 0]).unwrap();
        drop(file);

        assert!(matches!(StepStore::open(&path), Err(StoreError::Truncated(_))));
    }

    #[test]
    fn zero_length_frame_is_corruption() {
        let path = temp_log("zero_len");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, 0u32.to_le_bytes()).unwrap();
        assert!(matches!(StepStore::open(&path), Err(StoreError::FrameLength(0))));
    }
}
