//! Block decoder for execution data files.
//!
//! [`ExecDataReader`] is an iterator over decoded [`Block`]s, in the same
//! spirit as `lcov::Reader`: the caller decides what to do with each
//! record. Iteration stops after the first error.

use super::{
    ExecDataError, ExecutionData, SessionInfo, BLOCK_EXECUTIONDATA, BLOCK_HEADER,
    BLOCK_SESSIONINFO, FORMAT_VERSION, MAGIC_NUMBER,
};
use crate::mutf8;
use std::io::{ErrorKind, Read};

/// One decoded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Header { version: u16 },
    SessionInfo(SessionInfo),
    ExecutionData(ExecutionData),
}

pub struct ExecDataReader<R> {
    input: R,
    first_block: bool,
    finished: bool,
}

impl<R: Read> ExecDataReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            first_block: true,
            finished: false,
        }
    }

    fn read_block(&mut self) -> Result<Option<Block>, ExecDataError> {
        let block_type = match self.read_block_type()? {
            Some(block_type) => block_type,
            None => return Ok(None),
        };

        if self.first_block && block_type != BLOCK_HEADER {
            return Err(ExecDataError::MissingHeader);
        }
        self.first_block = false;

        let block = match block_type {
            BLOCK_HEADER => {
                let magic = self.read_u16()?;
                if magic != MAGIC_NUMBER {
                    return Err(ExecDataError::InvalidMagic { magic });
                }
                let version = self.read_u16()?;
                if version != FORMAT_VERSION {
                    return Err(ExecDataError::IncompatibleVersion { version });
                }
                Block::Header { version }
            }
            BLOCK_SESSIONINFO => Block::SessionInfo(SessionInfo {
                id: self.read_utf()?,
                start: self.read_i64()?,
                dump: self.read_i64()?,
            }),
            BLOCK_EXECUTIONDATA => {
                let id = self.read_i64()? as u64;
                let name = self.read_utf()?;
                let probes = self.read_boolean_array()?;
                Block::ExecutionData(ExecutionData::from_probes(id, name, &probes))
            }
            other => return Err(ExecDataError::UnknownBlock { block: other }),
        };
        Ok(Some(block))
    }

    /// Clean end of input is only allowed between blocks.
    fn read_block_type(&mut self) -> Result<Option<u8>, ExecDataError> {
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_u8(&mut self) -> Result<u8, ExecDataError> {
        let mut buf = [0u8; 1];
        self.input.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16, ExecDataError> {
        let mut buf = [0u8; 2];
        self.input.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_i64(&mut self) -> Result<i64, ExecDataError> {
        let mut buf = [0u8; 8];
        self.input.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    /// `DataInput.readUTF`: u16 byte length followed by modified UTF-8.
    fn read_utf(&mut self) -> Result<String, ExecDataError> {
        let len = self.read_u16()? as usize;
        let mut bytes = vec![0u8; len];
        self.input.read_exact(&mut bytes)?;
        Ok(mutf8::decode(&bytes)?)
    }

    /// Seven bits per byte, least significant group first.
    fn read_var_int(&mut self) -> Result<u32, ExecDataError> {
        let mut value = 0u32;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F).checked_shl(shift).unwrap_or(0);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn read_boolean_array(&mut self) -> Result<Vec<bool>, ExecDataError> {
        let len = self.read_var_int()? as usize;
        let mut values = Vec::with_capacity(len.min(1 << 16));
        let mut buffer = 0u8;
        for i in 0..len {
            if i % 8 == 0 {
                buffer = self.read_u8()?;
            }
            values.push(buffer & 0x01 != 0);
            buffer >>= 1;
        }
        Ok(values)
    }
}

impl<R: Read> Iterator for ExecDataReader<R> {
    type Item = Result<Block, ExecDataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
