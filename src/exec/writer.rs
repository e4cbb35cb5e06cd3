//! Encoder for execution data files.

use super::{
    SessionInfo, BLOCK_EXECUTIONDATA, BLOCK_HEADER, BLOCK_SESSIONINFO, FORMAT_VERSION,
    MAGIC_NUMBER,
};
use crate::mutf8;
use std::io::{self, Write};

/// Writes the block format read by [`ExecDataReader`](super::ExecDataReader).
///
/// The header block is written on construction.
pub struct ExecFileWriter<W: Write> {
    output: W,
}

impl<W: Write> ExecFileWriter<W> {
    pub fn new(mut output: W) -> io::Result<Self> {
        output.write_all(&[BLOCK_HEADER])?;
        output.write_all(&MAGIC_NUMBER.to_be_bytes())?;
        output.write_all(&FORMAT_VERSION.to_be_bytes())?;
        Ok(Self { output })
    }

    pub fn write_session_info(&mut self, info: &SessionInfo) -> io::Result<()> {
        self.output.write_all(&[BLOCK_SESSIONINFO])?;
        self.write_utf(&info.id)?;
        self.output.write_all(&info.start.to_be_bytes())?;
        self.output.write_all(&info.dump.to_be_bytes())
    }

    pub fn write_execution_data(&mut self, id: u64, name: &str, probes: &[bool]) -> io::Result<()> {
        self.output.write_all(&[BLOCK_EXECUTIONDATA])?;
        self.output.write_all(&id.to_be_bytes())?;
        self.write_utf(name)?;
        self.write_boolean_array(probes)
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    fn write_utf(&mut self, value: &str) -> io::Result<()> {
        let bytes = mutf8::encode(value);
        let len = u16::try_from(bytes.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "string longer than 65535 bytes")
        })?;
        self.output.write_all(&len.to_be_bytes())?;
        self.output.write_all(&bytes)
    }

    fn write_var_int(&mut self, mut value: u32) -> io::Result<()> {
        while value & !0x7F != 0 {
            self.output.write_all(&[0x80 | (value & 0x7F) as u8])?;
            value >>= 7;
        }
        self.output.write_all(&[value as u8])
    }

    fn write_boolean_array(&mut self, values: &[bool]) -> io::Result<()> {
        let len = u32::try_from(values.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "probe array too long"))?;
        self.write_var_int(len)?;
        for chunk in values.chunks(8) {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (bit, &set)| if set { acc | (1 << bit) } else { acc });
            self.output.write_all(&[byte])?;
        }
        Ok(())
    }
}
