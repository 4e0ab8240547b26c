use std::io;
use std::io::prelude::*;

use crate::error::{CodestreamError, Result};
use crate::marker::Marker;

/// Sequential access to the bytes of a codestream.
///
/// The codec never owns storage; it only pulls bytes through this contract.
/// Every `Read + Seek` type (files, `BufReader`, `Cursor`) implements it.
pub trait ByteStream {
    /// Fills `buf` completely, failing with `UnexpectedEof` on a short read.
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Skips up to `n` bytes and returns how many were actually skipped.
    fn skip(&mut self, n: u64) -> io::Result<u64>;

    /// Current byte offset from the start of the stream.
    fn tell(&mut self) -> io::Result<u64>;

    fn read_u16(&mut self) -> io::Result<u16> {
        let mut buffer: [u8; 2] = [0; 2];
        self.read_bytes(&mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }
}

impl<R: io::Read + io::Seek> ByteStream for R {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.read_exact(buf)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        io::copy(&mut self.by_ref().take(n), &mut io::sink())
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }
}

/// Big-endian reader over the payload of one marker segment.
#[derive(Debug)]
pub(crate) struct SegmentReader<'a> {
    marker: Marker,
    data: &'a [u8],
    offset: usize,
}

impl<'a> SegmentReader<'a> {
    pub(crate) fn new(marker: Marker, data: &'a [u8]) -> Self {
        Self {
            marker,
            data,
            offset: 0,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self
            .data
            .get(self.offset..self.offset + len)
            .ok_or_else(|| {
                CodestreamError::malformed(
                    self.marker,
                    format!(
                        "needs {} more bytes at payload offset {}, {} left",
                        len,
                        self.offset,
                        self.remaining()
                    ),
                )
            })?;
        self.offset += len;
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a 1 or 2 byte unsigned value, as used for component indices.
    pub(crate) fn read_uint(&mut self, width: usize) -> Result<u32> {
        match width {
            1 => Ok(self.read_u8()? as u32),
            _ => Ok(self.read_u16()? as u32),
        }
    }

    /// The unread rest of the payload.
    pub(crate) fn tail(&mut self) -> &'a [u8] {
        let tail = &self.data[self.offset..];
        self.offset = self.data.len();
        tail
    }
}

/// Big-endian writer building codestream bytes in memory, so marker lengths
/// and Psot can be patched once known.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// Writes `value` on 1 or 2 bytes.
    pub fn write_uint(&mut self, value: u32, width: usize) {
        match width {
            1 => self.write_u8(value as u8),
            _ => self.write_u16(value as u16),
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer
            .try_reserve(bytes.len())
            .map_err(CodestreamError::exhausted("codestream output buffer"))?;
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_marker(&mut self, marker: Marker) {
        self.write_u16(marker.id());
    }

    /// Writes the marker id and a length placeholder, returning the position
    /// of the length field for [`ByteWriter::end_segment`].
    pub fn begin_segment(&mut self, marker: Marker) -> usize {
        self.write_marker(marker);
        let position = self.position();
        self.write_u16(0);
        position
    }

    /// Patches the length field written by [`ByteWriter::begin_segment`].
    pub fn end_segment(&mut self, marker: Marker, length_position: usize) -> Result<()> {
        let length = self.position() - length_position;
        if length > u16::MAX as usize {
            return Err(CodestreamError::InvalidParameters {
                reason: format!("{} marker segment of {} bytes is too long", marker, length),
            });
        }
        self.patch_u16(length_position, length as u16);
        Ok(())
    }

    pub fn patch_u16(&mut self, position: usize, value: u16) {
        self.buffer[position..position + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn patch_u32(&mut self, position: usize, value: u32) {
        self.buffer[position..position + 4].copy_from_slice(&value.to_be_bytes());
    }
}
