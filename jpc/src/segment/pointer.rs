//! Pointer and informational marker segments that only need structural
//! validation: TLM, PLM, PLT and CRG. Their content serves random access
//! outside this crate and is not retained.

use log::debug;

use crate::error::{CodestreamError, Result};
use crate::marker::Marker;
use crate::stream::{ByteWriter, SegmentReader};

/// Stlm of the TLM segments written here: 16 bit Ttlm, 32 bit Ptlm.
const STLM_TILE16_LENGTH32: u8 = 0b0110_0000;

/// Size of one Ttlm/Ptlm record written here.
pub const TLM_RECORD_LENGTH: usize = 6;

// A.7.1
//
// Tile-part lengths (TLM)
//
// Function: Describes the length of every tile-part in the codestream. Each
// tile-part's length is measured from the first byte of the SOT marker segment
// to the end of the bit-stream data of that tile-part.
//
// Returns the number of tile-part records.
pub fn read_tlm(payload: &[u8]) -> Result<usize> {
    let marker = Marker::Tlm;
    if payload.len() < 2 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let mut reader = SegmentReader::new(marker, payload);
    let _index = reader.read_u8()?;
    let stlm = reader.read_u8()?;

    // xx00 xxxx no Ttlm, xx01 xxxx 8 bit Ttlm, xx10 xxxx 16 bit Ttlm
    let tile_size = ((stlm >> 4) & 0b11) as usize;
    if tile_size == 3 {
        return Err(CodestreamError::malformed(
            marker,
            format!("reserved Stlm value 0x{:02X}", stlm),
        ));
    }
    // x0xx xxxx 16 bit Ptlm, x1xx xxxx 32 bit Ptlm
    let length_size = if (stlm >> 6) & 1 == 1 { 4 } else { 2 };
    let record = tile_size + length_size;

    if reader.remaining() % record != 0 {
        return Err(CodestreamError::malformed(
            marker,
            format!(
                "{} bytes do not hold whole {} byte tile-part records",
                reader.remaining(),
                record
            ),
        ));
    }
    let count = reader.remaining() / record;
    debug!("TLM: {} tile-part lengths", count);
    Ok(count)
}

// A.7.2
//
// Packet length, main header (PLM)
//
// Function: A list of packet lengths in the tile-parts for every tile-part in
// order. Every marker segment shall end with a completed packet length.
//
// Returns the number of packet lengths.
pub fn read_plm(payload: &[u8]) -> Result<usize> {
    let marker = Marker::Plm;
    if payload.is_empty() {
        return Err(CodestreamError::InvalidLength { marker, length: 2 });
    }
    let mut reader = SegmentReader::new(marker, payload);
    let _index = reader.read_u8()?;

    let mut count = 0;
    let mut pending = false;
    while reader.remaining() > 0 {
        // Nplm: bytes of Iplm for the next tile-part
        let length = reader.read_u8()? as usize;
        let lengths = reader.read_bytes(length).map_err(|_| {
            CodestreamError::malformed(marker, format!("Nplm {} exceeds the segment", length))
        })?;
        let (packets, open) = count_packet_lengths(lengths);
        count += packets;
        pending = open;
    }
    if pending {
        return Err(CodestreamError::malformed(
            marker,
            "segment ends inside a packet length",
        ));
    }
    debug!("PLM: {} packet lengths", count);
    Ok(count)
}

// A.7.3
//
// Packet length, tile-part header (PLT)
//
// Function: A list of packet lengths in the tile-part.
pub fn read_plt(payload: &[u8]) -> Result<usize> {
    let marker = Marker::Plt;
    if payload.is_empty() {
        return Err(CodestreamError::InvalidLength { marker, length: 2 });
    }
    let mut reader = SegmentReader::new(marker, payload);
    let _index = reader.read_u8()?;
    let (count, pending) = count_packet_lengths(reader.tail());
    if pending {
        return Err(CodestreamError::malformed(
            marker,
            "segment ends inside a packet length",
        ));
    }
    debug!("PLT: {} packet lengths", count);
    Ok(count)
}

/// Counts the packet lengths of an Iplm/Iplt run and tells whether the last
/// one is unterminated.
///
/// Each length is broken into 7 bit segments sent from the most significant
/// one; bit 7 set means more segments follow.
fn count_packet_lengths(bytes: &[u8]) -> (usize, bool) {
    let count = bytes.iter().filter(|byte| *byte & 0x80 == 0).count();
    let pending = bytes.last().map_or(false, |byte| byte & 0x80 != 0);
    (count, pending)
}

// A.9.1
//
// Component registration (CRG)
//
// Function: Allows specific registration of components with respect to each
// other. This marker segment has no effect on decoding the codestream.
pub fn read_crg(payload: &[u8], no_components: usize) -> Result<()> {
    // Xcrg and Ycrg, 16 bits each per component
    if payload.len() != no_components * 4 {
        return Err(CodestreamError::InvalidLength {
            marker: Marker::Crg,
            length: (payload.len() + 2) as u16,
        });
    }
    Ok(())
}

/// Writes a TLM segment with `tile_parts` zeroed records and returns the
/// position of the first record for [`patch_tlm`].
pub fn write_tlm(writer: &mut ByteWriter, tile_parts: usize) -> Result<usize> {
    let position = writer.begin_segment(Marker::Tlm);
    writer.write_u8(0);
    writer.write_u8(STLM_TILE16_LENGTH32);
    let records = writer.position();
    writer.write_bytes(&vec![0; tile_parts * TLM_RECORD_LENGTH])?;
    writer.end_segment(Marker::Tlm, position)?;
    Ok(records)
}

/// Fills in record `record` of a TLM segment written by [`write_tlm`].
pub fn patch_tlm(writer: &mut ByteWriter, records: usize, record: usize, tile: u16, psot: u32) {
    let position = records + record * TLM_RECORD_LENGTH;
    writer.patch_u16(position, tile);
    writer.patch_u32(position + 2, psot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_read_tlm() {
        // 8 bit Ttlm, 16 bit Ptlm
        assert_eq!(read_tlm(&[0, 0x10, 0, 0x01, 0x00, 1, 0x02, 0x00]).unwrap(), 2);
        // no Ttlm, 32 bit Ptlm
        assert_eq!(read_tlm(&[0, 0x40, 0, 0, 1, 0]).unwrap(), 1);

        let err = read_tlm(&[0, 0x10, 0, 0x01]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        let err = read_tlm(&[0, 0x30, 0, 0x01, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        let err = read_tlm(&[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_read_plm() {
        // two tile-parts, lengths {0x85 0x12, 0x07} and {0x10}
        assert_eq!(read_plm(&[0, 3, 0x85, 0x12, 0x07, 1, 0x10]).unwrap(), 3);
        let err = read_plm(&[0, 3, 0x85, 0x12]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        let err = read_plm(&[0, 1, 0x85]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_read_plt() {
        assert_eq!(read_plt(&[0, 0x85, 0x12, 0x07]).unwrap(), 2);
        assert_eq!(read_plt(&[0]).unwrap(), 0);
        let err = read_plt(&[0, 0x07, 0x81]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_read_crg() {
        assert!(read_crg(&[0; 8], 2).is_ok());
        assert_eq!(read_crg(&[0; 6], 2).unwrap_err().kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_write_tlm() {
        let mut writer = ByteWriter::new();
        let records = write_tlm(&mut writer, 2).unwrap();
        patch_tlm(&mut writer, records, 1, 3, 0x0102);
        let bytes = writer.into_inner();
        assert_eq!(&bytes[..6], &[0xFF, 0x55, 0x00, 0x10, 0x00, 0x60]);
        assert_eq!(&bytes[12..], &[0x00, 0x03, 0x00, 0x00, 0x01, 0x02]);
        assert_eq!(read_tlm(&bytes[4..]).unwrap(), 2);
    }
}
