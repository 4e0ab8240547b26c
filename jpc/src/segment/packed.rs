use log::debug;

use super::scoped_tcp;
use crate::error::{CodestreamError, Result};
use crate::marker::Marker;
use crate::params::{CodingParameters, PackedHeaders, Scope};
use crate::stream::SegmentReader;

// A.7.4
//
// Packed packet headers, main header (PPM)
//
// Function: A collection of the packet headers from all tiles.
//
// Zppm orders the segments, then (Nppm, Ippm) pairs follow, one per
// tile-part. An Ippm run may continue into the next PPM marker segment, in
// which case that segment carries no Nppm before the continuation.
pub fn read_ppm(payload: &[u8], cp: &mut CodingParameters) -> Result<()> {
    let marker = Marker::Ppm;
    if payload.is_empty() {
        return Err(CodestreamError::InvalidLength { marker, length: 2 });
    }
    let mut reader = SegmentReader::new(marker, payload);
    let index = reader.read_u8()?;

    match &cp.ppm {
        None if index != 0 => {
            return Err(CodestreamError::semantic(
                marker,
                format!("Zppm {} read before Zppm 0", index),
            ))
        }
        None if reader.remaining() < 4 => {
            return Err(CodestreamError::malformed(
                marker,
                "first segment does not carry Nppm",
            ))
        }
        Some(_) if index == 0 => {
            return Err(CodestreamError::semantic(marker, "Zppm 0 found twice"))
        }
        _ => {}
    }
    let ppm = cp.ppm.get_or_insert_with(PackedHeaders::default);
    ppm.last_index = index;

    while reader.remaining() > 0 {
        if ppm.pending == 0 {
            if reader.remaining() < 4 {
                return Err(CodestreamError::malformed(
                    marker,
                    format!(
                        "{} stray bytes where Nppm is expected",
                        reader.remaining()
                    ),
                ));
            }
            let length = reader.read_u32()?;
            ppm.chunk_lengths
                .try_reserve(1)
                .map_err(CodestreamError::exhausted("PPM chunk lengths"))?;
            ppm.chunk_lengths.push(length);
            ppm.pending = length;
        }
        let take = (ppm.pending as usize).min(reader.remaining());
        let bytes = reader.read_bytes(take)?;
        ppm.data
            .try_reserve(take)
            .map_err(CodestreamError::exhausted("PPM packet headers"))?;
        ppm.data.extend_from_slice(bytes);
        ppm.pending -= take as u32;
    }
    debug!(
        "PPM {}: {} bytes in {} chunks, {} pending",
        index,
        ppm.data.len(),
        ppm.chunk_lengths.len(),
        ppm.pending
    );
    Ok(())
}

/// Checks that the last Nppm chunk is complete once the main header ends.
pub fn finish_ppm(cp: &CodingParameters) -> Result<()> {
    match &cp.ppm {
        Some(ppm) if ppm.pending != 0 => Err(CodestreamError::malformed(
            Marker::Ppm,
            format!("last Nppm chunk is missing {} bytes", ppm.pending),
        )),
        _ => Ok(()),
    }
}

// A.7.5
//
// Packed packet headers, tile-part header (PPT)
//
// Function: A collection of the packet headers from one tile or tile-part.
pub fn read_ppt(payload: &[u8], cp: &mut CodingParameters, tile: u32) -> Result<()> {
    let marker = Marker::Ppt;
    if cp.ppm.is_some() {
        return Err(CodestreamError::semantic(
            marker,
            "PPT is not allowed when the main header has PPM",
        ));
    }
    if payload.len() < 2 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let mut reader = SegmentReader::new(marker, payload);
    let index = reader.read_u8()?;
    let bytes = reader.tail();

    let tcp = scoped_tcp(cp, Scope::Tile(tile), marker)?;
    if tcp.ppt.is_none() {
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())
            .map_err(CodestreamError::exhausted("PPT packet headers"))?;
        tcp.ppt = Some(PackedHeaders {
            data,
            ..Default::default()
        });
    }
    let ppt = tcp.ppt.get_or_insert_with(PackedHeaders::default);
    ppt.data
        .try_reserve(bytes.len())
        .map_err(CodestreamError::exhausted("PPT packet headers"))?;
    ppt.data.extend_from_slice(bytes);
    ppt.last_index = index;
    debug!("PPT {} of tile {}: {} bytes", index, tile, ppt.data.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::params::TileCodingParameters;

    fn cp() -> CodingParameters {
        CodingParameters {
            default_tcp: TileCodingParameters::new(1),
            tcps: vec![TileCodingParameters::new(1)],
            tiles_x: 1,
            tiles_y: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_read_ppm_chunk_spans_segments() {
        let mut cp = cp();
        // Zppm 0, Nppm 5, 3 bytes
        read_ppm(&[0, 0, 0, 0, 5, 1, 2, 3], &mut cp).unwrap();
        assert!(finish_ppm(&cp).is_err());
        // Zppm 1, 2 more bytes, Nppm 1, 1 byte
        read_ppm(&[1, 4, 5, 0, 0, 0, 1, 6], &mut cp).unwrap();
        finish_ppm(&cp).unwrap();

        let ppm = cp.ppm.as_ref().unwrap();
        assert_eq!(ppm.data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(ppm.chunk_lengths, vec![5, 1]);
        assert_eq!(
            ppm.chunk_lengths.iter().sum::<u32>() as usize,
            ppm.data.len()
        );
    }

    #[test]
    fn test_read_ppm_errors() {
        let mut cp = cp();
        let err = read_ppm(&[1, 0, 0, 0, 1, 9], &mut cp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        let err = read_ppm(&[0, 0, 0], &mut cp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);

        read_ppm(&[0, 0, 0, 0, 1, 9], &mut cp).unwrap();
        // stray bytes where the next Nppm starts
        let err = read_ppm(&[1, 0, 0], &mut cp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        let err = read_ppm(&[0, 0, 0, 0, 1, 9], &mut cp).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn test_read_ppt() {
        let mut cp = cp();
        read_ppt(&[0, 1, 2, 3], &mut cp, 0).unwrap();
        assert_eq!(cp.tcps[0].ppt.as_ref().unwrap().data.capacity(), 3);
        read_ppt(&[1, 4], &mut cp, 0).unwrap();
        assert_eq!(cp.tcps[0].ppt.as_ref().unwrap().data, vec![1, 2, 3, 4]);
        assert_eq!(read_ppt(&[0], &mut cp, 0).unwrap_err().kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_read_ppt_with_ppm() {
        let mut cp = cp();
        read_ppm(&[0, 0, 0, 0, 1, 9], &mut cp).unwrap();
        let err = read_ppt(&[0, 1, 2, 3], &mut cp, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }
}
