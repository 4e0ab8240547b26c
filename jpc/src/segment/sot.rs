use log::{debug, warn};

use crate::error::{CodestreamError, Result};
use crate::marker::Marker;
use crate::params::CodingParameters;
use crate::stream::{ByteWriter, SegmentReader};

/// SOT payload: Isot, Psot, TPsot and TNsot.
const SOT_LENGTH: usize = 8;

/// Smallest Psot possible: a complete SOT marker segment plus SOD.
pub const MIN_TILE_PART_LENGTH: u32 = 14;

// A.4.2
//
// Start of tile-part (SOT)
//
// Function: Marks the beginning of a tile-part, the index of its tile, and the
// index of its tile-part. The tile-parts of a given tile shall appear in order
// (see TPsot) in the codestream. However, tile-parts from other tiles may be
// interleaved in the codestream. Therefore, the tile-parts from a given tile
// may not appear contiguously in the codestream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePartHeader {
    // Isot: Tile index. This number refers to the tiles in raster order
    // starting at the number 0.
    pub tile: u32,

    // Psot: Length, in bytes, from the beginning of the first byte of this SOT
    // marker segment of the tile-part to the end of the data of that
    // tile-part.
    pub length: u32,

    // TPsot: Tile-part index. There is a specific order required for decoding
    // tile-parts; this index denotes the order from 0.
    pub tile_part: u32,

    // TNsot: Number of tile-parts of a tile in the codestream. 0 when the
    // number is not specified in this tile-part.
    pub tile_parts: u32,
}

pub fn read_sot(payload: &[u8]) -> Result<TilePartHeader> {
    let marker = Marker::Sot;
    if payload.len() != SOT_LENGTH {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let mut reader = SegmentReader::new(marker, payload);
    Ok(TilePartHeader {
        tile: reader.read_u16()? as u32,
        length: reader.read_u32()?,
        tile_part: reader.read_u8()? as u32,
        tile_parts: reader.read_u8()? as u32,
    })
}

/// Checks a tile-part header against the tile's earlier tile-parts and
/// records it: the tile parameters are initialized on the first tile-part,
/// the tile-part count is updated and `can_decode` set on the last one.
///
/// A TPsot at or beyond the declared count widens the count to TPsot + 1
/// unless `strict` is set.
pub fn register_tile_part(
    cp: &mut CodingParameters,
    header: &TilePartHeader,
    strict: bool,
) -> Result<()> {
    let marker = Marker::Sot;
    let TilePartHeader {
        tile,
        length,
        tile_part,
        tile_parts,
    } = *header;

    if tile >= cp.num_tiles() {
        return Err(CodestreamError::semantic(
            marker,
            format!("tile {} out of range, {} tiles", tile, cp.num_tiles()),
        ));
    }
    if length == 0 {
        return Err(CodestreamError::semantic(
            marker,
            format!("tile {}: Psot 0 (tile-part up to EOC) is not supported", tile),
        ));
    }
    if length < MIN_TILE_PART_LENGTH {
        return Err(CodestreamError::malformed(
            marker,
            format!("Psot {} is shorter than SOT and SOD", length),
        ));
    }

    cp.init_tile(tile);
    let tcp = &mut cp.tcps[tile as usize];
    if tile_part != tcp.next_tile_part {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "tile {}: tile-part {} out of order, expected {}",
                tile, tile_part, tcp.next_tile_part
            ),
        ));
    }

    let declared = if tile_parts != 0 {
        tile_parts
    } else {
        tcp.tile_parts
    };
    if declared != 0 {
        if tile_part >= declared {
            if strict {
                return Err(CodestreamError::semantic(
                    marker,
                    format!(
                        "tile {}: TPsot {} is not below the tile-part count {}",
                        tile, tile_part, declared
                    ),
                ));
            }
            warn!(
                "tile {}: TPsot {} is not below the tile-part count {}, assuming {}",
                tile,
                tile_part,
                declared,
                tile_part + 1
            );
            tcp.tile_parts = tile_part + 1;
        } else if tcp.tile_parts != 0 && tcp.tile_parts != declared {
            return Err(CodestreamError::semantic(
                marker,
                format!(
                    "tile {}: TNsot {} conflicts with the earlier count {}",
                    tile, declared, tcp.tile_parts
                ),
            ));
        } else {
            tcp.tile_parts = declared;
        }
    }

    tcp.next_tile_part += 1;
    tcp.can_decode = tcp.tile_parts != 0 && tile_part + 1 == tcp.tile_parts;
    debug!(
        "tile {}: tile-part {} of {}, {} bytes",
        tile, tile_part, tcp.tile_parts, length
    );
    Ok(())
}

/// Writes a SOT marker segment and returns the position of its Psot field.
pub fn write_sot(
    writer: &mut ByteWriter,
    tile: u16,
    tile_part: u8,
    tile_parts: u8,
) -> Result<usize> {
    let position = writer.begin_segment(Marker::Sot);
    writer.write_u16(tile);
    let psot = writer.position();
    writer.write_u32(0);
    writer.write_u8(tile_part);
    writer.write_u8(tile_parts);
    writer.end_segment(Marker::Sot, position)?;
    Ok(psot)
}
