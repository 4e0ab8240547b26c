use crate::error::{CodestreamError, Result};

/// One marker (segment) found in the codestream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerRecord {
    /// Marker id, or `MARKER_UNKNOWN` for bytes skipped while resynchronizing.
    pub id: u16,
    /// Byte offset of the marker id.
    pub offset: u64,
    /// Length including the marker id and length fields.
    pub length: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TilePartRecord {
    /// Offset of the SOT marker.
    pub start: u64,
    /// Offset of the first byte after SOD.
    pub end_header: u64,
    /// Offset of the first byte after the tile-part.
    pub end: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileIndex {
    pub tile: u32,
    pub tile_parts: Vec<TilePartRecord>,
    /// SOT, tile-part header markers and SOD of every tile-part.
    pub markers: Vec<MarkerRecord>,
}

/// Offsets of markers and tile-parts, built while reading or writing and
/// never consulted by the parser itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodestreamIndex {
    pub main_head_start: u64,
    pub main_head_end: u64,
    pub codestream_size: u64,
    /// Main header markers.
    pub markers: Vec<MarkerRecord>,
    pub tiles: Vec<TileIndex>,
}

/// Pushes onto `vec`, growing a full vector to twice its capacity plus 100.
fn push_grown<T>(vec: &mut Vec<T>, item: T, what: &'static str) -> Result<()> {
    if vec.len() == vec.capacity() {
        vec.try_reserve_exact(vec.capacity() + 100)
            .map_err(CodestreamError::exhausted(what))?;
    }
    vec.push(item);
    Ok(())
}

impl CodestreamIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn init_tiles(&mut self, count: u32) -> Result<()> {
        let mut tiles = Vec::new();
        tiles
            .try_reserve_exact(count as usize)
            .map_err(CodestreamError::exhausted("tile index"))?;
        tiles.extend((0..count).map(|tile| TileIndex {
            tile,
            ..Default::default()
        }));
        self.tiles = tiles;
        Ok(())
    }

    pub(crate) fn add_marker(&mut self, id: u16, offset: u64, length: u64) -> Result<()> {
        push_grown(
            &mut self.markers,
            MarkerRecord { id, offset, length },
            "marker index",
        )
    }

    pub(crate) fn add_tile_marker(
        &mut self,
        tile: u32,
        id: u16,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        match self.tiles.get_mut(tile as usize) {
            Some(entry) => push_grown(
                &mut entry.markers,
                MarkerRecord { id, offset, length },
                "tile marker index",
            ),
            None => Ok(()),
        }
    }

    pub(crate) fn begin_tile_part(&mut self, tile: u32, start: u64, end: u64) -> Result<()> {
        match self.tiles.get_mut(tile as usize) {
            Some(entry) => push_grown(
                &mut entry.tile_parts,
                TilePartRecord {
                    start,
                    end_header: start,
                    end,
                },
                "tile-part index",
            ),
            None => Ok(()),
        }
    }

    /// Records the end of the header of the tile's latest tile-part.
    pub(crate) fn end_tile_part_header(&mut self, tile: u32, offset: u64) {
        if let Some(record) = self
            .tiles
            .get_mut(tile as usize)
            .and_then(|entry| entry.tile_parts.last_mut())
        {
            record.end_header = offset;
        }
    }

    /// Corrects the end of the tile's latest tile-part.
    pub(crate) fn end_tile_part(&mut self, tile: u32, offset: u64) {
        if let Some(record) = self
            .tiles
            .get_mut(tile as usize)
            .and_then(|entry| entry.tile_parts.last_mut())
        {
            record.end = offset;
        }
    }

    /// Every marker of the codestream, main header first, then tile by tile.
    pub fn all_markers(&self) -> impl Iterator<Item = &MarkerRecord> {
        self.markers
            .iter()
            .chain(self.tiles.iter().flat_map(|tile| tile.markers.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{MARKER_COD, MARKER_SIZ, MARKER_SOT};

    #[test]
    fn test_capacity_growth() {
        let mut index = CodestreamIndex::new();
        index.add_marker(MARKER_SIZ, 2, 41).unwrap();
        assert!(index.markers.capacity() >= 100);
        for offset in 0..100 {
            index.add_marker(MARKER_COD, offset, 14).unwrap();
        }
        assert_eq!(index.markers.len(), 101);
        assert!(index.markers.capacity() >= 300);
    }

    #[test]
    fn test_tile_parts() {
        let mut index = CodestreamIndex::new();
        index.init_tiles(2).unwrap();
        index.begin_tile_part(1, 100, 200).unwrap();
        index.add_tile_marker(1, MARKER_SOT, 100, 12).unwrap();
        index.end_tile_part_header(1, 114);
        assert_eq!(
            index.tiles[1].tile_parts,
            vec![TilePartRecord {
                start: 100,
                end_header: 114,
                end: 200
            }]
        );
        assert!(index.tiles[0].tile_parts.is_empty());
        // out of range tiles are ignored
        index.begin_tile_part(7, 0, 0).unwrap();
        assert_eq!(index.all_markers().count(), 1);
    }
}
