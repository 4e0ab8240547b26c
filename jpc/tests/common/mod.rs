#![allow(dead_code)]

use jpc::{CodingParameters, Image, Result, TileCodingParameters, TileDecoder, TileEncoder};

pub const SOC: u16 = 0xFF4F;
pub const SOT: u16 = 0xFF90;
pub const SOD: u16 = 0xFF93;
pub const EOC: u16 = 0xFFD9;
pub const SIZ: u16 = 0xFF51;
pub const COD: u16 = 0xFF52;
pub const COC: u16 = 0xFF53;
pub const QCD: u16 = 0xFF5C;
pub const PPM: u16 = 0xFF60;
pub const PPT: u16 = 0xFF61;
pub const QCC: u16 = 0xFF5D;
pub const COM: u16 = 0xFF64;

/// Builds codestream bytes marker by marker.
#[derive(Default)]
pub struct CodestreamBuilder {
    bytes: Vec<u8>,
}

impl CodestreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn marker(self, id: u16) -> Self {
        self.raw(&id.to_be_bytes())
    }

    /// Marker id, Lxxx covering the payload, payload.
    pub fn segment(self, id: u16, payload: &[u8]) -> Self {
        self.marker(id)
            .raw(&(payload.len() as u16 + 2).to_be_bytes())
            .raw(payload)
    }

    pub fn soc(self) -> Self {
        self.marker(SOC)
    }

    /// SIZ for an image at the origin with unsigned 8 bit components.
    pub fn siz(
        self,
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        components: u16,
    ) -> Self {
        self.segment(SIZ, &siz_payload(width, height, tile_width, tile_height, components))
    }

    /// COD: LRCP, one layer, no MCT, 64x64 code-blocks, 5-3 reversible.
    pub fn cod(self, resolutions: u8) -> Self {
        self.segment(COD, &[0, 0, 0, 1, 0, resolutions - 1, 4, 4, 0, 1])
    }

    /// QCD without quantization, 2 guard bits, exponent 8 for every band.
    pub fn qcd(self, resolutions: u8) -> Self {
        let mut payload = vec![0x40];
        payload.extend(std::iter::repeat(8 << 3).take(3 * resolutions as usize - 2));
        self.segment(QCD, &payload)
    }

    pub fn main_header(
        self,
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        components: u16,
    ) -> Self {
        self.soc()
            .siz(width, height, tile_width, tile_height, components)
            .cod(3)
            .qcd(3)
    }

    /// SOT with a Psot covering `header`, SOD and `body`.
    pub fn tile_part(
        self,
        tile: u16,
        tile_part: u8,
        tile_parts: u8,
        header: &[u8],
        body: &[u8],
    ) -> Self {
        let psot = (12 + header.len() + 2 + body.len()) as u32;
        let mut payload = Vec::new();
        payload.extend_from_slice(&tile.to_be_bytes());
        payload.extend_from_slice(&psot.to_be_bytes());
        payload.extend_from_slice(&[tile_part, tile_parts]);
        self.segment(SOT, &payload)
            .raw(header)
            .marker(SOD)
            .raw(body)
    }

    pub fn eoc(self) -> Self {
        self.marker(EOC)
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn siz_payload(
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    components: u16,
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&0u16.to_be_bytes());
    for value in [width, height, 0, 0, tile_width, tile_height, 0, 0] {
        payload.extend_from_slice(&value.to_be_bytes());
    }
    payload.extend_from_slice(&components.to_be_bytes());
    for _ in 0..components {
        payload.extend_from_slice(&[7, 1, 1]);
    }
    payload
}

/// Marker segment bytes (id, length and payload) for use as a tile-part
/// header.
pub fn segment_bytes(id: u16, payload: &[u8]) -> Vec<u8> {
    CodestreamBuilder::new().segment(id, payload).build()
}

/// Stands in for the tile-coding engine, keeping the bytes of every tile it
/// is handed.
#[derive(Default)]
pub struct RecordingDecoder {
    pub tiles: Vec<(u32, Vec<u8>)>,
}

impl TileDecoder for RecordingDecoder {
    fn decode_tile(
        &mut self,
        tile: u32,
        _cp: &CodingParameters,
        tcp: &TileCodingParameters,
        _image: &mut Image,
    ) -> Result<()> {
        self.tiles.push((tile, tcp.data.clone()));
        Ok(())
    }
}

/// Produces `tile` repeated `length` times as the payload of every tile.
pub struct PatternEncoder {
    pub length: usize,
}

impl TileEncoder for PatternEncoder {
    fn encode_tile(
        &mut self,
        tile: u32,
        _cp: &CodingParameters,
        _tcp: &TileCodingParameters,
        _image: &Image,
    ) -> Result<Vec<u8>> {
        Ok(vec![tile as u8; self.length])
    }
}
