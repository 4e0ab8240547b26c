//! Codestream decoder state machine.
//!
//! The decoder walks the main header, then every tile-part, checking each
//! marker against the states it is legal in before its segment is read. Raw
//! tile-part bodies are buffered per tile and handed to a [`TileDecoder`]
//! once EOC has been reached. The first failure is sticky: every later call
//! returns [`CodestreamError::Halted`].

use std::io;

use log::{debug, error, info, warn};

use crate::config::{DecodeRegion, DecoderConfig};
use crate::error::{CodestreamError, ErrorKind, Result};
use crate::image::{ceil_div, Image};
use crate::index::CodestreamIndex;
use crate::marker::{self, Marker, MARKER_EOC, MARKER_SOC, MARKER_SOD, MARKER_SOT, MARKER_UNKNOWN};
use crate::params::{CodingParameters, Scope, TileCodingParameters};
use crate::procedure::ProcedureList;
use crate::segment::{cod, com, mct, packed, poc, pointer, qcd, rgn, siz, sot};
use crate::state::DecodeState;
use crate::stream::ByteStream;

/// The tile-coding engine: entropy decoding, dequantization, inverse wavelet
/// and component transforms all happen behind this trait.
pub trait TileDecoder {
    /// Decodes one tile from its buffered tile-part bodies (`tcp.data`) into
    /// the image. Called at most once per tile.
    fn decode_tile(
        &mut self,
        tile: u32,
        cp: &CodingParameters,
        tcp: &TileCodingParameters,
        image: &mut Image,
    ) -> Result<()>;
}

/// Range of tiles intersecting the decode area, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileWindow {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl TileWindow {
    pub fn contains(&self, tile: u32, tiles_x: u32) -> bool {
        let p = tile % tiles_x.max(1);
        let q = tile / tiles_x.max(1);
        p >= self.x0 && p < self.x1 && q >= self.y0 && q < self.y1
    }
}

pub struct Decoder {
    config: DecoderConfig,
    state: DecodeState,
    fault: Option<ErrorKind>,
    cp: CodingParameters,
    image: Image,
    index: CodestreamIndex,
    window: TileWindow,
    /// Image area declared by SIZ, before any decode area narrows `image`.
    image_area: DecodeRegion,
    validation: ProcedureList<Decoder>,
    procedures: ProcedureList<Decoder>,
    /// Marker already read from the stream but not yet processed, with its
    /// offset.
    next_marker: Option<(Marker, u64)>,
    current_tile: u32,
    /// Offset of the first byte after the current tile-part.
    tile_part_end: u64,
    qcd_seen: bool,
    tile_parts_read: bool,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        let cp = CodingParameters {
            reduce: config.reduce,
            max_layers: config.max_layers,
            ..Default::default()
        };
        let mut decoder = Self {
            config,
            state: DecodeState::None,
            fault: None,
            cp,
            image: Image::default(),
            index: CodestreamIndex::new(),
            window: TileWindow::default(),
            image_area: DecodeRegion {
                x0: 0,
                y0: 0,
                x1: 0,
                y1: 0,
            },
            validation: ProcedureList::new(),
            procedures: ProcedureList::new(),
            next_marker: None,
            current_tile: 0,
            tile_part_end: 0,
            qcd_seen: false,
            tile_parts_read: false,
        };
        decoder
            .validation
            .register("check decoder state", Decoder::check_decoder_state);
        decoder
    }

    /// Adds a check run by [`Decoder::validate`] before the header is read.
    pub fn add_validation<F>(&mut self, name: &'static str, procedure: F)
    where
        F: FnMut(&mut Decoder, &mut dyn ByteStream) -> Result<()> + 'static,
    {
        self.validation.register(name, procedure);
    }

    /// Adds a step run by [`Decoder::read_header`] after the main header has
    /// been read.
    pub fn add_procedure<F>(&mut self, name: &'static str, procedure: F)
    where
        F: FnMut(&mut Decoder, &mut dyn ByteStream) -> Result<()> + 'static,
    {
        self.procedures.register(name, procedure);
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Kind of the error that halted the decoder, if any.
    pub fn fault(&self) -> Option<ErrorKind> {
        self.fault
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn coding_parameters(&self) -> &CodingParameters {
        &self.cp
    }

    pub fn codestream_index(&self) -> &CodestreamIndex {
        &self.index
    }

    pub fn tile_window(&self) -> TileWindow {
        self.window
    }

    pub fn into_image(self) -> Image {
        self.image
    }

    /// Runs `f` unless the decoder is halted, and halts it if `f` fails.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if let Some(kind) = self.fault {
            return Err(CodestreamError::Halted(kind));
        }
        let result = f(self);
        if let Err(err) = &result {
            error!("{}", err);
            self.fault = Some(err.kind());
        }
        result
    }

    /// Runs the registered validation procedures once.
    pub fn validate(&mut self, stream: &mut dyn ByteStream) -> Result<()> {
        self.guarded(|decoder| decoder.run_validation(stream))
    }

    fn run_validation(&mut self, stream: &mut dyn ByteStream) -> Result<()> {
        let mut validation = std::mem::take(&mut self.validation);
        validation.run_all(self, stream)
    }

    /// Reads the main header up to the first SOT and returns the image
    /// descriptor. Validation procedures that have not run yet run first.
    pub fn read_header(&mut self, stream: &mut dyn ByteStream) -> Result<&Image> {
        self.guarded(|decoder| {
            decoder.run_validation(stream)?;
            if decoder.state != DecodeState::None {
                return Err(CodestreamError::InvalidOperation(
                    "the main header has already been read",
                ));
            }
            let mut procedures = ProcedureList::new();
            procedures.register("read main header", Decoder::read_main_header);
            procedures.register("check main header", Decoder::check_main_header);
            procedures.append(&mut decoder.procedures);
            procedures.run_all(decoder, stream)
        })?;
        Ok(&self.image)
    }

    /// Reads every remaining tile-part up to EOC, then hands each buffered
    /// tile to `engine` in tile index order.
    pub fn decode_all_tiles(
        &mut self,
        stream: &mut dyn ByteStream,
        engine: &mut dyn TileDecoder,
    ) -> Result<()> {
        self.guarded(|decoder| {
            match decoder.state {
                DecodeState::TilePartSot | DecodeState::EndOfCodestream => {}
                DecodeState::Decoded => {
                    return Err(CodestreamError::InvalidOperation(
                        "every tile has already been decoded",
                    ))
                }
                _ => {
                    return Err(CodestreamError::InvalidOperation(
                        "the main header has not been read",
                    ))
                }
            }
            decoder.read_tile_parts(stream)?;
            decoder.decode_tiles(engine)
        })
    }

    /// Restricts decoding to a rectangle of the reference grid. Before the
    /// header is read the rectangle is kept and applied once SIZ is known;
    /// after the first tile-part it can no longer change.
    pub fn set_decode_region(&mut self, x0: u32, y0: u32, x1: u32, y1: u32) -> Result<()> {
        if let Some(kind) = self.fault {
            return Err(CodestreamError::Halted(kind));
        }
        let region = DecodeRegion { x0, y0, x1, y1 };
        match self.state {
            DecodeState::None | DecodeState::MainHeaderSoc | DecodeState::MainHeaderSiz => {
                check_region(&region)?;
                self.config.region = Some(region);
                Ok(())
            }
            DecodeState::MainHeader | DecodeState::TilePartSot if !self.tile_parts_read => {
                self.apply_region(&region)?;
                self.config.region = Some(region);
                Ok(())
            }
            _ => Err(CodestreamError::InvalidOperation(
                "the decode area cannot change once tile-parts have been read",
            )),
        }
    }

    fn check_decoder_state(&mut self, _stream: &mut dyn ByteStream) -> Result<()> {
        if self.state != DecodeState::None {
            return Err(CodestreamError::InvalidOperation(
                "the decoder has already started reading a codestream",
            ));
        }
        if self.config.max_unknown_scan == 0 {
            return Err(CodestreamError::InvalidParameters {
                reason: "the unknown marker scan limit must be positive".to_string(),
            });
        }
        if let Some(region) = &self.config.region {
            check_region(region)?;
        }
        Ok(())
    }

    fn read_main_header(&mut self, stream: &mut dyn ByteStream) -> Result<()> {
        self.state = DecodeState::MainHeaderSoc;
        let start = stream.tell()?;
        self.index.main_head_start = start;

        // A.4.1
        //
        // Start of codestream (SOC)
        //
        // Function: Marks the beginning of a codestream specified in this
        // Recommendation | International Standard.
        //
        // Usage: Main header. This is the first marker in the codestream.
        // There shall be only one SOC per codestream.
        let id = stream.read_u16()?;
        if id != MARKER_SOC {
            return Err(CodestreamError::MarkerExpected {
                expected: Marker::Soc,
                found: id,
                offset: start,
            });
        }
        info!("SOC start at byte offset {}", start);
        self.index.add_marker(MARKER_SOC, start, 2)?;
        self.state = DecodeState::MainHeaderSiz;

        loop {
            let offset = stream.tell()?;
            let id = stream.read_u16()?;
            let (marker, offset) = self.resolve_marker(stream, id, offset)?;
            if marker == Marker::Sot {
                self.index.main_head_end = offset;
                self.next_marker = Some((marker, offset));
                break;
            }
            self.read_marker_segment(stream, marker, offset, Scope::Default)?;
            if marker == Marker::Siz {
                self.state = DecodeState::MainHeader;
            }
        }
        info!("main header end at byte offset {}", self.index.main_head_end);
        Ok(())
    }

    fn check_main_header(&mut self, _stream: &mut dyn ByteStream) -> Result<()> {
        if self.image.components.is_empty() {
            return Err(CodestreamError::MarkerMissing {
                marker: Marker::Siz,
            });
        }
        if !self.cp.default_tcp.cod_seen {
            return Err(CodestreamError::MarkerMissing {
                marker: Marker::Cod,
            });
        }
        if !self.qcd_seen {
            return Err(CodestreamError::MarkerMissing {
                marker: Marker::Qcd,
            });
        }
        packed::finish_ppm(&self.cp)?;
        self.state = DecodeState::TilePartSot;
        Ok(())
    }

    /// Validates a marker id and checks it is legal in the current state.
    /// Unknown ids are skipped up to the next known marker.
    fn resolve_marker(
        &mut self,
        stream: &mut dyn ByteStream,
        id: u16,
        offset: u64,
    ) -> Result<(Marker, u64)> {
        if id < 0xFF00 {
            return Err(CodestreamError::NotAMarker { id, offset });
        }
        let (marker, offset) = match marker::resolve(id) {
            Some(marker) => (marker, offset),
            None => self.skip_unknown(stream, id, offset)?,
        };
        if !self.state.allows(marker.legal_states()) {
            return Err(CodestreamError::MarkerPosition {
                id: marker.id(),
                offset,
            });
        }
        Ok((marker, offset))
    }

    /// Scans forward one byte at a time for a known marker id. The skipped
    /// bytes, unknown id included, are indexed as `MARKER_UNKNOWN`.
    fn skip_unknown(
        &mut self,
        stream: &mut dyn ByteStream,
        id: u16,
        offset: u64,
    ) -> Result<(Marker, u64)> {
        warn!(
            "unknown marker 0x{:04X} at byte offset {}, looking for the next known marker",
            id, offset
        );
        let mut candidate: u16 = 0;
        let mut scanned: u64 = 0;
        let mut byte = [0u8; 1];
        loop {
            if scanned >= self.config.max_unknown_scan {
                return Err(CodestreamError::UnknownMarker { offset, scanned });
            }
            match stream.read_bytes(&mut byte) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(CodestreamError::UnknownMarker { offset, scanned });
                }
                Err(err) => return Err(err.into()),
            }
            scanned += 1;
            candidate = (candidate << 8) | byte[0] as u16;
            if scanned < 2 {
                continue;
            }
            if let Some(marker) = marker::resolve(candidate) {
                // the candidate started two bytes back
                let found = offset + scanned;
                debug!(
                    "{} found at byte offset {} after {} unknown bytes",
                    marker,
                    found,
                    found - offset
                );
                self.record_marker(MARKER_UNKNOWN, offset, found - offset)?;
                return Ok((marker, found));
            }
        }
    }

    /// Indexes a marker under the main header or the current tile.
    fn record_marker(&mut self, id: u16, offset: u64, length: u64) -> Result<()> {
        match self.state {
            DecodeState::TilePartHeader => {
                self.index
                    .add_tile_marker(self.current_tile, id, offset, length)
            }
            _ => self.index.add_marker(id, offset, length),
        }
    }

    fn read_payload(&mut self, stream: &mut dyn ByteStream, length: usize) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        payload
            .try_reserve_exact(length)
            .map_err(CodestreamError::exhausted("marker segment"))?;
        payload.resize(length, 0);
        stream.read_bytes(&mut payload)?;
        Ok(payload)
    }

    fn read_marker_segment(
        &mut self,
        stream: &mut dyn ByteStream,
        marker: Marker,
        offset: u64,
        scope: Scope,
    ) -> Result<()> {
        if !marker.has_length() {
            return Err(CodestreamError::MarkerPosition {
                id: marker.id(),
                offset,
            });
        }
        info!("{} start at byte offset {}", marker, offset);
        let length = stream.read_u16()?;
        if length < 2 {
            return Err(CodestreamError::InvalidLength { marker, length });
        }
        let payload = self.read_payload(stream, length as usize - 2)?;
        self.read_segment(marker, &payload, scope)?;
        self.record_marker(marker.id(), offset, length as u64 + 2)?;
        info!(
            "{} end at byte offset {}",
            marker,
            offset + 2 + length as u64
        );
        Ok(())
    }

    /// Dispatches a marker segment payload to its reader.
    fn read_segment(&mut self, marker: Marker, payload: &[u8], scope: Scope) -> Result<()> {
        let cp = &mut self.cp;
        match marker {
            Marker::Siz => {
                siz::read_siz(payload, cp, &mut self.image)?;
                self.index.init_tiles(self.cp.num_tiles())?;
                self.init_window()
            }
            Marker::Cod => cod::read_cod(payload, cp, scope),
            Marker::Coc => cod::read_coc(payload, cp, scope),
            Marker::Rgn => rgn::read_rgn(payload, cp, scope),
            Marker::Qcd => {
                qcd::read_qcd(payload, cp, scope)?;
                if scope == Scope::Default {
                    self.qcd_seen = true;
                }
                Ok(())
            }
            Marker::Qcc => qcd::read_qcc(payload, cp, scope),
            Marker::Poc => poc::read_poc(payload, cp, scope),
            Marker::Tlm => pointer::read_tlm(payload).map(|_| ()),
            Marker::Plm => pointer::read_plm(payload).map(|_| ()),
            Marker::Plt => pointer::read_plt(payload).map(|_| ()),
            Marker::Ppm => packed::read_ppm(payload, cp),
            Marker::Ppt => match scope {
                Scope::Tile(tile) => packed::read_ppt(payload, cp, tile),
                Scope::Default => Err(CodestreamError::MarkerPosition {
                    id: marker.id(),
                    offset: self.index.main_head_end,
                }),
            },
            Marker::Crg => pointer::read_crg(payload, self.image.no_components()),
            Marker::Com => com::read_com(payload),
            Marker::Mct => mct::read_mct(payload, cp, scope),
            Marker::Mcc => mct::read_mcc(payload, cp, scope),
            Marker::Mco => mct::read_mco(payload, cp, scope),
            Marker::Cbd => mct::read_cbd(payload, cp, &mut self.image),
            Marker::Soc | Marker::Sot | Marker::Sod | Marker::Eoc => {
                Err(CodestreamError::InvalidOperation(
                    "SOT and delimiting markers have no segment reader",
                ))
            }
        }
    }

    /// Covers the whole tile grid, then narrows it to a decode area given
    /// before the header was read.
    fn init_window(&mut self) -> Result<()> {
        self.image_area = DecodeRegion {
            x0: self.image.x0,
            y0: self.image.y0,
            x1: self.image.x1,
            y1: self.image.y1,
        };
        self.window = TileWindow {
            x0: 0,
            y0: 0,
            x1: self.cp.tiles_x,
            y1: self.cp.tiles_y,
        };
        match self.config.region {
            Some(region) => self.apply_region(&region),
            None => Ok(()),
        }
    }

    fn apply_region(&mut self, region: &DecodeRegion) -> Result<()> {
        check_region(region)?;
        let area = self.image_area;
        if region.x0 >= area.x1
            || region.y0 >= area.y1
            || region.x1 <= area.x0
            || region.y1 <= area.y0
        {
            return Err(CodestreamError::InvalidRegion {
                reason: format!(
                    "({}, {}) to ({}, {}) lies outside the image area ({}, {}) to ({}, {})",
                    region.x0,
                    region.y0,
                    region.x1,
                    region.y1,
                    area.x0,
                    area.y0,
                    area.x1,
                    area.y1
                ),
            });
        }
        let x0 = region.x0.max(area.x0);
        let y0 = region.y0.max(area.y0);
        let x1 = region.x1.min(area.x1);
        let y1 = region.y1.min(area.y1);
        if (x0, y0, x1, y1) != (region.x0, region.y0, region.x1, region.y1) {
            warn!(
                "decode area clipped to the image area: ({}, {}) to ({}, {})",
                x0, y0, x1, y1
            );
        }

        let cp = &self.cp;
        self.window = TileWindow {
            x0: (x0 - cp.tile_x0) / cp.tile_width,
            y0: (y0 - cp.tile_y0) / cp.tile_height,
            x1: ceil_div(x1 - cp.tile_x0, cp.tile_width),
            y1: ceil_div(y1 - cp.tile_y0, cp.tile_height),
        };
        self.image.x0 = x0;
        self.image.y0 = y0;
        self.image.x1 = x1;
        self.image.y1 = y1;
        self.image.update_component_geometry();
        info!(
            "decode area ({}, {}) to ({}, {}), tiles {}..{} x {}..{}",
            x0, y0, x1, y1, self.window.x0, self.window.x1, self.window.y0, self.window.y1
        );
        Ok(())
    }

    fn read_tile_parts(&mut self, stream: &mut dyn ByteStream) -> Result<()> {
        while self.state != DecodeState::EndOfCodestream {
            let (marker, offset) = match self.next_marker.take() {
                Some(next) => next,
                None => {
                    let offset = stream.tell()?;
                    let id = match stream.read_u16() {
                        Ok(id) => id,
                        Err(err)
                            if err.kind() == io::ErrorKind::UnexpectedEof
                                && self.state == DecodeState::TilePartSot =>
                        {
                            if self.config.strict {
                                return Err(CodestreamError::MarkerMissing {
                                    marker: Marker::Eoc,
                                });
                            }
                            warn!("EOC missing, codestream ends at byte offset {}", offset);
                            self.index.codestream_size = offset;
                            self.state = DecodeState::EndOfCodestream;
                            break;
                        }
                        Err(err) => return Err(err.into()),
                    };
                    self.resolve_marker(stream, id, offset)?
                }
            };
            match marker {
                Marker::Sot => self.read_sot(stream, offset)?,
                Marker::Sod => self.read_sod(stream, offset)?,
                Marker::Eoc => {
                    // A.4.4
                    //
                    // End of codestream (EOC)
                    //
                    // Function: Indicates the end of the codestream.
                    info!("EOC at byte offset {}", offset);
                    self.index.add_marker(MARKER_EOC, offset, 2)?;
                    self.index.codestream_size = offset + 2;
                    self.state = DecodeState::EndOfCodestream;
                }
                _ => {
                    let scope = Scope::Tile(self.current_tile);
                    self.read_marker_segment(stream, marker, offset, scope)?
                }
            }
        }
        Ok(())
    }

    fn read_sot(&mut self, stream: &mut dyn ByteStream, offset: u64) -> Result<()> {
        info!("SOT start at byte offset {}", offset);
        let length = stream.read_u16()?;
        if length != 10 {
            return Err(CodestreamError::InvalidLength {
                marker: Marker::Sot,
                length,
            });
        }
        let payload = self.read_payload(stream, 8)?;
        let header = sot::read_sot(&payload)?;
        sot::register_tile_part(&mut self.cp, &header, self.config.strict)?;

        self.current_tile = header.tile;
        self.tile_part_end = offset + header.length as u64;
        self.tile_parts_read = true;
        self.index
            .begin_tile_part(header.tile, offset, self.tile_part_end)?;
        self.index
            .add_tile_marker(header.tile, MARKER_SOT, offset, 12)?;
        self.state = DecodeState::TilePartHeader;
        Ok(())
    }

    // A.4.3
    //
    // Start of data (SOD)
    //
    // Function: Indicates the beginning of bit stream data for the current
    // tile-part. The SOD also indicates the end of a tile-part header.
    fn read_sod(&mut self, stream: &mut dyn ByteStream, offset: u64) -> Result<()> {
        let tile = self.current_tile;
        info!("SOD start at byte offset {}", offset);
        self.index.add_tile_marker(tile, MARKER_SOD, offset, 2)?;
        let start = stream.tell()?;
        self.index.end_tile_part_header(tile, start);
        if start > self.tile_part_end {
            return Err(CodestreamError::malformed(
                Marker::Sot,
                format!(
                    "tile {}: tile-part header runs {} bytes past Psot",
                    tile,
                    start - self.tile_part_end
                ),
            ));
        }
        let length = self.tile_part_end - start;

        if self.window.contains(tile, self.cp.tiles_x) {
            let tcp = &mut self.cp.tcps[tile as usize];
            let begin = tcp.data.len();
            tcp.data
                .try_reserve(length as usize)
                .map_err(CodestreamError::exhausted("tile data"))?;
            tcp.data.resize(begin + length as usize, 0);
            stream.read_bytes(&mut tcp.data[begin..])?;
            tcp.buffered = true;
            debug!("tile {}: {} bytes buffered", tile, length);
        } else {
            let skipped = stream.skip(length)?;
            if skipped < length {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            debug!("tile {}: outside the decode area, {} bytes skipped", tile, length);
        }
        self.state = DecodeState::TilePartSot;
        Ok(())
    }

    fn decode_tiles(&mut self, engine: &mut dyn TileDecoder) -> Result<()> {
        for tile in 0..self.cp.num_tiles() {
            let tcp = &self.cp.tcps[tile as usize];
            if !tcp.buffered || tcp.decoded {
                continue;
            }
            if !tcp.can_decode {
                warn!(
                    "tile {}: {} tile-parts read, {} declared",
                    tile, tcp.next_tile_part, tcp.tile_parts
                );
            }
            info!("tile {}: {} bytes to the tile decoder", tile, tcp.data.len());
            engine.decode_tile(tile, &self.cp, tcp, &mut self.image)?;
            self.cp.tcps[tile as usize].release();
        }
        self.state = DecodeState::Decoded;
        Ok(())
    }
}

fn check_region(region: &DecodeRegion) -> Result<()> {
    if region.x0 >= region.x1 || region.y0 >= region.y1 {
        return Err(CodestreamError::InvalidRegion {
            reason: format!(
                "({}, {}) to ({}, {}) is empty",
                region.x0, region.y0, region.x1, region.y1
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_window() {
        let window = TileWindow {
            x0: 1,
            y0: 0,
            x1: 3,
            y1: 1,
        };
        assert!(!window.contains(0, 3));
        assert!(window.contains(1, 3));
        assert!(window.contains(2, 3));
        assert!(!window.contains(4, 3));
    }

    #[test]
    fn test_check_region() {
        assert!(check_region(&DecodeRegion {
            x0: 0,
            y0: 0,
            x1: 1,
            y1: 1
        })
        .is_ok());
        let err = check_region(&DecodeRegion {
            x0: 4,
            y0: 0,
            x1: 4,
            y1: 1,
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn test_validate_once() {
        let mut decoder = Decoder::new(DecoderConfig::default());
        let mut stream = io::Cursor::new(Vec::<u8>::new());
        decoder.validate(&mut stream).unwrap();
        // the validation list is consumed, reading then fails on the empty stream
        let err = decoder.read_header(&mut stream).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Stream);
        assert!(matches!(
            decoder.read_header(&mut stream),
            Err(CodestreamError::Halted(ErrorKind::Stream))
        ));
    }

    #[test]
    fn test_delimiter_has_no_segment() {
        let mut decoder = Decoder::new(DecoderConfig::default());
        let mut stream = io::Cursor::new(vec![0x00, 0x04, 0x00, 0x00]);
        let err = decoder
            .read_marker_segment(&mut stream, Marker::Eoc, 20, Scope::Default)
            .unwrap_err();
        assert!(matches!(
            err,
            CodestreamError::MarkerPosition {
                id: 0xFFD9,
                offset: 20
            }
        ));
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_validate_scan_limit() {
        let config = DecoderConfig {
            max_unknown_scan: 0,
            ..Default::default()
        };
        let mut decoder = Decoder::new(config);
        let mut stream = io::Cursor::new(Vec::<u8>::new());
        let err = decoder.validate(&mut stream).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        assert_eq!(decoder.fault(), Some(ErrorKind::Semantic));
    }
}
