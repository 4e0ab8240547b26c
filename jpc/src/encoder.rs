//! Codestream writer.
//!
//! [`Encoder::start`] checks the configuration, derives the coding parameters
//! and writes the main header. Every tile is then written as a single
//! tile-part around the payload produced by a [`TileEncoder`], and
//! [`Encoder::finish`] closes the codestream with EOC.

use std::io;

use log::{debug, error, info};

use crate::config::EncoderConfig;
use crate::error::{CodestreamError, ErrorKind, Result};
use crate::image::{ceil_div, Image, ImageComponent};
use crate::index::CodestreamIndex;
use crate::marker::{Marker, MARKER_EOC, MARKER_SOC, MARKER_SOD, MARKER_SOT, MARKER_TLM};
use crate::params::{
    CodingParameters, CodingStyle, ComponentTransform, QuantizationStyle, TileCodingParameters,
    WaveletFilter, MAX_POCS, MAX_RESOLUTIONS,
};
use crate::procedure::ProcedureList;
use crate::segment::{cod, com, poc, pointer, qcd, rgn, siz, sot};
use crate::stream::{ByteStream, ByteWriter};

/// The tile-coding engine on the writing side.
pub trait TileEncoder {
    /// Returns the packet data of one tile, written after its SOD.
    fn encode_tile(
        &mut self,
        tile: u32,
        cp: &CodingParameters,
        tcp: &TileCodingParameters,
        image: &Image,
    ) -> Result<Vec<u8>>;
}

pub struct Encoder {
    config: EncoderConfig,
    cp: CodingParameters,
    image: Image,
    writer: ByteWriter,
    index: CodestreamIndex,
    /// Position of the first TLM record.
    tlm: Option<usize>,
    tile_parts: usize,
    written: Vec<bool>,
    validation: ProcedureList<Encoder>,
    procedures: ProcedureList<Encoder>,
    started: bool,
    finished: bool,
    fault: Option<ErrorKind>,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Self {
        let mut encoder = Self {
            config,
            cp: CodingParameters::default(),
            image: Image::default(),
            writer: ByteWriter::new(),
            index: CodestreamIndex::new(),
            tlm: None,
            tile_parts: 0,
            written: Vec::new(),
            validation: ProcedureList::new(),
            procedures: ProcedureList::new(),
            started: false,
            finished: false,
            fault: None,
        };
        encoder
            .validation
            .register("check image", |encoder, _| encoder.check_image());
        encoder
            .validation
            .register("check coding parameters", |encoder, _| {
                encoder.check_coding_parameters()
            });
        encoder
    }

    /// Adds a check run by [`Encoder::start`] before anything is written.
    pub fn add_validation<F>(&mut self, name: &'static str, procedure: F)
    where
        F: FnMut(&mut Encoder, &mut dyn ByteStream) -> Result<()> + 'static,
    {
        self.validation.register(name, procedure);
    }

    /// Adds a step run by [`Encoder::start`] once the main header has been
    /// written.
    pub fn add_procedure<F>(&mut self, name: &'static str, procedure: F)
    where
        F: FnMut(&mut Encoder, &mut dyn ByteStream) -> Result<()> + 'static,
    {
        self.procedures.register(name, procedure);
    }

    pub fn coding_parameters(&self) -> &CodingParameters {
        &self.cp
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Mutable image, for the caller to fill in samples before the tiles are
    /// encoded.
    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    pub fn codestream_index(&self) -> &CodestreamIndex {
        &self.index
    }

    pub fn fault(&self) -> Option<ErrorKind> {
        self.fault
    }

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

    /// Validates the configuration and writes the main header.
    pub fn start(&mut self) -> Result<()> {
        self.guarded(|encoder| {
            if encoder.started {
                return Err(CodestreamError::InvalidOperation(
                    "the main header has already been written",
                ));
            }
            encoder.started = true;
            // Writing reads no input; procedures get an empty stream.
            let mut input = io::Cursor::new(Vec::<u8>::new());
            let mut validation = std::mem::take(&mut encoder.validation);
            validation.run_all(encoder, &mut input)?;

            let mut procedures: ProcedureList<Encoder> = ProcedureList::new();
            procedures.register("setup coding parameters", |encoder, _| {
                encoder.setup_coding_parameters()
            });
            procedures.register("write SOC", |encoder, _| encoder.write_soc());
            procedures.register("write SIZ", |encoder, _| encoder.write_siz());
            procedures.register("write COD", |encoder, _| encoder.write_cod());
            procedures.register("write QCD", |encoder, _| encoder.write_qcd());
            procedures.register("write COC and QCC", |encoder, _| {
                encoder.write_component_parameters()
            });
            procedures.register("write RGN", |encoder, _| encoder.write_rgn());
            procedures.register("write POC", |encoder, _| encoder.write_poc());
            procedures.register("write COM", |encoder, _| encoder.write_com());
            procedures.register("write TLM", |encoder, _| encoder.write_tlm());
            procedures.append(&mut encoder.procedures);
            procedures.run_all(encoder, &mut input)
        })
    }

    /// Writes `tile` as one tile-part: SOT, SOD and the engine's payload.
    pub fn write_tile(&mut self, tile: u32, engine: &mut dyn TileEncoder) -> Result<()> {
        self.guarded(|encoder| encoder.write_tile_part(tile, engine))
    }

    /// Writes every tile in index order.
    pub fn write_all_tiles(&mut self, engine: &mut dyn TileEncoder) -> Result<()> {
        for tile in 0..self.cp.num_tiles() {
            self.write_tile(tile, engine)?;
        }
        Ok(())
    }

    /// Writes EOC and returns the codestream.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        self.guarded(|encoder| {
            if !encoder.started || encoder.finished {
                return Err(CodestreamError::InvalidOperation(
                    "finish needs a started, unfinished codestream",
                ));
            }
            if let Some(tile) = encoder.written.iter().position(|written| !written) {
                return Err(CodestreamError::InvalidParameters {
                    reason: format!("tile {} has not been written", tile),
                });
            }
            let offset = encoder.writer.position() as u64;
            encoder.writer.write_marker(Marker::Eoc);
            encoder.index.add_marker(MARKER_EOC, offset, 2)?;
            encoder.index.codestream_size = offset + 2;
            encoder.finished = true;
            info!("EOC written at byte offset {}", offset);
            Ok(std::mem::take(&mut encoder.writer).into_inner())
        })
    }

    fn check_image(&mut self) -> Result<()> {
        let config = &self.config;
        let invalid = |reason: String| Err(CodestreamError::InvalidParameters { reason });
        if config.components.is_empty() || config.components.len() > siz::MAX_COMPONENTS {
            return invalid(format!(
                "{} components, expected 1 to {}",
                config.components.len(),
                siz::MAX_COMPONENTS
            ));
        }
        if config.x0 >= config.x1 || config.y0 >= config.y1 {
            return invalid(format!(
                "empty image area ({}, {}) to ({}, {})",
                config.x0, config.y0, config.x1, config.y1
            ));
        }
        for (i, component) in config.components.iter().enumerate() {
            if component.precision == 0 || component.precision > siz::MAX_PRECISION {
                return invalid(format!(
                    "component {} precision {} outside 1 to {}",
                    i,
                    component.precision,
                    siz::MAX_PRECISION
                ));
            }
            if !(1..=255).contains(&component.dx) || !(1..=255).contains(&component.dy) {
                return invalid(format!(
                    "component {} sub-sampling {}x{} outside 1 to 255",
                    i, component.dx, component.dy
                ));
            }
        }
        Ok(())
    }

    fn check_coding_parameters(&mut self) -> Result<()> {
        let config = &self.config;
        let invalid = |reason: String| Err(CodestreamError::InvalidParameters { reason });
        if config.num_resolutions == 0 || config.num_resolutions as usize > MAX_RESOLUTIONS {
            return invalid(format!(
                "{} resolutions, expected 1 to {}",
                config.num_resolutions, MAX_RESOLUTIONS
            ));
        }
        let (xcb, ycb) = (config.code_block_width, config.code_block_height);
        if !(2..=10).contains(&xcb) || !(2..=10).contains(&ycb) || xcb + ycb > 12 {
            return invalid(format!("code-block size 2^{} x 2^{}", xcb, ycb));
        }
        if config.num_layers == 0 || config.num_layers > u16::MAX as u32 {
            return invalid(format!("{} layers", config.num_layers));
        }
        if config.guard_bits > 7 {
            return invalid(format!("{} guard bits", config.guard_bits));
        }
        // Reversible exponents are the precision plus the band gain, which
        // reaches 2 once there is a high-pass band.
        let gain = if config.num_resolutions > 1 { 2 } else { 0 };
        for (i, component) in config.components.iter().enumerate() {
            if component.precision + gain > qcd::MAX_EXPONENT {
                return invalid(format!(
                    "component {} precision {} plus band gain exceeds the exponent limit {}",
                    i,
                    component.precision,
                    qcd::MAX_EXPONENT
                ));
            }
        }
        if config.mct && config.components.len() < 3 {
            return invalid("the component transform needs 3 components".to_string());
        }
        if config.tile_x0 > config.x0 || config.tile_y0 > config.y0 {
            return invalid(format!(
                "tile origin ({}, {}) beyond the image origin ({}, {})",
                config.tile_x0, config.tile_y0, config.x0, config.y0
            ));
        }
        let (tile_width, tile_height) = tile_size(config);
        if config.tile_x0 as u64 + tile_width as u64 <= config.x0 as u64
            || config.tile_y0 as u64 + tile_height as u64 <= config.y0 as u64
        {
            return invalid(format!(
                "first tile {}x{} at ({}, {}) misses the image area",
                tile_width, tile_height, config.tile_x0, config.tile_y0
            ));
        }
        let tiles = ceil_div(config.x1 - config.tile_x0, tile_width) as u64
            * ceil_div(config.y1 - config.tile_y0, tile_height) as u64;
        if tiles > siz::MAX_TILES {
            return invalid(format!("{} tiles exceed the tile index space", tiles));
        }
        for (i, &(width, height)) in config.precincts.iter().enumerate() {
            let lowest = i + 1 >= config.num_resolutions as usize;
            if width > 15 || height > 15 || (!lowest && (width == 0 || height == 0)) {
                return invalid(format!("precinct size 2^{} x 2^{}", width, height));
            }
        }
        for &(component, _) in &config.roi_shifts {
            if component as usize >= config.components.len() {
                return invalid(format!("ROI shift for missing component {}", component));
            }
        }
        if config.pocs.len() > MAX_POCS {
            return invalid(format!("{} progression order changes", config.pocs.len()));
        }
        for change in &config.pocs {
            if change.resolution_start >= change.resolution_end
                || change.component_start >= change.component_end
                || change.component_end as usize > config.components.len()
            {
                return invalid(format!("empty or out of range progression change {:?}", change));
            }
        }
        Ok(())
    }

    fn setup_coding_parameters(&mut self) -> Result<()> {
        let config = &self.config;

        let mut components = Vec::new();
        components
            .try_reserve_exact(config.components.len())
            .map_err(CodestreamError::exhausted("image components"))?;
        components.extend(config.components.iter().map(|component| ImageComponent {
            dx: component.dx,
            dy: component.dy,
            precision: component.precision,
            signed: component.signed,
            ..Default::default()
        }));
        let mut image = Image {
            x0: config.x0,
            y0: config.y0,
            x1: config.x1,
            y1: config.y1,
            components,
        };
        image.update_component_geometry();

        let mut coding_style = CodingStyle::empty();
        coding_style.set(CodingStyle::PRECINCTS, !config.precincts.is_empty());
        coding_style.set(CodingStyle::SOP, config.sop);
        coding_style.set(CodingStyle::EPH, config.eph);

        let mut default_tcp = TileCodingParameters::new(image.no_components());
        default_tcp.coding_style = coding_style;
        default_tcp.progression_order = config.progression_order;
        default_tcp.num_layers = config.num_layers;
        default_tcp.layers_to_decode = config.num_layers;
        default_tcp.mct = if config.mct {
            ComponentTransform::Standard
        } else {
            ComponentTransform::None
        };
        default_tcp.pocs = config.pocs.clone();

        for (tccp, component) in default_tcp.components.iter_mut().zip(&image.components) {
            tccp.coding_style = coding_style & CodingStyle::PRECINCTS;
            tccp.num_resolutions = config.num_resolutions;
            tccp.code_block_width = config.code_block_width;
            tccp.code_block_height = config.code_block_height;
            tccp.code_block_style = config.code_block_style;
            if config.irreversible {
                tccp.filter = WaveletFilter::Irreversible97;
                tccp.quantization_style = QuantizationStyle::ScalarExpounded;
            } else {
                tccp.filter = WaveletFilter::Reversible53;
                tccp.quantization_style = QuantizationStyle::None;
            }
            tccp.guard_bits = config.guard_bits;
            qcd::reversible_step_sizes(tccp, component.precision);

            // precinct sizes are configured from the highest resolution down
            if let Some(&last) = config.precincts.last() {
                let top = config.num_resolutions as usize - 1;
                for resolution in 0..config.num_resolutions as usize {
                    let (width, height) = config
                        .precincts
                        .get(top - resolution)
                        .copied()
                        .unwrap_or(last);
                    tccp.precinct_width[resolution] = width;
                    tccp.precinct_height[resolution] = height;
                }
            }
            tccp.dc_level_shift = siz::dc_level_shift(component);
        }
        for &(component, shift) in &config.roi_shifts {
            default_tcp.components[component as usize].roi_shift = shift;
        }

        let (tile_width, tile_height) = tile_size(config);
        let mut cp = CodingParameters {
            tile_x0: config.tile_x0,
            tile_y0: config.tile_y0,
            tile_width,
            tile_height,
            tiles_x: ceil_div(config.x1 - config.tile_x0, tile_width),
            tiles_y: ceil_div(config.y1 - config.tile_y0, tile_height),
            default_tcp,
            ..Default::default()
        };
        let num_tiles = cp.num_tiles() as usize;
        let mut tcps = Vec::new();
        tcps.try_reserve_exact(num_tiles)
            .map_err(CodestreamError::exhausted("tile coding parameters"))?;
        tcps.resize_with(num_tiles, TileCodingParameters::default);
        for tcp in &mut tcps {
            tcp.init_from_default(&cp.default_tcp);
        }
        cp.tcps = tcps;

        self.index.init_tiles(cp.num_tiles())?;
        self.written = vec![false; num_tiles];
        self.cp = cp;
        self.image = image;
        Ok(())
    }

    /// Writes one marker segment through `write` and indexes it.
    fn write_segment(
        &mut self,
        marker: Marker,
        write: impl FnOnce(&mut ByteWriter, &CodingParameters, &Image) -> Result<()>,
    ) -> Result<()> {
        let offset = self.writer.position();
        write(&mut self.writer, &self.cp, &self.image)?;
        let length = self.writer.position() - offset;
        self.index
            .add_marker(marker.id(), offset as u64, length as u64)?;
        info!("{} written at byte offset {}, {} bytes", marker, offset, length);
        Ok(())
    }

    fn write_soc(&mut self) -> Result<()> {
        let offset = self.writer.position() as u64;
        self.index.main_head_start = offset;
        self.writer.write_marker(Marker::Soc);
        self.index.add_marker(MARKER_SOC, offset, 2)
    }

    fn write_siz(&mut self) -> Result<()> {
        self.write_segment(Marker::Siz, siz::write_siz)
    }

    fn write_cod(&mut self) -> Result<()> {
        self.write_segment(Marker::Cod, |writer, cp, _| {
            cod::write_cod(writer, &cp.default_tcp)
        })
    }

    fn write_qcd(&mut self) -> Result<()> {
        self.write_segment(Marker::Qcd, |writer, cp, _| {
            qcd::write_qcd(writer, &cp.default_tcp)
        })
    }

    /// COC and QCC for every component that differs from component 0.
    fn write_component_parameters(&mut self) -> Result<()> {
        let width = self.cp.component_index_width();
        for component in 1..self.cp.no_components() {
            let tcp = &self.cp.default_tcp;
            let first = &tcp.components[0];
            let tccp = &tcp.components[component];
            let coc = !tccp.same_coding_style(first);
            let qcc = !tccp.same_quantization(first);
            if coc {
                self.write_segment(Marker::Coc, |writer, cp, _| {
                    cod::write_coc(writer, &cp.default_tcp, component, width)
                })?;
            }
            if qcc {
                self.write_segment(Marker::Qcc, |writer, cp, _| {
                    qcd::write_qcc(writer, &cp.default_tcp, component, width)
                })?;
            }
        }
        Ok(())
    }

    fn write_rgn(&mut self) -> Result<()> {
        let width = self.cp.component_index_width();
        for component in 0..self.cp.no_components() {
            if self.cp.default_tcp.components[component].roi_shift != 0 {
                self.write_segment(Marker::Rgn, |writer, cp, _| {
                    rgn::write_rgn(writer, &cp.default_tcp, component, width)
                })?;
            }
        }
        Ok(())
    }

    fn write_poc(&mut self) -> Result<()> {
        if self.cp.default_tcp.pocs.is_empty() {
            return Ok(());
        }
        let width = self.cp.component_index_width();
        self.write_segment(Marker::Poc, |writer, cp, _| {
            poc::write_poc(writer, &cp.default_tcp, width)
        })
    }

    fn write_com(&mut self) -> Result<()> {
        match self.config.comment.take() {
            Some(comment) => {
                let result = self.write_segment(Marker::Com, |writer, _, _| {
                    com::write_com(writer, &comment)
                });
                self.config.comment = Some(comment);
                result
            }
            None => Ok(()),
        }
    }

    fn write_tlm(&mut self) -> Result<()> {
        if self.config.tlm {
            let offset = self.writer.position();
            let records = pointer::write_tlm(&mut self.writer, self.cp.num_tiles() as usize)?;
            let length = self.writer.position() - offset;
            self.index
                .add_marker(MARKER_TLM, offset as u64, length as u64)?;
            self.tlm = Some(records);
            info!("TLM written at byte offset {}, {} bytes", offset, length);
        }
        self.index.main_head_end = self.writer.position() as u64;
        Ok(())
    }

    fn write_tile_part(&mut self, tile: u32, engine: &mut dyn TileEncoder) -> Result<()> {
        if !self.started || self.finished {
            return Err(CodestreamError::InvalidOperation(
                "tiles are written between start and finish",
            ));
        }
        match self.written.get(tile as usize) {
            None => {
                return Err(CodestreamError::InvalidParameters {
                    reason: format!("tile {} out of range, {} tiles", tile, self.written.len()),
                })
            }
            Some(true) => {
                return Err(CodestreamError::InvalidParameters {
                    reason: format!("tile {} has already been written", tile),
                })
            }
            Some(false) => {}
        }

        let tcp = &self.cp.tcps[tile as usize];
        let payload = engine.encode_tile(tile, &self.cp, tcp, &self.image)?;

        let start = self.writer.position();
        let psot_position = sot::write_sot(&mut self.writer, tile as u16, 0, 1)?;
        self.index
            .begin_tile_part(tile, start as u64, start as u64)?;
        self.index
            .add_tile_marker(tile, MARKER_SOT, start as u64, 12)?;

        let sod = self.writer.position();
        self.writer.write_marker(Marker::Sod);
        self.index
            .add_tile_marker(tile, MARKER_SOD, sod as u64, 2)?;
        self.index
            .end_tile_part_header(tile, self.writer.position() as u64);
        self.writer.write_bytes(&payload)?;

        let end = self.writer.position();
        let psot = u32::try_from(end - start).map_err(|_| CodestreamError::InvalidParameters {
            reason: format!("tile {}: {} bytes do not fit Psot", tile, end - start),
        })?;
        self.writer.patch_u32(psot_position, psot);
        self.index.end_tile_part(tile, end as u64);
        if let Some(records) = self.tlm {
            pointer::patch_tlm(&mut self.writer, records, self.tile_parts, tile as u16, psot);
        }
        self.tile_parts += 1;
        self.written[tile as usize] = true;
        debug!("tile {}: {} bytes at byte offset {}", tile, psot, start);
        Ok(())
    }
}

/// Tile size, a zero size meaning one tile covering the whole grid.
fn tile_size(config: &EncoderConfig) -> (u32, u32) {
    if config.tile_width == 0 || config.tile_height == 0 {
        (config.x1 - config.tile_x0, config.y1 - config.tile_y0)
    } else {
        (config.tile_width, config.tile_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComponentConfig;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Zeros;

    impl TileEncoder for Zeros {
        fn encode_tile(
            &mut self,
            _tile: u32,
            _cp: &CodingParameters,
            _tcp: &TileCodingParameters,
            _image: &Image,
        ) -> Result<Vec<u8>> {
            Ok(vec![0; 4])
        }
    }

    fn config() -> EncoderConfig {
        EncoderConfig {
            x1: 64,
            y1: 32,
            components: vec![ComponentConfig::default()],
            tile_width: 32,
            tile_height: 32,
            ..Default::default()
        }
    }

    #[test]
    fn test_tile_size() {
        let mut config = config();
        assert_eq!(tile_size(&config), (32, 32));
        config.tile_width = 0;
        assert_eq!(tile_size(&config), (64, 32));
    }

    #[test]
    fn test_check_coding_parameters() {
        let mut config = config();
        config.code_block_width = 7;
        let mut encoder = Encoder::new(config);
        let err = encoder.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        assert!(matches!(
            encoder.start(),
            Err(CodestreamError::Halted(ErrorKind::Semantic))
        ));
    }

    #[test]
    fn test_start_procedures() {
        let markers = Rc::new(Cell::new(0));
        let seen = Rc::clone(&markers);
        let mut encoder = Encoder::new(config());
        encoder.add_procedure("count header markers", move |encoder, _| {
            seen.set(encoder.codestream_index().markers.len());
            Ok(())
        });
        encoder.start().unwrap();
        // SOC, SIZ, COD and QCD
        assert_eq!(markers.get(), 4);

        let mut encoder = Encoder::new(config());
        encoder.add_validation("reject", |_, _| {
            Err(CodestreamError::InvalidOperation("rejected"))
        });
        assert!(encoder.start().is_err());
        assert!(encoder.codestream_index().markers.is_empty());
        assert_eq!(encoder.fault(), Some(ErrorKind::Protocol));
    }

    #[test]
    fn test_tile_written_once() {
        let mut encoder = Encoder::new(config());
        encoder.start().unwrap();
        encoder.write_tile(1, &mut Zeros).unwrap();
        let err = encoder.write_tile(1, &mut Zeros).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn test_finish_needs_every_tile() {
        let mut encoder = Encoder::new(config());
        encoder.start().unwrap();
        encoder.write_tile(0, &mut Zeros).unwrap();
        assert!(encoder.finish().is_err());
    }

    #[test]
    fn test_tlm_records() {
        let mut config = config();
        config.tlm = true;
        let mut encoder = Encoder::new(config);
        encoder.start().unwrap();
        encoder.write_tile(1, &mut Zeros).unwrap();
        encoder.write_tile(0, &mut Zeros).unwrap();
        let tlm = encoder.tlm.unwrap();
        let bytes = encoder.finish().unwrap();
        // Ttlm 1, Ptlm 18: SOT (12) + SOD (2) + 4 payload bytes
        assert_eq!(&bytes[tlm..tlm + 6], &[0, 1, 0, 0, 0, 18]);
        assert_eq!(&bytes[tlm + 6..tlm + 12], &[0, 0, 0, 0, 0, 18]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }
}
