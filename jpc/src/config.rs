use crate::params::{CodeBlockStyle, ProgressionOrder, ProgressionOrderChange};

/// Rectangle on the reference grid, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeRegion {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    /// Number of highest resolution levels to discard.
    pub reduce: u32,
    /// Maximum number of quality layers to decode, 0 for all of them.
    pub max_layers: u32,
    /// Fail on tile-part indices beyond the declared count and on a missing
    /// EOC instead of tolerating them.
    pub strict: bool,
    /// Bytes scanned for a known marker after an unknown one before giving up.
    pub max_unknown_scan: u64,
    pub region: Option<DecodeRegion>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            reduce: 0,
            max_layers: 0,
            strict: false,
            max_unknown_scan: 1 << 20,
            region: None,
        }
    }
}

/// Parameters of one image component to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentConfig {
    pub precision: u32,
    pub signed: bool,
    pub dx: u32,
    pub dy: u32,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            precision: 8,
            signed: false,
            dx: 1,
            dy: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// Image area on the reference grid.
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    pub components: Vec<ComponentConfig>,
    /// Tile grid origin, tile size 0 means a single tile covering the image.
    pub tile_x0: u32,
    pub tile_y0: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub num_resolutions: u32,
    /// Code-block width and height exponents.
    pub code_block_width: u32,
    pub code_block_height: u32,
    pub code_block_style: CodeBlockStyle,
    pub progression_order: ProgressionOrder,
    pub num_layers: u32,
    pub mct: bool,
    pub irreversible: bool,
    /// User defined precinct (width, height) exponents from the highest
    /// resolution down; the last entry repeats for lower resolutions.
    pub precincts: Vec<(u8, u8)>,
    pub guard_bits: u8,
    pub comment: Option<String>,
    pub sop: bool,
    pub eph: bool,
    pub pocs: Vec<ProgressionOrderChange>,
    /// Region of interest shift for (component, shift) pairs.
    pub roi_shifts: Vec<(u32, u8)>,
    pub tlm: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: 0,
            y1: 0,
            components: Vec::new(),
            tile_x0: 0,
            tile_y0: 0,
            tile_width: 0,
            tile_height: 0,
            num_resolutions: 6,
            code_block_width: 6,
            code_block_height: 6,
            code_block_style: CodeBlockStyle::empty(),
            progression_order: ProgressionOrder::Lrcp,
            num_layers: 1,
            mct: false,
            irreversible: false,
            precincts: Vec::new(),
            guard_bits: 2,
            comment: None,
            sop: false,
            eph: false,
            pocs: Vec::new(),
            roi_shifts: Vec::new(),
            tlm: false,
        }
    }
}
