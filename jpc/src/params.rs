use bitflags::bitflags;
use log::debug;

/// Maximum number of resolution levels (32 decomposition levels + 1).
pub const MAX_RESOLUTIONS: usize = 33;

/// Maximum number of sub-bands: one LL band plus three per decomposition level.
pub const MAX_BANDS: usize = 3 * MAX_RESOLUTIONS - 2;

/// Maximum number of progression order changes kept per tile.
pub const MAX_POCS: usize = 32;

/// PPx = PPy = 15, the precinct size used when no precincts are signalled.
pub const DEFAULT_PRECINCT_EXPONENT: u8 = 15;

bitflags! {
    // A.13 – Coding style parameter values for the Scod parameter
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CodingStyle: u8 {
        // xxxx xxx1 Entropy coder with precincts defined below
        const PRECINCTS = 0b0000_0001;
        // xxxx xx1x SOP marker segments may be used
        const SOP = 0b0000_0010;
        // xxxx x1xx EPH marker may be used
        const EPH = 0b0000_0100;
    }
}

bitflags! {
    // A.19 – Code-block style for the SPcod and SPcoc parameters
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CodeBlockStyle: u8 {
        // xxxx xxx1 Selective arithmetic coding bypass
        const BYPASS = 0b0000_0001;
        // xxxx xx1x Reset context probabilities on coding pass boundaries
        const RESET = 0b0000_0010;
        // xxxx x1xx Termination on each coding pass
        const TERMALL = 0b0000_0100;
        // xxxx 1xxx Vertically causal context
        const VSC = 0b0000_1000;
        // xxx1 xxxx Predictable termination
        const PTERM = 0b0001_0000;
        // xx1x xxxx Segmentation symbols are used
        const SEGSYM = 0b0010_0000;
    }
}

// A.16 – Progression order for the SGcod, SPcoc, and Ppoc parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressionOrder {
    // 0000 0000 Layer-resolution level-component-position progression
    #[default]
    Lrcp,

    // 0000 0001 Resolution level-layer-component-position progression
    Rlcp,

    // 0000 0010 Resolution level-position-component-layer progression
    Rpcl,

    // 0000 0011 Position-component-resolution level-layer progression
    Pcrl,

    // 0000 0100 Component-position-resolution level-layer progression
    Cprl,
}

impl ProgressionOrder {
    /// `None` for the reserved values.
    pub fn from_u8(value: u8) -> Option<ProgressionOrder> {
        match value {
            0b0000_0000 => Some(ProgressionOrder::Lrcp),
            0b0000_0001 => Some(ProgressionOrder::Rlcp),
            0b0000_0010 => Some(ProgressionOrder::Rpcl),
            0b0000_0011 => Some(ProgressionOrder::Pcrl),
            0b0000_0100 => Some(ProgressionOrder::Cprl),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// A.20 – Transformation for the SPcod and SPcoc parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveletFilter {
    // 9-7 irreversible filter
    Irreversible97,

    // 5-3 reversible filter
    #[default]
    Reversible53,
}

impl WaveletFilter {
    pub fn from_u8(value: u8) -> Option<WaveletFilter> {
        match value {
            0 => Some(WaveletFilter::Irreversible97),
            1 => Some(WaveletFilter::Reversible53),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// A.28 – Quantization style for the Sqcd and Sqcc parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantizationStyle {
    // xxx0 0000 No quantization
    #[default]
    None,

    // xxx0 0001 Scalar derived (values signalled for NLLL subband only)
    ScalarDerived,

    // xxx0 0010 Scalar expounded (values signalled for each subband)
    ScalarExpounded,
}

impl QuantizationStyle {
    pub fn from_u8(value: u8) -> Option<QuantizationStyle> {
        match value {
            0 => Some(QuantizationStyle::None),
            1 => Some(QuantizationStyle::ScalarDerived),
            2 => Some(QuantizationStyle::ScalarExpounded),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Multiple component transformation applied to the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentTransform {
    #[default]
    None,
    /// RCT or ICT on components 0, 1 and 2, chosen by the wavelet filter.
    Standard,
    /// Array-based transform selected by an MCO marker segment.
    Custom,
}

/// Quantization step size of one sub-band, as signalled in SPqcd/SPqcc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepSize {
    pub exponent: u8,
    pub mantissa: u16,
}

/// Tile-component coding parameters (TCCP).
#[derive(Debug, Clone, PartialEq)]
pub struct TileComponentParameters {
    /// Only [`CodingStyle::PRECINCTS`] is meaningful per component.
    pub coding_style: CodingStyle,
    /// Number of decomposition levels + 1.
    pub num_resolutions: u32,
    /// Code-block width exponent (xcb).
    pub code_block_width: u32,
    /// Code-block height exponent (ycb).
    pub code_block_height: u32,
    pub code_block_style: CodeBlockStyle,
    pub filter: WaveletFilter,
    pub quantization_style: QuantizationStyle,
    pub guard_bits: u8,
    pub step_sizes: [StepSize; MAX_BANDS],
    pub roi_shift: u8,
    pub precinct_width: [u8; MAX_RESOLUTIONS],
    pub precinct_height: [u8; MAX_RESOLUTIONS],
    pub dc_level_shift: i64,
}

impl Default for TileComponentParameters {
    fn default() -> Self {
        Self {
            coding_style: CodingStyle::empty(),
            num_resolutions: 0,
            code_block_width: 0,
            code_block_height: 0,
            code_block_style: CodeBlockStyle::empty(),
            filter: WaveletFilter::default(),
            quantization_style: QuantizationStyle::default(),
            guard_bits: 0,
            step_sizes: [StepSize::default(); MAX_BANDS],
            roi_shift: 0,
            precinct_width: [DEFAULT_PRECINCT_EXPONENT; MAX_RESOLUTIONS],
            precinct_height: [DEFAULT_PRECINCT_EXPONENT; MAX_RESOLUTIONS],
            dc_level_shift: 0,
        }
    }
}

impl TileComponentParameters {
    /// Number of sub-bands for the current decomposition depth.
    pub fn num_bands(&self) -> usize {
        if self.num_resolutions == 0 {
            return 0;
        }
        (3 * self.num_resolutions as usize - 2).min(MAX_BANDS)
    }

    fn copy_coding_style_from(&mut self, other: &TileComponentParameters) {
        self.coding_style = other.coding_style;
        self.num_resolutions = other.num_resolutions;
        self.code_block_width = other.code_block_width;
        self.code_block_height = other.code_block_height;
        self.code_block_style = other.code_block_style;
        self.filter = other.filter;
        self.precinct_width = other.precinct_width;
        self.precinct_height = other.precinct_height;
    }

    fn copy_quantization_from(&mut self, other: &TileComponentParameters) {
        self.quantization_style = other.quantization_style;
        self.guard_bits = other.guard_bits;
        self.step_sizes = other.step_sizes;
    }

    /// Coding style fields compared, as needed to decide whether a COC has to
    /// be written after the COD.
    pub fn same_coding_style(&self, other: &TileComponentParameters) -> bool {
        self.coding_style == other.coding_style
            && self.num_resolutions == other.num_resolutions
            && self.code_block_width == other.code_block_width
            && self.code_block_height == other.code_block_height
            && self.code_block_style == other.code_block_style
            && self.filter == other.filter
            && self.precinct_width[..self.num_resolutions as usize]
                == other.precinct_width[..self.num_resolutions as usize]
            && self.precinct_height[..self.num_resolutions as usize]
                == other.precinct_height[..self.num_resolutions as usize]
    }

    /// Quantization fields compared, as needed to decide whether a QCC has to
    /// be written after the QCD.
    pub fn same_quantization(&self, other: &TileComponentParameters) -> bool {
        self.quantization_style == other.quantization_style
            && self.guard_bits == other.guard_bits
            && self.step_sizes == other.step_sizes
    }
}

// A.6.6
//
// Progression order change (POC)
//
// Function: Describes the bounds and progression order for any progression
// order other than default in the codestream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressionOrderChange {
    // RSpoc^i: Resolution level index (inclusive) for the start of a progression
    pub resolution_start: u32,
    // CSpoc^i: Component index (inclusive) for the start of a progression
    pub component_start: u32,
    // LYEpoc^i: Layer index (exclusive) for the end of a progression
    pub layer_end: u32,
    // REpoc^i: Resolution Level index (exclusive) for the end of a progression
    pub resolution_end: u32,
    // CEpoc^i: Component index (exclusive) for the end of a progression
    pub component_end: u32,
    // Ppoc^i: Progression order
    pub progression_order: ProgressionOrder,
}

/// Imct array type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MctArrayType {
    Dependency,
    Decorrelation,
    Offset,
}

impl MctArrayType {
    pub fn from_u8(value: u8) -> Option<MctArrayType> {
        match value {
            0 => Some(MctArrayType::Dependency),
            1 => Some(MctArrayType::Decorrelation),
            2 => Some(MctArrayType::Offset),
            _ => None,
        }
    }
}

/// Imct element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MctElementType {
    Int16,
    Int32,
    Float32,
    Float64,
}

impl MctElementType {
    pub fn from_u8(value: u8) -> MctElementType {
        match value & 0b11 {
            0 => MctElementType::Int16,
            1 => MctElementType::Int32,
            2 => MctElementType::Float32,
            _ => MctElementType::Float64,
        }
    }

    pub fn size(self) -> usize {
        match self {
            MctElementType::Int16 => 2,
            MctElementType::Int32 | MctElementType::Float32 => 4,
            MctElementType::Float64 => 8,
        }
    }
}

/// Array of an MCT marker segment, kept as raw big-endian elements.
#[derive(Debug, Clone, PartialEq)]
pub struct MctRecord {
    pub index: u8,
    pub array_type: MctArrayType,
    pub element_type: MctElementType,
    pub data: Vec<u8>,
}

/// Component collection of an MCC marker segment.
///
/// Transform arrays are referenced by position in the owning tile's
/// `mct_records`, so a cloned parameter set keeps valid references.
#[derive(Debug, Clone, PartialEq)]
pub struct MccRecord {
    pub index: u8,
    pub components: Vec<u16>,
    pub decorrelation: Option<usize>,
    pub offset: Option<usize>,
    pub irreversible: bool,
}

/// Packed packet headers gathered from PPM or PPT marker segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedHeaders {
    /// Header bytes in marker arrival order, Nppm/Zppt fields removed.
    pub data: Vec<u8>,
    /// Declared Nppm length of every chunk (PPM only).
    pub chunk_lengths: Vec<u32>,
    /// Bytes still owed to the last declared chunk.
    pub(crate) pending: u32,
    /// Zppm or Zppt of the last marker read.
    pub(crate) last_index: u8,
}

/// Tile coding parameters (TCP).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileCodingParameters {
    pub coding_style: CodingStyle,
    pub progression_order: ProgressionOrder,
    pub num_layers: u32,
    /// Layers handed to the tile-coding engine, bounded by the decoder
    /// configuration.
    pub layers_to_decode: u32,
    pub mct: ComponentTransform,
    pub components: Vec<TileComponentParameters>,
    pub pocs: Vec<ProgressionOrderChange>,
    pub mct_records: Vec<MctRecord>,
    pub mcc_records: Vec<MccRecord>,
    /// MCC record selected by MCO, by position in `mcc_records`.
    pub mct_stage: Option<usize>,
    pub ppt: Option<PackedHeaders>,
    /// Raw tile-part bodies in arrival order.
    pub data: Vec<u8>,
    /// Declared number of tile-parts, 0 while unknown.
    pub tile_parts: u32,
    /// Every declared tile-part has been read.
    pub can_decode: bool,
    /// Handed to the tile-coding engine; the tile's buffers are gone.
    pub decoded: bool,
    pub(crate) cod_seen: bool,
    pub(crate) initialized: bool,
    /// At least one tile-part body has been buffered.
    pub(crate) buffered: bool,
    pub(crate) next_tile_part: u32,
}

impl TileCodingParameters {
    pub(crate) fn new(no_components: usize) -> Self {
        Self {
            components: vec![TileComponentParameters::default(); no_components],
            ..Default::default()
        }
    }

    /// Copies component 0's coding style into every other component.
    pub(crate) fn broadcast_coding_style(&mut self) {
        if let Some((first, rest)) = self.components.split_first_mut() {
            for component in rest {
                component.copy_coding_style_from(first);
            }
        }
    }

    /// Copies component 0's quantization into every other component.
    pub(crate) fn broadcast_quantization(&mut self) {
        if let Some((first, rest)) = self.components.split_first_mut() {
            for component in rest {
                component.copy_quantization_from(first);
            }
        }
    }

    /// Starts a tile from the main header defaults. Tile-scoped state is not
    /// inherited.
    pub(crate) fn init_from_default(&mut self, default: &TileCodingParameters) {
        *self = TileCodingParameters {
            ppt: None,
            data: Vec::new(),
            tile_parts: 0,
            can_decode: false,
            decoded: false,
            cod_seen: false,
            initialized: true,
            buffered: false,
            next_tile_part: 0,
            ..default.clone()
        };
    }

    /// Drops everything owned by a tile once the engine is done with it.
    pub(crate) fn release(&mut self) {
        self.components = Vec::new();
        self.pocs = Vec::new();
        self.mct_records = Vec::new();
        self.mcc_records = Vec::new();
        self.ppt = None;
        self.data = Vec::new();
        self.decoded = true;
    }
}

/// Selects the default parameters or the ones of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Default,
    Tile(u32),
}

/// Coding parameters (CP) of a whole codestream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodingParameters {
    /// Rsiz: capabilities.
    pub rsiz: u16,
    /// XTOsiz
    pub tile_x0: u32,
    /// YTOsiz
    pub tile_y0: u32,
    /// XTsiz
    pub tile_width: u32,
    /// YTsiz
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub default_tcp: TileCodingParameters,
    pub tcps: Vec<TileCodingParameters>,
    pub ppm: Option<PackedHeaders>,
    /// Resolutions removed when decoding.
    pub reduce: u32,
    /// Maximum number of layers decoded, 0 for all.
    pub max_layers: u32,
}

impl CodingParameters {
    pub fn num_tiles(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    pub fn no_components(&self) -> usize {
        self.default_tcp.components.len()
    }

    /// 1 byte component indices up to 256 components, 2 bytes above.
    pub fn component_index_width(&self) -> usize {
        if self.no_components() <= 256 {
            1
        } else {
            2
        }
    }

    pub fn tcp(&self, scope: Scope) -> Option<&TileCodingParameters> {
        match scope {
            Scope::Default => Some(&self.default_tcp),
            Scope::Tile(index) => self.tcps.get(index as usize),
        }
    }

    pub(crate) fn tcp_mut(&mut self, scope: Scope) -> Option<&mut TileCodingParameters> {
        match scope {
            Scope::Default => Some(&mut self.default_tcp),
            Scope::Tile(index) => self.tcps.get_mut(index as usize),
        }
    }

    /// Initializes a tile from the defaults the first time it is seen.
    pub(crate) fn init_tile(&mut self, index: u32) {
        let default = &self.default_tcp;
        if let Some(tcp) = self.tcps.get_mut(index as usize) {
            if !tcp.initialized {
                debug!("tile {} initialized from the main header defaults", index);
                tcp.init_from_default(default);
            }
        }
    }

    /// Reference grid rectangle of a tile, clipped to the image area.
    pub fn tile_rect(&self, index: u32, image_area: (u32, u32, u32, u32)) -> (u32, u32, u32, u32) {
        let (ix0, iy0, ix1, iy1) = image_area;
        let p = index % self.tiles_x.max(1);
        let q = index / self.tiles_x.max(1);
        let x0 = (self.tile_x0 as u64 + p as u64 * self.tile_width as u64).max(ix0 as u64);
        let y0 = (self.tile_y0 as u64 + q as u64 * self.tile_height as u64).max(iy0 as u64);
        let x1 = (self.tile_x0 as u64 + (p as u64 + 1) * self.tile_width as u64).min(ix1 as u64);
        let y1 = (self.tile_y0 as u64 + (q as u64 + 1) * self.tile_height as u64).min(iy1 as u64);
        (x0 as u32, y0 as u32, x1 as u32, y1 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_with_components(count: usize) -> TileCodingParameters {
        let mut tcp = TileCodingParameters::new(count);
        tcp.components[0].num_resolutions = 6;
        tcp.components[0].code_block_width = 6;
        tcp.components[0].code_block_height = 5;
        tcp.components[0].step_sizes[3] = StepSize {
            exponent: 9,
            mantissa: 17,
        };
        tcp.components[0].quantization_style = QuantizationStyle::ScalarExpounded;
        tcp
    }

    #[test]
    fn test_broadcast_coding_style() {
        let mut tcp = tcp_with_components(3);
        tcp.components[2].roi_shift = 4;
        tcp.broadcast_coding_style();
        assert_eq!(tcp.components[1].num_resolutions, 6);
        assert_eq!(tcp.components[2].code_block_height, 5);
        assert_eq!(tcp.components[2].roi_shift, 4);
        // quantization untouched
        assert_eq!(tcp.components[1].step_sizes[3], StepSize::default());
    }

    #[test]
    fn test_broadcast_quantization() {
        let mut tcp = tcp_with_components(2);
        tcp.broadcast_quantization();
        assert_eq!(tcp.components[1].step_sizes[3].exponent, 9);
        assert_eq!(
            tcp.components[1].quantization_style,
            QuantizationStyle::ScalarExpounded
        );
        assert_eq!(tcp.components[1].num_resolutions, 0);
    }

    #[test]
    fn test_init_tile_deep_copies() {
        let mut cp = CodingParameters {
            tiles_x: 2,
            tiles_y: 1,
            default_tcp: tcp_with_components(2),
            ..Default::default()
        };
        cp.default_tcp.mct_records.push(MctRecord {
            index: 1,
            array_type: MctArrayType::Offset,
            element_type: MctElementType::Int16,
            data: vec![0, 1, 0, 2],
        });
        cp.default_tcp.cod_seen = true;
        cp.tcps = vec![TileCodingParameters::default(); 2];

        cp.init_tile(1);
        let tile = &mut cp.tcps[1];
        assert!(tile.initialized);
        assert!(!tile.cod_seen);
        assert_eq!(tile.components.len(), 2);
        tile.mct_records[0].data[0] = 0xFF;
        assert_eq!(cp.default_tcp.mct_records[0].data[0], 0);
        assert!(!cp.tcps[0].initialized);
    }

    #[test]
    fn test_tile_rect() {
        let cp = CodingParameters {
            tile_x0: 0,
            tile_y0: 0,
            tile_width: 64,
            tile_height: 64,
            tiles_x: 2,
            tiles_y: 2,
            ..Default::default()
        };
        assert_eq!(cp.tile_rect(3, (10, 10, 100, 90)), (64, 64, 100, 90));
        assert_eq!(cp.tile_rect(0, (10, 10, 100, 90)), (10, 10, 64, 64));
    }

    #[test]
    fn test_num_bands() {
        let mut tccp = TileComponentParameters::default();
        assert_eq!(tccp.num_bands(), 0);
        tccp.num_resolutions = 1;
        assert_eq!(tccp.num_bands(), 1);
        tccp.num_resolutions = 33;
        assert_eq!(tccp.num_bands(), MAX_BANDS);
    }
}
