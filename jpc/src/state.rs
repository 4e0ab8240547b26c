use bitflags::bitflags;

bitflags! {
    /// Set of decoder states in which a marker may legally appear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateSet: u16 {
        const MAIN_HEADER_SOC = 0x0001;
        const MAIN_HEADER_SIZ = 0x0002;
        const MAIN_HEADER = 0x0004;
        const TILE_PART_SOT = 0x0008;
        const TILE_PART_HEADER = 0x0010;
        const END_OF_CODESTREAM = 0x0020;
        const DECODED = 0x0040;
    }
}

/// Position of the decoder within the codestream.
///
/// Failures are not a state: the decoder keeps them in a separate sticky
/// fault so the last good position stays observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Nothing read yet.
    None,
    /// Expecting SOC.
    MainHeaderSoc,
    /// SOC read, expecting SIZ.
    MainHeaderSiz,
    /// SIZ read, reading the rest of the main header.
    MainHeader,
    /// Between tile-parts: expecting SOT or EOC.
    TilePartSot,
    /// Inside a tile-part header, until SOD.
    TilePartHeader,
    /// EOC read, tiles may still be waiting for the tile-coding engine.
    EndOfCodestream,
    /// Every buffered tile has been handed to the tile-coding engine.
    Decoded,
}

impl DecodeState {
    pub fn bit(self) -> StateSet {
        match self {
            Self::None => StateSet::empty(),
            Self::MainHeaderSoc => StateSet::MAIN_HEADER_SOC,
            Self::MainHeaderSiz => StateSet::MAIN_HEADER_SIZ,
            Self::MainHeader => StateSet::MAIN_HEADER,
            Self::TilePartSot => StateSet::TILE_PART_SOT,
            Self::TilePartHeader => StateSet::TILE_PART_HEADER,
            Self::EndOfCodestream => StateSet::END_OF_CODESTREAM,
            Self::Decoded => StateSet::DECODED,
        }
    }

    pub fn allows(self, legal: StateSet) -> bool {
        legal.intersects(self.bit())
    }
}
