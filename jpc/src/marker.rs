use std::fmt;

use crate::state::StateSet;

// Delimiting markers and marker segments
pub const MARKER_SOC: u16 = 0xFF4F; // Start of codestream
pub const MARKER_SOT: u16 = 0xFF90; // Start of tile-part
pub const MARKER_SOD: u16 = 0xFF93; // Start of data
pub const MARKER_EOC: u16 = 0xFFD9; // End of codestream

// Fixed information marker segments
pub const MARKER_SIZ: u16 = 0xFF51; // Image and tile size

// Functional marker segments
pub const MARKER_COD: u16 = 0xFF52; // Coding style default
pub const MARKER_COC: u16 = 0xFF53; // Coding style component
pub const MARKER_RGN: u16 = 0xFF5E; // Region-of-interest
pub const MARKER_QCD: u16 = 0xFF5C; // Quantization default
pub const MARKER_QCC: u16 = 0xFF5D; // Quantization component
pub const MARKER_POC: u16 = 0xFF5F; // Progression order change

// Pointer marker segments
pub const MARKER_TLM: u16 = 0xFF55; // Tile-part lengths
pub const MARKER_PLM: u16 = 0xFF57; // Packet length, main header
pub const MARKER_PLT: u16 = 0xFF58; // Packet length, tile-part header
pub const MARKER_PPM: u16 = 0xFF60; // Packed packet headers, main header
pub const MARKER_PPT: u16 = 0xFF61; // Packed packet headers, tile-part header

// Informational marker segments
pub const MARKER_CRG: u16 = 0xFF63; // Component registration
pub const MARKER_COM: u16 = 0xFF64; // Comment

// ISO/IEC 15444-2 multiple component transformation
pub const MARKER_MCT: u16 = 0xFF74; // Multiple component transformation definition
pub const MARKER_MCC: u16 = 0xFF75; // Multiple component collection
pub const MARKER_MCO: u16 = 0xFF77; // Multiple component transformation ordering
pub const MARKER_CBD: u16 = 0xFF78; // Component bit depth definition

/// Marker id recorded in the codestream index for bytes skipped while
/// resynchronizing after an unknown marker.
pub const MARKER_UNKNOWN: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Soc,
    Sot,
    Sod,
    Eoc,
    Siz,
    Cod,
    Coc,
    Rgn,
    Qcd,
    Qcc,
    Poc,
    Tlm,
    Plm,
    Plt,
    Ppm,
    Ppt,
    Crg,
    Com,
    Mct,
    Mcc,
    Mco,
    Cbd,
}

struct MarkerEntry {
    id: u16,
    marker: Marker,
    states: StateSet,
}

const MH: StateSet = StateSet::MAIN_HEADER;
const TPH: StateSet = StateSet::TILE_PART_HEADER;

// Rows are in `Marker` declaration order.
static MARKER_TABLE: [MarkerEntry; 22] = [
    MarkerEntry {
        id: MARKER_SOC,
        marker: Marker::Soc,
        states: StateSet::MAIN_HEADER_SOC,
    },
    MarkerEntry {
        id: MARKER_SOT,
        marker: Marker::Sot,
        states: MH.union(StateSet::TILE_PART_SOT),
    },
    MarkerEntry {
        id: MARKER_SOD,
        marker: Marker::Sod,
        states: TPH,
    },
    MarkerEntry {
        id: MARKER_EOC,
        marker: Marker::Eoc,
        states: StateSet::TILE_PART_SOT,
    },
    MarkerEntry {
        id: MARKER_SIZ,
        marker: Marker::Siz,
        states: StateSet::MAIN_HEADER_SIZ,
    },
    MarkerEntry {
        id: MARKER_COD,
        marker: Marker::Cod,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_COC,
        marker: Marker::Coc,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_RGN,
        marker: Marker::Rgn,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_QCD,
        marker: Marker::Qcd,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_QCC,
        marker: Marker::Qcc,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_POC,
        marker: Marker::Poc,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_TLM,
        marker: Marker::Tlm,
        states: MH,
    },
    MarkerEntry {
        id: MARKER_PLM,
        marker: Marker::Plm,
        states: MH,
    },
    MarkerEntry {
        id: MARKER_PLT,
        marker: Marker::Plt,
        states: TPH,
    },
    MarkerEntry {
        id: MARKER_PPM,
        marker: Marker::Ppm,
        states: MH,
    },
    MarkerEntry {
        id: MARKER_PPT,
        marker: Marker::Ppt,
        states: TPH,
    },
    MarkerEntry {
        id: MARKER_CRG,
        marker: Marker::Crg,
        states: MH,
    },
    MarkerEntry {
        id: MARKER_COM,
        marker: Marker::Com,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_MCT,
        marker: Marker::Mct,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_MCC,
        marker: Marker::Mcc,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_MCO,
        marker: Marker::Mco,
        states: MH.union(TPH),
    },
    MarkerEntry {
        id: MARKER_CBD,
        marker: Marker::Cbd,
        states: MH,
    },
];

/// Looks up a marker id. `None` means the id is unknown and the caller has to
/// resynchronize on the next known marker.
pub fn resolve(id: u16) -> Option<Marker> {
    MARKER_TABLE
        .iter()
        .find(|entry| entry.id == id)
        .map(|entry| entry.marker)
}

impl Marker {
    fn entry(self) -> &'static MarkerEntry {
        &MARKER_TABLE[self as usize]
    }

    pub fn id(self) -> u16 {
        self.entry().id
    }

    /// Decoder states in which this marker is legal.
    pub fn legal_states(self) -> StateSet {
        self.entry().states
    }

    /// Delimiting markers SOC, SOD and EOC carry no length field.
    pub fn has_length(self) -> bool {
        !matches!(self, Marker::Soc | Marker::Sod | Marker::Eoc)
    }

    pub fn name(self) -> &'static str {
        match self {
            Marker::Soc => "SOC",
            Marker::Siz => "SIZ",
            Marker::Cod => "COD",
            Marker::Coc => "COC",
            Marker::Rgn => "RGN",
            Marker::Qcd => "QCD",
            Marker::Qcc => "QCC",
            Marker::Poc => "POC",
            Marker::Tlm => "TLM",
            Marker::Plm => "PLM",
            Marker::Plt => "PLT",
            Marker::Ppm => "PPM",
            Marker::Ppt => "PPT",
            Marker::Crg => "CRG",
            Marker::Com => "COM",
            Marker::Sot => "SOT",
            Marker::Sod => "SOD",
            Marker::Eoc => "EOC",
            Marker::Mct => "MCT",
            Marker::Mcc => "MCC",
            Marker::Mco => "MCO",
            Marker::Cbd => "CBD",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(resolve(0xFF51), Some(Marker::Siz));
        assert_eq!(resolve(0xFFD9), Some(Marker::Eoc));
        assert_eq!(resolve(0xFF30), None);
        assert_eq!(resolve(0x1234), None);

        for entry in MARKER_TABLE.iter() {
            assert_eq!(entry.marker.id(), entry.id);
            assert_eq!(resolve(entry.id), Some(entry.marker));
        }
    }

    #[test]
    fn test_legal_states() {
        assert!(Marker::Siz
            .legal_states()
            .contains(StateSet::MAIN_HEADER_SIZ));
        assert!(!Marker::Siz.legal_states().contains(StateSet::MAIN_HEADER));
        assert!(Marker::Cod.legal_states().contains(StateSet::TILE_PART_HEADER));
        assert!(!Marker::Ppm.legal_states().contains(StateSet::TILE_PART_HEADER));
        assert!(!Marker::Ppt.legal_states().contains(StateSet::MAIN_HEADER));
        assert!(Marker::Sot.legal_states().contains(StateSet::TILE_PART_SOT));
        assert!(!Marker::Eoc.legal_states().contains(StateSet::MAIN_HEADER));
    }

    #[test]
    fn test_has_length() {
        assert!(!Marker::Soc.has_length());
        assert!(!Marker::Sod.has_length());
        assert!(!Marker::Eoc.has_length());
        assert!(Marker::Sot.has_length());
        assert!(Marker::Siz.has_length());
    }
}
