//! ISO/IEC 15444-2 multiple component transformation marker segments.

use log::{debug, warn};

use super::{expect_end, scoped_tcp, siz::dc_level_shift};
use crate::error::{CodestreamError, Result};
use crate::image::Image;
use crate::marker::Marker;
use crate::params::{
    CodingParameters, ComponentTransform, MccRecord, MctArrayType, MctElementType, MctRecord,
    Scope,
};
use crate::stream::SegmentReader;

/// Xmcci: array based decorrelation.
const MCC_ARRAY_DECORRELATION: u8 = 1;

// A.3.7
//
// Multiple component transformation definition (MCT)
//
// Function: Describes the array used by a multiple component transformation.
// Only single segment arrays (Zmct = 0, Ymct = 0) are kept.
pub fn read_mct(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Mct;
    if payload.len() < 2 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let mut reader = SegmentReader::new(marker, payload);

    // Zmct
    if reader.read_u16()? != 0 {
        warn!("MCT arrays split over several marker segments are not supported, skipped");
        return Ok(());
    }
    if payload.len() <= 6 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }

    // Imct: index in the 8 LSBs, array type and element type above
    let value = reader.read_u16()?;
    let index = (value & 0xFF) as u8;
    let array_type = MctArrayType::from_u8(((value >> 8) & 0b11) as u8).ok_or_else(|| {
        CodestreamError::semantic(marker, format!("reserved array type in Imct 0x{:04X}", value))
    })?;
    let element_type = MctElementType::from_u8(((value >> 10) & 0b11) as u8);

    // Ymct
    if reader.read_u16()? != 0 {
        warn!("MCT arrays continued in later marker segments are not supported, skipped");
        return Ok(());
    }
    let data = reader.tail();
    if data.len() % element_type.size() != 0 {
        return Err(CodestreamError::malformed(
            marker,
            format!(
                "{} bytes do not hold whole {:?} elements",
                data.len(),
                element_type
            ),
        ));
    }

    let mut owned = Vec::new();
    owned
        .try_reserve_exact(data.len())
        .map_err(CodestreamError::exhausted("MCT array"))?;
    owned.extend_from_slice(data);
    let record = MctRecord {
        index,
        array_type,
        element_type,
        data: owned,
    };

    let tcp = scoped_tcp(cp, scope, marker)?;
    match tcp.mct_records.iter_mut().find(|r| r.index == index) {
        Some(existing) => *existing = record,
        None => {
            tcp.mct_records
                .try_reserve(1)
                .map_err(CodestreamError::exhausted("MCT records"))?;
            tcp.mct_records.push(record);
        }
    }
    debug!("MCT {:?}: array {} ({:?}, {:?})", scope, index, array_type, element_type);
    Ok(())
}

// A.3.8
//
// Multiple component collection (MCC)
//
// Function: Describes how components are grouped and which MCT arrays
// transform them. Only one array based decorrelation collection without
// component reordering is kept.
pub fn read_mcc(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Mcc;
    if payload.len() < 2 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let mut reader = SegmentReader::new(marker, payload);

    // Zmcc
    if reader.read_u16()? != 0 {
        warn!("MCC collections split over several marker segments are not supported, skipped");
        return Ok(());
    }
    if payload.len() < 7 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    // Imcc
    let index = reader.read_u8()?;
    // Ymcc
    if reader.read_u16()? != 0 {
        warn!("MCC collections continued in later marker segments are not supported, skipped");
        return Ok(());
    }
    // Qmcc
    let collections = reader.read_u16()?;
    if collections > 1 {
        warn!("MCC with {} collections is not supported, skipped", collections);
        return Ok(());
    }

    let tcp = scoped_tcp(cp, scope, marker)?;
    let mut record = MccRecord {
        index,
        components: Vec::new(),
        decorrelation: None,
        offset: None,
        irreversible: false,
    };
    for _ in 0..collections {
        // Xmcci
        if reader.read_u8()? != MCC_ARRAY_DECORRELATION {
            warn!("MCC collections other than array decorrelation are not supported, skipped");
            return Ok(());
        }

        // Nmcci and Cmcci^ij: input components, 16 bit indices when bit 15 is set
        let (count, width) = split_component_count(reader.read_u16()?);
        let mut components = Vec::new();
        components
            .try_reserve_exact(count)
            .map_err(CodestreamError::exhausted("MCC components"))?;
        for j in 0..count {
            let component = reader.read_uint(width)?;
            if component as usize != j {
                warn!("MCC collections reordering components are not supported, skipped");
                return Ok(());
            }
            components.push(component as u16);
        }

        // Mmcci and Wmcci^ij: output components
        let (output_count, width) = split_component_count(reader.read_u16()?);
        if output_count != count {
            warn!("MCC collections changing the component count are not supported, skipped");
            return Ok(());
        }
        for j in 0..output_count {
            if reader.read_uint(width)? as usize != j {
                warn!("MCC collections reordering components are not supported, skipped");
                return Ok(());
            }
        }

        // Tmcci: decorrelation index, offset index, bit 16 set for reversible
        let bytes = reader.read_bytes(3)?;
        let value = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        record.irreversible = (value >> 16) & 1 == 0;
        record.decorrelation = find_mct(&tcp.mct_records, (value & 0xFF) as u8, marker)?;
        record.offset = find_mct(&tcp.mct_records, ((value >> 8) & 0xFF) as u8, marker)?;
        record.components = components;
    }
    expect_end(&reader, marker)?;

    match tcp.mcc_records.iter_mut().find(|r| r.index == index) {
        Some(existing) => *existing = record,
        None => {
            tcp.mcc_records
                .try_reserve(1)
                .map_err(CodestreamError::exhausted("MCC records"))?;
            tcp.mcc_records.push(record);
        }
    }
    debug!("MCC {:?}: collection {}", scope, index);
    Ok(())
}

fn split_component_count(value: u16) -> (usize, usize) {
    ((value & 0x7FFF) as usize, 1 + (value >> 15) as usize)
}

/// Position of the MCT array with the given index, index 0 meaning none.
fn find_mct(records: &[MctRecord], index: u8, marker: Marker) -> Result<Option<usize>> {
    if index == 0 {
        return Ok(None);
    }
    records
        .iter()
        .position(|record| record.index == index)
        .map(Some)
        .ok_or_else(|| CodestreamError::semantic(marker, format!("MCT array {} not found", index)))
}

// A.3.9
//
// Multiple component transformation ordering (MCO)
//
// Function: Selects the component collections applied, in order. Only one
// stage is supported.
pub fn read_mco(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Mco;
    if payload.is_empty() {
        return Err(CodestreamError::InvalidLength { marker, length: 2 });
    }
    let mut reader = SegmentReader::new(marker, payload);
    // Nmco
    let stages = reader.read_u8()? as usize;
    if stages > 1 {
        warn!("MCO with {} transformation stages is not supported, skipped", stages);
        return Ok(());
    }
    if payload.len() != stages + 1 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }

    let tcp = scoped_tcp(cp, scope, marker)?;
    for tccp in tcp.components.iter_mut() {
        tccp.dc_level_shift = 0;
    }
    for _ in 0..stages {
        // Imco
        let index = reader.read_u8()?;
        match tcp.mcc_records.iter().position(|record| record.index == index) {
            Some(stage) => {
                tcp.mct_stage = Some(stage);
                tcp.mct = ComponentTransform::Custom;
            }
            None => warn!("MCO selects unknown MCC collection {}", index),
        }
    }
    Ok(())
}

// A.2.3 (ISO/IEC 15444-2)
//
// Component bit depth definition (CBD)
//
// Function: Overrides the bit depth of every component after the
// multiple component transformation.
pub fn read_cbd(payload: &[u8], cp: &mut CodingParameters, image: &mut Image) -> Result<()> {
    let marker = Marker::Cbd;
    let no_components = image.no_components();
    if payload.len() != no_components + 2 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let mut reader = SegmentReader::new(marker, payload);
    // Ncbd
    let count = (reader.read_u16()? & 0x7FFF) as usize;
    if count != no_components {
        return Err(CodestreamError::semantic(
            marker,
            format!("{} bit depths for {} components", count, no_components),
        ));
    }
    for (component, tccp) in image
        .components
        .iter_mut()
        .zip(cp.default_tcp.components.iter_mut())
    {
        // Bcbd^i: same layout as Ssiz
        let value = reader.read_u8()?;
        component.signed = value & 0x80 != 0;
        component.precision = (value & 0x7F) as u32 + 1;
        tccp.dc_level_shift = dc_level_shift(component);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::image::ImageComponent;
    use crate::params::TileCodingParameters;

    fn cp() -> CodingParameters {
        CodingParameters {
            default_tcp: TileCodingParameters::new(3),
            ..Default::default()
        }
    }

    // Zmct 0, Imct: index 1, decorrelation, 16 bit ints, Ymct 0, 2 elements
    const MCT: [u8; 10] = [0, 0, 0x01, 0x01, 0, 0, 0, 1, 0, 2];

    #[test]
    fn test_read_mct() {
        let mut cp = cp();
        read_mct(&MCT, &mut cp, Scope::Default).unwrap();
        let record = &cp.default_tcp.mct_records[0];
        assert_eq!(record.index, 1);
        assert_eq!(record.array_type, MctArrayType::Decorrelation);
        assert_eq!(record.element_type, MctElementType::Int16);
        assert_eq!(record.data, vec![0, 1, 0, 2]);

        // same index replaces
        read_mct(&[0, 0, 0x01, 0x01, 0, 0, 0, 9], &mut cp, Scope::Default).unwrap();
        assert_eq!(cp.default_tcp.mct_records.len(), 1);
        assert_eq!(cp.default_tcp.mct_records[0].data, vec![0, 9]);

        // multi segment arrays are skipped
        read_mct(&[0, 1, 0x02, 0x01, 0, 0, 0, 9], &mut cp, Scope::Default).unwrap();
        assert_eq!(cp.default_tcp.mct_records.len(), 1);

        let err = read_mct(&[0, 0, 0x01, 0x01, 0, 0], &mut cp, Scope::Default).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_read_mcc_and_mco() {
        let mut cp = cp();
        read_mct(&MCT, &mut cp, Scope::Default).unwrap();
        let payload = [
            0, 0, // Zmcc
            7, // Imcc
            0, 0, // Ymcc
            0, 1, // Qmcc
            1, // Xmcc
            0, 3, 0, 1, 2, // Nmcc, Cmcc
            0, 3, 0, 1, 2, // Mmcc, Wmcc
            0x01, 0x00, 0x01, // Tmcc: reversible, no offset, decorrelation 1
        ];
        read_mcc(&payload, &mut cp, Scope::Default).unwrap();
        let record = &cp.default_tcp.mcc_records[0];
        assert_eq!(record.index, 7);
        assert_eq!(record.components, vec![0, 1, 2]);
        assert_eq!(record.decorrelation, Some(0));
        assert_eq!(record.offset, None);
        assert!(!record.irreversible);

        read_mco(&[1, 7], &mut cp, Scope::Default).unwrap();
        assert_eq!(cp.default_tcp.mct_stage, Some(0));
        assert_eq!(cp.default_tcp.mct, ComponentTransform::Custom);

        let err = read_mco(&[1], &mut cp, Scope::Default).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_read_mcc_unknown_array() {
        let mut cp = cp();
        let payload = [0, 0, 7, 0, 0, 0, 1, 1, 0, 1, 0, 0, 1, 0, 0x01, 0x00, 0x05];
        let err = read_mcc(&payload, &mut cp, Scope::Default).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn test_read_cbd() {
        let mut cp = cp();
        let mut image = Image {
            components: vec![ImageComponent::default(); 3],
            ..Default::default()
        };
        read_cbd(&[0, 3, 0x07, 0x8B, 0x0F], &mut cp, &mut image).unwrap();
        assert_eq!(image.components[1].precision, 12);
        assert!(image.components[1].signed);
        assert_eq!(cp.default_tcp.components[2].dc_level_shift, 1 << 15);

        let err = read_cbd(&[0, 2, 0x07, 0x8B, 0x0F], &mut cp, &mut image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        let err = read_cbd(&[0, 3, 0x07], &mut cp, &mut image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }
}
