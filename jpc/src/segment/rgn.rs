use log::debug;

use super::{read_component_index, scoped_tcp};
use crate::error::{CodestreamError, Result};
use crate::marker::Marker;
use crate::params::{CodingParameters, Scope, TileCodingParameters};
use crate::stream::{ByteWriter, SegmentReader};

/// Srgn: implicit ROI (maximum shift).
const ROI_STYLE_IMPLICIT: u8 = 0;

// A.6.3
//
// Region of interest (RGN)
//
// Function: Signals the presence of an ROI in the codestream.
pub fn read_rgn(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Rgn;
    if payload.len() != cp.component_index_width() + 2 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let mut reader = SegmentReader::new(marker, payload);
    let component = read_component_index(&mut reader, marker, cp)?;
    let style = reader.read_u8()?;
    if style != ROI_STYLE_IMPLICIT {
        return Err(CodestreamError::semantic(
            marker,
            format!("unsupported ROI style {}", style),
        ));
    }
    let shift = reader.read_u8()?;

    let tcp = scoped_tcp(cp, scope, marker)?;
    tcp.components[component].roi_shift = shift;
    debug!("RGN {:?}: component {} shift {}", scope, component, shift);
    Ok(())
}

pub fn write_rgn(
    writer: &mut ByteWriter,
    tcp: &TileCodingParameters,
    component: usize,
    index_width: usize,
) -> Result<()> {
    let tccp = tcp
        .components
        .get(component)
        .ok_or(CodestreamError::InvalidOperation("RGN component out of range"))?;
    let position = writer.begin_segment(Marker::Rgn);
    writer.write_uint(component as u32, index_width);
    writer.write_u8(ROI_STYLE_IMPLICIT);
    writer.write_u8(tccp.roi_shift);
    writer.end_segment(Marker::Rgn, position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_read_rgn() {
        let mut cp = CodingParameters {
            default_tcp: TileCodingParameters::new(2),
            ..Default::default()
        };
        read_rgn(&[1, 0, 7], &mut cp, Scope::Default).unwrap();
        assert_eq!(cp.default_tcp.components[1].roi_shift, 7);
        assert_eq!(cp.default_tcp.components[0].roi_shift, 0);

        let err = read_rgn(&[1, 0, 7, 0], &mut cp, Scope::Default).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
        let err = read_rgn(&[1, 1, 7], &mut cp, Scope::Default).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
        let err = read_rgn(&[2, 0, 7], &mut cp, Scope::Default).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);

        let mut writer = ByteWriter::new();
        write_rgn(&mut writer, &cp.default_tcp, 1, 1).unwrap();
        assert_eq!(writer.into_inner(), vec![0xFF, 0x5E, 0x00, 0x05, 1, 0, 7]);
    }
}
