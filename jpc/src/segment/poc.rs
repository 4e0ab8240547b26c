use log::debug;

use super::scoped_tcp;
use crate::error::{CodestreamError, Result};
use crate::marker::Marker;
use crate::params::{
    CodingParameters, ProgressionOrder, ProgressionOrderChange, Scope, TileCodingParameters,
    MAX_POCS,
};
use crate::stream::{ByteWriter, SegmentReader};

// A.6.6
//
// Progression order change (POC)
//
// Function: Describes the bounds and progression order for any progression
// order other than default in the codestream. Entries of repeated POC marker
// segments accumulate.
pub fn read_poc(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Poc;
    let width = cp.component_index_width();
    let no_components = cp.no_components() as u32;
    let chunk = 5 + 2 * width;
    if payload.len() % chunk != 0 || payload.len() / chunk == 0 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let count = payload.len() / chunk;

    let tcp = scoped_tcp(cp, scope, marker)?;
    if tcp.pocs.len() + count > MAX_POCS {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "{} progression order changes, at most {} supported",
                tcp.pocs.len() + count,
                MAX_POCS
            ),
        ));
    }
    tcp.pocs
        .try_reserve(count)
        .map_err(CodestreamError::exhausted("progression order changes"))?;

    let mut reader = SegmentReader::new(marker, payload);
    for _ in 0..count {
        let resolution_start = reader.read_u8()? as u32;
        let component_start = reader.read_uint(width)?;
        let layer_end = (reader.read_u16()? as u32).min(tcp.num_layers);
        let resolution_end = reader.read_u8()? as u32;
        let component_end = reader.read_uint(width)?.min(no_components);
        let value = reader.read_u8()?;
        let progression_order = ProgressionOrder::from_u8(value).ok_or_else(|| {
            CodestreamError::semantic(marker, format!("unknown progression order {}", value))
        })?;
        tcp.pocs.push(ProgressionOrderChange {
            resolution_start,
            component_start,
            layer_end,
            resolution_end,
            component_end,
            progression_order,
        });
    }
    debug!("POC {:?}: {} entries in total", scope, tcp.pocs.len());
    Ok(())
}

pub fn write_poc(
    writer: &mut ByteWriter,
    tcp: &TileCodingParameters,
    index_width: usize,
) -> Result<()> {
    let position = writer.begin_segment(Marker::Poc);
    for poc in &tcp.pocs {
        writer.write_u8(poc.resolution_start as u8);
        writer.write_uint(poc.component_start, index_width);
        writer.write_u16(poc.layer_end as u16);
        writer.write_u8(poc.resolution_end as u8);
        writer.write_uint(poc.component_end, index_width);
        writer.write_u8(poc.progression_order.as_u8());
    }
    writer.end_segment(Marker::Poc, position)
}
