use log::{debug, warn};

use super::{expect_end, read_component_index, scoped_tcp};
use crate::error::{CodestreamError, Result};
use crate::marker::Marker;
use crate::params::{
    CodeBlockStyle, CodingParameters, CodingStyle, ComponentTransform, ProgressionOrder, Scope,
    TileCodingParameters, TileComponentParameters, WaveletFilter, DEFAULT_PRECINCT_EXPONENT,
    MAX_RESOLUTIONS,
};
use crate::stream::{ByteWriter, SegmentReader};

/// Scod, SGcod (progression order, layers, MCT) and the fixed SPcod fields.
const COD_MIN_LENGTH: usize = 5;

/// Fixed part of SPcod/SPcoc: levels, code-block width, height, style and
/// transformation.
const SPCOD_MIN_LENGTH: usize = 5;

// A.6.1
//
// Coding style default (COD)
//
// Function: Describes the coding style, number of decomposition levels, and
// layering that is the default used for compressing all components of an
// image (if in the main header) or a tile (if in the tile-part header). The
// parameter values can be overridden for an individual component by a COC
// marker segment in either the main or tile-part header.
pub fn read_cod(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Cod;
    if payload.len() < COD_MIN_LENGTH {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let reduce = cp.reduce;
    let max_layers = cp.max_layers;
    let tcp = scoped_tcp(cp, scope, marker)?;
    if tcp.cod_seen {
        return Err(CodestreamError::semantic(
            marker,
            "more than one COD marker segment in the same header",
        ));
    }
    tcp.cod_seen = true;

    let mut reader = SegmentReader::new(marker, payload);

    // Scod
    let scod = reader.read_u8()?;
    let coding_style = CodingStyle::from_bits(scod).ok_or_else(|| {
        CodestreamError::malformed(marker, format!("unknown Scod value 0x{:02X}", scod))
    })?;

    // SGcod
    let value = reader.read_u8()?;
    let progression_order = ProgressionOrder::from_u8(value).ok_or_else(|| {
        CodestreamError::semantic(marker, format!("unknown progression order {}", value))
    })?;
    let num_layers = reader.read_u16()? as u32;
    if num_layers == 0 {
        return Err(CodestreamError::semantic(marker, "number of layers is 0"));
    }
    let mct = match reader.read_u8()? {
        0 => ComponentTransform::None,
        1 => ComponentTransform::Standard,
        value => {
            return Err(CodestreamError::semantic(
                marker,
                format!("unknown multiple component transformation {}", value),
            ))
        }
    };
    if mct == ComponentTransform::Standard && tcp.components.len() < 3 {
        warn!(
            "COD enables the component transformation on {} components",
            tcp.components.len()
        );
    }

    tcp.coding_style = coding_style;
    tcp.progression_order = progression_order;
    tcp.num_layers = num_layers;
    tcp.layers_to_decode = if max_layers > 0 {
        num_layers.min(max_layers)
    } else {
        num_layers
    };
    tcp.mct = mct;

    for tccp in tcp.components.iter_mut() {
        tccp.coding_style = coding_style & CodingStyle::PRECINCTS;
    }
    let first = tcp
        .components
        .first_mut()
        .ok_or_else(|| CodestreamError::semantic(marker, "image has no components"))?;
    read_coding_style_parameters(&mut reader, marker, first, reduce)?;
    expect_end(&reader, marker)?;

    tcp.broadcast_coding_style();
    debug!(
        "COD {:?}: {:?}, {} layers, {} resolutions",
        scope, progression_order, num_layers, tcp.components[0].num_resolutions
    );
    Ok(())
}

// A.6.2
//
// Coding style component (COC)
//
// Function: Describes the coding style and number of decomposition levels
// used for compressing a particular component.
pub fn read_coc(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Coc;
    if payload.len() < cp.component_index_width() + 1 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let reduce = cp.reduce;
    let mut reader = SegmentReader::new(marker, payload);
    let component = read_component_index(&mut reader, marker, cp)?;

    // Scoc
    let scoc = reader.read_u8()?;
    let tcp = scoped_tcp(cp, scope, marker)?;
    let tccp = &mut tcp.components[component];
    tccp.coding_style = CodingStyle::from_bits_truncate(scoc) & CodingStyle::PRECINCTS;

    read_coding_style_parameters(&mut reader, marker, tccp, reduce)?;
    expect_end(&reader, marker)?;
    debug!(
        "COC {:?}: component {}, {} resolutions",
        scope, component, tccp.num_resolutions
    );
    Ok(())
}

// A.6.1, A.6.2
//
// SPcod and SPcoc: number of decomposition levels, code-block width and
// height, code-block style, wavelet transformation and, with user defined
// precincts, one precinct size per resolution level.
fn read_coding_style_parameters(
    reader: &mut SegmentReader<'_>,
    marker: Marker,
    tccp: &mut TileComponentParameters,
    reduce: u32,
) -> Result<()> {
    if reader.remaining() < SPCOD_MIN_LENGTH {
        return Err(CodestreamError::malformed(
            marker,
            format!("{} bytes left for SPcod", reader.remaining()),
        ));
    }

    let num_resolutions = reader.read_u8()? as u32 + 1;
    if num_resolutions as usize > MAX_RESOLUTIONS {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "{} resolutions, at most {} supported",
                num_resolutions, MAX_RESOLUTIONS
            ),
        ));
    }
    if reduce >= num_resolutions {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "cannot remove {} resolutions from a component with {}",
                reduce, num_resolutions
            ),
        ));
    }

    let code_block_width = reader.read_u8()? as u32 + 2;
    let code_block_height = reader.read_u8()? as u32 + 2;
    if code_block_width > 10 || code_block_height > 10 || code_block_width + code_block_height > 12
    {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "invalid code-block size 2^{}x2^{}",
                code_block_width, code_block_height
            ),
        ));
    }

    let value = reader.read_u8()?;
    let code_block_style = CodeBlockStyle::from_bits(value).ok_or_else(|| {
        CodestreamError::semantic(marker, format!("reserved code-block style 0x{:02X}", value))
    })?;

    let value = reader.read_u8()?;
    let filter = WaveletFilter::from_u8(value).ok_or_else(|| {
        CodestreamError::semantic(marker, format!("unknown transformation {}", value))
    })?;

    tccp.num_resolutions = num_resolutions;
    tccp.code_block_width = code_block_width;
    tccp.code_block_height = code_block_height;
    tccp.code_block_style = code_block_style;
    tccp.filter = filter;

    if tccp.coding_style.contains(CodingStyle::PRECINCTS) {
        if reader.remaining() < num_resolutions as usize {
            return Err(CodestreamError::malformed(
                marker,
                format!(
                    "{} precinct sizes for {} resolutions",
                    reader.remaining(),
                    num_resolutions
                ),
            ));
        }
        for resolution in 0..num_resolutions as usize {
            // xxxx 0000 to xxxx 1111, 4 LSBs are the PPx exponent
            // 0000 xxxx to 1111 xxxx, 4 MSBs are the PPy exponent
            let value = reader.read_u8()?;
            let width = value & 0x0F;
            let height = value >> 4;
            if resolution > 0 && (width == 0 || height == 0) {
                return Err(CodestreamError::semantic(
                    marker,
                    format!("invalid precinct size at resolution {}", resolution),
                ));
            }
            tccp.precinct_width[resolution] = width;
            tccp.precinct_height[resolution] = height;
        }
    } else {
        tccp.precinct_width = [DEFAULT_PRECINCT_EXPONENT; MAX_RESOLUTIONS];
        tccp.precinct_height = [DEFAULT_PRECINCT_EXPONENT; MAX_RESOLUTIONS];
    }
    Ok(())
}

pub fn write_cod(writer: &mut ByteWriter, tcp: &TileCodingParameters) -> Result<()> {
    let tccp = tcp.components.first().ok_or(CodestreamError::InvalidOperation(
        "COD needs at least one component",
    ))?;
    let position = writer.begin_segment(Marker::Cod);
    writer.write_u8(tcp.coding_style.bits());
    writer.write_u8(tcp.progression_order.as_u8());
    writer.write_u16(tcp.num_layers as u16);
    writer.write_u8(match tcp.mct {
        ComponentTransform::None => 0,
        ComponentTransform::Standard => 1,
        ComponentTransform::Custom => 2,
    });
    write_coding_style_parameters(writer, tccp);
    writer.end_segment(Marker::Cod, position)
}

pub fn write_coc(
    writer: &mut ByteWriter,
    tcp: &TileCodingParameters,
    component: usize,
    index_width: usize,
) -> Result<()> {
    let tccp = tcp
        .components
        .get(component)
        .ok_or(CodestreamError::InvalidOperation("COC component out of range"))?;
    let position = writer.begin_segment(Marker::Coc);
    writer.write_uint(component as u32, index_width);
    writer.write_u8(tccp.coding_style.bits());
    write_coding_style_parameters(writer, tccp);
    writer.end_segment(Marker::Coc, position)
}

fn write_coding_style_parameters(writer: &mut ByteWriter, tccp: &TileComponentParameters) {
    writer.write_u8((tccp.num_resolutions - 1) as u8);
    writer.write_u8((tccp.code_block_width - 2) as u8);
    writer.write_u8((tccp.code_block_height - 2) as u8);
    writer.write_u8(tccp.code_block_style.bits());
    writer.write_u8(tccp.filter.as_u8());
    if tccp.coding_style.contains(CodingStyle::PRECINCTS) {
        for resolution in 0..tccp.num_resolutions as usize {
            writer.write_u8(
                (tccp.precinct_height[resolution] << 4) | (tccp.precinct_width[resolution] & 0x0F),
            );
        }
    }
}
