use log::{debug, warn};

use super::{expect_end, read_component_index, scoped_tcp};
use crate::error::{CodestreamError, Result};
use crate::marker::Marker;
use crate::params::{
    CodingParameters, QuantizationStyle, Scope, StepSize, TileCodingParameters,
    TileComponentParameters, MAX_BANDS,
};
use crate::stream::{ByteWriter, SegmentReader};

/// Largest step size exponent, the 5 bits of Sqcd/Sqcc `epsilon`.
pub const MAX_EXPONENT: u32 = 31;

// A.6.4
//
// Quantization default (QCD)
//
// Function: Describes the quantization default used for compressing all
// components not defined by a QCC marker segment. The parameter values can be
// overridden for an individual component by a QCC marker segment in either the
// main or tile-part header.
pub fn read_qcd(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Qcd;
    let tcp = scoped_tcp(cp, scope, marker)?;
    let mut reader = SegmentReader::new(marker, payload);
    let first = tcp
        .components
        .first_mut()
        .ok_or_else(|| CodestreamError::semantic(marker, "image has no components"))?;
    read_quantization_parameters(&mut reader, marker, first)?;
    expect_end(&reader, marker)?;

    tcp.broadcast_quantization();
    debug!(
        "QCD {:?}: {:?}, {} guard bits",
        scope, tcp.components[0].quantization_style, tcp.components[0].guard_bits
    );
    Ok(())
}

// A.6.5
//
// Quantization component (QCC)
//
// Function: Describes the quantization used for compressing a particular
// component.
pub fn read_qcc(payload: &[u8], cp: &mut CodingParameters, scope: Scope) -> Result<()> {
    let marker = Marker::Qcc;
    if payload.len() < cp.component_index_width() {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let mut reader = SegmentReader::new(marker, payload);
    let component = read_component_index(&mut reader, marker, cp)?;
    let tcp = scoped_tcp(cp, scope, marker)?;
    read_quantization_parameters(&mut reader, marker, &mut tcp.components[component])?;
    expect_end(&reader, marker)?;
    debug!("QCC {:?}: component {}", scope, component);
    Ok(())
}

// Sqcd/Sqcc followed by SPqcd/SPqcc, one value per sub-band:
//
// No quantization: 8 bits, exponent in the 5 MSBs.
// Scalar quantization: 16 bits, exponent in the 5 MSBs, mantissa in the
// 11 LSBs. Scalar derived signals the NLLL sub-band only.
fn read_quantization_parameters(
    reader: &mut SegmentReader<'_>,
    marker: Marker,
    tccp: &mut TileComponentParameters,
) -> Result<()> {
    let value = reader.read_u8()?;
    let style = QuantizationStyle::from_u8(value & 0x1F).ok_or_else(|| {
        CodestreamError::semantic(
            marker,
            format!("unknown quantization style {}", value & 0x1F),
        )
    })?;
    // 000x xxxx to 111x xxxx, Number of guard bits: 0 to 7
    let guard_bits = value >> 5;

    let num_bands = match style {
        QuantizationStyle::ScalarDerived => 1,
        QuantizationStyle::None => reader.remaining(),
        QuantizationStyle::ScalarExpounded => reader.remaining() / 2,
    };
    if num_bands > MAX_BANDS {
        warn!(
            "{} signals {} sub-bands, only the first {} are kept",
            marker, num_bands, MAX_BANDS
        );
    }

    tccp.quantization_style = style;
    tccp.guard_bits = guard_bits;
    for band in 0..num_bands {
        let step_size = match style {
            QuantizationStyle::None => StepSize {
                exponent: reader.read_u8()? >> 3,
                mantissa: 0,
            },
            _ => {
                let value = reader.read_u16()?;
                StepSize {
                    exponent: (value >> 11) as u8,
                    mantissa: value & 0x07FF,
                }
            }
        };
        if band < MAX_BANDS {
            tccp.step_sizes[band] = step_size;
        }
    }

    if style == QuantizationStyle::ScalarDerived {
        let StepSize { exponent, mantissa } = tccp.step_sizes[0];
        for band in 1..MAX_BANDS {
            let derived = exponent as i32 - ((band - 1) / 3) as i32;
            tccp.step_sizes[band] = StepSize {
                exponent: derived.max(0) as u8,
                mantissa,
            };
        }
    }
    Ok(())
}

pub fn write_qcd(writer: &mut ByteWriter, tcp: &TileCodingParameters) -> Result<()> {
    let tccp = tcp.components.first().ok_or(CodestreamError::InvalidOperation(
        "QCD needs at least one component",
    ))?;
    let position = writer.begin_segment(Marker::Qcd);
    write_quantization_parameters(writer, tccp);
    writer.end_segment(Marker::Qcd, position)
}

pub fn write_qcc(
    writer: &mut ByteWriter,
    tcp: &TileCodingParameters,
    component: usize,
    index_width: usize,
) -> Result<()> {
    let tccp = tcp
        .components
        .get(component)
        .ok_or(CodestreamError::InvalidOperation("QCC component out of range"))?;
    let position = writer.begin_segment(Marker::Qcc);
    writer.write_uint(component as u32, index_width);
    write_quantization_parameters(writer, tccp);
    writer.end_segment(Marker::Qcc, position)
}

fn write_quantization_parameters(writer: &mut ByteWriter, tccp: &TileComponentParameters) {
    writer.write_u8((tccp.guard_bits << 5) | tccp.quantization_style.as_u8());
    let num_bands = match tccp.quantization_style {
        QuantizationStyle::ScalarDerived => 1,
        _ => tccp.num_bands(),
    };
    for step_size in &tccp.step_sizes[..num_bands] {
        match tccp.quantization_style {
            QuantizationStyle::None => writer.write_u8(step_size.exponent << 3),
            _ => writer.write_u16(((step_size.exponent as u16) << 11) | step_size.mantissa),
        }
    }
}

/// Step sizes for reversible coding: every band gets the component precision
/// plus the band's gain as exponent (LL 0, HL and LH 1, HH 2).
pub fn reversible_step_sizes(tccp: &mut TileComponentParameters, precision: u32) {
    for band in 0..tccp.num_bands() {
        let gain = match band {
            0 => 0,
            _ => match (band - 1) % 3 {
                0 | 1 => 1,
                _ => 2,
            },
        };
        tccp.step_sizes[band] = StepSize {
            exponent: (precision + gain) as u8,
            mantissa: 0,
        };
    }
}
