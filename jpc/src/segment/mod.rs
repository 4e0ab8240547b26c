//! Marker segment codecs.
//!
//! Readers receive the payload that follows the length field (`Lxxx - 2`
//! bytes) and update the coding parameters in place. Writers append a complete
//! marker segment to a [`ByteWriter`](crate::stream::ByteWriter).

pub mod cod;
pub mod com;
pub mod mct;
pub mod packed;
pub mod poc;
pub mod pointer;
pub mod qcd;
pub mod rgn;
pub mod siz;
pub mod sot;

use crate::error::{CodestreamError, Result};
use crate::marker::Marker;
use crate::params::{CodingParameters, Scope, TileCodingParameters};
use crate::stream::SegmentReader;

/// Reads a Cxxx component index and checks it against the component count.
pub(crate) fn read_component_index(
    reader: &mut SegmentReader<'_>,
    marker: Marker,
    cp: &CodingParameters,
) -> Result<usize> {
    let index = reader.read_uint(cp.component_index_width())? as usize;
    if index >= cp.no_components() {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "component {} out of range, image has {} components",
                index,
                cp.no_components()
            ),
        ));
    }
    Ok(index)
}

/// Fails unless the whole payload has been consumed.
pub(crate) fn expect_end(reader: &SegmentReader<'_>, marker: Marker) -> Result<()> {
    match reader.remaining() {
        0 => Ok(()),
        remaining => Err(CodestreamError::malformed(
            marker,
            format!("{} trailing bytes", remaining),
        )),
    }
}

pub(crate) fn scoped_tcp(
    cp: &mut CodingParameters,
    scope: Scope,
    marker: Marker,
) -> Result<&mut TileCodingParameters> {
    cp.tcp_mut(scope)
        .ok_or_else(|| CodestreamError::semantic(marker, format!("no parameters for {:?}", scope)))
}
