use log::debug;

use crate::error::Result;
use crate::marker::Marker;
use crate::stream::ByteWriter;

/// Rcom: general use (ISO/IEC 8859-15 (Latin) values).
const REGISTRATION_LATIN: u16 = 1;

// A.9.2
//
// Comment (COM)
//
// Function: Allows unstructured data in the header. The registration value and
// comment bytes are opaque here.
pub fn read_com(payload: &[u8]) -> Result<()> {
    match payload {
        [0x00, 0x01, text @ ..] => debug!("COM: {}", String::from_utf8_lossy(text)),
        _ => debug!("COM: {} bytes", payload.len()),
    }
    Ok(())
}

pub fn write_com(writer: &mut ByteWriter, comment: &str) -> Result<()> {
    let position = writer.begin_segment(Marker::Com);
    writer.write_u16(REGISTRATION_LATIN);
    writer.write_bytes(comment.as_bytes())?;
    writer.end_segment(Marker::Com, position)
}
