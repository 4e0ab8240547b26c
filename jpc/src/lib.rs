//! JPEG 2000 codestream (ITU-T T.800 | ISO/IEC 15444-1 Annex A) reader and
//! writer.
//!
//! The crate parses and emits the marker structure of a codestream: main
//! header, tile-part headers, tile-part bodies and EOC. It maintains the
//! coding and quantization parameters the tile-coding engine needs; the engine
//! itself (packets, entropy coding, wavelet and component transforms) is
//! plugged in through [`TileDecoder`] and [`TileEncoder`].

use std::io;

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod image;
pub mod index;
pub mod marker;
pub mod params;
pub mod procedure;
pub mod segment;
pub mod state;
pub mod stream;

pub use config::{ComponentConfig, DecodeRegion, DecoderConfig, EncoderConfig};
pub use decoder::{Decoder, TileDecoder, TileWindow};
pub use encoder::{Encoder, TileEncoder};
pub use error::{CodestreamError, ErrorKind, Result};
pub use image::{Image, ImageComponent};
pub use index::{CodestreamIndex, MarkerRecord, TileIndex, TilePartRecord};
pub use marker::Marker;
pub use params::{CodingParameters, Scope, TileCodingParameters, TileComponentParameters};
pub use state::DecodeState;
pub use stream::ByteStream;

/// Decodes a whole codestream: reads the main header, every tile-part up to
/// EOC, and hands each buffered tile to `engine`.
///
/// The returned decoder holds the image, the coding parameters and the
/// codestream index.
pub fn decode_jpc<R: io::Read + io::Seek>(
    reader: &mut R,
    config: DecoderConfig,
    engine: &mut dyn TileDecoder,
) -> Result<Decoder> {
    let mut decoder = Decoder::new(config);
    decoder.read_header(reader)?;
    decoder.decode_all_tiles(reader, engine)?;
    Ok(decoder)
}

/// Encodes every tile of the configured image with `engine` and returns the
/// codestream bytes.
pub fn encode_jpc(config: EncoderConfig, engine: &mut dyn TileEncoder) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(config);
    encoder.start()?;
    encoder.write_all_tiles(engine)?;
    encoder.finish()
}
