use log::{debug, info};

use crate::error::{CodestreamError, Result};
use crate::image::{ceil_div, Image, ImageComponent};
use crate::marker::Marker;
use crate::params::{CodingParameters, TileCodingParameters};
use crate::stream::{ByteWriter, SegmentReader};

/// Fixed part of the SIZ payload: Rsiz, eight 32 bit sizes and Csiz.
const SIZ_FIXED_LENGTH: usize = 36;

/// Csiz upper bound.
pub const MAX_COMPONENTS: usize = 16384;

/// Highest precision Ssiz can signal.
pub const MAX_PRECISION: u32 = 38;

/// Highest tile count the 16 bit Isot field can address.
pub const MAX_TILES: u64 = 65535;

// A.5.1
//
// Image and tile size (SIZ)
//
// Function: Provides information about the uncompressed image such as the
// width and height of the reference grid, the width and height of the tiles,
// the number of components, component bit depth, and the separation of
// component samples with respect to the reference grid.
pub fn read_siz(payload: &[u8], cp: &mut CodingParameters, image: &mut Image) -> Result<()> {
    let marker = Marker::Siz;
    if payload.len() < SIZ_FIXED_LENGTH || (payload.len() - SIZ_FIXED_LENGTH) % 3 != 0 {
        return Err(CodestreamError::InvalidLength {
            marker,
            length: (payload.len() + 2) as u16,
        });
    }
    let implied_components = (payload.len() - SIZ_FIXED_LENGTH) / 3;

    let mut reader = SegmentReader::new(marker, payload);
    let rsiz = reader.read_u16()?;
    let x1 = reader.read_u32()?;
    let y1 = reader.read_u32()?;
    let x0 = reader.read_u32()?;
    let y0 = reader.read_u32()?;
    let tile_width = reader.read_u32()?;
    let tile_height = reader.read_u32()?;
    let tile_x0 = reader.read_u32()?;
    let tile_y0 = reader.read_u32()?;
    let no_components = reader.read_u16()? as usize;

    if no_components != implied_components {
        return Err(CodestreamError::malformed(
            marker,
            format!(
                "Csiz is {} but the segment carries {} components",
                no_components, implied_components
            ),
        ));
    }
    if no_components == 0 || no_components > MAX_COMPONENTS {
        return Err(CodestreamError::semantic(
            marker,
            format!("{} components, expected 1 to {}", no_components, MAX_COMPONENTS),
        ));
    }
    if x0 >= x1 || y0 >= y1 {
        return Err(CodestreamError::semantic(
            marker,
            format!("empty image area ({}, {}) to ({}, {})", x0, y0, x1, y1),
        ));
    }
    if tile_width == 0 || tile_height == 0 {
        return Err(CodestreamError::semantic(
            marker,
            format!("invalid tile size {}x{}", tile_width, tile_height),
        ));
    }
    // XTOsiz <= XOsiz, YTOsiz <= YOsiz
    if tile_x0 > x0 || tile_y0 > y0 {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "tile grid offset overflow: XOsiz = {}, YOsiz = {}, XTOsiz = {}, YTOsiz = {}",
                x0, y0, tile_x0, tile_y0
            ),
        ));
    }
    // XTsiz + XTOsiz > XOsiz, YTsiz + YTOsiz > YOsiz
    if tile_x0 as u64 + tile_width as u64 <= x0 as u64
        || tile_y0 as u64 + tile_height as u64 <= y0 as u64
    {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "tile size overflow: first tile {}x{} at ({}, {}) misses the image area",
                tile_width, tile_height, tile_x0, tile_y0
            ),
        ));
    }

    let mut components = Vec::new();
    components
        .try_reserve_exact(no_components)
        .map_err(CodestreamError::exhausted("image components"))?;
    for i in 0..no_components {
        // Ssiz: x000 0000 to x010 0101 is the precision minus one, 1xxx xxxx
        // signed values.
        let ssiz = reader.read_u8()?;
        let dx = reader.read_u8()? as u32;
        let dy = reader.read_u8()? as u32;
        let precision = (ssiz & 0x7F) as u32 + 1;
        let signed = ssiz & 0x80 != 0;
        if precision > MAX_PRECISION {
            return Err(CodestreamError::semantic(
                marker,
                format!(
                    "component {} precision {} exceeds {}",
                    i, precision, MAX_PRECISION
                ),
            ));
        }
        if dx == 0 || dy == 0 {
            return Err(CodestreamError::semantic(
                marker,
                format!("component {} has sub-sampling {}x{}", i, dx, dy),
            ));
        }
        components.push(ImageComponent {
            dx,
            dy,
            precision,
            signed,
            factor: cp.reduce,
            ..Default::default()
        });
    }

    let tiles_x = ceil_div(x1 - tile_x0, tile_width);
    let tiles_y = ceil_div(y1 - tile_y0, tile_height);
    if tiles_x as u64 * tiles_y as u64 > MAX_TILES {
        return Err(CodestreamError::semantic(
            marker,
            format!(
                "{}x{} tiles exceed the tile index space",
                tiles_x, tiles_y
            ),
        ));
    }

    let mut default_tcp = TileCodingParameters::new(no_components);
    for (tccp, component) in default_tcp.components.iter_mut().zip(&components) {
        tccp.dc_level_shift = dc_level_shift(component);
    }

    let num_tiles = (tiles_x * tiles_y) as usize;
    let mut tcps = Vec::new();
    tcps.try_reserve_exact(num_tiles)
        .map_err(CodestreamError::exhausted("tile coding parameters"))?;
    tcps.resize_with(num_tiles, TileCodingParameters::default);

    cp.rsiz = rsiz;
    cp.tile_x0 = tile_x0;
    cp.tile_y0 = tile_y0;
    cp.tile_width = tile_width;
    cp.tile_height = tile_height;
    cp.tiles_x = tiles_x;
    cp.tiles_y = tiles_y;
    cp.default_tcp = default_tcp;
    cp.tcps = tcps;

    *image = Image {
        x0,
        y0,
        x1,
        y1,
        components,
    };
    image.update_component_geometry();

    info!(
        "image {}x{} at ({}, {}), {} components, {}x{} tiles of {}x{}",
        x1 - x0,
        y1 - y0,
        x0,
        y0,
        no_components,
        tiles_x,
        tiles_y,
        tile_width,
        tile_height
    );
    debug!("Rsiz 0x{:04X}", rsiz);
    Ok(())
}

/// DC level shift applied to unsigned components.
pub(crate) fn dc_level_shift(component: &ImageComponent) -> i64 {
    if component.signed {
        0
    } else {
        1i64 << (component.precision - 1)
    }
}

pub fn write_siz(writer: &mut ByteWriter, cp: &CodingParameters, image: &Image) -> Result<()> {
    let position = writer.begin_segment(Marker::Siz);
    writer.write_u16(cp.rsiz);
    writer.write_u32(image.x1);
    writer.write_u32(image.y1);
    writer.write_u32(image.x0);
    writer.write_u32(image.y0);
    writer.write_u32(cp.tile_width);
    writer.write_u32(cp.tile_height);
    writer.write_u32(cp.tile_x0);
    writer.write_u32(cp.tile_y0);
    writer.write_u16(image.no_components() as u16);
    for component in &image.components {
        let sign = if component.signed { 0x80 } else { 0 };
        writer.write_u8(sign | (component.precision - 1) as u8);
        writer.write_u8(component.dx as u8);
        writer.write_u8(component.dy as u8);
    }
    writer.end_segment(Marker::Siz, position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn siz_payload(components: &[(u8, u8, u8)]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0u16.to_be_bytes());
        for value in [100u32, 80, 0, 0, 64, 64, 0, 0] {
            payload.extend_from_slice(&value.to_be_bytes());
        }
        payload.extend_from_slice(&(components.len() as u16).to_be_bytes());
        for (ssiz, dx, dy) in components {
            payload.extend_from_slice(&[*ssiz, *dx, *dy]);
        }
        payload
    }

    #[test]
    fn test_read_siz() {
        let payload = siz_payload(&[(7, 1, 1), (0x87, 2, 2)]);
        let mut cp = CodingParameters::default();
        let mut image = Image::default();
        read_siz(&payload, &mut cp, &mut image).unwrap();

        assert_eq!(cp.tiles_x, 2);
        assert_eq!(cp.tiles_y, 2);
        assert_eq!(cp.tcps.len(), 4);
        assert_eq!(cp.no_components(), 2);
        assert_eq!(cp.default_tcp.components[0].dc_level_shift, 128);
        assert_eq!(cp.default_tcp.components[1].dc_level_shift, 0);
        assert_eq!(image.components[1].precision, 8);
        assert!(image.components[1].signed);
        assert_eq!(image.components[1].width, 50);
    }

    #[test]
    fn test_read_siz_component_mismatch() {
        let mut payload = siz_payload(&[(7, 1, 1), (7, 1, 1)]);
        // Csiz claims 3, bytes for 2
        payload[34..36].copy_from_slice(&3u16.to_be_bytes());
        let err = read_siz(&payload, &mut CodingParameters::default(), &mut Image::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_read_siz_bad_length() {
        let mut payload = siz_payload(&[(7, 1, 1)]);
        payload.pop();
        let err = read_siz(&payload, &mut CodingParameters::default(), &mut Image::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_read_siz_rejects_zero_subsampling() {
        let payload = siz_payload(&[(7, 0, 1)]);
        let err = read_siz(&payload, &mut CodingParameters::default(), &mut Image::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn test_write_siz() {
        let payload = siz_payload(&[(7, 1, 1), (0x8B, 1, 1), (7, 2, 1)]);
        let mut cp = CodingParameters::default();
        let mut image = Image::default();
        read_siz(&payload, &mut cp, &mut image).unwrap();

        let mut writer = ByteWriter::new();
        write_siz(&mut writer, &cp, &image).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(&bytes[0..2], &[0xFF, 0x51]);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]) as usize, payload.len() + 2);
        assert_eq!(&bytes[4..], &payload[..]);
    }
}
