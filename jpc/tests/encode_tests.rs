mod common;

use std::io::Cursor;

use common::*;
use jpc::params::{
    CodingStyle, ProgressionOrder, ProgressionOrderChange, QuantizationStyle, WaveletFilter,
};
use jpc::{
    decode_jpc, encode_jpc, ComponentConfig, Decoder, DecoderConfig, Encoder, EncoderConfig,
    ErrorKind,
};

fn config() -> EncoderConfig {
    EncoderConfig {
        x1: 128,
        y1: 128,
        components: vec![ComponentConfig::default(); 3],
        tile_width: 64,
        tile_height: 64,
        num_resolutions: 4,
        ..Default::default()
    }
}

fn decode(bytes: Vec<u8>) -> (Decoder, RecordingDecoder) {
    let mut engine = RecordingDecoder::default();
    let decoder = decode_jpc(&mut Cursor::new(bytes), DecoderConfig::default(), &mut engine)
        .unwrap();
    (decoder, engine)
}

#[test]
fn test_round_trip() {
    let bytes = encode_jpc(config(), &mut PatternEncoder { length: 5 }).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0x4F]);
    assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);

    let (decoder, engine) = decode(bytes);
    let cp = decoder.coding_parameters();
    assert_eq!(cp.tiles_x, 2);
    assert_eq!(cp.tiles_y, 2);
    assert_eq!(cp.tile_width, 64);
    assert_eq!(cp.no_components(), 3);
    for tccp in &cp.default_tcp.components {
        assert_eq!(tccp.num_resolutions, 4);
        assert_eq!(tccp.code_block_width, 6);
        assert_eq!(tccp.filter, WaveletFilter::Reversible53);
        assert_eq!(tccp.quantization_style, QuantizationStyle::None);
        assert_eq!(tccp.step_sizes[0].exponent, 8);
        assert_eq!(tccp.step_sizes[3].exponent, 10);
    }
    assert_eq!(
        engine.tiles,
        (0..4).map(|tile| (tile, vec![tile as u8; 5])).collect::<Vec<_>>()
    );

    let image = decoder.image();
    assert_eq!(image.width(), 128);
    assert_eq!(image.components[1].precision, 8);
}

#[test]
fn test_round_trip_index() {
    let mut config = config();
    config.tlm = true;
    config.comment = Some("jpc".to_string());
    let mut encoder = Encoder::new(config);
    encoder.start().unwrap();
    encoder.write_all_tiles(&mut PatternEncoder { length: 3 }).unwrap();
    let bytes = encoder.finish().unwrap();

    let ids: Vec<u16> = encoder
        .codestream_index()
        .markers
        .iter()
        .map(|marker| marker.id)
        .collect();
    assert_eq!(ids, vec![SOC, SIZ, COD, QCD, COM, 0xFF55, EOC]);

    let (decoder, _) = decode(bytes);
    assert_eq!(decoder.codestream_index(), encoder.codestream_index());
}

#[test]
fn test_component_parameters() {
    let mut config = config();
    config.components[2].precision = 12;
    config.components[2].signed = true;
    config.roi_shifts = vec![(1, 5)];
    let mut encoder = Encoder::new(config);
    encoder.start().unwrap();
    encoder.write_all_tiles(&mut PatternEncoder { length: 1 }).unwrap();
    let bytes = encoder.finish().unwrap();

    let qcc = encoder
        .codestream_index()
        .markers
        .iter()
        .filter(|marker| marker.id == 0xFF5D)
        .count();
    assert_eq!(qcc, 1);

    let (decoder, _) = decode(bytes);
    let components = &decoder.coding_parameters().default_tcp.components;
    assert_eq!(components[0].step_sizes[0].exponent, 8);
    assert_eq!(components[2].step_sizes[0].exponent, 12);
    assert_eq!(components[1].roi_shift, 5);
    assert_eq!(components[0].roi_shift, 0);
    assert_eq!(components[2].dc_level_shift, 0);
    assert!(decoder.image().components[2].signed);
}

#[test]
fn test_coding_style_options() {
    let change = ProgressionOrderChange {
        resolution_start: 0,
        component_start: 0,
        layer_end: 1,
        resolution_end: 4,
        component_end: 3,
        progression_order: ProgressionOrder::Rpcl,
    };
    let mut config = config();
    config.precincts = vec![(7, 7), (6, 5)];
    config.sop = true;
    config.eph = true;
    config.irreversible = true;
    config.mct = true;
    config.progression_order = ProgressionOrder::Rlcp;
    config.pocs = vec![change];
    let bytes = encode_jpc(config, &mut PatternEncoder { length: 2 }).unwrap();

    let (decoder, engine) = decode(bytes);
    assert_eq!(engine.tiles.len(), 4);
    let tcp = &decoder.coding_parameters().default_tcp;
    assert!(tcp.coding_style.contains(CodingStyle::SOP | CodingStyle::EPH));
    assert_eq!(tcp.progression_order, ProgressionOrder::Rlcp);
    assert_eq!(tcp.pocs, vec![change]);
    let tccp = &tcp.components[1];
    assert_eq!(tccp.filter, WaveletFilter::Irreversible97);
    assert_eq!(tccp.quantization_style, QuantizationStyle::ScalarExpounded);
    assert_eq!(tccp.precinct_width[3], 7);
    assert_eq!(tccp.precinct_height[3], 7);
    assert_eq!(tccp.precinct_width[0], 6);
    assert_eq!(tccp.precinct_height[0], 5);
}

#[test]
fn test_single_tile() {
    let mut config = config();
    config.tile_width = 0;
    config.tile_height = 0;
    let bytes = encode_jpc(config, &mut PatternEncoder { length: 8 }).unwrap();
    let (decoder, engine) = decode(bytes);
    assert_eq!(decoder.coding_parameters().num_tiles(), 1);
    assert_eq!(engine.tiles, vec![(0, vec![0; 8])]);
}

#[test]
fn test_invalid_configuration() {
    let mut mct = config();
    mct.components.truncate(1);
    mct.mct = true;

    let mut origin = config();
    origin.tile_x0 = 10;

    let mut resolutions = config();
    resolutions.num_resolutions = 34;

    let mut precincts = config();
    precincts.precincts = vec![(0, 0)];

    for config in [mct, origin, resolutions, precincts] {
        let err = encode_jpc(config, &mut PatternEncoder { length: 1 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    let empty = EncoderConfig::default();
    assert!(encode_jpc(empty, &mut PatternEncoder { length: 1 }).is_err());
}

#[test]
fn test_high_precision_exponents() {
    let mut config = config();
    config.components = vec![ComponentConfig::default()];
    config.components[0].precision = 29;
    config.num_resolutions = 2;
    let bytes = encode_jpc(config.clone(), &mut PatternEncoder { length: 1 }).unwrap();
    let (decoder, _) = decode(bytes);
    let exponents: Vec<u8> = decoder.coding_parameters().default_tcp.components[0].step_sizes[..4]
        .iter()
        .map(|step_size| step_size.exponent)
        .collect();
    assert_eq!(exponents, vec![29, 30, 30, 31]);

    config.components[0].precision = 31;
    let err = encode_jpc(config.clone(), &mut PatternEncoder { length: 1 }).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Semantic);

    // A single resolution has only the LL band, whose gain is 0.
    config.num_resolutions = 1;
    let bytes = encode_jpc(config, &mut PatternEncoder { length: 1 }).unwrap();
    let (decoder, _) = decode(bytes);
    let tccp = &decoder.coding_parameters().default_tcp.components[0];
    assert_eq!(tccp.step_sizes[0].exponent, 31);
}
