use clap::{Args, Parser, Subcommand};
use std::error;
use std::error::Error;
use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use jpc::marker;
use jpc::{
    CodingParameters, DecodeRegion, Decoder, DecoderConfig, Image, TileCodingParameters,
    TileDecoder,
};

#[derive(Debug)]
enum JpcInfoError {
    DecodingCodestream { error: String },
    UnsupportedExtension { extension: String },
}

impl error::Error for JpcInfoError {}
impl fmt::Display for JpcInfoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DecodingCodestream { error } => {
                write!(f, "error decoding jpc codestream {}", error)
            }
            Self::UnsupportedExtension { extension } => {
                write!(f, "unsupported extension {}", extension)
            }
        }
    }
}

#[derive(Parser)]
#[command(version, about = "Inspect JPEG 2000 codestreams")]
struct Opts {
    #[command(subcommand)]
    subcommand: SubCommand,
}

#[derive(Subcommand)]
enum SubCommand {
    /// Print the image and coding parameters of the main header
    Header(Decode),

    /// Read every tile-part and print the codestream index
    Index(Decode),
}

#[derive(Args)]
struct Decode {
    /// Path to .jpc, .j2c or .j2k file
    path: String,

    /// Number of highest resolution levels to discard
    #[arg(short, long, default_value_t = 0)]
    reduce: u32,

    /// Maximum number of quality layers to decode, 0 for all
    #[arg(short, long, default_value_t = 0)]
    layers: u32,

    /// Decode area on the reference grid as x0,y0,x1,y1
    #[arg(long, value_parser = parse_region)]
    region: Option<DecodeRegion>,

    /// Fail on tile-part counts exceeded and on a missing EOC
    #[arg(long)]
    strict: bool,
}

impl Decode {
    fn config(&self) -> DecoderConfig {
        DecoderConfig {
            reduce: self.reduce,
            max_layers: self.layers,
            strict: self.strict,
            region: self.region,
            ..Default::default()
        }
    }
}

fn parse_region(value: &str) -> Result<DecodeRegion, String> {
    let values = value
        .split(',')
        .map(|part| part.trim().parse::<u32>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<u32>, String>>()?;
    match values[..] {
        [x0, y0, x1, y1] => Ok(DecodeRegion { x0, y0, x1, y1 }),
        _ => Err(format!("expected x0,y0,x1,y1, got {}", value)),
    }
}

/// Tile-coding engine stand-in: keeps the byte count of every tile.
#[derive(Default)]
struct TileSizes {
    tiles: Vec<(u32, usize)>,
}

impl TileDecoder for TileSizes {
    fn decode_tile(
        &mut self,
        tile: u32,
        _cp: &CodingParameters,
        tcp: &TileCodingParameters,
        _image: &mut Image,
    ) -> jpc::Result<()> {
        self.tiles.push((tile, tcp.data.len()));
        Ok(())
    }
}

fn open(path: &Path) -> Result<BufReader<File>, Box<dyn Error>> {
    let extension = path.extension().and_then(OsStr::to_str).unwrap_or("");
    match extension {
        "jpc" | "j2c" | "j2k" => Ok(BufReader::new(File::open(path)?)),
        _ => Err(JpcInfoError::UnsupportedExtension {
            extension: extension.to_owned(),
        }
        .into()),
    }
}

fn decoding_error(error: jpc::CodestreamError) -> JpcInfoError {
    JpcInfoError::DecodingCodestream {
        error: error.to_string(),
    }
}

fn print_header(image: &Image, cp: &CodingParameters) {
    println!(
        "image: ({}, {}) to ({}, {}), {} components",
        image.x0,
        image.y0,
        image.x1,
        image.y1,
        image.no_components()
    );
    for (i, component) in image.components.iter().enumerate() {
        println!(
            "  component {}: {}x{}, {} bit {}, sub-sampling {}x{}",
            i,
            component.width,
            component.height,
            component.precision,
            if component.signed { "signed" } else { "unsigned" },
            component.dx,
            component.dy
        );
    }
    println!(
        "tiles: {}x{} of {}x{} at ({}, {})",
        cp.tiles_x, cp.tiles_y, cp.tile_width, cp.tile_height, cp.tile_x0, cp.tile_y0
    );
    let tcp = &cp.default_tcp;
    println!(
        "coding style: {:?}, {} layers, {:?}, transform {:?}",
        tcp.progression_order, tcp.num_layers, tcp.coding_style, tcp.mct
    );
    for (i, tccp) in tcp.components.iter().enumerate() {
        println!(
            "  component {}: {} resolutions, code-blocks 2^{}x2^{}, {:?}, {:?}, {} guard bits",
            i,
            tccp.num_resolutions,
            tccp.code_block_width,
            tccp.code_block_height,
            tccp.filter,
            tccp.quantization_style,
            tccp.guard_bits
        );
    }
}

fn marker_name(id: u16) -> String {
    match marker::resolve(id) {
        Some(marker) => marker.to_string(),
        None if id == marker::MARKER_UNKNOWN => "unknown".to_string(),
        None => format!("0x{:04X}", id),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opts: Opts = Opts::parse();

    match opts.subcommand {
        SubCommand::Header(c) => {
            let mut reader = open(Path::new(&c.path))?;
            let mut decoder = Decoder::new(c.config());
            decoder.read_header(&mut reader).map_err(decoding_error)?;
            print_header(decoder.image(), decoder.coding_parameters());
        }
        SubCommand::Index(c) => {
            let mut reader = open(Path::new(&c.path))?;
            let mut decoder = Decoder::new(c.config());
            let mut engine = TileSizes::default();
            decoder.read_header(&mut reader).map_err(decoding_error)?;
            decoder
                .decode_all_tiles(&mut reader, &mut engine)
                .map_err(decoding_error)?;

            let index = decoder.codestream_index();
            println!(
                "main header: {} to {}, codestream size {}",
                index.main_head_start, index.main_head_end, index.codestream_size
            );
            for record in &index.markers {
                println!(
                    "  {} at {}, {} bytes",
                    marker_name(record.id),
                    record.offset,
                    record.length
                );
            }
            for tile in index.tiles.iter().filter(|tile| !tile.tile_parts.is_empty()) {
                println!("tile {}:", tile.tile);
                for (i, part) in tile.tile_parts.iter().enumerate() {
                    println!(
                        "  tile-part {}: {} to {}, data from {}",
                        i, part.start, part.end, part.end_header
                    );
                }
                for record in &tile.markers {
                    println!(
                        "  {} at {}, {} bytes",
                        marker_name(record.id),
                        record.offset,
                        record.length
                    );
                }
            }
            for (tile, length) in &engine.tiles {
                println!("tile {} decoded from {} bytes", tile, length);
            }
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    match run() {
        Err(e) => Err(e.to_string().into()),
        Ok(_) => Ok(()),
    }
}
