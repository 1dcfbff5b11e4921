use clap::{Parser, Subcommand};
use std::path::PathBuf;
use webpbin_av::Tool;

#[derive(Parser)]
#[command(name = "webpbin")]
#[command(author, version, about = "Convert images to and from WebP using the libwebp tools")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert an animated GIF to WebP with gif2webp
    Gif2webp {
        /// GIF file to convert, or - for stdin
        input: PathBuf,

        /// WebP file to write, or - for stdout
        #[arg(short, long)]
        output: PathBuf,

        /// Compression factor (0-100, values above 100 are capped)
        #[arg(short, long)]
        quality: Option<u32>,
    },

    /// Encode a still image to WebP with cwebp
    Encode {
        /// Image file to encode, or - for stdin
        input: PathBuf,

        /// WebP file to write, or - for stdout
        #[arg(short, long)]
        output: PathBuf,

        /// Compression factor (0-100, values above 100 are capped)
        #[arg(short, long)]
        quality: Option<u32>,

        /// Encode losslessly
        #[arg(long)]
        lossless: bool,
    },

    /// Decode a WebP image to PNG with dwebp
    Decode {
        /// WebP file to decode, or - for stdin
        input: PathBuf,

        /// PNG file to write, or - for stdout
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check that the WebP tools are available
    CheckTools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the version reported by one of the WebP tools
    ToolVersion {
        /// cwebp, dwebp or gif2webp
        tool: Tool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
