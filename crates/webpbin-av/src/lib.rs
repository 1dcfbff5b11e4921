//! # webpbin-av
//!
//! Drive the WebP command-line tools from Rust.
//!
//! The codec work is done entirely by the external `cwebp`, `dwebp` and
//! `gif2webp` binaries. This crate builds their argument lists, routes input
//! and output through files or in-memory readers and writers, and runs them.
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find the binaries once, from
//!   configured paths or `PATH`.
//! - **Command execution** ([`ToolCommand`]) -- blocking builder with timeout
//!   and deadlock-free stdin/stdout piping.
//! - **Builders** ([`Gif2WebP`], [`CWebP`], [`DWebP`]) -- validated jobs
//!   with exactly one input and one output.
//! - **Animations** ([`Animation`]) -- in-memory frames serialized to GIF
//!   before being piped to gif2webp.
//!
//! ## Example
//!
//! ```no_run
//! use webpbin_av::{Gif2WebP, ToolRegistry, ToolsConfig};
//!
//! let registry = ToolRegistry::discover(&ToolsConfig::default());
//! let gif = std::fs::File::open("dance.gif")?;
//! let mut webp = Vec::new();
//! Gif2WebP::new(&registry)?
//!     .quality(90)
//!     .input_reader(gif)
//!     .output_writer(&mut webp)
//!     .run()?;
//! # Ok::<(), webpbin_av::Error>(())
//! ```

pub mod animation;
pub mod command;
pub mod cwebp;
pub mod dwebp;
mod error;
pub mod gif2webp;
pub mod job;
pub mod tools;

// Re-exports
pub use animation::{decode_gif, encode_gif, Animation, AnimationFrame, Disposal, LoopCount};
pub use command::{ToolCommand, ToolOutput};
pub use cwebp::{encode, CWebP, CWebpInput, CWebpJob, Crop, Encoder};
pub use dwebp::{decode, DWebP, DWebpJob};
pub use error::{Error, Result};
pub use gif2webp::{Gif2WebP, Gif2WebpInput, Gif2WebpJob};
pub use job::{Quality, Sink, Source};
pub use tools::{Tool, ToolConfig, ToolInfo, ToolRegistry, ToolsConfig};

/// Version reported by `tool`, as found in `registry`.
pub fn version(registry: &ToolRegistry, tool: Tool) -> Result<String> {
    registry.version(tool)
}
