//! Still image to WebP encoding via `cwebp`.
//!
//! See <https://developers.google.com/speed/webp/docs/cwebp>.

use std::ffi::OsString;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;

use image::{DynamicImage, ImageFormat};

use crate::job::{stdin_arguments, Quality, Sink, Source};
use crate::tools::{Tool, ToolConfig, ToolRegistry};
use crate::{Error, Result};

/// Quality used by [`Encoder::default`], matching cwebp's own default.
pub const DEFAULT_QUALITY: u32 = 75;

/// Rectangle cut from the source before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Where cwebp reads the source image from.
pub enum CWebpInput<'a> {
    /// An image file on disk (PNG, JPEG, TIFF, WebP or raw Y'CbCr).
    File(PathBuf),
    /// Encoded image bytes streamed through stdin.
    Stream(Box<dyn Read + Send + 'a>),
    /// An in-memory image, encoded to PNG and streamed through stdin.
    Image(&'a DynamicImage),
}

impl fmt::Debug for CWebpInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CWebpInput::File(path) => f.debug_tuple("File").field(path).finish(),
            CWebpInput::Stream(_) => f.write_str("Stream"),
            CWebpInput::Image(img) => f
                .debug_struct("Image")
                .field("width", &img.width())
                .field("height", &img.height())
                .finish(),
        }
    }
}

impl<'a> CWebpInput<'a> {
    fn arguments(&self) -> Vec<OsString> {
        match self {
            CWebpInput::File(path) => vec![path.clone().into_os_string()],
            CWebpInput::Stream(_) | CWebpInput::Image(_) => stdin_arguments(),
        }
    }

    fn resolve(self) -> Result<Source<'a>> {
        Ok(match self {
            CWebpInput::File(path) => Source::File(path),
            CWebpInput::Stream(reader) => Source::Stream(reader),
            CWebpInput::Image(img) => Source::Stream(Box::new(Cursor::new(encode_png(img)?))),
        })
    }
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| Error::serialization(e.to_string()))?;
    Ok(buf)
}

/// Builder for a cwebp encode.
///
/// Inputs and outputs follow the same rules as [`crate::Gif2WebP`]: the last
/// one set wins and [`build`](Self::build) takes them.
#[derive(Debug)]
pub struct CWebP<'a> {
    tool: ToolConfig,
    quality: Option<Quality>,
    lossless: bool,
    crop: Option<Crop>,
    input: Option<CWebpInput<'a>>,
    output: Option<Sink<'a>>,
}

impl<'a> CWebP<'a> {
    /// Builder using the cwebp found in `registry`.
    pub fn new(registry: &ToolRegistry) -> Result<Self> {
        Ok(Self::with_tool(registry.require(Tool::CWebP)?.clone()))
    }

    /// Builder using an explicit tool config.
    pub fn with_tool(tool: ToolConfig) -> Self {
        Self {
            tool,
            quality: None,
            lossless: false,
            crop: None,
            input: None,
            output: None,
        }
    }

    /// Version reported by the cwebp binary.
    pub fn version(&self) -> Result<String> {
        self.tool.version()
    }

    /// Compression factor for RGB channels, capped at 100.
    pub fn quality(&mut self, quality: u32) -> &mut Self {
        self.quality = Some(Quality::new(quality));
        self
    }

    /// Encode losslessly.
    pub fn lossless(&mut self, lossless: bool) -> &mut Self {
        self.lossless = lossless;
        self
    }

    /// Crop the source to the given rectangle before encoding.
    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> &mut Self {
        self.crop = Some(Crop {
            x,
            y,
            width,
            height,
        });
        self
    }

    pub fn input_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.input = Some(CWebpInput::File(path.into()));
        self
    }

    pub fn input_reader(&mut self, reader: impl Read + Send + 'a) -> &mut Self {
        self.input = Some(CWebpInput::Stream(Box::new(reader)));
        self
    }

    pub fn input_image(&mut self, img: &'a DynamicImage) -> &mut Self {
        self.input = Some(CWebpInput::Image(img));
        self
    }

    pub fn output_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output = Some(Sink::File(path.into()));
        self
    }

    pub fn output_writer(&mut self, writer: &'a mut (dyn Write + Send)) -> &mut Self {
        self.output = Some(Sink::Stream(writer));
        self
    }

    /// Restore the default settings.
    pub fn reset(&mut self) -> &mut Self {
        self.quality = None;
        self.lossless = false;
        self.crop = None;
        self.input = None;
        self.output = None;
        self
    }

    /// Validate the configuration and take the input and output for a job.
    pub fn build(&mut self) -> Result<CWebpJob<'a>> {
        match (self.input.take(), self.output.take()) {
            (Some(input), Some(output)) => Ok(CWebpJob {
                tool: self.tool.clone(),
                quality: self.quality,
                lossless: self.lossless,
                crop: self.crop,
                input,
                output,
            }),
            (input, output) => {
                let err = if input.is_none() {
                    Error::UndefinedInput
                } else {
                    Error::UndefinedOutput
                };
                self.input = input;
                self.output = output;
                Err(err)
            }
        }
    }

    /// Build the job and run it.
    pub fn run(&mut self) -> Result<()> {
        self.build()?.run()
    }
}

/// A validated cwebp invocation.
#[derive(Debug)]
pub struct CWebpJob<'a> {
    tool: ToolConfig,
    quality: Option<Quality>,
    lossless: bool,
    crop: Option<Crop>,
    input: CWebpInput<'a>,
    output: Sink<'a>,
}

impl<'a> CWebpJob<'a> {
    fn options(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(q) = self.quality {
            args.push("-q".into());
            args.push(q.to_string().into());
        }
        if self.lossless {
            args.push("-lossless".into());
        }
        if let Some(c) = self.crop {
            args.push("-crop".into());
            for v in [c.x, c.y, c.width, c.height] {
                args.push(v.to_string().into());
            }
        }
        args
    }

    /// Full argument list the tool will be started with.
    pub fn arguments(&self) -> Vec<OsString> {
        let mut args = self.options();
        args.push("-o".into());
        args.push(self.output.target());
        args.extend(self.input.arguments());
        args
    }

    /// Run cwebp, blocking until it exits.
    pub fn run(self) -> Result<()> {
        tracing::debug!("cwebp {:?} -> {:?}", self.input, self.output);

        let args = self.arguments();
        let source = self.input.resolve()?;

        let mut cmd = self.tool.command();
        cmd.args(args);
        self.output.attach(&mut cmd);
        source.attach(&mut cmd);

        cmd.execute()?;
        Ok(())
    }
}

/// Encodes images to WebP with a fixed quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    /// Compression factor between 0 and 100.
    pub quality: u32,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

impl Encoder {
    /// Write `img` to `w` in WebP format.
    pub fn encode(
        &self,
        registry: &ToolRegistry,
        w: &mut (dyn Write + Send),
        img: &DynamicImage,
    ) -> Result<()> {
        CWebP::new(registry)?
            .quality(self.quality)
            .input_image(img)
            .output_writer(w)
            .run()
    }
}

/// Write `img` to `w` in WebP format with the default quality.
pub fn encode(registry: &ToolRegistry, w: &mut (dyn Write + Send), img: &DynamicImage) -> Result<()> {
    Encoder::default().encode(registry, w, img)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder<'a>() -> CWebP<'a> {
        CWebP::with_tool(ToolConfig::new(Tool::CWebP, "/usr/bin/cwebp"))
    }

    #[test]
    fn test_options_precede_output_and_input() {
        let job = builder()
            .quality(101)
            .lossless(true)
            .crop(1, 2, 30, 40)
            .input_file("in.png")
            .output_file("out.webp")
            .build()
            .unwrap();
        assert_eq!(
            job.arguments(),
            [
                "-q", "100", "-lossless", "-crop", "1", "2", "30", "40", "-o", "out.webp",
                "in.png"
            ]
        );
    }

    #[test]
    fn test_image_input_reads_stdin() {
        let img = DynamicImage::new_rgba8(2, 2);
        let mut out = Vec::new();
        let job = builder()
            .input_image(&img)
            .output_writer(&mut out)
            .build()
            .unwrap();
        assert_eq!(job.arguments(), ["-o", "-", "--", "-"]);
    }

    #[test]
    fn test_png_serialization() {
        let png = encode_png(&DynamicImage::new_rgb8(3, 1)).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }

    #[test]
    fn test_undefined_input_and_output() {
        let mut b = builder();
        assert!(matches!(b.build(), Err(Error::UndefinedInput)));
        b.input_file("in.png");
        assert!(matches!(b.build(), Err(Error::UndefinedOutput)));
    }

    #[test]
    fn test_encoder_default_quality() {
        assert_eq!(Encoder::default().quality, 75);
    }

    #[test]
    fn test_encode_without_cwebp_reports_missing_tool() {
        let registry = ToolRegistry::default();
        let mut out = Vec::new();
        let err = encode(&registry, &mut out, &DynamicImage::new_rgb8(1, 1)).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }
}
