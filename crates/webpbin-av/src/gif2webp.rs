//! Animated GIF to WebP conversion via `gif2webp`.
//!
//! See <https://developers.google.com/speed/webp/docs/gif2webp>.

use std::ffi::OsString;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;

use crate::animation::{encode_gif, Animation};
use crate::job::{stdin_arguments, Quality, Sink, Source};
use crate::tools::{Tool, ToolConfig, ToolRegistry};
use crate::{Error, Result};

/// Flags passed on every run: smallest output, multi-threaded encoding.
const FIXED_FLAGS: [&str; 2] = ["-min_size", "-mt"];

/// Where gif2webp reads the GIF from.
pub enum Gif2WebpInput<'a> {
    /// A GIF file on disk.
    File(PathBuf),
    /// GIF bytes streamed through stdin.
    Stream(Box<dyn Read + Send + 'a>),
    /// An in-memory animation, encoded to GIF and streamed through stdin.
    Animation(&'a Animation),
}

impl fmt::Debug for Gif2WebpInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gif2WebpInput::File(path) => f.debug_tuple("File").field(path).finish(),
            Gif2WebpInput::Stream(_) => f.write_str("Stream"),
            Gif2WebpInput::Animation(a) => f
                .debug_struct("Animation")
                .field("width", &a.width)
                .field("height", &a.height)
                .field("frames", &a.frames.len())
                .finish(),
        }
    }
}

impl<'a> Gif2WebpInput<'a> {
    fn arguments(&self) -> Vec<OsString> {
        match self {
            Gif2WebpInput::File(path) => vec![path.clone().into_os_string()],
            Gif2WebpInput::Stream(_) | Gif2WebpInput::Animation(_) => stdin_arguments(),
        }
    }

    /// Turn the input into something the command can consume, serializing
    /// an animation into a transient GIF buffer.
    fn resolve(self) -> Result<Source<'a>> {
        Ok(match self {
            Gif2WebpInput::File(path) => Source::File(path),
            Gif2WebpInput::Stream(reader) => Source::Stream(reader),
            Gif2WebpInput::Animation(animation) => {
                Source::Stream(Box::new(Cursor::new(encode_gif(animation)?)))
            }
        })
    }
}

/// Builder for a gif2webp conversion.
///
/// Setting an input replaces any input set before; the same goes for outputs.
/// [`build`](Self::build) hands the input and output to a [`Gif2WebpJob`];
/// the quality setting stays until [`reset`](Self::reset).
///
/// # Example
///
/// ```no_run
/// use webpbin_av::{Gif2WebP, ToolRegistry, ToolsConfig};
///
/// let registry = ToolRegistry::discover(&ToolsConfig::default());
/// Gif2WebP::new(&registry)?
///     .quality(80)
///     .input_file("animation.gif")
///     .output_file("animation.webp")
///     .run()?;
/// # Ok::<(), webpbin_av::Error>(())
/// ```
#[derive(Debug)]
pub struct Gif2WebP<'a> {
    tool: ToolConfig,
    quality: Option<Quality>,
    input: Option<Gif2WebpInput<'a>>,
    output: Option<Sink<'a>>,
}

impl<'a> Gif2WebP<'a> {
    /// Builder using the gif2webp found in `registry`.
    pub fn new(registry: &ToolRegistry) -> Result<Self> {
        Ok(Self::with_tool(registry.require(Tool::Gif2WebP)?.clone()))
    }

    /// Builder using an explicit tool config.
    pub fn with_tool(tool: ToolConfig) -> Self {
        Self {
            tool,
            quality: None,
            input: None,
            output: None,
        }
    }

    /// Version reported by the gif2webp binary.
    pub fn version(&self) -> Result<String> {
        self.tool.version()
    }

    /// Compression factor for RGB channels, capped at 100.
    pub fn quality(&mut self, quality: u32) -> &mut Self {
        self.quality = Some(Quality::new(quality));
        self
    }

    pub fn get_quality(&self) -> Option<Quality> {
        self.quality
    }

    /// Convert the GIF file at `path`.
    pub fn input_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.input = Some(Gif2WebpInput::File(path.into()));
        self
    }

    /// Convert GIF bytes read from `reader`.
    pub fn input_reader(&mut self, reader: impl Read + Send + 'a) -> &mut Self {
        self.input = Some(Gif2WebpInput::Stream(Box::new(reader)));
        self
    }

    /// Convert an in-memory animation.
    pub fn input_animation(&mut self, animation: &'a Animation) -> &mut Self {
        self.input = Some(Gif2WebpInput::Animation(animation));
        self
    }

    /// Write the WebP file to `path`.
    pub fn output_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output = Some(Sink::File(path.into()));
        self
    }

    /// Write the WebP bytes to `writer`.
    pub fn output_writer(&mut self, writer: &'a mut (dyn Write + Send)) -> &mut Self {
        self.output = Some(Sink::Stream(writer));
        self
    }

    /// Restore the default settings. Calling it repeatedly is harmless.
    pub fn reset(&mut self) -> &mut Self {
        self.quality = None;
        self.input = None;
        self.output = None;
        self
    }

    /// Validate the configuration and take the input and output for a job.
    ///
    /// # Errors
    ///
    /// [`Error::UndefinedInput`] when no input is set, otherwise
    /// [`Error::UndefinedOutput`] when no output is set. The builder is left
    /// untouched on error.
    pub fn build(&mut self) -> Result<Gif2WebpJob<'a>> {
        match (self.input.take(), self.output.take()) {
            (Some(input), Some(output)) => Ok(Gif2WebpJob {
                tool: self.tool.clone(),
                quality: self.quality,
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

/// A validated gif2webp invocation.
#[derive(Debug)]
pub struct Gif2WebpJob<'a> {
    tool: ToolConfig,
    quality: Option<Quality>,
    input: Gif2WebpInput<'a>,
    output: Sink<'a>,
}

impl<'a> Gif2WebpJob<'a> {
    pub fn quality(&self) -> Option<Quality> {
        self.quality
    }

    pub fn input(&self) -> &Gif2WebpInput<'a> {
        &self.input
    }

    /// Full argument list the tool will be started with.
    pub fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = FIXED_FLAGS.iter().map(OsString::from).collect();
        if let Some(q) = self.quality {
            args.push("-q".into());
            args.push(q.to_string().into());
        }
        args.push("-o".into());
        args.push(self.output.target());
        args.extend(self.input.arguments());
        args
    }

    /// Run gif2webp, blocking until it exits.
    pub fn run(self) -> Result<()> {
        tracing::debug!("gif2webp {:?} -> {:?}", self.input, self.output);

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
