//! WebP to PNG decoding via `dwebp`.
//!
//! See <https://developers.google.com/speed/webp/docs/dwebp>.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;

use image::{DynamicImage, ImageFormat};

use crate::job::{Sink, Source};
use crate::tools::{Tool, ToolConfig, ToolRegistry};
use crate::{Error, Result};

/// Builder for a dwebp decode. dwebp writes PNG unless told otherwise.
#[derive(Debug)]
pub struct DWebP<'a> {
    tool: ToolConfig,
    input: Option<Source<'a>>,
    output: Option<Sink<'a>>,
}

impl<'a> DWebP<'a> {
    /// Builder using the dwebp found in `registry`.
    pub fn new(registry: &ToolRegistry) -> Result<Self> {
        Ok(Self::with_tool(registry.require(Tool::DWebP)?.clone()))
    }

    /// Builder using an explicit tool config.
    pub fn with_tool(tool: ToolConfig) -> Self {
        Self {
            tool,
            input: None,
            output: None,
        }
    }

    /// Version reported by the dwebp binary.
    pub fn version(&self) -> Result<String> {
        self.tool.version()
    }

    pub fn input_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.input = Some(Source::File(path.into()));
        self
    }

    pub fn input_reader(&mut self, reader: impl Read + Send + 'a) -> &mut Self {
        self.input = Some(Source::Stream(Box::new(reader)));
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

    pub fn reset(&mut self) -> &mut Self {
        self.input = None;
        self.output = None;
        self
    }

    /// Validate the configuration and take the input and output for a job.
    pub fn build(&mut self) -> Result<DWebpJob<'a>> {
        match (self.input.take(), self.output.take()) {
            (Some(input), Some(output)) => Ok(DWebpJob {
                tool: self.tool.clone(),
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

    /// Decode the configured input into an image. Any output set is left in place.
    pub fn decode(&mut self) -> Result<DynamicImage> {
        let input = self.input.take().ok_or(Error::UndefinedInput)?;
        let mut png = Vec::new();
        DWebpJob {
            tool: self.tool.clone(),
            input,
            output: Sink::Stream(&mut png),
        }
        .run()?;
        Ok(image::load_from_memory_with_format(&png, ImageFormat::Png)?)
    }
}

/// A validated dwebp invocation.
#[derive(Debug)]
pub struct DWebpJob<'a> {
    tool: ToolConfig,
    input: Source<'a>,
    output: Sink<'a>,
}

impl<'a> DWebpJob<'a> {
    /// Full argument list the tool will be started with.
    pub fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-o".into(), self.output.target()];
        args.extend(self.input.arguments());
        args
    }

    /// Run dwebp, blocking until it exits.
    pub fn run(self) -> Result<()> {
        tracing::debug!("dwebp {:?} -> {:?}", self.input, self.output);

        let mut cmd = self.tool.command();
        cmd.args(self.arguments());
        self.output.attach(&mut cmd);
        self.input.attach(&mut cmd);

        cmd.execute()?;
        Ok(())
    }
}

/// Decode WebP bytes from `reader` into an image.
pub fn decode(registry: &ToolRegistry, reader: impl Read + Send) -> Result<DynamicImage> {
    DWebP::new(registry)?.input_reader(reader).decode()
}
