//! In-memory animations and their GIF byte encoding.
//!
//! gif2webp only reads GIF files, so an [`Animation`] handed to a job is
//! serialized with [`encode_gif`] into a transient buffer and piped to the
//! tool's stdin.

use std::io::Read;
use std::time::Duration;

use gif::{DecodeOptions, DisposalMethod, Encoder, Frame, Repeat};
use image::RgbaImage;

use crate::{Error, Result};

/// Quantizer speed passed to the GIF encoder (1 = best, 30 = fastest).
const QUANTIZE_SPEED: i32 = 10;

/// What happens to a frame's area before the next frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposal {
    /// No disposal specified.
    #[default]
    Any,
    /// Leave the frame in place.
    Keep,
    /// Clear the frame's area to the background.
    Background,
    /// Restore the area to what was there before the frame.
    Previous,
}

impl From<Disposal> for DisposalMethod {
    fn from(d: Disposal) -> Self {
        match d {
            Disposal::Any => DisposalMethod::Any,
            Disposal::Keep => DisposalMethod::Keep,
            Disposal::Background => DisposalMethod::Background,
            Disposal::Previous => DisposalMethod::Previous,
        }
    }
}

impl From<DisposalMethod> for Disposal {
    fn from(d: DisposalMethod) -> Self {
        match d {
            DisposalMethod::Any => Disposal::Any,
            DisposalMethod::Keep => Disposal::Keep,
            DisposalMethod::Background => Disposal::Background,
            DisposalMethod::Previous => Disposal::Previous,
        }
    }
}

/// How many times the animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopCount {
    #[default]
    Infinite,
    Finite(u16),
}

/// A single frame of an [`Animation`].
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    /// Frame pixels.
    pub image: RgbaImage,
    /// Horizontal offset on the canvas.
    pub left: u32,
    /// Vertical offset on the canvas.
    pub top: u32,
    /// How long the frame is shown. GIF stores this in 10ms units.
    pub delay: Duration,
    /// Disposal applied after the frame is shown.
    pub disposal: Disposal,
}

impl AnimationFrame {
    /// A frame covering the canvas origin with the given delay.
    pub fn new(image: RgbaImage, delay: Duration) -> Self {
        Self {
            image,
            left: 0,
            top: 0,
            delay,
            disposal: Disposal::Any,
        }
    }

    /// Place the frame at an offset on the canvas.
    pub fn at(mut self, left: u32, top: u32) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    /// Set the disposal method.
    pub fn disposal(mut self, disposal: Disposal) -> Self {
        self.disposal = disposal;
        self
    }
}

/// A decoded animated image: a canvas and an ordered list of frames.
#[derive(Debug, Clone)]
pub struct Animation {
    pub width: u32,
    pub height: u32,
    pub loop_count: LoopCount,
    pub frames: Vec<AnimationFrame>,
}

impl Animation {
    /// An empty, infinitely looping animation with the given canvas size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            loop_count: LoopCount::Infinite,
            frames: Vec::new(),
        }
    }

    /// Append a frame.
    pub fn push(&mut self, frame: AnimationFrame) -> &mut Self {
        self.frames.push(frame);
        self
    }

    /// Total play time of one loop.
    pub fn duration(&self) -> Duration {
        self.frames.iter().map(|f| f.delay).sum()
    }
}

fn dimension(value: u32, what: &str) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| Error::serialization(format!("{what} {value} exceeds the GIF limit of 65535")))
}

fn delay_centis(delay: Duration) -> u16 {
    u16::try_from(delay.as_millis() / 10).unwrap_or(u16::MAX)
}

/// Check that every frame is non-empty and lies inside the canvas.
fn validate(animation: &Animation) -> Result<()> {
    if animation.width == 0 || animation.height == 0 {
        return Err(Error::serialization(format!(
            "canvas is {}x{}",
            animation.width, animation.height
        )));
    }
    if animation.frames.is_empty() {
        return Err(Error::serialization("animation has no frames"));
    }

    for (index, frame) in animation.frames.iter().enumerate() {
        let (w, h) = frame.image.dimensions();
        let right = u64::from(frame.left) + u64::from(w);
        let bottom = u64::from(frame.top) + u64::from(h);
        if w == 0 || h == 0 {
            return Err(Error::serialization(format!("frame {index} is empty")));
        }
        let expected = w as usize * h as usize * 4;
        if frame.image.as_raw().len() != expected {
            return Err(Error::serialization(format!(
                "frame {index} holds {} bytes of pixel data, expected {expected} for {w}x{h}",
                frame.image.as_raw().len()
            )));
        }
        if right > u64::from(animation.width) || bottom > u64::from(animation.height) {
            return Err(Error::serialization(format!(
                "frame {index} is {w}x{h} at ({}, {}) but the canvas is {}x{}",
                frame.left, frame.top, animation.width, animation.height
            )));
        }
    }

    Ok(())
}

/// Serialize an animation to GIF bytes.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the canvas is empty or too large,
/// there are no frames, a frame does not fit inside the canvas, or a frame's
/// pixel buffer does not match its dimensions.
pub fn encode_gif(animation: &Animation) -> Result<Vec<u8>> {
    validate(animation)?;

    let width = dimension(animation.width, "canvas width")?;
    let height = dimension(animation.height, "canvas height")?;

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, width, height, &[])?;
        encoder.set_repeat(match animation.loop_count {
            LoopCount::Infinite => Repeat::Infinite,
            LoopCount::Finite(n) => Repeat::Finite(n),
        })?;

        for frame in &animation.frames {
            let (w, h) = frame.image.dimensions();
            let mut pixels = frame.image.as_raw().clone();
            let mut gif_frame =
                Frame::from_rgba_speed(w as u16, h as u16, &mut pixels, QUANTIZE_SPEED);
            gif_frame.left = frame.left as u16;
            gif_frame.top = frame.top as u16;
            gif_frame.delay = delay_centis(frame.delay);
            gif_frame.dispose = frame.disposal.into();
            encoder.write_frame(&gif_frame)?;
        }
    }

    tracing::trace!(
        "Encoded {} frames into {} GIF bytes",
        animation.frames.len(),
        out.len()
    );
    Ok(out)
}

/// Decode GIF bytes into an [`Animation`], expanding every frame to RGBA.
pub fn decode_gif<R: Read>(reader: R) -> Result<Animation> {
    let mut options = DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(reader)?;

    let mut animation = Animation::new(u32::from(decoder.width()), u32::from(decoder.height()));

    while let Some(frame) = decoder.read_next_frame()? {
        let image = RgbaImage::from_raw(
            u32::from(frame.width),
            u32::from(frame.height),
            frame.buffer.to_vec(),
        )
        .ok_or_else(|| Error::InvalidInput("GIF frame buffer has the wrong size".to_string()))?;

        animation.frames.push(AnimationFrame {
            image,
            left: u32::from(frame.left),
            top: u32::from(frame.top),
            delay: Duration::from_millis(u64::from(frame.delay) * 10),
            disposal: frame.dispose.into(),
        });
    }

    if animation.frames.is_empty() {
        return Err(Error::InvalidInput("GIF contains no frames".to_string()));
    }

    Ok(animation)
}
