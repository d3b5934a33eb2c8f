//! Raster plot sink
//!
//! A very small plotter: one pixel per channel per step. The x axis runs
//! horizontally through the middle of the canvas, one column per step, and
//! the y axis covers `[-scale, +scale]`. Values that fall outside the canvas,
//! and values that are not finite, are not drawn.
//!
//! The canvas is shared with a [`PlotHandle`]; call [`PlotHandle::write`]
//! only after the run has halted, otherwise the image may be half drawn.

use std::path::Path;
use std::sync::Arc;

use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::debug;

use crate::categories::BlockCategory;
use crate::core::block::{Block, StepContext, StepOutcome};
use crate::core::error::{BlockError, SystemError};

pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_HEIGHT: u32 = 512;
pub const DEFAULT_SCALE: f64 = 1.0;

/// Line colours, cycled through per channel.
pub const COLORS: [Rgba<u8>; 6] = [
    Rgba([0, 0, 255, 255]),
    Rgba([0, 255, 0, 255]),
    Rgba([255, 0, 0, 255]),
    Rgba([255, 0, 255, 255]),
    Rgba([0, 255, 255, 255]),
    Rgba([255, 255, 0, 255]),
];

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Sink that draws one pixel per channel per step onto a shared canvas.
pub struct Plot {
    channels: usize,
    scale: f64,
    canvas: Arc<Mutex<RgbaImage>>,
    x: u32,
}

impl Plot {
    /// Plot with `channels` inputs on a default-sized canvas.
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            scale: DEFAULT_SCALE,
            canvas: Arc::new(Mutex::new(blank_canvas(DEFAULT_WIDTH, DEFAULT_HEIGHT))),
            x: 0,
        }
    }

    /// Replace the canvas with a blank one of the given size.
    pub fn with_size(self, width: u32, height: u32) -> Self {
        *self.canvas.lock() = blank_canvas(width, height);
        self
    }

    /// Set the half-height of the y range.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn handle(&self) -> PlotHandle {
        PlotHandle {
            canvas: Arc::clone(&self.canvas),
        }
    }

    /// Row for `value`, or `None` if it is off the canvas.
    fn row(&self, value: f64, height: u32) -> Option<u32> {
        if !value.is_finite() {
            return None;
        }
        // Only the offset from the axis is truncated, so positive and
        // negative values round towards the axis alike.
        let offset = (value * height as f64 / (2.0 * self.scale)).trunc();
        let y = (height / 2) as f64 - offset;
        if y < 0.0 || y >= height as f64 {
            return None;
        }
        Some(y as u32)
    }
}

impl Block for Plot {
    fn inputs(&self) -> usize {
        self.channels
    }

    fn outputs(&self) -> usize {
        0
    }

    fn step(&mut self, _ctx: &StepContext, inputs: &[f64], _outputs: &mut [f64]) -> StepOutcome {
        let mut canvas = self.canvas.lock();
        let (width, height) = canvas.dimensions();
        if self.x < width {
            for (channel, &value) in inputs.iter().enumerate() {
                if let Some(y) = self.row(value, height) {
                    canvas.put_pixel(self.x, y, COLORS[channel % COLORS.len()]);
                }
            }
        }
        self.x = self.x.saturating_add(1);
        StepOutcome::Continue
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Sink
    }

    fn validate(&self) -> Result<(), SystemError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(SystemError::InvalidParameter(format!(
                "plot scale must be finite and positive, got {}",
                self.scale
            )));
        }
        let (width, height) = self.canvas.lock().dimensions();
        if width == 0 || height == 0 {
            return Err(SystemError::InvalidParameter(format!(
                "plot canvas must not be empty, got {}x{}",
                width, height
            )));
        }
        Ok(())
    }
}

/// Shared access to a [`Plot`]'s canvas.
#[derive(Debug, Clone)]
pub struct PlotHandle {
    canvas: Arc<Mutex<RgbaImage>>,
}

impl PlotHandle {
    /// Encode the canvas as PNG.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), BlockError> {
        let path = path.as_ref();
        self.canvas.lock().save_with_format(path, ImageFormat::Png)?;
        debug!(path = %path.display(), "plot written");
        Ok(())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.lock().dimensions()
    }

    /// RGBA value of one pixel, `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let canvas = self.canvas.lock();
        let (width, height) = canvas.dimensions();
        if x >= width || y >= height {
            return None;
        }
        Some(canvas.get_pixel(x, y).0)
    }
}

fn blank_canvas(width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    if height > 0 {
        for x in 0..width {
            canvas.put_pixel(x, height / 2, AXIS);
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    fn feed(plot: &mut Plot, rows: &[&[f64]]) {
        let ctx = StepContext::new(0.01);
        for row in rows {
            plot.step(&ctx, row, &mut []);
        }
    }

    #[test]
    fn test_blank_canvas_has_axis() {
        let plot = Plot::new(1).with_size(8, 8);
        let handle = plot.handle();
        assert_eq!(handle.dimensions(), (8, 8));
        assert_eq!(handle.pixel(3, 4), Some(BLACK));
        assert_eq!(handle.pixel(3, 0), Some(WHITE));
        assert_eq!(handle.pixel(8, 0), None);
    }

    #[test]
    fn test_default_size() {
        assert_eq!(Plot::new(1).handle().dimensions(), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
    }

    #[test]
    fn test_one_column_per_step() {
        let mut plot = Plot::new(2).with_size(10, 10).with_scale(1.0);
        let handle = plot.handle();
        feed(&mut plot, &[&[0.5, -0.5], &[0.0, 0.8]]);

        // y = 5 - trunc(v * 10 / 2)
        assert_eq!(handle.pixel(0, 3), Some(COLORS[0].0));
        assert_eq!(handle.pixel(0, 2), Some(WHITE));
        assert_eq!(handle.pixel(0, 7), Some(COLORS[1].0));
        assert_eq!(handle.pixel(1, 5), Some(COLORS[0].0));
        assert_eq!(handle.pixel(1, 1), Some(COLORS[1].0));
    }

    #[test]
    fn test_out_of_range_values_are_skipped() {
        let mut plot = Plot::new(3).with_size(4, 4);
        let handle = plot.handle();
        feed(&mut plot, &[&[5.0, f64::NAN, f64::INFINITY]]);
        for y in 0..4 {
            let expected = if y == 2 { BLACK } else { WHITE };
            assert_eq!(handle.pixel(0, y), Some(expected));
        }

        // Columns past the right edge are ignored.
        for _ in 0..6 {
            feed(&mut plot, &[&[0.0, 0.0, 0.0]]);
        }
        assert_eq!(handle.pixel(3, 2), Some(COLORS[2].0));
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        assert!(Plot::new(1).validate().is_ok());
        assert!(matches!(
            Plot::new(1).with_scale(0.0).validate(),
            Err(SystemError::InvalidParameter(_))
        ));
        assert!(Plot::new(1).with_size(0, 4).validate().is_err());
    }

    #[test]
    fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");

        let mut plot = Plot::new(1).with_size(16, 16);
        feed(&mut plot, &[&[0.25]]);
        plot.handle().write(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
