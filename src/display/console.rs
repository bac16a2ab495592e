//! Text-mode display surfaces
//!
//! `ConsoleDisplay` writes each painted page as a framed block of text, which
//! is what a bench setup without the OLED panel wants. `NullDisplay` paints
//! nothing and is used for headless runs.

use super::{Canvas, DisplaySurface, Fill, Point, RenderError};
use std::io::{self, Write};

/// Canvas that collects text draws, in order
#[derive(Debug, Default)]
struct TextCanvas {
    items: Vec<(Point, String, Fill)>,
}

impl Canvas for TextCanvas {
    fn text(&mut self, origin: Point, text: &str, fill: Fill) {
        self.items.push((origin, text.to_string(), fill));
    }
}

/// Display surface that prints each page to a writer
pub struct ConsoleDisplay<W: Write + Send> {
    writer: W,
    width: usize,
}

impl ConsoleDisplay<io::Stderr> {
    /// Print pages to standard error, keeping stdout for logs
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    /// Panel width in characters, matching a 128 pixel OLED at 6px per glyph
    pub const DEFAULT_WIDTH: usize = 21;

    pub fn new(writer: W) -> Self {
        Self {
            writer,
            width: Self::DEFAULT_WIDTH,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn present(&mut self, canvas: &TextCanvas) -> io::Result<()> {
        let border = "-".repeat(self.width + 2);
        writeln!(self.writer, "+{border}+")?;
        for (_, text, fill) in &canvas.items {
            // Black on the panel background is invisible
            if *fill == Fill::Black {
                continue;
            }
            for line in text.lines() {
                let line: String = line.chars().take(self.width).collect();
                writeln!(self.writer, "| {line:<width$} |", width = self.width)?;
            }
        }
        writeln!(self.writer, "+{border}+")?;
        self.writer.flush()
    }
}

impl<W: Write + Send> DisplaySurface for ConsoleDisplay<W> {
    fn paint(&mut self, draw: &mut dyn FnMut(&mut dyn Canvas)) -> Result<(), RenderError> {
        let mut canvas = TextCanvas::default();
        draw(&mut canvas);
        self.present(&canvas)
            .map_err(|e| RenderError::DisplayUnavailable(e.to_string()))
    }
}

/// Display surface that discards every page
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySurface for NullDisplay {
    fn paint(&mut self, draw: &mut dyn FnMut(&mut dyn Canvas)) -> Result<(), RenderError> {
        draw(&mut TextCanvas::default());
        Ok(())
    }
}
