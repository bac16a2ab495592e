//! Status display
//!
//! A [`DisplaySurface`] hands out a [`Canvas`] for the duration of one
//! `paint` call and presents whatever was drawn when the call returns.
//! [`DisplayRotator`] cycles the latest reading across three pages.

pub mod console;
pub mod rotator;

pub use console::{ConsoleDisplay, NullDisplay};
pub use rotator::{DisplayRotator, Page, RotationReport};

use thiserror::Error;

/// Display errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Display unavailable: {0}")]
    DisplayUnavailable(String),
}

/// Pixel position, top-left is the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };
}

/// Text fill colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    White,
    Black,
}

/// Drawing primitives available while a page is being painted
pub trait Canvas {
    /// Draw `text` with its top-left corner at `origin`; `\n` starts a new line
    fn text(&mut self, origin: Point, text: &str, fill: Fill);
}

/// A screen that can be painted one page at a time
pub trait DisplaySurface: Send {
    /// Run `draw` against a fresh canvas, then present the result
    ///
    /// The canvas is only valid inside the call.
    fn paint(&mut self, draw: &mut dyn FnMut(&mut dyn Canvas)) -> Result<(), RenderError>;
}

impl<D: DisplaySurface + ?Sized> DisplaySurface for Box<D> {
    fn paint(&mut self, draw: &mut dyn FnMut(&mut dyn Canvas)) -> Result<(), RenderError> {
        (**self).paint(draw)
    }
}
