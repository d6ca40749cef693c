//! Drawing API for [`Image`]s.
//!
//! This module contains a collection of freestanding functions that can draw annotation shapes
//! onto an [`Image`]. All functions return a *guard object* that allows optional customization of
//! the shape and performs the draw operation when dropped.
//!
//! All drawing operations *overwrite* the target pixel with the shape color; they do not blend.
//! Pixels outside of the image bounds are silently ignored.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use image::Rgba;

use super::{Color, Image, Rect};

struct Target<'a>(&'a mut Image);

impl OriginDimensions for Target<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && point.y >= 0
                && (point.x as u32) < self.0.width()
                && (point.y as u32) < self.0.height()
            {
                self.0.buf.put_pixel(point.x as u32, point.y as u32, Rgba(color.0));
            }
        }
        Ok(())
    }
}

/// Guard returned by [`rect`]; draws the rectangle when dropped and allows customization.
pub struct DrawRect<'a> {
    image: &'a mut Image,
    rect: Rect,
    color: Color,
    stroke_width: u32,
}

impl DrawRect<'_> {
    /// Sets the rectangle's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the rectangle's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        let rect = Rectangle::new(
            Point::new(self.rect.x().round() as i32, self.rect.y().round() as i32),
            Size::new(
                self.rect.width().round() as u32,
                self.rect.height().round() as u32,
            ),
        );
        match rect
            .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
            .draw(&mut Target(&mut *self.image))
        {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws the outline of a rectangle onto an image.
pub fn rect(image: &mut Image, rect: Rect) -> DrawRect<'_> {
    DrawRect {
        image,
        rect,
        color: Color::RED,
        stroke_width: 1,
    }
}

/// Guard returned by [`line`]; draws the line when dropped and allows customization.
pub struct DrawLine<'a> {
    image: &'a mut Image,
    start: (f32, f32),
    end: (f32, f32),
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        let line = Line::new(
            Point::new(self.start.0.round() as i32, self.start.1.round() as i32),
            Point::new(self.end.0.round() as i32, self.end.1.round() as i32),
        );
        match line
            .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
            .draw(&mut Target(&mut *self.image))
        {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a line onto an image.
pub fn line(image: &mut Image, start_x: f32, start_y: f32, end_x: f32, end_y: f32) -> DrawLine<'_> {
    DrawLine {
        image,
        start: (start_x, start_y),
        end: (end_x, end_y),
        color: Color::RED,
        stroke_width: 1,
    }
}

/// Guard returned by [`marker`]; draws an X-shaped marker when dropped.
pub struct DrawMarker<'a> {
    image: &'a mut Image,
    x: f32,
    y: f32,
    color: Color,
    size: u32,
}

impl DrawMarker<'_> {
    /// Sets the marker's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the width and height of the marker.
    ///
    /// The size must be *uneven* and *non-zero*; a size of 1 draws a single pixel. The default
    /// size is 5.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size != 0, "marker size must be greater than zero");
        assert!(size % 2 == 1, "marker size must be an uneven number");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let (x, y) = (self.x.round() as i32, self.y.round() as i32);
        let offset = ((self.size - 1) / 2) as i32;
        let pixels = (-offset..=offset)
            .zip(-offset..=offset)
            .chain((-offset..=offset).rev().zip(-offset..=offset))
            .map(|(dx, dy)| Pixel(Point::new(x + dx, y + dy), self.color));
        match Target(&mut *self.image).draw_iter(pixels) {
            Ok(()) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws an X-shaped marker onto an image.
pub fn marker(image: &mut Image, x: f32, y: f32) -> DrawMarker<'_> {
    DrawMarker {
        image,
        x,
        y,
        color: Color::RED,
        size: 5,
    }
}

/// Guard returned by [`text`]; draws the text when dropped and allows customization.
pub struct DrawText<'a> {
    image: &'a mut Image,
    x: f32,
    y: f32,
    text: String,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Places the top edge of the text at the given Y coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Places the bottom edge of the text at the given Y coordinate.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Places the left edge of the text at the given X coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(&FONT_6X10, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        let text = Text::with_text_style(
            &self.text,
            Point::new(self.x.round() as i32, self.y.round() as i32),
            character_style,
            text_style,
        );
        match text.draw(&mut Target(&mut *self.image)) {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a text string onto an image, centered at the given coordinates.
pub fn text<'a>(image: &'a mut Image, x: f32, y: f32, text: &str) -> DrawText<'a> {
    DrawText {
        image,
        x,
        y,
        text: text.to_string(),
        color: Color::WHITE,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_draws_outline() {
        let mut image = Image::new(10, 10);
        rect(&mut image, Rect::from_top_left(1.0, 1.0, 8.0, 8.0)).color(Color::GREEN);
        assert_eq!(image.get(1, 1), Color::GREEN);
        assert_eq!(image.get(5, 5), Color::NULL);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut image = Image::new(4, 4);
        line(&mut image, -10.0, -10.0, 10.0, 10.0).color(Color::RED);
        marker(&mut image, 100.0, 100.0);
        assert_eq!(image.get(0, 0), Color::RED);
    }

    #[test]
    fn marker_is_centered() {
        let mut image = Image::new(9, 9);
        marker(&mut image, 4.0, 4.0).color(Color::CYAN);
        assert_eq!(image.get(4, 4), Color::CYAN);
        assert_eq!(image.get(2, 2), Color::CYAN);
        assert_eq!(image.get(6, 6), Color::CYAN);
    }
}
