use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use image::{Rgb, RgbImage};

pub const RED: Rgb888 = Rgb888::new(255, 0, 0);
pub const BUTTON_FACE: Rgb888 = Rgb888::new(0xdd, 0xdd, 0xdd);
pub const BUTTON_ACTIVE: Rgb888 = Rgb888::new(0x9c, 0xc3, 0xe6);
pub const BUTTON_BORDER: Rgb888 = Rgb888::new(0x55, 0x55, 0x55);
pub const TEXT: Rgb888 = Rgb888::new(0x10, 0x10, 0x10);

/// Lets embedded-graphics draw straight into an `RgbImage`.
pub struct Canvas<'a>(pub &'a mut RgbImage);

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = self.0.dimensions();
        for Pixel(p, c) in pixels {
            if p.x < 0 || p.y < 0 || p.x as u32 >= w || p.y as u32 >= h {
                continue;
            }
            self.0.put_pixel(p.x as u32, p.y as u32, Rgb([c.r(), c.g(), c.b()]));
        }
        Ok(())
    }
}

fn infallible(r: Result<(), Infallible>) {
    match r {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Draws a rectangle outline, the stroke stays inside the box.
pub fn draw_rect(image: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb888, stroke: u32) {
    let style = PrimitiveStyleBuilder::new()
        .stroke_color(color)
        .stroke_width(stroke)
        .stroke_alignment(StrokeAlignment::Inside)
        .build();
    infallible(
        Rectangle::new(Point::new(x, y), Size::new(w, h))
            .into_styled(style)
            .draw(&mut Canvas(image)),
    );
}

pub fn fill_rect(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    w: u32,
    h: u32,
    fill: Rgb888,
    border: Rgb888,
) {
    let style = PrimitiveStyleBuilder::new()
        .fill_color(fill)
        .stroke_color(border)
        .stroke_width(1)
        .stroke_alignment(StrokeAlignment::Inside)
        .build();
    infallible(
        Rectangle::new(Point::new(x, y), Size::new(w, h))
            .into_styled(style)
            .draw(&mut Canvas(image)),
    );
}

/// Draws `text` with its baseline starting at (x, y).
pub fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb888) {
    let style = MonoTextStyle::new(&FONT_10X20, color);
    let r = Text::new(text, Point::new(x, y), style).draw(&mut Canvas(image));
    infallible(r.map(|_| ()));
}

/// Draws `text` centred in the given box.
pub fn draw_text_centered(image: &mut RgbImage, text: &str, x: i32, y: i32, w: u32, h: u32, color: Rgb888) {
    let char_style = MonoTextStyle::new(&FONT_10X20, color);
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();
    let center = Point::new(x + (w / 2) as i32, y + (h / 2) as i32);
    let r = Text::with_text_style(text, center, char_style, text_style).draw(&mut Canvas(image));
    infallible(r.map(|_| ()));
}
