//! Image blending and compositing.

use super::{Color, Image};

/// Alpha-blends `src` over the whole of `dst`, stretching or shrinking `src` as necessary.
///
/// Sampling uses nearest-neighbor interpolation; this runs on the CPU and favors predictability
/// over output quality. Fully transparent source pixels leave the destination untouched.
pub fn blend_scaled(dst: &mut Image, src: &Image) {
    if src.width() == 0 || src.height() == 0 || dst.width() == 0 || dst.height() == 0 {
        return;
    }

    for y in 0..dst.height() {
        let sy = (y as u64 * src.height() as u64 / dst.height() as u64) as u32;
        for x in 0..dst.width() {
            let sx = (x as u64 * src.width() as u64 / dst.width() as u64) as u32;
            let over = src.get(sx, sy);
            if over.a() == 0 {
                continue;
            }
            if over.a() == 255 {
                dst.set(x, y, over);
                continue;
            }

            let alpha = over.a() as u32;
            let under = dst.get(x, y);
            let mix = |o: u8, u: u8| ((o as u32 * alpha + u as u32 * (255 - alpha)) / 255) as u8;
            dst.set(
                x,
                y,
                Color::from_rgba8(
                    mix(over.r(), under.r()),
                    mix(over.g(), under.g()),
                    mix(over.b(), under.b()),
                    over.a().max(under.a()),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_overwrites_transparent_keeps() {
        let mut dst = Image::new(4, 4);
        dst.clear(Color::BLUE);

        let mut src = Image::new(2, 2);
        src.set(0, 0, Color::RED);

        blend_scaled(&mut dst, &src);
        // The opaque source pixel covers the upper-left quadrant after scaling.
        assert_eq!(dst.get(0, 0), Color::RED);
        assert_eq!(dst.get(1, 1), Color::RED);
        // Transparent source pixels leave the destination alone.
        assert_eq!(dst.get(3, 3), Color::BLUE);
    }
}
