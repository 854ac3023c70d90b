use image::RgbImage;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hsv {
    /// Degrees in `[0, 360)`.
    pub hue: f64,
    pub sat: f64,
    pub value: f64,
}

impl Hsv {
    /// Hue first, then saturation, then value.
    pub fn chart_order(&self, other: &Hsv) -> Ordering {
        self.hue
            .total_cmp(&other.hue)
            .then(self.sat.total_cmp(&other.sat))
            .then(self.value.total_cmp(&other.value))
    }
}

/// Mean colour over every pixel, truncated to 8 bits per channel.
pub fn average_color(img: &RgbImage) -> [u8; 3] {
    let pixels = u64::from(img.width()) * u64::from(img.height());
    if pixels == 0 {
        return [0, 0, 0];
    }

    let mut sum = [0u64; 3];
    for p in img.pixels() {
        for (acc, channel) in sum.iter_mut().zip(p.0) {
            *acc += u64::from(channel);
        }
    }
    sum.map(|s| (s / pixels) as u8)
}

pub fn hsv(rgb: [u8; 3]) -> Hsv {
    // Scale 8-bit channels into [0, 1) the same way 16-bit colour values would be.
    let [r, g, b] = rgb.map(|c| f64::from(c) * 257.0 / 65536.0);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;
    let sat = if max > 0.0 { d / max } else { 0.0 };

    let hue = if d == 0.0 {
        0.0
    } else if max == r {
        let h = (g - b) / d;
        if g < b {
            h + 6.0
        } else {
            h
        }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    Hsv {
        hue: hue * 60.0,
        sat,
        value: max,
    }
}
