use image::{Rgba, RgbaImage};

use crate::{
    render::layout::{self, GlyphSource, LayoutError, PositionedLine},
    types::Dimensions,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font_px: f32,
    pub label_px: f32,
    pub margin: u32,
    pub shadow_offset: i32,
    pub text_color: [u8; 4],
    pub shadow_color: [u8; 4],
    pub label_color: [u8; 4],
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_px: 64.0,
            label_px: 36.0,
            margin: 80,
            shadow_offset: 3,
            text_color: [255, 255, 255, 255],
            shadow_color: [0, 0, 0, 200],
            label_color: [255, 255, 255, 200],
        }
    }
}

impl CaptionStyle {
    pub fn shadow_offset(&self) -> i32 {
        self.shadow_offset.clamp(1, 4)
    }
}

/// Transparent overlay carrying the centred caption and a small topic label
/// in the top-left corner. Meant to be composited over the background.
pub fn render_overlay(
    glyphs: &dyn GlyphSource,
    style: &CaptionStyle,
    caption: &str,
    label: &str,
    canvas: Dimensions,
) -> Result<RgbaImage, LayoutError> {
    let mut image = RgbaImage::new(canvas.width, canvas.height);
    let offset = style.shadow_offset();

    let block = layout::layout_block(glyphs, caption, canvas, style.margin, style.font_px)?;
    for line in &block.lines {
        draw_line(&mut image, glyphs, line, block.font_px, offset, style.shadow_color);
    }
    for line in &block.lines {
        draw_line(&mut image, glyphs, line, block.font_px, 0, style.text_color);
    }

    if let Some(line) = label_line(glyphs, style, label, canvas) {
        draw_line(&mut image, glyphs, &line, style.label_px, offset, style.shadow_color);
        draw_line(&mut image, glyphs, &line, style.label_px, 0, style.label_color);
    }

    Ok(image)
}

fn label_line(
    glyphs: &dyn GlyphSource,
    style: &CaptionStyle,
    label: &str,
    canvas: Dimensions,
) -> Option<PositionedLine> {
    let max_width = canvas.width as f32 - 2.0 * style.margin as f32;
    if max_width <= 0.0 {
        return None;
    }
    let text = layout::wrap_text(glyphs, &label.to_uppercase(), style.label_px, max_width)
        .into_iter()
        .next()?;
    let ascent = glyphs.line_metrics(style.label_px).ascent;

    Some(PositionedLine {
        width: layout::measure(glyphs, &text, style.label_px),
        x: style.margin as i32,
        baseline: (style.margin as f32 + ascent).round() as i32,
        text,
    })
}

fn draw_line(
    image: &mut RgbaImage,
    glyphs: &dyn GlyphSource,
    line: &PositionedLine,
    px: f32,
    offset: i32,
    color: [u8; 4],
) {
    let mut pen = line.x as f32;
    for ch in line.text.chars() {
        let (metrics, coverage) = glyphs.rasterize(ch, px);
        let left = pen.round() as i32 + metrics.xmin + offset;
        let top = line.baseline - (metrics.height as i32 + metrics.ymin) + offset;

        for row in 0..metrics.height {
            for col in 0..metrics.width {
                let cov = coverage[row * metrics.width + col];
                if cov > 0 {
                    blend(image, left + col as i32, top + row as i32, color, cov);
                }
            }
        }
        pen += metrics.advance;
    }
}

/// Source-over compositing of `color` scaled by glyph coverage.
fn blend(image: &mut RgbaImage, x: i32, y: i32, color: [u8; 4], coverage: u8) {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return;
    }
    let dst = image.get_pixel_mut(x as u32, y as u32);
    let src_a = color[3] as f32 / 255.0 * coverage as f32 / 255.0;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (color[c] as f32 * src_a + dst[c] as f32 * dst_a * (1.0 - src_a)) / out_a;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    *dst = Rgba(out);
}
