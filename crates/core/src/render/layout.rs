//! Caption layout: greedy word wrap and centring on a fixed canvas.

use crate::types::Dimensions;

/// Captions are never shrunk below this size.
pub const MIN_FONT_PX: f32 = 6.0;
const SHRINK_STEP: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphMetrics {
    pub advance: f32,
    pub xmin: i32,
    pub ymin: i32,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    pub line_height: f32,
}

/// Access to a font's glyph metrics and coverage bitmaps.
pub trait GlyphSource: Send + Sync {
    fn metrics(&self, ch: char, px: f32) -> GlyphMetrics;

    /// Coverage bitmap, row-major, `width * height` bytes.
    fn rasterize(&self, ch: char, px: f32) -> (GlyphMetrics, Vec<u8>);

    fn line_metrics(&self, px: f32) -> LineMetrics;
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LayoutError {
    #[error("canvas {canvas} leaves no room inside a {margin}px margin")]
    NoRoom { canvas: Dimensions, margin: u32 },

    #[error("a single glyph does not fit in {max_width}px even at {px}px")]
    GlyphTooWide { max_width: f32, px: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionedLine {
    pub text: String,
    pub x: i32,
    pub baseline: i32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub font_px: f32,
    pub lines: Vec<PositionedLine>,
}

/// Rendered width of `text`, including ink that hangs past the last advance.
pub fn measure(glyphs: &dyn GlyphSource, text: &str, px: f32) -> f32 {
    let mut pen = 0.0f32;
    let mut extent = 0.0f32;
    for ch in text.chars() {
        let m = glyphs.metrics(ch, px);
        let ink = m.xmin.max(0) as f32 + m.width as f32;
        extent = extent.max(pen + m.advance.max(ink));
        pen += m.advance;
    }
    extent
}

/// Greedy wrap. Words wider than `max_width` are broken between characters.
pub fn wrap_text(glyphs: &dyn GlyphSource, text: &str, px: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure(glyphs, &candidate, px) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if measure(glyphs, word, px) <= max_width {
            current = word.to_string();
            continue;
        }

        for ch in word.chars() {
            let mut piece = current.clone();
            piece.push(ch);
            if current.is_empty() || measure(glyphs, &piece, px) <= max_width {
                current = piece;
            } else {
                lines.push(std::mem::replace(&mut current, ch.to_string()));
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrap `text` inside `canvas` minus `margin` on each side and centre the
/// block both ways. The font shrinks from `font_px` until every line fits
/// the width and, where possible, the block fits the height.
pub fn layout_block(
    glyphs: &dyn GlyphSource,
    text: &str,
    canvas: Dimensions,
    margin: u32,
    font_px: f32,
) -> Result<CaptionLayout, LayoutError> {
    let max_width = canvas.width as f32 - 2.0 * margin as f32;
    let max_height = canvas.height as f32 - 2.0 * margin as f32;
    if max_width <= 0.0 || max_height <= 0.0 {
        return Err(LayoutError::NoRoom { canvas, margin });
    }

    let mut px = font_px.max(MIN_FONT_PX);
    let (lines, widths) = loop {
        let lines = wrap_text(glyphs, text, px, max_width);
        let widths: Vec<f32> = lines.iter().map(|l| measure(glyphs, l, px)).collect();
        let fits_width = widths.iter().all(|w| *w <= max_width);
        let block_height = lines.len() as f32 * glyphs.line_metrics(px).line_height;

        if fits_width && block_height <= max_height {
            break (lines, widths);
        }
        let next = px * SHRINK_STEP;
        if next < MIN_FONT_PX {
            if !fits_width {
                return Err(LayoutError::GlyphTooWide { max_width, px });
            }
            // overflowing lines get clipped at the canvas edge
            break (lines, widths);
        }
        px = next;
    };

    let metrics = glyphs.line_metrics(px);
    let block_height = lines.len() as f32 * metrics.line_height;
    let top = (canvas.height as f32 - block_height) / 2.0;

    let lines = lines
        .into_iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (text, width))| PositionedLine {
            x: ((canvas.width as f32 - width) / 2.0).round() as i32,
            baseline: (top + metrics.ascent + i as f32 * metrics.line_height).round() as i32,
            text,
            width,
        })
        .collect();

    Ok(CaptionLayout { font_px: px, lines })
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::render::fakes::BlockGlyphs;

    #[test]
    fn short_text_stays_on_one_line() {
        let lines = wrap_text(&BlockGlyphs, "hello world", 10.0, 1000.0);
        assert_eq!(lines, vec!["hello world"]);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        // six px per glyph at 10px
        let lines = wrap_text(&BlockGlyphs, "aaa bbb ccc", 10.0, 45.0);
        assert_eq!(lines, vec!["aaa bbb", "ccc"]);
    }

    #[test]
    fn long_words_are_broken() {
        let lines = wrap_text(&BlockGlyphs, "abcdefghij", 10.0, 24.0);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrapped_lines_never_exceed_width() {
        let mut rng = StdRng::seed_from_u64(42);
        let alphabet: Vec<char> = "abc defghij klmnop WWW iii  —é".chars().collect();

        for _ in 0..300 {
            let len = rng.gen_range(0..200);
            let text: String = (0..len)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect();
            let margin = rng.gen_range(0..120);
            let width = 2 * margin + rng.gen_range(8..1200);
            let canvas = Dimensions::new(width, 1920);

            let layout = layout_block(&BlockGlyphs, &text, canvas, margin, 64.0).unwrap();
            let max_width = width as f32 - 2.0 * margin as f32;
            for line in &layout.lines {
                let measured = measure(&BlockGlyphs, &line.text, layout.font_px);
                assert!(measured <= max_width, "{:?} is {measured}px > {max_width}px", line.text);
                assert!(line.x >= margin as i32 - 1);
            }
        }
    }

    #[test]
    fn block_is_vertically_centred() {
        let canvas = Dimensions::new(720, 1280);
        let layout = layout_block(&BlockGlyphs, "one two three", canvas, 80, 40.0).unwrap();
        assert_eq!(layout.lines.len(), 1);
        let metrics = BlockGlyphs.line_metrics(layout.font_px);
        let top = layout.lines[0].baseline as f32 - metrics.ascent;
        let bottom = top + metrics.line_height;
        assert!(((top + bottom) / 2.0 - 640.0).abs() <= 1.0);
    }

    #[test]
    fn margin_wider_than_canvas_is_rejected() {
        let err = layout_block(&BlockGlyphs, "x", Dimensions::new(100, 100), 60, 20.0).unwrap_err();
        assert!(matches!(err, LayoutError::NoRoom { .. }));
    }
}
