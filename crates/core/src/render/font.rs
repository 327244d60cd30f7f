use std::path::{Path, PathBuf};

use tracing::debug;

use crate::render::layout::{GlyphMetrics, GlyphSource, LineMetrics};

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("no usable font found (tried {tried})")]
    NotFound { tried: String },

    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse font {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// First existing font among the configured path, well-known system
/// locations and the user's font directory.
pub fn resolve_font(configured: Option<&Path>) -> Result<PathBuf, FontError> {
    let mut candidates: Vec<PathBuf> = configured.map(Path::to_path_buf).into_iter().collect();
    candidates.extend(SYSTEM_FONTS.iter().map(PathBuf::from));
    if let Some(dir) = dirs::font_dir() {
        candidates.push(dir.join("DejaVuSans.ttf"));
    }

    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| FontError::NotFound {
            tried: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

pub struct FontdueGlyphs {
    font: fontdue::Font,
}

impl FontdueGlyphs {
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default()).map_err(
            |reason| FontError::Parse {
                path: path.to_path_buf(),
                reason: reason.to_string(),
            },
        )?;
        debug!(path = %path.display(), "font loaded");
        Ok(Self { font })
    }
}

fn convert(metrics: fontdue::Metrics) -> GlyphMetrics {
    GlyphMetrics {
        advance: metrics.advance_width,
        xmin: metrics.xmin,
        ymin: metrics.ymin,
        width: metrics.width,
        height: metrics.height,
    }
}

impl GlyphSource for FontdueGlyphs {
    fn metrics(&self, ch: char, px: f32) -> GlyphMetrics {
        convert(self.font.metrics(ch, px))
    }

    fn rasterize(&self, ch: char, px: f32) -> (GlyphMetrics, Vec<u8>) {
        let (metrics, coverage) = self.font.rasterize(ch, px);
        (convert(metrics), coverage)
    }

    fn line_metrics(&self, px: f32) -> LineMetrics {
        match self.font.horizontal_line_metrics(px) {
            Some(m) => LineMetrics {
                ascent: m.ascent,
                line_height: m.new_line_size,
            },
            None => LineMetrics {
                ascent: 0.8 * px,
                line_height: 1.2 * px,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_font_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("custom.ttf");
        std::fs::write(&font, b"not parsed here").unwrap();
        assert_eq!(resolve_font(Some(&font)).unwrap(), font);
    }

    #[test]
    fn garbage_font_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("broken.ttf");
        std::fs::write(&font, b"definitely not a font").unwrap();
        assert!(matches!(FontdueGlyphs::load(&font), Err(FontError::Parse { .. })));
    }
}
