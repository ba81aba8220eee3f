//! Image loading collaborator.

use djv_core::{DjvError, FrameBuffer, PixelFormat, Result};
use std::path::Path;
use tracing::info;

/// Produces decoded frames of one sequence.
pub trait FrameLoader {
    /// Inclusive frame range of the sequence.
    fn frame_range(&self) -> (i64, i64);

    /// Decode `frame`.
    fn load(&mut self, frame: i64) -> Result<FrameBuffer>;

    fn contains(&self, frame: i64) -> bool {
        let (first, last) = self.frame_range();
        (first..=last).contains(&frame)
    }
}

/// Loader for a numbered image sequence such as `shot.1-48.dpx`.
///
/// Produces color-bar frames rotated by frame number instead of decoding
/// pixel data; format decoding lives in the codec plugins. The pixel format,
/// and so each frame's cache cost, follows the file extension.
#[derive(Debug, Clone)]
pub struct SequenceLoader {
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    first: i64,
    last: i64,
    loads: u64,
}

impl SequenceLoader {
    /// Open a sequence by name. The frame range comes from a `first-last`
    /// component of the file name; a lone number names a single frame, and
    /// a name without numbers is a one-frame sequence at frame 0.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy().to_string();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DjvError::InvalidParameter(format!("Not a sequence file name: {name}")))?;

        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(format_for_extension)
            .ok_or_else(|| DjvError::UnsupportedFormat(name.clone()))?;
        let (first, last) = parse_frame_range(file_name)?;
        info!(sequence = %name, first, last, ?format, "Opened sequence");

        Ok(Self {
            name,
            width: 1920,
            height: 1080,
            format,
            first,
            last,
            loads: 0,
        })
    }

    /// Override the frame dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Override the pixel format implied by the extension.
    #[must_use]
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame_count(&self) -> i64 {
        self.last - self.first + 1
    }

    /// Number of frames decoded so far.
    pub fn loads(&self) -> u64 {
        self.loads
    }
}

impl FrameLoader for SequenceLoader {
    fn frame_range(&self) -> (i64, i64) {
        (self.first, self.last)
    }

    fn load(&mut self, frame: i64) -> Result<FrameBuffer> {
        if !self.contains(frame) {
            return Err(DjvError::InvalidParameter(format!(
                "Frame {} out of range ({}-{})",
                frame, self.first, self.last
            )));
        }
        self.loads += 1;
        Ok(FrameBuffer::test_pattern(self.width, self.height, self.format, frame))
    }
}

/// Pixel format a sequence of this file type decodes to.
fn format_for_extension(ext: &str) -> Option<PixelFormat> {
    let format = match ext.to_ascii_lowercase().as_str() {
        "dpx" | "cin" => PixelFormat::Rgb10,
        "exr" => PixelFormat::Rgba16F,
        "tif" | "tiff" => PixelFormat::Rgba16,
        "hdr" | "pfm" => PixelFormat::Rgba32F,
        "png" | "jpg" | "jpeg" | "tga" | "bmp" => PixelFormat::Rgba8,
        "ppm" => PixelFormat::Rgb8,
        "pgm" => PixelFormat::L16,
        "mov" | "mp4" | "mkv" => PixelFormat::Yuv420P,
        _ => return None,
    };
    Some(format)
}

fn parse_frame_range(file_name: &str) -> Result<(i64, i64)> {
    for part in file_name.split('.').skip(1) {
        if let Some((first, last)) = part.split_once('-') {
            if let (Ok(first), Ok(last)) = (first.parse::<i64>(), last.parse::<i64>()) {
                if last < first {
                    return Err(DjvError::InvalidParameter(format!(
                        "Empty frame range {first}-{last} in {file_name}"
                    )));
                }
                return Ok((first, last));
            }
        } else if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(frame) = part.parse::<i64>() {
                return Ok((frame, frame));
            }
        }
    }
    Ok((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_parses_range() {
        let loader = SequenceLoader::open("renders/shot.1-48.dpx").unwrap();
        assert_eq!(loader.frame_range(), (1, 48));
        assert_eq!(loader.frame_count(), 48);
    }

    #[test]
    fn test_open_single_frame() {
        let loader = SequenceLoader::open("plate.0042.exr").unwrap();
        assert_eq!(loader.frame_range(), (42, 42));
        let loader = SequenceLoader::open("still.png").unwrap();
        assert_eq!(loader.frame_range(), (0, 0));
    }

    #[test]
    fn test_open_picks_format_from_extension() {
        let cases = [
            ("shot.1-48.dpx", PixelFormat::Rgb10),
            ("plate.1-10.EXR", PixelFormat::Rgba16F),
            ("scan.1-2.tiff", PixelFormat::Rgba16),
            ("clip.mov", PixelFormat::Yuv420P),
            ("matte.1-4.pgm", PixelFormat::L16),
        ];
        for (name, format) in cases {
            assert_eq!(SequenceLoader::open(name).unwrap().format(), format, "{name}");
        }
    }

    #[test]
    fn test_open_rejects_unknown_extension() {
        assert!(matches!(
            SequenceLoader::open("notes.1-3.txt"),
            Err(DjvError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            SequenceLoader::open("shot"),
            Err(DjvError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_open_rejects_reversed_range() {
        assert!(SequenceLoader::open("shot.10-1.dpx").is_err());
    }

    #[test]
    fn test_load_out_of_range_fails() {
        let mut loader = SequenceLoader::open("shot.1-3.tif").unwrap().with_size(8, 8);
        assert!(loader.load(2).is_ok());
        assert!(matches!(loader.load(4), Err(DjvError::InvalidParameter(_))));
        assert_eq!(loader.loads(), 1);
    }

    #[test]
    fn test_loaded_frame_has_requested_size() {
        let mut loader = SequenceLoader::open("shot.1-3.tif").unwrap().with_size(32, 16);
        let frame = loader.load(1).unwrap();
        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(frame.format, PixelFormat::Rgba16);
        assert_eq!(frame.memory_size(), 32 * 8 * 16);
    }

    #[test]
    fn test_format_override_changes_frame_cost() {
        let mut loader = SequenceLoader::open("clip.1-2.mov")
            .unwrap()
            .with_size(64, 64)
            .with_format(PixelFormat::L8);
        assert_eq!(loader.load(1).unwrap().memory_size(), 64 * 64);
    }
}
