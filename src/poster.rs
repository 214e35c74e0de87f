//! Uploaded posters: raw bytes as received, decoded rasters, and the encoded
//! image part that is finally sent to the model.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};
use poster_scale::cpu::{ScaleError, downscale_rgba};
use poster_scale::presets::{ScaleTarget, Size, build_plan};
use tracing::debug;

use crate::error::{InsightError, InsightResult};
use crate::model::Part;

/// One uploaded poster file, not yet decoded.
#[derive(Debug, Clone)]
pub struct PosterUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl PosterUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a poster from disk. The file name (without directories) becomes
    /// the record's join key.
    pub fn from_path(path: &Path) -> InsightResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| InsightError::io(format!("reading {}", path.display()), e))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }

    /// Decode the upload into a raster image.
    pub fn decode(&self) -> InsightResult<Poster> {
        let format = image::guess_format(&self.bytes).ok();
        let image = image::load_from_memory(&self.bytes)
            .map_err(|e| InsightError::image(&self.filename, e))?;
        debug!(
            filename = %self.filename,
            width = image.width(),
            height = image.height(),
            "decoded poster"
        );
        Ok(Poster {
            filename: self.filename.clone(),
            image,
            format,
            raw: self.bytes.clone(),
        })
    }
}

/// A decoded poster.
pub struct Poster {
    filename: String,
    image: DynamicImage,
    format: Option<ImageFormat>,
    raw: Vec<u8>,
}

impl Poster {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> Size {
        Size {
            w: self.image.width(),
            h: self.image.height(),
        }
    }

    /// Produce the image part for the model call.
    ///
    /// PNG and JPEG uploads that need no resizing are forwarded byte for byte.
    /// Anything else is converted to RGBA, optionally downscaled, and sent as PNG.
    pub fn to_part(&self, scale: Option<ScaleTarget>) -> InsightResult<Part> {
        let plan = scale.map(|target| build_plan(self.size(), target));
        let needs_resize = plan.is_some_and(|p| !p.is_identity());

        if !needs_resize {
            if let Some(format @ (ImageFormat::Png | ImageFormat::Jpeg)) = self.format {
                return Ok(Part::image(format.to_mime_type(), self.raw.clone()));
            }
        }

        let rgba = self.image.to_rgba8();
        let (out, size) = match plan {
            Some(plan) if needs_resize => {
                let scaled = downscale_rgba(rgba.as_raw(), &plan).map_err(|source| {
                    InsightError::Scale {
                        filename: self.filename.clone(),
                        source,
                    }
                })?;
                (scaled, plan.out)
            }
            _ => (rgba.into_raw(), self.size()),
        };
        debug!(filename = %self.filename, w = size.w, h = size.h, "re-encoding poster as PNG");

        let img = RgbaImage::from_raw(size.w, size.h, out).ok_or_else(|| InsightError::Scale {
            filename: self.filename.clone(),
            source: ScaleError::BufferTooSmall,
        })?;
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| InsightError::image(&self.filename, e))?;
        Ok(Part::image(ImageFormat::Png.to_mime_type(), buf.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn encoded(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([220, 40, 40, 255])));
        let img = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img,
        };
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_png_is_forwarded_untouched() {
        let bytes = encoded(8, 12, ImageFormat::Png);
        let poster = PosterUpload::new("a.png", bytes.clone()).decode().unwrap();
        assert_eq!(poster.size(), Size { w: 8, h: 12 });
        assert_eq!(poster.to_part(None).unwrap(), Part::image("image/png", bytes));
    }

    #[test]
    fn test_jpeg_keeps_its_mime_type() {
        let bytes = encoded(8, 8, ImageFormat::Jpeg);
        let poster = PosterUpload::new("a.jpg", bytes).decode().unwrap();
        match poster.to_part(Some(ScaleTarget::MaxLongSide(64))).unwrap() {
            Part::Image { mime_type, .. } => assert_eq!(mime_type, "image/jpeg"),
            other => panic!("unexpected part: {:?}", other),
        }
    }

    #[test]
    fn test_downscaled_poster_is_png_of_planned_size() {
        let bytes = encoded(40, 80, ImageFormat::Jpeg);
        let poster = PosterUpload::new("big.jpg", bytes).decode().unwrap();
        let Part::Image { mime_type, data } =
            poster.to_part(Some(ScaleTarget::MaxLongSide(20))).unwrap()
        else {
            panic!("expected an image part");
        };
        assert_eq!(mime_type, "image/png");
        let back = image::load_from_memory(&data).unwrap();
        assert_eq!((back.width(), back.height()), (10, 20));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let err = PosterUpload::new("broken.png", b"not an image".to_vec())
            .decode()
            .err()
            .unwrap();
        assert_eq!(err.category(), "image");
        assert!(err.to_string().contains("broken.png"));
    }

    #[test]
    fn test_from_path_uses_bare_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spring.png");
        std::fs::write(&path, encoded(2, 2, ImageFormat::Png)).unwrap();
        let upload = PosterUpload::from_path(&path).unwrap();
        assert_eq!(upload.filename, "spring.png");
    }
}
