// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, tightly packed rows on both sides.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::presets::ScalePlan;

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall,
    SourceSizeMismatch { expected: usize, actual: usize },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall => write!(f, "Output buffer too small"),
            ScaleError::SourceSizeMismatch { expected, actual } => write!(
                f,
                "Source buffer holds {} bytes, plan expects {}",
                actual, expected
            ),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Scale tightly packed RGBA pixels into a caller-provided buffer.
/// `dst` must hold at least `plan.out.w * plan.out.h * 4` bytes.
pub fn scale_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    plan: &ScalePlan,
    dst: &mut [u8],
) -> Result<(), ScaleError> {
    let src_len = (plan.input.w as usize) * (plan.input.h as usize) * 4;
    if src_rgba.len() != src_len {
        return Err(ScaleError::SourceSizeMismatch {
            expected: src_len,
            actual: src_rgba.len(),
        });
    }
    let dst_len = (plan.out.w as usize) * (plan.out.h as usize) * 4;
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall);
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(plan.input.w, plan.input.h, src_rgba)?;
    let mut dst_image = TypedImage::<U8x4>::from_buffer(plan.out.w, plan.out.h, &mut dst[..dst_len])?;

    // Posters may carry transparent cut-outs; premultiply so edges don't halo.
    let opts = ResizeOptions::new().use_alpha(true);
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
    Ok(())
}

/// Allocate the output buffer and scale. Identity plans return a copy of the input.
pub fn downscale_rgba(src_rgba: &[u8], plan: &ScalePlan) -> Result<Vec<u8>, ScaleError> {
    if plan.is_identity() {
        return Ok(src_rgba.to_vec());
    }
    let mut out = vec![0u8; (plan.out.w as usize) * (plan.out.h as usize) * 4];
    let mut resizer = Resizer::new();
    scale_rgba_cpu(&mut resizer, src_rgba, plan, &mut out)?;
    Ok(out)
}
