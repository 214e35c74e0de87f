// SPDX-License-Identifier: MIT
//! # Scaling Presets and Plan Computation
//!
//! A [`ScalePlan`] is computed once per poster from its decoded size and the
//! chosen [`ScaleTarget`]. The aspect ratio is always preserved: posters carry
//! typography and faces that a distorted image would misrepresent to the model.
//!
//! - No upscaling: posters smaller than the target are left unchanged
//! - Output sides are clamped to at least 1px

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// The size constraint applied to a poster before upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Clamp the longest side to a maximum value, derive the other side proportionally.
    MaxLongSide(u32),
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Target size constraint used for planning
    pub target: ScaleTarget,
    /// Final computed output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// True when the plan keeps the input dimensions, so no resize is needed.
    pub fn is_identity(&self) -> bool {
        self.input == self.out
    }
}

/// Compute a scaling plan for `input` under `target`.
pub fn build_plan(input: Size, target: ScaleTarget) -> ScalePlan {
    let (w, h) = match target {
        ScaleTarget::MaxLongSide(max_side) => fit_long_side(input, max_side),
    };
    ScalePlan {
        input,
        target,
        out: Size { w, h },
    }
}

/// Clamp the longest side to `max_long`, scaling the other side proportionally.
/// Never upscales.
fn fit_long_side(input: Size, max_long: u32) -> (u32, u32) {
    let (w, h) = (input.w as f64, input.h as f64);
    let long = w.max(h).max(1.0);
    let s = (max_long as f64 / long).min(1.0);
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
    )
}

/// Token-efficient presets for poster upload.
///
/// Each preset clamps the longest side of the poster. Posters are mostly
/// portrait, so the longest side is the height in practice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TokenPreset {
    /// 1024px longest side. Keeps small slogan text legible.
    #[value(name = "long1024")]
    Long1024,
    /// 768px longest side. Balanced default for typical 1080×1920 posters.
    #[value(name = "long768")]
    Long768,
    /// 512px longest side. Colour and composition only; small copy may be lost.
    #[value(name = "long512")]
    Long512,
}

impl TokenPreset {
    /// Convert preset to the corresponding ScaleTarget for plan computation.
    pub fn to_target(self) -> ScaleTarget {
        match self {
            TokenPreset::Long1024 => ScaleTarget::MaxLongSide(1024),
            TokenPreset::Long768 => ScaleTarget::MaxLongSide(768),
            TokenPreset::Long512 => ScaleTarget::MaxLongSide(512),
        }
    }
}
