// SPDX-License-Identifier: MIT
//! # poster-scale: Token-Efficient Poster Downscaling
//!
//! Posters are usually exported at print-ish resolutions (1080×1920 and up),
//! while a vision-language model bills and reasons per image patch. This crate
//! shrinks a decoded RGBA poster so its longest side fits a token preset before
//! the image is uploaded.
//!
//! ## Key Components
//!
//! - [`presets`]: Plan computation and the token presets exposed on the CLI
//! - [`cpu`]: CPU scaling built on `fast_image_resize`
//!
//! ## Usage Example
//!
//! ```rust
//! use poster_scale::cpu::downscale_rgba;
//! use poster_scale::presets::{build_plan, ScaleTarget, Size};
//!
//! let input = Size { w: 1080, h: 1920 };
//! let plan = build_plan(input, ScaleTarget::MaxLongSide(640));
//! assert_eq!((plan.out.w, plan.out.h), (360, 640));
//!
//! let rgba = vec![255u8; (input.w * input.h * 4) as usize];
//! let scaled = downscale_rgba(&rgba, &plan).unwrap();
//! assert_eq!(scaled.len(), (plan.out.w * plan.out.h * 4) as usize);
//! ```

pub mod cpu;
pub mod presets;
