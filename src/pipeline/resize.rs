//! Resize geometry.
//!
//! Pure functions computing the target size of an image from its original
//! size and a declarative bound. All bounds use `0` for "not given".
//!
//! ## Rules
//!
//! 1. No explicit width/height but a short/long side given: the shorter
//!    original axis is bounded by `short_side`, the longer by `long_side`.
//! 2. Power-of-two mode: when a bound larger than [`MIN_CONSTRAINING_BOUND`]
//!    is below its original axis, both axes are halved together for as long
//!    as the halved size still covers every such bound, then rounded up.
//!    Bounds at or above their original axis do not limit the halving.
//! 3. Otherwise both bounds given are returned as-is; a single bound derives
//!    the other axis from the aspect ratio, rounded to nearest.
//! 4. Results never enlarge. An enlargement on either axis, or an empty
//!    axis, yields the original size so callers can skip resampling.

/// Bounds at or below this many pixels do not constrain power-of-two halving.
pub const MIN_CONSTRAINING_BOUND: u32 = 3;

/// Integer target size for resampling.
///
/// Returns `(orig_w, orig_h)` when no resize should happen.
pub fn compute_dimensions(
    orig_w: u32,
    orig_h: u32,
    desired_w: u32,
    desired_h: u32,
    short_side: u32,
    long_side: u32,
    reduce_by_pow2: bool,
) -> (u32, u32) {
    if orig_w == 0 || orig_h == 0 {
        return (orig_w, orig_h);
    }

    let (dw, dh) = oriented_bounds(orig_w, orig_h, desired_w, desired_h, short_side, long_side);
    let (ow, oh) = (orig_w as f64, orig_h as f64);

    let (w, h) = if reduce_by_pow2 && pow2_applies(ow, oh, dw, dh) {
        let (w, h) = halve_to_bounds(ow, oh, dw, dh);
        (w.ceil(), h.ceil())
    } else {
        match (dw, dh) {
            (0, 0) => return (orig_w, orig_h),
            (w, 0) => (w as f64, (w as f64 * oh / ow).round()),
            (0, h) => ((h as f64 * ow / oh).round(), h as f64),
            (w, h) => (w as f64, h as f64),
        }
    };

    if w < 1.0 || h < 1.0 || w > ow || h > oh {
        return (orig_w, orig_h);
    }
    (w as u32, h as u32)
}

/// Float variant of [`compute_dimensions`] without rounding.
///
/// Used to rewrite the declared size of pass-through images: pixels are
/// untouched but the page layout sees the image at its resized size.
pub fn compute_display_size(
    orig_w: f32,
    orig_h: f32,
    desired_w: u32,
    desired_h: u32,
    short_side: u32,
    long_side: u32,
    reduce_by_pow2: bool,
) -> (f32, f32) {
    if orig_w <= 0.0 || orig_h <= 0.0 {
        return (orig_w, orig_h);
    }

    let (dw, dh) = if orig_w < orig_h {
        oriented_bounds(1, 2, desired_w, desired_h, short_side, long_side)
    } else {
        oriented_bounds(2, 1, desired_w, desired_h, short_side, long_side)
    };
    let (ow, oh) = (orig_w as f64, orig_h as f64);

    let (w, h) = if reduce_by_pow2 && pow2_applies(ow, oh, dw, dh) {
        halve_to_bounds(ow, oh, dw, dh)
    } else {
        match (dw, dh) {
            (0, 0) => return (orig_w, orig_h),
            (w, 0) => (w as f64, w as f64 * oh / ow),
            (0, h) => (h as f64 * ow / oh, h as f64),
            (w, h) => (w as f64, h as f64),
        }
    };

    if w <= 0.0 || h <= 0.0 || w > ow || h > oh {
        return (orig_w, orig_h);
    }
    (w as f32, h as f32)
}

/// Map a 0–100 quality onto PNG compression effort 0–9.
///
/// Higher quality means less effort: 100 → 0, 80 → 2, 0 → 9.
pub fn png_effort(quality: u8) -> u8 {
    (10 - quality.min(100) / 10).min(9)
}

fn oriented_bounds(
    orig_w: u32,
    orig_h: u32,
    desired_w: u32,
    desired_h: u32,
    short_side: u32,
    long_side: u32,
) -> (u32, u32) {
    if desired_w != 0 || desired_h != 0 || (short_side == 0 && long_side == 0) {
        return (desired_w, desired_h);
    }
    if orig_w < orig_h {
        (short_side, long_side)
    } else {
        (long_side, short_side)
    }
}

fn constrains(bound: u32) -> bool {
    bound > MIN_CONSTRAINING_BOUND
}

fn pow2_applies(ow: f64, oh: f64, dw: u32, dh: u32) -> bool {
    (constrains(dw) && (dw as f64) < ow) || (constrains(dh) && (dh as f64) < oh)
}

fn halve_to_bounds(ow: f64, oh: f64, dw: u32, dh: u32) -> (f64, f64) {
    // Only axes whose bound is below the original limit the halving.
    let limit_w = constrains(dw) && (dw as f64) < ow;
    let limit_h = constrains(dh) && (dh as f64) < oh;
    let covers = |w: f64, h: f64| {
        (!limit_w || w >= dw as f64) && (!limit_h || h >= dh as f64)
    };
    let (mut w, mut h) = (ow, oh);
    while covers(w / 2.0, h / 2.0) {
        w /= 2.0;
        h /= 2.0;
    }
    (w, h)
}
