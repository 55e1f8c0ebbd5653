//! Pure calculation functions for working-resolution geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the working dimensions for a source image.
///
/// The width is fixed to `working_width`; the height preserves the source
/// aspect ratio and is never less than one pixel. With `None` the native
/// dimensions are kept.
///
/// # Examples
/// ```
/// # use fidelity_gate::imaging::calculate_working_dimensions;
/// // 1024x768 → 512x384
/// assert_eq!(calculate_working_dimensions((1024, 768), Some(512)), (512, 384));
///
/// // Small sources are scaled up to the working width
/// assert_eq!(calculate_working_dimensions((256, 256), Some(512)), (512, 512));
///
/// // No working width: native size
/// assert_eq!(calculate_working_dimensions((300, 200), None), (300, 200));
/// ```
pub fn calculate_working_dimensions(source: (u32, u32), working_width: Option<u32>) -> (u32, u32) {
    let (src_w, src_h) = source;
    match working_width {
        None => source,
        Some(w) => {
            if src_w == 0 {
                return (w, src_h.max(1));
            }
            let h = (src_h as f64 * w as f64 / src_w as f64).round() as u32;
            (w, h.max(1))
        }
    }
}

/// Pixel tolerance when comparing working heights of differently-sized inputs.
///
/// Two sources with the same aspect ratio but different native sizes can
/// round to heights one pixel apart.
pub const HEIGHT_TOLERANCE: u32 = 1;

/// Check whether `other` lines up with `reference` at the working resolution.
///
/// At a fixed working width both are scaled to the same width, so they agree
/// when their working heights are within [`HEIGHT_TOLERANCE`]. Without a
/// working width nothing is resized and the native dimensions must match
/// exactly.
pub fn shapes_agree(reference: (u32, u32), other: (u32, u32), working_width: Option<u32>) -> bool {
    match working_width {
        None => reference == other,
        Some(_) => {
            let (_, ref_h) = calculate_working_dimensions(reference, working_width);
            let (_, other_h) = calculate_working_dimensions(other, working_width);
            ref_h.abs_diff(other_h) <= HEIGHT_TOLERANCE
        }
    }
}
