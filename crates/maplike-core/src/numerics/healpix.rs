//! HEALPix resolution helpers and NESTED to RING index conversion.
//!
//! Only the integer bookkeeping needed to group base pixels under coarse
//! pixels is provided; no geometry (angles, neighbours) is computed here.

const BASE_FACE_COUNT: usize = 12;
const JRLL: [i64; BASE_FACE_COUNT] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
const JPLL: [i64; BASE_FACE_COUNT] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];
const MAX_ORDER: u32 = 29;

pub const fn is_valid_nside(nside: u32) -> bool {
    nside != 0 && nside.is_power_of_two() && nside.trailing_zeros() <= MAX_ORDER
}

pub const fn nside_to_npix(nside: u32) -> usize {
    let nside = nside as usize;
    BASE_FACE_COUNT * nside * nside
}

/// Returns the power-of-two `nside` of a full-sky map with `npix` pixels.
pub fn npix_to_nside(npix: usize) -> Option<u32> {
    if npix == 0 || npix % BASE_FACE_COUNT != 0 {
        return None;
    }
    let face_pixels = npix / BASE_FACE_COUNT;
    let nside = (face_pixels as f64).sqrt().round() as u64;
    if nside * nside != face_pixels as u64 {
        return None;
    }
    let nside = u32::try_from(nside).ok()?;
    is_valid_nside(nside).then_some(nside)
}

/// Converts a NESTED pixel index to the RING index of the same pixel.
///
/// `nside` must satisfy [`is_valid_nside`] and `pixel < nside_to_npix(nside)`.
pub fn nest_to_ring(nside: u32, pixel: usize) -> usize {
    let nside = i64::from(nside);
    let face_pixels = nside * nside;
    let pixel = pixel as i64;
    let face = pixel / face_pixels;
    let within_face = pixel % face_pixels;
    let ix = compress_bits(within_face);
    let iy = compress_bits(within_face >> 1);
    xyf_to_ring(nside, ix, iy, face as usize) as usize
}

fn xyf_to_ring(nside: i64, ix: i64, iy: i64, face: usize) -> i64 {
    let nl4 = 4 * nside;
    let npix = 12 * nside * nside;
    let ncap = 2 * nside * (nside - 1);
    let jr = JRLL[face] * nside - ix - iy - 1;

    let (ring_pixels, pixels_before, kshift) = if jr < nside {
        (jr, 2 * jr * (jr - 1), 0)
    } else if jr > 3 * nside {
        let nr = nl4 - jr;
        (nr, npix - 2 * (nr + 1) * nr, 0)
    } else {
        (nside, ncap + (jr - nside) * nl4, (jr - nside) & 1)
    };

    let mut jp = (JPLL[face] * ring_pixels + ix - iy + 1 + kshift) / 2;
    if jp > nl4 {
        jp -= nl4;
    } else if jp < 1 {
        jp += nl4;
    }

    pixels_before + jp - 1
}

// Gathers the even-position bits of `value` into a contiguous integer.
fn compress_bits(value: i64) -> i64 {
    let mut compressed = 0;
    for bit in 0..=MAX_ORDER as i64 {
        compressed |= ((value >> (2 * bit)) & 1) << bit;
    }
    compressed
}
