//! Fixed 4x4 Bayer dither pattern sampled by the trace sub-program to
//! jitter ray-march start offsets.

/// Edge length of the dither pattern texture.
pub const DITHER_DIM: u32 = 4;

/// Classic 4x4 Bayer ordering, row-major.
const BAYER_4X4: [u8; 16] = [0, 8, 2, 10, 12, 4, 14, 6, 3, 11, 1, 9, 15, 7, 13, 5];

/// Map one Bayer cell value to a byte: `round(v / 16 * 255)`.
fn dither_byte(value: u8) -> u8 {
    (f32::from(value) / 16.0 * 255.0).round() as u8
}

/// RGBA8 texel payload for the 4x4 dither texture.
///
/// Every channel of a texel carries the same byte, so the shader may read
/// any one of them. The texture is sampled with nearest-neighbor
/// filtering and carries no mip chain.
pub fn dither_texels() -> [u8; (DITHER_DIM * DITHER_DIM * 4) as usize] {
    let mut texels = [0u8; (DITHER_DIM * DITHER_DIM * 4) as usize];
    for (cell, &value) in BAYER_4X4.iter().enumerate() {
        let byte = dither_byte(value);
        texels[cell * 4..cell * 4 + 4].copy_from_slice(&[byte; 4]);
    }
    texels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_bit_exact() {
        // round(v / 16 * 255) over the fixed Bayer sequence.
        let expected: [u8; 16] = [
            0, 128, 32, 159, 191, 64, 223, 96, 48, 175, 16, 143, 239, 112, 207, 80,
        ];
        let texels = dither_texels();
        for (cell, &byte) in expected.iter().enumerate() {
            assert_eq!(texels[cell * 4], byte, "cell {cell}");
        }
    }

    #[test]
    fn channels_are_uniform() {
        let texels = dither_texels();
        for cell in texels.chunks_exact(4) {
            assert!(cell.iter().all(|&c| c == cell[0]));
        }
    }

    #[test]
    fn generation_is_reproducible() {
        assert_eq!(dither_texels(), dither_texels());
    }
}
