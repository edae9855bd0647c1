use rayon::prelude::*;

use crate::{
    error::Result,
    types::{
        BYTES_PER_COLOR_PIXEL, BYTES_PER_DEPTH_SAMPLE, Color, ColorFrame, RawDepthFrame,
        depth_millimetres, player_index,
    },
};

/// Color per player index; index 0 is the background.
pub const PLAYER_PALETTE: [Color; 8] = [
    Color::TRANSPARENT,
    Color::RED,
    Color::GREEN,
    Color::BLUE,
    Color::WHITE,
    Color::GOLD,
    Color::CYAN,
    Color::PLUM,
];

// Farthest distance the sensor reports, in millimetres.
pub const MAX_DEPTH_MM: u16 = 0x0FFF;

pub fn player_color(index: u8) -> Color {
    PLAYER_PALETTE[(index & 0x07) as usize]
}

/// Colorizes a depth frame by player index, mirrored horizontally.
pub fn decode(frame: &RawDepthFrame) -> Result<ColorFrame> {
    decode_with(frame, |sample| player_color(player_index(sample)).to_bgra())
}

/// Grayscale rendering of the depth distance: near is bright, far is dark and
/// unknown depth is black.
pub fn decode_intensity(frame: &RawDepthFrame) -> Result<ColorFrame> {
    decode_with(frame, |sample| {
        let depth = depth_millimetres(sample);
        if depth == 0 {
            return [0, 0, 0, 255];
        }
        let depth = u32::from(depth.min(MAX_DEPTH_MM));
        let value = (255 - 255 * depth / u32::from(MAX_DEPTH_MM)) as u8;
        [value, value, value, 255]
    })
}

fn decode_with<F>(frame: &RawDepthFrame, pixel: F) -> Result<ColorFrame>
where
    F: Fn(u16) -> [u8; 4] + Sync,
{
    frame.validate()?;

    let width = frame.width as usize;
    let src_stride = width * BYTES_PER_DEPTH_SAMPLE;
    let dst_stride = width * BYTES_PER_COLOR_PIXEL;
    let mut bgra = vec![0u8; frame.pixel_count() * BYTES_PER_COLOR_PIXEL];

    bgra.par_chunks_mut(dst_stride)
        .zip(frame.data.par_chunks_exact(src_stride))
        .for_each(|(dst_row, src_row)| {
            for (x, sample) in src_row.chunks_exact(BYTES_PER_DEPTH_SAMPLE).enumerate() {
                let sample = u16::from_le_bytes([sample[0], sample[1]]);
                let dst = (width - 1 - x) * BYTES_PER_COLOR_PIXEL;
                dst_row[dst..dst + BYTES_PER_COLOR_PIXEL].copy_from_slice(&pixel(sample));
            }
        });

    log::trace!("decoded {}x{} depth frame", frame.width, frame.height);

    Ok(ColorFrame {
        width: frame.width,
        height: frame.height,
        bgra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn reversed_columns(frame: &RawDepthFrame) -> RawDepthFrame {
        let stride = frame.width as usize * BYTES_PER_DEPTH_SAMPLE;
        let mut data = Vec::with_capacity(frame.data.len());
        for row in frame.data.chunks_exact(stride) {
            for sample in row.chunks_exact(BYTES_PER_DEPTH_SAMPLE).rev() {
                data.extend_from_slice(sample);
            }
        }
        RawDepthFrame::new(frame.width, frame.height, data)
    }

    fn decode_unmirrored(frame: &RawDepthFrame) -> Vec<u8> {
        frame
            .data
            .chunks_exact(BYTES_PER_DEPTH_SAMPLE)
            .flat_map(|s| player_color(s[0] & 0x07).to_bgra())
            .collect()
    }

    #[test]
    fn two_pixel_frame_is_mirrored() {
        let frame = RawDepthFrame::new(2, 1, vec![0x01, 0x00, 0x02, 0x00]);
        let color = decode(&frame).unwrap();

        assert_eq!(color.bgra, vec![0, 128, 0, 255, 0, 0, 255, 255]);
        assert_eq!(color.color_at(0, 0), Some(Color::GREEN));
        assert_eq!(color.color_at(1, 0), Some(Color::RED));
    }

    #[test]
    fn output_length_matches_dimensions() {
        for (w, h) in [(1, 1), (3, 2), (17, 5), (320, 240)] {
            let frame = RawDepthFrame::new(w, h, vec![0x03; (w * h) as usize * 2]);
            let color = decode(&frame).unwrap();
            assert_eq!(color.bgra.len(), (w * h * 4) as usize);
        }
    }

    #[test]
    fn mirrored_decode_matches_reversed_input() {
        let samples: Vec<u16> = (0..24u16).map(|i| (i * 97) << 3 | (i % 8)).collect();
        let frame = RawDepthFrame::from_samples(6, 4, &samples);

        let decoded = decode(&frame).unwrap();
        assert_eq!(decoded.bgra, decode_unmirrored(&reversed_columns(&frame)));
    }

    #[test]
    fn background_pixels_are_transparent() {
        let samples: Vec<u16> = (0..16u16).map(|i| (i * 311) << 3).collect();
        let frame = RawDepthFrame::from_samples(4, 4, &samples);
        let decoded = decode(&frame).unwrap();

        for px in decoded.bgra.chunks_exact(4) {
            assert_eq!(px[3], 0);
        }
    }

    #[test]
    fn every_player_maps_to_its_palette_entry() {
        let samples: Vec<u16> = (0..8u16).collect();
        let frame = RawDepthFrame::from_samples(8, 1, &samples);
        let decoded = decode(&frame).unwrap();

        for player in 0..8u32 {
            let x = 7 - player;
            assert_eq!(decoded.color_at(x, 0), Some(PLAYER_PALETTE[player as usize]));
        }
    }

    #[test]
    fn malformed_frames_are_rejected() {
        let short = RawDepthFrame::new(2, 2, vec![0; 6]);
        assert!(matches!(decode(&short), Err(PipelineError::InvalidFrame(_))));

        let empty = RawDepthFrame::new(0, 0, vec![]);
        assert!(matches!(decode(&empty), Err(PipelineError::InvalidFrame(_))));
    }

    #[test]
    fn intensity_maps_near_to_bright() {
        let frame = RawDepthFrame::from_samples(3, 1, &[0, 800 << 3, 4000 << 3]);
        let decoded = decode_intensity(&frame).unwrap();

        // mirrored: source x=0 lands at x=2
        assert_eq!(decoded.pixel(2, 0), Some([0, 0, 0, 255]));
        let near = decoded.pixel(1, 0).unwrap()[0];
        let far = decoded.pixel(0, 0).unwrap()[0];
        assert!(near > far);
        assert_eq!(decoded.pixel(1, 0).unwrap()[3], 255);
    }
}
