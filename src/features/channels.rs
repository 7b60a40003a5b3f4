// Channels module - per-frame feature planes
//
// Every configured channel turns a (previous, current) grayscale frame pair
// into one row-major f32 plane of the frame's size. Planes are appended to
// the per-scale feature buffers frame by frame.

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::flow::{dense_lucas_kanade, FlowField};
use super::types::Channel;

/// Compute one plane per channel for the frame `current`
///
/// # Arguments
/// * `channels` - Channels in descriptor order
/// * `previous` - Frame at t-1 (the seed duplicate for the very first frame)
/// * `current` - Frame at t
/// * `flow_radius` - Lucas-Kanade window half-width, used only by flow channels
///
/// # Returns
/// Planes in the same order as `channels`
pub fn compute_planes(
    channels: &[Channel],
    previous: &GrayImage,
    current: &GrayImage,
    flow_radius: usize,
) -> Vec<Vec<f32>> {
    let mut flow: Option<FlowField> = None;
    channels
        .iter()
        .map(|channel| match channel {
            Channel::Intensity => current.pixels().map(|p| p.0[0] as f32).collect(),
            Channel::XDerivative => horizontal_sobel(current)
                .pixels()
                .map(|p| p.0[0] as f32)
                .collect(),
            Channel::YDerivative => vertical_sobel(current)
                .pixels()
                .map(|p| p.0[0] as f32)
                .collect(),
            Channel::TDerivative => current
                .pixels()
                .zip(previous.pixels())
                .map(|(next, prev)| next.0[0] as f32 - prev.0[0] as f32)
                .collect(),
            Channel::FlowX => flow
                .get_or_insert_with(|| dense_lucas_kanade(previous, current, flow_radius))
                .x
                .clone(),
            Channel::FlowY => flow
                .get_or_insert_with(|| dense_lucas_kanade(previous, current, flow_radius))
                .y
                .clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn ramp(width: u32, height: u32) -> GrayImage {
        // Intensity grows by 2 per column
        GrayImage::from_fn(width, height, |x, _| Luma([(x * 2) as u8]))
    }

    #[test]
    fn test_intensity_plane_is_row_major() {
        let frame = GrayImage::from_fn(3, 2, |x, y| Luma([(y * 3 + x) as u8]));
        let planes = compute_planes(&[Channel::Intensity], &frame, &frame, 1);
        assert_eq!(planes[0], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_sobel_planes_on_horizontal_ramp() {
        let frame = ramp(8, 8);
        let planes = compute_planes(
            &[Channel::XDerivative, Channel::YDerivative],
            &frame,
            &frame,
            1,
        );
        // Interior: (1 + 2 + 1) * (2 * 2) = 16 along x, nothing along y
        let interior = 4 * 8 + 4;
        assert_eq!(planes[0][interior], 16.0);
        assert_eq!(planes[1][interior], 0.0);
    }

    #[test]
    fn test_t_derivative_is_current_minus_previous() {
        let previous = GrayImage::from_pixel(4, 4, Luma([100]));
        let current = GrayImage::from_pixel(4, 4, Luma([40]));
        let planes = compute_planes(&[Channel::TDerivative], &previous, &current, 1);
        assert!(planes[0].iter().all(|v| *v == -60.0));
    }

    #[test]
    fn test_planes_follow_requested_order() {
        let frame = ramp(6, 6);
        let planes = compute_planes(
            &[Channel::TDerivative, Channel::Intensity],
            &frame,
            &frame,
            1,
        );
        assert_eq!(planes.len(), 2);
        assert!(planes[0].iter().all(|v| *v == 0.0));
        assert_eq!(planes[1][1], 2.0);
    }
}
