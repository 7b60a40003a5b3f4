// Dense optical flow - per-pixel Lucas-Kanade over a square window
//
// Single-level, single-iteration solve of the 2x2 normal equations at every
// pixel. Spatial gradients are central differences on the current frame,
// the temporal gradient is `current - previous`. Window samples outside the
// frame are clamped to the border.

use image::GrayImage;

/// Per-pixel flow, row-major, same size as the input frames
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
}

/// Compute dense flow from `previous` to `current`
///
/// Pixels whose structure tensor is singular (flat regions, pure edges)
/// get zero flow.
///
/// # Arguments
/// * `previous` - Frame at t-1
/// * `current` - Frame at t, same size as `previous`
/// * `radius` - Window half-width; the window is `(2r+1)^2` pixels
pub fn dense_lucas_kanade(previous: &GrayImage, current: &GrayImage, radius: usize) -> FlowField {
    let width = current.width() as usize;
    let height = current.height() as usize;
    let n = width * height;

    let at = |image: &GrayImage, x: isize, y: isize| -> f32 {
        let cx = x.clamp(0, width as isize - 1) as u32;
        let cy = y.clamp(0, height as isize - 1) as u32;
        image.get_pixel(cx, cy).0[0] as f32
    };

    let mut gx = vec![0.0f32; n];
    let mut gy = vec![0.0f32; n];
    let mut gt = vec![0.0f32; n];
    for y in 0..height as isize {
        for x in 0..width as isize {
            let i = y as usize * width + x as usize;
            gx[i] = 0.5 * (at(current, x + 1, y) - at(current, x - 1, y));
            gy[i] = 0.5 * (at(current, x, y + 1) - at(current, x, y - 1));
            gt[i] = at(current, x, y) - at(previous, x, y);
        }
    }

    let r = radius as isize;
    let mut flow_x = vec![0.0f32; n];
    let mut flow_y = vec![0.0f32; n];
    for y in 0..height as isize {
        for x in 0..width as isize {
            let mut h00 = 0.0f32;
            let mut h01 = 0.0f32;
            let mut h11 = 0.0f32;
            let mut b0 = 0.0f32;
            let mut b1 = 0.0f32;
            for wy in (y - r)..=(y + r) {
                let sy = wy.clamp(0, height as isize - 1) as usize;
                for wx in (x - r)..=(x + r) {
                    let sx = wx.clamp(0, width as isize - 1) as usize;
                    let j = sy * width + sx;
                    h00 += gx[j] * gx[j];
                    h01 += gx[j] * gy[j];
                    h11 += gy[j] * gy[j];
                    b0 -= gx[j] * gt[j];
                    b1 -= gy[j] * gt[j];
                }
            }

            let det = h00 * h11 - h01 * h01;
            if det.abs() < 1e-6 {
                continue;
            }
            let inv_det = 1.0 / det;
            let i = y as usize * width + x as usize;
            flow_x[i] = inv_det * (h11 * b0 - h01 * b1);
            flow_y[i] = inv_det * (h00 * b1 - h01 * b0);
        }
    }

    FlowField {
        x: flow_x,
        y: flow_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Smooth blob so every window has gradients in both directions
    fn blob(width: u32, height: u32, cx: f32, cy: f32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let v = 200.0 * (-(dx * dx + dy * dy) / 40.0).exp();
            Luma([v.round() as u8])
        })
    }

    #[test]
    fn test_identical_frames_have_zero_flow() {
        let frame = blob(24, 24, 12.0, 12.0);
        let flow = dense_lucas_kanade(&frame, &frame, 2);
        assert!(flow.x.iter().all(|v| *v == 0.0));
        assert!(flow.y.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_flat_frames_are_singular_and_zero() {
        let flat = GrayImage::from_pixel(16, 16, Luma([90]));
        let brighter = GrayImage::from_pixel(16, 16, Luma([120]));
        let flow = dense_lucas_kanade(&flat, &brighter, 2);
        assert!(flow.x.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_horizontal_shift_gives_positive_x_flow_at_blob() {
        let previous = blob(32, 32, 15.0, 16.0);
        let current = blob(32, 32, 16.0, 16.0);
        let flow = dense_lucas_kanade(&previous, &current, 3);
        let center = 16 * 32 + 16;
        assert!(
            flow.x[center] > 0.5 && flow.x[center] < 1.5,
            "expected ~1px x flow, got {}",
            flow.x[center]
        );
        assert!(
            flow.y[center].abs() < 0.3,
            "expected ~0 y flow, got {}",
            flow.y[center]
        );
    }
}
