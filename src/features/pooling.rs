// Pooling module - block reduction of a local spatio-temporal neighborhood
//
// A `local_duration x local_height x local_width` neighborhood is split into
// blocks of `t_block x y_block x x_block` pixels. Blocks are emitted
// t-block major, then y-block, then x-block.

use crate::index::FrameLayout;

use super::types::PoolingType;

/// Window and block sizes, `[t, y, x]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolingGeometry {
    pub local: [usize; 3],
    pub block: [usize; 3],
}

impl PoolingGeometry {
    pub fn blocks(&self) -> [usize; 3] {
        [
            self.local[0] / self.block[0],
            self.local[1] / self.block[1],
            self.local[2] / self.block[2],
        ]
    }

    pub fn n_blocks(&self) -> usize {
        self.blocks().iter().product()
    }
}

/// Append the pooled values of one channel neighborhood to `out`
///
/// # Arguments
/// * `buffer` - Frame-major feature plane stack for one channel
/// * `layout` - Layout of `buffer`
/// * `origin` - `[t, y, x]` of the neighborhood's first pixel inside `buffer`
pub fn pool_neighborhood(
    buffer: &[f32],
    layout: &FrameLayout,
    origin: [usize; 3],
    geometry: &PoolingGeometry,
    pooling: PoolingType,
    out: &mut Vec<f32>,
) {
    let [bt, by, bx] = geometry.block;
    let [nt, ny, nx] = geometry.blocks();
    let count = (bt * by * bx) as f32;

    for tb in 0..nt {
        for yb in 0..ny {
            for xb in 0..nx {
                let mut acc = match pooling {
                    PoolingType::Average => 0.0f32,
                    PoolingType::Max => f32::NEG_INFINITY,
                };
                for t in 0..bt {
                    for y in 0..by {
                        let row = layout.encode(
                            origin[0] + tb * bt + t,
                            [origin[1] + yb * by + y, origin[2] + xb * bx],
                        );
                        for &value in &buffer[row..row + bx] {
                            acc = match pooling {
                                PoolingType::Average => acc + value,
                                PoolingType::Max => acc.max(value),
                            };
                        }
                    }
                }
                out.push(match pooling {
                    PoolingType::Average => acc / count,
                    PoolingType::Max => acc,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Buffer whose value is its own flat index
    fn indexed_buffer(frames: usize, height: usize, width: usize) -> Vec<f32> {
        (0..frames * height * width).map(|i| i as f32).collect()
    }

    #[test]
    fn test_average_pooling_block_order() {
        let layout = FrameLayout::new([4, 4]);
        let buffer = indexed_buffer(2, 4, 4);
        let geometry = PoolingGeometry {
            local: [2, 4, 4],
            block: [2, 2, 2],
        };
        let mut out = Vec::new();
        pool_neighborhood(&buffer, &layout, [0, 0, 0], &geometry, PoolingType::Average, &mut out);

        assert_eq!(geometry.n_blocks(), 4);
        // Block (y0, x0): mean of {0,1,4,5,16,17,20,21} = 10.5
        // Moving one x-block adds 2, one y-block adds 8
        assert_eq!(out, vec![10.5, 12.5, 18.5, 20.5]);
    }

    #[test]
    fn test_max_pooling_picks_block_maximum() {
        let layout = FrameLayout::new([4, 4]);
        let buffer = indexed_buffer(2, 4, 4);
        let geometry = PoolingGeometry {
            local: [2, 4, 4],
            block: [1, 4, 4],
        };
        let mut out = Vec::new();
        pool_neighborhood(&buffer, &layout, [0, 0, 0], &geometry, PoolingType::Max, &mut out);
        assert_eq!(out, vec![15.0, 31.0]);
    }

    #[test]
    fn test_origin_offsets_into_buffer() {
        let layout = FrameLayout::new([4, 4]);
        let buffer = indexed_buffer(3, 4, 4);
        let geometry = PoolingGeometry {
            local: [1, 1, 1],
            block: [1, 1, 1],
        };
        let mut out = Vec::new();
        pool_neighborhood(&buffer, &layout, [2, 3, 1], &geometry, PoolingType::Average, &mut out);
        assert_eq!(out, vec![(2 * 16 + 3 * 4 + 1) as f32]);
    }
}
