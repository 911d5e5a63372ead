//! Shared math utilities for detection and tracking backends.
//!
//! Provides bounding-box IoU, non-maximum suppression, grayscale conversion,
//! pyramid downsampling and normalized cross-correlation.

use ndarray::{Array2, ArrayView2, Zip};

use crate::shared::frame::Frame;

/// Pixel box `[x1, y1, x2, y2]` with a detection score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredBox {
    pub bbox: [f64; 4],
    pub score: f64,
}

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Greedy non-maximum suppression; output is sorted by descending score.
pub fn nms(boxes: &mut [ScoredBox], iou_thresh: f64) -> Vec<ScoredBox> {
    boxes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<ScoredBox> = Vec::new();
    for candidate in boxes.iter() {
        if keep
            .iter()
            .all(|k| bbox_iou(&k.bbox, &candidate.bbox) <= iou_thresh)
        {
            keep.push(*candidate);
        }
    }
    keep
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Luma (BT.601) plane of an RGB frame, shape `(height, width)`.
pub fn to_grayscale(frame: &Frame) -> Array2<f32> {
    let rgb = frame.as_ndarray();
    let (h, w) = (frame.height() as usize, frame.width() as usize);
    if frame.channels() < 3 {
        return Array2::from_shape_fn((h, w), |(y, x)| rgb[[y, x, 0]] as f32);
    }
    Array2::from_shape_fn((h, w), |(y, x)| {
        0.299 * rgb[[y, x, 0]] as f32 + 0.587 * rgb[[y, x, 1]] as f32 + 0.114 * rgb[[y, x, 2]] as f32
    })
}

/// Half-resolution plane by 2x2 box averaging. Odd trailing rows and
/// columns are dropped.
pub fn downsample_half(plane: &Array2<f32>) -> Array2<f32> {
    let (h, w) = plane.dim();
    Array2::from_shape_fn((h / 2, w / 2), |(y, x)| {
        let (y, x) = (2 * y, 2 * x);
        0.25 * (plane[[y, x]] + plane[[y, x + 1]] + plane[[y + 1, x]] + plane[[y + 1, x + 1]])
    })
}

/// Zero-mean template with its L2 norm precomputed, ready for repeated
/// correlation against candidate patches.
#[derive(Clone, Debug)]
pub struct Template {
    values: Array2<f32>,
    norm: f32,
}

impl Template {
    pub fn new(patch: ArrayView2<'_, f32>) -> Self {
        let mean = patch.mean().unwrap_or(0.0);
        let values = patch.mapv(|v| v - mean);
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        Self { values, norm }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// True when the patch has no texture to correlate against.
    pub fn is_flat(&self) -> bool {
        self.norm < 1e-3
    }

    /// Normalized cross-correlation in `[-1, 1]`; 0 for flat patches.
    pub fn correlate(&self, patch: ArrayView2<'_, f32>) -> f32 {
        if self.is_flat() || patch.dim() != self.values.dim() {
            return 0.0;
        }
        let mean = patch.mean().unwrap_or(0.0);
        let mut dot = 0.0f32;
        let mut sq = 0.0f32;
        Zip::from(&self.values).and(&patch).for_each(|&t, &p| {
            let centered = p - mean;
            dot += t * centered;
            sq += centered * centered;
        });
        if sq < 1e-6 {
            return 0.0;
        }
        (dot / (self.norm * sq.sqrt())).clamp(-1.0, 1.0)
    }

    /// Blends a newly observed patch into the template.
    pub fn blend(&mut self, patch: ArrayView2<'_, f32>, rate: f32) {
        if patch.dim() != self.values.dim() {
            return;
        }
        let fresh = Template::new(patch);
        Zip::from(&mut self.values)
            .and(&fresh.values)
            .for_each(|t, &f| *t = (1.0 - rate) * *t + rate * f);
        let mean = self.values.mean().unwrap_or(0.0);
        self.values.mapv_inplace(|v| v - mean);
        self.norm = self.values.iter().map(|v| v * v).sum::<f32>().sqrt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::s;

    fn textured(h: usize, w: usize) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(y, x)| ((x * 37 + y * 91) % 256) as f32)
    }

    #[test]
    fn test_bbox_iou_identical() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_relative_eq!(bbox_iou(&a, &a), 1.0);
    }

    #[test]
    fn test_bbox_iou_disjoint() {
        assert_relative_eq!(
            bbox_iou(&[0.0, 0.0, 10.0, 10.0], &[20.0, 20.0, 30.0, 30.0]),
            0.0
        );
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let mut boxes = vec![
            ScoredBox {
                bbox: [5.0, 5.0, 105.0, 105.0],
                score: 0.7,
            },
            ScoredBox {
                bbox: [0.0, 0.0, 100.0, 100.0],
                score: 0.9,
            },
        ];
        let kept = nms(&mut boxes, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn test_nms_keeps_separate_sorted() {
        let mut boxes = vec![
            ScoredBox {
                bbox: [200.0, 200.0, 250.0, 250.0],
                score: 0.6,
            },
            ScoredBox {
                bbox: [0.0, 0.0, 50.0, 50.0],
                score: 0.8,
            },
        ];
        let kept = nms(&mut boxes, 0.3);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].score > kept[1].score);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_downsample_half_averages_blocks() {
        let plane = Array2::from_shape_fn((3, 5), |(y, x)| (y * 5 + x) as f32);
        let half = downsample_half(&plane);
        assert_eq!(half.dim(), (1, 2));
        assert_relative_eq!(half[[0, 0]], (0.0 + 1.0 + 5.0 + 6.0) / 4.0);
        assert_relative_eq!(half[[0, 1]], (2.0 + 3.0 + 7.0 + 8.0) / 4.0);
    }

    #[test]
    fn test_grayscale_weights() {
        let frame = Frame::new(vec![255, 0, 0, 0, 255, 0], 2, 1, 3, 0);
        let gray = to_grayscale(&frame);
        assert_eq!(gray.dim(), (1, 2));
        assert_relative_eq!(gray[[0, 0]], 0.299 * 255.0, epsilon = 1e-3);
        assert_relative_eq!(gray[[0, 1]], 0.587 * 255.0, epsilon = 1e-3);
    }

    #[test]
    fn test_correlate_self_is_one() {
        let img = textured(12, 12);
        let template = Template::new(img.view());
        assert_relative_eq!(template.correlate(img.view()), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_correlate_is_brightness_invariant() {
        let img = textured(10, 10);
        let template = Template::new(img.view());
        let brighter = img.mapv(|v| v * 0.5 + 40.0);
        assert_relative_eq!(template.correlate(brighter.view()), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_correlate_shifted_patch_is_lower() {
        let img = textured(20, 20);
        let template = Template::new(img.slice(s![4..14, 4..14]));
        let exact = template.correlate(img.slice(s![4..14, 4..14]));
        let shifted = template.correlate(img.slice(s![5..15, 7..17]));
        assert!(exact > shifted);
    }

    #[test]
    fn test_flat_template_scores_zero() {
        let flat = Array2::<f32>::from_elem((8, 8), 100.0);
        let template = Template::new(flat.view());
        assert!(template.is_flat());
        assert_eq!(template.correlate(textured(8, 8).view()), 0.0);
    }

    #[test]
    fn test_blend_keeps_dimensions_and_self_match() {
        let img = textured(8, 8);
        let mut template = Template::new(img.view());
        template.blend(img.view(), 0.5);
        assert_eq!(template.dim(), (8, 8));
        assert_relative_eq!(template.correlate(img.view()), 1.0, epsilon = 1e-4);
    }
}
