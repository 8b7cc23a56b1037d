//! Sample transforms applied to a decoded scan and its boxes.
//!
//! A transform takes ownership of the point and box sequences and returns the
//! pair it wants the caller to see. It may drop, add or rewrite entries in
//! either sequence; the dataset does not check the result.

use super::labels::BoundingBox;
use super::scan::Point;

/// Post-processing step run on every retrieved record.
pub trait SampleTransform: Send + Sync {
    fn apply(&self, points: Vec<Point>, boxes: Vec<BoundingBox>) -> (Vec<Point>, Vec<BoundingBox>);
}

impl<T: SampleTransform + ?Sized> SampleTransform for Box<T> {
    fn apply(&self, points: Vec<Point>, boxes: Vec<BoundingBox>) -> (Vec<Point>, Vec<BoundingBox>) {
        (**self).apply(points, boxes)
    }
}

/// Drops points whose reflectance is below `min`.
#[derive(Debug, Clone, Copy)]
pub struct IntensityFilter {
    pub min: f32,
}

impl SampleTransform for IntensityFilter {
    fn apply(&self, points: Vec<Point>, boxes: Vec<BoundingBox>) -> (Vec<Point>, Vec<BoundingBox>) {
        let kept = points
            .into_iter()
            .filter(|p| p.reflectance >= self.min)
            .collect();
        (kept, boxes)
    }
}

/// Keeps every `stride`-th point. A stride of 0 or 1 keeps everything.
#[derive(Debug, Clone, Copy)]
pub struct StrideSubsample {
    pub stride: usize,
}

impl SampleTransform for StrideSubsample {
    fn apply(&self, points: Vec<Point>, boxes: Vec<BoundingBox>) -> (Vec<Point>, Vec<BoundingBox>) {
        if self.stride <= 1 {
            return (points, boxes);
        }
        let kept = points.into_iter().step_by(self.stride).collect();
        (kept, boxes)
    }
}

/// Axis-aligned crop. Points outside `[min, max]` are dropped, as are boxes
/// whose center lies outside it.
#[derive(Debug, Clone, Copy)]
pub struct RangeCrop {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl RangeCrop {
    #[inline]
    fn contains(&self, p: [f32; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

impl SampleTransform for RangeCrop {
    fn apply(&self, points: Vec<Point>, boxes: Vec<BoundingBox>) -> (Vec<Point>, Vec<BoundingBox>) {
        let points = points.into_iter().filter(|p| self.contains(p.xyz())).collect();
        let boxes = boxes.into_iter().filter(|b| self.contains(b.location)).collect();
        (points, boxes)
    }
}

/// Runs transforms in order, feeding each one the previous output.
#[derive(Default)]
pub struct Compose {
    steps: Vec<Box<dyn SampleTransform>>,
}

impl Compose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<T: SampleTransform + 'static>(mut self, step: T) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl SampleTransform for Compose {
    fn apply(&self, points: Vec<Point>, boxes: Vec<BoundingBox>) -> (Vec<Point>, Vec<BoundingBox>) {
        self.steps
            .iter()
            .fold((points, boxes), |(points, boxes), step| step.apply(points, boxes))
    }
}
