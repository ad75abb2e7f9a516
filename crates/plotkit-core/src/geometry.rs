//! Geometry data model for plottable line art.
//!
//! A [`Plottable`] is an ordered collection of [`LineChunk`]s, each a
//! polyline in millimetre device coordinates carrying a pen id and a
//! stroke weight. Chunks with one point (or none) are degenerate: they
//! cannot be drawn and are skipped by the postprocessor.

use serde::{Deserialize, Serialize};

/// Sentinel distance used for degenerate chunks and NaN coordinates.
///
/// Large enough that such chunks never win a nearest-neighbor scan and
/// fall through to the optimizer's fallback path, small enough to stay
/// well inside f64 exact-integer range.
pub const MAX_DISTANCE: f64 = 16_777_216.0; // 2^24

/// A point in millimetre device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// True if both coordinates are finite (no NaN, no infinity).
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another point.
    ///
    /// Any invalid coordinate yields [`MAX_DISTANCE`] so a NaN never
    /// compares as closer than a real candidate.
    pub fn distance_to(&self, other: &Point) -> f64 {
        if !self.is_valid() || !other.is_valid() {
            return MAX_DISTANCE;
        }
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One contiguous polyline within a plottable.
///
/// The point order is mutable (a chunk may be drawn in either
/// direction); pen id and stroke weight are fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineChunk {
    points: Vec<Point>,
    /// Pen / tool id this chunk is drawn with.
    pub pen: u32,
    /// Stroke weight; meaning is postprocessor-specific.
    pub weight: f64,
}

impl LineChunk {
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            pen: 1,
            weight: 1.0,
        }
    }

    pub fn with_pen(mut self, pen: u32) -> Self {
        self.pen = pen;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A chunk with fewer than two points cannot be drawn.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() <= 1
    }

    /// Reverse the drawing direction in place.
    pub fn reverse(&mut self) {
        self.points.reverse();
    }
}

/// An ordered collection of line chunks ready for postprocessing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plottable {
    chunks: Vec<LineChunk>,
}

impl Plottable {
    pub fn new(chunks: Vec<LineChunk>) -> Self {
        Self { chunks }
    }

    pub fn push(&mut self, chunk: LineChunk) {
        self.chunks.push(chunk);
    }

    pub fn chunks(&self) -> &[LineChunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<LineChunk> {
        self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total number of points across all chunks.
    pub fn total_points(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }

    /// Cumulative pen-up travel: the sum of gaps between the end of
    /// each drawable chunk and the start of the next. Degenerate chunks
    /// are ignored, matching what the postprocessor will actually emit.
    pub fn pen_up_travel(&self) -> f64 {
        let mut travel = 0.0;
        let mut last: Option<&Point> = None;
        for chunk in self.chunks.iter().filter(|c| !c.is_degenerate()) {
            if let (Some(prev), Some(next)) = (last, chunk.first()) {
                travel += prev.distance_to(next);
            }
            last = chunk.last();
        }
        travel
    }
}

impl IntoIterator for Plottable {
    type Item = LineChunk;
    type IntoIter = std::vec::IntoIter<LineChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

impl<'a> IntoIterator for &'a Plottable {
    type Item = &'a LineChunk;
    type IntoIter = std::slice::Iter<'a, LineChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}
