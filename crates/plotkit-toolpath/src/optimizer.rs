//! Path-ordering optimizer.
//!
//! Greedy nearest-neighbor ordering with a bounded lookahead: starting
//! from the first chunk, scan up to `lookahead` of the remaining chunks
//! in their original order and pull over the one whose endpoint is
//! closest to the current pen position, reversing it when its far end
//! is the closer one. Deliberately not globally optimal — the bounded
//! scan keeps processing time predictable on drawings with tens of
//! thousands of chunks (O(N * lookahead)).

use plotkit_core::geometry::{LineChunk, Plottable, Point, MAX_DISTANCE};

/// Progress callback: `(stage, remaining, total)`.
pub type ProgressFn<'a> = dyn FnMut(&str, usize, usize) + 'a;

/// Configuration for [`optimize`].
#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    /// Maximum number of remaining chunks scanned per step.
    pub lookahead: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { lookahead: 100 }
    }
}

/// Best candidate found in one scan window.
#[derive(Debug, Clone, Copy)]
struct NextChunk {
    index: usize,
    reverse: bool,
    distance: f64,
    valid: bool,
}

impl NextChunk {
    fn none() -> Self {
        Self {
            index: 0,
            reverse: false,
            distance: MAX_DISTANCE,
            valid: false,
        }
    }
}

/// Pen position at the end of a chunk, if it has one that can be drawn
/// from. Degenerate chunks have no usable endpoint.
fn exit_point(chunk: &LineChunk) -> Option<&Point> {
    if chunk.is_degenerate() {
        None
    } else {
        chunk.last()
    }
}

/// Travel from the end of `from` to an endpoint of `to`. Degenerate
/// chunks (and NaN coordinates, via `distance_to`) compare as maximally
/// far so they never win a scan and sort last via the fallback path.
fn travel(from: &LineChunk, to: &LineChunk, to_end: bool) -> f64 {
    let start = match exit_point(from) {
        Some(p) => p,
        None => return MAX_DISTANCE,
    };
    if to.is_degenerate() {
        return MAX_DISTANCE;
    }
    let target = if to_end { to.last() } else { to.first() };
    match target {
        Some(p) => start.distance_to(p),
        None => MAX_DISTANCE,
    }
}

/// Reorder a plottable's chunks to reduce pen-up travel.
///
/// The output is a permutation of the input chunks, each possibly
/// reversed. If a progress callback is supplied it is invoked every 10
/// removals with `("optimize", remaining, total)`.
pub fn optimize(
    plottable: Plottable,
    config: &OptimizerConfig,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Plottable {
    let mut remaining = plottable.into_chunks();
    let total = remaining.len();
    if remaining.is_empty() {
        return Plottable::default();
    }

    tracing::debug!(total, lookahead = config.lookahead, "optimizing chunk order");

    let mut out: Vec<LineChunk> = Vec::with_capacity(total);
    // Seed with the first chunk; everything else is pulled over by
    // nearest endpoint.
    out.push(remaining.remove(0));
    let mut removals = 0usize;

    while !remaining.is_empty() {
        let current = &out[out.len() - 1];
        let span = config.lookahead.min(remaining.len());
        let mut best = NextChunk::none();

        for (i, candidate) in remaining.iter().take(span).enumerate() {
            let d_end = travel(current, candidate, true);
            let d_start = travel(current, candidate, false);
            if d_end < best.distance {
                // Closest is the END of the candidate: draw it backwards.
                best = NextChunk {
                    index: i,
                    reverse: true,
                    distance: d_end,
                    valid: true,
                };
            }
            if d_start < best.distance {
                best = NextChunk {
                    index: i,
                    reverse: false,
                    distance: d_start,
                    valid: true,
                };
            }
        }

        let mut chunk;
        if best.valid {
            chunk = remaining.remove(best.index);
            if best.reverse {
                chunk.reverse();
            }
        } else {
            // Nothing in the window had a measurable distance (all
            // degenerate or NaN). Take the head and orient it by
            // whichever end is nearer.
            chunk = remaining.remove(0);
            let d_end = travel(current, &chunk, true);
            let d_start = travel(current, &chunk, false);
            if d_start > d_end {
                chunk.reverse();
            }
        }
        out.push(chunk);

        removals += 1;
        if removals % 10 == 0 {
            if let Some(cb) = progress.as_mut() {
                cb("optimize", remaining.len(), total);
            }
        }
    }

    Plottable::new(out)
}
