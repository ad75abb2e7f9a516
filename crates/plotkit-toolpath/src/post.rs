//! G-code postprocessor.
//!
//! Serializes an ordered [`Plottable`] into the device command
//! language: a fixed preamble, one pen-up/rapid-move/pen-down stanza
//! per chunk (elided when the pen would only drag a short distance),
//! feed-controlled draw moves, and a fixed park epilog. All numeric
//! output is formatted to exactly 2 decimal places; golden-output
//! tests depend on it.

use plotkit_core::geometry::{Plottable, Point};
use plotkit_core::machine::PostSettings;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// G-code postprocessor for servo-pen plotters (M280 height control).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct GcodePost {
    /// Drawing feed rate in mm/min.
    pub feed_rate: f64,
    /// Pen-lift cycles are skipped for gaps at or below this length.
    pub pen_drag_mm: f64,
}

impl Default for GcodePost {
    fn default() -> Self {
        let settings = PostSettings::default();
        Self {
            feed_rate: settings.feed_rate,
            pen_drag_mm: settings.pen_drag_mm,
        }
    }
}

impl GcodePost {
    /// Emitted once before any chunk: home, zero the work origin, and
    /// raise the pen.
    pub const PREAMBLE: &'static [&'static str] = &[
        "G28 X Y",
        "G92 X0 Y0",
        "M280 S5",
        "G4 P150 ; PEN IS UP",
    ];

    /// Pen-up stanza.
    pub const PEN_UP: &'static [&'static str] =
        &["M400 ; PEN UP", "M280 S5", "G4 P150 ; PEN IS UP"];

    /// Pen-down stanza. The servo is stepped down in stages with dwells
    /// so the pen does not slam into the paper.
    pub const PEN_DOWN: &'static [&'static str] = &[
        "M400 ; PEN DOWN",
        "M280 S7",
        "G4 P100 ; Easing",
        "M280 S8",
        "M400",
        "G4 P100 ; Easing",
        "M280 S10",
        "G4 P70 ; PEN IS DOWN",
    ];

    /// Emitted once after the last chunk: raise the pen and park.
    pub const EPILOG: &'static [&'static str] = &[
        "M400",
        "M280 S5",
        "G4 P1000",
        "M400",
        "G0X15Y230",
        "G4 P1000",
        "M400",
        "G4 P1000",
        "M400",
    ];

    /// Home command (machine home, not the work origin).
    pub const HOME: &'static str = "G28 X Y";

    /// Set the work origin to the current position.
    pub const SET_ORIGIN: &'static str = "G92 X0 Y0";

    pub fn new(feed_rate: f64, pen_drag_mm: f64) -> Self {
        Self {
            feed_rate,
            pen_drag_mm,
        }
    }

    pub fn from_settings(settings: &PostSettings) -> Self {
        Self::new(settings.feed_rate, settings.pen_drag_mm)
    }

    /// Serialize a plottable into command lines.
    ///
    /// Chunks with one point or fewer are skipped. A pen-lift stanza is
    /// emitted before a chunk only when the drag from the last drawn
    /// point exceeds `pen_drag_mm`; shorter gaps are drawn through with
    /// the pen down.
    pub fn generate(&self, plottable: &Plottable) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        push_all(&mut lines, Self::PREAMBLE);
        push_all(&mut lines, Self::PEN_UP);

        let mut last_pos: Option<Point> = None;
        for chunk in plottable.chunks() {
            if chunk.is_degenerate() {
                continue;
            }
            let points = chunk.points();
            let start = points[0];

            let drag = last_pos.map(|p| p.distance_to(&start));
            match drag {
                Some(d) if d <= self.pen_drag_mm => {
                    // Short drag: keep the pen down and save the lift
                    // cycle.
                    lines.push(format!(
                        "G01 X{:.2} Y{:.2} ; Skipping pen lift for short drag",
                        start.x, start.y
                    ));
                }
                _ => {
                    push_all(&mut lines, Self::PEN_UP);
                    lines.push(format!("G0 X{:.2} Y{:.2}", start.x, start.y));
                    push_all(&mut lines, Self::PEN_DOWN);
                }
            }

            for p in &points[1..] {
                lines.push(format!(
                    "G01 F{:.2} X{:.2} Y{:.2}",
                    self.feed_rate, p.x, p.y
                ));
            }
            last_pos = points.last().copied();
        }

        push_all(&mut lines, Self::EPILOG);
        lines
    }

    /// Serialize into a single newline-terminated program string.
    pub fn program(&self, plottable: &Plottable) -> String {
        let mut out = self.generate(plottable).join("\n");
        out.push('\n');
        out
    }

    /// Write the program to any writer (file, socket, buffer).
    pub fn write_program<W: Write>(&self, plottable: &Plottable, mut w: W) -> io::Result<()> {
        for line in self.generate(plottable) {
            writeln!(w, "{}", line)?;
        }
        Ok(())
    }

    /// Pen-down stanza with an explicit servo depth override.
    pub fn pen_down_to_depth(depth: u32) -> Vec<String> {
        vec![
            "M400 ; PEN DOWN".to_string(),
            format!("M280 S{}", depth),
            "G4 P70 ; PEN IS DOWN".to_string(),
        ]
    }
}

fn push_all(lines: &mut Vec<String>, block: &[&str]) {
    lines.extend(block.iter().map(|s| s.to_string()));
}
