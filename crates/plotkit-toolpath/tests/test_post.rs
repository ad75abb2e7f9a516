use plotkit_core::geometry::{LineChunk, Plottable, Point};
use plotkit_core::machine::PostSettings;
use plotkit_toolpath::post::GcodePost;
use std::io::Read;

fn chunk(points: &[(f64, f64)]) -> LineChunk {
    LineChunk::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
}

fn pentagon() -> Plottable {
    Plottable::new(vec![chunk(&[
        (20.0, 20.0),
        (20.0, 40.0),
        (35.0, 50.0),
        (50.0, 40.0),
        (50.0, 20.0),
        (20.0, 20.0),
    ])])
}

#[test]
fn pentagon_serializes_with_fixed_formatting() {
    let post = GcodePost::default();
    let lines = post.generate(&pentagon());

    let feed_moves: Vec<&String> = lines.iter().filter(|l| l.starts_with("G01 F")).collect();
    assert_eq!(
        feed_moves,
        vec![
            "G01 F1200.00 X20.00 Y40.00",
            "G01 F1200.00 X35.00 Y50.00",
            "G01 F1200.00 X50.00 Y40.00",
            "G01 F1200.00 X50.00 Y20.00",
            "G01 F1200.00 X20.00 Y20.00",
        ]
    );
    // One rapid to the chunk start, at 2-decimal precision.
    assert!(lines.iter().any(|l| l == "G0 X20.00 Y20.00"));
}

#[test]
fn feed_rate_comes_from_machine_settings() {
    let post = GcodePost::from_settings(&PostSettings {
        feed_rate: 900.0,
        pen_drag_mm: 0.75,
    });
    let lines = post.generate(&pentagon());
    assert!(lines.iter().any(|l| l == "G01 F900.00 X20.00 Y40.00"));
}

#[test]
fn program_is_newline_separated_and_terminated() {
    let post = GcodePost::default();
    let program = post.program(&pentagon());
    assert!(program.ends_with('\n'));
    assert_eq!(program.lines().count(), post.generate(&pentagon()).len());
}

#[test]
fn write_program_round_trips_through_a_file() {
    let post = GcodePost::default();
    let mut file = tempfile::tempfile().unwrap();
    post.write_program(&pentagon(), &mut file).unwrap();

    use std::io::Seek;
    file.rewind().unwrap();
    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, post.program(&pentagon()));
}

#[test]
fn mixed_degenerate_and_drawable_chunks() {
    let post = GcodePost::default();
    let p = Plottable::new(vec![
        chunk(&[(1.0, 1.0)]),
        chunk(&[(0.0, 0.0), (5.0, 5.0)]),
        chunk(&[]),
    ]);
    let lines = post.generate(&p);
    let draw_moves = lines.iter().filter(|l| l.starts_with("G01 F")).count();
    assert_eq!(draw_moves, 1);
}

#[test]
fn pen_down_depth_override_targets_requested_servo_value() {
    let lines = GcodePost::pen_down_to_depth(8);
    assert!(lines.iter().any(|l| l == "M280 S8"));
}
