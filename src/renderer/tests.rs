// src/renderer/tests.rs

use super::*;
use crate::platform::headless::{DrawCommand, HeadlessDisplay};
use test_log::test;

const RED: Color = Color::rgb(0xff, 0, 0);
const BLUE: Color = Color::rgb(0, 0, 0xff);

#[test]
fn same_color_points_share_one_call() {
    let mut display = HeadlessDisplay::new(16, 16);
    display.clear_commands();
    let mut batch = DrawBatch::new();
    for x in 0..5 {
        batch.push(&mut display, RED, Point::new(x, 0)).unwrap();
    }
    batch.flush(&mut display).unwrap();
    assert_eq!(
        display.commands(),
        &[
            DrawCommand::SetColor(RED),
            DrawCommand::Points((0..5).map(|x| Point::new(x, 0)).collect()),
        ]
    );
}

#[test]
fn color_change_flushes_pending_points() {
    let mut display = HeadlessDisplay::new(16, 16);
    display.clear_commands();
    let mut batch = DrawBatch::new();
    batch.push(&mut display, RED, Point::new(0, 0)).unwrap();
    batch.push(&mut display, BLUE, Point::new(1, 0)).unwrap();
    batch.push(&mut display, BLUE, Point::new(2, 0)).unwrap();
    batch.flush(&mut display).unwrap();
    assert_eq!(display.commands().len(), 4);
    assert_eq!(display.pixel(0, 0), Some(RED));
    assert_eq!(display.pixel(2, 0), Some(BLUE));
}

#[test]
fn full_batches_are_flushed_early() {
    let mut display = HeadlessDisplay::new(64, 64);
    display.clear_commands();
    let mut batch = DrawBatch::new();
    for i in 0..Rect::BATCH + 1 {
        let r = Rect::new((i % 64) as i32, (i / 64) as i32, 1, 1);
        batch.push(&mut display, BLUE, r).unwrap();
    }
    let calls = display
        .commands()
        .iter()
        .filter(|c| matches!(c, DrawCommand::Rects(_)))
        .count();
    assert_eq!(calls, 1);
    batch.flush(&mut display).unwrap();
    let sizes: Vec<usize> = display
        .commands()
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Rects(r) => Some(r.len()),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![Rect::BATCH, 1]);
}

#[test]
fn invalidate_resends_the_color() {
    let mut display = HeadlessDisplay::new(8, 8);
    display.clear_commands();
    let mut batch = DrawBatch::new();
    batch.push(&mut display, RED, Point::new(0, 0)).unwrap();
    batch.flush(&mut display).unwrap();
    display.clear(Color::BLACK).unwrap();
    batch.invalidate();
    batch.push(&mut display, RED, Point::new(1, 1)).unwrap();
    batch.flush(&mut display).unwrap();
    let colors = display
        .commands()
        .iter()
        .filter(|c| matches!(c, DrawCommand::SetColor(_)))
        .count();
    assert_eq!(colors, 2);
}

#[test]
fn rect_helpers() {
    let r = Rect::new(2, 3, 4, 5);
    assert_eq!(r.area(), 20);
    assert!(r.contains(Point::new(2, 3)));
    assert!(r.contains(Point::new(5, 7)));
    assert!(!r.contains(Point::new(6, 3)));
    assert!(Rect::new(0, 0, 0, 9).is_empty());
}
