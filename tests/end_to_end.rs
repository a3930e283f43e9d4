//! End-to-end scenarios: real files and pipes, headless displays, peer links
//! over real pipes. Everything runs in the test process; no view here forks.

use std::fs::File;
use std::io::Write;
use std::time::Duration;

use rawview::analysis::frequency::bucket_for;
use rawview::analysis::{classify, ByteClass};
use rawview::color::Palette;
use rawview::config::Config;
use rawview::graph::pair_grid::HEAT_BUCKETS;
use rawview::graph::{ByteGrid, PairGrid};
use rawview::os::process::channel_pair;
use rawview::platform::headless::{DrawCommand, HeadlessDisplay};
use rawview::platform::UiAction;
use rawview::protocol::{CommandPacket, PacketKind};
use rawview::stream::{Input, ReadOutcome, StreamReader};
use rawview::view::{Phase, SpawnOutcome};
use rawview::{Analyzer, GraphKind, ViewProcess, ViewRegistry, ViewSettings};
use test_log::test;

// =============================================================================
// Fixtures
// =============================================================================

fn settings(kind: GraphKind, block_size: u64) -> ViewSettings {
    let mut config = Config::default();
    config.view.graph = kind;
    config.input.block_size = block_size;
    ViewSettings::from_config(&config)
}

fn file_with(bytes: &[u8]) -> File {
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file
}

fn pipe_with(bytes: &[u8]) -> (File, File) {
    let (r, w) = nix::unistd::pipe().unwrap();
    let mut w = File::from(w);
    w.write_all(bytes).unwrap();
    (File::from(r), w)
}

fn fill_window(
    reader: &mut StreamReader,
    analyzer: &mut dyn Analyzer,
    display: &mut HeadlessDisplay,
) -> ReadOutcome {
    loop {
        let outcome = reader.read_chunk(analyzer, display).unwrap();
        if outcome.is_settled() {
            return outcome;
        }
    }
}

// =============================================================================
// Reading and drawing
// =============================================================================

#[test]
fn zero_file_fills_two_windows_of_nul_cells() {
    let data = vec![0u8; 2048];
    assert!(data.iter().all(|&b| classify(b) == ByteClass::Nul));

    let palette = Palette::default();
    let mut reader = StreamReader::new(Input::new(file_with(&data)), 0, 1024, 8192);
    let mut grid = ByteGrid::new(palette.clone());
    let mut display = HeadlessDisplay::new(256, 256);
    grid.setup(1024, (256, 256));

    for window in 0..2 {
        let offset = window * 1024;
        reader.restart(offset).unwrap();
        grid.start_block(offset, &mut display).unwrap();
        display.clear_commands();

        assert!(matches!(
            fill_window(&mut reader, &mut grid, &mut display),
            ReadOutcome::Filled(_)
        ));
        assert_eq!(reader.bytes_read(), 1024);
        assert_eq!(grid.placed(), 1024);

        let cells: usize = display
            .commands()
            .iter()
            .map(|c| match c {
                DrawCommand::Rects(rects) => rects.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(cells, 1024);
        assert!(display
            .commands()
            .iter()
            .all(|c| !matches!(c, DrawCommand::SetColor(color) if *color != palette.background)));
    }

    // A third window starts at the end of the file.
    reader.restart(2048).unwrap();
    grid.start_block(2048, &mut display).unwrap();
    assert_eq!(
        fill_window(&mut reader, &mut grid, &mut display),
        ReadOutcome::Ended
    );
    assert_eq!(reader.bytes_read(), 0);
}

#[test]
fn autoscrolling_view_walks_the_file_and_stops_at_the_end() {
    let mut s = settings(GraphKind::Bytes, 1024);
    s.autoscroll = true;
    s.stop_at_end = true;
    s.autoscroll_interval = Duration::from_millis(1);
    let mut view = ViewProcess::new(s, Input::new(file_with(&[0u8; 2048])), HeadlessDisplay::open).unwrap();
    let mut reg = ViewRegistry::new();

    view.run(&mut reg).unwrap();

    assert_eq!(view.stream().offset(), 2048);
    assert_eq!(view.phase(), Phase::Quitting);
    assert!(!view.autoscroll());
    assert!(reg.is_empty());
}

#[test]
fn repeated_pair_is_counted_and_drawn() {
    let palette = Palette::default();
    let mut reader = StreamReader::new(Input::new(file_with(b"AAAA")), 0, 4, 8192);
    let mut grid = PairGrid::new(palette.clone());
    let mut display = HeadlessDisplay::new(256, 256);
    grid.start_block(0, &mut display).unwrap();

    assert_eq!(
        fill_window(&mut reader, &mut grid, &mut display),
        ReadOutcome::Filled(4)
    );
    assert_eq!(grid.matrix().count(b'A', b'A'), 3);
    let bucket = bucket_for(3, HEAT_BUCKETS);
    assert_eq!(
        display.pixel(b'A' as i32, b'A' as i32),
        Some(palette.heat(bucket, HEAT_BUCKETS))
    );
}

// =============================================================================
// Navigation
// =============================================================================

#[test]
fn pipe_input_cannot_step_back() {
    let (r, _w) = pipe_with(&[b'x'; 4096]);
    let mut view = ViewProcess::new(
        settings(GraphKind::Conti, 1024),
        Input::new(r),
        HeadlessDisplay::open,
    )
    .unwrap();
    let mut reg = ViewRegistry::new();

    view.handle_action(UiAction::StepForward, &mut reg).unwrap();
    let offset = view.stream().offset();
    view.handle_action(UiAction::StepBack, &mut reg).unwrap();

    assert_eq!(view.stream().offset(), offset);
    assert!(view.status().line2.contains("[not seekable]"));
}

// =============================================================================
// Peers
// =============================================================================

#[test]
fn spawn_is_refused_once_the_session_is_full() {
    let mut s = settings(GraphKind::Conti, 1024);
    s.max_views = 3;
    let mut root = ViewProcess::new(s, Input::new(file_with(&[0u8; 4096])), HeadlessDisplay::open).unwrap();
    let mut reg = ViewRegistry::new();
    let mut links = Vec::new();
    for _ in 0..2 {
        let (ours, theirs) = channel_pair().unwrap();
        root.attach_client(ours, None, &mut reg).unwrap();
        links.push(theirs);
    }

    assert_eq!(
        root.request_spawn(GraphKind::Bytemap, false, &mut reg),
        SpawnOutcome::Dropped
    );
    assert_eq!(root.client_count(), 2);

    // A spawn request arriving from a client is refused the same way.
    links[0].send(&CommandPacket::spawn(GraphKind::Bytes)).unwrap();
    reg.wait(&mut root, Some(Duration::from_millis(500))).unwrap();
    assert_eq!(root.client_count(), 2);
    assert_eq!(root.phase(), Phase::Running);
}

#[test]
fn notification_from_one_sibling_reaches_the_other() {
    let data = vec![7u8; 16 * 1024];
    let mut root = ViewProcess::new(
        settings(GraphKind::Bytemap, 1024),
        Input::new(file_with(&data)),
        HeadlessDisplay::open,
    )
    .unwrap();
    let mut reg = ViewRegistry::new();

    let (a_ours, mut sibling_a) = channel_pair().unwrap();
    let (b_ours, mut sibling_b) = channel_pair().unwrap();
    root.attach_client(a_ours, None, &mut reg).unwrap();
    root.attach_client(b_ours, None, &mut reg).unwrap();

    sibling_a
        .send(&CommandPacket::notify_read_at(8192, 2048))
        .unwrap();
    reg.wait(&mut root, Some(Duration::from_millis(500))).unwrap();

    assert_eq!(root.stream().offset(), 8192);
    assert_eq!(root.stream().window_size(), 2048);
    let packet = sibling_b.recv().unwrap().unwrap();
    assert_eq!(packet.kind, PacketKind::NotifyReadAt);
    assert_eq!((packet.offset, packet.size), (8192, 2048));

    // Navigation in the root goes to both siblings.
    root.handle_action(UiAction::StepForward, &mut reg).unwrap();
    for sibling in [&mut sibling_a, &mut sibling_b] {
        let packet = sibling.recv().unwrap().unwrap();
        assert_eq!((packet.offset, packet.size), (10240, 2048));
    }
}
