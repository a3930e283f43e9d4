// src/view/tests.rs

use super::*;
use crate::analysis::Layout;
use crate::os::process::channel_pair;
use crate::platform::headless::HeadlessDisplay;
use crate::protocol::PacketKind;
use std::fs::File;
use std::io::{Read, Write};
use test_log::test;

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

fn view_on(file: File, settings: ViewSettings) -> ViewProcess {
    ViewProcess::new(settings, Input::new(file), HeadlessDisplay::open).unwrap()
}

fn pipe_input(bytes: &[u8]) -> (File, File) {
    let (r, w) = nix::unistd::pipe().unwrap();
    let mut w = File::from(w);
    w.write_all(bytes).unwrap();
    (File::from(r), w)
}

#[test]
fn input_waits_for_the_first_expose() {
    let mut reg = ViewRegistry::new();
    let mut view = view_on(file_with(&[1u8; 4096]), settings(GraphKind::Bytemap, 1024));
    view.install(&mut reg).unwrap();
    assert!(!reg.contains(view.stream().fd()));
    view.handle_action(UiAction::Expose, &mut reg).unwrap();
    assert!(reg.contains(view.stream().fd()));
}

#[test]
fn run_reads_one_window_and_stops() {
    let mut reg = ViewRegistry::new();
    let mut view = view_on(file_with(&[b'a'; 4096]), settings(GraphKind::Conti, 1024));
    view.run(&mut reg).unwrap();
    assert_eq!(view.stream().bytes_read(), 1024);
    assert!(reg.is_empty());
    assert_eq!(view.status().line1, "0x0 (1024)");
    assert_eq!(view.status().line2, "0");
}

#[test]
fn status_shows_progress_and_markers() {
    let (r, _w) = pipe_input(&[0u8; 10]);
    let mut reg = ViewRegistry::new();
    let mut view = view_on(r, settings(GraphKind::Bytemap, 64));
    view.handle_action(UiAction::Expose, &mut reg).unwrap();
    while view.stream().bytes_read() < 10 {
        reg.wait(&mut view, Some(Duration::from_millis(100))).unwrap();
    }
    view.handle_action(UiAction::ToggleAutoscroll, &mut reg).unwrap();
    assert_eq!(view.status().line1, "0x0 (10/64)");
    assert_eq!(view.status().line2, "0 [not seekable] [autoscroll]");
}

#[test]
fn step_forward_advances_and_notifies_peers() {
    let mut reg = ViewRegistry::new();
    let mut view = view_on(file_with(&[0u8; 8192]), settings(GraphKind::Bytes, 1024));
    let (ours, mut theirs) = channel_pair().unwrap();
    view.attach_client(ours, None, &mut reg).unwrap();

    view.handle_action(UiAction::StepForward, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 1024);
    assert_eq!(view.stream().bytes_read(), 0);

    let packet = theirs.recv().unwrap().unwrap();
    assert_eq!(packet.kind, PacketKind::NotifyReadAt);
    assert_eq!((packet.offset, packet.size), (1024, 1024));
}

#[test]
fn step_forward_under_autoscroll_only_stops_it() {
    let mut reg = ViewRegistry::new();
    let mut s = settings(GraphKind::Bytes, 1024);
    s.autoscroll = true;
    let mut view = view_on(file_with(&[0u8; 8192]), s);
    view.handle_action(UiAction::StepForward, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 0);
    assert!(!view.autoscroll());
}

#[test]
fn step_back_clamps_at_zero() {
    let mut reg = ViewRegistry::new();
    let mut s = settings(GraphKind::Conti, 1024);
    s.offset = 1500;
    let mut view = view_on(file_with(&[0u8; 8192]), s);
    assert_eq!(view.stream().offset(), 1500);
    view.handle_action(UiAction::StepBack, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 476);
    view.handle_action(UiAction::StepBack, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 0);
    view.handle_action(UiAction::StepBack, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 0);
}

#[test]
fn non_seekable_input_refuses_to_go_back() {
    let (r, _w) = pipe_input(&[0u8; 4096]);
    let mut reg = ViewRegistry::new();
    let mut view = view_on(r, settings(GraphKind::Conti, 1024));
    view.handle_action(UiAction::StepForward, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 1024);

    view.handle_action(UiAction::StepBack, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 1024);
    view.handle_action(UiAction::Restart, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 1024);
    assert!(view.status().line2.contains("[not seekable]"));
}

#[test]
fn grow_and_shrink_by_block_step() {
    let mut reg = ViewRegistry::new();
    let mut view = view_on(file_with(&[0u8; 8192]), settings(GraphKind::Bytes, 1024));
    view.handle_action(UiAction::Grow, &mut reg).unwrap();
    assert_eq!(view.stream().window_size(), 2048);
    view.handle_action(UiAction::Shrink, &mut reg).unwrap();
    view.handle_action(UiAction::Shrink, &mut reg).unwrap();
    assert_eq!(view.stream().window_size(), 1024);
}

#[test]
fn restart_returns_to_the_start() {
    let mut reg = ViewRegistry::new();
    let mut s = settings(GraphKind::Bytemap, 1024);
    s.offset = 4096;
    s.autoscroll = true;
    let mut view = view_on(file_with(&[0u8; 8192]), s);
    view.handle_action(UiAction::Restart, &mut reg).unwrap();
    assert_eq!(view.stream().offset(), 0);
    assert!(!view.autoscroll());
}

#[test]
fn autoscroll_advances_after_a_full_window() {
    let mut reg = ViewRegistry::new();
    let mut s = settings(GraphKind::Bytemap, 1024);
    s.autoscroll = true;
    s.autoscroll_interval = Duration::from_millis(5);
    let mut view = view_on(file_with(&[3u8; 4096]), s);
    view.install(&mut reg).unwrap();
    while view.stream().offset() == 0 {
        assert!(view.turn(&mut reg).unwrap());
    }
    assert_eq!(view.stream().offset(), 1024);
}

#[test]
fn packets_from_a_peer_move_the_window() {
    let mut reg = ViewRegistry::new();
    let mut view = view_on(file_with(&[0u8; 8192]), settings(GraphKind::Conti, 1024));
    let (mut spawner_end, ours) = channel_pair().unwrap();
    view.attach_spawner(ours, &mut reg).unwrap();
    spawner_end
        .send(&CommandPacket::notify_read_at(2048, 512))
        .unwrap();
    reg.wait(&mut view, Some(Duration::from_millis(500))).unwrap();
    assert_eq!(view.stream().offset(), 2048);
    assert_eq!(view.stream().window_size(), 512);
}

#[test]
fn notifications_are_forwarded_to_other_clients() {
    let mut reg = ViewRegistry::new();
    let mut root = view_on(file_with(&[0u8; 8192]), settings(GraphKind::Conti, 1024));
    let (a_ours, mut a_theirs) = channel_pair().unwrap();
    let (b_ours, mut b_theirs) = channel_pair().unwrap();
    root.attach_client(a_ours, None, &mut reg).unwrap();
    root.attach_client(b_ours, None, &mut reg).unwrap();

    a_theirs
        .send(&CommandPacket::notify_read_at(3072, 1024))
        .unwrap();
    reg.wait(&mut root, Some(Duration::from_millis(500))).unwrap();
    assert_eq!(root.stream().offset(), 3072);

    let forwarded = b_theirs.recv().unwrap().unwrap();
    assert_eq!((forwarded.offset, forwarded.size), (3072, 1024));

    // The sender does not get its own packet back.
    root.handle_action(UiAction::Grow, &mut reg).unwrap();
    let next = a_theirs.recv().unwrap().unwrap();
    assert_eq!((next.offset, next.size), (3072, 2048));
}

#[test]
fn spawn_is_dropped_when_the_table_is_full() {
    let mut reg = ViewRegistry::new();
    let mut s = settings(GraphKind::Conti, 1024);
    s.max_views = 2;
    let mut root = view_on(file_with(&[0u8; 8192]), s);
    let (ours, mut theirs) = channel_pair().unwrap();
    root.attach_client(ours, None, &mut reg).unwrap();

    let outcome = root.request_spawn(GraphKind::Bytes, false, &mut reg);
    assert_eq!(outcome, SpawnOutcome::Dropped);
    assert_eq!(root.client_count(), 1);

    root.handle_action(UiAction::StepForward, &mut reg).unwrap();
    let packet = theirs.recv().unwrap().unwrap();
    assert_eq!(packet.offset, 1024);
}

#[test]
fn children_pass_spawn_requests_up() {
    let mut reg = ViewRegistry::new();
    let mut child = view_on(file_with(&[0u8; 64]), settings(GraphKind::Bytes, 1024));
    let (mut spawner_end, ours) = channel_pair().unwrap();
    child.attach_spawner(ours, &mut reg).unwrap();

    let outcome = child.request_spawn(GraphKind::Bytemap, false, &mut reg);
    assert_eq!(outcome, SpawnOutcome::Forwarded);
    let packet = spawner_end.recv().unwrap().unwrap();
    assert_eq!(packet.kind, PacketKind::Spawn(GraphKind::Bytemap));
}

#[test]
fn quitting_root_relays_until_the_last_client_leaves() {
    let mut reg = ViewRegistry::new();
    let mut root = view_on(file_with(&[0u8; 8192]), settings(GraphKind::Conti, 1024));
    let (ours, theirs) = channel_pair().unwrap();
    root.attach_client(ours, None, &mut reg).unwrap();

    root.handle_action(UiAction::Quit, &mut reg).unwrap();
    assert_eq!(root.phase(), Phase::Quitting);
    assert_eq!(reg.len(), 1);

    drop(theirs);
    assert!(root.turn(&mut reg).unwrap());
    assert_eq!(root.client_count(), 0);
    assert!(!root.turn(&mut reg).unwrap());
}

#[test]
fn hung_up_spawner_is_forgotten() {
    let mut reg = ViewRegistry::new();
    let mut child = view_on(file_with(&[0u8; 64]), settings(GraphKind::Bytes, 1024));
    let (spawner_end, ours) = channel_pair().unwrap();
    child.attach_spawner(ours, &mut reg).unwrap();
    drop(spawner_end);
    reg.wait(&mut child, Some(Duration::from_millis(500))).unwrap();
    assert!(!child.has_spawner());
    assert_eq!(child.phase(), Phase::Running);
}

/// Root display that asks for a `bytes` view and then quits, in one batch.
fn spawn_then_quit(settings: &DisplaySettings) -> Result<Box<dyn Display>> {
    let mut display = HeadlessDisplay::new(settings.graph_width, settings.graph_height);
    if settings.title.ends_with("(conti)") {
        display.push_action(UiAction::Spawn {
            kind: GraphKind::Bytes,
            detached: false,
        });
        display.push_action(UiAction::Quit);
    }
    Ok(Box::new(display))
}

#[test]
fn forked_child_ignores_the_rest_of_the_spawners_batch() {
    let (report_r, report_w) = nix::unistd::pipe().unwrap();
    let mut report_w = File::from(report_w);
    let mut s = settings(GraphKind::Conti, 1024);
    s.offset = 2048;
    let mut root = ViewProcess::new(s, Input::new(file_with(&[0u8; 8192])), spawn_then_quit).unwrap();
    let mut reg = ViewRegistry::new();
    let root_pid = std::process::id();

    root.pump_display(&mut reg);

    if std::process::id() != root_pid {
        let report = format!(
            "{:?} {} {} {} {}",
            root.phase(),
            root.kind(),
            root.has_spawner(),
            root.client_count(),
            root.stream().offset()
        );
        let _ = report_w.write_all(report.as_bytes());
        drop(report_w);
        unsafe { libc::_exit(0) };
    }
    drop(report_w);

    assert_eq!(root.phase(), Phase::Quitting);
    assert_eq!(root.client_count(), 1);
    let child = root.clients[0].pid.unwrap();

    let mut report = String::new();
    File::from(report_r).read_to_string(&mut report).unwrap();
    assert_eq!(report, "Running bytes true 0 2048");
    nix::sys::wait::waitpid(child, None).unwrap();
}

fn resized_display(settings: &DisplaySettings) -> Result<Box<dyn Display>> {
    // The graph area the view is built for stays 256x256 until the queued
    // resize is handled.
    let mut display = HeadlessDisplay::new(settings.graph_width, settings.graph_height);
    display.push_action(UiAction::Resize {
        width: 512,
        height: 384,
    });
    Ok(Box::new(display))
}

fn read_then_resize(kind: GraphKind) -> ViewProcess {
    let mut reg = ViewRegistry::new();
    let mut view =
        ViewProcess::new(settings(kind, 1024), Input::new(file_with(&[b'a'; 4096])), resized_display).unwrap();
    view.read_input(&mut reg).unwrap();
    assert_eq!(view.stream().bytes_read(), 1024);
    view.pump_display(&mut reg);
    view.take_fatal().unwrap();
    view
}

#[test]
fn resize_lays_out_the_byte_grid_again() {
    let view = read_then_resize(GraphKind::Bytes);
    assert_eq!(view.analyzer().cell_layout(), Some(&Layout::solve(1024, 512, 384)));
    assert_ne!(Layout::solve(1024, 512, 384), Layout::solve(1024, 256, 256));
    assert_eq!(view.stream().offset(), 0);
    assert_eq!(view.stream().bytes_read(), 0);
}

#[test]
fn resize_keeps_the_window_of_fixed_size_graphs() {
    for kind in [GraphKind::Conti, GraphKind::Bytemap] {
        let view = read_then_resize(kind);
        assert_eq!(view.analyzer().cell_layout(), None);
        assert_eq!(view.stream().bytes_read(), 1024);
    }
}
