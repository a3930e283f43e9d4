// src/view/handlers.rs

//! Poll handlers of a view. Errors are parked in the view and returned by
//! the event loop after the dispatch pass.

use log::{debug, trace};

use super::{ViewProcess, ViewRegistry};
use crate::os::poll::{PollFlags, Readiness};
use crate::platform::UiAction;

pub(super) fn on_display(view: &mut ViewProcess, reg: &mut ViewRegistry, ready: Readiness) {
    if ready.is_hangup() && !ready.is_readable() {
        debug!("View {}: display connection hung up", view.kind);
        reg.unregister(ready.fd);
        if let Err(e) = view.handle_action(UiAction::Quit, reg) {
            view.fail(e);
        }
        return;
    }
    if view.display_fd() != Some(ready.fd) {
        trace!("View {}: stale display fd {}", view.kind, ready.fd);
        reg.unregister(ready.fd);
        return;
    }
    view.pump_display(reg);
}

pub(super) fn on_input(view: &mut ViewProcess, reg: &mut ViewRegistry, ready: Readiness) {
    if ready.events.contains(PollFlags::POLLNVAL) {
        debug!("View {}: input fd {} is invalid", view.kind, ready.fd);
        reg.unregister(ready.fd);
        return;
    }
    // A hung-up pipe may still hold data; the read reports the end.
    if let Err(e) = view.read_input(reg) {
        reg.unregister(ready.fd);
        view.fail(e.context("Analyzing input failed"));
    }
}

pub(super) fn on_peer(view: &mut ViewProcess, reg: &mut ViewRegistry, ready: Readiness) {
    let Some(peer) = view.peer_for_fd(ready.fd) else {
        trace!("View {}: fd {} is no longer a peer", view.kind, ready.fd);
        reg.unregister(ready.fd);
        return;
    };
    view.receive_from(peer, reg);
}
