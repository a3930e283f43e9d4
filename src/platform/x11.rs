// src/platform/x11.rs

//! Xlib window for a view: the graph is composed in an off-screen pixmap
//! and copied into the window, with a strip of the palette and two status
//! lines below it.

use std::ffi::CString;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;

use anyhow::{anyhow, Context, Result};
use libc::{c_char, c_int, c_uint};
use log::{debug, error, info, trace};
use ::x11::keysym;
use ::x11::xlib;

use super::{Display, DisplaySettings, StatusLine, UiAction};
use crate::color::{Color, GRAPH_SLOTS};
use crate::config::AppearanceConfig;
use crate::keys::{self, KeySymbol, Modifiers};
use crate::renderer::{Point, Rect, Surface};

const FONT_NAME: &str = "fixed";
const KEY_TEXT_BUFFER_SIZE: usize = 32;
const RAINBOW_HEIGHT: u32 = 2;

pub struct X11Display {
    display: *mut xlib::Display,
    screen: c_int,
    window: xlib::Window,
    pixmap: xlib::Pixmap,
    gc: xlib::GC,
    font: *mut xlib::XFontStruct,
    wm_delete_window: xlib::Atom,
    protocols_atom: xlib::Atom,
    appearance: AppearanceConfig,
    resizable: bool,
    window_width: u32,
    window_height: u32,
    graph_width: u32,
    graph_height: u32,
    draw_color: Color,
    status: StatusLine,
    /// The server already destroyed the window.
    window_gone: bool,
    closed: bool,
}

fn clamp_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn clamp_u16(v: u32) -> u16 {
    v.min(u16::MAX as u32) as u16
}

impl X11Display {
    /// [`DisplayFactory`](super::DisplayFactory) for X11 views.
    pub fn open(settings: &DisplaySettings) -> Result<Box<dyn Display>> {
        let display = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if display.is_null() {
            return Err(anyhow!("Cannot connect to the X server (is DISPLAY set?)"));
        }
        let screen = unsafe { xlib::XDefaultScreen(display) };
        let a = &settings.appearance;
        let window_width = settings.graph_width + 2 * a.padding;
        let window_height =
            settings.graph_height + 2 * a.padding + a.status_padding + a.status_height;

        let mut this = X11Display {
            display,
            screen,
            window: 0,
            pixmap: 0,
            gc: ptr::null_mut(),
            font: ptr::null_mut(),
            wm_delete_window: 0,
            protocols_atom: 0,
            appearance: a.clone(),
            resizable: settings.resizable,
            window_width,
            window_height,
            graph_width: settings.graph_width,
            graph_height: settings.graph_height,
            draw_color: a.palette.background,
            status: StatusLine::default(),
            window_gone: false,
            closed: false,
        };
        this.create_window().context("Failed to create the view window")?;
        this.create_gc()?;
        this.create_pixmap()?;
        this.setup_wm_protocols(&settings.title);
        unsafe {
            xlib::XMapWindow(this.display, this.window);
            xlib::XFlush(this.display);
        }
        info!(
            "X11Display: window {} ({}x{}) for '{}'",
            this.window, window_width, window_height, settings.title
        );
        Ok(Box::new(this))
    }

    fn create_window(&mut self) -> Result<()> {
        let border = self.appearance.palette.border.to_pixel() as libc::c_ulong;
        unsafe {
            let root = xlib::XRootWindow(self.display, self.screen);
            let mut attributes: xlib::XSetWindowAttributes = mem::zeroed();
            attributes.background_pixel = border;
            attributes.border_pixel = border;
            attributes.event_mask = xlib::ExposureMask
                | xlib::KeyPressMask
                | xlib::ButtonPressMask
                | xlib::StructureNotifyMask;
            self.window = xlib::XCreateWindow(
                self.display,
                root,
                0,
                0,
                self.window_width as c_uint,
                self.window_height as c_uint,
                self.appearance.border_width as c_uint,
                xlib::XDefaultDepth(self.display, self.screen),
                xlib::InputOutput as c_uint,
                xlib::XDefaultVisual(self.display, self.screen),
                xlib::CWBackPixel | xlib::CWBorderPixel | xlib::CWEventMask,
                &mut attributes,
            );
        }
        if self.window == 0 {
            return Err(anyhow!("XCreateWindow failed"));
        }
        Ok(())
    }

    fn create_gc(&mut self) -> Result<()> {
        let mut values: xlib::XGCValues = unsafe { mem::zeroed() };
        self.gc = unsafe { xlib::XCreateGC(self.display, self.window, 0, &mut values) };
        if self.gc.is_null() {
            return Err(anyhow!("XCreateGC failed"));
        }
        let name = CString::new(FONT_NAME)?;
        self.font = unsafe { xlib::XLoadQueryFont(self.display, name.as_ptr()) };
        if self.font.is_null() {
            debug!("X11Display: font '{}' unavailable, using the server default", FONT_NAME);
        } else {
            unsafe { xlib::XSetFont(self.display, self.gc, (*self.font).fid) };
        }
        Ok(())
    }

    fn create_pixmap(&mut self) -> Result<()> {
        unsafe {
            let depth = xlib::XDefaultDepth(self.display, self.screen) as c_uint;
            self.pixmap = xlib::XCreatePixmap(
                self.display,
                self.window,
                self.graph_width.max(1),
                self.graph_height.max(1),
                depth,
            );
        }
        if self.pixmap == 0 {
            return Err(anyhow!("XCreatePixmap failed"));
        }
        let background = self.appearance.palette.background;
        self.clear(background)
    }

    fn setup_wm_protocols(&mut self, title: &str) {
        unsafe {
            self.wm_delete_window = xlib::XInternAtom(
                self.display,
                b"WM_DELETE_WINDOW\0".as_ptr() as *const c_char,
                xlib::False,
            );
            self.protocols_atom = xlib::XInternAtom(
                self.display,
                b"WM_PROTOCOLS\0".as_ptr() as *const c_char,
                xlib::False,
            );
            if self.wm_delete_window != 0 {
                xlib::XSetWMProtocols(self.display, self.window, [self.wm_delete_window].as_mut_ptr(), 1);
            }
            if let Ok(title) = CString::new(title) {
                xlib::XStoreName(self.display, self.window, title.as_ptr() as *mut c_char);
            }
            let mut hints: xlib::XSizeHints = mem::zeroed();
            hints.flags = xlib::PMinSize;
            hints.min_width = (2 * self.appearance.padding + 16) as c_int;
            hints.min_height = (self.window_height - self.graph_height + 16) as c_int;
            if !self.resizable {
                hints.flags |= xlib::PMaxSize;
                hints.min_width = self.window_width as c_int;
                hints.min_height = self.window_height as c_int;
                hints.max_width = self.window_width as c_int;
                hints.max_height = self.window_height as c_int;
            }
            xlib::XSetWMNormalHints(self.display, self.window, &mut hints);
        }
    }

    fn foreground(&self, color: Color) {
        unsafe {
            xlib::XSetForeground(self.display, self.gc, color.to_pixel() as libc::c_ulong);
        }
    }

    /// `(x, y, width, height)` of the status area in window coordinates.
    fn status_area(&self) -> (i32, i32, u32, u32) {
        let a = &self.appearance;
        let x = a.padding as i32;
        let y = (a.padding + self.graph_height + a.status_padding) as i32;
        let width = self.window_width.saturating_sub(2 * a.padding).max(1);
        let height = self
            .window_height
            .saturating_sub(y as u32 + a.padding)
            .max(1);
        (x, y, width, height)
    }

    fn font_metrics(&self) -> (i32, i32) {
        if self.font.is_null() {
            return (10, 13);
        }
        let font = unsafe { &*self.font };
        (font.ascent, font.ascent + font.descent)
    }

    fn draw_rainbow(&self) {
        let palette = &self.appearance.palette;
        let (sx, _, sw, _) = self.status_area();
        let x0 = self.appearance.padding as i32;
        let y = (self.appearance.padding + self.graph_height + 1) as i32;
        let step = (self.graph_width / GRAPH_SLOTS as u32).max(1);
        let rem = self.graph_width.saturating_sub(step * GRAPH_SLOTS as u32);
        let mut x = x0;
        for (i, color) in palette.graph.iter().enumerate() {
            let width = if i == 0 {
                step + rem / 2
            } else if i + 1 == GRAPH_SLOTS {
                ((sx + sw as i32) - x + 1).max(1) as u32
            } else {
                step
            };
            self.foreground(*color);
            unsafe {
                xlib::XFillRectangle(self.display, self.window, self.gc, x, y, width, RAINBOW_HEIGHT);
            }
            x += width as i32;
        }
    }

    fn draw_status(&self) {
        let (x, y, width, height) = self.status_area();
        let (ascent, line_height) = self.font_metrics();
        unsafe {
            xlib::XClearArea(self.display, self.window, x, y, width, height, xlib::False);
        }
        self.foreground(self.appearance.palette.graph[0]);
        unsafe {
            xlib::XDrawRectangle(self.display, self.window, self.gc, x, y, width, height);
        }
        let lines = [&self.status.line1, &self.status.line2];
        for (i, line) in lines.iter().enumerate() {
            let baseline = y + ascent + i as i32 * line_height;
            unsafe {
                xlib::XDrawString(
                    self.display,
                    self.window,
                    self.gc,
                    x + 2,
                    baseline,
                    line.as_ptr() as *const c_char,
                    line.len() as c_int,
                );
            }
        }
    }

    fn handle_configure(&mut self, width: u32, height: u32, actions: &mut Vec<UiAction>) {
        if width == self.window_width && height == self.window_height {
            return;
        }
        debug!(
            "X11Display: window resized {}x{} -> {}x{}",
            self.window_width, self.window_height, width, height
        );
        self.window_width = width;
        self.window_height = height;
        if !self.resizable {
            actions.push(UiAction::Expose);
            return;
        }
        let a = &self.appearance;
        let graph_width = width.saturating_sub(2 * a.padding).max(1);
        let graph_height = height
            .saturating_sub(2 * a.padding + a.status_padding + a.status_height)
            .max(1);
        self.graph_width = graph_width;
        self.graph_height = graph_height;
        unsafe { xlib::XFreePixmap(self.display, self.pixmap) };
        if let Err(e) = self.create_pixmap() {
            error!("X11Display: {}", e);
        }
        actions.push(UiAction::Resize {
            width: graph_width,
            height: graph_height,
        });
    }

    fn translate_key(&self, event: &mut xlib::XKeyEvent) -> Option<UiAction> {
        let mut keysym: xlib::KeySym = 0;
        let mut text = [0u8; KEY_TEXT_BUFFER_SIZE];
        let count = unsafe {
            xlib::XLookupString(
                event,
                text.as_mut_ptr() as *mut c_char,
                text.len() as c_int,
                &mut keysym,
                ptr::null_mut(),
            )
        };
        let base = unsafe { xlib::XLookupKeysym(event, 0) };

        let mut modifiers = Modifiers::empty();
        if event.state & xlib::ShiftMask != 0 {
            modifiers.insert(Modifiers::SHIFT);
        }
        if event.state & xlib::ControlMask != 0 {
            modifiers.insert(Modifiers::CONTROL);
        }
        if event.state & xlib::Mod1Mask != 0 {
            modifiers.insert(Modifiers::ALT);
        }

        let text = if count > 0 {
            String::from_utf8_lossy(&text[..count as usize]).into_owned()
        } else {
            String::new()
        };
        let symbol = keysym_to_symbol(keysym, base, &text);
        trace!(
            "X11Display: key {:?} (keysym {:#x}, text '{}', {:?})",
            symbol,
            keysym,
            text,
            modifiers
        );
        keys::binding(symbol, modifiers)
    }
}

/// Whether `event` reports the destruction of `window`.
fn destroys(event: &xlib::XEvent, window: xlib::Window) -> bool {
    event.get_type() == xlib::DestroyNotify && unsafe { event.destroy_window }.window == window
}

/// Digits are taken from the unshifted keysym so that Shift+1 stays '1'.
fn keysym_to_symbol(keysym: xlib::KeySym, base: xlib::KeySym, text: &str) -> KeySymbol {
    if (keysym::XK_0 as xlib::KeySym..=keysym::XK_9 as xlib::KeySym).contains(&base) {
        let digit = (base - keysym::XK_0 as xlib::KeySym) as u32;
        if let Some(c) = char::from_digit(digit, 10) {
            return KeySymbol::Char(c);
        }
    }
    match keysym as u32 {
        keysym::XK_Escape => KeySymbol::Escape,
        keysym::XK_Home | keysym::XK_KP_Home => KeySymbol::Home,
        keysym::XK_Left | keysym::XK_KP_Left => KeySymbol::Left,
        keysym::XK_Right | keysym::XK_KP_Right => KeySymbol::Right,
        keysym::XK_Page_Up | keysym::XK_KP_Page_Up => KeySymbol::PageUp,
        keysym::XK_Page_Down | keysym::XK_KP_Page_Down => KeySymbol::PageDown,
        keysym::XK_KP_Add => KeySymbol::KeypadPlus,
        keysym::XK_KP_Subtract => KeySymbol::KeypadMinus,
        _ => text
            .chars()
            .next()
            .filter(|c| *c != '\u{FFFD}')
            .map(KeySymbol::Char)
            .unwrap_or_default(),
    }
}

impl Surface for X11Display {
    fn graph_size(&self) -> (u32, u32) {
        (self.graph_width, self.graph_height)
    }

    fn clear_region(&mut self, rect: Rect, color: Color) -> Result<()> {
        self.foreground(color);
        unsafe {
            xlib::XFillRectangle(
                self.display,
                self.pixmap,
                self.gc,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
            );
        }
        self.foreground(self.draw_color);
        Ok(())
    }

    fn set_draw_color(&mut self, color: Color) -> Result<()> {
        self.draw_color = color;
        self.foreground(color);
        Ok(())
    }

    fn draw_points(&mut self, points: &[Point]) -> Result<()> {
        let mut xpoints: Vec<xlib::XPoint> = points
            .iter()
            .map(|p| xlib::XPoint {
                x: clamp_i16(p.x),
                y: clamp_i16(p.y),
            })
            .collect();
        unsafe {
            xlib::XDrawPoints(
                self.display,
                self.pixmap,
                self.gc,
                xpoints.as_mut_ptr(),
                xpoints.len() as c_int,
                xlib::CoordModeOrigin,
            );
        }
        Ok(())
    }

    fn fill_rects(&mut self, rects: &[Rect]) -> Result<()> {
        let mut xrects: Vec<xlib::XRectangle> = rects
            .iter()
            .map(|r| xlib::XRectangle {
                x: clamp_i16(r.x),
                y: clamp_i16(r.y),
                width: clamp_u16(r.width),
                height: clamp_u16(r.height),
            })
            .collect();
        unsafe {
            xlib::XFillRectangles(
                self.display,
                self.pixmap,
                self.gc,
                xrects.as_mut_ptr(),
                xrects.len() as c_int,
            );
        }
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let pad = self.appearance.padding as c_int;
        unsafe {
            xlib::XCopyArea(
                self.display,
                self.pixmap,
                self.window,
                self.gc,
                0,
                0,
                self.graph_width,
                self.graph_height,
                pad,
                pad,
            );
        }
        self.draw_rainbow();
        self.draw_status();
        self.foreground(self.draw_color);
        unsafe { xlib::XFlush(self.display) };
        Ok(())
    }
}

impl Display for X11Display {
    fn surface(&mut self) -> &mut dyn Surface {
        self
    }

    fn event_fd(&self) -> Option<RawFd> {
        if self.closed {
            return None;
        }
        Some(unsafe { xlib::XConnectionNumber(self.display) })
    }

    fn poll_actions(&mut self) -> Result<Vec<UiAction>> {
        let mut actions = Vec::new();
        if self.closed {
            return Ok(actions);
        }
        while unsafe { xlib::XPending(self.display) } > 0 {
            let mut event: xlib::XEvent = unsafe { mem::zeroed() };
            unsafe { xlib::XNextEvent(self.display, &mut event) };
            match event.get_type() {
                xlib::Expose => {
                    let expose = unsafe { event.expose };
                    if expose.count == 0 {
                        actions.push(UiAction::Expose);
                    }
                }
                xlib::ConfigureNotify => {
                    let configure = unsafe { event.configure };
                    self.handle_configure(
                        configure.width.max(1) as u32,
                        configure.height.max(1) as u32,
                        &mut actions,
                    );
                }
                xlib::KeyPress => {
                    let mut key = unsafe { event.key };
                    if let Some(action) = self.translate_key(&mut key) {
                        actions.push(action);
                    }
                }
                xlib::ClientMessage => {
                    let message = unsafe { event.client_message };
                    if message.message_type == self.protocols_atom
                        && message.data.get_long(0) as xlib::Atom == self.wm_delete_window
                    {
                        debug!("X11Display: close requested by the window manager");
                        actions.push(UiAction::Quit);
                    }
                }
                xlib::DestroyNotify => {
                    if destroys(&event, self.window) {
                        debug!("X11Display: window {} destroyed", self.window);
                        self.window_gone = true;
                        actions.push(UiAction::Quit);
                    }
                }
                other => trace!("X11Display: ignoring event type {}", other),
            }
        }
        Ok(actions)
    }

    fn set_status(&mut self, status: &StatusLine) -> Result<()> {
        if self.status != *status {
            self.status = status.clone();
            if !self.closed {
                self.draw_status();
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        unsafe {
            if !self.font.is_null() {
                xlib::XFreeFont(self.display, self.font);
            }
            xlib::XFreePixmap(self.display, self.pixmap);
            xlib::XFreeGC(self.display, self.gc);
            if !self.window_gone {
                xlib::XDestroyWindow(self.display, self.window);
            }
            xlib::XCloseDisplay(self.display);
        }
        debug!("X11Display: closed");
        Ok(())
    }

    fn abandon(self: Box<Self>) {
        if !self.closed {
            let fd = unsafe { xlib::XConnectionNumber(self.display) };
            // The server connection belongs to the parent; only drop our copy
            // of the socket. The Xlib structures are leaked on purpose.
            unsafe { libc::close(fd) };
            trace!("X11Display: abandoned connection fd {}", fd);
        }
        mem::forget(self);
    }
}

impl Drop for X11Display {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("X11Display: cleanup failed: {}", e);
        }
    }
}
