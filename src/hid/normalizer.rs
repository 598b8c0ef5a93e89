//! Raw interrupt payload → canonical reports → key/button events.
//!
//! Dispatch is decided per completion from the producing endpoint's
//! interface class triple, plus the vendor strategy chosen for the device:
//!
//! | interface       | vendor strategy | decoded as                     |
//! |-----------------|-----------------|--------------------------------|
//! | any HID         | yes             | strategy (byte-scan / matrix)  |
//! | boot keyboard   | no              | boot keyboard report           |
//! | boot mouse      | no              | mouse report (profile layout)  |
//! | anything else   | -               | passed through as unrecognized |
//!
//! Keyboard events for one report are emitted in this order: modifier
//! presses, key releases, key presses, modifier releases.

use crate::error::Error;
use crate::events::{EventSink, KeyEvent};
use crate::hid::keyboard::{KeyboardReport, KEYBOARD_REPORT_SIZE};
use crate::hid::keymap::{keycode_to_ascii, Locale};
use crate::hid::mouse::{MouseLayout, MouseReport};
use crate::quirks::{DecodeStrategy, DeviceProfile, KeyState};
use crate::usb::{EndpointAddress, InterfaceKind};

/// Previous reports and vendor switch state of one endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportHistory {
    pub keyboard: KeyboardReport,
    pub mouse: MouseReport,
    pub matrix: KeyState,
}

/// Per-device decoding choices: strategy, locale and mouse layout.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    locale: Locale,
    strategy: Option<DecodeStrategy>,
    mouse_layout: MouseLayout,
}

impl Normalizer {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            ..Self::default()
        }
    }

    /// Fix the decoding choices for a newly configured device.
    pub fn configure(&mut self, profile: Option<&DeviceProfile>, locale: Locale) {
        self.locale = locale;
        self.strategy = profile.and_then(|p| p.strategy);
        self.mouse_layout = profile.map_or(MouseLayout::Boot, |p| p.mouse_layout);
    }

    /// Forget the device-specific choices.
    pub fn reset(&mut self) {
        self.strategy = None;
        self.mouse_layout = MouseLayout::Boot;
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn strategy(&self) -> Option<DecodeStrategy> {
        self.strategy
    }

    /// Decode one completed transfer and emit its events.
    ///
    /// A payload too short for the selected decoder is rejected with
    /// `history` untouched.
    pub fn process<S: EventSink>(
        &mut self,
        endpoint: EndpointAddress,
        kind: InterfaceKind,
        payload: &[u8],
        history: &mut ReportHistory,
        sink: &mut S,
    ) -> Result<(), Error> {
        trace!("ep{:#x} payload {:?}", endpoint.0, payload);

        match (self.strategy, kind) {
            (Some(strategy), kind) if kind.is_hid() => {
                self.decode_vendor(strategy, payload, history, sink)
            }
            (_, InterfaceKind::BootKeyboard) => {
                let current = KeyboardReport::from_boot_bytes(payload).ok_or(Error::ReportTooShort {
                    needed: KEYBOARD_REPORT_SIZE,
                    actual: payload.len(),
                })?;
                if current.is_rollover() {
                    debug!("ep{:#x} rollover report ignored", endpoint.0);
                    return Ok(());
                }
                self.emit_keyboard(current, history, sink);
                Ok(())
            }
            (_, InterfaceKind::BootMouse) => {
                let layout = self.mouse_layout;
                let current = MouseReport::from_bytes(payload, layout).ok_or(Error::ReportTooShort {
                    needed: layout.min_len(),
                    actual: payload.len(),
                })?;
                emit_mouse(current, history, sink);
                Ok(())
            }
            _ => {
                sink.on_unrecognized_data(endpoint, payload);
                Ok(())
            }
        }
    }

    fn decode_vendor<S: EventSink>(
        &mut self,
        strategy: DecodeStrategy,
        payload: &[u8],
        history: &mut ReportHistory,
        sink: &mut S,
    ) -> Result<(), Error> {
        match strategy {
            DecodeStrategy::ByteScan(layout) => {
                let current = layout.decode(payload)?;
                self.emit_keyboard(current, history, sink);
            }
            DecodeStrategy::Matrix(layout) => {
                let changes = layout.decode(payload, &mut history.matrix)?;
                if changes.is_empty() {
                    return Ok(());
                }
                for change in &changes {
                    debug!(
                        "matrix ({}, {}) {} usage {:#x}",
                        change.row,
                        change.col,
                        change.pressed,
                        change.usage
                    );
                    sink.on_matrix_key_changed(change.row, change.col, change.pressed);
                }
                let current = layout.report(&history.matrix);
                self.emit_keyboard(current, history, sink);
            }
        }
        Ok(())
    }

    fn emit_keyboard<S: EventSink>(
        &self,
        current: KeyboardReport,
        history: &mut ReportHistory,
        sink: &mut S,
    ) {
        let previous = history.keyboard;
        if current.same_state(&previous) {
            return;
        }
        sink.on_keyboard_report(&current, &previous);

        let now = current.modifiers();
        let before = previous.modifiers();
        let shift = now.shift();
        let key = |usage: u8, pressed: bool| KeyEvent {
            usage,
            ascii: keycode_to_ascii(usage, shift, self.locale),
            modifier: current.modifier,
            pressed,
        };

        for usage in (now - before).usages() {
            sink.on_key_event(key(usage, true));
        }
        for usage in current.released_since(&previous) {
            sink.on_key_event(key(usage, false));
        }
        for usage in current.pressed_since(&previous) {
            sink.on_key_event(key(usage, true));
        }
        for usage in (before - now).usages() {
            sink.on_key_event(key(usage, false));
        }

        history.keyboard = current;
    }
}

fn emit_mouse<S: EventSink>(current: MouseReport, history: &mut ReportHistory, sink: &mut S) {
    let previous = history.mouse.buttons();
    let now = current.buttons();
    sink.on_mouse_report(&current, previous);

    for button in (now ^ previous).iter() {
        sink.on_mouse_buttons_changed(button, now.contains(button));
    }
    if current.has_motion() {
        sink.on_mouse_moved(&current);
    }

    history.mouse = current;
}
