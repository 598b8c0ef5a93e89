//! HID report types, keycode translation and the normalizer that turns
//! raw interrupt payloads into key and mouse events.

pub mod keyboard;
pub mod keymap;
pub mod mouse;
pub mod normalizer;
pub mod report_descriptor;


pub use keyboard::{KeyboardReport, Modifiers, ReportSource};
pub use keymap::{keycode_to_ascii, Locale};
pub use mouse::{MouseButtons, MouseLayout, MouseReport};
pub use normalizer::{Normalizer, ReportHistory};
