//! OSC dispatch

use base64::Engine;
use kterm_core::{parse_color_spec, Rgb};
use kterm_parser::OscAction;

use super::Session;
use crate::host::TerminalHost;

/// Dynamic colors addressed by OSC 10/11/12
#[derive(Debug, Clone, Copy)]
enum Dynamic {
    Foreground,
    Background,
    Cursor,
}

impl Dynamic {
    fn code(self) -> u16 {
        match self {
            Dynamic::Foreground => 10,
            Dynamic::Background => 11,
            Dynamic::Cursor => 12,
        }
    }
}

impl Session {
    pub(super) fn handle_osc(&mut self, osc: OscAction, host: &mut dyn TerminalHost) {
        match osc {
            OscAction::SetIconAndTitle(text) => {
                let text = self.cap_title(text);
                self.screen.set_title(&text);
                self.screen.set_icon_title(&text);
                host.title(&text, false);
                host.title(&text, true);
            }
            OscAction::SetIconName(text) => {
                let text = self.cap_title(text);
                self.screen.set_icon_title(&text);
                host.title(&text, true);
            }
            OscAction::SetTitle(text) => {
                let text = self.cap_title(text);
                self.screen.set_title(&text);
                host.title(&text, false);
            }
            OscAction::SetColor(pairs) => {
                for (index, spec) in pairs {
                    if spec == "?" {
                        let rgb = self.screen.palette().get(index);
                        let reply = format!("\x1b]4;{};{}\x1b\\", index, rgb.to_x11_spec());
                        self.respond(reply.as_bytes(), host);
                    } else if let Some(rgb) = parse_color_spec(&spec) {
                        self.screen.palette_mut().set(index, rgb);
                        self.screen.grid_mut().mark_all_dirty();
                    } else {
                        self.diagnostics
                            .malformed(format_args!("OSC 4: bad color spec {:?}", spec));
                    }
                }
            }
            OscAction::SetForegroundColor(spec) => self.dynamic_color(Dynamic::Foreground, &spec, host),
            OscAction::SetBackgroundColor(spec) => self.dynamic_color(Dynamic::Background, &spec, host),
            OscAction::SetCursorColor(spec) => self.dynamic_color(Dynamic::Cursor, &spec, host),
            OscAction::SetFont(font) => {
                log::debug!("OSC 50 font {:?} ignored", font);
            }
            OscAction::Clipboard { clipboard, data } => self.clipboard(&clipboard, &data, host),
            OscAction::ResetColor(indexes) => {
                let palette = self.screen.palette_mut();
                if indexes.is_empty() {
                    palette.reset();
                } else {
                    for index in indexes {
                        palette.reset_entry(index);
                    }
                }
                self.screen.grid_mut().mark_all_dirty();
            }
            OscAction::ResetForegroundColor => {
                let palette = self.screen.palette_mut();
                palette.foreground = kterm_core::Palette::new().foreground;
            }
            OscAction::ResetBackgroundColor => {
                let palette = self.screen.palette_mut();
                palette.background = kterm_core::Palette::new().background;
            }
            OscAction::ResetCursorColor => {
                let palette = self.screen.palette_mut();
                palette.cursor = kterm_core::Palette::new().cursor;
                self.screen.cursor_mut().color = None;
            }
            OscAction::Notify { title, body } => {
                let text = if title.is_empty() {
                    body
                } else {
                    format!("{}: {}", title, body)
                };
                host.notification(&text);
            }
            OscAction::Unknown { command, data } => {
                self.diagnostics
                    .unsupported(format_args!("OSC {};{}", command, data));
            }
        }
    }

    fn cap_title(&self, mut text: String) -> String {
        let max = self.config.max_title_len;
        if text.len() > max {
            let mut end = max;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        text
    }

    /// OSC 10/11/12: `?` queries, anything else sets
    fn dynamic_color(&mut self, which: Dynamic, spec: &str, host: &mut dyn TerminalHost) {
        if spec == "?" {
            let palette = self.screen.palette();
            let rgb = match which {
                Dynamic::Foreground => palette.foreground,
                Dynamic::Background => palette.background,
                Dynamic::Cursor => palette.cursor,
            };
            let reply = format!("\x1b]{};{}\x1b\\", which.code(), rgb.to_x11_spec());
            self.respond(reply.as_bytes(), host);
            return;
        }
        let Some(rgb) = parse_color_spec(spec) else {
            self.diagnostics
                .malformed(format_args!("OSC {}: bad color spec {:?}", which.code(), spec));
            return;
        };
        self.set_dynamic(which, rgb);
    }

    fn set_dynamic(&mut self, which: Dynamic, rgb: Rgb) {
        let palette = self.screen.palette_mut();
        match which {
            Dynamic::Foreground => palette.foreground = rgb,
            Dynamic::Background => palette.background = rgb,
            Dynamic::Cursor => {
                palette.cursor = rgb;
                self.screen.cursor_mut().color = Some(rgb);
            }
        }
        self.screen.grid_mut().mark_all_dirty();
    }

    /// OSC 52 `Pc ; base64`; `?` queries, which always answer empty
    fn clipboard(&mut self, selection: &str, data: &str, host: &mut dyn TerminalHost) {
        if data == "?" {
            let reply = format!("\x1b]52;{};\x1b\\", selection);
            self.respond(reply.as_bytes(), host);
            return;
        }
        if !self.config.osc52_clipboard {
            log::debug!("OSC 52 clipboard write disabled");
            return;
        }
        let bytes = match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.diagnostics.malformed(format_args!("OSC 52: {}", e));
                return;
            }
        };
        if bytes.len() > self.config.osc52_max_size {
            self.diagnostics.overflow(format_args!(
                "OSC 52 payload of {} bytes over the {} byte limit",
                bytes.len(),
                self.config.osc52_max_size
            ));
            return;
        }
        host.clipboard(selection, &bytes);
    }
}
