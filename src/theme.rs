use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{read_json_or_default, write_json, PersistenceError};

/// Terminal palette index, 0..=7.
pub const COLOR_NAMES: [&str; 8] = ["Black", "Red", "Green", "Yellow", "Blue", "Magenta", "Cyan", "White"];

pub fn color_name(value: u8) -> &'static str {
    COLOR_NAMES[(value % 8) as usize]
}

pub fn to_color(value: u8) -> Color {
    match value % 8 {
        0 => Color::Black,
        1 => Color::Red,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Blue,
        5 => Color::Magenta,
        6 => Color::Cyan,
        _ => Color::White,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub header_fg: u8,
    pub header_bg: u8,
    pub selected_fg: u8,
    pub selected_bg: u8,
    pub user_msg_fg: u8,
    pub assistant_msg_fg: u8,
    pub error_msg_fg: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_fg: 7,
            header_bg: 4,
            selected_fg: 0,
            selected_bg: 7,
            user_msg_fg: 2,
            assistant_msg_fg: 6,
            error_msg_fg: 1,
        }
    }
}

/// The editable colour slots, in the order the theme screen lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeSlot {
    HeaderFg,
    HeaderBg,
    SelectedFg,
    SelectedBg,
    UserMsgFg,
    AssistantMsgFg,
    ErrorMsgFg,
}

impl ThemeSlot {
    pub const ALL: [ThemeSlot; 7] = [
        ThemeSlot::HeaderFg,
        ThemeSlot::HeaderBg,
        ThemeSlot::SelectedFg,
        ThemeSlot::SelectedBg,
        ThemeSlot::UserMsgFg,
        ThemeSlot::AssistantMsgFg,
        ThemeSlot::ErrorMsgFg,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ThemeSlot::HeaderFg => "Header Text Color",
            ThemeSlot::HeaderBg => "Header Background Color",
            ThemeSlot::SelectedFg => "Selected Item Text Color",
            ThemeSlot::SelectedBg => "Selected Item Background Color",
            ThemeSlot::UserMsgFg => "User Message Color",
            ThemeSlot::AssistantMsgFg => "Assistant Message Color",
            ThemeSlot::ErrorMsgFg => "Error Message Color",
        }
    }
}

impl Theme {
    pub fn get(&self, slot: ThemeSlot) -> u8 {
        match slot {
            ThemeSlot::HeaderFg => self.header_fg,
            ThemeSlot::HeaderBg => self.header_bg,
            ThemeSlot::SelectedFg => self.selected_fg,
            ThemeSlot::SelectedBg => self.selected_bg,
            ThemeSlot::UserMsgFg => self.user_msg_fg,
            ThemeSlot::AssistantMsgFg => self.assistant_msg_fg,
            ThemeSlot::ErrorMsgFg => self.error_msg_fg,
        }
    }

    fn slot_mut(&mut self, slot: ThemeSlot) -> &mut u8 {
        match slot {
            ThemeSlot::HeaderFg => &mut self.header_fg,
            ThemeSlot::HeaderBg => &mut self.header_bg,
            ThemeSlot::SelectedFg => &mut self.selected_fg,
            ThemeSlot::SelectedBg => &mut self.selected_bg,
            ThemeSlot::UserMsgFg => &mut self.user_msg_fg,
            ThemeSlot::AssistantMsgFg => &mut self.assistant_msg_fg,
            ThemeSlot::ErrorMsgFg => &mut self.error_msg_fg,
        }
    }

    /// Advance a slot to the next palette colour, wrapping after white.
    pub fn cycle(&mut self, slot: ThemeSlot) {
        let value = self.slot_mut(slot);
        *value = (*value + 1) % 8;
    }

    /// Bring out-of-range values from a hand-edited file back into the palette.
    fn normalized(mut self) -> Self {
        for slot in ThemeSlot::ALL {
            let value = self.slot_mut(slot);
            *value %= 8;
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    pub fn new(dir: &Path) -> Self {
        Self { path: dir.join("theme.json") }
    }

    pub fn load(&self) -> Theme {
        read_json_or_default::<Theme>(&self.path).normalized()
    }

    pub fn save(&self, theme: &Theme) -> Result<(), PersistenceError> {
        write_json(&self.path, theme)?;
        info!(path = %self.path.display(), "theme saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cycle_wraps_after_white() {
        let mut theme = Theme::default();
        assert_eq!(theme.get(ThemeSlot::HeaderFg), 7);

        theme.cycle(ThemeSlot::HeaderFg);

        assert_eq!(theme.get(ThemeSlot::HeaderFg), 0);
        assert_eq!(color_name(theme.header_fg), "Black");
    }

    #[test]
    fn test_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ThemeStore::new(dir.path());
        let mut theme = Theme::default();
        theme.cycle(ThemeSlot::ErrorMsgFg);

        store.save(&theme).unwrap();

        assert_eq!(store.load(), theme);
    }

    #[test]
    fn test_missing_fields_and_bad_values() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("theme.json"), r#"{"header_bg": 12}"#).unwrap();

        let theme = ThemeStore::new(dir.path()).load();

        assert_eq!(theme.header_bg, 4);
        assert_eq!(theme.user_msg_fg, Theme::default().user_msg_fg);
    }
}
