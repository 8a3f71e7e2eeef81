use std::collections::HashSet;

use iced::keyboard::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    FramePress,
    ToggleCameraPress,
}

#[derive(Debug, Clone)]
struct Binding {
    key: Key,
    press: Option<HotkeyAction>,
    release: Option<HotkeyAction>,
}

/// Edge-triggered keyboard bindings. A held key fires its press action
/// once; pausing drops events entirely until resume. Defaults: F
/// frames the view, T toggles the camera projection.
#[derive(Debug, Clone)]
pub struct Hotkeys {
    bindings: Vec<Binding>,
    held: HashSet<Key>,
    paused: bool,
}

impl Default for Hotkeys {
    fn default() -> Self {
        let mut hotkeys = Self {
            bindings: Vec::new(),
            held: HashSet::new(),
            paused: false,
        };
        hotkeys.bind(
            Key::Character("f".into()),
            Some(HotkeyAction::FramePress),
            None,
        );
        hotkeys.bind(
            Key::Character("t".into()),
            Some(HotkeyAction::ToggleCameraPress),
            None,
        );
        hotkeys
    }
}

impl Hotkeys {
    pub fn bind(
        &mut self,
        key: Key,
        press: Option<HotkeyAction>,
        release: Option<HotkeyAction>,
    ) {
        self.bindings.retain(|b| b.key != key);
        self.bindings.push(Binding {
            key,
            press,
            release,
        });
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
        self.held.clear();
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn key_down(&mut self, key: &Key) -> Option<HotkeyAction> {
        if self.paused || !self.held.insert(key.clone()) {
            return None;
        }
        self.bindings
            .iter()
            .find(|b| &b.key == key)
            .and_then(|b| b.press)
    }

    pub fn key_up(&mut self, key: &Key) -> Option<HotkeyAction> {
        if self.paused {
            return None;
        }
        self.held.remove(key);
        self.bindings
            .iter()
            .find(|b| &b.key == key)
            .and_then(|b| b.release)
    }
}
