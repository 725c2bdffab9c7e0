use std::fmt;
use std::ops::BitOr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Bit set of modifier keys and held buttons attached to an input event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers(u32);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const SHIFT: Self = Self(1 << 0);
    pub const CTRL: Self = Self(1 << 1);
    pub const ALT: Self = Self(1 << 2);
    pub const META: Self = Self(1 << 3);
    pub const KEYPAD: Self = Self(1 << 4);
    pub const AUTOREPEAT: Self = Self(1 << 5);
    pub const LEFT_BUTTON_DOWN: Self = Self(1 << 6);
    pub const MIDDLE_BUTTON_DOWN: Self = Self(1 << 7);
    pub const RIGHT_BUTTON_DOWN: Self = Self(1 << 8);
    pub const CAPS_LOCK: Self = Self(1 << 9);
    pub const NUM_LOCK: Self = Self(1 << 10);

    const NAMES: [(Self, &'static str); 11] = [
        (Self::SHIFT, "shift"),
        (Self::CTRL, "ctrl"),
        (Self::ALT, "alt"),
        (Self::META, "meta"),
        (Self::KEYPAD, "keypad"),
        (Self::AUTOREPEAT, "autorepeat"),
        (Self::LEFT_BUTTON_DOWN, "left-button-down"),
        (Self::MIDDLE_BUTTON_DOWN, "middle-button-down"),
        (Self::RIGHT_BUTTON_DOWN, "right-button-down"),
        (Self::CAPS_LOCK, "caps-lock"),
        (Self::NUM_LOCK, "num-lock"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Space-terminated list of the set modifiers, e.g. `"shift alt "`.
    pub fn describe(self) -> String {
        Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| format!("{name} "))
            .collect()
    }
}

impl BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Classes of input the plugin asks the host to deliver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InputClasses(u32);

impl InputClasses {
    pub const MOUSE: Self = Self(1 << 0);
    pub const KEYBOARD: Self = Self(1 << 1);
    pub const WHEEL: Self = Self(1 << 2);
    pub const TOUCH: Self = Self(1 << 3);
    pub const IME: Self = Self(1 << 4);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for InputClasses {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Mouse button reported with a mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    None,
    Left,
    Middle,
    Right,
    Other(i32),
}

impl MouseButton {
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::None,
            0 => Self::Left,
            1 => Self::Middle,
            2 => Self::Right,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Left => f.write_str("Left"),
            Self::Middle => f.write_str("Middle"),
            Self::Right => f.write_str("Right"),
            Self::Other(code) => write!(f, "Unrecognized ({code})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MouseEvent {
    pub modifiers: Modifiers,
    pub button: MouseButton,
    pub position: Vec2,
    pub click_count: i32,
    pub time: f64,
}

impl MouseEvent {
    pub fn new(button: MouseButton, position: Vec2) -> Self {
        Self {
            modifiers: Modifiers::NONE,
            button,
            position,
            click_count: 0,
            time: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WheelEvent {
    pub modifiers: Modifiers,
    pub delta: Vec2,
    pub ticks: Vec2,
    pub scroll_by_page: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardEvent {
    pub modifiers: Modifiers,
    pub key_code: u32,
    pub time: f64,
    pub text: String,
}

impl KeyboardEvent {
    pub fn new(key_code: u32, text: impl Into<String>) -> Self {
        Self {
            modifiers: Modifiers::NONE,
            key_code,
            time: 0.0,
            text: text.into(),
        }
    }
}

/// Kind of an input event as numbered by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEventKind {
    Undefined,
    MouseDown,
    MouseUp,
    MouseMove,
    MouseEnter,
    MouseLeave,
    Wheel,
    RawKeyDown,
    KeyDown,
    KeyUp,
    Char,
    ContextMenu,
    ImeCompositionStart,
    ImeCompositionUpdate,
    ImeCompositionEnd,
    ImeText,
}

impl InputEventKind {
    pub fn from_code(code: i32) -> Option<Self> {
        use InputEventKind::*;
        Some(match code {
            -1 => Undefined,
            0 => MouseDown,
            1 => MouseUp,
            2 => MouseMove,
            3 => MouseEnter,
            4 => MouseLeave,
            5 => Wheel,
            6 => RawKeyDown,
            7 => KeyDown,
            8 => KeyUp,
            9 => Char,
            10 => ContextMenu,
            11 => ImeCompositionStart,
            12 => ImeCompositionUpdate,
            13 => ImeCompositionEnd,
            14 => ImeText,
            _ => return None,
        })
    }
}

/// An input event delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Undefined,
    MouseDown(MouseEvent),
    MouseUp(MouseEvent),
    MouseMove(MouseEvent),
    MouseEnter(MouseEvent),
    MouseLeave(MouseEvent),
    Wheel(WheelEvent),
    RawKeyDown(KeyboardEvent),
    KeyDown(KeyboardEvent),
    KeyUp(KeyboardEvent),
    Char(KeyboardEvent),
    ContextMenu(KeyboardEvent),
    ImeCompositionStart,
    ImeCompositionUpdate,
    ImeCompositionEnd,
    ImeText,
    /// A type code this build does not know about.
    Unrecognized(i32),
}

/// Data the host attaches to a raw event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Mouse(MouseEvent),
    Wheel(WheelEvent),
    Key(KeyboardEvent),
}

impl InputEvent {
    /// Builds an event from a host type code and its payload. Codes outside
    /// the known range, or whose payload has the wrong shape, decode to
    /// [`InputEvent::Unrecognized`].
    pub fn decode(code: i32, payload: EventPayload) -> Self {
        use EventPayload as P;
        use InputEventKind as K;
        let Some(kind) = InputEventKind::from_code(code) else {
            return Self::Unrecognized(code);
        };
        match (kind, payload) {
            (K::Undefined, _) => Self::Undefined,
            (K::MouseDown, P::Mouse(m)) => Self::MouseDown(m),
            (K::MouseUp, P::Mouse(m)) => Self::MouseUp(m),
            (K::MouseMove, P::Mouse(m)) => Self::MouseMove(m),
            (K::MouseEnter, P::Mouse(m)) => Self::MouseEnter(m),
            (K::MouseLeave, P::Mouse(m)) => Self::MouseLeave(m),
            (K::Wheel, P::Wheel(w)) => Self::Wheel(w),
            (K::RawKeyDown, P::Key(k)) => Self::RawKeyDown(k),
            (K::KeyDown, P::Key(k)) => Self::KeyDown(k),
            (K::KeyUp, P::Key(k)) => Self::KeyUp(k),
            (K::Char, P::Key(k)) => Self::Char(k),
            (K::ContextMenu, P::Key(k)) => Self::ContextMenu(k),
            (K::ImeCompositionStart, _) => Self::ImeCompositionStart,
            (K::ImeCompositionUpdate, _) => Self::ImeCompositionUpdate,
            (K::ImeCompositionEnd, _) => Self::ImeCompositionEnd,
            (K::ImeText, _) => Self::ImeText,
            _ => Self::Unrecognized(code),
        }
    }

    pub fn kind(&self) -> Option<InputEventKind> {
        use InputEventKind as K;
        Some(match self {
            Self::Undefined => K::Undefined,
            Self::MouseDown(_) => K::MouseDown,
            Self::MouseUp(_) => K::MouseUp,
            Self::MouseMove(_) => K::MouseMove,
            Self::MouseEnter(_) => K::MouseEnter,
            Self::MouseLeave(_) => K::MouseLeave,
            Self::Wheel(_) => K::Wheel,
            Self::RawKeyDown(_) => K::RawKeyDown,
            Self::KeyDown(_) => K::KeyDown,
            Self::KeyUp(_) => K::KeyUp,
            Self::Char(_) => K::Char,
            Self::ContextMenu(_) => K::ContextMenu,
            Self::ImeCompositionStart => K::ImeCompositionStart,
            Self::ImeCompositionUpdate => K::ImeCompositionUpdate,
            Self::ImeCompositionEnd => K::ImeCompositionEnd,
            Self::ImeText => K::ImeText,
            Self::Unrecognized(_) => return None,
        })
    }
}

pub fn describe_key_event(instance: i64, event: &KeyboardEvent, kind: &str) -> String {
    format!(
        "{instance}: Key event:{kind} modifier:{} key_code:{} time:{} text:{:?}\n",
        event.modifiers.describe(),
        event.key_code,
        event.time,
        event.text
    )
}

pub fn describe_mouse_event(instance: i64, event: &MouseEvent, kind: &str) -> String {
    format!(
        "{instance}: Mouse event:{kind} modifier:{} button:{} x:{} y:{} click_count:{} time:{}\n",
        event.modifiers.describe(),
        event.button,
        event.position.x,
        event.position.y,
        event.click_count,
        event.time
    )
}

pub fn describe_wheel_event(instance: i64, event: &WheelEvent) -> String {
    format!(
        "{instance}: Wheel event. modifier:{} deltax:{} deltay:{} wheel_ticks_x:{} wheel_ticks_y:{} scroll_by_page: {}\n",
        event.modifiers.describe(),
        event.delta.x,
        event.delta.y,
        event.ticks.x,
        event.ticks.y,
        event.scroll_by_page
    )
}

/// Left-button drag tracking for the viewed object.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DragState {
    pressed: bool,
    last: Vec2,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, position: Vec2) {
        self.pressed = true;
        self.last = position;
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }

    pub fn is_dragging(&self) -> bool {
        self.pressed
    }

    /// Pointer movement since the previous call while the button is held.
    pub fn drag_to(&mut self, position: Vec2) -> Option<Vec2> {
        if !self.pressed {
            return None;
        }
        let delta = position - self.last;
        self.last = position;
        Some(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_describe_in_fixed_order() {
        let mods = Modifiers::NUM_LOCK | Modifiers::SHIFT | Modifiers::LEFT_BUTTON_DOWN;
        assert_eq!(mods.describe(), "shift left-button-down num-lock ");
        assert_eq!(Modifiers::NONE.describe(), "");
        assert!(mods.contains(Modifiers::SHIFT));
        assert!(!mods.contains(Modifiers::CTRL));
    }

    #[test]
    fn mouse_buttons_render_names() {
        assert_eq!(MouseButton::from_code(0).to_string(), "Left");
        assert_eq!(MouseButton::from_code(-1).to_string(), "None");
        assert_eq!(MouseButton::from_code(7).to_string(), "Unrecognized (7)");
    }

    #[test]
    fn event_kind_codes_cover_host_range() {
        for code in -1..=14 {
            assert!(InputEventKind::from_code(code).is_some(), "code {code}");
        }
        assert_eq!(InputEventKind::from_code(15), None);
        assert_eq!(InputEventKind::from_code(-2), None);
        assert_eq!(InputEvent::Unrecognized(99).kind(), None);
        assert_eq!(InputEvent::ImeText.kind(), Some(InputEventKind::ImeText));
    }

    #[test]
    fn raw_events_decode_by_code_and_payload() {
        let mouse = MouseEvent::new(MouseButton::Left, Vec2::new(3.0, 4.0));
        assert_eq!(
            InputEvent::decode(0, EventPayload::Mouse(mouse.clone())),
            InputEvent::MouseDown(mouse.clone())
        );
        let key = KeyboardEvent::new(93, "");
        assert_eq!(
            InputEvent::decode(10, EventPayload::Key(key.clone())),
            InputEvent::ContextMenu(key)
        );
        assert_eq!(
            InputEvent::decode(11, EventPayload::None),
            InputEvent::ImeCompositionStart
        );
        assert_eq!(InputEvent::decode(-1, EventPayload::None), InputEvent::Undefined);
        assert_eq!(
            InputEvent::decode(5, EventPayload::Mouse(mouse)),
            InputEvent::Unrecognized(5)
        );
        assert_eq!(InputEvent::decode(42, EventPayload::None), InputEvent::Unrecognized(42));
    }

    #[test]
    fn mouse_description_lists_fields() {
        let mut event = MouseEvent::new(MouseButton::Left, Vec2::new(10.0, 20.0));
        event.modifiers = Modifiers::CTRL;
        event.click_count = 2;
        event.time = 1.5;
        assert_eq!(
            describe_mouse_event(3, &event, "Down"),
            "3: Mouse event:Down modifier:ctrl  button:Left x:10 y:20 click_count:2 time:1.5\n"
        );
    }

    #[test]
    fn key_and_wheel_descriptions() {
        let key = KeyboardEvent::new(65, "a");
        assert_eq!(
            describe_key_event(1, &key, "Character"),
            "1: Key event:Character modifier: key_code:65 time:0 text:\"a\"\n"
        );
        let wheel = WheelEvent {
            modifiers: Modifiers::NONE,
            delta: Vec2::new(0.0, -120.0),
            ticks: Vec2::new(0.0, -1.0),
            scroll_by_page: false,
        };
        assert!(describe_wheel_event(1, &wheel)
            .starts_with("1: Wheel event. modifier: deltax:0 deltay:-120"));
    }

    #[test]
    fn drag_reports_deltas_only_while_pressed() {
        let mut drag = DragState::new();
        assert_eq!(drag.drag_to(Vec2::new(5.0, 5.0)), None);
        drag.press(Vec2::new(1.0, 1.0));
        assert_eq!(drag.drag_to(Vec2::new(4.0, 3.0)), Some(Vec2::new(3.0, 2.0)));
        assert_eq!(drag.drag_to(Vec2::new(4.0, 4.0)), Some(Vec2::new(0.0, 1.0)));
        drag.release();
        assert!(!drag.is_dragging());
        assert_eq!(drag.drag_to(Vec2::ZERO), None);
    }
}
