#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Tab,
    Enter,
    Space,
    Shift,
    Ctrl,
    Alt,
    Meta,
    End,
    Escape,
    F5,
    Char(char),
}

impl Key {
    pub(crate) fn to_rdev(self) -> Option<rdev::Key> {
        use rdev::Key as K;
        Some(match self {
            Key::Tab => K::Tab,
            Key::Enter => K::Return,
            Key::Space => K::Space,
            Key::Shift => K::ShiftLeft,
            Key::Ctrl => K::ControlLeft,
            Key::Alt => K::Alt,
            Key::Meta => K::MetaLeft,
            Key::End => K::End,
            Key::Escape => K::Escape,
            Key::F5 => K::F5,
            Key::Char(c) => return char_key(c).map(|(key, _)| key),
        })
    }
}

/// Physical key for `c` on a US layout, plus whether shift is needed.
pub(crate) fn char_key(c: char) -> Option<(rdev::Key, bool)> {
    use rdev::Key as K;
    let lower = c.to_ascii_lowercase();
    let shifted = c.is_ascii_uppercase();
    let key = match lower {
        'a' => K::KeyA,
        'b' => K::KeyB,
        'c' => K::KeyC,
        'd' => K::KeyD,
        'e' => K::KeyE,
        'f' => K::KeyF,
        'g' => K::KeyG,
        'h' => K::KeyH,
        'i' => K::KeyI,
        'j' => K::KeyJ,
        'k' => K::KeyK,
        'l' => K::KeyL,
        'm' => K::KeyM,
        'n' => K::KeyN,
        'o' => K::KeyO,
        'p' => K::KeyP,
        'q' => K::KeyQ,
        'r' => K::KeyR,
        's' => K::KeyS,
        't' => K::KeyT,
        'u' => K::KeyU,
        'v' => K::KeyV,
        'w' => K::KeyW,
        'x' => K::KeyX,
        'y' => K::KeyY,
        'z' => K::KeyZ,
        '0' => K::Num0,
        '1' => K::Num1,
        '2' => K::Num2,
        '3' => K::Num3,
        '4' => K::Num4,
        '5' => K::Num5,
        '6' => K::Num6,
        '7' => K::Num7,
        '8' => K::Num8,
        '9' => K::Num9,
        ' ' => K::Space,
        '\n' => K::Return,
        '\t' => K::Tab,
        '-' => K::Minus,
        '=' => K::Equal,
        '.' => K::Dot,
        ',' => K::Comma,
        '/' => K::Slash,
        '\\' => K::BackSlash,
        ';' => K::SemiColon,
        '\'' => K::Quote,
        '[' => K::LeftBracket,
        ']' => K::RightBracket,
        ':' => return Some((K::SemiColon, true)),
        '*' => return Some((K::Num8, true)),
        '_' => return Some((K::Minus, true)),
        '?' => return Some((K::Slash, true)),
        '!' => return Some((K::Num1, true)),
        '&' => return Some((K::Num7, true)),
        '%' => return Some((K::Num5, true)),
        '#' => return Some((K::Num3, true)),
        '@' => return Some((K::Num2, true)),
        _ => return None,
    };
    Some((key, shifted))
}
