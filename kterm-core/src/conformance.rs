//! VT conformance levels and the feature gates derived from them
//!
//! Every level maps to a static record holding its feature flags and the
//! canned Primary / Secondary / Tertiary Device Attribute replies. Commands
//! whose feature is off are ignored and counted as unsupported.

use serde::{Deserialize, Serialize};

/// Terminal conformance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VtLevel {
    Vt52,
    Vt100,
    Vt102,
    Vt132,
    Vt220,
    Vt320,
    Vt330,
    Vt340,
    Vt420,
    Vt510,
    Vt520,
    Vt525,
    AnsiSys,
    Xterm,
}

impl VtLevel {
    /// All levels in table order
    pub const ALL: [VtLevel; 14] = [
        VtLevel::Vt52,
        VtLevel::Vt100,
        VtLevel::Vt102,
        VtLevel::Vt132,
        VtLevel::Vt220,
        VtLevel::Vt320,
        VtLevel::Vt330,
        VtLevel::Vt340,
        VtLevel::Vt420,
        VtLevel::Vt510,
        VtLevel::Vt520,
        VtLevel::Vt525,
        VtLevel::AnsiSys,
        VtLevel::Xterm,
    ];

    /// Numeric identifier (52, 100, ... 525, 999 for xterm, 1 for ANSI.SYS)
    pub fn id(self) -> u16 {
        match self {
            VtLevel::Vt52 => 52,
            VtLevel::Vt100 => 100,
            VtLevel::Vt102 => 102,
            VtLevel::Vt132 => 132,
            VtLevel::Vt220 => 220,
            VtLevel::Vt320 => 320,
            VtLevel::Vt330 => 330,
            VtLevel::Vt340 => 340,
            VtLevel::Vt420 => 420,
            VtLevel::Vt510 => 510,
            VtLevel::Vt520 => 520,
            VtLevel::Vt525 => 525,
            VtLevel::AnsiSys => 1,
            VtLevel::Xterm => 999,
        }
    }

    /// Look up a level by numeric identifier
    pub fn from_id(id: u16) -> Option<VtLevel> {
        VtLevel::ALL.iter().copied().find(|l| l.id() == id)
    }

    /// Parse a configuration / gateway name such as `vt420`, `xterm`, `420`
    pub fn from_name(name: &str) -> Option<VtLevel> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "xterm" => return Some(VtLevel::Xterm),
            "ansi" | "ansi.sys" | "ansisys" => return Some(VtLevel::AnsiSys),
            _ => {}
        }
        let digits = lower.strip_prefix("vt").unwrap_or(&lower);
        digits.parse::<u16>().ok().and_then(VtLevel::from_id)
    }

    /// Level selected by DECSCL `CSI Ps " p` (61..65)
    pub fn from_decscl(ps: u16) -> Option<VtLevel> {
        match ps {
            61 => Some(VtLevel::Vt100),
            62 => Some(VtLevel::Vt220),
            63 => Some(VtLevel::Vt320),
            64 => Some(VtLevel::Vt420),
            65 => Some(VtLevel::Vt520),
            _ => None,
        }
    }

    /// DECSCL operating level reported through DECRQSS
    pub fn decscl_value(self) -> u16 {
        match self {
            VtLevel::Vt52 | VtLevel::Vt100 | VtLevel::Vt102 | VtLevel::Vt132 | VtLevel::AnsiSys => 61,
            VtLevel::Vt220 => 62,
            VtLevel::Vt320 | VtLevel::Vt330 | VtLevel::Vt340 => 63,
            VtLevel::Vt420 => 64,
            VtLevel::Vt510 | VtLevel::Vt520 | VtLevel::Vt525 | VtLevel::Xterm => 65,
        }
    }

    /// Static table record for this level
    pub fn info(self) -> &'static LevelInfo {
        &LEVEL_TABLE[self as usize]
    }
}

/// Error returned when a conformance level name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown conformance level `{0}`")]
pub struct UnknownLevel(pub String);

impl std::str::FromStr for VtLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VtLevel::from_name(s).ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

impl std::fmt::Display for VtLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VtLevel::Xterm => write!(f, "XTERM"),
            VtLevel::AnsiSys => write!(f, "ANSI.SYS"),
            other => write!(f, "VT{}", other.id()),
        }
    }
}

/// Feature gates for a conformance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub vt52: bool,
    pub vt100: bool,
    pub vt220: bool,
    pub vt320: bool,
    pub vt420: bool,
    pub vt520: bool,
    pub xterm: bool,
    pub sixel: bool,
    pub regis: bool,
    pub tektronix: bool,
    pub rect_ops: bool,
    pub soft_fonts: bool,
    pub nrcs: bool,
    pub udk: bool,
    pub locator: bool,
    pub printer: bool,
    pub mouse: bool,
    pub true_color: bool,
    pub left_right_margins: bool,
    pub max_sessions: u8,
}

const NONE: Features = Features {
    vt52: false,
    vt100: false,
    vt220: false,
    vt320: false,
    vt420: false,
    vt520: false,
    xterm: false,
    sixel: false,
    regis: false,
    tektronix: false,
    rect_ops: false,
    soft_fonts: false,
    nrcs: false,
    udk: false,
    locator: false,
    printer: false,
    mouse: false,
    true_color: false,
    left_right_margins: false,
    max_sessions: 1,
};

const VT100_FEATURES: Features = Features {
    vt52: true,
    vt100: true,
    ..NONE
};

const VT220_FEATURES: Features = Features {
    vt220: true,
    soft_fonts: true,
    nrcs: true,
    udk: true,
    printer: true,
    ..VT100_FEATURES
};

const VT320_FEATURES: Features = Features {
    vt320: true,
    ..VT220_FEATURES
};

const VT340_FEATURES: Features = Features {
    sixel: true,
    regis: true,
    tektronix: true,
    locator: true,
    max_sessions: 2,
    ..VT320_FEATURES
};

const VT420_FEATURES: Features = Features {
    vt420: true,
    rect_ops: true,
    left_right_margins: true,
    max_sessions: 2,
    ..VT320_FEATURES
};

const VT520_FEATURES: Features = Features {
    vt520: true,
    max_sessions: 3,
    ..VT420_FEATURES
};

const XTERM_FEATURES: Features = Features {
    vt52: true,
    vt100: true,
    vt220: true,
    vt320: true,
    vt420: true,
    vt520: true,
    xterm: true,
    sixel: true,
    regis: true,
    tektronix: true,
    rect_ops: true,
    soft_fonts: true,
    nrcs: true,
    udk: true,
    locator: true,
    printer: true,
    mouse: true,
    true_color: true,
    left_right_margins: true,
    max_sessions: 3,
};

/// Static description of one conformance level
#[derive(Debug)]
pub struct LevelInfo {
    pub level: VtLevel,
    pub features: Features,
    /// Primary DA reply (`CSI c`)
    pub da1: &'static str,
    /// Secondary DA reply (`CSI > c`)
    pub da2: &'static str,
    /// Tertiary DA reply (`CSI = c`)
    pub da3: &'static str,
}

const DA3_UNIT: &str = "\x1BP!|00000000\x1B\\";

/// Indexed by `VtLevel as usize`
static LEVEL_TABLE: [LevelInfo; 14] = [
    LevelInfo {
        level: VtLevel::Vt52,
        features: Features { vt52: true, ..NONE },
        da1: "\x1B/Z",
        da2: "",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Vt100,
        features: VT100_FEATURES,
        da1: "\x1B[?6c",
        da2: "\x1B[>0;95;0c",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Vt102,
        features: Features { printer: true, ..VT100_FEATURES },
        da1: "\x1B[?6c",
        da2: "\x1B[>0;95;0c",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Vt132,
        features: Features { printer: true, ..VT100_FEATURES },
        da1: "\x1B[?4;6c",
        da2: "\x1B[>0;95;0c",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Vt220,
        features: VT220_FEATURES,
        da1: "\x1B[?62;1;2;6;7;8;9;15c",
        da2: "\x1B[>1;10;0c",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Vt320,
        features: VT320_FEATURES,
        da1: "\x1B[?63;1;2;6;7;8;9;15;18;21c",
        da2: "\x1B[>24;10;0c",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Vt330,
        features: VT340_FEATURES,
        da1: "\x1B[?63;1;2;3;4;6;7;8;9;15;18;21c",
        da2: "\x1B[>18;10;0c",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Vt340,
        features: VT340_FEATURES,
        da1: "\x1B[?63;1;2;3;4;6;7;8;9;15;18;21;29c",
        da2: "\x1B[>19;10;0c",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Vt420,
        features: VT420_FEATURES,
        da1: "\x1B[?64;1;2;6;7;8;9;15;18;21;22;28;29c",
        da2: "\x1B[>41;10;0c",
        da3: DA3_UNIT,
    },
    LevelInfo {
        level: VtLevel::Vt510,
        features: VT520_FEATURES,
        da1: "\x1B[?65;1;2;6;7;8;9;15;18;21;22;28;29c",
        da2: "\x1B[>61;10;0c",
        da3: DA3_UNIT,
    },
    LevelInfo {
        level: VtLevel::Vt520,
        features: VT520_FEATURES,
        da1: "\x1B[?65;1;2;6;7;8;9;15;18;21;22;28;29c",
        da2: "\x1B[>52;10;0c",
        da3: DA3_UNIT,
    },
    LevelInfo {
        level: VtLevel::Vt525,
        features: Features { true_color: true, ..VT520_FEATURES },
        da1: "\x1B[?65;1;2;6;7;8;9;15;18;21;22;28;29c",
        da2: "\x1B[>65;10;0c",
        da3: DA3_UNIT,
    },
    LevelInfo {
        level: VtLevel::AnsiSys,
        features: Features { vt100: true, ..NONE },
        da1: "",
        da2: "",
        da3: "",
    },
    LevelInfo {
        level: VtLevel::Xterm,
        features: XTERM_FEATURES,
        da1: "\x1B[?41;1;2;3;4;6;7;8;9;15;18;21;22c",
        da2: "\x1B[>41;400;0c",
        da3: DA3_UNIT,
    },
];

/// Active conformance level and its features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conformance {
    pub level: VtLevel,
    pub features: Features,
}

impl Conformance {
    pub fn new(level: VtLevel) -> Self {
        Self {
            level,
            features: level.info().features,
        }
    }

    /// Select a level by numeric id; unknown ids fall back to the VT100 baseline
    pub fn from_id(id: u16) -> Self {
        match VtLevel::from_id(id) {
            Some(level) => Self::new(level),
            None => {
                log::warn!("Unknown VT level {}, falling back to VT100", id);
                Self::new(VtLevel::Vt100)
            }
        }
    }

    pub fn set_level(&mut self, level: VtLevel) {
        *self = Self::new(level);
    }

    /// Canned (DA1, DA2, DA3) replies
    pub fn device_attributes(&self) -> (&'static str, &'static str, &'static str) {
        let info = self.level.info();
        (info.da1, info.da2, info.da3)
    }
}

impl Default for Conformance {
    fn default() -> Self {
        Self::new(VtLevel::Xterm)
    }
}
