//! Device configuration (`ResTable_config`) selecting among the variants
//! of a resource.

use serde::Serialize;
use std::fmt;

/// Size of the configuration fields this codec knows about, size field
/// included. Anything declared beyond is kept in [`Config::extra`].
pub const KNOWN_CONFIG_SIZE: usize = 52;
/// Configuration size written by current build tools.
pub const DEFAULT_CONFIG_SIZE: u32 = 64;

const MNC_ZERO: u16 = 0xffff;

const MASK_KEYSHIDDEN: u8 = 0x03;
const MASK_NAVHIDDEN: u8 = 0x0c;
const MASK_GRAMMATICAL_GENDER: u8 = 0x03;
const MASK_SCREENSIZE: u8 = 0x0f;
const MASK_SCREENLONG: u8 = 0x30;
const MASK_LAYOUTDIR: u8 = 0xc0;
const MASK_UI_MODE_TYPE: u8 = 0x0f;
const MASK_UI_MODE_NIGHT: u8 = 0x30;
const MASK_SCREENROUND: u8 = 0x03;
const MASK_COLOR_MODE_WIDECG: u8 = 0x03;
const MASK_COLOR_MODE_HDR: u8 = 0x0c;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Config {
    /// Declared size of the structure, size field included.
    pub size: u32,
    pub mcc: u16,
    pub mnc: u16,
    /// Two ASCII letters, or a packed 3-letter code when the high bit of the
    /// first byte is set.
    pub language: [u8; 2],
    pub region: [u8; 2],
    pub orientation: u8,
    pub touchscreen: u8,
    pub density: u16,
    pub keyboard: u8,
    pub navigation: u8,
    pub input_flags: u8,
    pub grammatical_inflection: u8,
    pub screen_width: u16,
    pub screen_height: u16,
    pub sdk_version: u16,
    pub minor_version: u16,
    pub screen_layout: u8,
    pub ui_mode: u8,
    pub smallest_screen_width_dp: u16,
    pub screen_width_dp: u16,
    pub screen_height_dp: u16,
    pub locale_script: [u8; 4],
    pub locale_variant: [u8; 8],
    pub screen_layout2: u8,
    pub color_mode: u8,
    pub screen_config_pad2: u16,
    /// Declared bytes beyond the known fields (locale numbering system and
    /// newer additions).
    pub extra: Vec<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size: DEFAULT_CONFIG_SIZE,
            mcc: 0,
            mnc: 0,
            language: [0; 2],
            region: [0; 2],
            orientation: 0,
            touchscreen: 0,
            density: 0,
            keyboard: 0,
            navigation: 0,
            input_flags: 0,
            grammatical_inflection: 0,
            screen_width: 0,
            screen_height: 0,
            sdk_version: 0,
            minor_version: 0,
            screen_layout: 0,
            ui_mode: 0,
            smallest_screen_width_dp: 0,
            screen_width_dp: 0,
            screen_height_dp: 0,
            locale_script: [0; 4],
            locale_variant: [0; 8],
            screen_layout2: 0,
            color_mode: 0,
            screen_config_pad2: 0,
            extra: vec![0; DEFAULT_CONFIG_SIZE as usize - KNOWN_CONFIG_SIZE],
        }
    }
}

impl Config {
    /// Known fields, serialized in their on-disk order (size field excluded).
    #[must_use]
    pub(crate) fn known_fields(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(KNOWN_CONFIG_SIZE - 4);
        out.extend_from_slice(&self.mcc.to_le_bytes());
        out.extend_from_slice(&self.mnc.to_le_bytes());
        out.extend_from_slice(&self.language);
        out.extend_from_slice(&self.region);
        out.push(self.orientation);
        out.push(self.touchscreen);
        out.extend_from_slice(&self.density.to_le_bytes());
        out.push(self.keyboard);
        out.push(self.navigation);
        out.push(self.input_flags);
        out.push(self.grammatical_inflection);
        out.extend_from_slice(&self.screen_width.to_le_bytes());
        out.extend_from_slice(&self.screen_height.to_le_bytes());
        out.extend_from_slice(&self.sdk_version.to_le_bytes());
        out.extend_from_slice(&self.minor_version.to_le_bytes());
        out.push(self.screen_layout);
        out.push(self.ui_mode);
        out.extend_from_slice(&self.smallest_screen_width_dp.to_le_bytes());
        out.extend_from_slice(&self.screen_width_dp.to_le_bytes());
        out.extend_from_slice(&self.screen_height_dp.to_le_bytes());
        out.extend_from_slice(&self.locale_script);
        out.extend_from_slice(&self.locale_variant);
        out.push(self.screen_layout2);
        out.push(self.color_mode);
        out.extend_from_slice(&self.screen_config_pad2.to_le_bytes());
        out
    }

    /// Whether both configurations select the same devices, whatever their
    /// declared sizes.
    #[must_use]
    pub fn same_qualifiers(&self, other: &Self) -> bool {
        let trimmed = |extra: &[u8]| {
            let end = extra.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
            extra[..end].to_vec()
        };
        self.known_fields() == other.known_fields() && trimmed(&self.extra) == trimmed(&other.extra)
    }

    /// The configuration that applies when no other one matches.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.same_qualifiers(&Self::default())
    }

    #[must_use]
    pub fn language(&self) -> String {
        unpack_locale_code(self.language, b'a')
    }

    #[must_use]
    pub fn region(&self) -> String {
        unpack_locale_code(self.region, b'0')
    }

    /// Sets the locale from 2 or 3-letter codes, an empty string meaning
    /// "any".
    pub fn set_locale(&mut self, language: &str, region: &str) {
        self.language = pack_locale_code(language, b'a');
        self.region = pack_locale_code(region, b'0');
    }

    /// Qualifier suffix of resource directories, such as `-fr-rCA-hdpi-v21`,
    /// empty for the default configuration.
    #[must_use]
    pub fn qualifiers(&self) -> String {
        let mut q = Vec::new();
        if self.mcc != 0 {
            q.push(format!("mcc{:03}", self.mcc));
        }
        if self.mnc != 0 {
            let mnc = if self.mnc == MNC_ZERO { 0 } else { self.mnc };
            q.push(format!("mnc{mnc:02}"));
        }
        self.push_locale(&mut q);
        push_enum(
            &mut q,
            self.grammatical_inflection & MASK_GRAMMATICAL_GENDER,
            &[(1, "neuter"), (2, "feminine"), (3, "masculine")],
            "grammaticalGender",
        );
        push_enum(
            &mut q,
            self.screen_layout & MASK_LAYOUTDIR,
            &[(0x40, "ldltr"), (0x80, "ldrtl")],
            "layoutDir",
        );
        if self.smallest_screen_width_dp != 0 {
            q.push(format!("sw{}dp", self.smallest_screen_width_dp));
        }
        if self.screen_width_dp != 0 {
            q.push(format!("w{}dp", self.screen_width_dp));
        }
        if self.screen_height_dp != 0 {
            q.push(format!("h{}dp", self.screen_height_dp));
        }
        push_enum(
            &mut q,
            self.screen_layout & MASK_SCREENSIZE,
            &[(1, "small"), (2, "normal"), (3, "large"), (4, "xlarge")],
            "screenSize",
        );
        push_enum(
            &mut q,
            self.screen_layout & MASK_SCREENLONG,
            &[(0x10, "notlong"), (0x20, "long")],
            "screenLong",
        );
        push_enum(
            &mut q,
            self.screen_layout2 & MASK_SCREENROUND,
            &[(1, "notround"), (2, "round")],
            "screenRound",
        );
        push_enum(
            &mut q,
            self.color_mode & MASK_COLOR_MODE_WIDECG,
            &[(1, "nowidecg"), (2, "widecg")],
            "colorModeWideCG",
        );
        push_enum(
            &mut q,
            self.color_mode & MASK_COLOR_MODE_HDR,
            &[(0x04, "lowdr"), (0x08, "highdr")],
            "colorModeHdr",
        );
        push_enum(
            &mut q,
            self.orientation,
            &[(1, "port"), (2, "land"), (3, "square")],
            "orientation",
        );
        push_enum(
            &mut q,
            self.ui_mode & MASK_UI_MODE_TYPE,
            &[
                (1, ""),
                (2, "desk"),
                (3, "car"),
                (4, "television"),
                (5, "appliance"),
                (6, "watch"),
                (7, "vrheadset"),
            ],
            "uiModeType",
        );
        push_enum(
            &mut q,
            self.ui_mode & MASK_UI_MODE_NIGHT,
            &[(0x10, "notnight"), (0x20, "night")],
            "uiModeNight",
        );
        match self.density {
            0 => (),
            120 => q.push("ldpi".to_string()),
            160 => q.push("mdpi".to_string()),
            213 => q.push("tvdpi".to_string()),
            240 => q.push("hdpi".to_string()),
            320 => q.push("xhdpi".to_string()),
            480 => q.push("xxhdpi".to_string()),
            640 => q.push("xxxhdpi".to_string()),
            0xfffe => q.push("anydpi".to_string()),
            0xffff => q.push("nodpi".to_string()),
            d => q.push(format!("{d}dpi")),
        }
        push_enum(
            &mut q,
            self.touchscreen,
            &[(1, "notouch"), (2, "stylus"), (3, "finger")],
            "touchscreen",
        );
        push_enum(
            &mut q,
            self.input_flags & MASK_KEYSHIDDEN,
            &[(1, "keysexposed"), (2, "keyshidden"), (3, "keyssoft")],
            "keysHidden",
        );
        push_enum(
            &mut q,
            self.keyboard,
            &[(1, "nokeys"), (2, "qwerty"), (3, "12key")],
            "keyboard",
        );
        push_enum(
            &mut q,
            self.input_flags & MASK_NAVHIDDEN,
            &[(0x04, "navexposed"), (0x08, "navhidden")],
            "navHidden",
        );
        push_enum(
            &mut q,
            self.navigation,
            &[(1, "nonav"), (2, "dpad"), (3, "trackball"), (4, "wheel")],
            "navigation",
        );
        if self.screen_width != 0 && self.screen_height != 0 {
            q.push(format!("{}x{}", self.screen_width, self.screen_height));
        }
        if self.sdk_version != 0 {
            q.push(format!("v{}", self.sdk_version));
        }
        if self.extra.iter().any(|b| *b != 0) {
            q.push(format!("unk{}", rw_utils::hexlify::hexlify(&self.extra)));
        }
        q.iter()
            .filter(|s| !s.is_empty())
            .fold(String::new(), |acc, s| acc + "-" + s)
    }

    fn push_locale(&self, q: &mut Vec<String>) {
        let language = self.language();
        if language.is_empty() {
            return;
        }
        let region = self.region();
        let script = ascii_field(&self.locale_script);
        let variant = ascii_field(&self.locale_variant);
        if script.is_empty() && region.len() <= 2 && variant.is_empty() {
            q.push(language);
            if !region.is_empty() {
                q.push(format!("r{region}"));
            }
        } else {
            let mut bcp47 = format!("b+{language}");
            for part in [script, region, variant] {
                if !part.is_empty() {
                    bcp47.push('+');
                    bcp47.push_str(&part);
                }
            }
            q.push(bcp47);
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let qualifiers = self.qualifiers();
        match qualifiers.strip_prefix('-') {
            Some(q) => write!(f, "{q}"),
            None => write!(f, "default"),
        }
    }
}

fn push_enum(q: &mut Vec<String>, value: u8, names: &[(u8, &str)], field: &str) {
    if value == 0 {
        return;
    }
    match names.iter().find(|(v, _)| *v == value) {
        Some((_, name)) => q.push((*name).to_string()),
        None => {
            log::warn!("unknown configuration {field} value {value:#x}");
            q.push(format!("{field}={value}"));
        }
    }
}

fn ascii_field(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|b| **b != 0)
        .map(|b| char::from(*b))
        .collect()
}

fn unpack_locale_code(raw: [u8; 2], base: u8) -> String {
    if raw[0] == 0 {
        return String::new();
    }
    if raw[0] & 0x80 == 0 {
        return ascii_field(&raw);
    }
    let chars = [
        base.wrapping_add(raw[1] & 0x1f),
        base.wrapping_add(((raw[1] & 0xe0) >> 5) + ((raw[0] & 0x03) << 3)),
        base.wrapping_add((raw[0] & 0x7c) >> 2),
    ];
    chars.iter().map(|b| char::from(*b)).collect()
}

fn pack_locale_code(code: &str, base: u8) -> [u8; 2] {
    let bytes = code.as_bytes();
    match bytes.len() {
        2 => [bytes[0], bytes[1]],
        3 => {
            let first = bytes[0].wrapping_sub(base) & 0x1f;
            let second = bytes[1].wrapping_sub(base) & 0x1f;
            let third = bytes[2].wrapping_sub(base) & 0x1f;
            [
                0x80 | (third << 2) | (second >> 3),
                ((second & 0x07) << 5) | first,
            ]
        }
        _ => [0; 2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.is_default());
        assert_eq!(config.qualifiers(), "");
        assert_eq!(config.to_string(), "default");
        assert_eq!(config.known_fields().len(), KNOWN_CONFIG_SIZE - 4);
    }

    #[test]
    fn locale_and_density() {
        let mut config = Config::default();
        config.set_locale("fr", "CA");
        config.density = 240;
        config.sdk_version = 21;
        assert_eq!(config.qualifiers(), "-fr-rCA-hdpi-v21");
        assert_eq!(config.to_string(), "fr-rCA-hdpi-v21");
        assert!(!config.is_default());
    }

    #[test]
    fn packed_three_letters_codes() {
        let mut config = Config::default();
        config.set_locale("fil", "");
        assert!(config.language[0] & 0x80 != 0);
        assert_eq!(config.language(), "fil");
        config.set_locale("es", "419");
        assert_eq!(config.region(), "419");
        assert_eq!(config.qualifiers(), "-b+es+419");
    }

    #[test]
    fn same_qualifiers_ignores_declared_size() {
        let mut small = Config {
            size: 48,
            extra: Vec::new(),
            ..Config::default()
        };
        assert!(small.same_qualifiers(&Config::default()));
        small.orientation = 2;
        assert!(!small.same_qualifiers(&Config::default()));
        assert_eq!(small.qualifiers(), "-land");
    }

    #[test]
    fn night_and_layout_direction() {
        let config = Config {
            ui_mode: 0x20,
            screen_layout: 0x80,
            smallest_screen_width_dp: 600,
            ..Config::default()
        };
        assert_eq!(config.qualifiers(), "-ldrtl-sw600dp-night");
    }
}
