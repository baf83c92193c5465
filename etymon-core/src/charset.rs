//! Enumeration of candidate characters for the supported two-byte encodings.
//!
//! Both schemes are enumerated by walking byte-pair tiers in a fixed order and
//! keeping the pairs that decode to exactly one character. The enumeration is
//! a plain lazy iterator: cloning it restarts nothing and hides no state beyond
//! the current position in the byte ranges.

use std::{fmt, str::FromStr};

use encoding_rs::GBK;

use crate::error::CharsetError;

/// Inclusive bounds of a single byte range.
type ByteRange = (u8, u8);

/// A block of two-byte code points: every high byte paired with every low
/// byte drawn from the listed ranges.
#[derive(Debug)]
struct ByteTier {
    high: ByteRange,
    low: &'static [ByteRange],
}

impl ByteTier {
    fn pairs(&'static self) -> impl Iterator<Item = [u8; 2]> + Clone + Send {
        let (first, last) = self.high;
        (first..=last).flat_map(move |high| {
            self.low
                .iter()
                .flat_map(|&(lo, hi)| lo..=hi)
                .map(move |low| [high, low])
        })
    }
}

/// GB2312 hanzi area (levels 1 and 2), also GBK/2.
static LEVEL_2: ByteTier = ByteTier {
    high: (0xB0, 0xF7),
    low: &[(0xA1, 0xFE)],
};

/// GBK/3: high bytes below the GB2312 area; 0x7F is never a trail byte.
static LEVEL_3: ByteTier = ByteTier {
    high: (0x81, 0xA0),
    low: &[(0x40, 0x7E), (0x80, 0xFE)],
};

/// GBK/4: the lower half of the trail-byte space beside the GB2312 area.
static LEVEL_4: ByteTier = ByteTier {
    high: (0xAA, 0xFE),
    low: &[(0x40, 0x7E), (0x80, 0xA0)],
};

static GB2312_TIERS: [&ByteTier; 1] = [&LEVEL_2];
static GBK_TIERS: [&ByteTier; 3] = [&LEVEL_2, &LEVEL_3, &LEVEL_4];

/// Positions inside the GB2312 hanzi block that GB2312 leaves unassigned.
const GB2312_UNASSIGNED: std::ops::RangeInclusive<u16> = 0xD7FA..=0xD7FE;

/// Supported character-set schemes.
///
/// # Examples
/// ```
/// use etymon_core::CharacterSet;
///
/// let charset: CharacterSet = "gb2312".parse().expect("gb2312 is supported");
/// assert_eq!(charset.namespace(), "GB2312");
/// assert_eq!(charset.characters().next(), Some('啊'));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharacterSet {
    /// The smaller GB2312 hanzi set.
    Gb2312,
    /// The two-byte GBK superset.
    Gbk,
}

impl CharacterSet {
    /// Every supported scheme, smaller set first.
    pub const ALL: [Self; 2] = [Self::Gb2312, Self::Gbk];

    /// Upper-case namespace name used for persisted partitions.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Gb2312 => "GB2312",
            Self::Gbk => "GBK",
        }
    }

    /// Number of bytes one glyph occupies in this scheme's encoding.
    #[must_use]
    pub const fn glyph_width(self) -> usize {
        2
    }

    /// Lazily enumerates the characters of this scheme in byte order.
    ///
    /// Byte pairs that do not decode under the scheme are skipped.
    pub fn characters(self) -> impl Iterator<Item = char> + Clone + Send + 'static {
        self.tiers()
            .iter()
            .flat_map(|tier| tier.pairs())
            .filter_map(move |pair| self.decode_pair(pair))
    }

    /// Encodes `character` with this scheme's two-byte codec.
    ///
    /// # Errors
    /// Returns [`CharsetError::Unencodable`] when the character has no
    /// encoding inside the scheme's enumerated ranges.
    pub fn encode_char(self, character: char) -> Result<[u8; 2], CharsetError> {
        let mut buffer = [0_u8; 4];
        let (bytes, _, had_errors) = GBK.encode(character.encode_utf8(&mut buffer));
        let unencodable = CharsetError::Unencodable {
            charset: self,
            character,
        };
        if had_errors {
            return Err(unencodable);
        }
        let pair = <[u8; 2]>::try_from(&*bytes).map_err(|_| unencodable.clone())?;
        // Round-trip through the scheme filter so GBK-only glyphs are
        // rejected for GB2312.
        match self.decode_pair(pair) {
            Some(decoded) if decoded == character => Ok(pair),
            _ => Err(unencodable),
        }
    }

    /// Decodes a two-byte sequence with this scheme's codec.
    ///
    /// # Errors
    /// Returns [`CharsetError::Undecodable`] when `bytes` is not exactly one
    /// valid glyph of the scheme.
    pub fn decode_char(self, bytes: &[u8]) -> Result<char, CharsetError> {
        <[u8; 2]>::try_from(bytes)
            .ok()
            .and_then(|pair| self.decode_pair(pair))
            .ok_or_else(|| CharsetError::Undecodable {
                charset: self,
                bytes: bytes.to_vec(),
            })
    }

    fn tiers(self) -> &'static [&'static ByteTier] {
        match self {
            Self::Gb2312 => &GB2312_TIERS,
            Self::Gbk => &GBK_TIERS,
        }
    }

    fn decode_pair(self, pair: [u8; 2]) -> Option<char> {
        let [high, low] = pair;
        if !self.in_ranges(high, low) {
            return None;
        }
        let code = (u16::from(high) << 8) | u16::from(low);
        if self == Self::Gb2312 && GB2312_UNASSIGNED.contains(&code) {
            return None;
        }
        let text = GBK.decode_without_bom_handling_and_without_replacement(&pair)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(character), None) if !is_private_use(character) => Some(character),
            _ => None,
        }
    }

    fn in_ranges(self, high: u8, low: u8) -> bool {
        self.tiers().iter().any(|tier| {
            let (first, last) = tier.high;
            (first..=last).contains(&high)
                && tier.low.iter().any(|&(lo, hi)| (lo..=hi).contains(&low))
        })
    }
}

fn is_private_use(character: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&character)
}

impl fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

impl FromStr for CharacterSet {
    type Err = CharsetError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gb2312" => Ok(Self::Gb2312),
            "gbk" => Ok(Self::Gbk),
            _ => Err(CharsetError::Unsupported {
                provided: raw.to_owned(),
            }),
        }
    }
}
