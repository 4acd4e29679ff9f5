/*!
The alphabet policy: how characters become the units that label edges.

A word graph stores edges labelled by *units*, not characters. The
[`Alphabet`] owns the bidirectional character-to-unit map and decides which
of the three unit representations the graph is currently using:

* **ASCII** - one byte per unit, code points `0..=127` only.
* **Compressed** - one byte per unit, with up to 89 non-ASCII code points
  remapped into printable single-byte slots.
* **Wide** - four bytes per unit, the full code point space.

The compressed representation is what keeps mostly-Latin dictionaries with a
sprinkling of accented or Cyrillic characters in single-byte edges. Its remap
slots are a fixed set of printable bytes; a slot may only be used while its
own character appears nowhere in the key set or in any stored string value.
*/

use std::collections::BTreeSet;

use crate::error::Error;

/// The unit representation a word graph is currently using.
///
/// The encoding is chosen automatically while keys are added and can be
/// re-evaluated with `Dawg::rebuild`. Queries never observe the encoding
/// directly; it only shows up in [`Stats`](crate::Stats) and in the container
/// header flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    /// One byte per unit, code points `0..=127`.
    Ascii,
    /// One byte per unit with remapped non-ASCII code points.
    Compressed,
    /// Four bytes per unit, full code point space.
    Wide,
}

impl Encoding {
    /// Returns true if units of this encoding fit in a single byte.
    pub fn is_narrow(&self) -> bool {
        !matches!(*self, Encoding::Wide)
    }
}

/// The encoding requested by a `Dawg::rebuild` call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum EncodingChoice {
    /// Pick the smallest encoding that fits the data.
    #[default]
    Auto,
    /// Force ASCII. Fails with `EncodingExceeded` if any unit is above 127.
    Ascii,
    /// Force the compressed single-byte encoding. Fails with
    /// `EncodingExceeded` if the data has more than 89 distinct units or not
    /// enough remap slots are free of collision.
    Compressed,
    /// Force four-byte units. Always fits.
    Wide,
}

/// The printable bytes eligible as remap slots, in assignment order.
///
/// A slot is only usable while its own character appears nowhere in the
/// current key set or in any stored string value.
pub(crate) const REMAP_SLOTS: &[u8; 89] =
    b"abcdefghijklmnopqrstuvwxyz\
      ABCDEFGHIJKLMNOPQRSTUVWXYZ\
      0123456789\
      !#$%&()*+,-.:;<=>?@[]^_{|}~";

/// The largest number of distinct code points the compressed encoding can
/// hold.
pub(crate) const COMPRESSED_LIMIT: usize = REMAP_SLOTS.len();

const NO_CHAR: u32 = u32::MAX;

/// The bidirectional character map of the compressed encoding.
///
/// Only non-identity entries are materialized in `forward`; ASCII characters
/// that are not shadowed by a slot assignment pass through unchanged. The
/// `reverse` table covers every unit byte.
#[derive(Clone, Debug)]
pub(crate) struct CharMap {
    /// Remapped code points, sorted by code point: `(code point, slot byte)`.
    forward: Vec<(char, u8)>,
    /// Unit byte to code point. Identity for unshadowed ASCII, `NO_CHAR` for
    /// bytes that decode to nothing.
    reverse: [u32; 256],
}

impl CharMap {
    /// Assign remap slots to every non-ASCII character in `key_chars`,
    /// skipping slots whose own character occurs in `used_chars`. Returns
    /// `None` when the slots run out.
    ///
    /// Assignment is deterministic: characters are taken in code point order
    /// and slots in `REMAP_SLOTS` order, so the same data always produces
    /// the same map.
    pub(crate) fn build(
        key_chars: &BTreeSet<char>,
        used_chars: &BTreeSet<char>,
    ) -> Option<CharMap> {
        let mut free = REMAP_SLOTS
            .iter()
            .copied()
            .filter(|&b| !used_chars.contains(&(b as char)));
        let mut forward = Vec::new();
        for &c in key_chars.iter().filter(|c| !c.is_ascii()) {
            let slot = free.next()?;
            forward.push((c, slot));
        }
        // key_chars iterates in code point order, so `forward` is sorted.
        let mut reverse = [NO_CHAR; 256];
        for b in 0u32..128 {
            reverse[b as usize] = b;
        }
        for &(c, b) in &forward {
            reverse[b as usize] = c as u32;
        }
        Some(CharMap { forward, reverse })
    }

    /// Reconstruct a map from explicit `(code point, slot byte)` entries, as
    /// stored in a container's character map table. Returns `None` if the
    /// entries are not a plausible map: duplicate slots, duplicate code
    /// points, ASCII code points remapped, or non-slot bytes used.
    pub(crate) fn from_entries(entries: &[(char, u8)]) -> Option<CharMap> {
        let mut forward: Vec<(char, u8)> = entries.to_vec();
        forward.sort_by_key(|e| e.0);
        let mut reverse = [NO_CHAR; 256];
        for b in 0u32..128 {
            reverse[b as usize] = b;
        }
        let mut seen_slots = BTreeSet::new();
        for window in forward.windows(2) {
            if window[0].0 == window[1].0 {
                return None;
            }
        }
        for &(c, b) in &forward {
            if c.is_ascii() || !REMAP_SLOTS.contains(&b) {
                return None;
            }
            if !seen_slots.insert(b) {
                return None;
            }
            reverse[b as usize] = c as u32;
        }
        Some(CharMap { forward, reverse })
    }

    /// The non-identity entries, sorted by code point.
    pub(crate) fn entries(&self) -> &[(char, u8)] {
        &self.forward
    }

    /// Encode one character into a unit byte, or report that the map cannot
    /// represent it.
    pub(crate) fn encode(&self, c: char) -> Option<u8> {
        if let Ok(i) = self.forward.binary_search_by_key(&c, |e| e.0) {
            return Some(self.forward[i].1);
        }
        if c.is_ascii() && self.reverse[c as usize] == c as u32 {
            return Some(c as u8);
        }
        None
    }

    /// Decode one unit byte back into its character.
    pub(crate) fn decode(&self, b: u8) -> Option<char> {
        char::from_u32(self.reverse[b as usize])
            .filter(|_| self.reverse[b as usize] != NO_CHAR)
    }

    /// Returns true if the ASCII character `c` has been shadowed by a slot
    /// assignment and no longer encodes as itself.
    fn is_shadowed(&self, c: char) -> bool {
        c.is_ascii() && self.reverse[c as usize] != c as u32
    }
}

/// The alphabet of a live word graph: current encoding, distinct-character
/// bookkeeping and (in compressed mode) the character map.
#[derive(Clone, Debug)]
pub(crate) struct Alphabet {
    encoding: Encoding,
    /// Distinct code points across all keys.
    key_chars: BTreeSet<char>,
    /// Distinct code points across all keys and all value table strings.
    /// Remap slots must avoid everything in here.
    used_chars: BTreeSet<char>,
    map: Option<CharMap>,
}

impl Alphabet {
    /// A fresh alphabet for an empty graph. Starts in ASCII.
    pub(crate) fn new() -> Alphabet {
        Alphabet {
            encoding: Encoding::Ascii,
            key_chars: BTreeSet::new(),
            used_chars: BTreeSet::new(),
            map: None,
        }
    }

    pub(crate) fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The number of non-identity character map entries, 0 outside of
    /// compressed mode.
    pub(crate) fn mapped_units(&self) -> usize {
        self.map.as_ref().map_or(0, |m| m.entries().len())
    }

    /// The number of distinct code points across all keys.
    pub(crate) fn distinct_units(&self) -> usize {
        self.key_chars.len()
    }

    pub(crate) fn char_map(&self) -> Option<&CharMap> {
        self.map.as_ref()
    }

    /// Encode one character into a unit, or report a miss.
    pub(crate) fn encode_unit(&self, c: char) -> Option<u32> {
        match self.encoding {
            Encoding::Ascii => {
                if c.is_ascii() {
                    Some(c as u32)
                } else {
                    None
                }
            }
            Encoding::Compressed => {
                // The map is always present in compressed mode.
                self.map.as_ref()?.encode(c).map(u32::from)
            }
            Encoding::Wide => Some(c as u32),
        }
    }

    /// Decode one unit back into its character.
    pub(crate) fn decode_unit(&self, unit: u32) -> Option<char> {
        match self.encoding {
            Encoding::Ascii | Encoding::Wide => char::from_u32(unit),
            Encoding::Compressed => {
                let b = u8::try_from(unit).ok()?;
                self.map.as_ref()?.decode(b)
            }
        }
    }

    /// Encode a whole key, or report a miss on the first unrepresentable
    /// character.
    pub(crate) fn encode_key(&self, key: &str) -> Option<Vec<u32>> {
        key.chars().map(|c| self.encode_unit(c)).collect()
    }

    /// Returns true if this alphabet can absorb the given key and value
    /// characters without an encoding transition.
    ///
    /// Key characters must be representable as units. Value characters never
    /// become units (string values are stored in the value table), but in
    /// the narrow encodings they still constrain the alphabet: ASCII mode
    /// stores value bytes narrowly, and a compressed-mode slot must not
    /// collide with any character of the value set.
    pub(crate) fn admits(
        &self,
        key: &str,
        value_chars: Option<&str>,
    ) -> bool {
        let value_ok = match self.encoding {
            Encoding::Ascii => value_chars.map_or(true, str::is_ascii),
            Encoding::Compressed => {
                let map = match self.map.as_ref() {
                    None => return false,
                    Some(map) => map,
                };
                value_chars
                    .map_or(true, |s| !s.chars().any(|c| map.is_shadowed(c)))
            }
            Encoding::Wide => true,
        };
        value_ok && key.chars().all(|c| self.encode_unit(c).is_some())
    }

    /// Record the characters of an accepted insertion.
    pub(crate) fn record(&mut self, key: &str, value_chars: Option<&str>) {
        self.key_chars.extend(key.chars());
        self.used_chars.extend(key.chars());
        if let Some(s) = value_chars {
            self.used_chars.extend(s.chars());
        }
    }

    /// The encoding an insertion the current mode cannot hold should
    /// upgrade to: the automatic decision over the union of the current
    /// data and the incoming key/value characters.
    pub(crate) fn choose_with(
        &self,
        key: &str,
        value_chars: Option<&str>,
    ) -> Encoding {
        let mut key_chars = self.key_chars.clone();
        key_chars.extend(key.chars());
        let mut used_chars = self.used_chars.clone();
        used_chars.extend(key.chars());
        if let Some(s) = value_chars {
            used_chars.extend(s.chars());
        }
        Alphabet::choose(&key_chars, &used_chars)
    }

    /// The automatic mode decision over a full data set: the smallest
    /// encoding that fits.
    pub(crate) fn choose(
        key_chars: &BTreeSet<char>,
        used_chars: &BTreeSet<char>,
    ) -> Encoding {
        let distinct = key_chars.len();
        let all_ascii = key_chars.iter().all(char::is_ascii)
            && used_chars.iter().all(char::is_ascii);
        if all_ascii && distinct <= 127 {
            return Encoding::Ascii;
        }
        if distinct <= COMPRESSED_LIMIT
            && CharMap::build(key_chars, used_chars).is_some()
        {
            return Encoding::Compressed;
        }
        Encoding::Wide
    }

    /// Build an alphabet over a full data set in the requested encoding.
    ///
    /// This is the rebuild path: the distinct-character sets are collected
    /// from scratch by the caller and a forced encoding that cannot hold
    /// them fails with `EncodingExceeded`.
    pub(crate) fn for_data(
        choice: EncodingChoice,
        key_chars: BTreeSet<char>,
        used_chars: BTreeSet<char>,
    ) -> Result<Alphabet, Error> {
        let encoding = match choice {
            EncodingChoice::Auto => {
                Alphabet::choose(&key_chars, &used_chars)
            }
            EncodingChoice::Ascii => {
                if !used_chars.iter().all(char::is_ascii) {
                    return Err(Error::encoding_exceeded(
                        key_chars.len(),
                        "data contains code points above 127, \
                         which the ASCII encoding cannot hold",
                    ));
                }
                Encoding::Ascii
            }
            EncodingChoice::Compressed => Encoding::Compressed,
            EncodingChoice::Wide => Encoding::Wide,
        };
        let map = match encoding {
            Encoding::Compressed => {
                if key_chars.len() > COMPRESSED_LIMIT {
                    return Err(Error::encoding_exceeded(
                        key_chars.len(),
                        format!(
                            "more than {} distinct units",
                            COMPRESSED_LIMIT,
                        ),
                    ));
                }
                match CharMap::build(&key_chars, &used_chars) {
                    Some(map) => Some(map),
                    None => {
                        return Err(Error::encoding_exceeded(
                            key_chars.len(),
                            "not enough remap slots free of collision \
                             with the key and value set",
                        ));
                    }
                }
            }
            Encoding::Ascii | Encoding::Wide => None,
        };
        Ok(Alphabet { encoding, key_chars, used_chars, map })
    }

    /// Like [`Alphabet::for_data`] with a pre-assigned character map, used
    /// when loading a container or text file that recorded its map. Falls
    /// back to fresh assignment if the recorded map does not cover the data.
    pub(crate) fn for_data_with_map(
        key_chars: BTreeSet<char>,
        used_chars: BTreeSet<char>,
        entries: &[(char, u8)],
    ) -> Result<Alphabet, Error> {
        if let Some(map) = CharMap::from_entries(entries) {
            let covered = key_chars
                .iter()
                .all(|&c| map.encode(c).is_some());
            let collision = used_chars
                .iter()
                .any(|&c| map.is_shadowed(c));
            if covered && !collision {
                return Ok(Alphabet {
                    encoding: Encoding::Compressed,
                    key_chars,
                    used_chars,
                    map: Some(map),
                });
            }
        }
        Alphabet::for_data(EncodingChoice::Compressed, key_chars, used_chars)
    }
}
