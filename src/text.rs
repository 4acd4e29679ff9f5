/*!
The portable JSON interchange format.

The binary container is the compatibility-critical persistence path; this
module provides the human-readable sibling for interchange. A document
records the encoding, the character map of a compressed graph and the
`(key, value)` list; values keep their JSON-native types, so the
integer/string distinction survives the text path exactly (unlike the
binary value table, which infers it from digits).

`Dawg::load` sniffs the first four bytes of a file: the container magic
selects the binary path, anything else lands here.
*/

use serde::{Deserialize, Serialize};

use crate::alphabet::{Encoding, EncodingChoice};
use crate::dawg::Dawg;
use crate::error::Error;
use crate::value::Value;

const FORMAT: &str = "dawg-text";
const TEXT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TextDawg {
    format: String,
    version: u32,
    encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    char_map: Option<Vec<CharMapEntry>>,
    entries: Vec<TextEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CharMapEntry {
    code_point: u32,
    mapped_byte: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextEntry {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

fn encoding_name(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Ascii => "ascii",
        Encoding::Compressed => "compressed",
        Encoding::Wide => "wide",
    }
}

pub(crate) fn to_json_string(dawg: &Dawg) -> Result<String, Error> {
    let char_map = dawg.alphabet.char_map().map(|map| {
        map.entries()
            .iter()
            .map(|&(c, b)| CharMapEntry {
                code_point: c as u32,
                mapped_byte: b,
            })
            .collect()
    });
    let doc = TextDawg {
        format: FORMAT.to_string(),
        version: TEXT_VERSION,
        encoding: encoding_name(dawg.encoding()).to_string(),
        char_map,
        entries: dawg
            .pairs()
            .into_iter()
            .map(|(key, value)| TextEntry { key, value })
            .collect(),
    };
    serde_json::to_string_pretty(&doc).map_err(|err| {
        Error::io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err,
        ))
    })
}

pub(crate) fn from_json_bytes(bytes: &[u8]) -> Result<Dawg, Error> {
    let doc: TextDawg =
        serde_json::from_slice(bytes).map_err(|err| {
            Error::bad_container(format!("text document: {}", err))
        })?;
    if doc.format != FORMAT {
        return Err(Error::bad_container(format!(
            "unknown text format {:?}",
            doc.format,
        )));
    }
    if doc.version != TEXT_VERSION {
        return Err(Error::bad_container(format!(
            "unknown text format version {}",
            doc.version,
        )));
    }
    let choice = match doc.encoding.as_str() {
        "ascii" => EncodingChoice::Ascii,
        "compressed" => EncodingChoice::Compressed,
        "wide" => EncodingChoice::Wide,
        other => {
            return Err(Error::bad_container(format!(
                "unknown encoding {:?}",
                other,
            )));
        }
    };
    let map_entries = match doc.char_map {
        None => None,
        Some(entries) => {
            let mut decoded = Vec::with_capacity(entries.len());
            for entry in entries {
                let c = char::from_u32(entry.code_point).ok_or_else(|| {
                    Error::bad_container(format!(
                        "character map entry {:#x} is not a code point",
                        entry.code_point,
                    ))
                })?;
                decoded.push((c, entry.mapped_byte));
            }
            Some(decoded)
        }
    };
    let pairs = doc
        .entries
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect();
    Dawg::from_pairs(pairs, choice, map_entries.as_deref())
}
