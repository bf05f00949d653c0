//! Text decoding
//!
//! Documents arrive as bytes with up to three encoding hints: a Unicode
//! byte-order mark, an XML declaration and the HTTP Content-Type header.
//! The hints are tried in order, strictly (a decode only counts if the
//! whole input is valid), with UTF-8 as the final fallback, and any
//! disagreement between the hints and the encoding that actually worked
//! is reported.
//!
//! The WHATWG label registry that [`encoding_rs`] implements deliberately
//! aliases some labels for browser compatibility, most notably mapping
//! `ascii` to windows-1252. That leniency would hide exactly the
//! mislabeling this tool exists to find, so the ASCII and Unicode
//! families are decoded by hand and only the remaining labels are passed
//! to [`encoding_rs`].

use encoding_rs::Encoding;

use crate::report::Report;
use crate::DecodeError;

/// A decoder for one character encoding, looked up by label.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Codec {
    /// Strict 7-bit ASCII. Any byte with the high bit set is an error.
    Ascii,
    Utf8,
    /// UTF-16, honoring a leading BOM, little endian without one.
    Utf16,
    /// UTF-32, honoring a leading BOM, little endian without one.
    Utf32,
    External(&'static Encoding),
}

impl Codec {
    /// Looks up a codec by its (case-insensitive) label, or `None` if the
    /// label is unknown.
    fn lookup(label: &str) -> Option<Codec> {
        match label.trim().to_lowercase().as_str() {
            "ascii" | "us-ascii" => Some(Codec::Ascii),
            "utf-8" | "utf8" => Some(Codec::Utf8),
            "utf-16" | "utf16" => Some(Codec::Utf16),
            "utf-32" | "utf32" => Some(Codec::Utf32),
            label => Encoding::for_label(label.as_bytes()).map(Codec::External),
        }
    }

    /// The preferred standardized name for this codec, per the IANA
    /// character set registry.
    fn canonical_name(self) -> String {
        match self {
            Codec::Ascii => "us-ascii".to_string(),
            Codec::Utf8 => "utf-8".to_string(),
            Codec::Utf16 => "utf-16".to_string(),
            Codec::Utf32 => "utf-32".to_string(),
            Codec::External(encoding) => encoding.name().to_lowercase(),
        }
    }

    /// Decodes the entire input, or `None` if any of it is invalid.
    fn decode(self, data: &[u8]) -> Option<String> {
        match self {
            Codec::Ascii => {
                if data.is_ascii() {
                    Some(String::from_utf8_lossy(data).into_owned())
                } else {
                    None
                }
            }
            Codec::Utf8 => std::str::from_utf8(data).ok().map(str::to_string),
            Codec::Utf16 => decode_utf16(data),
            Codec::Utf32 => decode_utf32(data),
            Codec::External(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(data)
                .map(|text| text.into_owned()),
        }
    }
}

fn decode_utf16(data: &[u8]) -> Option<String> {
    let (be, data) = match data {
        [0xFE, 0xFF, rest @ ..] => (true, rest),
        [0xFF, 0xFE, rest @ ..] => (false, rest),
        _ => (false, data),
    };
    if data.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            if be {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

fn decode_utf32(data: &[u8]) -> Option<String> {
    let (be, data) = match data {
        [0x00, 0x00, 0xFE, 0xFF, rest @ ..] => (true, rest),
        [0xFF, 0xFE, 0x00, 0x00, rest @ ..] => (false, rest),
        _ => (false, data),
    };
    if data.len() % 4 != 0 {
        return None;
    }
    data.chunks_exact(4)
        .map(|quad| {
            let quad = [quad[0], quad[1], quad[2], quad[3]];
            let value = if be {
                u32::from_be_bytes(quad)
            } else {
                u32::from_le_bytes(quad)
            };
            char::from_u32(value)
        })
        .collect()
}

/// Looks for a byte-order mark at the start of the data and returns the
/// matching encoding name, if any.
///
/// The UTF-32 little endian BOM starts with the UTF-16 little endian BOM,
/// so the longer marks are checked first.
pub fn encoding_from_bom(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) || data.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        Some("utf-32")
    } else if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some("utf-8")
    } else if data.starts_with(&[0xFE, 0xFF]) || data.starts_with(&[0xFF, 0xFE]) {
        Some("utf-16")
    } else {
        None
    }
}

/// Attempts to decode text using the given encodings in order.
///
/// Returns the decoded string and the canonical name of the encoding that
/// was used, which can differ from the label that selected it. Unknown
/// labels are skipped; labels naming the same codec are tried only once.
pub fn try_decode<'a>(
    data: &[u8],
    encodings: impl IntoIterator<Item = &'a str>,
) -> Result<(String, String), DecodeError> {
    let mut codecs: Vec<(String, Codec)> = Vec::new();
    for label in encodings {
        if let Some(codec) = Codec::lookup(label) {
            let name = codec.canonical_name();
            if !codecs.iter().any(|(existing, _)| *existing == name) {
                codecs.push((name, codec));
            }
        }
    }

    for (name, codec) in codecs {
        if let Some(text) = codec.decode(data) {
            return Ok((text, name));
        }
    }
    Err(DecodeError::NoViableEncoding)
}

/// Attempts to decode text using several encoding options in order.
///
/// Each option pairs an encoding label with a description of where the
/// suggestion originated, such as `"HTTP header"`; options with no label
/// are skipped. UTF-8 is always tried last, since it is the most common
/// encoding and a superset of ASCII. Unknown labels and labels that
/// disagree with the encoding that actually worked are reported.
pub fn decode_and_report(
    data: &[u8],
    encoding_options: &[(Option<&str>, &str)],
    report: &mut Report,
) -> Result<(String, String), DecodeError> {
    let options: Vec<(&str, &str)> = encoding_options
        .iter()
        .filter_map(|(encoding, source)| encoding.map(|encoding| (encoding, *source)))
        .collect();

    let mut encodings: Vec<&str> = options.iter().map(|(encoding, _)| *encoding).collect();
    encodings.push("utf-8");
    let (text, used_encoding) = try_decode(data, encodings)?;

    for (encoding, source) in options {
        match Codec::lookup(encoding) {
            None => report.warning(format!(
                "{source} specifies encoding \"{encoding}\", which is unknown"
            )),
            Some(codec) => {
                let std_name = codec.canonical_name();
                if std_name != used_encoding {
                    report.warning(format!(
                        "{source} specifies encoding \"{encoding}\", \
                         while actual encoding seems to be \"{used_encoding}\""
                    ));
                } else if std_name != encoding {
                    report.info(format!(
                        "{source} specifies encoding \"{encoding}\", \
                         which is not the standard name \"{std_name}\""
                    ));
                }
            }
        }
    }

    Ok((text, used_encoding))
}
