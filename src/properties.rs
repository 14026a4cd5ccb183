//! Flat string properties and their `key=value` line encoding.
//!
//! The payload layout is the one Java's `Properties.store` writes, so other
//! readers of the store can parse it: one entry per line, `\` escapes for
//! delimiters and control characters, `\uXXXX` for anything outside printable
//! ASCII. Entries are written in key order, so the same set always encodes to
//! the same bytes.

use crate::error::FormatError;
use std::collections::BTreeMap;

/// Flat string-keyed configuration mapping exchanged between publisher and loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet {
    entries: BTreeMap<String, String>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = PropertySet::new();
        set.extend(iter);
        set
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for PropertySet {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl From<BTreeMap<String, String>> for PropertySet {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for PropertySet {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Serialize a property set, one `key=value` line per entry.
pub fn encode(properties: &PropertySet) -> Vec<u8> {
    let mut out = String::new();
    for (key, value) in properties.iter() {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    out.into_bytes()
}

/// Parse a payload produced by [`encode`] or by any `Properties.store` writer.
///
/// Blank lines and `#`/`!` comments are skipped, `=`, `:` or whitespace
/// separate key from value, and a line ending in an odd number of
/// backslashes continues on the next line. An empty payload is an empty set.
pub fn decode(bytes: &[u8]) -> Result<PropertySet, FormatError> {
    let text = std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidEncoding)?;
    let mut properties = PropertySet::new();
    let mut lines = text.split('\n').enumerate();

    while let Some((index, raw)) = lines.next() {
        let line = index + 1;
        let mut current = trim_leading(strip_cr(raw));
        if current.is_empty() || current.starts_with('#') || current.starts_with('!') {
            continue;
        }

        let mut logical = String::new();
        while continues(current) {
            logical.push_str(&current[..current.len() - 1]);
            match lines.next() {
                Some((_, next)) => current = trim_leading(strip_cr(next)),
                None => return Err(FormatError::UnterminatedEscape { line }),
            }
        }
        logical.push_str(current);

        let (raw_key, raw_value) = split_entry(&logical, line)?;
        let key = unescape(raw_key, line)?;
        let value = unescape(raw_value, line)?;
        properties.insert(key, value);
    }

    Ok(properties)
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn trim_leading(line: &str) -> &str {
    line.trim_start_matches(is_blank)
}

fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(logical: &str, line: usize) -> Result<(&str, &str), FormatError> {
    let mut chars = logical.char_indices();
    while let Some((pos, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '=' | ':' => return Ok((&logical[..pos], trim_leading(&logical[pos + 1..]))),
            c if is_blank(c) => {
                let key = &logical[..pos];
                let mut rest = trim_leading(&logical[pos..]);
                if let Some(stripped) = rest.strip_prefix(['=', ':']) {
                    rest = trim_leading(stripped);
                }
                return Ok((key, rest));
            }
            _ => {}
        }
    }

    Err(FormatError::MissingDelimiter { line })
}

fn unescape(raw: &str, line: usize) -> Result<String, FormatError> {
    let mut units: Vec<u16> = Vec::with_capacity(raw.len());
    let mut buf = [0u16; 2];
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            units.extend_from_slice(c.encode_utf16(&mut buf));
            continue;
        }

        let decoded = match chars.next() {
            None => return Err(FormatError::UnterminatedEscape { line }),
            Some('t') => '\t',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('f') => '\x0c',
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(FormatError::InvalidUnicodeEscape { line });
                }
                let unit = u16::from_str_radix(&hex, 16)
                    .map_err(|_| FormatError::InvalidUnicodeEscape { line })?;
                units.push(unit);
                continue;
            }
            Some(other) => other,
        };
        units.extend_from_slice(decoded.encode_utf16(&mut buf));
    }

    String::from_utf16(&units).map_err(|_| FormatError::InvalidUnicodeEscape { line })
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    let mut buf = [0u16; 2];
    for (i, c) in text.chars().enumerate() {
        match c {
            ' ' if i == 0 || is_key => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => {
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(entries: &[(&str, &str)]) -> PropertySet {
        entries.iter().copied().collect()
    }

    #[test]
    fn encodes_one_sorted_line_per_entry() {
        let set = props(&[
            ("messaging.kafka.brokerList", "broker1:9092"),
            ("foo", "bar"),
        ]);
        let encoded = String::from_utf8(encode(&set)).unwrap();
        assert_eq!(
            encoded,
            "foo=bar\nmessaging.kafka.brokerList=broker1\\:9092\n"
        );
    }

    #[test]
    fn empty_payload_is_empty_set() {
        assert!(decode(b"").unwrap().is_empty());
        assert!(encode(&PropertySet::new()).is_empty());
    }

    #[test]
    fn escapes_delimiters_and_control_characters() {
        let set = props(&[("a key=x", " lead\ttab\nnewline #!:\\")]);
        let encoded = String::from_utf8(encode(&set)).unwrap();
        assert_eq!(
            encoded,
            "a\\ key\\=x=\\ lead\\ttab\\nnewline \\#\\!\\:\\\\\n"
        );
        assert_eq!(decode(encoded.as_bytes()).unwrap(), set);
    }

    #[test]
    fn non_ascii_is_written_as_unicode_escapes() {
        let set = props(&[("greeting", "héllo 🦀")]);
        let encoded = String::from_utf8(encode(&set)).unwrap();
        assert!(encoded.is_ascii());
        assert!(encoded.contains("\\u00E9"));
        assert!(encoded.contains("\\uD83E\\uDD80"));
        assert_eq!(decode(encoded.as_bytes()).unwrap(), set);
    }

    #[test]
    fn reads_java_properties_output() {
        let payload = b"#Thu Jan 01 00:00:00 UTC 2026\n\
            ! another comment\n\
            \n\
            foo=bar\r\n\
            \x20\x20spaced : value with spaces  \n\
            messaging.kafka.brokerList=persist0.dev0.aro.com\\:9092\n\
            whitespace\tdelimited\n\
            empty=\n";
        let set = decode(payload).unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(set.get("foo"), Some("bar"));
        assert_eq!(set.get("spaced"), Some("value with spaces  "));
        assert_eq!(
            set.get("messaging.kafka.brokerList"),
            Some("persist0.dev0.aro.com:9092")
        );
        assert_eq!(set.get("whitespace"), Some("delimited"));
        assert_eq!(set.get("empty"), Some(""));
    }

    #[test]
    fn joins_continuation_lines() {
        let set = decode(b"list=a,\\\n    b,\\\n    c\n").unwrap();
        assert_eq!(set.get("list"), Some("a,b,c"));
    }

    #[test]
    fn later_duplicate_key_wins() {
        let set = decode(b"k=1\nk=2\n").unwrap();
        assert_eq!(set.get("k"), Some("2"));
    }

    #[test]
    fn rejects_missing_delimiter() {
        assert_eq!(
            decode(b"foo=bar\nlonely\n"),
            Err(FormatError::MissingDelimiter { line: 2 })
        );
    }

    #[test]
    fn rejects_unterminated_escape() {
        assert_eq!(
            decode(b"foo=bar\\"),
            Err(FormatError::UnterminatedEscape { line: 1 })
        );
    }

    #[test]
    fn rejects_bad_unicode_escapes() {
        assert_eq!(
            decode(b"k=\\u12"),
            Err(FormatError::InvalidUnicodeEscape { line: 1 })
        );
        assert_eq!(
            decode(b"k=\\uZZZZ"),
            Err(FormatError::InvalidUnicodeEscape { line: 1 })
        );
        assert_eq!(
            decode(b"k=\\u+041"),
            Err(FormatError::InvalidUnicodeEscape { line: 1 })
        );
        assert_eq!(
            decode(b"k=\\uD83E"),
            Err(FormatError::InvalidUnicodeEscape { line: 1 })
        );
    }

    #[test]
    fn rejects_non_utf8_payload() {
        assert_eq!(decode(&[0x66, 0x3d, 0xff]), Err(FormatError::InvalidEncoding));
    }
}
