//! External byte stream ↔ internal UTF-16 code units.
//!
//! Character mode works on 16-bit code units internally; the outside world
//! is bytes in whatever encoding `--from`/`--to` name. A [`Transcoder`]
//! wraps one `encoding_rs` encoding and converts line-at-a-time. A line
//! that does not decode cleanly yields `None`; the caller logs and skips
//! it.

use anyhow::{anyhow, Result};
use encoding_rs::Encoding;

pub struct Transcoder {
    encoding: &'static Encoding,
}

impl Transcoder {
    /// Looks up a WHATWG encoding label ("UTF-8", "GBK", "Big5", ...).
    pub fn new(label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| anyhow!("unknown encoding label {label:?}"))?;
        Ok(Transcoder { encoding })
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decodes one line of raw bytes into UTF-16 code units. `None` when
    /// the bytes are malformed for this encoding. No BOM sniffing: lines
    /// are always interpreted in this transcoder's encoding.
    pub fn decode_units(&self, bytes: &[u8]) -> Option<Vec<u16>> {
        let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);
        if had_errors {
            return None;
        }
        Some(text.encode_utf16().collect())
    }

    /// Encodes UTF-16 code units back into bytes for output. `None` when
    /// the units contain an unpaired surrogate or a character the target
    /// encoding cannot represent.
    ///
    /// UTF-16 output targets fall back to UTF-8, as `encoding_rs` defines
    /// for encode operations.
    pub fn encode_units(&self, units: &[u16]) -> Option<Vec<u8>> {
        let text = String::from_utf16(units).ok()?;
        let (bytes, _, had_errors) = self.encoding.encode(&text);
        if had_errors {
            return None;
        }
        Some(bytes.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_roundtrip() {
        let t = Transcoder::new("UTF-8").unwrap();
        let units = t.decode_units("héllo".as_bytes()).unwrap();
        assert_eq!(t.encode_units(&units).unwrap(), "héllo".as_bytes());
    }

    #[test]
    fn gbk_decodes_to_utf16() {
        let t = Transcoder::new("GBK").unwrap();
        // 0xD6D0 is U+4E2D in GBK
        let units = t.decode_units(&[0xD6, 0xD0]).unwrap();
        assert_eq!(units, vec![0x4E2D]);
        assert_eq!(t.encode_units(&units).unwrap(), vec![0xD6, 0xD0]);
    }

    #[test]
    fn malformed_input_is_rejected() {
        let t = Transcoder::new("UTF-8").unwrap();
        assert!(t.decode_units(&[0xFF, 0xFE, 0xFD]).is_none());
    }

    #[test]
    fn unpaired_surrogate_is_rejected_on_encode() {
        let t = Transcoder::new("UTF-8").unwrap();
        assert!(t.encode_units(&[0xD800]).is_none());
    }

    #[test]
    fn unknown_label_is_an_error() {
        assert!(Transcoder::new("no-such-encoding").is_err());
    }
}
