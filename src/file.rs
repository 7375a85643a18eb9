use crate::error::{Error, Result};
use encoding_rs::SHIFT_JIS;
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of the files the collector picks up.
pub const SOURCE_EXTENSION: &str = "py";

/// One eligible source file found under the collection root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileEntry {
    /// Path relative to the collection root, `/`-separated
    pub relative_path: String,

    /// Absolute path to the file
    pub absolute_path: PathBuf,
}

impl FileEntry {
    /// Creates an entry from its two paths.
    #[must_use]
    pub fn new(relative_path: impl Into<String>, absolute_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
            absolute_path: absolute_path.into(),
        }
    }
}

/// Encoding a file was successfully decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Primary encoding
    Utf8,
    /// Legacy fallback (the CP932 / Windows-31J family)
    ShiftJis,
}

impl TextEncoding {
    /// Human-readable encoding label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::ShiftJis => "Shift_JIS",
        }
    }
}

/// Text content together with the encoding it was read as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// Decoded content
    pub text: String,

    /// Encoding that produced `text`
    pub encoding: TextEncoding,
}

/// Decodes raw bytes as UTF-8, falling back to Shift_JIS.
///
/// Returns `None` when the bytes are malformed in both encodings. Neither
/// decoder substitutes replacement characters.
#[must_use]
pub fn decode_bytes(bytes: Vec<u8>) -> Option<DecodedText> {
    let bytes = match String::from_utf8(bytes) {
        Ok(text) => {
            return Some(DecodedText {
                text,
                encoding: TextEncoding::Utf8,
            });
        }
        Err(e) => e.into_bytes(),
    };

    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(&bytes)
        .map(|text| DecodedText {
            text: text.into_owned(),
            encoding: TextEncoding::ShiftJis,
        })
}

/// Reads a file as text using [`decode_bytes`].
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and
/// [`Error::Undecodable`] if it is valid in no supported encoding.
pub fn read_text(path: &Path) -> Result<DecodedText> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    decode_bytes(bytes).ok_or_else(|| Error::undecodable(path))
}

/// Checks if a file name ends in `.py`.
///
/// This is a suffix test on the name, so a file named just `.py` qualifies.
#[must_use]
pub fn is_source_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(SOURCE_EXTENSION))
        .is_some_and(|stem| stem.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_decode_utf8() {
        let decoded = decode_bytes("print('こんにちは')\n".as_bytes().to_vec()).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
        assert_eq!(decoded.text, "print('こんにちは')\n");
    }

    #[test]
    fn test_decode_falls_back_to_shift_jis() {
        let (bytes, _, had_errors) = SHIFT_JIS.encode("# 日本語のコメント\nx = 1\n");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&bytes).is_err());

        let decoded = decode_bytes(bytes.into_owned()).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::ShiftJis);
        assert_eq!(decoded.text, "# 日本語のコメント\nx = 1\n");
    }

    #[test]
    fn test_decode_rejects_bytes_invalid_in_both() {
        assert!(decode_bytes(vec![b'x', 0xFD, 0xFE, 0xFF]).is_none());
    }

    #[test]
    fn test_read_text_missing_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let err = read_text(&temp.path().join("missing.py")).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_read_text_undecodable() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("broken.py");
        file.write_binary(&[0xFF, 0xFE, 0xFD]).unwrap();

        let err = read_text(file.path()).unwrap_err();
        assert!(matches!(err, Error::Undecodable { .. }));
    }

    #[test]
    fn test_read_text_empty_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("__init__.py");
        file.touch().unwrap();

        let decoded = read_text(file.path()).unwrap();
        assert_eq!(decoded.text, "");
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
    }

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file(Path::new("pkg/module.py")));
        assert!(!is_source_file(Path::new("notes.txt")));
        assert!(!is_source_file(Path::new("module.pyc")));
        assert!(!is_source_file(Path::new("Makefile")));
        assert!(!is_source_file(Path::new("UPPER.PY")));
        assert!(!is_source_file(Path::new("py")));
        assert!(is_source_file(Path::new(".py")));
        assert!(is_source_file(Path::new("pkg/.py")));
    }
}
