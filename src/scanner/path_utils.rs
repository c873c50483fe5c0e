//! Unicode normalization for file names and path keys.
//!
//! macOS stores names decomposed (NFD) while most other systems use composed
//! (NFC) form, so `café` may arrive as either `U+00E9` or `e` + `U+0301`.
//! Rule triggers are matched against NFC text, and paths are compared through
//! [`path_key`] so both spellings land on the same key.
//!
//! ```
//! use model_archivist::scanner::path_utils::{normalize_path_str_cow, path_key};
//! use std::path::Path;
//!
//! assert_eq!(normalize_path_str_cow("cafe\u{0301}.zip"), "caf\u{e9}.zip");
//! assert_eq!(path_key(Path::new("cafe\u{0301}.zip")), path_key(Path::new("caf\u{e9}.zip")));
//! ```

use std::borrow::Cow;
use std::path::Path;

use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// Normalize to NFC, borrowing when the input is already composed.
#[must_use]
pub fn normalize_path_str_cow(s: &str) -> Cow<'_, str> {
    match is_nfc_quick(s.chars()) {
        IsNormalized::Yes => Cow::Borrowed(s),
        _ => {
            let normalized: String = s.nfc().collect();
            if normalized == s {
                Cow::Borrowed(s)
            } else {
                Cow::Owned(normalized)
            }
        }
    }
}

/// NFC-normalized, lossy string form of `path` for use as a map key.
#[must_use]
pub fn path_key(path: &Path) -> String {
    normalize_path_str_cow(&path.to_string_lossy()).into_owned()
}
