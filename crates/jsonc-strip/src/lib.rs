//! JSONC preprocessing shared by grammar loading and the diagnostics build script.
//!
//! Handles `//` line comments, `/* ... */` block comments and trailing commas
//! before `}` or `]`. String literals are copied untouched, escapes included.

/// Strip comments and trailing commas from JSONC input, producing plain JSON.
///
/// Line comments keep their terminating newline so line numbers reported by
/// `serde_json` still point at the original source.
#[must_use]
pub fn strip_jsonc(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0usize;
    let mut copy_from = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_string(bytes, i),
            b'/' if matches!(bytes.get(i + 1), Some(b'/' | b'*')) => {
                out.push_str(&input[copy_from..i]);
                i = skip_comment(bytes, i);
                copy_from = i;
            }
            b',' if matches!(next_significant(bytes, i + 1), Some(b'}' | b']')) => {
                out.push_str(&input[copy_from..i]);
                i += 1;
                copy_from = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&input[copy_from..]);
    out
}

/// Returns the index just past the string literal opening at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Returns the index just past the comment opening at `start`.
fn skip_comment(bytes: &[u8], start: usize) -> usize {
    if bytes[start + 1] == b'/' {
        let mut i = start + 2;
        while i < bytes.len() && bytes[i] != b'\n' {
            i += 1;
        }
        return i;
    }
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

fn next_significant(bytes: &[u8], mut i: usize) -> Option<u8> {
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'/' if matches!(bytes.get(i + 1), Some(b'/' | b'*')) => i = skip_comment(bytes, i),
            b => return Some(b),
        }
    }
    None
}
