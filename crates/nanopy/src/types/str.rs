use std::fmt::Write;

/// Python `str` object created at run time.
///
/// String literals never reach the heap (they are interned); this type holds
/// the results of concatenation, formatting and string methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Str(String);

impl Str {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Str {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Str {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Writes the Python repr of `s`: single-quoted unless the text contains a single
/// quote and no double quote, with control characters escaped.
pub(crate) fn string_repr(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

/// `str.split(sep)`, or whitespace splitting when `sep` is `None`.
///
/// Returns `None` for an empty separator, which Python rejects with `ValueError`.
pub(crate) fn split<'a>(s: &'a str, sep: Option<&str>, maxsplit: Option<usize>) -> Option<Vec<&'a str>> {
    match sep {
        None => {
            let mut parts = Vec::new();
            let mut rest = s.trim_start();
            while !rest.is_empty() {
                if maxsplit.is_some_and(|max| parts.len() >= max) {
                    parts.push(rest.trim_end());
                    break;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            Some(parts)
        }
        Some("") => None,
        Some(sep) => Some(match maxsplit {
            Some(max) => s.splitn(max + 1, sep).collect(),
            None => s.split(sep).collect(),
        }),
    }
}

/// `str.find(sub)` as a character index, or -1.
pub(crate) fn find(s: &str, sub: &str) -> i64 {
    s.find(sub)
        .map_or(-1, |byte_index| i64::try_from(s[..byte_index].chars().count()).unwrap_or(i64::MAX))
}

/// The character at a Python index (negative counts from the end), for `s[i]`.
pub(crate) fn char_at(s: &str, index: i64) -> Option<char> {
    if index >= 0 {
        s.chars().nth(usize::try_from(index).ok()?)
    } else {
        let from_end = usize::try_from(index.checked_neg()?).ok()?;
        s.chars().rev().nth(from_end - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repr(s: &str) -> String {
        let mut out = String::new();
        string_repr(&mut out, s);
        out
    }

    #[test]
    fn repr_picks_quotes_like_python() {
        assert_eq!(repr("hello"), "'hello'");
        assert_eq!(repr("it's"), "\"it's\"");
        assert_eq!(repr("a'b\"c"), "'a\\'b\"c'");
        assert_eq!(repr("line\n"), "'line\\n'");
    }

    #[test]
    fn whitespace_split_drops_empty_parts() {
        assert_eq!(split("  a b\t c ", None, None), Some(vec!["a", "b", "c"]));
        assert_eq!(split("a b c", None, Some(1)), Some(vec!["a", "b c"]));
        assert_eq!(split("a,,b", Some(","), None), Some(vec!["a", "", "b"]));
        assert_eq!(split("a", Some(""), None), None);
    }

    #[test]
    fn find_and_index_count_characters() {
        assert_eq!(find("héllo", "l"), 2);
        assert_eq!(find("abc", "z"), -1);
        assert_eq!(char_at("abc", -1), Some('c'));
        assert_eq!(char_at("abc", 3), None);
    }
}
