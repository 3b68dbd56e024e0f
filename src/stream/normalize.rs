//! Per-fragment newline and character cleanup
//!
//! Models tend to emit runs of blank lines, especially after the end of a
//! sentence. Fragment boundaries can split a run, so cleanup happens on each
//! fragment before it is concatenated into a channel buffer.

use regex::Regex;
use std::sync::OnceLock;

fn after_terminal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([.!?])\n{2,}").expect("valid regex"))
}

fn runaway_newlines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

/// Collapse newline runs in a raw fragment.
///
/// CR/CRLF become `\n`; 2+ newlines after `.`, `!` or `?` become one; any
/// remaining run of 3+ becomes two; a fragment made only of newlines becomes
/// a single `\n`. The result never contains three consecutive newlines and
/// `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let unified;
    let text = if raw.contains('\r') {
        unified = raw.replace("\r\n", "\n").replace('\r', "\n");
        unified.as_str()
    } else {
        raw
    };

    if text.bytes().all(|b| b == b'\n') {
        return "\n".to_string();
    }

    let text = after_terminal_re().replace_all(text, "${1}\n");
    runaway_newlines_re()
        .replace_all(&text, "\n\n")
        .into_owned()
}

/// Fold typographic punctuation to ASCII and drop any other non-ASCII char.
pub fn sanitize_ascii(raw: &str) -> String {
    if raw.is_ascii() {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let replacement = match c {
            '\u{2018}' | '\u{2019}' => "'",
            '\u{201C}' | '\u{201D}' => "\"",
            '\u{2026}' => "...",
            '\u{2013}' | '\u{2014}' => "-",
            '\u{2022}' => "*",
            '\u{00A9}' => "(c)",
            '\u{00AE}' => "(r)",
            '\u{2122}' => "TM",
            '\u{20AC}' => "EUR",
            '\u{00A3}' => "GBP",
            '\u{00A5}' => "JPY",
            _ => "",
        };
        out.push_str(replacement);
    }
    out
}

/// Fragment cleanup pipeline applied before text enters a channel buffer
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    pub sanitize_ascii: bool,
}

impl Normalizer {
    pub fn new(sanitize_ascii: bool) -> Self {
        Self { sanitize_ascii }
    }

    pub fn apply(&self, raw: &str) -> String {
        if self.sanitize_ascii {
            normalize(&sanitize_ascii(raw))
        } else {
            normalize(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        " ",
        "\n",
        "\n\n",
        "\n\n\n\n",
        "Done.\n\n\n\nNext",
        "Done!\n\nNext?\n\n\nLast",
        "para one\n\npara two",
        "runaway\n\n\n\n\n\nblank",
        "\r\n\r\n\r\nwindows\r\n",
        "trailing.\n\n",
        "mixed \u{201C}quotes\u{201D} \u{2014} and\u{2026}\n\n\n",
        "no newlines at all",
    ];

    #[test]
    fn test_newline_collapse_examples() {
        assert_eq!(normalize("Done.\n\n\n\nNext"), "Done.\nNext");
        assert_eq!(normalize("\n\n\n\n"), "\n");
        assert_eq!(normalize("Why?\n\nBecause"), "Why?\nBecause");
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
        assert_eq!(normalize("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_carriage_returns_are_unified() {
        assert_eq!(normalize("a\r\nb"), "a\nb");
        assert_eq!(normalize("a\rb"), "a\nb");
        assert_eq!(normalize("\r\n\r\n"), "\n");
        assert_eq!(normalize("end.\r\n\r\nnext"), "end.\nnext");
    }

    #[test]
    fn test_never_three_newlines() {
        for sample in SAMPLES {
            let out = normalize(sample);
            assert!(!out.contains("\n\n\n"), "{:?} -> {:?}", sample, out);
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for sample in SAMPLES {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "sample {:?}", sample);
        }
    }

    #[test]
    fn test_sanitize_ascii() {
        assert_eq!(
            sanitize_ascii("\u{2018}hi\u{2019} \u{201C}there\u{201D}\u{2026}"),
            "'hi' \"there\"..."
        );
        assert_eq!(sanitize_ascii("a\u{2013}b\u{2014}c \u{2022} d"), "a-b-c * d");
        assert_eq!(sanitize_ascii("\u{00A9}\u{00AE}\u{2122}"), "(c)(r)TM");
        assert_eq!(sanitize_ascii("\u{20AC}5 \u{00A3}4 \u{00A5}3"), "EUR5 GBP4 JPY3");
        assert_eq!(sanitize_ascii("caf\u{00E9} \u{1F600}"), "caf ");
        assert_eq!(sanitize_ascii("plain"), "plain");
    }

    #[test]
    fn test_normalizer_pipeline_is_idempotent() {
        let normalizer = Normalizer::new(true);
        for sample in SAMPLES {
            let once = normalizer.apply(sample);
            assert!(once.is_ascii());
            assert_eq!(normalizer.apply(&once), once, "sample {:?}", sample);
        }
        assert_eq!(Normalizer::default().apply("caf\u{00E9}"), "caf\u{00E9}");
    }
}
