use std::borrow::Cow;

/// Tags that end a paragraph when stripping markup from feed summaries.
const BLOCK_TAGS: &[&str] = &[
    "p",
    "br",
    "div",
    "li",
    "ul",
    "ol",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "pre",
    "tr",
    "table",
    "hr",
    "section",
    "article",
    "figure",
];

/// Elements whose contents are never text.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Strip control characters and ANSI escape sequences from text.
///
/// Feed content is untrusted and ends up inside XHTML. XML 1.0 forbids the C0
/// controls other than tab, newline and carriage return, so a single stray
/// `\x0b` in a title would make the whole chapter unreadable.
///
/// Strips:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - ANSI CSI sequences: `\x1b[` ... (terminal byte 0x40-0x7E)
/// - ANSI OSC sequences: `\x1b]` ... (until BEL 0x07 or ST `\x1b\\`)
/// - Bare ESC (0x1b) not followed by `[` or `]`
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input contains no control characters (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let len = bytes.len();

    if !bytes.iter().any(|&b| needs_strip(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if b == 0x1b {
            if i + 1 < len && bytes[i + 1] == b'[' {
                // CSI: parameter/intermediate bytes until the final byte
                i += 2;
                while i < len {
                    let c = bytes[i];
                    i += 1;
                    if (0x40..=0x7e).contains(&c) {
                        break;
                    }
                }
            } else if i + 1 < len && bytes[i + 1] == b']' {
                // OSC: everything until BEL or ST
                i += 2;
                while i < len {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == 0x1b && i + 1 < len && bytes[i + 1] == b'\\' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            } else {
                i += 1;
            }
        } else if needs_strip(b) {
            i += 1;
        } else {
            let start = i;
            i += 1;
            while i < len && !needs_strip(bytes[i]) {
                i += 1;
            }
            // SAFETY: we only break on ASCII control bytes, which cannot appear
            // mid-codepoint in valid UTF-8, so s[start..i] is valid UTF-8.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}

fn needs_strip(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d)
}

/// Clean a single-line field (title, author, feed name).
///
/// Decodes HTML entities, strips control characters and collapses all
/// whitespace runs (including newlines) into single spaces.
///
/// ```
/// use epistle::util::clean_inline;
///
/// assert_eq!(clean_inline("  Rust &amp; WebAssembly\n  in 2024 "), "Rust & WebAssembly in 2024");
/// ```
pub fn clean_inline(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = strip_control_chars(&decoded);
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce an HTML fragment (typically an RSS `<description>`) to plain text.
///
/// Tags are removed, block-level tags become paragraph breaks, `<script>`
/// and `<style>` bodies are dropped and entities are decoded. The result is a
/// list of paragraphs joined by blank lines, each paragraph with its
/// whitespace collapsed. A `<` that never closes is kept as text.
///
/// ```
/// use epistle::util::strip_html;
///
/// let html = "<p>First &amp; foremost</p><p>Second<br/>line</p>";
/// assert_eq!(strip_html(html), "First & foremost\n\nSecond\n\nline");
/// ```
pub fn strip_html(s: &str) -> String {
    let mut raw = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find('<') {
        raw.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find('>') else {
            raw.push_str(after);
            rest = "";
            break;
        };

        let tag = &after[1..end];
        let name = tag_name(tag);
        rest = &after[end + 1..];

        if BLOCK_TAGS.contains(&name.as_str()) {
            raw.push_str("\n\n");
        }

        if !tag.starts_with('/') && SKIPPED_ELEMENTS.contains(&name.as_str()) {
            let closing = format!("</{name}");
            // ASCII lowercasing keeps byte offsets stable
            match rest.to_ascii_lowercase().find(&closing) {
                Some(pos) => {
                    let tail = &rest[pos..];
                    rest = tail.find('>').map_or("", |gt| &tail[gt + 1..]);
                }
                None => rest = "",
            }
        }
    }
    raw.push_str(rest);

    let decoded = html_escape::decode_html_entities(&raw);
    let stripped = strip_control_chars(&decoded);

    stripped
        .split("\n\n")
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}
