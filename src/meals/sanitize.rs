//! Allowlist markup filter for user-supplied instructions.
//!
//! Allowed tags are re-emitted in canonical form with only their allowed
//! attributes. Any other tag and every stray angle bracket is escaped so it
//! renders as text. Running the filter on its own output changes nothing.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref TAG_RE: Regex =
        Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)((?:[\s/][^<>]*)?)>").unwrap();
    static ref ATTR_RE: Regex = Regex::new(
        r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#
    )
    .unwrap();
    static ref ENTITY_RE: Regex =
        Regex::new(r"(?i)&#(x[0-9a-f]+|[0-9]+);?|&(colon|tab|newline);").unwrap();
}

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "del", "div", "em", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "i", "img", "ins", "li", "ol", "p", "pre", "s", "small", "span", "strong",
    "sub", "sup", "u", "ul",
];

const URL_ATTRS: &[&str] = &["href", "src"];
const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

fn allowed_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "title", "target"],
        "img" => &["src", "alt", "title", "width", "height"],
        _ => &["title"],
    }
}

pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;

    for caps in TAG_RE.captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };
        escape_text(&raw[last..whole.start()], &mut out);
        match render_tag(&caps) {
            Some(tag) => out.push_str(&tag),
            None => escape_text(whole.as_str(), &mut out),
        }
        last = whole.end();
    }
    escape_text(&raw[last..], &mut out);

    out
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

/// Canonical form of an allowed tag, or `None` when the tag must be escaped.
fn render_tag(caps: &Captures<'_>) -> Option<String> {
    let closing = !caps[1].is_empty();
    let name = caps[2].to_ascii_lowercase();
    if !ALLOWED_TAGS.contains(&name.as_str()) {
        return None;
    }
    if closing {
        return Some(format!("</{name}>"));
    }

    let rest = &caps[3];
    let allowed = allowed_attrs(&name);
    let mut kept: Vec<(String, String)> = Vec::new();

    for attr in ATTR_RE.captures_iter(rest) {
        let attr_name = attr[1].to_ascii_lowercase();
        if !allowed.contains(&attr_name.as_str()) || kept.iter().any(|(n, _)| *n == attr_name) {
            continue;
        }
        let Some(value) = attr.get(2).or_else(|| attr.get(3)).or_else(|| attr.get(4)) else {
            continue;
        };
        let value = value.as_str();
        if URL_ATTRS.contains(&attr_name.as_str()) && !is_safe_url(value) {
            continue;
        }
        kept.push((attr_name, value.replace('"', "&quot;")));
    }

    let mut tag = format!("<{name}");
    for (attr_name, value) in kept {
        tag.push_str(&format!(" {attr_name}=\"{value}\""));
    }
    if rest.trim_end().ends_with('/') {
        tag.push_str(" /");
    }
    tag.push('>');
    Some(tag)
}

fn decode_entities(value: &str) -> String {
    ENTITY_RE
        .replace_all(value, |caps: &Captures<'_>| {
            if let Some(named) = caps.get(2) {
                return match named.as_str().to_ascii_lowercase().as_str() {
                    "colon" => ":".to_string(),
                    "tab" => "\t".to_string(),
                    _ => "\n".to_string(),
                };
            }
            let num = &caps[1];
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Scheme-less URLs and the schemes in `SAFE_SCHEMES` pass; everything else
/// (`javascript:`, `data:`, `vbscript:`, ...) is dropped.
fn is_safe_url(value: &str) -> bool {
    let normalized: String = decode_entities(value)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    match normalized.find(':') {
        None => true,
        Some(idx) => {
            let scheme = &normalized[..idx];
            scheme.contains(['/', '?', '#']) || SAFE_SCHEMES.contains(&scheme)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_element_is_neutralized() {
        let out = sanitize("Mix well<script>alert(1)</script> then bake");
        assert_eq!(
            out,
            "Mix well&lt;script&gt;alert(1)&lt;/script&gt; then bake"
        );
        assert!(!out.to_ascii_lowercase().contains("<script"));
    }

    #[test]
    fn uppercase_script_is_neutralized() {
        let out = sanitize("<SCRIPT src=//evil.example></SCRIPT>");
        assert!(!out.to_ascii_lowercase().contains("<script"));
    }

    #[test]
    fn benign_markup_is_kept() {
        let raw = "<p>Fry <strong>slowly</strong> and <em>stir</em>.</p><br />";
        assert_eq!(sanitize(raw), raw);
    }

    #[test]
    fn tag_names_are_lowercased() {
        assert_eq!(sanitize("<B>bold</B>"), "<b>bold</b>");
    }

    #[test]
    fn event_handlers_are_stripped() {
        assert_eq!(
            sanitize(r#"<img src="pan.png" onerror="alert(1)" alt='pan'>"#),
            r#"<img src="pan.png" alt="pan">"#
        );
        assert_eq!(
            sanitize(r#"<p onclick="steal()">hi</p>"#),
            "<p>hi</p>"
        );
    }

    #[test]
    fn javascript_urls_are_dropped() {
        assert_eq!(
            sanitize(r#"<a href="javascript:alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize(r#"<a href="jav&#x09;ascript&#58;alert(1)">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            sanitize(r#"<img src=" JaVaScRiPt:alert(1)">"#),
            "<img>"
        );
    }

    #[test]
    fn safe_urls_are_kept() {
        assert_eq!(
            sanitize("<a href='https://example.com/a?b=c' title=Go>x</a>"),
            r#"<a href="https://example.com/a?b=c" title="Go">x</a>"#
        );
        assert_eq!(
            sanitize(r#"<a href="/meals/tacos">x</a>"#),
            r#"<a href="/meals/tacos">x</a>"#
        );
    }

    #[test]
    fn newlines_and_plain_text_pass_through() {
        assert_eq!(sanitize("Step 1\nStep 2"), "Step 1\nStep 2");
        assert_eq!(sanitize("2 < 3 & 4 > 1"), "2 &lt; 3 & 4 &gt; 1");
    }

    #[test]
    fn unknown_tags_are_escaped() {
        assert_eq!(
            sanitize("<iframe src=x></iframe>"),
            "&lt;iframe src=x&gt;&lt;/iframe&gt;"
        );
        assert_eq!(sanitize("<b-x>"), "&lt;b-x&gt;");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "plain text",
            "<script>alert(1)</script>",
            r#"<img src="a.png" onerror=alert(1) />"#,
            r#"<a href='x"y' title="t'q">l</a>"#,
            r#"<a href="javascript&colon;alert(1)">l</a>"#,
            "<<b>>nested<</b>>",
            "<p title=\"a\" title=\"b\">dup</p>",
            "<!-- comment --><style>p{}</style>",
            "unterminated <b",
            "<img src=x.png/>",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input}");
        }
    }
}
