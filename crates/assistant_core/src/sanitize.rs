//! Allow-list sanitizer for assistant markup.
//!
//! Every assistant message passes through a [`MarkupSanitizer`] before it is
//! rendered. Tags outside the allow-list are dropped (their text kept),
//! content of script-like elements is removed entirely, and attributes are
//! filtered per tag.

pub const ALLOWED_TAGS: &[&str] = &["a", "b", "strong", "ul", "li", "p"];
pub const ALLOWED_ATTRIBUTES: &[&str] = &["href", "target", "rel", "style"];

const DROP_CONTENT_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "textarea", "title",
    "svg", "math",
];
const SAFE_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

pub trait MarkupSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowListSanitizer;

impl MarkupSanitizer for AllowListSanitizer {
    fn sanitize(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut rest = html;

        while let Some(start) = rest.find('<') {
            push_text(&mut out, &rest[..start]);
            let candidate = &rest[start..];

            if let Some(comment) = candidate.strip_prefix("<!--") {
                rest = match comment.find("-->") {
                    Some(end) => &comment[end + 3..],
                    None => "",
                };
                continue;
            }

            let Some(end) = candidate.find('>') else {
                push_text(&mut out, candidate);
                rest = "";
                break;
            };
            rest = &candidate[end + 1..];

            let Some(tag) = parse_tag(&candidate[1..end]) else {
                push_text(&mut out, &candidate[..=end]);
                continue;
            };
            if !tag.closing && DROP_CONTENT_TAGS.contains(&tag.name.as_str()) {
                rest = skip_past_closing(rest, &tag.name);
                continue;
            }
            if ALLOWED_TAGS.contains(&tag.name.as_str()) {
                write_tag(&mut out, &tag);
            }
        }

        push_text(&mut out, rest);
        out
    }
}

struct Tag {
    name: String,
    closing: bool,
    attributes: Vec<(String, String)>,
}

fn parse_tag(inner: &str) -> Option<Tag> {
    let (closing, body) = match inner.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, inner),
    };
    if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let name_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let attributes = if closing {
        Vec::new()
    } else {
        parse_attributes(&body[name_len..])
    };
    Some(Tag {
        name: body[..name_len].to_ascii_lowercase(),
        closing,
        attributes,
    })
}

fn parse_attributes(mut rest: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '/');
        if rest.is_empty() {
            break;
        }

        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let mut value = "";
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (parsed, remaining) = match after_eq.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let quoted = &after_eq[1..];
                    match quoted.find(quote) {
                        Some(close) => (&quoted[..close], &quoted[close + 1..]),
                        None => (quoted, ""),
                    }
                }
                _ => {
                    let end = after_eq
                        .find(|c: char| c.is_ascii_whitespace())
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            value = parsed;
            rest = remaining;
        }

        if !name.is_empty() {
            attributes.push((name, value.to_string()));
        }
    }
    attributes
}

fn write_tag(out: &mut String, tag: &Tag) {
    if tag.closing {
        out.push_str("</");
        out.push_str(&tag.name);
        out.push('>');
        return;
    }

    let mut kept: Vec<(&str, String)> = Vec::new();
    for (name, value) in &tag.attributes {
        if !ALLOWED_ATTRIBUTES.contains(&name.as_str())
            || kept.iter().any(|(seen, _)| *seen == name.as_str())
        {
            continue;
        }
        let clean = match name.as_str() {
            "href" if tag.name == "a" => safe_href(value),
            "target" if tag.name == "a" => safe_target(value),
            "rel" if tag.name == "a" => Some(value.trim().to_string()),
            "style" => safe_style(value),
            _ => None,
        };
        if let Some(clean) = clean {
            kept.push((name.as_str(), clean));
        }
    }
    if kept
        .iter()
        .any(|(name, value)| *name == "target" && value == "_blank")
    {
        kept.retain(|(name, _)| *name != "rel");
        kept.push(("rel", "noopener noreferrer".to_string()));
    }

    out.push('<');
    out.push_str(&tag.name);
    for (name, value) in kept {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        push_attribute_value(out, &value);
        out.push('"');
    }
    out.push('>');
}

fn safe_href(value: &str) -> Option<String> {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let lower = compact.to_ascii_lowercase();
    // Encoded colons would let a scheme slip past the check below.
    if lower.contains("&#") || lower.contains("&colon") {
        return None;
    }
    match lower.find(':') {
        Some(colon) if !lower[..colon].contains(|c| matches!(c, '/' | '?' | '#')) => {
            SAFE_URL_SCHEMES
                .contains(&&lower[..colon])
                .then_some(compact)
        }
        _ => Some(compact),
    }
}

fn safe_target(value: &str) -> Option<String> {
    let value = value.trim().to_ascii_lowercase();
    matches!(value.as_str(), "_blank" | "_self").then_some(value)
}

/// Only `color` declarations with plain values survive.
fn safe_style(value: &str) -> Option<String> {
    let declarations: Vec<String> = value
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let value = value.trim();
            let plain = !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '(' | ')' | ',' | '.' | '%' | ' '));
            (property.trim().eq_ignore_ascii_case("color") && plain)
                .then(|| format!("color: {value}"))
        })
        .collect();
    if declarations.is_empty() {
        None
    } else {
        Some(declarations.join("; "))
    }
}

fn skip_past_closing<'a>(rest: &'a str, name: &str) -> &'a str {
    let lower = rest.to_ascii_lowercase();
    let Some(close) = lower.find(&format!("</{name}")) else {
        return "";
    };
    match lower[close..].find('>') {
        Some(end) => &rest[close + end + 1..],
        None => "",
    }
}

fn push_text(out: &mut String, text: &str) {
    for (index, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if !starts_with_entity(&text[index..]) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

fn push_attribute_value(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

fn starts_with_entity(text: &str) -> bool {
    let Some(end) = text.find(';') else {
        return false;
    };
    let body = &text[1..end];
    if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(decimal) = body.strip_prefix('#') {
        !decimal.is_empty() && decimal.chars().all(|c| c.is_ascii_digit())
    } else {
        !body.is_empty() && body.len() <= 32 && body.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(html: &str) -> String {
        AllowListSanitizer.sanitize(html)
    }

    #[test]
    fn keeps_allowed_markup() {
        assert_eq!(
            clean("<p>Hi <strong>there</strong></p><ul><li>one</li></ul>"),
            "<p>Hi <strong>there</strong></p><ul><li>one</li></ul>"
        );
    }

    #[test]
    fn removes_script_content_and_event_handlers() {
        assert_eq!(
            clean("<p onclick=\"steal()\">ok</p><script>alert(1)</script>done"),
            "<p>ok</p>done"
        );
        assert_eq!(clean("<SCRIPT>x</SCRIPT >after"), "after");
        assert_eq!(clean("<img src=x onerror=alert(1)>"), "");
    }

    #[test]
    fn drops_unsafe_link_schemes() {
        assert_eq!(
            clean("<a href=\"javascript:alert(1)\">x</a>"),
            "<a>x</a>"
        );
        assert_eq!(
            clean("<a href=\"java\tscript:alert(1)\">x</a>"),
            "<a>x</a>"
        );
        assert_eq!(
            clean("<a href=\"javascript&#58;alert(1)\">x</a>"),
            "<a>x</a>"
        );
        assert_eq!(
            clean("<a href=\"https://example.com/?a=1&b=2\">x</a>"),
            "<a href=\"https://example.com/?a=1&amp;b=2\">x</a>"
        );
        assert_eq!(clean("<a href='/about#me'>x</a>"), "<a href=\"/about#me\">x</a>");
    }

    #[test]
    fn blank_target_forces_noopener() {
        assert_eq!(
            clean("<a href=\"https://x.dev\" target=\"_blank\" rel=\"opener\">x</a>"),
            "<a href=\"https://x.dev\" target=\"_blank\" rel=\"noopener noreferrer\">x</a>"
        );
    }

    #[test]
    fn style_keeps_only_color() {
        assert_eq!(
            clean("<b style=\"color: #ff8800; background: url(evil)\">x</b>"),
            "<b style=\"color: #ff8800\">x</b>"
        );
        assert_eq!(clean("<b style=\"position: fixed\">x</b>"), "<b>x</b>");
    }

    #[test]
    fn plain_text_is_escaped() {
        assert_eq!(clean("1 < 2 > 0 & done"), "1 &lt; 2 &gt; 0 &amp; done");
        assert_eq!(clean("Tom &amp; Jerry"), "Tom &amp; Jerry");
        assert_eq!(clean("<!-- hidden -->shown"), "shown");
        assert_eq!(clean("trailing <b"), "trailing &lt;b");
    }
}
