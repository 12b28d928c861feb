//! Compact text for HTML error pages

use std::sync::LazyLock;

use regex::Regex;

/// One alternative per heading tag; the matching one fills its group.
static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<title\b[^>]*>(.*?)</title\s*>|<h1\b[^>]*>(.*?)</h1\s*>|<h2\b[^>]*>(.*?)</h2\s*>|<h3\b[^>]*>(.*?)</h3\s*>",
    )
    .expect("heading pattern is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Returns `true` for bodies that look like an HTML document.
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let lower = head
        .get(..head.len().min(64))
        .unwrap_or(head)
        .to_ascii_lowercase();
    lower.starts_with("<!doctype html") || lower.starts_with("<html") || lower.starts_with("<head")
}

/// Text of every `title`, `h1`, `h2` and `h3` element in document order,
/// one per line. `None` when the page has none of them.
pub fn extract_error_text(html: &str) -> Option<String> {
    let found: Vec<String> = HEADING
        .captures_iter(html)
        .filter_map(|caps| caps.iter().skip(1).flatten().next())
        .map(|inner| element_text(inner.as_str()))
        .filter(|text| !text.is_empty())
        .collect();
    (!found.is_empty()).then(|| found.join("\n"))
}

/// Inner markup without tags, with common entities decoded and whitespace
/// collapsed.
fn element_text(inner: &str) -> String {
    let text = TAG.replace_all(inner, "");
    let decoded = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn collects_headings_in_document_order() {
        let page = r#"<!DOCTYPE html>
<html><head><title>502 Bad Gateway</title></head>
<body>
  <h1 class="big">Bad <em>Gateway</em></h1>
  <p>Lots of noise here</p>
  <h3>Ray ID: 42</h3>
  <H2>Try again &amp; wait</H2>
  <header>not a heading</header>
</body></html>"#;
        assert_eq!(
            extract_error_text(page).as_deref(),
            Some("502 Bad Gateway\nBad Gateway\nRay ID: 42\nTry again & wait")
        );
    }

    #[test]
    fn unclosed_and_lookalike_tags_are_skipped() {
        let page = "<html><h10>no</h10><h2 id=x>Kept</h2><h1>never closed</html>";
        assert_eq!(extract_error_text(page).as_deref(), Some("Kept"));
    }

    #[test]
    fn pages_without_headings_yield_nothing() {
        assert_eq!(extract_error_text("<html><body><p>oops</p></body></html>"), None);
    }

    #[rstest]
    #[case("<!DOCTYPE html><html></html>", true)]
    #[case("  \n<html lang=\"en\">", true)]
    #[case("<HEAD><title>x</title>", true)]
    #[case("{\"error\":\"bad\"}", false)]
    #[case("plain failure", false)]
    fn html_detection(#[case] body: &str, #[case] expected: bool) {
        assert_eq!(looks_like_html(body), expected);
    }
}
