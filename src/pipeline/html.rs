//! HTML text extraction and byte decoding.
//!
//! Markup is parsed with `scraper` (html5ever underneath), so broken or
//! cached pages still yield a tree. Text inside `<script>` and `<style>` is
//! dropped wholesale; every other non-empty text node is joined with a single
//! space.
//!
//! Bytes arrive in whatever encoding the server or uploader used. They are
//! decoded BOM first, then by the `charset=` label, then by `chardetng`'s
//! guess. Decoding is lossy: undecodable sequences become U+FFFD, which the
//! normaliser removes along with all other non-ASCII noise.

use scraper::{Html, Node};
use tracing::debug;

const SKIPPED_ELEMENTS: [&str; 2] = ["script", "style"];

/// Extract visible text from an HTML document.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        let t = text.trim();
        if !t.is_empty() {
            parts.push(t);
        }
    }

    debug!("HTML extraction kept {} text nodes", parts.len());
    parts.join(" ").trim().to_string()
}

/// Decode document bytes into a `String`.
pub fn decode_text(bytes: &[u8], content_type: Option<&str>) -> String {
    if let Some((enc, offset)) = encoding_rs::Encoding::for_bom(bytes) {
        let (cow, _had_errors) = enc.decode_without_bom_handling(&bytes[offset..]);
        return cow.into_owned();
    }

    if let Some(label) = charset_label(content_type) {
        if let Some(enc) = encoding_rs::Encoding::for_label_no_replacement(label.as_bytes()) {
            let (cow, _had_errors) = enc.decode_without_bom_handling(bytes);
            return cow.into_owned();
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    let (cow, _had_errors) = enc.decode_without_bom_handling(bytes);
    cow.into_owned()
}

/// `charset=` parameter of a Content-Type header, if any.
fn charset_label(content_type: Option<&str>) -> Option<String> {
    content_type?
        .split(';')
        .skip(1)
        .map(str::trim)
        .find_map(|kv| {
            let (key, value) = kv.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_string())
        })
}
