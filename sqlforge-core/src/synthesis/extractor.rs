//! Isolate script text from backend output

use sql_patterns::fence;

/// Strip markdown fencing from a completion.
///
/// With two or more fence markers the script is the text after the first
/// marker's line and before the last marker. Zero or one marker leaves the
/// text as-is apart from trimming.
pub fn extract_script(raw: &str) -> String {
    let (Some(first), Some(last)) = (raw.find(fence::MARKER), raw.rfind(fence::MARKER)) else {
        return raw.trim().to_string();
    };
    // a single run of four or five backticks is found by both searches
    if last < first + fence::MARKER.len() {
        return raw.trim().to_string();
    }

    let opened = first + fence::MARKER.len();
    let inner = &raw[opened..last];
    let body = match inner.find('\n') {
        Some(newline) => &inner[newline + 1..],
        // ```sql SELECT 1```
        None => fence::strip_language_tag(inner),
    };

    body.trim().to_string()
}
