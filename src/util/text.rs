use std::borrow::Cow;

/// Converts an HTML fragment (an RSS `<description>`) to a single line of plain text.
///
/// Tags are dropped, HTML5 character references are decoded and runs of
/// whitespace collapse to a single space. WordPress descriptions routinely carry `<p>` wrappers, `&#8217;`
/// style numeric references and a trailing "[&hellip;]" marker; all of these come
/// out as readable text.
///
/// # Examples
///
/// ```
/// use feedsheet::util::strip_html;
///
/// assert_eq!(strip_html("<p>Hello&nbsp;<b>world</b></p>"), "Hello world");
/// assert_eq!(strip_html("L&#8217;IA  du\n jour"), "L\u{2019}IA du jour");
/// ```
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                // A tag boundary is a word boundary: "<p>a</p><p>b</p>" reads "a b"
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = html_escape::decode_html_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes characters that are not allowed in an XML 1.0 document.
///
/// Feed text ends up inside `content.xml`; a single stray control byte there makes
/// the whole spreadsheet unreadable. Tab, newline and carriage return are kept, as
/// are all other valid scalar values. The noncharacters U+FFFE and U+FFFF are
/// removed.
///
/// Returns `Cow::Borrowed` when nothing needs removing (the common case).
pub fn strip_xml_invalid_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_xml_invalid) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_xml_invalid(c)).collect())
}

fn is_xml_invalid(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}')
}
