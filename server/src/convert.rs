use docstream_jobs::{Conversion, ConversionError, Converter};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Renders plain text as HTML: blank-line separated paragraphs become `<p>` elements,
/// `#`-prefixed paragraphs become headings, single line breaks become `<br />`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextConverter;

impl Converter for PlainTextConverter {
    fn convert(&self, document: &[u8]) -> Result<Conversion, ConversionError> {
        if document.starts_with(ZIP_MAGIC) {
            return Err(ConversionError::Unsupported(
                "packaged office documents are not accepted, upload plain text".into(),
            ));
        }

        let mut messages: Vec<String> = vec![];
        let text = match std::str::from_utf8(document) {
            Ok(text) => text.to_string(),
            Err(_) => {
                messages.push("document is not valid UTF-8, invalid sequences were replaced".into());
                String::from_utf8_lossy(document).into_owned()
            }
        };
        let text = text.replace("\r\n", "\n");

        let mut markup = String::with_capacity(text.len() + 64);
        for paragraph in text.split("\n\n").map(str::trim) {
            if !paragraph.is_empty() {
                markup.push_str(&render_paragraph(paragraph));
            }
        }
        Ok(Conversion { markup, messages })
    }
}

fn render_paragraph(paragraph: &str) -> String {
    let level = paragraph.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&level) && paragraph[level..].starts_with(' ') {
        let title = escape(paragraph[level..].trim());
        return format!("<h{level}>{title}</h{level}>", level = level, title = title);
    }
    let lines: Vec<String> = paragraph.lines().map(|line| escape(line.trim())).collect();
    format!("<p>{}</p>", lines.join("<br />"))
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
