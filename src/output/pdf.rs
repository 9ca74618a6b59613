//! Plain-text PDF rendering on top of `lopdf`.
//!
//! Uses the built-in Courier font, so text is limited to ASCII and wrapped
//! by character count.

use crate::utils::error::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const FONT_SIZE: i64 = 10;
const LEADING: i64 = 14;
const WRAP_COLUMNS: usize = 82;
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

/// Replaces characters Courier cannot show.
pub fn to_ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' | '\u{2022}' => '-',
            '\t' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

/// Breaks one line into chunks of at most `width` characters, on spaces when possible.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.trim().is_empty() {
        return vec![String::new()];
    }

    let mut wrapped = Vec::new();
    let mut current = String::new();
    for word in line.split(' ') {
        let mut word = word.to_string();
        // 單字本身就超過寬度時硬切
        while word.chars().count() > width {
            if !current.is_empty() {
                wrapped.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(width).collect();
            word = word.chars().skip(width).collect();
            wrapped.push(head);
        }
        let needed = if current.is_empty() { word.len() } else { current.len() + 1 + word.len() };
        if needed > width && !current.is_empty() {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

fn page_content(lines: &[String]) -> Result<Vec<u8>> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));

    Ok(Content { operations }.encode()?)
}

/// Lays the given text out on A4 pages and returns the PDF bytes.
pub fn render_text_pdf(title: &str, text: &str) -> Result<Vec<u8>> {
    let lines: Vec<String> = text
        .lines()
        .flat_map(|line| wrap_line(&to_ascii(line), WRAP_COLUMNS))
        .collect();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };
    for chunk in chunks {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(chunk)?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(to_ascii(title)),
        "Producer" => Object::string_literal("FlowCo"),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    tracing::debug!("📄 Rendered PDF: {} pages, {} bytes", page_count, buffer.len());
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_ascii_maps_typography() {
        assert_eq!(to_ascii("“Smart” café – ok"), "\"Smart\" caf? - ok");
    }

    #[test]
    fn test_wrap_line_respects_width() {
        let wrapped = wrap_line("alpha beta gamma delta", 11);
        assert_eq!(wrapped, vec!["alpha beta", "gamma delta"]);
        assert!(wrap_line("abcdefghij", 4).iter().all(|l| l.len() <= 4));
        assert_eq!(wrap_line("", 10), vec![""]);
    }

    #[test]
    fn test_long_text_spans_pages() {
        let text = (0..120).map(|i| format!("Line {}", i)).collect::<Vec<_>>().join("\n");
        let bytes = render_text_pdf("Report", &text).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 120usize.div_ceil(LINES_PER_PAGE));
    }
}
