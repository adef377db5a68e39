//! Plain-text views of stored threads and citations.

use std::io::{self, Write};

use thread_store::Thread;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

pub const ID_DISPLAY_LEN: usize = 8;
pub const SNIPPET_LEN: usize = 50;
const COLUMN_PADDING: usize = 2;

/// First [`ID_DISPLAY_LEN`] characters of a thread id.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(ID_DISPLAY_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// One-line preview of `text`, cut at [`SNIPPET_LEN`] graphemes.
pub fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut graphemes = flat.graphemes(true);
    let head: String = graphemes.by_ref().take(SNIPPET_LEN).collect();
    if graphemes.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Table of threads that match `filter` on their id or first message.
pub fn write_thread_table<W: Write>(
    out: &mut W,
    threads: &[Thread],
    filter: Option<&str>,
) -> io::Result<()> {
    let filter = filter.filter(|value| !value.is_empty());
    let rows: Vec<(&str, String)> = threads
        .iter()
        .filter_map(|thread| {
            let first = thread.messages.first()?.content.as_str();
            let keep = filter
                .map(|needle| thread.id.contains(needle) || first.contains(needle))
                .unwrap_or(true);
            keep.then(|| (short_id(&thread.id), snippet(first)))
        })
        .collect();

    let header = ("THREAD ID", "FIRST USER MESSAGE");
    let id_width = rows
        .iter()
        .map(|(id, _)| id.width())
        .chain(std::iter::once(header.0.width()))
        .max()
        .unwrap_or(0)
        + COLUMN_PADDING;

    write_row(out, header.0, header.1, id_width)?;
    for (id, preview) in &rows {
        write_row(out, id, preview, id_width)?;
    }
    out.flush()
}

fn write_row<W: Write>(out: &mut W, id: &str, rest: &str, id_width: usize) -> io::Result<()> {
    let pad = id_width.saturating_sub(id.width());
    writeln!(out, "{id}{:pad$}{rest}", "")
}

/// Every message of `thread`, numbered from zero.
pub fn write_thread_detail<W: Write>(out: &mut W, thread: &Thread) -> io::Result<()> {
    writeln!(out, "THREAD: {}\n", short_id(&thread.id))?;
    for (index, message) in thread.messages.iter().enumerate() {
        writeln!(
            out,
            "[{index}] {}:\n{}\n",
            message.role.as_str().to_uppercase(),
            message.content
        )?;
    }
    out.flush()
}

/// Citation footer printed after a streamed reply; nothing when empty.
pub fn write_citations<W: Write>(out: &mut W, citations: &[String]) -> io::Result<()> {
    if citations.is_empty() {
        return Ok(());
    }
    writeln!(out, "\n\nCitations:")?;
    for (index, citation) in citations.iter().enumerate() {
        writeln!(out, "[{}] {citation}", index + 1)?;
    }
    out.flush()
}
