use unicode_width::UnicodeWidthStr;

/// Widest a table column may grow before its cells are truncated.
pub(crate) const MAX_COLUMN_WIDTH: usize = 28;

/// Display width of a string; accented species names and CJK stay aligned.
pub(crate) fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate a string to fit within `width` display columns, adding ".." if truncated.
pub(crate) fn truncate_display(s: &str, width: usize) -> String {
    if width < 3 {
        return s
            .chars()
            .find(|ch| unicode_width::UnicodeWidthChar::width(*ch).unwrap_or(0) <= width)
            .map(|ch| ch.to_string())
            .unwrap_or_default();
    }

    if display_width(s) <= width {
        return s.to_string();
    }

    let budget = width - 2;
    let mut used = 0;
    let mut end_byte = 0;
    for (i, ch) in s.char_indices() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > budget {
            end_byte = i;
            break;
        }
        used += cw;
        end_byte = i + ch.len_utf8();
    }

    format!("{}..", &s[..end_byte])
}

/// Pad or truncate a string to exactly `width` display columns.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let sw = display_width(s);
    if sw > width {
        truncate_display(s, width)
    } else {
        format!("{}{}", s, " ".repeat(width - sw))
    }
}

/// Render rows as an aligned plain-text table with a header line.
pub(crate) fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(display_width(cell)).min(MAX_COLUMN_WIDTH);
            }
        }
    }

    let render = |cells: Vec<&str>| -> String {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad_right(cell, *w))
            .collect();
        line.join("  ").trim_end().to_string()
    };

    let mut out = render(headers.to_vec());
    out.push('\n');
    for row in rows {
        out.push_str(&render(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}
