use terminal_size::{terminal_size, Height, Width};

/// A titled ASCII table. Cells are plain strings; numeric-looking cells are right aligned.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(title: S, columns: &[&str]) -> Self {
        Table { title: title.into(), columns: columns.iter().map(|c| c.to_string()).collect(), rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<String>) { self.rows.push(row); }

    /// Render to lines no wider than `termw` visible characters.
    pub fn render(&self, termw: usize, color_header: bool) -> Vec<String> {
        let mut widths: Vec<usize> = self.columns.iter().map(|s| visible_len(s).min(termw)).collect();
        for r in &self.rows {
            for (i, cell) in r.iter().enumerate().take(self.columns.len()) {
                let w = visible_len(cell);
                if w > widths[i] { widths[i] = w.min(termw); }
            }
        }

        let mut out = Vec::with_capacity(self.rows.len() + 5);
        out.push(fit_line_to_width(&format!("{}:", self.title), termw));
        let sep = build_separator(&widths);
        out.push(fit_line_to_width(&sep, termw));
        out.push(fit_line_to_width(&build_header(&self.columns, &widths, color_header), termw));
        out.push(fit_line_to_width(&sep, termw));
        for r in &self.rows {
            out.push(fit_line_to_width(&build_row(r, &widths), termw));
        }
        out.push(fit_line_to_width(&sep, termw));
        out
    }
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let text = truncate(&cell, *w);
        let pad = " ".repeat(w.saturating_sub(visible_len(&text)));
        s.push(' ');
        if is_numeric_like(&cell) {
            s.push_str(&pad);
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&pad);
        }
        s.push_str(" |");
    }
    s
}

// Header cells are left aligned, optionally green.
fn build_header(cells: &[String], widths: &[usize], color: bool) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).cloned().unwrap_or_default();
        let text = truncate(&cell, *w);
        s.push(' ');
        if color {
            s.push_str(&format!("\x1b[32m{}\x1b[0m", text));
        } else {
            s.push_str(&text);
        }
        s.push_str(&" ".repeat(w.saturating_sub(visible_len(&text))));
        s.push_str(" |");
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

// Counts in either locale ("1.234", "1,234") and shares ("50%") align right.
fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    if st.is_empty() { return false; }
    let mut has_digit = false;
    for ch in st.chars() {
        if ch.is_ascii_digit() { has_digit = true; continue; }
        if ".,-+%".contains(ch) { continue; }
        return false;
    }
    has_digit
}

pub fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), Height(_))) if w > 4 => (w - 4) as usize,
        _ => 80,
    }
}

fn fit_line_to_width(s: &str, maxw: usize) -> String {
    if visible_len(s) <= maxw { return s.to_string(); }
    let stripped = strip_ansi(s);
    truncate(&stripped, maxw)
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            // skip CSI: ESC [ ... letter
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() { break; }
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

fn visible_len(s: &str) -> usize { strip_ansi(s).chars().count() }
