//! Plain ASCII table rendering for `probe` and `targets` output.

use std::fmt::Write as _;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(sanitize(cell).chars().count());
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (idx, cell) in cells.iter().enumerate().take(widths.len()) {
        if idx > 0 {
            line.push_str("  ");
        }
        let sanitized = sanitize(cell);
        line.push_str(&sanitized);
        let padding = widths[idx].saturating_sub(sanitized.chars().count());
        line.push_str(&" ".repeat(padding));
    }
    line.truncate(line.trim_end().len());
    line
}

fn sanitize(cell: &str) -> String {
    cell.chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_pads_columns_and_underlines_headers() {
        let headers = vec!["name".to_string(), "required".to_string()];
        let rows = vec![
            vec!["address".to_string(), "yes".to_string()],
            vec!["postcode".to_string(), "no".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "name      required");
        assert_eq!(lines[1], "--------  --------");
        assert_eq!(lines[2], "address   yes");
    }

    #[test]
    fn embedded_newlines_are_flattened() {
        let headers = vec!["v".to_string()];
        let rows = vec![vec!["a\nb".to_string()]];
        assert!(render_table(&headers, &rows).lines().nth(2) == Some("a b"));
    }
}
