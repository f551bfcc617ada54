/// Parses RFC 4180 style CSV text into rows of cells.
///
/// Quoted fields may contain separators, doubled quotes and line breaks. A
/// leading byte-order mark is dropped and blank lines between records are
/// skipped.
pub fn parse_csv(input: &str) -> Result<Vec<Vec<String>>, String> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut cell_started = false;
    let mut line = 1_usize;
    let mut quote_line = 1_usize;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    cell.push(ch);
                }
                _ => cell.push(ch),
            }
            continue;
        }

        match ch {
            '"' if !cell_started => {
                in_quotes = true;
                cell_started = true;
                quote_line = line;
            }
            ',' => {
                row.push(std::mem::take(&mut cell));
                cell_started = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                finish_row(&mut rows, &mut row, &mut cell, cell_started);
                cell_started = false;
                line += 1;
            }
            // Stray quotes inside an unquoted field are kept literally.
            _ => {
                cell.push(ch);
                cell_started = true;
            }
        }
    }

    if in_quotes {
        return Err(format!("unterminated quoted field starting on line {quote_line}"));
    }

    finish_row(&mut rows, &mut row, &mut cell, cell_started);
    Ok(rows)
}

fn finish_row(
    rows: &mut Vec<Vec<String>>,
    row: &mut Vec<String>,
    cell: &mut String,
    cell_started: bool,
) {
    if row.is_empty() && cell.is_empty() && !cell_started {
        return;
    }
    row.push(std::mem::take(cell));
    rows.push(std::mem::take(row));
}

pub fn format_csv_row<S: AsRef<str>>(cells: &[S]) -> String {
    let mut line = cells
        .iter()
        .map(|cell| escape_csv_cell(cell.as_ref()))
        .collect::<Vec<String>>()
        .join(",");
    line.push('\n');
    line
}

pub fn escape_csv_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
    {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_csv_handles_quoted_separators_and_line_breaks() {
        let raw = "source,translation_bureau\r\n\"Hello, world\",\"Bonjour\nle monde\"\r\n\"He said \"\"hi\"\"\",\n";
        let rows = parse_csv(raw).expect("csv should parse");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["source", "translation_bureau"]);
        assert_eq!(rows[1], vec!["Hello, world", "Bonjour\nle monde"]);
        assert_eq!(rows[2], vec!["He said \"hi\"", ""]);
    }

    #[test]
    fn parse_csv_keeps_trailing_empty_cells_and_skips_blank_lines() {
        let rows = parse_csv("\u{feff}a,b,c\n\nx,,\n").expect("csv should parse");
        assert_eq!(rows, vec![vec!["a", "b", "c"], vec!["x", "", ""]]);
    }

    #[test]
    fn parse_csv_rejects_unterminated_quotes() {
        let err = parse_csv("a,\"open\n").expect_err("unterminated quote should fail");
        assert!(err.contains("unterminated"));
    }

    #[test]
    fn format_csv_row_escapes_only_when_needed() {
        let line = format_csv_row(&["plain", "a,b", "say \"x\"", ""]);
        assert_eq!(line, "plain,\"a,b\",\"say \"\"x\"\"\",\n");

        let parsed = parse_csv(&line).expect("formatted row should parse back");
        assert_eq!(parsed[0], vec!["plain", "a,b", "say \"x\"", ""]);
    }
}
