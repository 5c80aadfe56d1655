//! Minimal CSV record encoding (RFC 4180 quoting, CRLF terminated).

const LINE_TERMINATOR: &str = "\r\n";

fn needs_quoting(field: &str) -> bool {
    field.contains([',', '"', '\r', '\n'])
}

pub fn encode_field(field: &str) -> String {
    if needs_quoting(field) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One complete line, terminator included.
pub fn encode_record<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| encode_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str(LINE_TERMINATOR);
    line
}
