//! Number and byte-size formatting for counter values.

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Format an integer with thousands separators (e.g. "1,234,567").
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a byte count in mebibytes below one gibibyte, gibibytes above.
///
/// Returns None for zero or negative counts, which the tracker uses for
/// "not reported".
pub fn format_bytes(n: i64) -> Option<String> {
    if n <= 0 {
        return None;
    }
    let n = n as f64;
    if n < GIB {
        Some(format!("{}M", format_decimal(n / MIB)))
    } else {
        Some(format!("{}G", format_decimal(n / GIB)))
    }
}

/// One decimal place with a thousands-separated integer part.
fn format_decimal(value: f64) -> String {
    let tenths = (value * 10.0).round() as i64;
    format!("{}.{}", format_number(tenths / 10), tenths % 10)
}
