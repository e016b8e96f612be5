use super::Metric;

/// Format a metric value the way statements report it.
pub fn format_value(metric: Metric, value: f64) -> String {
    if metric.is_count() {
        format_count(value)
    } else {
        format_float(value)
    }
}

/// Five decimal places, with a value that rounds to zero written as `0.0`.
pub fn format_float(value: f64) -> String {
    let formatted = format!("{value:.5}");
    match formatted.as_str() {
        "0.00000" | "-0.00000" => "0.0".to_string(),
        _ => formatted,
    }
}

/// A whole number with `,` thousands separators.
pub fn format_count(value: f64) -> String {
    let rounded = value.round_ties_even();
    let digits = format!("{:.0}", rounded.abs());

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
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
