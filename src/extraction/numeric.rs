use regex::Regex;
use std::sync::OnceLock;

/// Optional sign, digits, optional fraction, optional exponent.
const NUMBER_PATTERN: &str = r"[-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?";

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NUMBER_PATTERN).expect("number pattern is valid"))
}

/// Return the first decimal number in `text`, parsed with `.` as the decimal separator.
pub fn first_number(text: &str) -> Option<f64> {
    let token = number_regex().find(text)?;
    token
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
