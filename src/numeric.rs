//! Numeric coercion of attribute text.
//!
//! Source metadata sometimes carries trailing unit or type suffixes
//! (Fortran-style `"0.0D"`), so only the longest numeric prefix is used.
use regex::Regex;
use std::sync::OnceLock;

fn float_prefix() -> &'static Regex {
    static FLOAT: OnceLock<Regex> = OnceLock::new();
    FLOAT.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][+-]?\d+)?")
            .expect("regex for float prefix")
    })
}

fn int_prefix() -> &'static Regex {
    static INT: OnceLock<Regex> = OnceLock::new();
    INT.get_or_init(|| Regex::new(r"^[+-]?\d+").expect("regex for int prefix"))
}

/// Parse the longest signed float prefix of `text`.
pub fn coerce_float(text: &str) -> Option<f64> {
    let found = float_prefix().find(text.trim_start())?;
    found.as_str().parse().ok()
}

/// Parse the longest signed integer prefix of `text`.
pub fn coerce_int(text: &str) -> Option<i64> {
    let found = int_prefix().find(text.trim_start())?;
    found.as_str().parse().ok()
}
