//! Reserved "no value" markers for primitive extraction paths.
//!
//! Long and double extractors avoid an `Option` per document by returning
//! these values instead. They are never folded into an accumulator, so they
//! must not be used as genuine data where a reduction reads them.

/// No long value this round.
pub const NO_LONG: i64 = i64::MIN;

/// No double value this round. Compare with [`is_no_double`], never `==`.
pub const NO_DOUBLE: f64 = f64::NAN;

pub fn is_no_long(value: i64) -> bool {
    value == NO_LONG
}

pub fn is_no_double(value: f64) -> bool {
    value.is_nan()
}

/// Lift a long result into the optional form used by reductions.
pub fn long_to_option(value: i64) -> Option<i64> {
    (!is_no_long(value)).then_some(value)
}

pub fn double_to_option(value: f64) -> Option<f64> {
    (!is_no_double(value)).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_recognised() {
        assert!(is_no_long(NO_LONG));
        assert!(!is_no_long(0));
        assert!(is_no_double(NO_DOUBLE));
        assert!(is_no_double(f64::NAN));
        assert!(!is_no_double(f64::INFINITY));
    }

    #[test]
    fn options_drop_sentinels() {
        assert_eq!(long_to_option(NO_LONG), None);
        assert_eq!(long_to_option(i64::MAX), Some(i64::MAX));
        assert_eq!(double_to_option(NO_DOUBLE), None);
        assert_eq!(double_to_option(-0.5), Some(-0.5));
    }
}
