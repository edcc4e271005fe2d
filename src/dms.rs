/// Parse a `±D:M:S` coordinate into decimal degrees.
///
/// The sign comes from the degrees component only. Minutes and seconds are
/// magnitudes; a negative one is treated as malformed.
pub fn parse_dms(text: Option<&str>) -> Option<f64> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }

    let normalized = text.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() != 3 {
        return None;
    }

    let degrees = parse_component(parts[0])?;
    let minutes = parse_component(parts[1])?;
    let seconds = parse_component(parts[2])?;
    if minutes < 0.0 || seconds < 0.0 {
        return None;
    }

    let decimal = degrees.abs() + minutes / 60.0 + seconds / 3600.0;
    let signed = if degrees < 0.0 { -decimal } else { decimal };

    signed.is_finite().then_some(signed)
}

fn parse_component(part: &str) -> Option<f64> {
    part.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("expected a coordinate");
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_missing_and_blank_inputs() {
        assert_eq!(parse_dms(None), None);
        assert_eq!(parse_dms(Some("")), None);
        assert_eq!(parse_dms(Some("   ")), None);
    }

    #[test]
    fn test_negative_degrees_negate_whole_value() {
        assert_close(parse_dms(Some("-7:12:30")), -7.2083);
        assert_close(parse_dms(Some("-35:0:0")), -35.0);
    }

    #[test]
    fn test_decimal_comma() {
        assert_close(parse_dms(Some("7,5:0:0")), 7.5);
        assert_close(parse_dms(Some("-36:52:29,64")), -36.874_9);
    }

    #[test]
    fn test_negative_zero_degrees_is_not_negative() {
        assert_eq!(parse_dms(Some("-0:30:0")), Some(0.5));
        assert_eq!(parse_dms(Some("0:30:0")), Some(0.5));
    }

    #[test]
    fn test_whitespace_around_components() {
        assert_close(parse_dms(Some(" -7 : 12 : 30 ")), -7.2083);
    }

    #[test]
    fn test_malformed_values() {
        assert_eq!(parse_dms(Some("garbage")), None);
        assert_eq!(parse_dms(Some("1:2")), None);
        assert_eq!(parse_dms(Some("1:2:3:4")), None);
        assert_eq!(parse_dms(Some("1:x:3")), None);
        assert_eq!(parse_dms(Some("-7.12")), None);
        assert_eq!(parse_dms(Some("::")), None);
    }

    #[test]
    fn test_negative_minutes_or_seconds_are_rejected() {
        assert_eq!(parse_dms(Some("7:-12:30")), None);
        assert_eq!(parse_dms(Some("7:12:-30")), None);
    }

    #[test]
    fn test_non_finite_components_are_rejected() {
        assert_eq!(parse_dms(Some("inf:0:0")), None);
        assert_eq!(parse_dms(Some("NaN:0:0")), None);
        assert_eq!(parse_dms(Some("1.79e308:6e307:0")), None);
    }
}
