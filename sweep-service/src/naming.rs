// Case Naming and Numeric Formatting
// Deterministic, sortable names shared by generation and discovery, so either
// side can re-derive them without consulting the other.

use crate::matrix::ParameterCombination;

/// Format a numeric parameter value for names, headers, and substituted
/// assignments. Integers render as plain decimal; floats render plain unless
/// the magnitude calls for normalized scientific notation (`5e-5`, no leading
/// zero in the exponent).
pub fn format_value(v: f64) -> String {
    if v != 0.0 && (v.abs() >= 1e4 || v.abs() < 1e-3) {
        format!("{:e}", v)
    } else if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Short case name for a combination: first two characters of each parameter
/// name plus its formatted value, decimal points flattened to underscores,
/// underscore-joined in iteration order. A pure function of the (name, value)
/// pairs.
pub fn case_name(combination: &ParameterCombination) -> String {
    combination
        .iter()
        .map(|(name, value)| {
            let prefix: String = name.chars().take(2).collect();
            format!("{}{}", prefix, format_value(value).replace('.', "_"))
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Directory name for a case: zero-padded index plus the short name, so
/// lexicographic listings stay numerically ordered up to 999 cases.
pub fn case_dir_name(index: usize, name: &str) -> String {
    format!("case_{:03}_{}", index, name)
}

/// Extract the numeric case index embedded in a directory name. Returns the
/// first contiguous digit run, which also covers legacy layouts that did not
/// use the `case_NNN_` prefix.
pub fn parse_case_index(dir_name: &str) -> Option<usize> {
    let start = dir_name.find(|c: char| c.is_ascii_digit())?;
    let digits: String = dir_name[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_integers() {
        assert_eq!(format_value(123.0), "123");
        assert_eq!(format_value(8.0), "8");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(-3.0), "-3");
    }

    #[test]
    fn test_format_scientific() {
        assert_eq!(format_value(5e-5), "5e-5");
        assert_eq!(format_value(10e-5), "1e-4");
        assert_eq!(format_value(15000.0), "1.5e4");
        assert_eq!(format_value(1e4), "1e4");
    }

    #[test]
    fn test_format_boundary_below_millis() {
        // |v| < 1e-3 renders scientific.
        assert_eq!(format_value(0.0005), "5e-4");
        // |v| >= 1e-3 stays plain.
        assert_eq!(format_value(0.001), "0.001");
        assert_eq!(format_value(0.05), "0.05");
    }

    #[test]
    fn test_case_name_is_pure() {
        let a = ParameterCombination::new(vec![
            ("Gf".to_string(), 8.0),
            ("length_scale_paramete".to_string(), 5e-5),
        ]);
        let b = a.clone();
        assert_eq!(case_name(&a), case_name(&b));
        assert_eq!(case_name(&a), "Gf8_le5e-5");

        let c = ParameterCombination::new(vec![
            ("Gf".to_string(), 10.0),
            ("length_scale_paramete".to_string(), 5e-5),
        ]);
        assert_ne!(case_name(&a), case_name(&c));
    }

    #[test]
    fn test_case_name_flattens_decimal_point() {
        let combo = ParameterCombination::new(vec![("power_factor_mod".to_string(), 1.5)]);
        assert_eq!(case_name(&combo), "po1_5");
    }

    #[test]
    fn test_case_dir_name_zero_padded() {
        assert_eq!(case_dir_name(2, "Gf8"), "case_002_Gf8");
        assert_eq!(case_dir_name(123, "Gf8"), "case_123_Gf8");
    }

    #[test]
    fn test_parse_case_index() {
        assert_eq!(parse_case_index("case_002_Gf8_le5e-5"), Some(2));
        assert_eq!(parse_case_index("case_010_x"), Some(10));
        // Legacy layouts without the standard prefix.
        assert_eq!(parse_case_index("study12_Gf8"), Some(12));
        assert_eq!(parse_case_index("no_digits_here"), None);
    }

    #[test]
    fn test_numeric_ordering_beats_lexicographic() {
        let mut names = vec!["case_10_b", "case_2_a"];
        names.sort_by_key(|n| parse_case_index(n).unwrap());
        assert_eq!(names, vec!["case_2_a", "case_10_b"]);
    }
}
