//! Department name/alias → code table.

/// Alias → department code. Aliases are matched case-insensitively.
pub const DEPARTMENT_CODES: &[(&str, &str)] = &[
    ("Computer Science", "CS"),
    ("Computer Science and Engineering", "CS"),
    ("CSE", "CS"),
    ("CS", "CS"),
    ("Electronics", "EC"),
    ("Electronics and Electrical Communication Engineering", "EC"),
    ("ECE", "EC"),
    ("E&ECE", "EC"),
    ("EC", "EC"),
    ("Electrical", "EE"),
    ("Electrical Engineering", "EE"),
    ("EE", "EE"),
    ("Mechanical", "ME"),
    ("Mechanical Engineering", "ME"),
    ("ME", "ME"),
    ("Chemical", "CH"),
    ("Chemical Engineering", "CH"),
    ("CH", "CH"),
    ("Civil", "CE"),
    ("Civil Engineering", "CE"),
    ("CE", "CE"),
    ("Mathematics", "MA"),
    ("Maths", "MA"),
    ("Math", "MA"),
    ("MA", "MA"),
    ("Physics", "PH"),
    ("PH", "PH"),
    ("Chemistry", "CY"),
    ("CY", "CY"),
    ("Metallurgical", "MT"),
    ("Metallurgical and Materials Engineering", "MT"),
    ("Materials", "MT"),
    ("MT", "MT"),
    ("Aerospace", "AE"),
    ("Aerospace Engineering", "AE"),
    ("AE", "AE"),
    ("Industrial", "IM"),
    ("Industrial and Systems Engineering", "IM"),
    ("IM", "IM"),
    ("Architecture", "AR"),
    ("Architecture and Regional Planning", "AR"),
    ("AR", "AR"),
];

/// Canonical display names, one per code.
const CODE_NAMES: &[(&str, &str)] = &[
    ("CS", "Computer Science and Engineering"),
    ("EC", "Electronics and Electrical Communication Engineering"),
    ("EE", "Electrical Engineering"),
    ("ME", "Mechanical Engineering"),
    ("CH", "Chemical Engineering"),
    ("CE", "Civil Engineering"),
    ("MA", "Mathematics"),
    ("PH", "Physics"),
    ("CY", "Chemistry"),
    ("MT", "Metallurgical and Materials Engineering"),
    ("AE", "Aerospace Engineering"),
    ("IM", "Industrial and Systems Engineering"),
    ("AR", "Architecture and Regional Planning"),
];

/// Resolve a department name, alias or code to its code.
pub fn department_code(name: &str) -> Option<&'static str> {
    let name = name.trim();
    DEPARTMENT_CODES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

/// Display name for a department code.
pub fn department_name(code: &str) -> Option<&'static str> {
    CODE_NAMES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
        .map(|(_, name)| *name)
}

/// Whether a record's department value belongs to `scope`.
///
/// Both sides are resolved through the alias table; unknown values fall back
/// to a case-insensitive comparison.
pub fn matches_scope(department: &str, scope: &str) -> bool {
    match (department_code(department), department_code(scope)) {
        (Some(a), Some(b)) => a == b,
        _ => department.trim().eq_ignore_ascii_case(scope.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_case_insensitively() {
        assert_eq!(department_code("cse"), Some("CS"));
        assert_eq!(department_code(" Computer Science "), Some("CS"));
        assert_eq!(department_code("E&ECE"), Some("EC"));
        assert_eq!(department_code("maths"), Some("MA"));
        assert_eq!(department_code("Astrology"), None);
    }

    #[test]
    fn every_code_has_a_name() {
        for (_, code) in DEPARTMENT_CODES {
            assert!(department_name(code).is_some(), "missing name for {code}");
        }
    }

    #[test]
    fn scope_matching_uses_aliases() {
        assert!(matches_scope("Computer Science and Engineering", "CS"));
        assert!(matches_scope("CS", "cse"));
        assert!(!matches_scope("EE", "CS"));
        assert!(matches_scope("Humanities", "humanities"));
    }
}
