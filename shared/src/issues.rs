//! Issue catalog. A ticket's `issue_type` must be one of the types listed
//! under its `issue_on` category.

pub const CATALOG: &[(&str, &[&str])] = &[
    (
        "POS",
        &[
            "Hang / Freeze",
            "Cannot Print Receipt",
            "Login Problem",
            "Transaction Error",
            "Software Update",
        ],
    ),
    (
        "Dispenser",
        &[
            "Not Dispensing",
            "Meter Error",
            "Nozzle Leak",
            "Display Fault",
            "Communication Error",
        ],
    ),
    (
        "EDC",
        &["Card Reader Fault", "Settlement Failure", "Connection Error"],
    ),
    (
        "Network",
        &[
            "Internet Down",
            "Slow Connection",
            "VPN Problem",
            "Router / Switch Fault",
        ],
    ),
    ("CCTV", &["Camera Offline", "Recorder Fault", "Storage Full"]),
    ("Other", &["Other"]),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueError {
    #[error("Unknown issue category '{0}'. Must be one of: {1}")]
    UnknownCategory(String, String),
    #[error("Issue type '{0}' is not valid for {1}. Must be one of: {2}")]
    UnknownType(String, String, String),
}

pub fn categories() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(on, _)| *on)
}

/// Validates an `issue_on`/`issue_type` pair, ignoring case and surrounding
/// whitespace, and returns the canonical spelling of both.
pub fn validate_issue(
    issue_on: &str,
    issue_type: &str,
) -> Result<(&'static str, &'static str), IssueError> {
    let (on, types) = CATALOG
        .iter()
        .find(|(on, _)| on.eq_ignore_ascii_case(issue_on.trim()))
        .ok_or_else(|| {
            IssueError::UnknownCategory(
                issue_on.trim().to_string(),
                categories().collect::<Vec<_>>().join(", "),
            )
        })?;

    let ty = types
        .iter()
        .find(|t| t.eq_ignore_ascii_case(issue_type.trim()))
        .ok_or_else(|| {
            IssueError::UnknownType(issue_type.trim().to_string(), on.to_string(), types.join(", "))
        })?;

    Ok((*on, *ty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_valid_pairs() {
        assert_eq!(
            validate_issue(" pos ", "login problem").unwrap(),
            ("POS", "Login Problem")
        );
        assert_eq!(
            validate_issue("Dispenser", "Nozzle Leak").unwrap(),
            ("Dispenser", "Nozzle Leak")
        );
    }

    #[test]
    fn rejects_type_from_another_category() {
        let err = validate_issue("Network", "Nozzle Leak").unwrap_err();
        match err {
            IssueError::UnknownType(ty, on, allowed) => {
                assert_eq!(ty, "Nozzle Leak");
                assert_eq!(on, "Network");
                assert!(allowed.contains("Internet Down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(matches!(
            validate_issue("Coffee Machine", "Other"),
            Err(IssueError::UnknownCategory(_, _))
        ));
    }

    #[test]
    fn every_category_has_types() {
        assert!(CATALOG.iter().all(|(_, types)| !types.is_empty()));
    }
}
