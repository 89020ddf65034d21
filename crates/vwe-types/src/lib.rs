use std::str::FromStr;

/// Errors that can occur when creating validated value types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input was not a recognised billing status value
    #[error("Unknown billing status '{0}' (expected unpaid, paid or waived)")]
    UnknownBillingStatus(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
/// It is used wherever the engine requires a value to actually carry content — patient
/// references, actor identities, clinical note fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Settlement state of a visit's bill.
///
/// The billing officer records this on the visit before closing it out; only a `Paid`
/// bill allows the visit to complete. `Waived` covers write-offs and charity cases and
/// is deliberately *not* sufficient to complete a visit — a waiver is settled through
/// the same explicit `Paid` marking once the write-off is approved.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingStatus {
    Unpaid,
    Paid,
    Waived,
}

impl BillingStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Waived => "waived",
        }
    }
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingStatus {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            "waived" => Ok(Self::Waived),
            other => Err(TextError::UnknownBillingStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_accepts() {
        let t = NonEmptyText::new("  BP 120/80  ").unwrap();
        assert_eq!(t.as_str(), "BP 120/80");
    }

    #[test]
    fn non_empty_text_rejects_whitespace_only() {
        assert!(matches!(NonEmptyText::new(" \t\n"), Err(TextError::Empty)));
    }

    #[test]
    fn billing_status_serialises_lowercase() {
        let s = serde_json::to_string(&BillingStatus::Paid).unwrap();
        assert_eq!(s, "\"paid\"");
    }

    #[test]
    fn billing_status_parses_case_insensitively() {
        assert_eq!("Paid".parse::<BillingStatus>().unwrap(), BillingStatus::Paid);
        assert_eq!(
            "unpaid".parse::<BillingStatus>().unwrap(),
            BillingStatus::Unpaid
        );
        assert!(matches!(
            "settled".parse::<BillingStatus>(),
            Err(TextError::UnknownBillingStatus(_))
        ));
    }
}
