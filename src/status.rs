use std::fmt;

/// Normalized build verdict used to drive the indicator.
///
/// Derived fresh from the remote run on every tick and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalStatus {
    Succeeded,
    Failed,
    PartiallySucceeded,
    InProgress,
    Canceled,
    Unknown,
    OffDuty,
}

impl CanonicalStatus {
    #[cfg(test)]
    pub const ALL: [CanonicalStatus; 7] = [
        CanonicalStatus::Succeeded,
        CanonicalStatus::Failed,
        CanonicalStatus::PartiallySucceeded,
        CanonicalStatus::InProgress,
        CanonicalStatus::Canceled,
        CanonicalStatus::Unknown,
        CanonicalStatus::OffDuty,
    ];

    /// Parses a status label, accepting the synonyms Azure DevOps and older
    /// tooling emit (`running`, `cancelled`, `partially succeeded`).
    ///
    /// Matching ignores case and surrounding whitespace. Anything not
    /// recognized is `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "partiallysucceeded" | "partially succeeded" => Self::PartiallySucceeded,
            "inprogress" | "running" => Self::InProgress,
            "canceled" | "cancelled" => Self::Canceled,
            "offduty" => Self::OffDuty,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::PartiallySucceeded => "partiallySucceeded",
            Self::InProgress => "inProgress",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
            Self::OffDuty => "offDuty",
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapses a run's raw `state` and `result` into a single status label.
///
/// - no state: `unknown`
/// - `inProgress`: `inProgress`, whatever the result says
/// - `completed`: the lowercased result, or `unknown` when there is none
/// - anything else: the lowercased state
///
/// The label keeps values outside the canonical set (e.g. `notstarted`)
/// so they can be reported verbatim.
pub fn overall_status(state: Option<&str>, result: Option<&str>) -> String {
    let Some(state) = state.map(str::trim) else {
        return "unknown".to_string();
    };

    if state.eq_ignore_ascii_case("inProgress") {
        return "inProgress".to_string();
    }

    if state.eq_ignore_ascii_case("completed") {
        return result
            .map(|r| r.trim().to_lowercase())
            .unwrap_or_else(|| "unknown".to_string());
    }

    state.to_lowercase()
}

/// Normalizes a run's `state` and `result` into a [`CanonicalStatus`].
pub fn normalize(state: Option<&str>, result: Option<&str>) -> CanonicalStatus {
    CanonicalStatus::parse(&overall_status(state, result))
}
