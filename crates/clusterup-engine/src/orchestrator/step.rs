use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};

/// Workflow steps, in execution order.
///
/// Each step has exactly one successor; any failure ends the run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    Preflight,
    FetchInfra,
    FetchTool,
    EnsureKeys,
    InitValidate,
    Render,
    Apply,
    ExtractOutputs,
    Handoff,
    Summarize,
}

impl Step {
    #[must_use]
    pub const fn first() -> Self {
        Self::Preflight
    }

    /// The step that runs after this one, `None` after [`Step::Summarize`].
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Preflight => Some(Self::FetchInfra),
            Self::FetchInfra => Some(Self::FetchTool),
            Self::FetchTool => Some(Self::EnsureKeys),
            Self::EnsureKeys => Some(Self::InitValidate),
            Self::InitValidate => Some(Self::Render),
            Self::Render => Some(Self::Apply),
            Self::Apply => Some(Self::ExtractOutputs),
            Self::ExtractOutputs => Some(Self::Handoff),
            Self::Handoff => Some(Self::Summarize),
            Self::Summarize => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Completed,
    /// Not applicable to this run (the preflight in a dry run).
    Skipped,
    /// Replaced by a placeholder in a dry run.
    Simulated,
    Failed,
}

/// One entry of the run history.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_next_follows_declaration_order() {
        let declared: Vec<Step> = Step::iter().collect();
        let mut walked = vec![Step::first()];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, declared);
    }

    #[test]
    fn test_step_names() {
        assert_eq!(Step::InitValidate.as_str(), "init_validate");
        assert_eq!(Step::ExtractOutputs.to_string(), "extract_outputs");
        assert_eq!(
            serde_json::to_string(&StepStatus::Simulated).unwrap(),
            "\"simulated\""
        );
    }
}
