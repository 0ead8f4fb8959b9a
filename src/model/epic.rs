//! Epics: the schedulable units of work.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::Allocation;

/// Case-insensitive comparison key for epic and resource names.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Stable index of an epic inside its backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpicId(pub usize);

/// Priority tier used to resolve contention. Ordered `Normal < High < Urgent`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Parses a priority label. Anything that isn't `urgent` or `high` is `Normal`.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "urgent" => Self::Urgent,
            "high" => Self::High,
            _ => Self::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }
}

/// Workflow state of an epic, classified once from the tracker's free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EpicState {
    InDevelopment,
    PendingDevelopment,
    InAnalysis,
    PendingAnalysis,
    Other,
}

impl EpicState {
    /// Classifies raw state text.
    ///
    /// `develop` wins over `analysis`; `pending` turns either into its
    /// pending variant. A bare `pending` is treated as pending analysis.
    pub fn classify(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        let pending = text.contains("pending");
        if text.contains("develop") {
            if pending {
                Self::PendingDevelopment
            } else {
                Self::InDevelopment
            }
        } else if text.contains("analysis") {
            if pending {
                Self::PendingAnalysis
            } else {
                Self::InAnalysis
            }
        } else if pending {
            Self::PendingAnalysis
        } else {
            Self::Other
        }
    }

    pub fn is_in_development(self) -> bool {
        self == Self::InDevelopment
    }

    /// Whether the epic may draw capacity in the second, non-development pass.
    pub fn is_analysis_or_pending(self) -> bool {
        matches!(
            self,
            Self::PendingDevelopment | Self::InAnalysis | Self::PendingAnalysis
        )
    }
}

/// A resource's desired share of its own development capacity for one epic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wish {
    pub resource: String,
    /// In `(0, 1]`.
    pub percentage: f64,
}

/// A dependency edge, resolved when the backlog is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "camelCase")]
pub enum Dependency {
    /// Another epic of the same backlog.
    Epic(EpicId),

    /// A name that matched no epic. Never completes, so it blocks forever.
    Unresolved(String),
}

/// A large work item with a total and remaining hour budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub id: EpicId,
    pub name: String,
    /// Lower-cased tracker state, kept for display.
    pub state_text: String,
    pub state: EpicState,
    /// Original total hours.
    pub charge: f64,
    /// Hours still to allocate. Starts at `charge`, never increases, floored at zero.
    pub remaining: f64,
    pub priority: Priority,
    /// No development capacity before this date.
    pub end_analysis: Option<Date>,
    pub dependencies: Vec<Dependency>,
    pub wishes: Vec<Wish>,
    pub group: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub history: Vec<Allocation>,
}

impl Epic {
    /// Creates an epic with nothing allocated yet.
    ///
    /// A non-positive charge makes the epic pre-completed: `remaining` is zero
    /// and it never enters a scheduling pool.
    pub fn new(id: EpicId, name: &str, state_text: &str, charge: f64) -> Self {
        let state_text = state_text.trim().to_lowercase();
        Self {
            id,
            name: name.trim().to_string(),
            state: EpicState::classify(&state_text),
            state_text,
            charge,
            remaining: charge.max(0.0),
            priority: Priority::Normal,
            end_analysis: None,
            dependencies: Vec::new(),
            wishes: Vec::new(),
            group: None,
            start_date: None,
            end_date: None,
            history: Vec::new(),
        }
    }

    pub fn is_pre_completed(&self) -> bool {
        self.charge <= 0.0
    }

    /// Case-insensitive name equality.
    pub fn is_named(&self, name: &str) -> bool {
        name_key(&self.name) == name_key(name)
    }

    /// Returns the wish this epic holds on a resource, if any.
    pub fn wish_for(&self, resource: &str) -> Option<&Wish> {
        let key = name_key(resource);
        self.wishes.iter().find(|w| name_key(&w.resource) == key)
    }

    /// Sum of the hours recorded in `history`.
    pub fn allocated_hours(&self) -> f64 {
        self.history.iter().map(|a| a.hours).sum()
    }
}
