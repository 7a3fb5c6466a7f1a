//! Thought-step types and their display metadata.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Maximum number of characters kept in a step note.
pub const MAX_NOTE_CHARS: usize = 120;

/// Phase of an assistant turn.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepId {
    Understand,
    Plan,
    Retrieve,
    Tool,
    Compose,
    Finalize,
}

/// Display metadata for a step or tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMeta {
    pub icon: &'static str,
    pub label: &'static str,
}

const STEP_META: [(StepId, DisplayMeta); 6] = [
    (StepId::Understand, DisplayMeta { icon: "brain", label: "Understanding your request" }),
    (StepId::Plan, DisplayMeta { icon: "list-checks", label: "Planning the answer" }),
    (StepId::Retrieve, DisplayMeta { icon: "search", label: "Searching for sources" }),
    (StepId::Tool, DisplayMeta { icon: "wrench", label: "Using a tool" }),
    (StepId::Compose, DisplayMeta { icon: "pen-line", label: "Writing the response" }),
    (StepId::Finalize, DisplayMeta { icon: "check", label: "Finishing up" }),
];

impl StepId {
    /// Icon and default label for this step.
    pub fn meta(self) -> DisplayMeta {
        STEP_META[self as usize].1
    }

    pub fn default_label(self) -> &'static str {
        self.meta().label
    }
}

/// Tools a step may be annotated with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
    GithubSearch,
    Canvas,
    Code,
    Browse,
}

const TOOL_META: [(ToolKind, DisplayMeta); 5] = [
    (ToolKind::WebSearch, DisplayMeta { icon: "globe", label: "Searching the web" }),
    (ToolKind::GithubSearch, DisplayMeta { icon: "github", label: "Searching GitHub" }),
    (ToolKind::Canvas, DisplayMeta { icon: "file-pen", label: "Editing the canvas" }),
    (ToolKind::Code, DisplayMeta { icon: "terminal", label: "Running code" }),
    (ToolKind::Browse, DisplayMeta { icon: "compass", label: "Reading a page" }),
];

impl ToolKind {
    pub fn meta(self) -> DisplayMeta {
        TOOL_META[self as usize].1
    }
}

/// Lifecycle status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Active,
    Done,
    Error,
}

/// Short status text attached to a step.
///
/// Notes are collapsed onto a single line and capped at [`MAX_NOTE_CHARS`] so
/// that multi-line model output can never be surfaced through a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepNote(String);

impl StepNote {
    pub fn new(text: &str) -> Self {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= MAX_NOTE_CHARS {
            return Self(collapsed);
        }
        let mut truncated: String = collapsed.chars().take(MAX_NOTE_CHARS - 1).collect();
        truncated.push('…');
        Self(truncated)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepNote {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Optional annotations supplied with `start_step`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMeta {
    pub tool: Option<ToolKind>,
    pub note: Option<StepNote>,
}

impl StepMeta {
    pub fn tool(tool: ToolKind) -> Self {
        Self {
            tool: Some(tool),
            note: None,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(StepNote::new(note));
        self
    }
}

/// One named phase of the assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub id: StepId,
    pub label: String,
    pub status: StepStatus,
    /// Milliseconds since the session clock origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<StepNote>,
}

impl ThoughtStep {
    pub fn pending(id: StepId) -> Self {
        Self {
            id,
            label: id.default_label().to_string(),
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
            tool: None,
            note: None,
        }
    }

    /// Icon for rendering: the tool's icon when annotated, else the step's.
    pub fn icon(&self) -> &'static str {
        match self.tool {
            Some(tool) => tool.meta().icon,
            None => self.id.meta().icon,
        }
    }

    /// Time spent in the step, once it has ended.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }
}

/// Progress UI state for one assistant turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingSessionState {
    pub visible: bool,
    pub can_cancel: bool,
    pub steps: Vec<ThoughtStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_step: Option<StepId>,
}

impl ThinkingSessionState {
    pub fn step(&self, id: StepId) -> Option<&ThoughtStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Label of the tracked active step.
    pub fn headline(&self) -> Option<&str> {
        let id = self.active_step?;
        self.step(id).map(|s| s.label.as_str())
    }
}
