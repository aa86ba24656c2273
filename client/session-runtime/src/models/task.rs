use serde::{Deserialize, Deserializer, Serialize};

/// Session record as returned by the interview backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub coding_tasks: Vec<TaskRecord>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub theory_tasks: Vec<TaskRecord>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub samples: Vec<Sample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacancy: Option<String>,
}

impl TaskRecord {
    pub fn with_level(level: &str, statement: &str) -> Self {
        Self {
            level: Some(level.to_string()),
            statement: Some(statement.to_string()),
            ..Self::default()
        }
    }

    /// Prompt text: the first non-empty of statement, question and description.
    pub fn prompt(&self) -> &str {
        [&self.statement, &self.question, &self.description]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .find(|text| !text.is_empty())
            .unwrap_or("")
    }

    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Coding,
    Theory,
}

/// One position of the normalized catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub kind: TaskKind,
    pub record: TaskRecord,
}

impl Task {
    pub fn is_text(&self) -> bool {
        self.kind == TaskKind::Theory
    }

    pub fn title(&self) -> &str {
        self.record
            .statement
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.record.question.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("Task")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodingLevel {
    Easy,
    Medium,
    Hard,
}

impl CodingLevel {
    /// Case-insensitive; anything outside easy/medium/hard is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TheoryLevel {
    Easy,
    Hard,
}

impl TheoryLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}
