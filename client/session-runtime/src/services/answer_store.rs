/// Shown in an untouched coding slot.
pub const CODE_PLACEHOLDER: &str = "# Write your solution here\n";

/// Per-position answers. `None` marks a slot the candidate never edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerStore {
    code: Vec<Option<String>>,
    text: Vec<Option<String>>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Matches both slot arrays to `total`; the common prefix is kept as is.
    pub fn resize(&mut self, total: usize) {
        self.code.resize(total, None);
        self.text.resize(total, None);
    }

    pub fn code_at(&self, index: usize) -> &str {
        self.code
            .get(index)
            .and_then(|slot| slot.as_deref())
            .unwrap_or(CODE_PLACEHOLDER)
    }

    pub fn text_at(&self, index: usize) -> &str {
        self.text
            .get(index)
            .and_then(|slot| slot.as_deref())
            .unwrap_or("")
    }

    /// Code as submitted: an untouched slot is an empty answer, not the
    /// placeholder.
    pub fn submitted_code(&self, index: usize) -> &str {
        self.code
            .get(index)
            .and_then(|slot| slot.as_deref())
            .unwrap_or("")
    }

    pub fn set_code(&mut self, index: usize, value: impl Into<String>) -> bool {
        write_slot(&mut self.code, index, value.into())
    }

    pub fn set_text(&mut self, index: usize, value: impl Into<String>) -> bool {
        write_slot(&mut self.text, index, value.into())
    }
}

fn write_slot(slots: &mut [Option<String>], index: usize, value: String) -> bool {
    match slots.get_mut(index) {
        Some(slot) => {
            *slot = Some(value);
            true
        }
        None => {
            tracing::warn!(
                "Ignoring answer for index {} outside of {} slots",
                index,
                slots.len()
            );
            false
        }
    }
}
