//! Parsing of model output into action items.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// "[name]:" assignee marker, shortest name first.
static ASSIGNEE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.*?)\]:").unwrap());

/// One display-ready action item line, e.g.
/// `@*[Alice]*: Finish report (deadline: 2024-01-01)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ActionItem(String);

impl ActionItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ActionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ActionItem {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extract action items from a model response.
///
/// Only lines starting with `-` are items. The first `[name]:` in an item is
/// rewritten to the emphasized mention form `@*[name]*:`.
pub fn parse_action_items(response: &str) -> Vec<ActionItem> {
    response
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('-'))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| ActionItem(emphasize_assignee(item)))
        .collect()
}

fn emphasize_assignee(item: &str) -> String {
    ASSIGNEE_PATTERN
        .replacen(item, 1, "@*[${1}]*:")
        .into_owned()
}
