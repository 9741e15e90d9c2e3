//! Conversation message types exchanged with the analyst API.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Analyst,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Analyst => "analyst",
        }
    }
}

/// One typed piece of message content.
///
/// Unrecognized item types are preserved verbatim in [`ContentItem::Unknown`]
/// so they can be shown rather than dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text { text: String },
    Suggestions { suggestions: Vec<String> },
    Sql { statement: String },
    Error { text: String },
    Unknown(serde_json::Value),
}

/// Wire shape of the known item types.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownItem {
    Text {
        text: String,
    },
    Suggestions {
        suggestions: Vec<String>,
    },
    Sql {
        statement: String,
    },
    Error {
        #[serde(default)]
        text: String,
    },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownItemRef<'a> {
    Text { text: &'a str },
    Suggestions { suggestions: &'a [String] },
    Sql { statement: &'a str },
    Error { text: &'a str },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn sql(statement: impl Into<String>) -> Self {
        Self::Sql {
            statement: statement.into(),
        }
    }

    pub fn suggestions<I, S>(suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Suggestions {
            suggestions: suggestions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }

    /// Classifies a raw JSON item by its `type` tag.
    pub fn from_json(value: serde_json::Value) -> Self {
        match serde_json::from_value::<KnownItem>(value.clone()) {
            Ok(KnownItem::Text { text }) => Self::Text { text },
            Ok(KnownItem::Suggestions { suggestions }) => Self::Suggestions { suggestions },
            Ok(KnownItem::Sql { statement }) => Self::Sql { statement },
            Ok(KnownItem::Error { text }) => Self::Error { text },
            Err(_) => Self::Unknown(value),
        }
    }

    /// The item's `type` tag.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Suggestions { .. } => "suggestions",
            Self::Sql { .. } => "sql",
            Self::Error { .. } => "error",
            Self::Unknown(value) => value
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("<missing>"),
        }
    }
}

impl Serialize for ContentItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text { text } => KnownItemRef::Text { text }.serialize(serializer),
            Self::Suggestions { suggestions } => {
                KnownItemRef::Suggestions { suggestions }.serialize(serializer)
            }
            Self::Sql { statement } => KnownItemRef::Sql { statement }.serialize(serializer),
            Self::Error { text } => KnownItemRef::Error { text }.serialize(serializer),
            Self::Unknown(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(value))
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Message {
    /// A user message holding a single text item.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentItem::text(prompt)],
            request_id: None,
        }
    }

    pub fn analyst(content: Vec<ContentItem>, request_id: impl Into<String>) -> Self {
        Self {
            role: Role::Analyst,
            content,
            request_id: Some(request_id.into()),
        }
    }

    /// An analyst message reporting a failed request.
    pub fn analyst_error(text: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::analyst(vec![ContentItem::error(text)], request_id)
    }

    pub fn is_error(&self) -> bool {
        self.content
            .iter()
            .any(|item| matches!(item, ContentItem::Error { .. }))
    }

    /// Suggestions offered by this message, if any.
    pub fn suggestions(&self) -> Option<&[String]> {
        self.content.iter().find_map(|item| match item {
            ContentItem::Suggestions { suggestions } if !suggestions.is_empty() => {
                Some(suggestions.as_slice())
            }
            _ => None,
        })
    }

    pub fn sql_statements(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|item| match item {
            ContentItem::Sql { statement } => Some(statement.as_str()),
            _ => None,
        })
    }
}
