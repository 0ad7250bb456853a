//! Entry kind and requested operation of a webhook.

/// Header carrying the topic of a webhook, e.g. `ContentManagement.Entry.publish`.
pub const TOPIC_HEADER: &str = "X-Contentful-Topic";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Unknown,
    Page,
    Product,
}

impl EntryKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Unknown => "unknown",
            EntryKind::Page => "page",
            EntryKind::Product => "product",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Unknown,
    Publish,
    Unpublish,
    Delete,
    Archive,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Unknown => "unknown",
            Operation::Publish => "publish",
            Operation::Unpublish => "unpublish",
            Operation::Delete => "delete",
            Operation::Archive => "archive",
        }
    }
}

const TOPICS: &[(&str, Operation)] = &[
    ("ContentManagement.Entry.publish", Operation::Publish),
    ("ContentManagement.Entry.unpublish", Operation::Unpublish),
    ("ContentManagement.Entry.delete", Operation::Delete),
    ("ContentManagement.Entry.archive", Operation::Archive),
];

/// Case-sensitive prefix match on the content type id.
pub fn classify_kind(content_type_id: &str) -> EntryKind {
    if content_type_id.starts_with("page") {
        EntryKind::Page
    } else if content_type_id.starts_with("product") {
        EntryKind::Product
    } else {
        EntryKind::Unknown
    }
}

pub fn classify_operation(topic: &str) -> Operation {
    TOPICS
        .iter()
        .find(|(name, _)| *name == topic)
        .map(|(_, op)| *op)
        .unwrap_or(Operation::Unknown)
}
