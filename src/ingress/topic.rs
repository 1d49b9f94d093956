/// The `<namespace>/<category>/<device_id>` topic shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSchema {
    pub namespace: String,
    pub category: String,
}

impl TopicSchema {
    pub fn new(namespace: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            category: category.into(),
        }
    }

    /// Returns the device id when `topic` has exactly three segments, the
    /// first two matching this schema and the third non-empty.
    pub fn device_id<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let mut segments = topic.split('/');
        match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(ns), Some(cat), Some(id), None)
                if ns == self.namespace && cat == self.category && !id.is_empty() =>
            {
                Some(id)
            }
            _ => None,
        }
    }
}
