/// Topics the backend should route to this client, in subscription order.
///
/// Kept across disconnects; the backend forgets a dropped client's rooms,
/// so the whole set is re-joined after each successful connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    topics: Vec<String>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the topic was already present
    pub fn insert(&mut self, topic: impl Into<String>) -> bool {
        let topic = topic.into();
        if self.contains(&topic) {
            return false;
        }
        self.topics.push(topic);
        true
    }

    /// Returns `false` if the topic was not present
    pub fn remove(&mut self, topic: &str) -> bool {
        let before = self.topics.len();
        self.topics.retain(|t| t != topic);
        self.topics.len() != before
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.topics.clone()
    }
}
