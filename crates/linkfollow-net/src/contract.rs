use linkfollow_core::{DeliveryError, DiscoveryError, EventId, FollowRequest, Mention};

/// Source of tracked links: the bookmarking account whose tagged URLs
/// we watch for mentions.
pub trait LinkSource {
    fn fetch_tagged_links(&self, user: &str, tags: &[String]) -> Result<Vec<String>, DiscoveryError>;
}

/// Searches for actors that referenced a URL since a given event id.
/// Results are newest-first: the first row carries the highest event id
/// in the page.
pub trait MentionSearch {
    fn search_mentions(&self, url: &str, since_event_id: EventId) -> Result<Vec<Mention>, DiscoveryError>;
}

/// Issues one follow call against the rate-limited remote API.
pub trait FollowDelivery {
    fn deliver(&self, request: &FollowRequest) -> Result<(), DeliveryError>;
}
