pub mod contract;
pub mod http;
pub mod parse;

pub use contract::{FollowDelivery, LinkSource, MentionSearch};
pub use http::{build_client, HttpFollowDelivery, HttpLinkSource, HttpMentionSearch};
