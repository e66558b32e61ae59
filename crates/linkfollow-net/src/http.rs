use linkfollow_core::{DeliveryError, DiscoveryError, EventId, FollowRequest, Mention};
use reqwest::blocking::Client;

use crate::contract::{FollowDelivery, LinkSource, MentionSearch};
use crate::parse::{parse_links, parse_mentions};

const PAGE_SIZE: u32 = 100;

/// Shared client defaults: a request timeout keeps every invocation
/// short-lived, matching the run-to-completion execution model.
pub fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(concat!("linkfollow/", env!("CARGO_PKG_VERSION")))
        .build()
}

fn transport(e: reqwest::Error) -> DiscoveryError {
    DiscoveryError::Transport(e.to_string())
}

/// Bookmark-feed client: `{base}/v2/json/{user}/{tags}?count=100`,
/// tags joined with `+`.
pub struct HttpLinkSource {
    client: Client,
    base_url: String,
}

impl HttpLinkSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl LinkSource for HttpLinkSource {
    fn fetch_tagged_links(&self, user: &str, tags: &[String]) -> Result<Vec<String>, DiscoveryError> {
        let url = format!("{}/v2/json/{}/{}", self.base_url, user, tags.join("+"));
        let body = self
            .client
            .get(&url)
            .query(&[("count", PAGE_SIZE.to_string())])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(transport)?
            .text()
            .map_err(transport)?;
        parse_links(&body)
    }
}

/// Mention-search client: `{base}/search.json` with `q`, `since_id`,
/// `key` and `itemsperpage` parameters. The service returns rows
/// newest-first.
pub struct HttpMentionSearch {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpMentionSearch {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

impl MentionSearch for HttpMentionSearch {
    fn search_mentions(&self, url: &str, since_event_id: EventId) -> Result<Vec<Mention>, DiscoveryError> {
        let endpoint = format!("{}/search.json", self.base_url);
        let body = self
            .client
            .get(&endpoint)
            .query(&[
                ("q", url.to_string()),
                ("since_id", since_event_id.to_string()),
                ("key", self.api_key.clone()),
                ("itemsperpage", PAGE_SIZE.to_string()),
            ])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(transport)?
            .text()
            .map_err(transport)?;
        parse_mentions(&body)
    }
}

/// Follow-endpoint client. The URL template carries an `{actor}`
/// placeholder replaced with the target actor id; authentication is a
/// basic auth header on each POST.
pub struct HttpFollowDelivery {
    client: Client,
    follow_url_template: String,
    user: String,
    password: String,
}

impl HttpFollowDelivery {
    pub fn new(
        client: Client,
        follow_url_template: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client,
            follow_url_template: follow_url_template.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    fn follow_url(&self, request: &FollowRequest) -> String {
        self.follow_url_template
            .replace("{actor}", request.actor_id.as_str())
    }
}

impl FollowDelivery for HttpFollowDelivery {
    fn deliver(&self, request: &FollowRequest) -> Result<(), DeliveryError> {
        let url = self.follow_url(request);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        // server-side and throttling failures are worth another tick;
        // anything else will not get better by retrying
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(DeliveryError::Transport(format!("status {status} from {url}")));
        }
        Err(DeliveryError::Rejected(format!("status {status} from {url}")))
    }
}
