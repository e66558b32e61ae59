use linkfollow_core::{ActorId, DiscoveryError, Mention};
use serde::Deserialize;

#[derive(Deserialize)]
struct LinkRow {
    u: String,
}

#[derive(Deserialize)]
struct SearchBody {
    tweets: Vec<MentionRow>,
}

#[derive(Deserialize)]
struct MentionRow {
    tweet_from_user: String,
    tweet_from_user_id: serde_json::Value,
    tweet_id: u64,
}

/// The link source returns an array of bookmark rows; only the `u`
/// (URL) field matters here.
pub fn parse_links(body: &str) -> Result<Vec<String>, DiscoveryError> {
    let rows: Vec<LinkRow> =
        serde_json::from_str(body).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;
    Ok(rows.into_iter().map(|r| r.u).collect())
}

/// The search body wraps mention rows under `tweets`, ordered
/// newest-first. Actor ids arrive as either numbers or strings
/// depending on the API revision; both are normalized to strings.
pub fn parse_mentions(body: &str) -> Result<Vec<Mention>, DiscoveryError> {
    let parsed: SearchBody =
        serde_json::from_str(body).map_err(|e| DiscoveryError::Malformed(e.to_string()))?;
    Ok(parsed
        .tweets
        .into_iter()
        .map(|r| Mention {
            actor_id: ActorId::from_str(scalar_to_string(&r.tweet_from_user_id)),
            actor_name: r.tweet_from_user,
            event_id: r.tweet_id,
        })
        .collect())
}

fn scalar_to_string(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
