use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use linkfollow_core::Mention;
use linkfollow_net::{LinkSource, MentionSearch};
use linkfollow_store::CheckpointStore;
use tracing::{debug, info};

/// One discovery run: walk every tracked link, collect mentions newer
/// than the checkpoint's lower bound, and advance the checkpoint once
/// everything has been scanned.
///
/// `on_new_actor` fires once per actor id not yet seen this run (this
/// is where `follow` enqueues); the returned list is the sorted,
/// case-folded set of actor names observed. A transport error anywhere
/// aborts before the checkpoint moves, so no event is ever skipped.
pub fn run(
    links: &dyn LinkSource,
    search: &dyn MentionSearch,
    checkpoint: &CheckpointStore,
    user: &str,
    tags: &[String],
    mut on_new_actor: impl FnMut(&Mention, &str) -> Result<()>,
) -> Result<Vec<String>> {
    let cp = checkpoint.load()?;
    let urls = links.fetch_tagged_links(user, tags)?;
    debug!(tracked = urls.len(), since = cp.previous, "scanning tracked links");

    let mut names: BTreeSet<String> = BTreeSet::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut max_event = cp.current;

    for url in &urls {
        for mention in search.search_mentions(url, cp.previous)? {
            max_event = max_event.max(mention.event_id);
            names.insert(mention.actor_name.to_lowercase());
            if seen_ids.insert(mention.actor_id.as_str().to_string()) {
                on_new_actor(&mention, url)?;
            }
        }
    }

    let next = checkpoint.advance(max_event)?;
    info!(
        discovered = names.len(),
        current = next.current,
        "discovery run complete"
    );
    Ok(names.into_iter().collect())
}
