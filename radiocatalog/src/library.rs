//! Browse tree for media browsers
//!
//! The stream list is projected into a two-level hierarchy:
//!
//! ```text
//! [rootId]
//! ├── [favoritesId]   (only when at least one favorite exists)
//! │   └── favorite stations, catalog order
//! └── [stationsId]
//!     └── every station, catalog order
//! ```
//!
//! A [`Tree`] is an immutable value built from one successful snapshot;
//! [`StreamLibrary`] rebuilds it from the latest snapshot on demand.

use crate::config_ext::{CatalogConfigExt, DEFAULT_FAVORITES_TAB, DEFAULT_STATIONS_TAB};
use crate::error::{Error, Result};
use crate::media::MediaItem;
use crate::models::{Stream, Streams};
use crate::repository::StreamRepository;
use rand::seq::SliceRandom;
use radioconfig::Config;
use tokio::sync::watch;

pub const ROOT_ID: &str = "[rootId]";
pub const STATIONS_ID: &str = "[stationsId]";
pub const FAVORITES_ID: &str = "[favoritesId]";
pub const RECENT_ID: &str = "[recentId]";

#[derive(Debug, Clone, PartialEq)]
pub struct MediaNode {
    pub item: MediaItem,
    pub children: Vec<MediaNode>,
}

impl MediaNode {
    fn leaf(item: MediaItem) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }
}

/// Display names of the two tabs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabLabels {
    pub favorites: String,
    pub stations: String,
}

impl Default for TabLabels {
    fn default() -> Self {
        Self {
            favorites: DEFAULT_FAVORITES_TAB.to_string(),
            stations: DEFAULT_STATIONS_TAB.to_string(),
        }
    }
}

impl TabLabels {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            favorites: config.get_favorites_tab_label()?,
            stations: config.get_stations_tab_label()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    root: MediaNode,
}

impl Tree {
    pub fn build(streams: &[Stream], labels: &TabLabels) -> Self {
        let mut tabs = Vec::with_capacity(2);

        let favorites: Vec<MediaNode> = streams
            .iter()
            .filter(|s| s.is_favorite)
            .map(|s| MediaNode::leaf(MediaItem::from_stream(s)))
            .collect();
        if !favorites.is_empty() {
            tabs.push(MediaNode {
                item: MediaItem::browsable(FAVORITES_ID, Some(labels.favorites.clone())),
                children: favorites,
            });
        }

        tabs.push(MediaNode {
            item: MediaItem::browsable(STATIONS_ID, Some(labels.stations.clone())),
            children: streams
                .iter()
                .map(|s| MediaNode::leaf(MediaItem::from_stream(s)))
                .collect(),
        });

        Self {
            root: MediaNode {
                item: MediaItem::browsable(ROOT_ID, None),
                children: tabs,
            },
        }
    }

    pub fn root(&self) -> &MediaItem {
        &self.root.item
    }

    /// Folder offered to media browsers asking for recent content
    pub fn recent_root(&self) -> MediaItem {
        MediaItem::browsable(RECENT_ID, None)
    }

    /// Items directly under `node_id` (the root or one of the tabs)
    pub fn children(&self, node_id: &str) -> Result<Vec<MediaItem>> {
        if self.root.item.media_id == node_id {
            return Ok(self.root.children.iter().map(|c| c.item.clone()).collect());
        }
        self.root
            .children
            .iter()
            .find(|tab| tab.item.media_id == node_id)
            .map(|tab| tab.children.iter().map(|c| c.item.clone()).collect())
            .ok_or_else(|| Error::unknown_node(node_id))
    }

    /// Looks a playable item up in any tab
    pub fn item(&self, item_id: &str) -> Result<MediaItem> {
        self.root
            .children
            .iter()
            .flat_map(|tab| tab.children.iter())
            .find(|leaf| leaf.item.media_id == item_id)
            .map(|leaf| leaf.item.clone())
            .ok_or_else(|| Error::unknown_node(item_id))
    }

    fn stations(&self) -> &[MediaNode] {
        self.root
            .children
            .iter()
            .find(|tab| tab.item.media_id == STATIONS_ID)
            .map(|tab| tab.children.as_slice())
            .unwrap_or_default()
    }

    /// Every station, catalog order
    pub fn all_playable_items(&self) -> Vec<MediaItem> {
        self.stations().iter().map(|n| n.item.clone()).collect()
    }

    pub fn last_played(&self, last_played_id: &str) -> Result<MediaItem> {
        self.stations()
            .iter()
            .find(|n| n.item.media_id == last_played_id)
            .map(|n| n.item.clone())
            .ok_or_else(|| Error::unknown_node(last_played_id))
    }

    /// Stations with `last_played_id` moved to the front
    ///
    /// The other items keep their relative order.
    pub fn recent_children(&self, last_played_id: Option<&str>) -> Vec<MediaItem> {
        let mut items = self.all_playable_items();
        if let Some(id) = last_played_id {
            if let Some(pos) = items.iter().position(|i| i.media_id == id) {
                let item = items.remove(pos);
                items.insert(0, item);
            }
        }
        items
    }

    /// Case-insensitive match on the station name
    ///
    /// A blank query returns every station in random order.
    pub fn search(&self, query: Option<&str>) -> Vec<MediaItem> {
        let mut results = self.all_playable_items();
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            None => {
                results.shuffle(&mut rand::rng());
                results
            }
            Some(q) => {
                let needle = q.to_lowercase();
                results.retain(|item| {
                    item.station_name()
                        .map(|name| name.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                });
                results
            }
        }
    }

    /// One page of [`Tree::search`]; pages start at 0
    pub fn search_page(&self, query: Option<&str>, page: usize, page_size: usize) -> Vec<MediaItem> {
        if page_size == 0 {
            return Vec::new();
        }
        self.search(query)
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect()
    }
}

/// Builds [`Tree`]s from the repository's snapshots
#[derive(Clone)]
pub struct StreamLibrary {
    streams: watch::Receiver<Streams>,
    labels: TabLabels,
}

impl StreamLibrary {
    pub fn new(repository: &StreamRepository, labels: TabLabels) -> Self {
        Self {
            streams: repository.streams(),
            labels,
        }
    }

    pub fn from_config(repository: &StreamRepository, config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(repository, TabLabels::from_config(config)?))
    }

    /// Tree of the current snapshot, if it is a successful one
    pub fn tree(&self) -> Option<Tree> {
        self.streams
            .borrow()
            .as_success()
            .map(|streams| Tree::build(streams, &self.labels))
    }

    /// Waits for a successful snapshot
    pub async fn await_tree(&self) -> Result<Tree> {
        let mut rx = self.streams.clone();
        let streams = rx
            .wait_for(|s| matches!(s, Streams::Success(_)))
            .await
            .map_err(|_| Error::NotLoaded)?;
        Ok(Tree::build(streams.as_success().unwrap_or_default(), &self.labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streams() -> Vec<Stream> {
        vec![
            Stream::new("1", "u1", "Radio Alpha", "i1"),
            Stream::new("2", "u2", "Beta FM", "i2").with_favorite(true),
            Stream::new("3", "u3", "alpha jazz", "i3"),
        ]
    }

    fn ids(items: &[MediaItem]) -> Vec<&str> {
        items.iter().map(|i| i.media_id.as_str()).collect()
    }

    #[test]
    fn test_root_has_favorites_tab_only_with_favorites() {
        let tree = Tree::build(&streams(), &TabLabels::default());
        assert_eq!(ids(&tree.children(ROOT_ID).unwrap()), vec![FAVORITES_ID, STATIONS_ID]);

        let no_favorites: Vec<Stream> = streams()
            .into_iter()
            .map(|s| s.with_favorite(false))
            .collect();
        let tree = Tree::build(&no_favorites, &TabLabels::default());
        assert_eq!(ids(&tree.children(ROOT_ID).unwrap()), vec![STATIONS_ID]);
        assert!(matches!(tree.children(FAVORITES_ID), Err(Error::UnknownNode(_))));
    }

    #[test]
    fn test_tab_children_follow_catalog_order() {
        let tree = Tree::build(&streams(), &TabLabels::default());
        assert_eq!(ids(&tree.children(STATIONS_ID).unwrap()), vec!["1", "2", "3"]);
        assert_eq!(ids(&tree.children(FAVORITES_ID).unwrap()), vec!["2"]);

        let tabs = tree.children(ROOT_ID).unwrap();
        assert_eq!(tabs[0].metadata.title.as_deref(), Some("Favorites"));
        assert!(tabs[0].metadata.is_browsable);
    }

    #[test]
    fn test_unknown_ids() {
        let tree = Tree::build(&streams(), &TabLabels::default());
        assert!(matches!(tree.children("nope"), Err(Error::UnknownNode(id)) if id == "nope"));
        assert!(tree.item("nope").is_err());
        assert!(tree.last_played("nope").is_err());
    }

    #[test]
    fn test_item_lookup() {
        let tree = Tree::build(&streams(), &TabLabels::default());
        let item = tree.item("3").unwrap();
        assert_eq!(item.uri.as_deref(), Some("u3"));
        assert_eq!(tree.last_played("2").unwrap().media_id, "2");
    }

    #[test]
    fn test_recent_children_is_stable_move_to_front() {
        let tree = Tree::build(&streams(), &TabLabels::default());
        assert_eq!(ids(&tree.recent_children(Some("3"))), vec!["3", "1", "2"]);
        assert_eq!(ids(&tree.recent_children(Some("1"))), vec!["1", "2", "3"]);
        assert_eq!(ids(&tree.recent_children(None)), vec!["1", "2", "3"]);
        assert_eq!(ids(&tree.recent_children(Some("x"))), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_search() {
        let tree = Tree::build(&streams(), &TabLabels::default());
        assert_eq!(ids(&tree.search(Some("ALPHA"))), vec!["1", "3"]);
        assert!(tree.search(Some("gamma")).is_empty());

        let mut all = ids(&tree.search(Some("   "))).into_iter().map(String::from).collect::<Vec<_>>();
        all.sort();
        assert_eq!(all, vec!["1", "2", "3"]);
        assert_eq!(tree.search(None).len(), 3);
    }

    #[test]
    fn test_search_pages() {
        let tree = Tree::build(&streams(), &TabLabels::default());
        assert_eq!(ids(&tree.search_page(Some("a"), 0, 2)), vec!["1", "2"]);
        assert_eq!(ids(&tree.search_page(Some("a"), 1, 2)), vec!["3"]);
        assert!(tree.search_page(Some("a"), 5, 2).is_empty());
        assert!(tree.search_page(Some("a"), 0, 0).is_empty());
    }

    #[test]
    fn test_library_follows_snapshots() {
        let (tx, rx) = watch::channel(Streams::Loading);
        let library = StreamLibrary {
            streams: rx,
            labels: TabLabels::default(),
        };
        assert!(library.tree().is_none());

        let mut waiter = tokio_test::task::spawn(library.await_tree());
        tokio_test::assert_pending!(waiter.poll());

        tx.send_replace(Streams::Success(streams()));
        assert!(waiter.is_woken());
        let tree = tokio_test::assert_ready_ok!(waiter.poll());
        assert_eq!(tree.all_playable_items().len(), 3);
        assert!(library.tree().is_some());
    }
}
