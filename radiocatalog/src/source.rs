//! Catalog sources
//!
//! A [`StreamCatalog`] produces the raw stream list. The radio variant reads
//! it over HTTP ([`crate::HttpStreamCatalog`]), the ambient variant ships a
//! fixed list ([`StaticStreamCatalog`]).

use crate::error::Result;
use crate::models::{Stream, StreamResponse};
use async_trait::async_trait;

#[async_trait]
pub trait StreamCatalog: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Whether fetching goes over the network (and needs connectivity)
    fn requires_network(&self) -> bool {
        true
    }

    /// Fetches the catalog, flags cleared
    async fn fetch_streams(&self) -> Result<Vec<Stream>>;
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticStreamCatalog {
    entries: Vec<StreamResponse>,
}

impl StaticStreamCatalog {
    pub fn new(entries: Vec<StreamResponse>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StreamCatalog for StaticStreamCatalog {
    fn name(&self) -> &str {
        "static"
    }

    fn requires_network(&self) -> bool {
        false
    }

    async fn fetch_streams(&self) -> Result<Vec<Stream>> {
        Ok(self
            .entries
            .iter()
            .cloned()
            .map(StreamResponse::into_stream)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_catalog_keeps_order() {
        let catalog = StaticStreamCatalog::new(vec![
            StreamResponse {
                id: "0".into(),
                name: "Rain".into(),
                url: "u0".into(),
                image: "rain".into(),
            },
            StreamResponse {
                id: "1".into(),
                name: "Ocean".into(),
                url: "u1".into(),
                image: "ocean".into(),
            },
        ]);

        assert!(!catalog.requires_network());
        let streams = catalog.fetch_streams().await.unwrap();
        let ids: Vec<_> = streams.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1"]);
    }
}
