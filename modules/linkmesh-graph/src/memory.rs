use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use uuid::Uuid;

use crate::{Edge, EdgeStream, Graph, GraphError, Link, LinkStream};

/// In-memory link graph. Nodes and edges are flat relations guarded by a
/// single read-write lock; no pointer graph is ever materialized, so cycles
/// in the link structure are a non-issue.
#[derive(Default)]
pub struct InMemoryGraph {
    inner: RwLock<GraphData>,
}

#[derive(Default)]
struct GraphData {
    links: HashMap<Uuid, Link>,
    edges: HashMap<Uuid, Edge>,

    /// Secondary index: URL → link id.
    link_url_index: HashMap<String, Uuid>,
    /// Secondary index: source link id → ids of its outgoing edges.
    link_edge_map: HashMap<Uuid, Vec<Uuid>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Graph for InMemoryGraph {
    async fn upsert_link(&self, mut link: Link) -> Result<Link, GraphError> {
        let mut data = self.inner.write().expect("graph lock poisoned");

        // URL collision: this becomes an update of the existing link and the
        // caller gets the existing id. Retrieved-at never regresses.
        let collision = data.link_url_index.get(&link.url).copied();
        if let Some(existing_id) = collision {
            let existing = data
                .links
                .get_mut(&existing_id)
                .expect("url index points at a missing link");
            existing.retrieved_at = existing.retrieved_at.max(link.retrieved_at);
            return Ok(existing.clone());
        }

        loop {
            link.id = Uuid::new_v4();
            if !data.links.contains_key(&link.id) {
                break;
            }
        }

        data.link_url_index.insert(link.url.clone(), link.id);
        data.links.insert(link.id, link.clone());
        Ok(link)
    }

    async fn upsert_edge(&self, mut edge: Edge) -> Result<Edge, GraphError> {
        let mut data = self.inner.write().expect("graph lock poisoned");

        if !data.links.contains_key(&edge.src) || !data.links.contains_key(&edge.dst) {
            return Err(GraphError::UnknownEndpoints);
        }

        // Refresh an existing (src, dst) pair, preserving its id.
        let outgoing = data.link_edge_map.get(&edge.src).cloned().unwrap_or_default();
        for edge_id in outgoing {
            let existing = data.edges.get_mut(&edge_id).expect("edge map out of sync");
            if existing.dst == edge.dst {
                existing.updated_at = Utc::now();
                return Ok(existing.clone());
            }
        }

        loop {
            edge.id = Uuid::new_v4();
            if !data.edges.contains_key(&edge.id) {
                break;
            }
        }
        edge.updated_at = Utc::now();

        data.link_edge_map.entry(edge.src).or_default().push(edge.id);
        data.edges.insert(edge.id, edge.clone());
        Ok(edge)
    }

    async fn remove_stale_edges(
        &self,
        from: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<(), GraphError> {
        let mut data = self.inner.write().expect("graph lock poisoned");

        let Some(outgoing) = data.link_edge_map.remove(&from) else {
            return Ok(());
        };

        let mut kept = Vec::with_capacity(outgoing.len());
        for edge_id in outgoing {
            let stale = data
                .edges
                .get(&edge_id)
                .map(|edge| edge.updated_at < updated_before)
                .unwrap_or(true);
            if stale {
                data.edges.remove(&edge_id);
            } else {
                kept.push(edge_id);
            }
        }

        if !kept.is_empty() {
            data.link_edge_map.insert(from, kept);
        }
        Ok(())
    }

    async fn find_link(&self, id: Uuid) -> Result<Link, GraphError> {
        let data = self.inner.read().expect("graph lock poisoned");
        data.links.get(&id).cloned().ok_or(GraphError::NotFound)
    }

    async fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkStream, GraphError> {
        let data = self.inner.read().expect("graph lock poisoned");
        let mut matches: Vec<Link> = data
            .links
            .values()
            .filter(|link| link.id >= from && link.id <= to)
            .filter(|link| match link.retrieved_at {
                None => true,
                Some(at) => at < retrieved_before,
            })
            .cloned()
            .collect();
        matches.sort_by_key(|link| link.id);

        Ok(Box::pin(stream::iter(matches.into_iter().map(Ok))))
    }

    async fn edges(
        &self,
        from: Uuid,
        to: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeStream, GraphError> {
        let data = self.inner.read().expect("graph lock poisoned");
        let mut matches: Vec<Edge> = data
            .edges
            .values()
            .filter(|edge| edge.src >= from && edge.src <= to)
            .filter(|edge| edge.updated_at < updated_before)
            .cloned()
            .collect();
        matches.sort_by_key(|edge| edge.id);

        Ok(Box::pin(stream::iter(matches.into_iter().map(Ok))))
    }
}
