use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use super::mapping::{SORT_FIELD, TREE_FIELD, index_definition};
use super::{DocumentStore, SearchHits, SearchQuery, StoreError};
use crate::config::StoreConfig;
use crate::node::FsNode;
use crate::node::identity::{DocId, index_key, key_to_path};

/// Elasticsearch-backed document store, spoken to over its REST API.
pub struct ElasticStore {
    client: Client,
    base: Url,
    index: String,
    page_size: usize,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<FsNode>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    total: TotalHits,
    hits: Vec<Hit>,
}

/// 6.x reports a bare number, 7.x and later an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Count(n) => *n,
            TotalHits::Object { value } => *value,
        }
    }
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: FsNode,
}

impl ElasticStore {
    /// Connect to the cluster and make sure the index exists, creating it with
    /// the path-hierarchy mapping when missing.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let base = Url::parse(&config.url).map_err(|_| StoreError::InvalidUrl(config.url.clone()))?;
        let store = Self {
            client: Client::new(),
            base,
            index: config.index.clone(),
            page_size: config.page_size,
        };
        store.ensure_index().await?;
        Ok(store)
    }

    async fn ensure_index(&self) -> Result<(), StoreError> {
        let url = self.url(&[])?;
        let resp = self.client.head(url.clone()).send().await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let resp = self.client.put(url).json(&index_definition()).send().await?;
                expect_success(resp).await?;
                tracing::info!(index = %self.index, "created index");
                Ok(())
            }
            _ => Err(rejected(resp).await),
        }
    }

    /// `<base>/<index>/<segments...>`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty().push(&self.index).extend(segments);
        }
        Ok(url)
    }

    fn doc_url(&self, id: &DocId) -> Result<Url, StoreError> {
        self.url(&["_doc", id.as_str()])
    }
}

#[async_trait]
impl DocumentStore for ElasticStore {
    async fn save(&self, id: &DocId, node: &FsNode) -> Result<(), StoreError> {
        let resp = self.client.put(self.doc_url(id)?).json(node).send().await?;
        expect_success(resp).await?;
        tracing::debug!(id = %id, index = %self.index, "indexed node");
        Ok(())
    }

    async fn delete(&self, id: &DocId) -> Result<bool, StoreError> {
        let resp = self.client.delete(self.doc_url(id)?).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(rejected(resp).await),
        }
    }

    async fn get(&self, id: &DocId) -> Result<Option<FsNode>, StoreError> {
        let resp = self.client.get(self.doc_url(id)?).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = expect_success(resp).await?.bytes().await?;
        let doc: GetResponse = serde_json::from_slice(&bytes)?;
        Ok(if doc.found { doc.source } else { None })
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchHits, StoreError> {
        let body = search_body(query, self.page_size);
        let resp = self
            .client
            .post(self.url(&["_search"])?)
            .json(&body)
            .send()
            .await?;
        let bytes = expect_success(resp).await?.bytes().await?;
        parse_search(&bytes)
    }
}

/// Request body for a listing, sorted by raw path.
fn search_body(query: &SearchQuery, page_size: usize) -> Value {
    let query = match query {
        SearchQuery::All => json!({ "match_all": {} }),
        SearchQuery::Subtree(prefix) => {
            let key = index_key(prefix);
            if key.is_empty() {
                json!({ "match_all": {} })
            } else {
                json!({ "term": { TREE_FIELD: key_to_path(&key) } })
            }
        }
    };
    json!({
        "query": query,
        "sort": [{ SORT_FIELD: { "order": "asc" } }],
        "size": page_size,
        "track_total_hits": true,
    })
}

fn parse_search(bytes: &[u8]) -> Result<SearchHits, StoreError> {
    let resp: SearchResponse = serde_json::from_slice(bytes)?;
    Ok(SearchHits {
        total: resp.hits.total.value(),
        nodes: resp.hits.hits.into_iter().map(|h| h.source).collect(),
    })
}

async fn expect_success(resp: Response) -> Result<Response, StoreError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(rejected(resp).await)
    }
}

async fn rejected(resp: Response) -> StoreError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    StoreError::Rejected { status, body }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_subtree_body_uses_term_on_tree_field() {
        let body = search_body(&SearchQuery::Subtree("/a/b/".into()), 500);
        assert_eq!(body["query"]["term"][TREE_FIELD], "/a/b");
        assert_eq!(body["sort"][0][SORT_FIELD]["order"], "asc");
        assert_eq!(body["size"], 500);
    }

    #[test]
    fn test_root_subtree_matches_all() {
        let body = search_body(&SearchQuery::Subtree("/".into()), 10);
        assert!(body["query"]["match_all"].is_object());
    }

    #[test]
    fn test_parse_search_both_total_shapes() {
        let v7 = br#"{"hits":{"total":{"value":2,"relation":"eq"},"hits":[
            {"_id":"dir_/a","_source":{"name":"a","fullPath":"/a","isDir":true,"isWatchFolder":true}},
            {"_id":"file_/a/x","_source":{"name":"x","fullPath":"/a/x","isDir":false,"isWatchFolder":false}}
        ]}}"#;
        let hits = parse_search(v7).unwrap();
        assert_eq!(hits.total, 2);
        assert_eq!(hits.nodes[1].full_path, "/a/x");

        let v6 = br#"{"hits":{"total":7,"hits":[]}}"#;
        assert_eq!(parse_search(v6).unwrap().total, 7);
    }

    #[test]
    fn test_doc_url_encodes_path_id() {
        let store = ElasticStore {
            client: Client::new(),
            base: Url::parse("http://localhost:9200").unwrap(),
            index: "tl-watch".into(),
            page_size: 10,
        };
        let url = store.doc_url(&crate::node::identity::identify("/w/a b.pdf", false)).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/tl-watch/_doc/file_%2Fw%2Fa%20b.pdf"
        );
    }

    /// Minimal stand-in for the cluster: the index answers `index_status` on
    /// HEAD, creation and writes are recorded, writes answer `write_status`.
    async fn fake_cluster(
        index_status: StatusCode,
        write_status: StatusCode,
    ) -> (String, Arc<AtomicUsize>) {
        use axum::http::StatusCode as AxumStatus;
        use axum::routing::{get, put};

        let created = Arc::new(AtomicUsize::new(0));
        let index_status = AxumStatus::from_u16(index_status.as_u16()).unwrap();
        let write_status = AxumStatus::from_u16(write_status.as_u16()).unwrap();
        let counter = created.clone();
        let app = axum::Router::new()
            .route(
                "/tl-watch",
                get(move || async move { index_status }).put(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        AxumStatus::OK
                    }
                }),
            )
            .route(
                "/tl-watch/_doc/{id}",
                put(move || async move { (write_status, "document id is too long") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), created)
    }

    fn config(url: String) -> StoreConfig {
        StoreConfig {
            url,
            index: "tl-watch".into(),
            ..StoreConfig::default()
        }
    }

    #[tokio::test]
    async fn test_connect_creates_missing_index() {
        let (url, created) = fake_cluster(StatusCode::NOT_FOUND, StatusCode::OK).await;
        ElasticStore::connect(&config(url)).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_keeps_existing_index() {
        let (url, created) = fake_cluster(StatusCode::OK, StatusCode::OK).await;
        ElasticStore::connect(&config(url)).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_write_is_permanent() {
        let (url, _) = fake_cluster(StatusCode::OK, StatusCode::BAD_REQUEST).await;
        let store = ElasticStore::connect(&config(url)).await.unwrap();
        let node = FsNode::new("/w/deep", false, "/w");

        let err = store.save(&node.id(), &node).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 400, .. }));
        assert!(err.is_permanent());
    }
}
