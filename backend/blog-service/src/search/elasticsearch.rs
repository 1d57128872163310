use super::{PostDocument, SearchError, SearchIndex};
use crate::models::PostId;
use elasticsearch::{
    auth::Credentials,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsAliasParts, IndicesExistsParts, IndicesPutAliasParts},
    params::Refresh,
    DeleteParts, Elasticsearch, GetParts, IndexParts, SearchParts, UpdateParts,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

/// Writes return once the change is visible to search; search pages are
/// evicted from the cache only after that.
const WRITE_REFRESH: Refresh = Refresh::WaitFor;

/// Connection settings for the post index
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Concrete index that holds the documents
    pub index: String,
    /// Alias used for every read and write
    pub alias: String,
}

#[derive(Clone)]
pub struct ElasticsearchIndex {
    client: Elasticsearch,
    index: String,
    alias: String,
}

impl ElasticsearchIndex {
    /// Build the client and make sure the index and its alias exist
    pub async fn connect(config: &ElasticsearchConfig) -> Result<Self, SearchError> {
        let parsed = Url::parse(&config.url)?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let mut builder = TransportBuilder::new(pool);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.auth(Credentials::Basic(username.clone(), password.clone()));
        }
        let transport = builder.build()?;

        let instance = Self {
            client: Elasticsearch::new(transport),
            index: config.index.clone(),
            alias: config.alias.clone(),
        };

        instance.ensure_index().await?;

        Ok(instance)
    }

    async fn ensure_index(&self) -> Result<(), SearchError> {
        let exists_response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index.as_str()]))
            .send()
            .await?;

        if !exists_response.status_code().is_success() {
            let response = self
                .client
                .indices()
                .create(IndicesCreateParts::Index(&self.index))
                .body(index_definition())
                .send()
                .await?;
            ensure_success(response).await?;
            info!(index = %self.index, "Created post search index");
        }

        let alias_response = self
            .client
            .indices()
            .exists_alias(IndicesExistsAliasParts::Name(&[self.alias.as_str()]))
            .send()
            .await?;

        if !alias_response.status_code().is_success() {
            let response = self
                .client
                .indices()
                .put_alias(IndicesPutAliasParts::IndexName(
                    &[self.index.as_str()],
                    &self.alias,
                ))
                .send()
                .await?;
            ensure_success(response).await?;
            info!(index = %self.index, alias = %self.alias, "Created post search alias");
        }

        Ok(())
    }
}

fn index_definition() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "long" },
                "title": { "type": "text", "analyzer": "english" },
                "short_desc": { "type": "text", "analyzer": "english" },
                "content": { "type": "text", "analyzer": "english" },
                "created_at": { "type": "date" }
            }
        }
    })
}

/// Ranked phrase match; title matches weigh double
pub(crate) fn search_body(query: &str, from: i64, size: i64) -> Value {
    json!({
        "from": from,
        "size": size,
        "query": {
            "multi_match": {
                "query": query,
                "fields": ["title^2", "short_desc", "content"],
                "type": "phrase"
            }
        },
        "sort": [
            { "_score": { "order": "desc" }},
            { "created_at": { "order": "desc" }}
        ]
    })
}

async fn ensure_success(response: Response) -> Result<Response, SearchError> {
    let status = response.status_code();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SearchError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait::async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn index(&self, doc: &PostDocument) -> Result<(), SearchError> {
        let response = self
            .client
            .index(IndexParts::IndexId(&self.alias, doc.id.to_string().as_str()))
            .refresh(WRITE_REFRESH)
            .body(doc)
            .send()
            .await?;
        ensure_success(response).await?;

        debug!(post_id = doc.id, "Indexed post document");
        Ok(())
    }

    async fn update(&self, doc: &PostDocument) -> Result<(), SearchError> {
        let response = self
            .client
            .update(UpdateParts::IndexId(&self.alias, doc.id.to_string().as_str()))
            .refresh(WRITE_REFRESH)
            .body(json!({ "doc": doc, "doc_as_upsert": true }))
            .send()
            .await?;
        ensure_success(response).await?;

        debug!(post_id = doc.id, "Updated post document");
        Ok(())
    }

    async fn delete(&self, id: PostId) -> Result<(), SearchError> {
        let response = self
            .client
            .delete(DeleteParts::IndexId(&self.alias, id.to_string().as_str()))
            .refresh(WRITE_REFRESH)
            .send()
            .await?;

        if response.status_code().as_u16() == 404 {
            debug!(post_id = id, "Post document already absent");
            return Ok(());
        }
        ensure_success(response).await?;

        debug!(post_id = id, "Deleted post document");
        Ok(())
    }

    async fn get_by_id(&self, id: PostId) -> Result<Option<PostDocument>, SearchError> {
        let response = self
            .client
            .get(GetParts::IndexId(&self.alias, id.to_string().as_str()))
            .send()
            .await?;

        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }
        let response = ensure_success(response).await?;

        let body: GetResponse = response.json().await?;
        Ok(if body.found { body.source } else { None })
    }

    async fn search(
        &self,
        query: &str,
        from: i64,
        size: i64,
    ) -> Result<Vec<PostDocument>, SearchError> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.alias.as_str()]))
            .body(search_body(query, from, size))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let search_response: SearchResponse = response.json().await?;
        let docs: Vec<PostDocument> = search_response
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| hit.source)
            .collect();

        debug!(query = %query, count = docs.len(), "Search index query");
        Ok(docs)
    }

    async fn ping(&self) -> Result<(), SearchError> {
        let response = self.client.ping().send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<PostDocument>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: InnerHits,
}

#[derive(Debug, Deserialize)]
struct InnerHits {
    hits: Vec<PostHit>,
}

#[derive(Debug, Deserialize)]
struct PostHit {
    #[serde(rename = "_source")]
    source: Option<PostDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_uses_weighted_phrase_match() {
        let body = search_body("borrow checker", 20, 10);

        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 10);
        assert_eq!(body["query"]["multi_match"]["type"], "phrase");
        assert_eq!(
            body["query"]["multi_match"]["fields"],
            json!(["title^2", "short_desc", "content"])
        );
    }

    #[test]
    fn test_writes_wait_for_refresh() {
        assert_eq!(WRITE_REFRESH, Refresh::WaitFor);
        assert_eq!(serde_json::to_value(WRITE_REFRESH).unwrap(), json!("wait_for"));
    }

    #[test]
    fn test_search_response_parsing_skips_missing_sources() {
        let raw = json!({
            "hits": {
                "hits": [
                    { "_id": "1", "_source": {
                        "id": 1,
                        "title": "t",
                        "short_desc": "s",
                        "content": "c",
                        "created_at": "2024-05-01T10:00:00Z"
                    }},
                    { "_id": "2" }
                ]
            }
        });

        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        let docs: Vec<PostDocument> = parsed
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| hit.source)
            .collect();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, 1);
    }

    #[test]
    fn test_get_response_not_found() {
        let parsed: GetResponse =
            serde_json::from_value(json!({ "_id": "9", "found": false })).unwrap();
        assert!(!parsed.found);
        assert!(parsed.source.is_none());
    }
}
