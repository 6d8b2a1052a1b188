use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{StoreError, StoreResult},
    models::{Article, ArticleInput, ArticlePatch},
    storage::{DocumentState, OrderBy, next_update_time},
};

/// ArticleStore Trait
///
/// The single contract every news backend implements. Handlers and the admin UI only
/// ever see `Arc<dyn ArticleStore>`, so the persisted and demo backends are
/// interchangeable at configuration time.
///
/// Each instance keeps an ArticleCollection cache ordered newest first. `list()`
/// returns a snapshot of it; the two derived views filter the cache without a fetch.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Returns every known article, newest first.
    async fn list(&self) -> StoreResult<Vec<Article>>;

    /// Validates and stores a new article, returning its assigned id.
    async fn create(&self, input: ArticleInput) -> StoreResult<String>;

    /// Overwrites the supplied fields of an existing article and advances `updated_at`.
    async fn update(&self, patch: ArticlePatch) -> StoreResult<()>;

    /// Hard-deletes an article. A second delete of the same id is `NotFound`.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// The current cache without fetching.
    async fn cached(&self) -> Vec<Article>;

    /// Articles shown on the public news page.
    async fn published_only(&self) -> Vec<Article> {
        self.cached()
            .await
            .into_iter()
            .filter(Article::is_listed)
            .collect()
    }

    /// Articles shown in the featured strip. Always a subset of `published_only`.
    async fn featured_only(&self) -> Vec<Article> {
        self.cached()
            .await
            .into_iter()
            .filter(Article::is_featured)
            .collect()
    }
}

/// ArticleStoreState
///
/// The concrete type used to share the configured store across the application state.
pub type ArticleStoreState = Arc<dyn ArticleStore>;

/// PersistedArticleStore
///
/// Article Store backed by a `DocumentStore` collection. Every successful mutation is
/// followed by a fetch-and-replace of the cache.
pub struct PersistedArticleStore {
    documents: DocumentState,
    collection: String,
    cache: RwLock<Vec<Article>>,
}

impl PersistedArticleStore {
    pub fn new(documents: DocumentState, collection: impl Into<String>) -> Self {
        Self {
            documents,
            collection: collection.into(),
            cache: RwLock::new(Vec::new()),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// refresh_after_write
    ///
    /// The write itself has already succeeded when this runs, so a failed refresh must
    /// not turn it into an error: the stale cache is kept and the next `list()` retries.
    async fn refresh_after_write(&self, operation: &str) {
        if let Err(e) = self.list().await {
            tracing::warn!(
                collection = %self.collection,
                "refresh after {} failed, cache is stale: {}",
                operation,
                e
            );
        }
    }
}

#[async_trait]
impl ArticleStore for PersistedArticleStore {
    /// list
    ///
    /// Documents that no longer decode as articles (missing required fields, wrong
    /// types) are skipped with a warning rather than failing the whole page.
    async fn list(&self) -> StoreResult<Vec<Article>> {
        let docs = self
            .documents
            .query_ordered(&self.collection, OrderBy::NEWEST_FIRST)
            .await?;

        let articles: Vec<Article> = docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                match Article::from_document(doc) {
                    Ok(article) => Some(article),
                    Err(e) => {
                        tracing::warn!(collection = %self.collection, id = %id, "skipping malformed article: {}", e);
                        None
                    }
                }
            })
            .collect();

        *self.cache.write().await = articles.clone();
        Ok(articles)
    }

    async fn create(&self, input: ArticleInput) -> StoreResult<String> {
        input.validate()?;
        let id = self
            .documents
            .add_document(&self.collection, input.to_fields())
            .await?;
        tracing::info!(collection = %self.collection, id = %id, "article created");

        self.refresh_after_write("create").await;
        Ok(id)
    }

    async fn update(&self, patch: ArticlePatch) -> StoreResult<()> {
        patch.changes.validate()?;
        self.documents
            .update_document(&self.collection, &patch.id, patch.changes.to_fields())
            .await?;
        tracing::info!(collection = %self.collection, id = %patch.id, "article updated");

        self.refresh_after_write("update").await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.documents.delete_document(&self.collection, id).await?;
        tracing::info!(collection = %self.collection, id = %id, "article deleted");

        self.refresh_after_write("delete").await;
        Ok(())
    }

    async fn cached(&self) -> Vec<Article> {
        self.cache.read().await.clone()
    }
}

/// DemoArticleStore
///
/// Volatile stand-in for the persisted backend: articles live only in this process
/// and vanish on restart. The cache *is* the store, so mutations patch it in place
/// instead of refetching.
#[derive(Default)]
pub struct DemoArticleStore {
    articles: RwLock<Vec<Article>>,
}

impl DemoArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the demo with pre-built articles, re-sorted newest first.
    pub fn with_articles(mut articles: Vec<Article>) -> Self {
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self {
            articles: RwLock::new(articles),
        }
    }
}

#[async_trait]
impl ArticleStore for DemoArticleStore {
    async fn list(&self) -> StoreResult<Vec<Article>> {
        Ok(self.cached().await)
    }

    async fn create(&self, input: ArticleInput) -> StoreResult<String> {
        input.validate()?;
        let mut articles = self.articles.write().await;

        // The head is the newest article; stay strictly after it so prepending
        // keeps the collection ordered.
        let now = articles
            .first()
            .map_or_else(Utc::now, |newest| next_update_time(newest.created_at));
        let id = Uuid::new_v4().to_string();
        articles.insert(0, Article::new(id.clone(), input, now, now));

        tracing::info!(id = %id, "demo article created");
        Ok(id)
    }

    async fn update(&self, patch: ArticlePatch) -> StoreResult<()> {
        patch.changes.validate()?;
        let mut articles = self.articles.write().await;
        let article = articles
            .iter_mut()
            .find(|a| a.id == patch.id)
            .ok_or_else(|| StoreError::NotFound(patch.id.clone()))?;

        patch.changes.apply_to(article);
        article.updated_at = next_update_time(article.updated_at);

        tracing::info!(id = %patch.id, "demo article updated");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut articles = self.articles.write().await;
        let position = articles
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        articles.remove(position);

        tracing::info!(id = %id, "demo article deleted");
        Ok(())
    }

    async fn cached(&self) -> Vec<Article> {
        self.articles.read().await.clone()
    }
}
