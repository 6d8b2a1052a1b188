use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    access::Session,
    error::{StoreError, StoreResult},
    storage::Document,
};

// --- Core Schemas ---

/// Article
///
/// A single news item as the site renders it. The store assigns `id` and both
/// timestamps; every other field comes from the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub author: String,
    pub image_url: Option<String>,
    // Display order, not a set.
    pub tags: Vec<String>,
    pub published: bool,
    // Only honoured on the site when `published` is also true.
    pub featured: bool,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Assembles a stored article from its editable fields and store-assigned metadata.
    pub fn new(
        id: impl Into<String>,
        input: ArticleInput,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: input.title,
            content: input.content,
            excerpt: input.excerpt,
            author: input.author,
            image_url: input.image_url,
            tags: input.tags,
            published: input.published,
            featured: input.featured,
            created_at,
            updated_at,
        }
    }

    /// Decodes a persisted document. Documents missing a required field are rejected
    /// here so a single bad record cannot poison a whole listing.
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let input: ArticleInput = serde_json::from_value(Value::Object(doc.data))?;
        Ok(Self::new(doc.id, input, doc.created_at, doc.updated_at))
    }

    /// Visible on the public news pages.
    pub fn is_listed(&self) -> bool {
        self.published
    }

    /// Visible in the featured strip: published first, then featured.
    pub fn is_featured(&self) -> bool {
        self.published && self.featured
    }
}

// --- Request Payloads ---

/// ArticleInput
///
/// Payload for creating an article (POST /admin/news).
/// `tags`, `published` and `featured` may be omitted and default to empty/false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticleInput {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub featured: bool,
}

impl ArticleInput {
    /// Rejects blank required fields. Both store backends call this before touching
    /// their storage, so they accept and refuse exactly the same inputs.
    pub fn validate(&self) -> StoreResult<()> {
        require("title", &self.title)?;
        require("content", &self.content)?;
        require("excerpt", &self.excerpt)?;
        require("author", &self.author)
    }

    /// The document body written by the persisted backend.
    pub fn to_fields(&self) -> Map<String, Value> {
        to_object(self)
    }
}

/// ArticleChanges
///
/// Partial update payload (PUT /admin/news/{id}). Absent fields are left untouched;
/// `None` fields are skipped on serialization so they never reach the document merge.
/// `imageUrl` is the one clearable field: an explicit `null` removes the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticleChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub image_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

impl ArticleChanges {
    /// A required field may be omitted from a patch, but not blanked by one.
    pub fn validate(&self) -> StoreResult<()> {
        let required = [
            ("title", &self.title),
            ("content", &self.content),
            ("excerpt", &self.excerpt),
            ("author", &self.author),
        ];
        for (field, value) in required {
            if let Some(value) = value {
                require(field, value)?;
            }
        }
        Ok(())
    }

    /// Overwrites only the supplied fields. Timestamps are the caller's concern.
    pub fn apply_to(&self, article: &mut Article) {
        if let Some(title) = &self.title {
            article.title = title.clone();
        }
        if let Some(content) = &self.content {
            article.content = content.clone();
        }
        if let Some(excerpt) = &self.excerpt {
            article.excerpt = excerpt.clone();
        }
        if let Some(author) = &self.author {
            article.author = author.clone();
        }
        if let Some(image_url) = &self.image_url {
            article.image_url = image_url.clone();
        }
        if let Some(tags) = &self.tags {
            article.tags = tags.clone();
        }
        if let Some(published) = self.published {
            article.published = published;
        }
        if let Some(featured) = self.featured {
            article.featured = featured;
        }
    }

    /// The merge body for a document update. Contains only the supplied fields.
    pub fn to_fields(&self) -> Map<String, Value> {
        to_object(self)
    }
}

/// ArticlePatch
///
/// A targeted update: the article id plus the fields to overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArticlePatch {
    pub id: String,
    #[serde(flatten)]
    pub changes: ArticleChanges,
}

impl ArticlePatch {
    pub fn new(id: impl Into<String>, changes: ArticleChanges) -> Self {
        Self {
            id: id.into(),
            changes,
        }
    }
}

/// ArticleCreated
///
/// Response body for POST /admin/news.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleCreated {
    pub id: String,
}

/// LoginRequest
///
/// Input payload for POST /auth/login. The password is passed straight to the
/// authentication provider and never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// SessionView
///
/// The visitor's resolved session as the front-end sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionView {
    pub authenticated: bool,
    pub account_id: Option<String>,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl From<Option<&Session>> for SessionView {
    fn from(session: Option<&Session>) -> Self {
        match session {
            Some(session) => Self {
                authenticated: true,
                account_id: Some(session.account_id.clone()),
                email: session.email.clone(),
                is_admin: session.is_admin,
            },
            None => Self::default(),
        }
    }
}

/// LoginResponse
///
/// Returned on successful login. The client presents `accessToken` as a bearer
/// token on subsequent admin requests.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
    pub session: SessionView,
}

fn require(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Maps a present key to `Some`, so `null` becomes `Some(None)` while an absent key
/// falls back to the field default.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
