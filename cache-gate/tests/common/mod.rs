#![allow(dead_code)]

use async_trait::async_trait;
use cache_gate::{CacheConfig, Cacheable, Fetcher, ReadThroughCache};
use common_redis::MockRedisClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    pub body: String,
    pub likes: u32,
}

impl Cacheable for BlogPost {
    fn type_name() -> &'static str {
        "BlogPost"
    }
}

pub fn blog_post(title: &str) -> BlogPost {
    BlogPost {
        title: title.to_string(),
        body: format!("Body of {title}"),
        likes: 0,
    }
}

/// Stand-in for the primary store: posts by title, with a call counter and an
/// optional artificial latency.
#[derive(Default)]
pub struct InMemoryPosts {
    posts: Mutex<HashMap<String, BlogPost>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl InMemoryPosts {
    pub fn with_posts(posts: Vec<BlogPost>) -> Arc<Self> {
        Arc::new(Self::seeded(posts, None))
    }

    pub fn with_delay(posts: Vec<BlogPost>, delay: Duration) -> Arc<Self> {
        Arc::new(Self::seeded(posts, Some(delay)))
    }

    fn seeded(posts: Vec<BlogPost>, delay: Option<Duration>) -> Self {
        Self {
            posts: Mutex::new(posts.into_iter().map(|p| (p.title.clone(), p)).collect()),
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn upsert(&self, post: BlogPost) {
        self.posts
            .lock()
            .unwrap()
            .insert(post.title.clone(), post);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher<BlogPost> for InMemoryPosts {
    async fn fetch(&self, field: &str, value: &str) -> anyhow::Result<Option<BlogPost>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if field != "title" {
            anyhow::bail!("no index on {field}");
        }
        Ok(self.posts.lock().unwrap().get(value).cloned())
    }
}

pub type PostCache = ReadThroughCache<BlogPost, Arc<InMemoryPosts>>;

pub fn post_cache(client: &MockRedisClient, posts: Arc<InMemoryPosts>) -> PostCache {
    ReadThroughCache::new(Arc::new(client.clone()), posts, CacheConfig::default()).unwrap()
}
