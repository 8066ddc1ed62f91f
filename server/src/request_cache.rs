use std::sync::Arc;

use axum::{extract::Request, middleware::Next, response::Response};
use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::{AppError, doc::service::DocResolution};

/// Caches scoped to a single request. A fresh set is installed per request
/// by [`request_cache_middleware`] and dropped with it.
#[derive(Clone, Default)]
pub struct RequestCaches {
    doc_access: Arc<RequestDocAccessCache>,
}

impl RequestCaches {
    pub fn doc_access(&self) -> &RequestDocAccessCache {
        &self.doc_access
    }
}

#[derive(Default)]
pub struct RequestDocAccessCache {
    inner: DashMap<AccessCacheKey, Arc<OnceCell<DocResolution>>>,
}

impl RequestDocAccessCache {
    #[cfg(test)]
    pub(crate) fn get(&self, doc_id: &str, user_id: &str) -> Option<DocResolution> {
        self.inner
            .get(&AccessCacheKey::new(doc_id, user_id))
            .and_then(|cell| cell.get().cloned())
    }

    pub(crate) async fn get_or_fetch<F, Fut>(
        &self,
        doc_id: &str,
        user_id: &str,
        fetcher: F,
    ) -> Result<DocResolution, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<DocResolution, AppError>>,
    {
        let key = AccessCacheKey::new(doc_id, user_id);
        let cell = self
            .inner
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }

        let fetched = fetcher().await?;
        if cell.set(fetched.clone()).is_err() {
            if let Some(existing) = cell.get() {
                return Ok(existing.clone());
            }
        }

        Ok(fetched)
    }

    pub(crate) fn invalidate(&self, doc_id: &str, user_id: &str) {
        self.inner.remove(&AccessCacheKey::new(doc_id, user_id));
    }

    pub(crate) fn invalidate_document(&self, doc_id: &str) {
        self.inner.retain(|key, _| key.doc_id != doc_id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct AccessCacheKey {
    doc_id: String,
    user_id: String,
}

impl AccessCacheKey {
    fn new(doc_id: &str, user_id: &str) -> Self {
        Self {
            doc_id: doc_id.to_owned(),
            user_id: user_id.to_owned(),
        }
    }
}

tokio::task_local! {
    static ACTIVE_REQUEST_CACHES: RequestCaches;
}

pub async fn scope_with_request_caches<Fut, T>(caches: RequestCaches, fut: Fut) -> T
where
    Fut: std::future::Future<Output = T>,
{
    ACTIVE_REQUEST_CACHES.scope(caches, fut).await
}

pub fn current_request_caches() -> Option<RequestCaches> {
    ACTIVE_REQUEST_CACHES.try_with(|c| c.clone()).ok()
}

pub async fn request_cache_middleware(request: Request, next: Next) -> Response {
    scope_with_request_caches(RequestCaches::default(), next.run(request)).await
}
