//! Stateful query executor over a paginated list endpoint.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use jobdash_shared::{ApiError, PageEnvelope};
use tokio::sync::watch;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Query parameters for a collection endpoint. `page` starts at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub search: Option<String>,
    pub filters: BTreeMap<String, serde_json::Value>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            sort_by: None,
            sort_order: None,
            search: None,
            filters: BTreeMap::new(),
        }
    }
}

impl PageParams {
    /// Render as a query string, filters in key order.
    pub fn to_query(&self) -> String {
        let mut parts = vec![format!("page={}", self.page), format!("limit={}", self.limit)];
        if let Some(sort_by) = &self.sort_by {
            parts.push(format!("sortBy={}", urlencoding::encode(sort_by)));
        }
        if let Some(order) = &self.sort_order {
            parts.push(format!("sortOrder={}", order.as_str()));
        }
        if let Some(search) = &self.search {
            parts.push(format!("search={}", urlencoding::encode(search)));
        }
        for (key, value) in &self.filters {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            parts.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&rendered)
            ));
        }
        parts.join("&")
    }

    fn apply(&mut self, update: PageParamsUpdate) {
        let explicit_page = update.page;
        if let Some(limit) = update.limit {
            self.limit = limit;
        }
        if let Some(sort_by) = update.sort_by {
            self.sort_by = Some(sort_by);
        }
        if let Some(order) = update.sort_order {
            self.sort_order = Some(order);
        }
        if let Some(search) = update.search {
            self.search = if search.is_empty() { None } else { Some(search) };
        }
        if let Some(filters) = update.filters {
            self.filters.extend(filters);
        }
        // Any merged change lands back on page 1 unless the update names a
        // page itself.
        self.page = explicit_page.unwrap_or(1);
    }
}

/// Partial parameter update; unset fields keep their current values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageParamsUpdate {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub search: Option<String>,
    pub filters: Option<BTreeMap<String, serde_json::Value>>,
}

/// Snapshot of a paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub loading: bool,
    pub error: Option<String>,
    pub params: PageParams,
}

impl<T> PageState<T> {
    pub fn total_pages(&self) -> u64 {
        if self.params.limit == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.params.limit as u64)
    }

    pub fn has_next_page(&self) -> bool {
        (self.params.page as u64) < self.total_pages()
    }

    pub fn has_prev_page(&self) -> bool {
        self.params.page > 1
    }
}

type PageFetcher<T> =
    Arc<dyn Fn(PageParams) -> BoxFuture<'static, Result<PageEnvelope<T>, ApiError>> + Send + Sync>;

/// Query executor over a list endpoint. Every parameter-changing action
/// merges into the current parameter set and triggers exactly one fetch;
/// a failed fetch keeps the previously loaded items.
pub struct PaginatedCollection<T> {
    fetcher: PageFetcher<T>,
    state: watch::Sender<PageState<T>>,
}

impl<T: Clone + Send + Sync + 'static> PaginatedCollection<T> {
    pub fn new<F, Fut>(fetcher: F) -> Self
    where
        F: Fn(PageParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageEnvelope<T>, ApiError>> + Send + 'static,
    {
        Self::with_params(PageParams::default(), fetcher)
    }

    pub fn with_params<F, Fut>(params: PageParams, fetcher: F) -> Self
    where
        F: Fn(PageParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PageEnvelope<T>, ApiError>> + Send + 'static,
    {
        let fetcher: PageFetcher<T> = Arc::new(move |params| Box::pin(fetcher(params)));
        let (state, _) = watch::channel(PageState {
            items: Vec::new(),
            total_count: 0,
            loading: false,
            error: None,
            params,
        });
        Self { fetcher, state }
    }

    pub fn state(&self) -> PageState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PageState<T>> {
        self.state.subscribe()
    }

    async fn run_fetch(&self) -> Result<Vec<T>, ApiError> {
        let params = self.state.borrow().params.clone();
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        match (self.fetcher)(params).await {
            Ok(envelope) => {
                self.state.send_modify(|s| {
                    s.items = envelope.data.clone();
                    s.total_count = envelope.total_count;
                    s.loading = false;
                });
                Ok(envelope.data)
            }
            Err(err) => {
                let message = err.to_string();
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    /// Fetch with the current parameters.
    pub async fn execute(&self) -> Result<Vec<T>, ApiError> {
        self.run_fetch().await
    }

    /// Replace the full parameter set, then fetch.
    pub async fn execute_with(&self, params: PageParams) -> Result<Vec<T>, ApiError> {
        self.state.send_modify(|s| s.params = params);
        self.run_fetch().await
    }

    /// Merge a partial update, then fetch. The page resets to 1 unless the
    /// update sets one explicitly.
    pub async fn update_params(&self, update: PageParamsUpdate) -> Result<Vec<T>, ApiError> {
        self.state.send_modify(|s| s.params.apply(update));
        self.run_fetch().await
    }

    pub async fn next_page(&self) -> Result<Vec<T>, ApiError> {
        if !self.state.borrow().has_next_page() {
            return Ok(self.state.borrow().items.clone());
        }
        self.state.send_modify(|s| s.params.page += 1);
        self.run_fetch().await
    }

    pub async fn prev_page(&self) -> Result<Vec<T>, ApiError> {
        if !self.state.borrow().has_prev_page() {
            return Ok(self.state.borrow().items.clone());
        }
        self.state.send_modify(|s| s.params.page -= 1);
        self.run_fetch().await
    }

    pub async fn go_to_page(&self, page: u32) -> Result<Vec<T>, ApiError> {
        if page == 0 {
            return Ok(self.state.borrow().items.clone());
        }
        self.state.send_modify(|s| s.params.page = page);
        self.run_fetch().await
    }

    /// Change the page size; resets to page 1.
    pub async fn change_limit(&self, limit: u32) -> Result<Vec<T>, ApiError> {
        if limit == 0 {
            tracing::warn!("ignoring change_limit(0)");
            return Ok(self.state.borrow().items.clone());
        }
        self.state.send_modify(|s| {
            s.params.limit = limit;
            s.params.page = 1;
        });
        self.run_fetch().await
    }

    /// Set the search term; resets to page 1. An empty term clears it.
    pub async fn search(&self, term: impl Into<String>) -> Result<Vec<T>, ApiError> {
        let term = term.into();
        self.state.send_modify(|s| {
            s.params.search = if term.is_empty() { None } else { Some(term) };
            s.params.page = 1;
        });
        self.run_fetch().await
    }

    /// Set the sort field and order; resets to page 1.
    pub async fn sort(&self, field: impl Into<String>, order: SortOrder) -> Result<Vec<T>, ApiError> {
        let field = field.into();
        self.state.send_modify(|s| {
            s.params.sort_by = Some(field);
            s.params.sort_order = Some(order);
            s.params.page = 1;
        });
        self.run_fetch().await
    }

    /// Merge filters into the current set; resets to page 1.
    pub async fn filter(
        &self,
        filters: BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<T>, ApiError> {
        self.state.send_modify(|s| {
            s.params.filters.extend(filters);
            s.params.page = 1;
        });
        self.run_fetch().await
    }

    /// Re-fetch with unchanged parameters.
    pub async fn refresh(&self) -> Result<Vec<T>, ApiError> {
        self.run_fetch().await
    }
}
