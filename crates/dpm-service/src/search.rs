//! Search across groups, topics and applications.
//!
//! A principal finds public resources plus everything owned by its own
//! groups. Site admins find everything.

use dpm_core::authz::Principal;
use dpm_core::error::DpmResult;
use dpm_core::models::application::Application;
use dpm_core::models::group::Group;
use dpm_core::models::topic::Topic;
use dpm_core::repository::{
    ApplicationRepository, GroupRepository, PaginatedResult, Pagination, ResourceFilter, Store,
    TopicRepository,
};
use serde::Serialize;
use tracing::debug;

use crate::access::load_context;

/// Hits taken from each kind when several kinds are searched together.
const PER_KIND_LIMIT: u64 = 50;

/// What to search for. Selecting no kind searches all three.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Matched against name and description, case-insensitively.
    pub text: Option<String>,
    pub groups: bool,
    pub topics: bool,
    pub applications: bool,
}

impl SearchQuery {
    fn kinds(&self) -> (bool, bool, bool) {
        if self.groups || self.topics || self.applications {
            (self.groups, self.topics, self.applications)
        } else {
            (true, true, true)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "resource")]
pub enum SearchHit {
    Group(Group),
    Topic(Topic),
    Application(Application),
}

#[derive(Clone)]
pub struct SearchService<S: Store> {
    store: S,
}

impl<S: Store> SearchService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Search one or more resource kinds.
    ///
    /// A single kind pages straight through the store. Several kinds
    /// are combined from the first hits of each, groups first, then
    /// topics, then applications, and the page is cut from that list.
    pub async fn search(
        &self,
        principal: &Principal,
        query: SearchQuery,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<SearchHit>> {
        let ctx = load_context(&self.store, principal).await?;
        let filter = ResourceFilter {
            text_contains: query
                .text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            visible_in: (!ctx.is_site_admin()).then(|| ctx.member_group_ids()),
            ..ResourceFilter::default()
        };

        let (groups, topics, applications) = query.kinds();
        let kinds = [groups, topics, applications].iter().filter(|k| **k).count();
        debug!(user_id = %principal.user_id, kinds, "Searching resources");

        if kinds == 1 {
            return self.search_one(groups, topics, filter, pagination).await;
        }

        let top = Pagination {
            offset: 0,
            limit: PER_KIND_LIMIT,
        };
        let mut combined = Vec::new();
        if groups {
            let page = self.store.groups().list(filter.clone(), top.clone()).await?;
            combined.extend(page.items.into_iter().map(SearchHit::Group));
        }
        if topics {
            let page = self.store.topics().list(filter.clone(), top.clone()).await?;
            combined.extend(page.items.into_iter().map(SearchHit::Topic));
        }
        if applications {
            let page = self.store.applications().list(filter, top).await?;
            combined.extend(page.items.into_iter().map(SearchHit::Application));
        }

        let total = combined.len() as u64;
        let items = combined
            .into_iter()
            .skip(usize::try_from(pagination.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(pagination.limit).unwrap_or(usize::MAX))
            .collect();
        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn search_one(
        &self,
        groups: bool,
        topics: bool,
        filter: ResourceFilter,
        pagination: Pagination,
    ) -> DpmResult<PaginatedResult<SearchHit>> {
        if groups {
            let page = self.store.groups().list(filter, pagination).await?;
            Ok(map_page(page, SearchHit::Group))
        } else if topics {
            let page = self.store.topics().list(filter, pagination).await?;
            Ok(map_page(page, SearchHit::Topic))
        } else {
            let page = self.store.applications().list(filter, pagination).await?;
            Ok(map_page(page, SearchHit::Application))
        }
    }
}

fn map_page<T>(page: PaginatedResult<T>, hit: fn(T) -> SearchHit) -> PaginatedResult<SearchHit> {
    PaginatedResult {
        items: page.items.into_iter().map(hit).collect(),
        total: page.total,
        offset: page.offset,
        limit: page.limit,
    }
}
