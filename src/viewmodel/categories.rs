use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::watch;
use tracing::{debug, error};

use super::state::{apply, apply_current, ActionResult, ActiveListener, LoadEvent, LoadState};
use crate::{
    core::services::CategoryService,
    domain::{Category, CategoryGroup, TransactionKind},
    storage::CategoryRepository,
};

type GroupCache = HashMap<Option<TransactionKind>, Vec<CategoryGroup>>;

/// Category list, grouped tree and search for the category screens.
pub struct CategoryViewModel {
    repository: Arc<dyn CategoryRepository>,
    categories: Arc<watch::Sender<LoadState<Vec<Category>>>>,
    groups: Arc<watch::Sender<LoadState<Vec<CategoryGroup>>>>,
    query: Arc<watch::Sender<String>>,
    cache: Arc<Mutex<GroupCache>>,
    kind: Mutex<Option<TransactionKind>>,
    listener: ActiveListener,
}

impl CategoryViewModel {
    pub fn new(repository: Arc<dyn CategoryRepository>) -> Self {
        Self {
            repository,
            categories: Arc::new(watch::channel(LoadState::Loading).0),
            groups: Arc::new(watch::channel(LoadState::Loading).0),
            query: Arc::new(watch::channel(String::new()).0),
            cache: Arc::new(Mutex::new(GroupCache::new())),
            kind: Mutex::new(None),
            listener: ActiveListener::default(),
        }
    }

    pub fn categories(&self) -> watch::Receiver<LoadState<Vec<Category>>> {
        self.categories.subscribe()
    }

    pub fn groups(&self) -> watch::Receiver<LoadState<Vec<CategoryGroup>>> {
        self.groups.subscribe()
    }

    /// Subscribes to the categories of `kind` (all when `None`).
    ///
    /// A previously cached grouping for the same kind is shown right away while
    /// the fresh snapshot is pending.
    pub fn load_categories(&self, kind: Option<TransactionKind>) {
        let epoch = self.listener.begin();
        *lock(&self.kind) = kind;
        apply(&self.categories, LoadEvent::Started);
        match lock(&self.cache).get(&kind) {
            Some(cached) => {
                let visible = CategoryService::filter_groups(cached, &self.query.borrow());
                apply(&self.groups, LoadEvent::Loaded(visible));
            }
            None => apply(&self.groups, LoadEvent::Started),
        }

        let subscription = match kind {
            Some(kind) => self.repository.by_type(kind),
            None => self.repository.all(),
        };
        let mut subscription = match subscription {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(?kind, error = %err, "could not load categories");
                let message = err.user_message();
                apply(&self.categories, LoadEvent::Failed(message.clone()));
                apply(&self.groups, LoadEvent::Failed(message));
                return;
            }
        };

        let categories = Arc::clone(&self.categories);
        let groups = Arc::clone(&self.groups);
        let query = self.query.subscribe();
        let cache = Arc::clone(&self.cache);
        let handle = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                match snapshot {
                    Ok(items) => {
                        let grouped = match kind {
                            Some(kind) => CategoryService::group_by_type(&items, kind),
                            None => CategoryService::group(&items),
                        };
                        // held until published; set_search_query takes the same lock
                        let mut cached = lock(&cache);
                        let visible = CategoryService::filter_groups(&grouped, &query.borrow());
                        cached.insert(kind, grouped);
                        if !apply_current(&categories, &epoch, LoadEvent::Loaded(items)) {
                            break;
                        }
                        apply_current(&groups, &epoch, LoadEvent::Loaded(visible));
                    }
                    Err(err) => {
                        let message = err.user_message();
                        apply_current(&categories, &epoch, LoadEvent::Failed(message.clone()));
                        apply_current(&groups, &epoch, LoadEvent::Failed(message));
                    }
                }
            }
        });
        self.listener.attach(handle);
    }

    /// Filters the current grouping by name, case-insensitively.
    pub fn set_search_query(&self, query: &str) {
        let kind = *lock(&self.kind);
        let cache = lock(&self.cache);
        self.query.send_replace(query.to_string());
        if let Some(cached) = cache.get(&kind) {
            let visible = CategoryService::filter_groups(cached, query);
            apply(&self.groups, LoadEvent::Loaded(visible));
        }
    }

    pub fn search_query(&self) -> String {
        self.query.borrow().clone()
    }

    /// Validates against the parent (if any), then stores the category.
    pub async fn add_category(&self, category: Category) -> ActionResult<Category> {
        let parent = match category.parent_id.as_deref() {
            Some(parent_id) => Some(
                self.repository
                    .get(parent_id)
                    .await
                    .map_err(|err| err.user_message())?,
            ),
            None => None,
        };
        CategoryService::validate(&category, parent.as_ref()).map_err(|err| err.to_string())?;
        let stored = self
            .repository
            .add(category)
            .await
            .map_err(|err| err.user_message())?;
        debug!(id = %stored.id, "category added");
        Ok(stored)
    }

    /// Deletes the category together with its subcategories.
    pub async fn delete_category(&self, id: &str) -> ActionResult {
        self.repository
            .delete(id)
            .await
            .map_err(|err| err.user_message())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
