use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Notify;

/// Post uids that currently have a render running, each with a handle that
/// wakes waiters once that render finishes.
#[derive(Default, Clone)]
pub struct InFlightRenders {
    posts: Arc<DashMap<String, Arc<Notify>>>,
}

#[derive(Debug, Error)]
pub enum InFlightError {
    #[error("render already in progress for post `{uid}`")]
    AlreadyRunning { uid: String },
}

impl InFlightRenders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, uid: &str) -> Result<RenderGuard, InFlightError> {
        use dashmap::mapref::entry::Entry;

        match self.posts.entry(uid.to_string()) {
            Entry::Vacant(vacant) => {
                let done = Arc::new(Notify::new());
                vacant.insert(Arc::clone(&done));
                Ok(RenderGuard {
                    uid: uid.to_string(),
                    posts: Arc::clone(&self.posts),
                    done,
                })
            }
            Entry::Occupied(_) => Err(InFlightError::AlreadyRunning {
                uid: uid.to_string(),
            }),
        }
    }

    pub fn is_running(&self, uid: &str) -> bool {
        self.posts.contains_key(uid)
    }

    /// Resolves once the render currently holding `uid` releases it.
    /// Returns immediately when nothing is running.
    pub async fn wait(&self, uid: &str) {
        let Some(done) = self.posts.get(uid).map(|entry| Arc::clone(entry.value())) else {
            return;
        };

        let notified = done.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // The guard may have dropped between the lookup and `enable`.
        let still_running = self
            .posts
            .get(uid)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), &done));
        if still_running {
            notified.await;
        }
    }
}

/// Releases the uid and wakes its waiters when dropped.
pub struct RenderGuard {
    uid: String,
    posts: Arc<DashMap<String, Arc<Notify>>>,
    done: Arc<Notify>,
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        self.posts.remove(&self.uid);
        self.done.notify_waiters();
    }
}
