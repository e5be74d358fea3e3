use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::shared::job_id::JobId;

use super::live_channel::LiveChannel;

/// Lookup table from job to its live channel.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    channels: Arc<Mutex<HashMap<JobId, Arc<LiveChannel>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Arc<LiveChannel>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the channel for `job_id`, or returns the existing one.
    pub fn register(&self, job_id: JobId) -> Arc<LiveChannel> {
        Arc::clone(self.lock().entry(job_id).or_default())
    }

    pub fn get(&self, job_id: &JobId) -> Option<Arc<LiveChannel>> {
        self.lock().get(job_id).cloned()
    }

    pub fn remove(&self, job_id: &JobId) -> Option<Arc<LiveChannel>> {
        self.lock().remove(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
