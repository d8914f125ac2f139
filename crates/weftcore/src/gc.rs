use crate::OperationError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex};

type Finalizer = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), OperationError>> + Send>;

/// Ordered list of cleanup tasks owned by one run. Operation bodies
/// register finalizers for resources they acquire; the engine collects
/// the scope after the run on every exit path. Finalizers run in reverse
/// registration order and each failure is isolated.
#[derive(Clone, Default)]
pub struct FinalizerScope {
    inner: Arc<Mutex<Vec<Finalizer>>>,
}

impl FinalizerScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&self, finalizer: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), OperationError>> + Send + 'static,
    {
        let mut finalizers = self.lock();
        tracing::debug!(index = finalizers.len(), "registered finalizer");
        finalizers.push(Box::new(move || finalizer().boxed()));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drains and runs all registered finalizers, newest first. A failing
    /// finalizer is logged and does not stop the remaining ones.
    pub async fn collect(&self) {
        let drained: Vec<Finalizer> = self.lock().drain(..).collect();
        tracing::debug!(count = drained.len(), "collecting finalizers");

        for (index, finalizer) in drained.into_iter().enumerate().rev() {
            match finalizer().await {
                Ok(()) => tracing::debug!(index, "finalizer completed"),
                Err(error) => tracing::warn!(index, %error, "finalizer failed"),
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Finalizer>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let scope = FinalizerScope::new();
        for index in 0..3 {
            let order = order.clone();
            scope.register(move || async move {
                order.lock().unwrap().push(index);
                Ok(())
            });
        }
        scope.collect().await;
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        assert!(scope.is_empty());
    }

    #[tokio::test]
    async fn failure_does_not_stop_collection() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let scope = FinalizerScope::new();
        for index in 0..3 {
            let order = order.clone();
            scope.register(move || async move {
                order.lock().unwrap().push(index);
                if index == 1 {
                    Err(OperationError::ExecutionFailed("boom".into()))
                } else {
                    Ok(())
                }
            });
        }
        scope.collect().await;
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }
}
