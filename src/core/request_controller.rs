/*
 * Drives one outstanding request per call site and tracks its data, loading flag
 * and error. A view owns one `ResourceController`, feeds it its dependency key on
 * every tick through `observe`, and re-renders whenever the published
 * `RequestState` changes.
 *
 * Requests are spawned on the tokio runtime as soon as they are issued and are
 * never cancelled. Every issue bumps a sequence number; when a request settles
 * it is applied only if it is still the latest one issued, so an older, slower
 * response can never overwrite a newer one (last issued wins). A failure keeps
 * the last successful `data` so a transient error does not blank the view.
 */
use crate::core::errors::{ApiError, ApiResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub type FetchFuture<T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'static>>;
pub type Fetcher<P, T> = Arc<dyn Fn(P) -> FetchFuture<T> + Send + Sync>;

/* Wraps an async closure into a `Fetcher`. */
pub fn fetcher<P, T, F, Fut>(f: F) -> Fetcher<P, T>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
{
    Arc::new(move |params| Box::pin(f(params)))
}

/*
 * The values a call site depends on. Keys are compared element by element, so
 * two separately built keys with equal contents count as unchanged.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyKey(Vec<Value>);

impl DependencyKey {
    pub fn new(values: Vec<Value>) -> Self {
        DependencyKey(values)
    }
}

impl<V: Into<Value>> FromIterator<V> for DependencyKey {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        DependencyKey(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<ApiError>,
}

impl<T> RequestState<T> {
    fn idle(initial_data: Option<T>) -> Self {
        RequestState {
            data: initial_data,
            loading: false,
            error: None,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        if self.loading {
            RequestPhase::Loading
        } else if self.error.is_some() {
            RequestPhase::Error
        } else if self.data.is_some() {
            RequestPhase::Success
        } else {
            RequestPhase::Idle
        }
    }
}

struct ControllerInner<P> {
    params: P,
    dependency_key: Option<DependencyKey>,
    issued_seq: u64,
}

pub struct ResourceController<P, T> {
    fetcher: Fetcher<P, T>,
    inner: Arc<Mutex<ControllerInner<P>>>,
    state: Arc<watch::Sender<RequestState<T>>>,
}

impl<P, T> ResourceController<P, T>
where
    P: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /* Creates an idle controller; nothing is fetched until `observe` or `refetch`. */
    pub fn new(fetcher: Fetcher<P, T>, params: P, initial_data: Option<T>) -> Self {
        let (state, _) = watch::channel(RequestState::idle(initial_data));
        ResourceController {
            fetcher,
            inner: Arc::new(Mutex::new(ControllerInner {
                params,
                dependency_key: None,
                issued_seq: 0,
            })),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> RequestState<T> {
        self.state.borrow().clone()
    }

    /* A receiver that wakes on every state transition. */
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
        self.state.subscribe()
    }

    pub fn params(&self) -> P {
        self.inner.lock().params.clone()
    }

    pub fn current_sequence(&self) -> u64 {
        self.inner.lock().issued_seq
    }

    /* `true` while `seq` is the most recently issued request. */
    pub fn is_current(&self, seq: u64) -> bool {
        self.inner.lock().issued_seq == seq
    }

    /*
     * The per-tick dependency check. Issues a request on the first call and
     * whenever `key` differs from the previously observed key; otherwise does
     * nothing and returns `None`.
     */
    pub fn observe(&self, key: DependencyKey) -> Option<JoinHandle<()>> {
        let mut inner = self.inner.lock();
        if inner.dependency_key.as_ref() == Some(&key) {
            return None;
        }
        inner.dependency_key = Some(key);
        Some(self.issue_locked(&mut inner))
    }

    /*
     * Forces a request outside a dependency change. With `new_params` the stored
     * params are replaced first; without, the previous params are replayed.
     */
    pub fn refetch(&self, new_params: Option<P>) -> JoinHandle<()> {
        let mut inner = self.inner.lock();
        if let Some(params) = new_params {
            inner.params = params;
        }
        self.issue_locked(&mut inner)
    }

    fn issue_locked(&self, inner: &mut ControllerInner<P>) -> JoinHandle<()> {
        inner.issued_seq += 1;
        let seq = inner.issued_seq;
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let request = (self.fetcher)(inner.params.clone());
        let shared_inner = Arc::clone(&self.inner);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let outcome = request.await;
            // Hold the inner lock while applying so no newer issue can interleave.
            let inner = shared_inner.lock();
            if inner.issued_seq != seq {
                log::trace!(
                    "ResourceController: Discarding stale response #{seq} (latest is #{})",
                    inner.issued_seq
                );
                return;
            }
            state.send_modify(|state| {
                state.loading = false;
                match outcome {
                    Ok(data) => {
                        state.data = Some(data);
                        state.error = None;
                    }
                    Err(err) => state.error = Some(err),
                }
            });
        })
    }
}

/*
 * Creates a controller and performs its first dependency check, which issues the
 * initial request. Must be called from within a tokio runtime.
 */
pub fn use_resource<P, T>(
    fetcher: Fetcher<P, T>,
    params: P,
    dependency_key: DependencyKey,
    initial_data: Option<T>,
) -> ResourceController<P, T>
where
    P: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    let controller = ResourceController::new(fetcher, params, initial_data);
    controller.observe(dependency_key);
    controller
}
