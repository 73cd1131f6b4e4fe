use std::{ops::Deref, sync::Arc};

use crate::{
    config::BookPolicy,
    error::{ErrorVerbosity, ErrorVerbosityProvider},
    middleware::cors::CorsHeaders,
    store::RecordStore,
};

#[derive(Clone)]
pub struct ApiState {
    inner: Arc<ApiStateInner>,
}

impl ApiState {
    pub fn new(
        error_verbosity: ErrorVerbosity,
        store: Arc<dyn RecordStore>,
        book_policy: BookPolicy,
        cors: CorsHeaders,
    ) -> Self {
        Self {
            inner: Arc::new(ApiStateInner {
                error_verbosity,
                store,
                book_policy,
                cors,
            }),
        }
    }
}

impl Deref for ApiState {
    type Target = ApiStateInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct ApiStateInner {
    error_verbosity: ErrorVerbosity,
    store: Arc<dyn RecordStore>,
    book_policy: BookPolicy,
    cors: CorsHeaders,
}

impl ApiStateInner {
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn book_policy(&self) -> &BookPolicy {
        &self.book_policy
    }

    pub fn cors(&self) -> &CorsHeaders {
        &self.cors
    }
}

impl ErrorVerbosityProvider for ApiState {
    fn error_verbosity(&self) -> ErrorVerbosity {
        self.error_verbosity
    }
}
