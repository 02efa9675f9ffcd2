//! Middleware composition.
//!
//! # Responsibilities
//! - Define the before/after wrapper unit
//! - Compose global and endpoint-private middleware into one chain per
//!   request
//!
//! # Design Decisions
//! - Globals fully wrap privates, which wrap the handler; `before` hooks run
//!   outer-to-inner in declared order, `after` hooks in strict reverse
//! - Execution is an explicit loop, not stack unwinding: a failure in any
//!   hook or lifecycle stage still runs the `after` hooks of every
//!   middleware already entered, in reverse order, before the error
//!   response leaves the chain

pub mod cors;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::http::{RequestContext, Response};

pub use cors::CorsMiddleware;

/// A cross-cutting wrapper around handler invocation.
///
/// `before` may mutate or wholly replace the request context; `after` may
/// mutate the response. Either hook may fail with a typed error, which the
/// chain converts into a response.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn before(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        let _ = ctx;
        Ok(())
    }

    async fn after(
        &self,
        ctx: &RequestContext,
        response: &mut Response,
    ) -> Result<(), DispatchError> {
        let _ = (ctx, response);
        Ok(())
    }
}

/// The innermost work a chain wraps: the lifecycle run for one request.
#[async_trait]
pub trait ChainCore: Send + Sync {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<Response, DispatchError>;
}

/// One request's composed middleware chain.
pub struct MiddlewareChain {
    links: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Globals first, then privates: index order is nesting order, outermost
    /// to innermost-adjacent-to-handler.
    pub fn compose(global: &[Arc<dyn Middleware>], private: &[Arc<dyn Middleware>]) -> Self {
        let mut links = Vec::with_capacity(global.len() + private.len());
        links.extend(global.iter().cloned());
        links.extend(private.iter().cloned());
        Self { links }
    }

    /// Run the core inside the chain and produce the final response.
    ///
    /// Entered middlewares always observe the return path: on a `before`
    /// failure at link `i`, the `after` hooks of links `0..i` still run.
    pub async fn run(&self, ctx: &mut RequestContext, core: &dyn ChainCore) -> Response {
        let mut entered = self.links.len();
        let mut failure = None;
        for (i, link) in self.links.iter().enumerate() {
            if let Err(err) = link.before(ctx).await {
                entered = i;
                failure = Some(err);
                break;
            }
        }

        let mut response = match failure {
            Some(err) => Response::from(err),
            None => match core.invoke(ctx).await {
                Ok(response) => response,
                Err(err) => Response::from(err),
            },
        };

        for link in self.links[..entered].iter().rev() {
            if let Err(err) = link.after(ctx, &mut response).await {
                // The converted error replaces the response; outer hooks
                // still get their turn.
                response = Response::from(err);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_before: bool,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn before(&self, _ctx: &mut RequestContext) -> Result<(), DispatchError> {
            self.log.lock().unwrap().push(format!("{}.before", self.name));
            if self.fail_before {
                return Err(DispatchError::Authorization);
            }
            Ok(())
        }

        async fn after(
            &self,
            _ctx: &RequestContext,
            _response: &mut Response,
        ) -> Result<(), DispatchError> {
            self.log.lock().unwrap().push(format!("{}.after", self.name));
            Ok(())
        }
    }

    fn recorder(
        name: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        fail_before: bool,
    ) -> Arc<dyn Middleware> {
        Arc::new(Recorder {
            name,
            log: log.clone(),
            fail_before,
        })
    }

    fn context() -> RequestContext {
        RequestContext::new(Method::GET, "x/", HeaderMap::new(), "", Bytes::new(), None)
    }

    /// Core that records its run and replies 200.
    struct RecordingCore {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ChainCore for RecordingCore {
        async fn invoke(&self, _ctx: &mut RequestContext) -> Result<Response, DispatchError> {
            self.log.lock().unwrap().push("handler".to_string());
            Ok(Response::json(&serde_json::json!({})))
        }
    }

    /// Core that must never be reached.
    struct MustNotRun;

    #[async_trait]
    impl ChainCore for MustNotRun {
        async fn invoke(&self, _ctx: &mut RequestContext) -> Result<Response, DispatchError> {
            panic!("core must not run after a before failure");
        }
    }

    /// Core that fails with a typed error.
    struct FailCore;

    #[async_trait]
    impl ChainCore for FailCore {
        async fn invoke(&self, _ctx: &mut RequestContext) -> Result<Response, DispatchError> {
            Err(DispatchError::NotFound)
        }
    }

    #[tokio::test]
    async fn test_strict_lifo_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let global = vec![recorder("A", &log, false), recorder("B", &log, false)];
        let private = vec![recorder("C", &log, false), recorder("D", &log, false)];
        let chain = MiddlewareChain::compose(&global, &private);

        let mut ctx = context();
        let core = RecordingCore { log: log.clone() };
        let response = chain.run(&mut ctx, &core).await;

        assert_eq!(response.status(), 200);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "A.before", "B.before", "C.before", "D.before", "handler", "D.after", "C.after",
                "B.after", "A.after",
            ]
        );
    }

    #[tokio::test]
    async fn test_before_failure_unwinds_entered_links_only() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let global = vec![
            recorder("A", &log, false),
            recorder("B", &log, true),
            recorder("C", &log, false),
        ];
        let chain = MiddlewareChain::compose(&global, &[]);

        let mut ctx = context();
        let response = chain.run(&mut ctx, &MustNotRun).await;

        assert_eq!(response.status(), 403);
        assert_eq!(*log.lock().unwrap(), vec!["A.before", "B.before", "A.after"]);
    }

    #[tokio::test]
    async fn test_core_error_still_runs_afters() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let global = vec![recorder("A", &log, false)];
        let chain = MiddlewareChain::compose(&global, &[]);

        let mut ctx = context();
        let response = chain.run(&mut ctx, &FailCore).await;

        assert_eq!(response.status(), 404);
        assert_eq!(*log.lock().unwrap(), vec!["A.before", "A.after"]);
    }

    #[tokio::test]
    async fn test_after_can_mutate_response() {
        struct Stamp;

        #[async_trait]
        impl Middleware for Stamp {
            async fn after(
                &self,
                _ctx: &RequestContext,
                response: &mut Response,
            ) -> Result<(), DispatchError> {
                response.insert_header("x-stamped", "yes");
                Ok(())
            }
        }

        let chain = MiddlewareChain::compose(&[Arc::new(Stamp) as Arc<dyn Middleware>], &[]);
        let mut ctx = context();
        let core = RecordingCore {
            log: Arc::new(Mutex::new(Vec::new())),
        };
        let response = chain.run(&mut ctx, &core).await;
        assert_eq!(response.header("x-stamped").unwrap(), "yes");
    }

    #[tokio::test]
    async fn test_after_failure_replaces_response_and_continues() {
        struct FailAfter;

        #[async_trait]
        impl Middleware for FailAfter {
            async fn after(
                &self,
                _ctx: &RequestContext,
                _response: &mut Response,
            ) -> Result<(), DispatchError> {
                Err(DispatchError::Internal("cleanup failed".into()))
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let global = vec![
            recorder("A", &log, false),
            Arc::new(FailAfter) as Arc<dyn Middleware>,
        ];
        let chain = MiddlewareChain::compose(&global, &[]);

        let mut ctx = context();
        let core = RecordingCore {
            log: Arc::new(Mutex::new(Vec::new())),
        };
        let response = chain.run(&mut ctx, &core).await;

        assert_eq!(response.status(), 500);
        assert_eq!(*log.lock().unwrap(), vec!["A.before", "A.after"]);
    }
}
