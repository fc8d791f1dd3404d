//! Request router
//!
//! Drives one Responses call from an authenticated request to a normalized
//! response or event stream: resolve the alias, translate, dispatch, normalize.

pub mod state;

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, AppResult, ErrorKind};
use crate::middleware::auth::Authenticated;
use crate::native::request::ResponsesRequest;
use crate::native::response::{NormalizedEvent, NormalizedResponse};
use crate::native::streaming::ResponseNormalizer;
use crate::proxy::{ByteStream, UpstreamDispatcher};
use crate::registry::{ModelRegistry, ProviderDescriptor};
use crate::routes::metrics::{record_request, record_stream_events};

pub use state::{CallState, CallTracker};

/// Normalized events for one streamed call
pub type EventStream = Pin<Box<dyn Stream<Item = NormalizedEvent> + Send>>;

/// Result of a successful dispatch
pub enum GatewayReply {
    Complete(NormalizedResponse),
    Stream(EventStream),
}

impl std::fmt::Debug for GatewayReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayReply::Complete(r) => f.debug_tuple("Complete").field(r).finish(),
            GatewayReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Routes calls to upstream providers
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<ModelRegistry>,
    dispatcher: Arc<dyn UpstreamDispatcher>,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
}

impl Gateway {
    pub fn new(
        registry: Arc<ModelRegistry>,
        dispatcher: Arc<dyn UpstreamDispatcher>,
        request_timeout: Duration,
        stream_idle_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            request_timeout,
            stream_idle_timeout,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Serve one call
    ///
    /// Errors returned here happen before any response byte is sent. Once a stream
    /// has been handed out, failures arrive as its error-flagged terminal event.
    #[instrument(skip_all, fields(model = %request.model, stream = request.stream))]
    pub async fn execute(
        &self,
        caller: &Authenticated,
        request: ResponsesRequest,
    ) -> AppResult<GatewayReply> {
        let started = Instant::now();
        let mut tracker = CallTracker::new(format!("call_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]));
        debug!(call_id = %tracker.call_id(), caller = %caller.fingerprint, "Call authenticated");

        tracker.advance(CallState::Resolving);
        let target = match self.registry.resolve(&request.model) {
            Ok(target) => target,
            Err(_) => {
                let err = AppError::UnknownModel(request.model.clone());
                return Err(fail(&mut tracker, "unknown", started, err));
            }
        };
        let alias = target.alias.as_str();
        let provider = target.provider_name();

        tracker.advance(CallState::Translating);
        if let Err(message) = request.validate() {
            return Err(fail(&mut tracker, alias, started, AppError::BadRequest(message)));
        }
        let translator = target.dialect.translator();
        let upstream = translator
            .translate_request(&request, target)
            .map_err(|e| fail(&mut tracker, alias, started, e.into_app_error(provider)))?;

        tracker.advance(CallState::Dispatching);
        info!(
            call_id = %tracker.call_id(),
            alias = %alias,
            dialect = %target.dialect,
            model = %target.native_model_id,
            stream = upstream.stream,
            "Dispatching call"
        );

        if upstream.stream {
            let opened = timeout(
                self.stream_idle_timeout,
                self.dispatcher.send_stream(target, &upstream),
            )
            .await
            .unwrap_or_else(|_| Err(AppError::UpstreamTimeout { provider: provider.to_string() }));
            let body = opened.map_err(|e| fail(&mut tracker, alias, started, e))?;

            tracker.advance(CallState::Normalizing);
            let normalizer = ResponseNormalizer::new(provider, translator.stream_decoder());
            let guard = StreamGuard::new(tracker, target, started);
            return Ok(GatewayReply::Stream(normalize_stream(
                body,
                normalizer,
                guard,
                self.stream_idle_timeout,
            )));
        }

        let value = timeout(self.request_timeout, self.dispatcher.send(target, &upstream))
            .await
            .unwrap_or_else(|_| Err(AppError::UpstreamTimeout { provider: provider.to_string() }))
            .map_err(|e| fail(&mut tracker, alias, started, e))?;

        tracker.advance(CallState::Normalizing);
        let output = translator
            .translate_response(value)
            .map_err(|e| fail(&mut tracker, alias, started, e.into_app_error(provider)))?;
        let response = NormalizedResponse::from_output(alias, output);

        tracker.advance(CallState::Completed);
        record_request("200", alias, started.elapsed().as_secs_f64());
        info!(
            call_id = %tracker.call_id(),
            alias = %alias,
            tool_calls = response.tool_calls.len(),
            elapsed_ms = %started.elapsed().as_millis(),
            "Call completed"
        );
        Ok(GatewayReply::Complete(response))
    }
}

/// Move the call to `Failed`, record it, and hand the error back
fn fail(tracker: &mut CallTracker, alias: &str, started: Instant, err: AppError) -> AppError {
    tracker.fail(err.kind());
    record_request(err.status_code().as_str(), alias, started.elapsed().as_secs_f64());
    warn!(call_id = %tracker.call_id(), alias = %alias, code = err.code(), error = %err, "Call failed");
    err
}

/// Pump upstream bytes through the normalizer under the idle deadline
fn normalize_stream(
    mut body: ByteStream,
    mut normalizer: ResponseNormalizer,
    mut guard: StreamGuard,
    idle: Duration,
) -> EventStream {
    let provider = guard.provider;
    Box::pin(async_stream::stream! {
        while !normalizer.is_finished() {
            let events = match timeout(idle, body.next()).await {
                Ok(Some(Ok(chunk))) => normalizer.push(&chunk),
                Ok(Some(Err(err))) => normalizer.fail(&err).into_iter().collect(),
                Ok(None) => normalizer.end_of_input(),
                Err(_) => {
                    let err = AppError::UpstreamTimeout { provider: provider.to_string() };
                    normalizer.fail(&err).into_iter().collect()
                }
            };
            for event in events {
                guard.observe(&event);
                yield event;
            }
        }
    })
}

/// Owns the tracker for a streamed call and reports how the stream ended,
/// including when the caller goes away before the terminal event.
struct StreamGuard {
    tracker: CallTracker,
    alias: String,
    provider: &'static str,
    started: Instant,
    events: u64,
}

impl StreamGuard {
    fn new(tracker: CallTracker, target: &ProviderDescriptor, started: Instant) -> Self {
        Self {
            tracker,
            alias: target.alias.clone(),
            provider: target.provider_name(),
            started,
            events: 0,
        }
    }

    fn observe(&mut self, event: &NormalizedEvent) {
        self.events += 1;
        if !event.done {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        match &event.error {
            None => {
                self.tracker.advance(CallState::Completed);
                record_request("200", &self.alias, elapsed);
                info!(
                    call_id = %self.tracker.call_id(),
                    alias = %self.alias,
                    events = self.events,
                    elapsed_ms = %self.started.elapsed().as_millis(),
                    "Stream completed"
                );
            }
            Some(error) => {
                self.tracker
                    .fail(ErrorKind::from_code(&error.code).unwrap_or(ErrorKind::Internal));
                record_request("stream_error", &self.alias, elapsed);
                warn!(
                    call_id = %self.tracker.call_id(),
                    alias = %self.alias,
                    provider = %self.provider,
                    code = %error.code,
                    "Stream ended with error"
                );
            }
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        record_stream_events(&self.alias, self.events);
        if !self.tracker.state().is_terminal() {
            record_request("cancelled", &self.alias, self.started.elapsed().as_secs_f64());
            info!(
                call_id = %self.tracker.call_id(),
                alias = %self.alias,
                events = self.events,
                "Caller disconnected before stream end, upstream connection released"
            );
        }
    }
}
