use std::{convert::Infallible, pin::Pin, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use futures::stream::{self, Stream};

use crate::context::ServerContext;
use crate::protocol::handle_payload;
use crate::registry::Registry;
use crate::session::{Session, SessionHandle};
use ops_events::ServerEvent;

/// The stateless-POST shape from §4.3: one ambient session backs every
/// request on this router, which is the right fit for a process launched on
/// behalf of a single operator.
#[derive(Clone)]
struct HttpState {
    ctx: Arc<ServerContext>,
    registry: Arc<Registry>,
    session: SessionHandle,
}

pub fn router(ctx: Arc<ServerContext>, registry: Arc<Registry>, default_profile: &str) -> Router {
    let state = HttpState { ctx, registry, session: Session::handle(default_profile) };
    Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/events", get(handle_events))
        .with_state(state)
}

async fn handle_rpc(State(state): State<HttpState>, body: String) -> impl IntoResponse {
    match handle_payload(state.ctx.clone(), state.session.clone(), state.registry.clone(), &body).await {
        Some(raw) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], raw).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// No replay buffer exists behind this endpoint, so a reconnect carrying
/// `Last-Event-ID` can't be resumed. Per §4.1's fallback rule the socket is
/// closed cleanly instead of silently opening a fresh live stream the client
/// would mistake for a continuation.
async fn handle_events(State(state): State<HttpState>, headers: HeaderMap) -> Sse<EventStream> {
    if headers.contains_key("last-event-id") {
        let closed: EventStream = Box::pin(stream::empty());
        return Sse::new(closed).keep_alive(KeepAlive::default());
    }

    let receiver = state.ctx.events.subscribe();
    let live: EventStream = Box::pin(event_stream(receiver));
    Sse::new(live).keep_alive(KeepAlive::default())
}

fn event_stream(
    receiver: tokio::sync::broadcast::Receiver<ServerEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((Ok(to_sse_event(event)), receiver)),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

fn to_sse_event(event: ServerEvent) -> Event {
    match event {
        ServerEvent::Notification { method, params } => {
            let payload = serde_json::json!({ "method": method, "params": params });
            Event::default().event("notification").data(payload.to_string())
        }
        ServerEvent::Ping => Event::default().event("ping").data("{}"),
    }
}
