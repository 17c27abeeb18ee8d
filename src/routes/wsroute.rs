//! Live publication endpoint.
//!
//! `GET /ws?intent=rides|chats|places` upgrades to a WebSocket and streams
//! the caller's publication: one JSON frame per record in the snapshot
//! (as `added` events), then the live deltas. Anonymous callers get an open
//! socket that never delivers records; the subscription underneath is empty.

use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::middleware::MaybeCaller;
use crate::state::AppState;
use crate::sync::{Subscription, SyncEvent};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamIntent {
    Rides,
    Chats,
    Places,
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub intent: StreamIntent,
}

/// Serialize a subscription into a stream of JSON text frames: snapshot
/// records first, then deltas. The forwarding task ends when either side
/// goes away.
fn frame_stream<T>(sub: Subscription<T>) -> UnboundedReceiver<String>
where
    T: Serialize + Send + 'static,
{
    let (tx, rx) = unbounded_channel();
    tokio::spawn(async move {
        for record in sub.snapshot {
            let Ok(frame) = serde_json::to_string(&SyncEvent::Added { record }) else {
                continue;
            };
            if tx.send(frame).is_err() {
                return;
            }
        }
        let mut events = sub.events;
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(frame) => {
                    if tx.send(frame).is_err() {
                        return;
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to serialize publication event"),
            }
        }
    });
    rx
}

struct WsSession {
    frames: Option<UnboundedReceiver<String>>,
    hb: Instant,
    heartbeat: Duration,
    client_timeout: Duration,
}

impl WsSession {
    fn new(frames: UnboundedReceiver<String>, heartbeat: Duration, client_timeout: Duration) -> Self {
        Self {
            frames: Some(frames),
            hb: Instant::now(),
            heartbeat,
            client_timeout,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let client_timeout = self.client_timeout;
        ctx.run_interval(self.heartbeat, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > client_timeout {
                tracing::warn!("WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        if let Some(frames) = self.frames.take() {
            ctx.add_stream(UnboundedReceiverStream::new(frames));
        }
    }
}

// Publication frames forwarded to the client.
impl StreamHandler<String> for WsSession {
    fn handle(&mut self, frame: String, ctx: &mut Self::Context) {
        ctx.text(frame);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                // The publication socket is one-way; mutations go through REST.
                tracing::warn!("inbound WebSocket data ignored");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(?reason, "WebSocket close received");
                ctx.stop();
            }
            _ => {}
        }
    }
}

/// **Endpoint**: `GET /ws?intent=rides|chats|places`
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    caller: MaybeCaller,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let caller = caller.0;
    tracing::info!(intent = ?query.intent, caller = ?caller, "publication socket opened");

    let frames = match query.intent {
        StreamIntent::Rides => frame_stream(state.publisher.publish_my_rides(caller)),
        StreamIntent::Chats => frame_stream(state.publisher.publish_my_chats(caller)),
        StreamIntent::Places => frame_stream(state.publisher.publish_my_places(caller)),
    };

    let session = WsSession::new(
        frames,
        Duration::from_secs(state.config.ws_heartbeat_secs),
        Duration::from_secs(state.config.ws_client_timeout_secs),
    );
    ws::start(session, &req, stream)
}
