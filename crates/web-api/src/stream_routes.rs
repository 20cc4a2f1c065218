//! SSE 实时流接口
//!
//! 把广播器的订阅出口桥接到一个有界 mpsc 通道：推送循环调用
//! `try_send`，客户端断开或通道积压都会立即失败，由广播器的
//! 连续失败计数负责清理订阅。

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use application::{SinkError, StreamBroadcaster, StreamEvent, SubscriberSink};

use crate::state::AppState;

const CHANNEL_CAPACITY: usize = 32;

struct ChannelSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl SubscriberSink for ChannelSink {
    fn push(&self, event: &StreamEvent) -> Result<(), SinkError> {
        self.tx.try_send(event.clone()).map_err(|err| match err {
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
            mpsc::error::TrySendError::Full(_) => {
                SinkError::Failed("订阅通道积压".to_string())
            }
        })
    }
}

pub async fn product_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    subscribe_sse(&state.product_stream).await
}

pub async fn analytics_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    subscribe_sse(&state.analytics_stream).await
}

async fn subscribe_sse(
    broadcaster: &Arc<StreamBroadcaster>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    broadcaster.subscribe(Arc::new(ChannelSink { tx })).await;

    let stream = ReceiverStream::new(rx).map(|frame| {
        let event = Event::default().event(frame.event.clone());
        let event = match serde_json::to_string(&frame.data) {
            Ok(json) => event.data(json),
            Err(err) => {
                tracing::warn!(error = %err, "SSE 帧序列化失败");
                event.data("{}")
            }
        };
        Ok::<Event, Infallible>(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
