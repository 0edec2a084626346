//! 异步消息通道
//!
//! 每个请求附带一个一次性的 [`Responder`]，回复会消耗它，
//! 因此一个请求最多只能被回复一次；丢弃未回复的 Responder 会让请求方收到
//! [`ChannelError::NoResponse`]，不会一直挂起。

use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::engine::FieldFillEngine;
use super::protocol::{FillRequest, FillResponse};
use crate::dom::Document;
use crate::error::ChannelError;

/// 回复句柄
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<JsonValue>,
}

impl Responder {
    /// 发送回复
    ///
    /// # 返回
    /// 请求方已经不再等待时返回 false
    pub fn send(self, response: &FillResponse) -> bool {
        let value = serde_json::to_value(response).unwrap_or_else(|e| json!({ "error": e.to_string() }));
        self.tx.send(value).is_ok()
    }
}

/// 一条待处理的消息
#[derive(Debug)]
pub struct Envelope {
    message: JsonValue,
    responder: Responder,
}

impl Envelope {
    pub fn message(&self) -> &JsonValue {
        &self.message
    }

    pub fn into_parts(self) -> (JsonValue, Responder) {
        (self.message, self.responder)
    }
}

/// 发送端（侧边栏 / UI）
#[derive(Debug, Clone)]
pub struct MessageClient {
    tx: mpsc::Sender<Envelope>,
}

impl MessageClient {
    /// 发送请求并等待响应
    pub async fn send(&self, request: &FillRequest) -> Result<FillResponse, ChannelError> {
        let message = serde_json::to_value(request)?;
        let reply = self.send_raw(message).await?;
        Ok(serde_json::from_value(reply)?)
    }

    /// 发送任意 JSON 消息并等待原始响应
    pub async fn send_raw(&self, message: JsonValue) -> Result<JsonValue, ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                responder: Responder { tx },
            })
            .await
            .map_err(|_| ChannelError::Closed)?;
        rx.await.map_err(|_| ChannelError::NoResponse)
    }
}

/// 接收端（页面上下文）
#[derive(Debug)]
pub struct MessageListener {
    rx: mpsc::Receiver<Envelope>,
}

impl MessageListener {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// 创建一对消息通道端点
pub fn channel(buffer: usize) -> (MessageClient, MessageListener) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (MessageClient { tx }, MessageListener { rx })
}

/// 逐个处理请求，直到所有发送端都被丢弃
pub async fn serve<D: Document>(mut listener: MessageListener, engine: &FieldFillEngine<D>) {
    while let Some(envelope) = listener.recv().await {
        let (message, responder) = envelope.into_parts();
        let response = engine.handle_message(&message).await;
        if !responder.send(&response) {
            debug!("请求方已放弃等待响应");
        }
    }
    info!("消息通道已关闭，内容脚本退出");
}

/// 在后台任务中运行内容脚本
pub fn spawn_content_script<D>(listener: MessageListener, engine: Arc<FieldFillEngine<D>>) -> JoinHandle<()>
where
    D: Document + 'static,
{
    tokio::spawn(async move { serve(listener, &engine).await })
}
