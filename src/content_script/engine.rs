//! 字段填充引擎 - 流程层
//!
//! 运行在页面上下文里，只回答两种请求：读取表单 HTML、填充字段。
//! 每个请求无论成败都恰好产生一个响应。

use anyhow::Result;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use super::field_control::{ApplyOutcome, FieldControl};
use super::protocol::{DecodedRequest, FieldAssignment, FillRequest, FillResponse};
use crate::dom::{Document, DomEvent};

/// 填充统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FillStats {
    pub filled: usize,
    pub failed: usize,
}

/// 字段填充引擎
pub struct FieldFillEngine<D> {
    document: D,
}

impl<D: Document> FieldFillEngine<D> {
    pub fn new(document: D) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /// 处理原始消息，无法识别的消息回复 "Unknown action"
    pub async fn handle_message(&self, message: &JsonValue) -> FillResponse {
        match FillRequest::from_message(message) {
            Some(DecodedRequest {
                request: FillRequest::FillFields { fields },
                malformed,
            }) => {
                let stats = self.fill_fields(&fields).await;
                FillResponse::fill_result(stats.filled, stats.failed + malformed)
            }
            Some(decoded) => self.handle(decoded.request).await,
            None => {
                warn!("收到无法识别的消息: {}", message);
                FillResponse::unknown_action()
            }
        }
    }

    /// 处理请求
    pub async fn handle(&self, request: FillRequest) -> FillResponse {
        match request {
            FillRequest::ReadForm => self.read_form().await,
            FillRequest::FillFields { fields } => {
                let stats = self.fill_fields(&fields).await;
                FillResponse::fill_result(stats.filled, stats.failed)
            }
        }
    }

    /// 读取第一个表单的 outer HTML
    pub async fn read_form(&self) -> FillResponse {
        match self.document.first_form_html().await {
            Ok(Some(html)) => {
                debug!("读取到表单 HTML，{} 字节", html.len());
                FillResponse::form_markup(html)
            }
            Ok(None) => {
                warn!("页面上没有表单");
                FillResponse::form_not_found()
            }
            Err(e) => {
                error!("读取表单失败: {:#}", e);
                FillResponse::protocol_error(e.to_string())
            }
        }
    }

    /// 依次填充字段
    ///
    /// 单个字段失败只计数，不会中断后续字段。
    pub async fn fill_fields(&self, fields: &[FieldAssignment]) -> FillStats {
        let mut stats = FillStats::default();

        for field in fields {
            match self.fill_one(field).await {
                Ok(true) => stats.filled += 1,
                Ok(false) => stats.failed += 1,
                Err(e) => {
                    warn!("填充字段 {} 出错: {:#}", field.field_id, e);
                    stats.failed += 1;
                }
            }
        }

        info!(
            "表单填充完成: 共 {} 个字段, 成功 {}, 失败 {}",
            fields.len(),
            stats.filled,
            stats.failed
        );
        stats
    }

    async fn fill_one(&self, field: &FieldAssignment) -> Result<bool> {
        let Some(element) = self.document.element_by_id(&field.field_id).await? else {
            warn!("字段不存在: {}", field.field_id);
            return Ok(false);
        };

        let control = FieldControl::classify(element);
        match control.apply_value(&self.document, &field.value).await? {
            ApplyOutcome::Applied(target) => {
                self.notify_change(&target).await?;
                Ok(true)
            }
            ApplyOutcome::Rejected(reason) => {
                warn!("字段 {} 填充失败: {}", field.field_id, reason);
                Ok(false)
            }
        }
    }

    /// 派发 input / change / blur，让页面上的响应式框架感知到变更
    async fn notify_change(&self, target: &D::Handle) -> Result<()> {
        for event in DomEvent::FILL_SEQUENCE {
            self.document.dispatch_event(target, event).await?;
        }
        Ok(())
    }
}
