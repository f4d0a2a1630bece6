use crate::error::DomainResult;
use crate::model::OrderRequest;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub const ORDER_CREATE_TOPIC: &str = "order-create";

/// 已写入分区的一条消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub topic: String,
    pub key: String,
    pub partition: usize,
    pub offset: u64,
    pub payload: String,
}

impl QueueRecord {
    pub fn decode<T: DeserializeOwned>(&self) -> DomainResult<T> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// 消息生产者
#[async_trait]
pub trait OrderProducer: Send + Sync {
    /// 发布到 `topic`，相同 `partition_key` 的消息落在同一分区
    async fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        payload: String,
    ) -> DomainResult<QueueRecord>;

    /// 以 JSON 发布下单请求，按用户分区
    async fn publish_order(&self, request: &OrderRequest) -> DomainResult<QueueRecord> {
        let payload = serde_json::to_string(request)?;
        self.publish(ORDER_CREATE_TOPIC, &request.user_id.to_string(), payload)
            .await
    }
}

/// 按分区订阅消息
#[async_trait]
pub trait OrderSubscriber: Send + Sync {
    fn partitions(&self) -> usize;

    /// 返回该分区此后写入的消息流；分区不存在时报错
    async fn subscribe(
        &self,
        partition: usize,
    ) -> DomainResult<BoxStream<'static, DomainResult<QueueRecord>>>;
}
