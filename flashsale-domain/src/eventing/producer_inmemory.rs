//! 内存版消息队列（InMemoryOrderProducer）
//!
//! 每个分区一个 `tokio::sync::broadcast` 通道与递增偏移量。分区号由分区键哈希取模得到，
//! 同一分区内偏移量分配与发送在同一把锁内完成，订阅者看到的顺序与偏移量一致。
//!
//! 没有任何订阅者时发布失败且不占用偏移量；订阅者落后超过缓冲区容量时，
//! 流中以 `Lagged` 报告被跳过的条数。

use super::{OrderProducer, OrderSubscriber, QueueRecord};
use crate::error::{DomainError, DomainResult};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

struct Partition {
    tx: broadcast::Sender<QueueRecord>,
    next_offset: Mutex<u64>,
}

#[derive(Clone)]
pub struct InMemoryOrderProducer {
    partitions: Arc<Vec<Partition>>,
}

impl InMemoryOrderProducer {
    /// `partitions` 至少为 1；`capacity` 为每个分区的广播缓冲区容量
    pub fn new(partitions: usize, capacity: usize) -> Self {
        let partitions = (0..partitions.max(1))
            .map(|_| {
                let (tx, _rx) = broadcast::channel(capacity.max(1));
                Partition {
                    tx,
                    next_offset: Mutex::new(0),
                }
            })
            .collect();
        Self {
            partitions: Arc::new(partitions),
        }
    }

    pub fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions.len() as u64) as usize
    }
}

#[async_trait]
impl OrderProducer for InMemoryOrderProducer {
    async fn publish(
        &self,
        topic: &str,
        partition_key: &str,
        payload: String,
    ) -> DomainResult<QueueRecord> {
        let partition = self.partition_for(partition_key);
        let slot = &self.partitions[partition];

        let record = {
            let mut next_offset = slot.next_offset.lock();
            let record = QueueRecord {
                topic: topic.to_string(),
                key: partition_key.to_string(),
                partition,
                offset: *next_offset,
                payload,
            };
            slot.tx.send(record.clone()).map_err(|_| DomainError::Publish {
                reason: format!("no subscriber on partition {partition}"),
            })?;
            *next_offset += 1;
            record
        };

        tracing::debug!(topic, key = partition_key, partition, offset = record.offset, "record published");
        Ok(record)
    }
}

#[async_trait]
impl OrderSubscriber for InMemoryOrderProducer {
    fn partitions(&self) -> usize {
        self.partitions.len()
    }

    async fn subscribe(
        &self,
        partition: usize,
    ) -> DomainResult<BoxStream<'static, DomainResult<QueueRecord>>> {
        let slot = self.partitions.get(partition).ok_or_else(|| DomainError::Publish {
            reason: format!("unknown partition {partition}"),
        })?;
        let stream = BroadcastStream::new(slot.tx.subscribe()).map(move |r| {
            r.map_err(|err| match err {
                BroadcastStreamRecvError::Lagged(skipped) => DomainError::Lagged { partition, skipped },
            })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventing::ORDER_CREATE_TOPIC;
    use crate::model::{CouponId, OrderRequest, ProductId, UserId};

    #[tokio::test]
    async fn same_key_lands_in_same_partition_in_order() {
        let producer = InMemoryOrderProducer::new(4, 16);
        let request = OrderRequest::new(UserId::new(7), ProductId::new(1), CouponId::new(1));
        let partition = producer.partition_for("7");
        let mut stream = producer.subscribe(partition).await.unwrap();

        let first = producer.publish_order(&request).await.unwrap();
        let second = producer.publish_order(&request).await.unwrap();
        assert_eq!(first.partition, partition);
        assert_eq!(second.offset, first.offset + 1);

        let got = stream.next().await.unwrap().unwrap();
        assert_eq!(got.topic, ORDER_CREATE_TOPIC);
        assert_eq!(got.offset, first.offset);
        let decoded: OrderRequest = got.decode().unwrap();
        assert_eq!(decoded, request);
        assert_eq!(stream.next().await.unwrap().unwrap().offset, second.offset);
    }

    #[tokio::test]
    async fn publish_without_subscriber_fails_and_keeps_offset() {
        let producer = InMemoryOrderProducer::new(1, 4);
        let request = OrderRequest::new(UserId::new(1), ProductId::new(1), CouponId::new(1));

        let err = producer.publish_order(&request).await.unwrap_err();
        assert!(matches!(err, DomainError::Publish { .. }));

        let mut stream = producer.subscribe(0).await.unwrap();
        let record = producer.publish_order(&request).await.unwrap();
        assert_eq!(record.offset, 0);
        assert_eq!(stream.next().await.unwrap().unwrap().offset, 0);
    }

    #[tokio::test]
    async fn slow_subscriber_sees_lagged_count() {
        let producer = InMemoryOrderProducer::new(1, 2);
        let request = OrderRequest::new(UserId::new(1), ProductId::new(1), CouponId::new(1));
        let mut stream = producer.subscribe(0).await.unwrap();

        for _ in 0..5 {
            producer.publish_order(&request).await.unwrap();
        }

        match stream.next().await.unwrap() {
            Err(DomainError::Lagged { partition, skipped }) => {
                assert_eq!(partition, 0);
                assert_eq!(skipped, 3);
            }
            other => panic!("expected lag, got {other:?}"),
        }
        assert_eq!(stream.next().await.unwrap().unwrap().offset, 3);
        assert_eq!(stream.next().await.unwrap().unwrap().offset, 4);
    }

    #[tokio::test]
    async fn unknown_partition_is_rejected() {
        let producer = InMemoryOrderProducer::new(2, 16);
        assert!(producer.subscribe(5).await.is_err());
    }
}
