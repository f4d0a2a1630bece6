//! 下单消息消费者（OrderConsumer）
//!
//! 每个分区一个长驻任务，顺序处理该分区的消息：解码下单请求后交给 `OrderFacade` 落单。
//! 订单主键取自请求的 `order_uid`，重复投递的消息在提交时以 `AlreadyExists` 被识别并跳过。
//! 订阅者落后导致跳过的消息计入 `lost`。通过 `ConsumerHandle` 关闭与等待。
//!
use crate::context::AppContext;
use crate::error::AppError;
use crate::order_facade::OrderFacade;
use bon::Builder;
use flashsale_domain::error::{DomainError, DomainResult};
use flashsale_domain::eventing::{ORDER_CREATE_TOPIC, OrderSubscriber, QueueRecord};
use flashsale_domain::model::OrderRequest;
use flashsale_domain::persist::ResourceStore;
use flashsale_domain::service::ConcurrencyStrategy;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Builder)]
pub struct OrderConsumer<S: ResourceStore> {
    facade: Arc<OrderFacade<S>>,
    subscriber: Arc<dyn OrderSubscriber>,
    #[builder(default = ConcurrencyStrategy::Pessimistic)]
    strategy: ConcurrencyStrategy,
}

/// 消费计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub placed: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub malformed: u64,
    /// 因消费落后而未能读到的消息数
    pub lost: u64,
}

#[derive(Default)]
struct Counters {
    placed: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    malformed: AtomicU64,
    lost: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            placed: self.placed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }
}

impl<S: ResourceStore> OrderConsumer<S> {
    /// 订阅全部分区并启动消费任务
    ///
    /// 订阅在返回前完成，此后发布的消息都会被消费。
    pub async fn start(self: Arc<Self>) -> Result<ConsumerHandle, AppError> {
        let token = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let partitions = self.subscriber.partitions();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(partitions);

        for partition in 0..partitions {
            let stream = self.subscriber.subscribe(partition).await?;
            tasks.push(tokio::spawn(Self::consume_loop(
                self.clone(),
                partition,
                stream,
                token.clone(),
                counters.clone(),
            )));
        }

        tracing::info!(partitions, strategy = %self.strategy, "order consumer started");
        Ok(ConsumerHandle {
            token,
            tasks,
            counters,
        })
    }

    async fn consume_loop(
        self: Arc<Self>,
        partition: usize,
        mut stream: BoxStream<'static, DomainResult<QueueRecord>>,
        token: CancellationToken,
        counters: Arc<Counters>,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                next = stream.next() => match next {
                    Some(Ok(record)) => self.handle(&record, &token, &counters).await,
                    Some(Err(DomainError::Lagged { skipped, .. })) => {
                        counters.lost.fetch_add(skipped, Ordering::Relaxed);
                        tracing::error!(partition, skipped, "consumer lagged, records lost");
                    }
                    Some(Err(err)) => tracing::warn!(partition, error = %err, "partition stream error"),
                    None => break,
                },
            }
        }
        tracing::debug!(partition, "partition consumer stopped");
    }

    async fn handle(&self, record: &QueueRecord, token: &CancellationToken, counters: &Counters) {
        if record.topic != ORDER_CREATE_TOPIC {
            return;
        }

        let request: OrderRequest = match record.decode() {
            Ok(request) => request,
            Err(err) => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(partition = record.partition, offset = record.offset, error = %err, "malformed order record");
                return;
            }
        };

        let ctx = AppContext::new()
            .with_parent(token)
            .with_idempotency_key(request.order_uid.to_string());
        match self.facade.place_order(&ctx, &request, self.strategy).await {
            Ok(_) => {
                counters.placed.fetch_add(1, Ordering::Relaxed);
            }
            Err(AppError::Domain(DomainError::AlreadyExists { .. })) => {
                counters.duplicates.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(order_uid = %request.order_uid, offset = record.offset, "duplicate delivery skipped");
            }
            Err(err) => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(order_uid = %request.order_uid, offset = record.offset, error = %err, "order record rejected");
            }
        }
    }
}

/// 消费者运行句柄：用于优雅关闭与等待任务结束
pub struct ConsumerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl ConsumerHandle {
    pub fn stats(&self) -> ConsumerStats {
        self.counters.snapshot()
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// 等待全部分区任务结束；任一任务异常退出时返回 `TaskFailed`
    pub async fn join(mut self) -> Result<ConsumerStats, AppError> {
        let tasks = std::mem::take(&mut self.tasks);

        let mut failure = None;
        for (partition, t) in tasks.into_iter().enumerate() {
            if let Err(err) = t.await {
                tracing::error!(partition, error = %err, "partition consumer task failed");
                if failure.is_none() {
                    failure = Some(AppError::TaskFailed(format!("partition {partition}: {err}")));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(self.counters.snapshot()),
        }
    }
}
