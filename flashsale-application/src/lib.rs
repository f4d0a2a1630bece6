//! 抢购应用层（flashsale-application）
//!
//! 在领域服务之外编排横切关注点：
//! - 乐观冲突的有界重试（指数退避 + 抖动），耗尽后以 `RetryExhausted` 报告；
//! - 分布式锁的获取顺序与失败回退；
//! - 基于 `CancellationToken` 的取消；
//! - 命令总线、下单消息的发布与消费；
//! - 环境变量配置与 tracing 初始化。
//!
pub mod command;
pub mod command_bus;
pub mod command_handler;
pub mod config;
pub mod context;
pub mod error;
pub mod inmemory_command_bus;
pub mod order_consumer;
pub mod order_facade;
pub mod retry;
pub mod stock_facade;
pub mod telemetry;

pub use inmemory_command_bus::InMemoryCommandBus;
