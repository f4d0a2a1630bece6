//! 抢购并发控制领域层（flashsale-domain）
//!
//! 围绕“多个并发请求同时扣减有限资源”的超卖问题，提供：
//! - 资源实体（`model`）：库存、优惠券、用户积分、订单与商品，及其不变式；
//! - 资源存储协议（`persist`）：普通/乐观/悲观三种读取方式与原子提交，附内存实现；
//! - 缓存层（`cache`）：旁路缓存（look-aside），提交成功后再淘汰；
//! - 分布式锁（`lock`）：带等待超时、持有超时与 fencing token 的命名互斥；
//! - 消息生产者（`eventing`）：按用户分区的下单消息发布；
//! - 并发控制器（`service`）：乐观、悲观、混合与分布式锁四种扣减策略。
//!
//! 所有存储、缓存与锁句柄均通过构造参数显式注入，不依赖全局单例。
//!
pub mod cache;
pub mod domain_service;
pub mod entity;
pub mod error;
pub mod eventing;
pub mod lock;
pub mod model;
pub mod persist;
pub mod service;
pub mod value_object;

// 允许在本 crate 内部通过 ::flashsale_domain 进行自引用，
// 以便过程宏生成的路径在本 crate 内同样可以解析。
extern crate self as flashsale_domain;
