//! 资源实体
//!
//! 库存（`Stock`）、优惠券（`Coupon`）、用户积分（`UserPoint`）为被并发扣减的有限资源，
//! 订单（`Order`）只追加不修改，商品（`Product`）为只读目录数据。
//!
mod coupon;
mod ids;
mod order;
mod product;
mod stock;
mod user_point;

pub use coupon::Coupon;
pub use ids::{CouponId, OrderId, ProductId, StockId, UserId, UserPointId};
pub use order::{Order, OrderRequest};
pub use product::Product;
pub use stock::Stock;
pub use user_point::UserPoint;

use crate::entity::Entity;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;

/// 资源种类
///
/// 声明顺序即全局加锁顺序：优惠券 → 库存 → 积分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Coupon,
    Stock,
    UserPoint,
    Product,
    Order,
}

impl ResourceKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Coupon => "coupon",
            ResourceKind::Stock => "stock",
            ResourceKind::UserPoint => "user_point",
            ResourceKind::Product => "product",
            ResourceKind::Order => "order",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 由资源存储托管的实体
///
/// 除主键外，每类资源还声明一个查找键：库存按商品、积分按用户查找。
pub trait Resource: Entity + Clone + Debug + 'static {
    const KIND: ResourceKind;

    type LookupKey: Clone + Eq + Hash + Display + Debug + Send + Sync + 'static;

    fn lookup_key(&self) -> Self::LookupKey;
}
