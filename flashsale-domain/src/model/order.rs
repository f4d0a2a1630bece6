use super::{CouponId, OrderId, ProductId, Resource, ResourceKind, UserId};
use crate::value_object::Version;
use chrono::{DateTime, Utc};
use flashsale_macros::entity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 下单请求
///
/// 同时作为消息队列 `order-create` 主题的载荷，字段以 camelCase 序列化。
/// `order_uid` 在请求生成时确定，作为订单主键，重放同一请求不会重复扣减。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub coupon_id: CouponId,
    pub order_uid: Uuid,
}

impl OrderRequest {
    pub fn new(user_id: UserId, product_id: ProductId, coupon_id: CouponId) -> Self {
        Self {
            user_id,
            product_id,
            coupon_id,
            order_uid: Uuid::new_v4(),
        }
    }
}

/// 订单：创建后不可变
#[entity(id = OrderId)]
#[derive(PartialEq, Eq)]
pub struct Order {
    user_id: UserId,
    product_id: ProductId,
    coupon_id: CouponId,
    created_at: DateTime<Utc>,
}

impl Order {
    pub fn place(request: &OrderRequest) -> Self {
        Self {
            id: OrderId::new(request.order_uid),
            version: Version::new(),
            user_id: request.user_id,
            product_id: request.product_id,
            coupon_id: request.coupon_id,
            created_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn coupon_id(&self) -> CouponId {
        self.coupon_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Resource for Order {
    const KIND: ResourceKind = ResourceKind::Order;
    type LookupKey = OrderId;

    fn lookup_key(&self) -> OrderId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    #[test]
    fn request_payload_uses_camel_case() {
        let request = OrderRequest::new(UserId::new(1), ProductId::new(2), CouponId::new(3));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["userId"], 1);
        assert_eq!(json["productId"], 2);
        assert_eq!(json["couponId"], 3);
        assert_eq!(json["orderUid"], request.order_uid.to_string());

        let back: OrderRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn order_id_comes_from_request() {
        let request = OrderRequest::new(UserId::new(1), ProductId::new(2), CouponId::new(3));
        let order = Order::place(&request);
        assert_eq!(order.id().into_inner(), request.order_uid);
        assert_eq!(order.user_id(), request.user_id);
    }
}
