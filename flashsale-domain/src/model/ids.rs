use flashsale_macros::entity_id;
use uuid::Uuid;

#[entity_id]
pub struct StockId(i64);

#[entity_id]
pub struct CouponId(i64);

#[entity_id]
pub struct UserPointId(i64);

#[entity_id]
pub struct UserId(i64);

#[entity_id]
pub struct ProductId(i64);

#[entity_id]
pub struct OrderId(Uuid);
