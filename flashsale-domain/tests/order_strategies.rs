use anyhow::Result as AnyResult;
use flashsale_domain::cache::InMemoryCache;
use flashsale_domain::domain_service::DomainService;
use flashsale_domain::entity::Entity;
use flashsale_domain::error::DomainError;
use flashsale_domain::model::{
    Coupon, CouponId, Order, OrderId, OrderRequest, ProductId, Stock, StockId, UserId, UserPoint,
    UserPointId,
};
use flashsale_domain::persist::InMemoryStore;
use flashsale_domain::service::{
    ConcurrencyStrategy, DelayedApproval, LockPlan, OrderService, PaymentApproval,
};
use std::sync::Arc;
use std::time::Duration;

const PRODUCT: ProductId = ProductId::new(1);
const COUPON: CouponId = CouponId::new(1);
const STOCK: StockId = StockId::new(1);

fn seed(store: &InMemoryStore, stock: u64, coupons: u64, users: i64, balance: u64) -> AnyResult<()> {
    store.seed(Stock::new(STOCK, PRODUCT, stock))?;
    store.seed(Coupon::new(COUPON, "flash-sale", coupons))?;
    for n in 1..=users {
        store.seed(UserPoint::new(UserPointId::new(n), UserId::new(n), balance))?;
    }
    Ok(())
}

fn service(store: &InMemoryStore) -> Arc<OrderService<InMemoryStore>> {
    Arc::new(
        OrderService::builder()
            .store(store.clone())
            .cache(Arc::new(InMemoryCache::new()))
            .build(),
    )
}

fn slow_service(store: &InMemoryStore, delay: Duration) -> Arc<OrderService<InMemoryStore>> {
    Arc::new(
        OrderService::builder()
            .store(store.clone())
            .cache(Arc::new(InMemoryCache::new()))
            .approval(Arc::new(DelayedApproval::new(delay)) as Arc<dyn PaymentApproval>)
            .build(),
    )
}

fn request(user: i64) -> OrderRequest {
    OrderRequest::new(UserId::new(user), PRODUCT, COUPON)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pessimistic_orders_never_oversell() -> AnyResult<()> {
    let store = InMemoryStore::new();
    seed(&store, 100, 100, 100, 1000)?;
    let orders = service(&store);

    let tasks: Vec<_> = (1..=100)
        .map(|user| {
            let orders = Arc::clone(&orders);
            tokio::spawn(async move {
                orders
                    .place_order(&request(user), LockPlan::PESSIMISTIC)
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await??;
    }

    let stock: Stock = store.get(&STOCK)?.expect("stock");
    let coupon: Coupon = store.get(&COUPON)?.expect("coupon");
    assert_eq!(stock.quantity(), 0);
    assert_eq!(coupon.remaining(), 0);
    assert_eq!(store.count::<Order>()?, 100);
    for n in 1..=100 {
        let point: UserPoint = store.get_by_key(&UserId::new(n))?.expect("point");
        assert_eq!(point.balance(), 0);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn excess_demand_is_rejected_not_oversold() -> AnyResult<()> {
    let store = InMemoryStore::new();
    seed(&store, 10, 100, 30, 1000)?;
    let orders = service(&store);

    let tasks: Vec<_> = (1..=30)
        .map(|user| {
            let orders = Arc::clone(&orders);
            tokio::spawn(async move { orders.place_order(&request(user), LockPlan::HYBRID).await })
        })
        .collect();

    let mut placed = 0;
    let mut sold_out = 0;
    for task in tasks {
        match task.await? {
            Ok(_) => placed += 1,
            Err(DomainError::InsufficientQuantity { .. }) => sold_out += 1,
            Err(other) => panic!("unexpected {other:?}"),
        }
    }

    assert_eq!(placed, 10);
    assert_eq!(sold_out, 20);
    let coupon: Coupon = store.get(&COUPON)?.expect("coupon");
    assert_eq!(coupon.remaining(), 90);
    assert_eq!(store.count::<Order>()?, 10);
    Ok(())
}

#[tokio::test]
async fn insufficient_points_roll_back_everything() -> AnyResult<()> {
    let store = InMemoryStore::new();
    seed(&store, 5, 5, 1, 999)?;
    let orders = service(&store);

    let err = orders
        .place_order(&request(1), LockPlan::PESSIMISTIC)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InsufficientBalance { .. }));

    let stock: Stock = store.get(&STOCK)?.expect("stock");
    let coupon: Coupon = store.get(&COUPON)?.expect("coupon");
    assert_eq!(stock.quantity(), 5);
    assert_eq!(coupon.remaining(), 5);
    assert_eq!(store.count::<Order>()?, 0);

    // 回滚后行锁已释放，下一单可以正常执行
    store.seed(UserPoint::new(UserPointId::new(2), UserId::new(2), 1000))?;
    orders.place_order(&request(2), LockPlan::PESSIMISTIC).await?;
    Ok(())
}

#[tokio::test]
async fn missing_resources_are_reported_as_not_found() -> AnyResult<()> {
    let store = InMemoryStore::new();
    seed(&store, 5, 5, 1, 1000)?;
    let orders = service(&store);

    let no_coupon = OrderRequest::new(UserId::new(1), PRODUCT, CouponId::new(99));
    let no_user = request(42);
    for req in [no_coupon, no_user] {
        let err = orders.place_order(&req, LockPlan::OPTIMISTIC).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }), "unexpected {err:?}");
    }

    let stock: Stock = store.get(&STOCK)?.expect("stock");
    assert_eq!(stock.quantity(), 5);
    Ok(())
}

#[tokio::test]
async fn replayed_request_does_not_deduct_twice() -> AnyResult<()> {
    let store = InMemoryStore::new();
    seed(&store, 5, 5, 1, 5000)?;
    let orders = service(&store);
    let req = request(1);

    let order = orders.place_order(&req, LockPlan::PESSIMISTIC).await?;
    assert_eq!(*order.id(), OrderId::new(req.order_uid));

    let err = orders.place_order(&req, LockPlan::PESSIMISTIC).await.unwrap_err();
    assert!(matches!(err, DomainError::AlreadyExists { .. }));

    let stock: Stock = store.get(&STOCK)?.expect("stock");
    let point: UserPoint = store.get_by_key(&UserId::new(1))?.expect("point");
    assert_eq!(stock.quantity(), 4);
    assert_eq!(point.balance(), 4000);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn concurrent_optimistic_attempts_conflict_at_commit() -> AnyResult<()> {
    let store = InMemoryStore::new();
    seed(&store, 5, 5, 2, 1000)?;
    let orders = slow_service(&store, Duration::from_millis(100));

    let plan = ConcurrencyStrategy::Optimistic.lock_plan();
    let (req_a, req_b) = (request(1), request(2));
    let (a, b) = tokio::join!(
        orders.place_order(&req_a, plan),
        orders.place_order(&req_b, plan),
    );

    let failures: Vec<DomainError> = [a, b].into_iter().filter_map(Result::err).collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].is_retryable(), "unexpected {:?}", failures[0]);

    let stock: Stock = store.get(&STOCK)?.expect("stock");
    assert_eq!(stock.quantity(), 4);
    assert_eq!(store.count::<Order>()?, 1);
    Ok(())
}

#[tokio::test]
async fn executes_as_domain_service() -> AnyResult<()> {
    let store = InMemoryStore::new();
    seed(&store, 1, 1, 1, 1000)?;
    let orders = service(&store);

    let order = orders.execute((request(1), LockPlan::OPTIMISTIC)).await?;
    assert_eq!(order.user_id(), UserId::new(1));
    assert_eq!(orders.resolve_stock_id(PRODUCT).await?, STOCK);
    Ok(())
}
