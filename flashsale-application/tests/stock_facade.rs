use anyhow::Result as AnyResult;
use flashsale_application::InMemoryCommandBus;
use flashsale_application::command_bus::CommandBus;
use flashsale_application::context::AppContext;
use flashsale_application::error::AppError;
use flashsale_application::retry::RetryPolicy;
use flashsale_application::stock_facade::{DecreaseStock, DistributedLockStockFacade, StockFacade};
use flashsale_domain::cache::InMemoryCache;
use flashsale_domain::error::DomainError;
use flashsale_domain::lock::{InMemoryLockService, LockTimeouts};
use flashsale_domain::model::{ProductId, Stock, StockId};
use flashsale_domain::persist::InMemoryStore;
use flashsale_domain::service::StockService;
use std::sync::Arc;
use std::time::Duration;

const STOCK: StockId = StockId::new(1);

fn stock_service(quantity: u64) -> AnyResult<(InMemoryStore, Arc<StockService<InMemoryStore>>)> {
    let store = InMemoryStore::new();
    store.seed(Stock::new(STOCK, ProductId::new(1), quantity))?;
    let service = StockService::builder()
        .store(store.clone())
        .cache(Arc::new(InMemoryCache::new()))
        .build();
    Ok((store, Arc::new(service)))
}

fn remaining(store: &InMemoryStore) -> AnyResult<u64> {
    let stock: Stock = store.get(&STOCK)?.expect("stock");
    Ok(stock.quantity())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn retrying_facade_applies_every_decrement() -> AnyResult<()> {
    let (store, stocks) = stock_service(100)?;
    let facade = Arc::new(StockFacade::new(
        stocks,
        RetryPolicy {
            max_attempts: 10_000,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
            jitter: true,
        },
    ));

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let facade = Arc::clone(&facade);
            tokio::spawn(async move { facade.decrease(&AppContext::new(), STOCK, 1).await })
        })
        .collect();
    for task in tasks {
        task.await??;
    }

    assert_eq!(remaining(&store)?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn locked_facade_serializes_decrements() -> AnyResult<()> {
    let (store, stocks) = stock_service(100)?;
    let facade = Arc::new(DistributedLockStockFacade::new(
        stocks,
        Arc::new(InMemoryLockService::new()),
        LockTimeouts::default(),
    ));

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let facade = Arc::clone(&facade);
            tokio::spawn(async move { facade.decrease(&AppContext::new(), STOCK, 1).await })
        })
        .collect();
    for task in tasks {
        task.await??;
    }

    assert_eq!(remaining(&store)?, 0);
    Ok(())
}

#[tokio::test]
async fn overdraw_is_rejected_without_retry() -> AnyResult<()> {
    let (store, stocks) = stock_service(1)?;
    let bus = InMemoryCommandBus::new();
    bus.register::<DecreaseStock, _>(Arc::new(StockFacade::new(stocks, RetryPolicy::default())))?;

    let err = bus
        .dispatch(
            &AppContext::new(),
            DecreaseStock {
                stock_id: STOCK,
                quantity: 2,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::InsufficientQuantity { .. })
    ));
    assert_eq!(remaining(&store)?, 1);
    Ok(())
}
