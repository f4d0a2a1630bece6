use anyhow::Result;
use flashsale_application::config::AppConfig;
use flashsale_application::context::AppContext;
use flashsale_application::error::AppError;
use flashsale_application::order_consumer::OrderConsumer;
use flashsale_application::order_facade::OrderFacade;
use flashsale_application::stock_facade::DistributedLockStockFacade;
use flashsale_application::telemetry;
use flashsale_domain::cache::{Cache, InMemoryCache};
use flashsale_domain::eventing::InMemoryOrderProducer;
use flashsale_domain::lock::InMemoryLockService;
use flashsale_domain::model::{
    Coupon, CouponId, Order, OrderRequest, Product, ProductId, Stock, StockId, UserId, UserPoint,
    UserPointId,
};
use flashsale_domain::persist::InMemoryStore;
use flashsale_domain::service::{ConcurrencyStrategy, OrderService, ProductService, StockService};
use std::sync::Arc;
use std::time::{Duration, Instant};

const BUYERS: i64 = 100;
const PRODUCT: ProductId = ProductId::new(1);
const COUPON: CouponId = CouponId::new(1);
const STOCK: StockId = StockId::new(1);

/// 一组共享依赖：存储、缓存、锁服务与消息队列均显式构造后注入
struct World {
    store: InMemoryStore,
    cache: Arc<InMemoryCache>,
    locks: Arc<InMemoryLockService>,
    producer: Arc<InMemoryOrderProducer>,
    facade: Arc<OrderFacade<InMemoryStore>>,
}

fn build_world(config: &AppConfig, stock: u64) -> Result<World> {
    let store = InMemoryStore::with_lock_wait(config.row_lock_wait);
    store.seed(Product::new(PRODUCT, "limited sneakers", 129_000))?;
    store.seed(Stock::new(STOCK, PRODUCT, stock))?;
    store.seed(Coupon::new(COUPON, "flash-sale", stock))?;
    for n in 1..=BUYERS {
        store.seed(UserPoint::new(UserPointId::new(n), UserId::new(n), config.point_cost))?;
    }

    let cache = Arc::new(InMemoryCache::new());
    let locks = Arc::new(InMemoryLockService::new());
    let producer = Arc::new(InMemoryOrderProducer::new(config.partitions, config.queue_capacity));
    let orders = OrderService::builder()
        .store(store.clone())
        .cache(cache.clone() as Arc<dyn Cache>)
        .point_cost(config.point_cost)
        .build();
    let facade = OrderFacade::builder()
        .orders(Arc::new(orders))
        .locks(locks.clone())
        .producer(producer.clone())
        .lock_timeouts(config.lock)
        .retry(config.retry)
        .build();

    Ok(World {
        store,
        cache,
        locks,
        producer,
        facade: Arc::new(facade),
    })
}

async fn run_strategy(config: &AppConfig, strategy: ConcurrencyStrategy, stock: u64) -> Result<()> {
    let world = build_world(config, stock)?;
    let started = Instant::now();

    let tasks: Vec<_> = (1..=BUYERS)
        .map(|user| {
            let facade = world.facade.clone();
            tokio::spawn(async move {
                let request = OrderRequest::new(UserId::new(user), PRODUCT, COUPON);
                facade.place_order(&AppContext::new(), &request, strategy).await
            })
        })
        .collect();

    let (mut placed, mut rejected) = (0u32, 0u32);
    for task in tasks {
        match task.await? {
            Ok(_) => placed += 1,
            Err(err) => {
                rejected += 1;
                tracing::debug!(%strategy, error = %err, "order rejected");
            }
        }
    }

    let remaining: Stock = world
        .store
        .get(&STOCK)?
        .ok_or_else(|| anyhow::anyhow!("stock row missing"))?;
    tracing::info!(
        %strategy,
        placed,
        rejected,
        remaining = remaining.quantity(),
        orders = world.store.count::<Order>()?,
        conflicts = world.facade.conflict_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "strategy finished"
    );
    Ok(())
}

async fn run_queued(config: &AppConfig, stock: u64) -> Result<()> {
    let world = build_world(config, stock)?;
    let consumer = Arc::new(
        OrderConsumer::builder()
            .facade(world.facade.clone())
            .subscriber(world.producer.clone())
            .strategy(config.strategy)
            .build(),
    );
    let handle = consumer.start().await?;

    for user in 1..=BUYERS {
        let request = OrderRequest::new(UserId::new(user), PRODUCT, COUPON);
        world.facade.submit(&request).await?;
    }

    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let stats = handle.stats();
        if stats.placed + stats.rejected + stats.duplicates + stats.malformed + stats.lost >= BUYERS as u64
            || Instant::now() >= deadline
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.shutdown();
    let stats = handle.join().await?;

    tracing::info!(
        strategy = %config.strategy,
        placed = stats.placed,
        rejected = stats.rejected,
        lost = stats.lost,
        orders = world.store.count::<Order>()?,
        "queued orders drained"
    );
    Ok(())
}

async fn run_catalog(config: &AppConfig) -> Result<()> {
    let world = build_world(config, 10)?;
    let products = ProductService::builder()
        .store(world.store.clone())
        .cache(world.cache.clone() as Arc<dyn Cache>)
        .ttl(config.cache_ttl)
        .build();
    let stocks = Arc::new(
        StockService::builder()
            .store(world.store.clone())
            .cache(world.cache.clone() as Arc<dyn Cache>)
            .ttl(config.cache_ttl)
            .build(),
    );
    let locked = DistributedLockStockFacade::new(stocks.clone(), world.locks.clone(), config.lock);

    let product = products.get_product(PRODUCT).await?;
    let before = stocks.get_stock_quantity(STOCK).await?;
    let after = locked.decrease(&AppContext::new(), STOCK, 3).await?;
    let reread = stocks.get_stock_quantity(STOCK).await?;
    tracing::info!(
        product = %product.name,
        price = product.price,
        before,
        after,
        reread,
        cache = ?world.cache.stats(),
        "catalog and stock reads"
    );

    match locked.decrease(&AppContext::new(), STOCK, 100).await {
        Err(AppError::Domain(err)) if err.is_business_rejection() => {
            tracing::info!(error = %err, "overdraw rejected")
        }
        other => tracing::warn!(?other, "unexpected overdraw outcome"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    telemetry::init_tracing(&config.log_filter)?;
    tracing::info!(?config, "flash-sale demo starting");

    // 充足与不足两种库存
    for stock in [BUYERS as u64, BUYERS as u64 / 2] {
        for strategy in ConcurrencyStrategy::ALL {
            run_strategy(&config, strategy, stock).await?;
        }
    }

    run_queued(&config, BUYERS as u64 / 2).await?;
    run_catalog(&config).await?;
    Ok(())
}
