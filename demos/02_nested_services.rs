//! # Nested Services Example
//!
//! Services calling services: every method is `#[transactional]`, but only
//! the outermost call opens a boundary. Inner calls join it, so a failure
//! anywhere rolls back everything the outer call did.
//!
//! Also shows a domain error type carrying rollback failures, and one
//! `PersistenceUnit` shared between worker threads.

use std::sync::Arc;
use std::thread;
use txscope::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize, Entity)]
#[entity(name = "products")]
pub struct Product {
    #[id]
    pub sku: String,
    pub stock: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Entity)]
#[entity(name = "orders")]
pub struct Order {
    pub id: u64,
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("only {available} of '{sku}' left")]
    OutOfStock {
        sku: String,
        available: u32,
        suppressed: Vec<ProviderError>,
    },

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl GuardedError for ShopError {
    fn add_suppressed(&mut self, error: ProviderError) {
        match self {
            ShopError::OutOfStock { suppressed, .. } => suppressed.push(error),
            ShopError::Transaction(cause) => cause.add_suppressed(error),
        }
    }
}

pub struct Inventory {
    unit: Arc<PersistenceUnit<MemoryProvider>>,
}

impl Inventory {
    #[transactional(self.unit)]
    pub fn stock(&self, sku: &str, quantity: u32) -> Result<(), ShopError> {
        self.unit.persist(&Product {
            sku: sku.to_string(),
            stock: quantity,
        })?;
        Ok(())
    }

    #[transactional(self.unit)]
    pub fn take(&self, sku: &str, quantity: u32) -> Result<u32, ShopError> {
        let mut product: Product = self.unit.get_reference(&sku.to_string())?;
        if product.stock < quantity {
            return Err(ShopError::OutOfStock {
                sku: sku.to_string(),
                available: product.stock,
                suppressed: Vec::new(),
            });
        }
        product.stock -= quantity;
        self.unit.merge(&product)?;
        Ok(product.stock)
    }
}

pub struct Orders {
    unit: Arc<PersistenceUnit<MemoryProvider>>,
    inventory: Inventory,
}

impl Orders {
    /// Records the order first, then takes stock; a stock failure undoes both
    #[transactional(self.unit)]
    pub fn place(&self, id: u64, sku: &str, quantity: u32) -> Result<u32, ShopError> {
        self.unit.persist(&Order {
            id,
            sku: sku.to_string(),
            quantity,
        })?;
        tracing::info!(depth = self.unit.transaction_depth(), "order {} recorded", id);
        self.inventory.take(sku, quantity)
    }

    #[transactional(self.unit)]
    pub fn count(&self) -> Result<usize, ShopError> {
        let orders: Vec<Order> = self
            .unit
            .create_query("from orders")?
            .result_list()
            .map_err(TransactionError::from)?;
        Ok(orders.len())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("🛒 txscope Nested Services Example");
    println!("==================================");

    let provider = MemoryProvider::new().with_unit(MemoryUnit::new("shop"))?;
    let unit = Arc::new(PersistenceUnit::from_config(
        provider,
        &AppConfig::new(PersistenceConfig::new("shop")),
    ));
    let orders = Orders {
        unit: unit.clone(),
        inventory: Inventory { unit: unit.clone() },
    };

    orders.inventory.stock("widget", 5)?;
    println!("\n📦 Stocked 5 widgets");

    let left = orders.place(1, "widget", 3)?;
    println!("✅ Order 1 placed, {} widgets left", left);

    match orders.place(2, "widget", 3) {
        Err(ShopError::OutOfStock { available, .. }) => {
            println!("↩️  Order 2 rejected, {} left; its order row was rolled back", available)
        }
        other => println!("❌ Unexpected outcome: {:?}", other),
    }
    println!("📋 Orders stored: {}", orders.count()?);

    println!("\n🧵 Placing orders from worker threads");
    let orders = Arc::new(orders);
    let handles: Vec<_> = (10..14)
        .map(|id| {
            let orders = orders.clone();
            thread::spawn(move || {
                // Each worker gets its own session and its own boundary
                let sku = format!("gadget-{}", id);
                orders.inventory.stock(&sku, 2)?;
                orders.place(id, &sku, 1)
            })
        })
        .collect();
    for handle in handles {
        match handle.join() {
            Ok(Ok(left)) => println!("   order placed, {} left of its gadget", left),
            Ok(Err(e)) => println!("   order failed: {}", e),
            Err(_) => println!("   worker panicked"),
        }
    }
    println!("📋 Orders stored: {}", orders.count()?);

    if let Some(stats) = unit.provider().stats("shop") {
        println!(
            "\n📈 {} sessions, {} commits, {} rollbacks",
            stats.sessions_opened, stats.commits, stats.rollbacks
        );
    }

    println!("\n🎉 Nested services example completed!");
    Ok(())
}
