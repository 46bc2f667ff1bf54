//! # Basic Usage Example
//!
//! This example demonstrates the fundamental concepts of txscope:
//! - Defining entities with `#[derive(Entity)]`
//! - Building a `PersistenceUnit` from configuration
//! - Running work inside `transactional` boundaries
//! - Opening a boundary by hand with `begin()` and closing it
//!
//! This is the perfect starting point for new users.

use txscope::prelude::*;

/// A simple task entity
#[derive(Debug, Clone, Serialize, Deserialize, Entity)]
#[entity(name = "tasks")]
pub struct Task {
    /// Identifier field, picked up because it is called `id`
    pub id: u32,
    pub title: String,
    pub done: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("🚀 txscope Basic Usage Example");
    println!("==============================");

    // 1. Setup
    println!("\n📊 Step 1: Persistence unit setup");
    println!("----------------------------------");

    let provider = MemoryProvider::new().with_unit(MemoryUnit::new("tasks"))?;
    let config = AppConfig::from_toml_str(
        r#"
        [persistence]
        unit_name = "tasks"
        "#,
    )?
    .with_env_overrides();
    let unit = PersistenceUnit::from_config(provider, &config);
    println!("✅ Unit '{}' configured", unit.unit_name().unwrap_or("<none>"));
    println!("   Factory created yet: {}", unit.is_initialized());

    // 2. Transactional work
    println!("\n📝 Step 2: Transactional writes");
    println!("-------------------------------");

    unit.transactional(|| {
        unit.persist(&Task {
            id: 1,
            title: "Write the release notes".to_string(),
            done: false,
        })?;
        unit.persist(&Task {
            id: 2,
            title: "Tag the release".to_string(),
            done: false,
        })?;
        Ok::<_, TransactionError>(())
    })?;
    println!("✅ Two tasks committed");
    println!("   Factory created yet: {}", unit.is_initialized());

    // 3. Failure rolls back
    println!("\n↩️  Step 3: Failed work rolls back");
    println!("----------------------------------");

    let result = unit.transactional(|| {
        let mut task: Task = unit.get_reference(&1)?;
        task.done = true;
        unit.merge(&task)?;
        // Duplicate id: the whole unit of work is discarded
        unit.persist(&Task {
            id: 2,
            title: "Duplicate".to_string(),
            done: false,
        })
    });
    match result {
        Ok(()) => println!("❌ Expected the duplicate to fail"),
        Err(e) => println!("✅ Rolled back: {}", e),
    }

    // 4. Manual scope
    println!("\n🔧 Step 4: Manual transaction scope");
    println!("-----------------------------------");

    let scope = unit.begin::<TransactionError>()?;
    let task: Task = unit.get_reference(&1)?;
    println!("   Task 1 done after rollback: {}", task.done);
    let open: Vec<Task> = unit.create_query("from tasks")?.result_list()?;
    println!("   {} tasks stored", open.len());
    scope.close()?;

    // 5. Outside any boundary
    println!("\n🚫 Step 5: Access outside a transaction");
    println!("---------------------------------------");

    match unit.find::<Task>(&1) {
        Err(TransactionError::OutsideTransaction) => {
            println!("✅ {}", TransactionError::OutsideTransaction)
        }
        other => println!("❌ Unexpected: {:?}", other),
    }

    let stats = unit
        .provider()
        .stats("tasks")
        .ok_or_else(|| anyhow::anyhow!("unit 'tasks' is not registered"))?;
    println!("\n📈 Provider stats: {:?}", stats);

    unit.shutdown();
    println!("\n🎉 Basic usage example completed!");
    Ok(())
}
