use std::error::Error;
use std::sync::Arc;

use serde_json::{Map, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sluice_core::catalog::{Consumer, ConsumerDelta, ConsumerRequests, ContentUnit};
use sluice_core::impls::InMemoryCatalog;
use sluice_core::{
    ArchiveSweeper, Dispatcher, DispatcherConfig, Execution, Submitted, TaskState, WorkerGroup,
};

fn load_config() -> Result<DispatcherConfig, Box<dyn Error>> {
    match std::env::var("SLUICE_CONFIG") {
        Ok(path) => {
            info!(%path, "loading dispatcher config");
            Ok(DispatcherConfig::from_path(path)?)
        }
        Err(_) => Ok(DispatcherConfig::default()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    // (A) dispatcher + workers + archive sweeper
    let config = load_config()?;
    let weights = config.weights.clone();
    let dispatcher = Dispatcher::new(config)?;
    let workers = WorkerGroup::spawn(&dispatcher);
    let sweeper = ArchiveSweeper::spawn(&dispatcher);
    let exec = Execution::new(dispatcher.clone());

    // (B) consumer endpoints over the in-memory managers
    let catalog = Arc::new(InMemoryCatalog::new());
    let requests = ConsumerRequests::new(catalog.managers(), weights);

    let mut consumer = Consumer::new("web-01");
    consumer.display_name = Some("Web server".into());
    if let Submitted::Created(created) = exec.submit(requests.register(consumer)?).await? {
        println!("registered: {} {}", created.location.href, created.body);
    }

    if let Submitted::Created(created) = exec
        .submit(requests.bind("web-01", "fedora-updates", "yum")?)
        .await?
    {
        println!("bound: {}", created.location.href);
    }

    let delta = ConsumerDelta {
        description: Some("front tier".into()),
        ..ConsumerDelta::default()
    };
    let updated = exec.execute(requests.update("web-01", delta)?).await?;
    println!("updated: {updated}");

    // (C) async content install; the record stays queryable after completion
    let units = vec![ContentUnit::new(
        "rpm",
        Map::from_iter([("name".to_string(), json!("httpd"))]),
    )];
    let desc = requests.content("web-01", "install", units, json!({"apply": true}))?;
    if let Submitted::Handle(handle) = exec.submit(desc).await? {
        println!("install accepted: {}", handle.href.href);
        let mut status = dispatcher.subscribe(handle.task_id).await?;
        status.wait_for(|s| s.is_terminal()).await?;

        for _ in 0..2 {
            let record = exec.get_task(handle.task_id).await?;
            if record.state() == TaskState::Succeeded {
                println!("install result: {}", record.result().cloned().unwrap_or_default());
            } else {
                println!("install {}: {:?}", record.state(), record.error());
            }
        }
    }

    exec.execute(requests.unbind("web-01", "fedora-updates", "yum")?)
        .await?;
    exec.execute(requests.unregister("web-01")?).await?;

    // (D) report and stop
    let counts = dispatcher.counts().await;
    println!("counts: {}", serde_json::to_string(&counts)?);

    dispatcher.close().await;
    sweeper.shutdown_and_join().await;
    workers.shutdown_and_join().await;
    info!("done");
    Ok(())
}
