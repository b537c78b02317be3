//! Two dispatchers sharing an in-memory cluster.
//!
//! Run with `RUST_LOG=debug cargo run --example two_nodes` to see the
//! dispatch decisions.

use cluster_notify::cluster::{Fallback, MemoryCluster};
use cluster_notify::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn node(cluster: &Arc<MemoryCluster>, id: &str) -> Result<ClusterDispatcher> {
    ClusterDispatcher::builder()
        .with_settings(ClusterSettings {
            node_id: Some(id.to_string()),
            ..Default::default()
        })
        .with_cluster(cluster.clone())
        .build()
}

fn printer(node: &'static str) -> Arc<dyn ResourceListener> {
    Arc::new(
        move |n: &ResourceNotification| -> std::result::Result<(), ListenerError> {
            println!("[{}] {}", node, n);
            Ok(())
        },
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cluster = MemoryCluster::new();
    let a = node(&cluster, "node-a")?;
    let b = node(&cluster, "node-b")?;

    a.add_listener("styles/roads.sld", printer("node-a"));
    b.add_listener("styles/roads.sld", printer("node-b"));
    b.add_listener("styles", printer("node-b"));

    println!("-- node-a modifies styles/roads.sld");
    a.changed(&ResourceNotification::new("styles/roads.sld", Kind::EntryModify));

    println!("-- topic goes away, node-a deletes styles/roads.sld");
    cluster.memory_topic(&a.settings().topic).disconnect();
    let delivery = a.broadcast(&ResourceNotification::new("styles/roads.sld", Kind::EntryDelete));
    assert_eq!(delivery, Delivery::LocalOnly(Fallback::PublishFailed));

    println!("-- topic is back, node-b creates styles/roads.sld");
    cluster.memory_topic(&b.settings().topic).reconnect();
    b.changed(&ResourceNotification::new("styles/roads.sld", Kind::EntryCreate));

    Ok(())
}
