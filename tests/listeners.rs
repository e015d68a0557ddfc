//! Real listener bring-up through the supervisor, checked over HTTP.

use std::sync::Arc;

use broker_controller::lifecycle::{Collaborators, Supervisor, SupervisorState};
use broker_controller::net::{ListenerSubsystem, TcpListenerSubsystem};
use broker_controller::observability::diagnostics;
use serde_json::Value;

mod common;
use common::{NoMlock, API_LISTENER, CLUSTER_LISTENER};

#[tokio::test]
async fn api_and_cluster_listeners_serve_their_own_health_routes() {
    let dir = tempfile::tempdir().unwrap();
    let listeners_toml = format!("{}{}", API_LISTENER, CLUSTER_LISTENER);
    let path = common::write_config(dir.path(), "", &listeners_toml);
    let listeners = Arc::new(TcpListenerSubsystem::new());

    let mut supervisor = Supervisor::new(
        common::config_args(&path),
        Collaborators {
            listeners: listeners.clone(),
            locker: Arc::new(NoMlock),
        },
    );
    let mut reloaded = supervisor.take_reload_ack().unwrap();
    let handle = supervisor.handle();
    let mut state = supervisor.state();
    let task = common::spawn(supervisor);

    common::wait_for_state(&mut state, SupervisorState::Running).await;
    let addrs = listeners.local_addrs();
    assert_eq!(addrs.len(), 2);

    let client = reqwest::Client::new();
    let api: Value = client
        .get(format!("http://{}/v1/health", addrs[0]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(api["status"], "ok");
    assert_eq!(api["purpose"], "api");

    let cluster = client
        .get(format!("http://{}/cluster/health", addrs[1]))
        .send()
        .await
        .unwrap();
    assert!(cluster.status().is_success());

    let wrong = client
        .get(format!("http://{}/cluster/health", addrs[0]))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), reqwest::StatusCode::NOT_FOUND);

    let dump = diagnostics::capture_dump(&listeners.tasks());
    for addr in &addrs {
        assert!(dump.contains(&format!("task listener {}: running", addr)));
    }

    // Plaintext listeners reload as a no-op.
    handle.reload();
    reloaded.recv().await.unwrap();

    handle.shutdown();
    common::join(task).await.unwrap();
}
