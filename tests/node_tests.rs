//! Node operation failure paths that need no live cluster

use ocs_harness::error::HarnessError;
use ocs_harness::node;
use ocs_harness::remote::Executor;
use std::time::Instant;

#[tokio::test]
async fn reboot_fails_fast_when_node_is_unreachable() {
    // Nothing listens on port 1, so the connect fails before the shutdown
    // command could ever start. That must surface as an SSH error right
    // away, not get mistaken for a connection severed by the reboot and
    // burn the whole wait budget probing a node that never went down.
    let exec = Executor::new("root", "/nonexistent/key");
    let started = Instant::now();
    let err = node::reboot_by_command(&exec, "127.0.0.1:1", 60, 1)
        .await
        .expect_err("unreachable node must not look like a reboot in progress");
    assert!(matches!(err, HarnessError::Ssh { .. }), "got {err:?}");
    assert!(
        started.elapsed().as_secs() < 30,
        "connect failure should not be waited out"
    );
}
