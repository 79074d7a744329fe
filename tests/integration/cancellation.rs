//! Cancelling a running install terminates the child and reports `cancelled`.

use std::time::Duration;

use installium::executor::InstallExecutor;
use installium::reporter::ResultReporter;
use installium::{JobState, OutcomeStatus};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tokio_util::sync::CancellationToken;

use super::{deb_file, stub_installer};

#[tokio::test]
async fn test_cancel_running_install() {
    let (_dir, path) = deb_file("slow.deb");
    let installer = stub_installer("echo started; exec sleep 30");
    let plan = installer.plan(&path).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let executor = InstallExecutor::new(Duration::from_secs(2));

    let job = tokio::time::timeout(
        Duration::from_secs(15),
        executor.run(
            plan.into_job(),
            move |line| {
                if line == "started" {
                    trigger.cancel();
                }
            },
            cancel,
        ),
    )
    .await
    .expect("cancelled job should finish well before the sleep does");

    assert!(job.is_cancelled());
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.history.last(), Some(&JobState::Failed));
    assert_eq!(job.captured_output, vec!["started".to_string()]);

    let pid = job.pid.expect("child was spawned") as i32;
    assert!(
        kill(Pid::from_raw(pid), None).is_err(),
        "child process should be gone after cancellation"
    );

    let outcome = ResultReporter::default().report(job);
    assert_eq!(outcome.status, OutcomeStatus::Cancelled);
    assert_eq!(outcome.exit_code(true), 130);
}

#[tokio::test]
async fn test_cancel_through_installer() {
    let (_dir, path) = deb_file("slow.deb");
    let installer = stub_installer("exec sleep 30");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(15),
        installer.install(&path, |_| {}, cancel),
    )
    .await
    .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Cancelled);
}
