//! End-to-end install runs against stub package managers.

use std::sync::{Arc, Mutex};

use installium::executor::InstallExecutor;
use installium::reporter::ResultReporter;
use installium::{run_install, InstallJob, JobState, OutcomeStatus, PackageFile};
use tokio_util::sync::CancellationToken;

use super::{deb_file, stub_descriptor, stub_installer};

#[tokio::test]
async fn test_successful_install_streams_output() {
    let (_dir, path) = deb_file("hello_2.10-3_amd64.deb");
    let installer = stub_installer(r#"echo "Unpacking $1"; echo "Setting up hello""#);

    let mut lines = Vec::new();
    let outcome = installer
        .install(&path, |line| lines.push(line.to_string()), CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(outcome.raw_exit_code, Some(0));
    assert_eq!(outcome.status.exit_code(), 0);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Unpacking "));
    assert!(lines[0].ends_with("hello_2.10-3_amd64.deb"));
    assert_eq!(lines[1], "Setting up hello");
}

#[tokio::test]
async fn test_job_walks_through_states() {
    let (_dir, path) = deb_file("hello.deb");
    let installer = stub_installer("exit 0");

    let plan = installer.plan(&path).unwrap();
    let job = InstallExecutor::default()
        .run(plan.into_job(), |_| {}, CancellationToken::new())
        .await;

    assert_eq!(
        job.history,
        vec![JobState::Pending, JobState::Running, JobState::Succeeded]
    );
    assert!(job.pid.is_some());
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());
    assert!(job.duration().is_some());
}

#[tokio::test]
async fn test_already_installed_is_classified() {
    let (_dir, path) = deb_file("hello.deb");
    let installer =
        stub_installer("echo 'dpkg: package hello is already installed' >&2; exit 1");

    let outcome = installer
        .install(&path, |_| {}, CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::AlreadyInstalled);
    assert_eq!(outcome.raw_exit_code, Some(1));
    assert_eq!(outcome.exit_code(true), 1);
    assert_eq!(outcome.exit_code(false), 4);
}

#[tokio::test]
async fn test_dependency_failure_keeps_output_tail() {
    let (_dir, path) = deb_file("hello.deb");
    let installer = stub_installer(
        "for i in 1 2 3 4 5 6 7; do echo \"line $i\"; done; \
         echo 'dpkg: dependency problems prevent configuration of hello' >&2; exit 1",
    )
    .with_reporter(ResultReporter::new(3));

    let outcome = installer
        .install(&path, |_| {}, CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::MissingDependency);
    assert_eq!(outcome.output_tail.len(), 3);
    assert!(outcome.output_tail[2].contains("dependency problems"));
}

#[tokio::test]
async fn test_unrecognised_failure() {
    let (_dir, path) = deb_file("hello.deb");
    let installer = stub_installer("echo 'something odd happened'; exit 42");

    let outcome = installer
        .install(&path, |_| {}, CancellationToken::new())
        .await;

    assert_eq!(outcome.status, OutcomeStatus::UnknownFailure);
    assert_eq!(outcome.raw_exit_code, Some(42));
    assert_eq!(outcome.exit_code(true), 42);
    assert!(outcome.message.contains("42"));
}

#[tokio::test]
async fn test_run_install_with_hand_built_job() {
    let (_dir, path) = deb_file("hello.deb");
    let descriptor = stub_descriptor("echo done");
    let command = descriptor.command_for(&path);
    let job = InstallJob::new(PackageFile::new(&path), descriptor, command);

    let outcome = run_install(job, |_| {}, CancellationToken::new()).await;
    assert!(outcome.status.is_success());
}

#[tokio::test]
async fn test_spawned_install_reports_back() {
    let (_dir, path) = deb_file("hello.deb");
    let installer = Arc::new(stub_installer("echo from-task"));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let handle = installer.spawn_install(
        path,
        move |line| sink.lock().unwrap().push(line.to_string()),
        CancellationToken::new(),
    );

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(*seen.lock().unwrap(), vec!["from-task".to_string()]);
}

#[tokio::test]
async fn test_plan_failures_never_spawn() {
    let installer = stub_installer("exit 0");

    let outcome = installer
        .install(
            std::path::Path::new("/nonexistent/hello.deb"),
            |_| panic!("nothing should run"),
            CancellationToken::new(),
        )
        .await;
    assert_eq!(outcome.status, OutcomeStatus::PackageMissing);

    let outcome = installer
        .install(
            std::path::Path::new("/tmp/hello.rpm"),
            |_| panic!("nothing should run"),
            CancellationToken::new(),
        )
        .await;
    assert_eq!(outcome.status, OutcomeStatus::BackendNotFound);
}
