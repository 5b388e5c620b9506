//! Lifecycle tests that run without privileges.
//!
//! Mounts go through a no-op mounter and the cgroup root is a scratch
//! directory, so registry, stop, remove and commit can be driven end to end
//! against a temporary state tree.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use burrow_common::config::RuntimePaths;
use burrow_common::error::{BurrowError, Result};
use burrow_common::types::{ContainerId, ContainerStatus};
use burrow_core::cgroup::CgroupRoot;
use burrow_core::filesystem::mount::Mounter;
use burrow_runtime::context::RuntimeContext;
use burrow_runtime::engine::{Engine, RunRequest};
use burrow_runtime::init::read_command;
use burrow_runtime::process::join_command;

struct NoMounts;

impl Mounter for NoMounts {
    fn mount_overlay(&self, _options: &str, _target: &Path) -> Result<()> {
        Ok(())
    }
    fn bind_mount(&self, _source: &Path, _target: &Path) -> Result<()> {
        Ok(())
    }
    fn unmount(&self, _target: &Path, _lazy: bool) -> Result<()> {
        Ok(())
    }
}

fn engine(base: &Path) -> Engine {
    let ctx = RuntimeContext::with_parts(
        RuntimePaths::under(base),
        Arc::new(CgroupRoot::fixed(base.join("cgroup"))),
        Arc::new(NoMounts),
    );
    Engine::new(ctx)
}

#[test]
fn command_survives_the_pipe_format() {
    let argv: Vec<String> = ["/bin/sh", "-c", "echo", "hi"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let wire = join_command(&argv);
    assert_eq!(read_command(wire.as_bytes()).unwrap(), argv);
}

#[test]
fn stop_signals_process_and_clears_pid() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let pid = i32::try_from(child.id()).unwrap();

    let _ = engine
        .registry()
        .record(pid, &ContainerId::new("sleeper001"), "sleeper", "sleep 30", "", Vec::new())
        .unwrap();
    let stopped = engine.stop("sleeper").unwrap();

    assert_eq!(stopped.status, ContainerStatus::Stopped);
    assert_eq!(stopped.pid, "");
    let status = child.wait().unwrap();
    assert!(!status.success());

    let listed = engine.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, ContainerStatus::Stopped);
}

#[test]
fn stop_rejects_container_that_is_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let _ = engine
        .registry()
        .record(1, &ContainerId::new("finished01"), "done", "true", "", Vec::new())
        .unwrap();
    let _ = engine
        .registry()
        .update_status("done", ContainerStatus::Exited, "")
        .unwrap();

    assert!(matches!(
        engine.stop("done"),
        Err(BurrowError::InvalidState { .. })
    ));
    assert!(matches!(
        engine.exec("done", &["ls".to_string()]),
        Err(BurrowError::InvalidState { .. })
    ));
}

#[test]
fn stopped_container_can_be_removed() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let _ = engine
        .registry()
        .record(1, &ContainerId::new("gone000001"), "gone", "true", "/tmp/h:/data", Vec::new())
        .unwrap();
    let _ = engine
        .registry()
        .update_status("gone", ContainerStatus::Stopped, "")
        .unwrap();
    std::fs::create_dir_all(dir.path().join("overlay2/gone/upper")).unwrap();

    engine.remove("gone").unwrap();
    assert!(engine.list().unwrap().is_empty());
    assert!(!dir.path().join("overlay2/gone/upper").exists());
    assert!(matches!(
        engine.remove("gone"),
        Err(BurrowError::NotFound { .. })
    ));
}

#[test]
fn commit_packs_the_merged_root() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let merged = dir.path().join("overlay2/snap/merged");
    std::fs::create_dir_all(merged.join("etc")).unwrap();
    std::fs::write(merged.join("etc/motd"), "hello").unwrap();
    let _ = engine
        .registry()
        .record(1, &ContainerId::new("snapshot01"), "snap", "sh", "", Vec::new())
        .unwrap();

    let packed = engine.commit("snap", "snap-image").unwrap();
    assert_eq!(packed.path, dir.path().join("image/snap-image.tar"));
    assert!(packed.path.is_file());
    assert!(packed.digest.starts_with("sha256:"));
}

#[test]
fn run_validates_request_before_touching_the_host() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let empty = RunRequest {
        image: "busybox".into(),
        ..RunRequest::default()
    };
    assert!(matches!(engine.run(&empty), Err(BurrowError::Config { .. })));

    let _ = engine
        .registry()
        .record(1, &ContainerId::new("taken00001"), "taken", "sh", "", Vec::new())
        .unwrap();
    let clash = RunRequest {
        name: "taken".into(),
        image: "busybox".into(),
        command: vec!["sh".into()],
        ..RunRequest::default()
    };
    assert!(matches!(engine.run(&clash), Err(BurrowError::Config { .. })));

    let escaping = RunRequest {
        name: "../escape".into(),
        ..clash
    };
    assert!(matches!(engine.run(&escaping), Err(BurrowError::Config { .. })));
    assert!(!dir.path().join("escape").exists());
    assert!(!dir.path().join("overlay2").exists());
}

#[test]
fn detached_log_with_binary_output_is_readable() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let _ = engine
        .registry()
        .record(1, &ContainerId::new("bg00000001"), "bg", "cat", "", Vec::new())
        .unwrap();
    std::fs::write(dir.path().join("run/bg/container.log"), b"ok\n\xff\xfe binary\n").unwrap();

    assert_eq!(engine.logs("bg").unwrap(), b"ok\n\xff\xfe binary\n");
}

#[test]
fn logs_of_foreground_container_are_empty() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let _ = engine
        .registry()
        .record(1, &ContainerId::new("fg00000001"), "fg", "sh", "", Vec::new())
        .unwrap();
    assert!(engine.logs("fg").unwrap().is_empty());
}
