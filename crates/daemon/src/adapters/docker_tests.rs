// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use icarus_core::{MountKind, MountSpec};

fn spec(read_only: bool) -> SandboxSpec {
    SandboxSpec {
        name: "icarus_builder_job-a".into(),
        image: "icarus-builder:latest".into(),
        cpu_limit: 2.0,
        memory_limit_bytes: 2 * 1024 * 1024 * 1024,
        network_mode: "bridge".into(),
        env: vec![("JOB_ID".into(), "job-a".into()), ("TASK".into(), "do it".into())],
        mount: MountSpec {
            kind: MountKind::Volume,
            source: "icarus_workspace_job-a".into(),
            read_only,
        },
    }
}

#[test]
fn create_args_carry_limits_and_mount() {
    let args = create_args(&spec(false));
    let joined = args.join(" ");
    assert!(joined.starts_with("create --name icarus_builder_job-a"));
    assert!(joined.contains("--label project=icarus"));
    assert!(joined.contains("--cpus 2"));
    assert!(joined.contains("--memory 2147483648"));
    assert!(joined.contains("--network bridge"));
    assert!(joined.contains("--mount type=volume,source=icarus_workspace_job-a,target=/workspace"));
    assert!(joined.contains("-e JOB_ID=job-a"));
    assert!(joined.contains("-e TASK=do it"));
    // Image is the final positional argument
    assert_eq!(args.last().unwrap(), "icarus-builder:latest");
}

#[test]
fn read_only_mount_gets_the_flag() {
    let args = create_args(&spec(true));
    let mount = args.iter().find(|a| a.starts_with("type=volume")).unwrap();
    assert!(mount.ends_with(",readonly"));
}

#[test]
fn bind_mounts_use_the_bind_type() {
    let mut spec = spec(false);
    spec.mount.kind = MountKind::Bind;
    spec.mount.source = "/srv/icarus/job-a".into();
    let args = create_args(&spec);
    let mount = args.iter().find(|a| a.starts_with("type=bind")).unwrap();
    assert_eq!(mount, "type=bind,source=/srv/icarus/job-a,target=/workspace");
}

#[test]
fn stderr_classification() {
    assert_eq!(
        classify_stderr("Error: No such image: ghost:latest"),
        Some(DriverError::ImageNotFound("Error: No such image: ghost:latest".into()))
    );
    assert!(matches!(
        classify_stderr("write /var/lib/docker: no space left on device"),
        Some(DriverError::OutOfResources(_))
    ));
    assert!(matches!(
        classify_stderr("Error response from daemon: No such container: abc"),
        Some(DriverError::NotFound(_))
    ));
    assert!(matches!(
        classify_stderr("Error response from daemon: Container abc is not paused"),
        Some(DriverError::StateInvalid(_))
    ));
    assert_eq!(classify_stderr("something else entirely"), None);
}
