#![allow(clippy::unwrap_used)]
// End-to-end batch runs against the scripted Manager, on a paused clock.

mod common;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use orbit_core::{
    BatchStatus, CancellationToken, ControlDevice, CoreError, Device, DeviceState, EdgeDevice,
    FailureKind, OnboardingConfig, OnboardingCoordinator, PollSettings,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;

use common::{FakeManager, config, config_group, edge_row, endpoint, reachable, template};

fn coordinator(fake: &Arc<FakeManager>, config: OnboardingConfig) -> OnboardingCoordinator {
    OnboardingCoordinator::new(Arc::clone(fake) as Arc<dyn orbit_core::ManagerApi>, endpoint(), config)
}

fn controller(ip: &str) -> Device {
    Device::Controller(ControlDevice::new(ip.parse::<IpAddr>().unwrap()))
}

fn validator(ip: &str) -> Device {
    Device::Validator(ControlDevice::new(ip.parse::<IpAddr>().unwrap()))
}

/// An edge the Manager already knows about, reachable once its
/// certificate is installed.
fn known_edge(fake: &FakeManager, serial: &str, system_ip: Ipv4Addr) -> EdgeDevice {
    let row = edge_row(serial, false);
    let ip = system_ip.to_string();
    fake.edit(|s| {
        s.status.push(reachable(&row.uuid, Some(&ip)));
        s.vedges.push(row);
    });
    EdgeDevice::new(serial, system_ip, 100)
}

fn edge_template_columns() -> Vec<String> {
    [
        "csv-status",
        "csv-deviceId",
        "csv-deviceIP",
        "csv-host-name",
        "//system/host-name",
        "//system/system-ip",
        "//system/site-id",
        "hostname",
        "vpn0_inet_ip",
    ]
    .map(String::from)
    .to_vec()
}

// ── Controllers and validators ──────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn control_devices_register_and_become_ready() {
    let fake = FakeManager::new();
    let coordinator = coordinator(&fake, config());

    let report = coordinator
        .run(
            vec![controller("10.0.0.12"), validator("10.0.0.11")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::AllReady);
    let outcome = report.outcome("10.0.0.12").unwrap();
    assert_eq!(outcome.state, DeviceState::Ready);
    assert_eq!(outcome.uuid.as_deref(), Some("10.0.0.12-uuid"));
    assert_eq!(
        outcome.visited,
        vec![
            DeviceState::Pending,
            DeviceState::Authenticating,
            DeviceState::Accepted,
            DeviceState::Reachable,
            DeviceState::Ready,
        ]
    );
    assert_eq!(fake.count("register-device"), 2);
    assert_eq!(fake.read(|s| (s.logins, s.logouts)), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn device_password_falls_back_to_own_password() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.device_passwords.insert("10.0.0.12".into(), "s3cret".into());
    });
    let device = Device::Controller(
        ControlDevice::new("10.0.0.12".parse().unwrap())
            .with_password(SecretString::from("s3cret".to_string())),
    );

    let report = coordinator(&fake, config())
        .run(vec![device], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome("10.0.0.12").unwrap().state, DeviceState::Ready);
    assert_eq!(
        fake.read(|s| s.registrations.clone()),
        vec![
            ("10.0.0.12".to_owned(), "admin".to_owned()),
            ("10.0.0.12".to_owned(), "s3cret".to_owned()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_device_passwords_fail_with_credential_error() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.device_passwords.insert("10.0.0.12".into(), "unknown".into());
    });
    let device = Device::Controller(
        ControlDevice::new("10.0.0.12".parse().unwrap())
            .with_password(SecretString::from("s3cret".to_string())),
    );

    let report = coordinator(&fake, config())
        .run(vec![device], &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("10.0.0.12").unwrap();
    assert_eq!(outcome.state, DeviceState::Failed(FailureKind::CredentialError));
    let error = outcome.error.as_deref().unwrap();
    assert!(error.contains("primary, fallback"), "{error}");
    assert!(!error.contains("s3cret"), "{error}");
    assert_eq!(fake.count("register-device"), 2);
}

#[tokio::test(start_paused = true)]
async fn one_missing_controller_does_not_sink_the_batch() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.phantom.insert("10.0.0.13".into());
    });

    let report = coordinator(&fake, config())
        .run(
            vec![controller("10.0.0.12"), controller("10.0.0.13"), controller("10.0.0.14")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::PartialFailure);
    assert!(report.error.is_none());
    assert_eq!(report.outcome("10.0.0.12").unwrap().state, DeviceState::Ready);
    assert_eq!(report.outcome("10.0.0.14").unwrap().state, DeviceState::Ready);
    assert_eq!(
        report.outcome("10.0.0.13").unwrap().state,
        DeviceState::Failed(FailureKind::DeviceNotFound)
    );
}

// ── Idempotence ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn second_run_skips_everything_without_mutations() {
    let fake = FakeManager::new();
    let edge = known_edge(&fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1));
    let devices = vec![controller("10.0.0.12"), Device::Edge(edge)];
    let coordinator = coordinator(&fake, config());

    let first = coordinator.run(devices.clone(), &CancellationToken::new()).await.unwrap();
    assert_eq!(first.status, BatchStatus::AllReady);
    let mutations = fake.read(|s| s.mutations);
    assert!(mutations > 0);

    let second = coordinator.run(devices, &CancellationToken::new()).await.unwrap();

    assert_eq!(second.status, BatchStatus::AllReady);
    for outcome in second.outcomes.values() {
        assert_eq!(outcome.state, DeviceState::Skipped, "{}", outcome.identifier);
        assert!(outcome.uuid.is_some());
    }
    assert_eq!(fake.read(|s| s.mutations), mutations);
}

#[tokio::test(start_paused = true)]
async fn existing_controller_is_reused_when_not_skipping() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        let row = common::controller_row("10.0.0.12");
        s.status.push(reachable(&row.uuid, None));
        s.controllers.push(row);
    });
    let config = OnboardingConfig {
        skip_existing: false,
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(vec![controller("10.0.0.12")], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome("10.0.0.12").unwrap().state, DeviceState::Ready);
    assert_eq!(fake.count("register-device"), 0);
}

// ── Edges ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn edge_with_template_walks_every_stage() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.templates = vec![template("edge-tpl")];
        s.template_columns = edge_template_columns();
    });
    let edge = known_edge(&fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1))
        .with_template("edge-tpl")
        .with_value("hostname", "edge1")
        .with_value("vpn0_inet_ip", "172.16.0.2/24");

    let report = coordinator(&fake, config())
        .run(vec![Device::Edge(edge)], &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("C8K-1").unwrap();
    assert_eq!(
        outcome.visited,
        vec![
            DeviceState::Pending,
            DeviceState::Authenticating,
            DeviceState::Accepted,
            DeviceState::CertPending,
            DeviceState::CertInstalled,
            DeviceState::Reachable,
            DeviceState::Attaching,
            DeviceState::Ready,
        ]
    );
    assert_eq!(outcome.uuid.as_deref(), Some("C8K-1-uuid"));

    let attachments = fake.read(|s| s.attachments.clone());
    assert_eq!(attachments.len(), 1);
    let values = &attachments[0].values;
    assert_eq!(attachments[0].template_id, "edge-tpl-id");
    assert_eq!(values["csv-deviceId"], "C8K-1-uuid");
    assert_eq!(values["//system/system-ip"], "1.1.1.1");
    assert_eq!(values["vpn0_inet_ip"], "172.16.0.2/24");
}

#[tokio::test(start_paused = true)]
async fn missing_template_variable_is_named() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.templates = vec![template("edge-tpl")];
        s.template_columns = edge_template_columns();
    });
    let edge = known_edge(&fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1))
        .with_template("edge-tpl")
        .with_value("hostname", "edge1");

    let report = coordinator(&fake, config())
        .run(vec![Device::Edge(edge)], &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("C8K-1").unwrap();
    assert_eq!(outcome.state, DeviceState::Failed(FailureKind::TemplateVariableError));
    assert_eq!(
        outcome.error.as_deref(),
        Some("Missing required template variables: vpn0_inet_ip")
    );
    assert_eq!(fake.count("attach-template"), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_template_fails_edge() {
    let fake = FakeManager::new();
    let edge = known_edge(&fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1)).with_template("nope");

    let report = coordinator(&fake, config())
        .run(vec![Device::Edge(edge)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.outcome("C8K-1").unwrap().state,
        DeviceState::Failed(FailureKind::TemplateNotFound)
    );
}

#[tokio::test(start_paused = true)]
async fn config_group_below_threshold_is_unsupported() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.version = "20.9.3".into();
        s.config_groups = vec![config_group("branch-cg")];
    });
    let edge =
        known_edge(&fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1)).with_config_group("branch-cg");

    let report = coordinator(&fake, config())
        .run(vec![Device::Edge(edge)], &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("C8K-1").unwrap();
    assert_eq!(outcome.state, DeviceState::Failed(FailureKind::UnsupportedFeature));
    assert!(outcome.error.as_deref().unwrap().contains("20.9.3"));
    for call in ["list-config-groups", "associate-config-group", "deploy-config-group", "attach-template"] {
        assert_eq!(fake.count(call), 0, "{call}");
    }
}

#[tokio::test(start_paused = true)]
async fn config_group_is_associated_and_deployed() {
    let fake = FakeManager::new();
    fake.edit(|s| s.config_groups = vec![config_group("branch-cg")]);
    let edges: Vec<Device> = ["C8K-1", "C8K-2"]
        .into_iter()
        .zip(1u8..)
        .map(|(serial, n)| {
            Device::Edge(
                known_edge(&fake, serial, Ipv4Addr::new(1, 1, 1, n)).with_config_group("branch-cg"),
            )
        })
        .collect();

    let report = coordinator(&fake, config())
        .run(edges, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::AllReady);
    for serial in ["C8K-1", "C8K-2"] {
        let outcome = report.outcome(serial).unwrap();
        assert_eq!(outcome.state, DeviceState::Ready, "{serial}");
        assert!(outcome.visited.contains(&DeviceState::Attaching), "{serial}");
    }
    assert_eq!(fake.count("associate-config-group"), 2);
    assert_eq!(fake.count("set-config-group-variables"), 2);
    assert_eq!(fake.count("deploy-config-group"), 2);
    assert_eq!(fake.count("about"), 1);
}

#[tokio::test(start_paused = true)]
async fn edge_certified_by_an_earlier_push_is_still_attached() {
    let fake = FakeManager::new();
    fake.edit(|s| s.config_groups = vec![config_group("branch-cg")]);
    let edges: Vec<Device> = ["C8K-1", "C8K-2"]
        .into_iter()
        .zip(1u8..)
        .map(|(serial, n)| {
            Device::Edge(
                known_edge(&fake, serial, Ipv4Addr::new(1, 1, 1, n)).with_config_group("branch-cg"),
            )
        })
        .collect();
    let config = OnboardingConfig {
        workers: 1,
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(edges, &CancellationToken::new())
        .await
        .unwrap();

    // C8K-1's push installed both certificates before C8K-2 started.
    let second = report.outcome("C8K-2").unwrap();
    assert_eq!(second.state, DeviceState::Ready);
    assert_eq!(second.visited.last(), Some(&DeviceState::Ready));
    assert!(second.visited.contains(&DeviceState::Attaching));
    assert_eq!(fake.count("deploy-config-group"), 2);
    // One snapshot read, then one certificate poll per edge.
    assert_eq!(fake.count("list-vedges"), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_attach_task_reports_activity() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.config_groups = vec![config_group("branch-cg")];
        s.task_failure = Some("Failed to update configuration".into());
    });
    let edge =
        known_edge(&fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1)).with_config_group("branch-cg");

    let report = coordinator(&fake, config())
        .run(vec![Device::Edge(edge)], &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("C8K-1").unwrap();
    assert_eq!(outcome.state, DeviceState::Failed(FailureKind::AttachmentFailed));
    assert!(outcome.error.as_deref().unwrap().contains("Failed to update configuration"));
}

#[tokio::test(start_paused = true)]
async fn unknown_edge_is_not_found() {
    let fake = FakeManager::new();
    let edge = EdgeDevice::new("SN-GHOST", Ipv4Addr::new(1, 1, 1, 9), 9);

    let report = coordinator(&fake, config())
        .run(vec![Device::Edge(edge)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::Failed);
    assert_eq!(
        report.outcome("SN-GHOST").unwrap().state,
        DeviceState::Failed(FailureKind::DeviceNotFound)
    );
}

#[tokio::test(start_paused = true)]
async fn certificate_that_never_installs_times_out() {
    let fake = FakeManager::new();
    fake.edit(|s| s.install_on_push = false);
    let edge = known_edge(&fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1));
    let started = tokio::time::Instant::now();

    let report = coordinator(&fake, config())
        .run(vec![Device::Edge(edge)], &CancellationToken::new())
        .await
        .unwrap();

    let outcome = report.outcome("C8K-1").unwrap();
    assert_eq!(outcome.state, DeviceState::Failed(FailureKind::OnboardingTimeout));
    assert_eq!(outcome.uuid.as_deref(), Some("C8K-1-uuid"));
    let tail = outcome.visited[outcome.visited.len() - 2..].to_vec();
    assert_eq!(
        tail,
        vec![DeviceState::CertPending, DeviceState::Failed(FailureKind::OnboardingTimeout)]
    );
    // One inventory lookup, then five certificate polls at 0, 2, 4, 6, 8s.
    assert_eq!(fake.count("list-vedges"), 6);
    assert!(started.elapsed() < Duration::from_secs(11));
}

// ── Batch behaviour ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn worker_pool_bounds_concurrency() {
    let fake = FakeManager::new();
    fake.edit(|s| s.call_delay = Duration::from_millis(50));
    let devices: Vec<Device> = (1..=20).map(|n| controller(&format!("10.0.1.{n}"))).collect();
    let config = OnboardingConfig {
        workers: 3,
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(devices, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::AllReady);
    assert_eq!(report.outcomes.len(), 20);
    let peak = fake.peak_concurrency();
    assert!(peak <= 3, "peak concurrency {peak}");
    assert!(peak > 1, "workers never overlapped");
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_running_and_queued_devices() {
    let fake = FakeManager::new();
    fake.edit(|s| s.reachable_on_register = false);
    let devices: Vec<Device> = (1..=5).map(|n| controller(&format!("10.0.2.{n}"))).collect();
    let config = OnboardingConfig {
        workers: 2,
        deadline: Some(Duration::from_secs(15)),
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(devices, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::Cancelled);
    assert_eq!(report.outcomes.len(), 5);
    for outcome in report.outcomes.values() {
        assert_eq!(outcome.state, DeviceState::Failed(FailureKind::Cancelled));
    }

    // The two in-flight devices were registered and keep their UUID.
    let mut registered: Vec<String> =
        fake.read(|s| s.registrations.iter().map(|(ip, _)| ip.clone()).collect());
    registered.sort();
    assert_eq!(registered, vec!["10.0.2.1", "10.0.2.2"]);
    assert_eq!(report.outcome("10.0.2.1").unwrap().uuid.as_deref(), Some("10.0.2.1-uuid"));

    // Queued devices never left Pending.
    let queued = report.outcome("10.0.2.5").unwrap();
    assert_eq!(
        queued.visited,
        vec![DeviceState::Pending, DeviceState::Failed(FailureKind::Cancelled)]
    );
    assert!(queued.uuid.is_none());
    assert_eq!(fake.read(|s| s.logouts), 1);
}

#[tokio::test(start_paused = true)]
async fn fail_fast_stops_the_batch_on_first_failure() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.phantom.insert("10.0.3.1".into());
    });
    let devices: Vec<Device> = (1..=3).map(|n| controller(&format!("10.0.3.{n}"))).collect();
    let config = OnboardingConfig {
        workers: 1,
        fail_fast: true,
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(devices, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::Failed);
    let error = report.error.as_ref().unwrap();
    assert_eq!(error.kind, FailureKind::DeviceNotFound);
    assert_eq!(error.device.as_deref(), Some("10.0.3.1"));
    assert_eq!(
        report.outcome("10.0.3.2").unwrap().state,
        DeviceState::Failed(FailureKind::Cancelled)
    );
    assert_eq!(fake.count("register-device"), 1);
}

#[tokio::test(start_paused = true)]
async fn worker_panic_keeps_outcomes_already_reported() {
    let fake = FakeManager::new();
    fake.edit(|s| {
        s.controllers.push(common::controller_row("10.0.9.1"));
        s.panic_on = Some("list-device-status");
    });
    let devices = vec![controller("10.0.9.1"), controller("10.0.9.2"), controller("10.0.9.3")];
    let config = OnboardingConfig {
        workers: 1,
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(devices, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::PartialFailure);
    assert_eq!(report.outcome("10.0.9.1").unwrap().state, DeviceState::Skipped);
    assert_eq!(
        report.outcome("10.0.9.2").unwrap().state,
        DeviceState::Failed(FailureKind::Internal)
    );
    let orphan = report.outcome("10.0.9.3").unwrap();
    assert_eq!(orphan.state, DeviceState::Failed(FailureKind::Internal));
    assert!(orphan.error.as_deref().unwrap().contains("no onboarding worker"));
    assert_eq!(fake.read(|s| s.logouts), 1);
}

// ── Control-plane phase ─────────────────────────────────────────────

/// A controller that only comes up after 7s, and an edge that is ready to
/// go from the start.
fn slow_control_plane(fake: &Arc<FakeManager>) -> Vec<Device> {
    fake.edit(|s| s.reachable_on_register = false);
    let edge = known_edge(fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1));
    let up = Arc::clone(fake);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        up.mark("controller-up");
        up.edit(|s| s.status.push(reachable("10.0.0.12-uuid", None)));
    });
    vec![Device::Edge(edge), controller("10.0.0.12")]
}

#[tokio::test(start_paused = true)]
async fn edges_wait_for_the_control_plane() {
    let fake = FakeManager::new();
    let devices = slow_control_plane(&fake);

    let report = coordinator(&fake, config())
        .run(devices, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::AllReady);
    let up = fake.first("controller-up").unwrap();
    let first_edge_call = fake.first("set-edge-validity").unwrap();
    assert!(first_edge_call > up, "{:?}", fake.calls());
}

#[tokio::test(start_paused = true)]
async fn edges_start_at_once_without_control_plane_phase() {
    let fake = FakeManager::new();
    let devices = slow_control_plane(&fake);
    let config = OnboardingConfig {
        wait_for_control_plane: false,
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(devices, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::AllReady);
    let up = fake.first("controller-up").unwrap();
    let first_edge_call = fake.first("set-edge-validity").unwrap();
    assert!(first_edge_call < up, "{:?}", fake.calls());
}

#[tokio::test(start_paused = true)]
async fn deadline_during_control_phase_never_touches_edges() {
    let fake = FakeManager::new();
    fake.edit(|s| s.reachable_on_register = false);
    let edge = known_edge(&fake, "C8K-1", Ipv4Addr::new(1, 1, 1, 1));
    let config = OnboardingConfig {
        deadline: Some(Duration::from_secs(5)),
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(vec![controller("10.0.0.12"), Device::Edge(edge)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::Cancelled);
    let edge = report.outcome("C8K-1").unwrap();
    assert_eq!(
        edge.visited,
        vec![DeviceState::Pending, DeviceState::Failed(FailureKind::Cancelled)]
    );
    assert_eq!(fake.count("set-edge-validity"), 0);
    assert_eq!(fake.count("push-edge-list"), 0);
}

#[tokio::test(start_paused = true)]
async fn session_failure_fails_every_device() {
    let fake = FakeManager::new();
    fake.edit(|s| s.accounts.clear());

    let report = coordinator(&fake, config())
        .run(
            vec![controller("10.0.0.12"), validator("10.0.0.11")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::Failed);
    let error = report.error.as_ref().unwrap();
    assert_eq!(error.kind, FailureKind::CredentialError);
    assert!(error.is_session_failure());
    for outcome in report.outcomes.values() {
        assert_eq!(outcome.state, DeviceState::Failed(FailureKind::CredentialError));
    }
    assert!(fake.calls().is_empty());
    assert_eq!(fake.read(|s| s.logouts), 0);
}

#[tokio::test(start_paused = true)]
async fn external_cancel_before_start_contacts_nothing() {
    let fake = FakeManager::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = coordinator(&fake, config())
        .run(vec![controller("10.0.0.12")], &cancel)
        .await
        .unwrap();

    assert_eq!(report.status, BatchStatus::Cancelled);
    assert!(report.error.is_none());
    assert_eq!(
        report.outcome("10.0.0.12").unwrap().state,
        DeviceState::Failed(FailureKind::Cancelled)
    );
    assert!(fake.read(|s| s.login_attempts.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn duplicate_identifiers_are_rejected_up_front() {
    let fake = FakeManager::new();

    let err = coordinator(&fake, config())
        .run(
            vec![controller("10.0.0.12"), validator("10.0.0.12")],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidBatch { .. }));
    assert!(fake.read(|s| s.login_attempts.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn report_serializes_states_and_status() {
    let fake = FakeManager::new();
    let report = coordinator(&fake, config())
        .run(vec![controller("10.0.0.12")], &CancellationToken::new())
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "all-ready");
    assert_eq!(json["outcomes"]["10.0.0.12"]["state"], "Ready");
    assert_eq!(json["outcomes"]["10.0.0.12"]["kind"], "controller");
}

#[tokio::test(start_paused = true)]
async fn reachability_uses_configured_poll() {
    let fake = FakeManager::new();
    fake.edit(|s| s.reachable_on_register = false);
    let config = OnboardingConfig {
        reachability_poll: PollSettings::new(Duration::from_secs(5), Duration::from_secs(10)),
        ..config()
    };

    let report = coordinator(&fake, config)
        .run(vec![controller("10.0.0.12")], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.outcome("10.0.0.12").unwrap().state,
        DeviceState::Failed(FailureKind::OnboardingTimeout)
    );
    assert_eq!(fake.count("list-device-status"), 2);
}
