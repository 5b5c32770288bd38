use padkernel::errors::KernelError;
use padkernel::job::{Command, JobId, JobOutput, KernelClient, KernelConfig};
use padkernel::tessellate::Tessellation;
use padkernel::{BooleanOp, Profile};
use serde_json::json;
use std::time::{Duration, Instant};

mod support;

use crate::support::{SlowExecutor, approx_eq, cube_at, square_with_hole};

fn slow_client(config: KernelConfig, delay: Duration) -> (KernelClient, SlowExecutor) {
    let executor = SlowExecutor::new(delay);
    let shared = executor.clone();
    let client = KernelClient::with_executor(config, move |_| shared.clone()).expect("client");
    (client, executor)
}

#[tokio::test]
async fn sanitize_then_pad_then_refine() {
    let client = KernelClient::new(KernelConfig::default()).expect("client");

    let clean = client
        .sanitize_profile(square_with_hole())
        .await
        .expect("sanitize");
    assert_eq!(clean.outer, square_with_hole().outer);
    assert!(padkernel::sketch::signed_area(&clean.holes[0]) < 0.0);

    let preview = client
        .pad_preview(clean, 2.0, Some(Tessellation { chord: Some(0.5), angle: Some(15.0) }))
        .await
        .expect("pad preview");
    assert!(preview.mesh.triangle_count() > 0);
    assert_eq!(preview.mesh.validate(), Ok(()));
    assert!(approx_eq(preview.shape.volume(), 6.0, 1e-9));

    let refined = client
        .tessellate_refine(
            preview.shape.clone(),
            Tessellation { chord: Some(0.01), angle: Some(2.0) },
        )
        .await
        .expect("refine");
    assert_eq!(refined, preview.mesh);

    let composed = client
        .boolean_preview(
            BooleanOp::Subtract,
            preview.shape,
            cube_at(0.0, 0.0, 1.0, 2.0),
            None,
        )
        .await
        .expect("boolean preview");
    assert!(approx_eq(composed.shape.volume(), 3.0, 1e-6));

    assert_eq!(client.in_flight(), 0);
    client.shutdown().await;
}

#[tokio::test]
async fn stage_failure_is_reported() {
    let client = KernelClient::new(KernelConfig::default()).expect("client");
    let bowtie = Profile::polygon(&[[0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0]]);
    let err = client.pad_preview(bowtie, 1.0, None).await.expect_err("bowtie");
    match err {
        KernelError::Kernel(message) => assert!(message.contains("SelfIntersection")),
        other => panic!("unexpected error {other:?}"),
    }
    client.shutdown().await;
}

#[tokio::test]
async fn stalled_worker_times_out() {
    let (client, _) = slow_client(KernelConfig::default(), Duration::from_secs(2));
    let started = Instant::now();
    let err = client
        .submit(
            Command::SanitizeProfile {
                profile: Profile::square(1.0),
            },
            Some(Duration::from_millis(50)),
        )
        .await
        .expect_err("timeout");
    let elapsed = started.elapsed();

    assert!(matches!(err, KernelError::Timeout));
    assert_eq!(err.to_string(), "Worker timeout");
    assert!(elapsed >= Duration::from_millis(45), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "{elapsed:?}");
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn unknown_command_over_the_wire() {
    let client = KernelClient::new(KernelConfig::default()).expect("client");
    let err = client
        .submit_wire(json!({"cmd": "EXPLODE"}), None)
        .await
        .expect_err("unknown");
    assert_eq!(err.to_string(), "Unknown cmd: EXPLODE");

    let profile = client
        .submit_wire(
            json!({
                "id": JobId::new(),
                "cmd": "SANITIZE_PROFILE",
                "profile": {"outer": [{"x": 0, "y": 0}, {"x": 0, "y": 1}, {"x": 1, "y": 0}]}
            }),
            None,
        )
        .await
        .expect("sanitize");
    assert_eq!(profile["outer"].as_array().map(Vec::len), Some(3));
    assert_eq!(profile["holes"], json!([]));
    client.shutdown().await;
}

#[tokio::test]
async fn cancelled_job_is_skipped() {
    let (client, executor) = slow_client(KernelConfig::default(), Duration::from_millis(200));
    let queued = JobId::new();
    let command = || Command::SanitizeProfile {
        profile: Profile::square(1.0),
    };

    let (first, second, cancelled) = tokio::join!(
        client.submit(command(), None),
        client.submit_with_id(queued.clone(), command(), None),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            client.cancel(&queued)
        },
    );

    assert!(matches!(first, Ok(JobOutput::Profile(_))));
    assert!(matches!(second, Err(KernelError::Cancelled)));
    assert!(cancelled);

    client.shutdown().await;
    assert_eq!(executor.ran(), 1);
}

#[tokio::test]
async fn reused_id_is_refused_while_in_flight() {
    let (client, executor) = slow_client(KernelConfig::default(), Duration::from_millis(100));
    let id = JobId::from("shared");
    let command = || Command::SanitizeProfile {
        profile: Profile::square(1.0),
    };

    let (first, second) = tokio::join!(
        client.submit_with_id(id.clone(), command(), None),
        client.submit_with_id(id.clone(), command(), None),
    );

    assert!(matches!(first, Ok(JobOutput::Profile(_))), "{first:?}");
    match second {
        Err(KernelError::DuplicateJob(dup)) => assert_eq!(dup, id),
        other => panic!("expected a duplicate id error, got {other:?}"),
    }

    // Once answered, the id is free again
    let again = client.submit_with_id(id, command(), None).await;
    assert!(again.is_ok());

    client.shutdown().await;
    assert_eq!(executor.ran(), 2);
}

#[tokio::test]
async fn in_flight_jobs_are_bounded() {
    let config = KernelConfig {
        max_in_flight: 1,
        ..KernelConfig::default()
    };
    let (client, executor) = slow_client(config, Duration::from_millis(300));
    let command = || Command::SanitizeProfile {
        profile: Profile::square(1.0),
    };

    // Occupies the only slot until the worker is done with it
    let first = client.submit(command(), Some(Duration::from_millis(50))).await;
    assert!(matches!(first, Err(KernelError::Timeout)));

    let second = client.submit(command(), Some(Duration::from_millis(50))).await;
    assert!(matches!(second, Err(KernelError::Timeout)));

    let third = client.submit(command(), Some(Duration::from_secs(5))).await;
    assert!(third.is_ok());

    // The timed-out job still ran; the one that never got a slot did not
    assert_eq!(executor.ran(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn jobs_are_sharded_round_robin() {
    let config = KernelConfig {
        workers: 2,
        ..KernelConfig::default()
    };
    let executors = [
        SlowExecutor::new(Duration::from_millis(10)),
        SlowExecutor::new(Duration::from_millis(10)),
    ];
    let handed_out = executors.clone();
    let client =
        KernelClient::with_executor(config, move |i| handed_out[i].clone()).expect("client");

    for _ in 0..4 {
        client
            .sanitize_profile(Profile::square(1.0))
            .await
            .expect("sanitize");
    }
    client.shutdown().await;
    assert_eq!(executors[0].ran(), 2);
    assert_eq!(executors[1].ran(), 2);
}
