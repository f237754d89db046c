//! End-to-end reconciliation passes against the in-memory cluster.
//!
//! These tests pin the batch semantics of a pass:
//! - A missing declared object is a successful no-op
//! - Targets are processed in declared order
//! - The first failing target aborts the pass (no aggregation)
//! - Targets updated before the failure stay updated

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use epha_core::{
    AnnotatedObject, AnnotatedObjectSpec, Annotations, Config, ObjectKey, ResolutionStrategy,
    TargetResource, TargetResourceWithMetadata,
};
use epha_reconciler::{
    Error, InMemoryCluster, ReconcileOutcome, Reconciler, ReconcilerBuilder, ResourceType,
    resolver_from_config,
};

fn declared(name: &str, targets: Vec<TargetResourceWithMetadata>) -> AnnotatedObject {
    let mut object = AnnotatedObject::new(name, AnnotatedObjectSpec { targets });
    object.metadata.namespace = Some("ns1".to_string());
    object
}

fn target(kind: &str, name: &str) -> TargetResourceWithMetadata {
    TargetResourceWithMetadata::new(TargetResource::new(kind, "ns1", name))
}

fn reconciler(cluster: &Arc<InMemoryCluster>, strategy: ResolutionStrategy) -> Reconciler {
    let config = Config::default().with_strategy(strategy);
    let resolver = resolver_from_config(&config, Arc::clone(cluster)).unwrap();
    ReconcilerBuilder::new()
        .with_source(cluster.clone())
        .with_resolver(resolver)
        .build()
        .unwrap()
}

fn annotations(pairs: &[(&str, &str)]) -> Annotations {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[tokio::test]
async fn test_scenario_deployment_gains_declared_annotation() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster.insert_deployment("ns1", "web", [("b", "2")]).await;
    cluster
        .insert_declared(declared(
            "web-annotations",
            vec![target("Deployment", "web").with_annotation("a", "1")],
        ))
        .await;

    let outcome = reconciler(&cluster, ResolutionStrategy::Typed)
        .reconcile(&ObjectKey::new("ns1", "web-annotations"))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Reconciled { targets: 1 });
    assert_eq!(
        cluster.deployment_annotations("ns1", "web").await,
        Some(annotations(&[("a", "1"), ("b", "2")]))
    );
    assert_eq!(cluster.update_count().await, 1);
}

#[tokio::test]
async fn test_missing_declared_object_makes_no_calls() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster.insert_deployment("ns1", "web", [("b", "2")]).await;

    let outcome = reconciler(&cluster, ResolutionStrategy::Typed)
        .reconcile(&ObjectKey::new("ns1", "deleted"))
        .await;

    assert!(matches!(outcome, Ok(ReconcileOutcome::NotFound)));
    assert!(cluster.fetched().await.is_empty());
    assert_eq!(cluster.update_count().await, 0);
}

/// Abort-on-first-error is the deliberate batch policy: a failing target
/// stops the pass even though later targets are independent.
#[tokio::test]
async fn test_first_resolution_failure_aborts_pass() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster.insert_deployment("ns1", "first", [("keep", "me")]).await;
    cluster.insert_deployment("ns1", "third", [("keep", "me")]).await;
    cluster
        .insert_declared(declared(
            "batch",
            vec![
                target("Deployment", "first").with_annotation("a", "1"),
                target("CronTab", "second").with_annotation("a", "1"),
                target("Deployment", "third").with_annotation("a", "1"),
            ],
        ))
        .await;

    let result = reconciler(&cluster, ResolutionStrategy::Typed)
        .reconcile(&ObjectKey::new("ns1", "batch"))
        .await;

    assert!(matches!(result, Err(Error::UnsupportedKind { ref kind }) if kind == "CronTab"));
    assert_eq!(cluster.fetched().await, vec!["Deployment ns1/first".to_string()]);
    assert_eq!(cluster.updated().await, vec!["Deployment ns1/first".to_string()]);
    assert_eq!(
        cluster.deployment_annotations("ns1", "first").await,
        Some(annotations(&[("a", "1"), ("keep", "me")]))
    );
    assert_eq!(
        cluster.deployment_annotations("ns1", "third").await,
        Some(annotations(&[("keep", "me")]))
    );
}

#[tokio::test]
async fn test_missing_target_resource_fails_pass() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert_declared(declared(
            "ghosts",
            vec![target("ReplicaSet", "ghost").with_annotation("a", "1")],
        ))
        .await;

    let result = reconciler(&cluster, ResolutionStrategy::Typed)
        .reconcile(&ObjectKey::new("ns1", "ghosts"))
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::TargetNotFound { .. }));
    assert!(!err.is_poison_pill());
}

#[tokio::test]
async fn test_update_conflict_aborts_after_earlier_targets_commit() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster.insert_deployment("ns1", "web", [("b", "2")]).await;
    cluster.insert_replica_set("ns1", "web-5d8f", [("b", "2")]).await;
    cluster.insert_deployment("ns1", "api", [("b", "2")]).await;
    cluster.inject_conflict("ReplicaSet", "ns1", "web-5d8f").await;
    cluster
        .insert_declared(declared(
            "mixed",
            vec![
                target("Deployment", "web").with_annotation("a", "1"),
                target("ReplicaSet", "web-5d8f").with_annotation("a", "1"),
                target("Deployment", "api").with_annotation("a", "1"),
            ],
        ))
        .await;

    let result = reconciler(&cluster, ResolutionStrategy::Typed)
        .reconcile(&ObjectKey::new("ns1", "mixed"))
        .await;

    assert!(matches!(result, Err(Error::Conflict { .. })));
    assert_eq!(cluster.updated().await, vec!["Deployment ns1/web".to_string()]);
    assert_eq!(
        cluster.replica_set_annotations("ns1", "web-5d8f").await,
        Some(annotations(&[("b", "2")]))
    );
    assert!(!cluster
        .fetched()
        .await
        .contains(&"Deployment ns1/api".to_string()));
}

#[tokio::test]
async fn test_target_without_annotations_gets_desired_set() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert_replica_set("ns1", "bare", Vec::<(&str, &str)>::new())
        .await;
    cluster
        .insert_declared(declared(
            "bare",
            vec![target("ReplicaSet", "bare").with_annotation("team", "payments")],
        ))
        .await;

    reconciler(&cluster, ResolutionStrategy::Typed)
        .reconcile(&ObjectKey::new("ns1", "bare"))
        .await
        .unwrap();

    assert_eq!(
        cluster.replica_set_annotations("ns1", "bare").await,
        Some(annotations(&[("team", "payments")]))
    );
}

#[tokio::test]
async fn test_repeated_passes_converge() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster.insert_deployment("ns1", "web", [("b", "2")]).await;
    cluster
        .insert_declared(declared(
            "web-annotations",
            vec![target("Deployment", "web").with_annotation("a", "1")],
        ))
        .await;
    let reconciler = reconciler(&cluster, ResolutionStrategy::Typed);
    let key = ObjectKey::new("ns1", "web-annotations");

    reconciler.reconcile(&key).await.unwrap();
    let after_first = cluster.deployment_annotations("ns1", "web").await;
    reconciler.reconcile(&key).await.unwrap();

    assert_eq!(cluster.deployment_annotations("ns1", "web").await, after_first);
}

#[tokio::test]
async fn test_dynamic_strategy_handles_arbitrary_kinds() {
    let cluster = Arc::new(InMemoryCluster::new());
    let config_maps = ResourceType::from_kind("ConfigMap", "v1").unwrap();
    let deployments = ResourceType::from_kind("Deployment", "apps/v1").unwrap();
    cluster
        .insert_dynamic(&config_maps, "ns1", "settings", [("b", "2")])
        .await;
    cluster
        .insert_dynamic(&deployments, "ns1", "web", [("b", "2")])
        .await;
    cluster
        .insert_declared(declared(
            "dynamic",
            vec![
                TargetResourceWithMetadata::new(
                    TargetResource::new("ConfigMap", "ns1", "settings").with_api_version("v1"),
                )
                .with_annotation("a", "1"),
                TargetResourceWithMetadata::new(
                    TargetResource::new("Deployment", "ns1", "web").with_api_version("apps/v1"),
                )
                .with_annotation("b", "3"),
            ],
        ))
        .await;

    let outcome = reconciler(&cluster, ResolutionStrategy::Dynamic)
        .reconcile(&ObjectKey::new("ns1", "dynamic"))
        .await
        .unwrap();

    assert_eq!(outcome.targets_updated(), 2);
    assert_eq!(
        cluster.dynamic_annotations(&config_maps, "ns1", "settings").await,
        Some(annotations(&[("a", "1"), ("b", "2")]))
    );
    assert_eq!(
        cluster.dynamic_annotations(&deployments, "ns1", "web").await,
        Some(annotations(&[("b", "3")]))
    );
}

#[tokio::test]
async fn test_dynamic_missing_target_fails_pass() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert_declared(declared(
            "dangling",
            vec![TargetResourceWithMetadata::new(
                TargetResource::new("ConfigMap", "ns1", "settings").with_api_version("v1"),
            )
            .with_annotation("a", "1")],
        ))
        .await;

    let err = reconciler(&cluster, ResolutionStrategy::Dynamic)
        .reconcile(&ObjectKey::new("ns1", "dangling"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TargetNotFound { .. }));
    assert!(!err.is_poison_pill());
    assert_eq!(cluster.update_count().await, 0);
}

#[tokio::test]
async fn test_dynamic_malformed_api_version_is_poison_pill() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert_declared(declared(
            "broken",
            vec![TargetResourceWithMetadata::new(
                TargetResource::new("Widget", "ns1", "w").with_api_version("a/b/c"),
            )],
        ))
        .await;

    let err = reconciler(&cluster, ResolutionStrategy::Dynamic)
        .reconcile(&ObjectKey::new("ns1", "broken"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedApiVersion { .. }));
    assert!(err.is_poison_pill());
    assert!(cluster.fetched().await.is_empty());
}

#[tokio::test]
async fn test_declared_object_is_not_mutated() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster.insert_deployment("ns1", "web", [("b", "2")]).await;
    let object = declared(
        "web-annotations",
        vec![target("Deployment", "web").with_annotation("a", "1")],
    );
    cluster.insert_declared(object.clone()).await;

    reconciler(&cluster, ResolutionStrategy::Typed)
        .reconcile(&ObjectKey::new("ns1", "web-annotations"))
        .await
        .unwrap();

    let key = ObjectKey::new("ns1", "web-annotations");
    let stored = epha_reconciler::DeclaredObjectSource::get_declared(cluster.as_ref(), &key)
        .await
        .unwrap();
    assert_eq!(stored.map(|o| o.spec), Some(object.spec));
}
