use std::collections::BTreeMap;
use std::sync::Arc;

use corvid_application::{
    ActionApplier, AutomationRuleRepository, AutomationScheduler, AutomationSchedulerConfig,
    CreateAutomationRuleInput, ExecutionListQuery, ExecutionRecorder, ExecutionRepository,
    FilterEvaluator, ObjectStore, RuleExecutor, SystemClock,
};
use corvid_core::{AppError, OrgId};
use corvid_domain::{ExecutionStatus, FilterConfig, FunnelPlacement, ObjectQuery};
use serde_json::json;
use uuid::Uuid;

use super::{InMemoryObjectStore, ObjectSeed};
use crate::InMemoryAutomationRepository;

fn record(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

async fn matching(store: &InMemoryObjectStore, org_id: OrgId, filter: serde_json::Value) -> Vec<Uuid> {
    let filter = FilterConfig::from_document(&filter).unwrap_or_else(|_| unreachable!());
    let query = FilterEvaluator::compile(org_id, &filter);
    store.objects_matching(&query).await.unwrap_or_default()
}

#[tokio::test]
async fn unconstrained_query_returns_live_objects_of_org() {
    let store = InMemoryObjectStore::new();
    let org_id = OrgId::new();
    let live = store.insert_object(org_id, ObjectSeed::named("Ada")).await;
    let deleted = store.insert_object(org_id, ObjectSeed::named("Bea")).await;
    let _foreign = store
        .insert_object(OrgId::new(), ObjectSeed::named("Cy"))
        .await;
    assert!(store.delete_object(deleted).await.is_ok());

    let matched = store
        .objects_matching(&ObjectQuery::for_org(org_id))
        .await
        .unwrap_or_default();
    assert_eq!(matched, vec![live]);
}

#[tokio::test]
async fn text_search_covers_aliases_and_identifiers() {
    let store = InMemoryObjectStore::new();
    let org_id = OrgId::new();
    let by_alias = store
        .insert_object(
            org_id,
            ObjectSeed {
                name: "Ada Lovelace".to_owned(),
                aliases: vec!["Countess".to_owned()],
                ..ObjectSeed::default()
            },
        )
        .await;
    let by_id_string = store
        .insert_object(
            org_id,
            ObjectSeed {
                name: "Analytical Engine".to_owned(),
                id_string: "ENG-COUNTESS-1".to_owned(),
                ..ObjectSeed::default()
            },
        )
        .await;
    let _other = store
        .insert_object(org_id, ObjectSeed::named("Babbage"))
        .await;

    let mut expected = vec![by_alias, by_id_string];
    expected.sort();
    assert_eq!(
        matching(&store, org_id, json!({"search": "countess"})).await,
        expected
    );
}

#[tokio::test]
async fn dimensions_combine_conjunctively() {
    let store = InMemoryObjectStore::new();
    let org_id = OrgId::new();
    let vip = store.insert_tag(org_id).await;
    let partner = store.insert_tag(org_id).await;
    let person_type = Uuid::new_v4();

    let both = store.insert_object(org_id, ObjectSeed::named("both")).await;
    let tag_only = store.insert_object(org_id, ObjectSeed::named("tag")).await;
    let type_only = store.insert_object(org_id, ObjectSeed::named("type")).await;

    for object_id in [both, tag_only] {
        let tagged = store.tag_object(org_id, object_id, vip).await;
        assert_eq!(tagged.ok(), Some(true));
    }
    for object_id in [both, type_only] {
        let added = store
            .add_type_values(object_id, person_type, record(&[("city", "Berlin")]))
            .await;
        assert!(added.is_ok());
    }

    assert_eq!(
        matching(
            &store,
            org_id,
            json!({"tag_ids": [vip, partner], "type_ids": [person_type]})
        )
        .await,
        vec![both]
    );
}

#[tokio::test]
async fn attribute_predicates_match_any_record_case_insensitively() {
    let store = InMemoryObjectStore::new();
    let org_id = OrgId::new();
    let type_id = Uuid::new_v4();
    let berlin = store.insert_object(org_id, ObjectSeed::named("b")).await;
    let paris = store.insert_object(org_id, ObjectSeed::named("p")).await;
    let split = store.insert_object(org_id, ObjectSeed::named("s")).await;

    let _ = store
        .add_type_values(berlin, type_id, record(&[("city", "Berlin"), ("tier", "Gold")]))
        .await;
    let _ = store
        .add_type_values(paris, type_id, record(&[("city", "Paris"), ("tier", "Silver")]))
        .await;
    let _ = store
        .add_type_values(split, type_id, record(&[("city", "Berlin")]))
        .await;
    let _ = store
        .add_type_values(split, type_id, record(&[("tier", "gold")]))
        .await;

    let filter = json!({
        "type_value_criteria": [
            {"city": "berl", "tier": "GOLD"},
            {"field": "city", "value": "paris"}
        ]
    });
    let mut expected = vec![berlin, paris];
    expected.sort();
    assert_eq!(matching(&store, org_id, filter).await, expected);
}

#[tokio::test]
async fn funnel_filter_requires_every_listed_step_to_have_accepted_sub_status() {
    let store = InMemoryObjectStore::new();
    let org_id = OrgId::new();
    let (first_funnel, first_steps) = store.insert_funnel(org_id, &[1, 2]).await;
    let (second_funnel, second_steps) = store.insert_funnel(org_id, &[1]).await;

    let accepted = store.insert_object(org_id, ObjectSeed::named("a")).await;
    let mixed = store.insert_object(org_id, ObjectSeed::named("m")).await;
    let unplaced = store.insert_object(org_id, ObjectSeed::named("u")).await;

    let actor = Uuid::new_v4();
    for object_id in [accepted, mixed] {
        for (funnel_id, step_id) in [
            (first_funnel, first_steps[1]),
            (second_funnel, second_steps[0]),
        ] {
            let placed = store
                .place_on_funnel_step(
                    org_id,
                    object_id,
                    &FunnelPlacement::new(funnel_id, Some(step_id)),
                    actor,
                )
                .await;
            assert_eq!(placed.ok(), Some(true));
        }
    }
    for funnel_id in [first_funnel, second_funnel] {
        assert!(store.set_sub_status(accepted, funnel_id, 2).await.is_ok());
    }
    assert!(store.set_sub_status(mixed, first_funnel, 2).await.is_ok());
    assert!(store.set_sub_status(mixed, second_funnel, 5).await.is_ok());

    let steps = [first_steps[1], second_steps[0]];
    let mut everyone = vec![accepted, mixed];
    everyone.sort();
    assert_eq!(
        matching(&store, org_id, json!({"funnel_step_filter": {"step_ids": steps}})).await,
        everyone
    );
    assert_eq!(
        matching(
            &store,
            org_id,
            json!({"funnel_step_filter": {"step_ids": steps, "sub_statuses": [1, 2]}})
        )
        .await,
        vec![accepted]
    );
    assert!(
        !matching(&store, org_id, json!({"funnel_step_filter": {"step_ids": steps}}))
            .await
            .contains(&unplaced)
    );
}

#[tokio::test]
async fn tagging_is_idempotent_and_scoped_to_org() {
    let store = InMemoryObjectStore::new();
    let org_id = OrgId::new();
    let object_id = store.insert_object(org_id, ObjectSeed::named("a")).await;
    let tag_id = store.insert_tag(org_id).await;
    let foreign_tag = store.insert_tag(OrgId::new()).await;

    assert_eq!(store.tag_object(org_id, object_id, tag_id).await.ok(), Some(true));
    assert_eq!(store.tag_object(org_id, object_id, tag_id).await.ok(), Some(false));
    assert!(matches!(
        store.tag_object(org_id, object_id, foreign_tag).await,
        Err(AppError::Store(_))
    ));
    assert!(matches!(
        store.tag_object(org_id, object_id, Uuid::new_v4()).await,
        Err(AppError::Store(_))
    ));
    assert_eq!(store.tags_of(object_id).await.len(), 1);
}

#[tokio::test]
async fn placement_defaults_to_lowest_order_step_and_keeps_existing() {
    let store = InMemoryObjectStore::new();
    let org_id = OrgId::new();
    let (funnel_id, steps) = store.insert_funnel(org_id, &[3, 1, 2]).await;
    let object_id = store.insert_object(org_id, ObjectSeed::named("a")).await;
    let actor = Uuid::new_v4();

    let placed = store
        .place_on_funnel_step(org_id, object_id, &FunnelPlacement::new(funnel_id, None), actor)
        .await;
    assert_eq!(placed.ok(), Some(true));
    assert_eq!(store.step_of(object_id, funnel_id).await, Some(steps[1]));

    let moved = store
        .place_on_funnel_step(
            org_id,
            object_id,
            &FunnelPlacement::new(funnel_id, Some(steps[0])),
            actor,
        )
        .await;
    assert_eq!(moved.ok(), Some(false));
    assert_eq!(store.step_of(object_id, funnel_id).await, Some(steps[1]));
}

#[tokio::test]
async fn placement_rejects_unknown_steps_and_empty_funnels() {
    let store = InMemoryObjectStore::new();
    let org_id = OrgId::new();
    let (funnel_id, _) = store.insert_funnel(org_id, &[1]).await;
    let (empty_funnel, _) = store.insert_funnel(org_id, &[]).await;
    let object_id = store.insert_object(org_id, ObjectSeed::named("a")).await;
    let actor = Uuid::new_v4();

    let foreign_step = store
        .place_on_funnel_step(
            org_id,
            object_id,
            &FunnelPlacement::new(funnel_id, Some(Uuid::new_v4())),
            actor,
        )
        .await;
    assert!(matches!(foreign_step, Err(AppError::Store(_))));

    let empty = store
        .place_on_funnel_step(
            org_id,
            object_id,
            &FunnelPlacement::new(empty_funnel, None),
            actor,
        )
        .await;
    assert!(matches!(empty, Err(AppError::Store(_))));
}

#[tokio::test]
async fn scheduler_tick_tags_matching_objects_end_to_end() {
    let repository = Arc::new(InMemoryAutomationRepository::new());
    let store = Arc::new(InMemoryObjectStore::new());
    let org_id = OrgId::new();
    let vip = store.insert_tag(org_id).await;
    let contacted = store.insert_tag(org_id).await;

    let mut vip_objects = Vec::new();
    for index in 0..10 {
        let object_id = store
            .insert_object(org_id, ObjectSeed::named(format!("contact {index}")))
            .await;
        if index % 3 == 0 {
            let _ = store.tag_object(org_id, object_id, vip).await;
            vip_objects.push(object_id);
        }
    }

    let rule = repository
        .create_rule(CreateAutomationRuleInput {
            org_id,
            name: "Contact VIPs".to_owned(),
            description: String::new(),
            filter_config: json!({"tag_ids": [vip]}),
            action_config: json!({"tag_id": contacted}),
            is_active: true,
            created_by: Uuid::new_v4(),
        })
        .await
        .unwrap_or_else(|_| unreachable!());

    let clock = Arc::new(SystemClock);
    let recorder = ExecutionRecorder::new(repository.clone());
    let executor = RuleExecutor::new(
        repository.clone(),
        FilterEvaluator::new(store.clone()),
        ActionApplier::new(store.clone()),
        recorder.clone(),
        clock.clone(),
    );
    let scheduler = AutomationScheduler::new(
        AutomationSchedulerConfig::default(),
        repository.clone(),
        executor,
        recorder,
        clock,
    );

    let report = scheduler.run_tick().await;
    assert_eq!(report.due_rules, 1);
    assert_eq!(report.completed, 1);

    for object_id in &vip_objects {
        assert!(store.tags_of(*object_id).await.contains(&contacted));
    }

    let executions = repository
        .list_executions(
            rule.id(),
            ExecutionListQuery {
                limit: 10,
                offset: 0,
            },
        )
        .await
        .unwrap_or_default();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Completed);
    assert_eq!(executions[0].objects_affected, 4);

    let second = scheduler.run_tick().await;
    assert_eq!(second.due_rules, 0);
}
