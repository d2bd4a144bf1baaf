//! Request rendering for every operation builder.

mod common;

use common::{MockTransport, Session, User, client, quiet_client, s, session_key, user_key};
use rustack_dynamodb_client::expression::AttributeType;
use rustack_dynamodb_client::operation::SortOrder;
use rustack_dynamodb_client::{ClientConfig, ClientError, SchemaError};
use rustack_dynamodb_model::AttributeValue;
use rustack_dynamodb_model::types::{
    ReturnConsumedCapacity, ReturnItemCollectionMetrics, ReturnValue, Select,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[test]
fn test_should_render_key_condition_with_between() {
    let transport = MockTransport::new();
    let query = client(&transport)
        .query::<User>()
        .key("uid")
        .eq("1")
        .key("name")
        .between("a", "c");

    assert_eq!(
        query.to_json().unwrap(),
        json!({
            "TableName": "users",
            "KeyConditionExpression": "#uid = :uid AND #name BETWEEN :name_lower AND :name_upper",
            "ExpressionAttributeNames": { "#uid": "uid", "#name": "name" },
            "ExpressionAttributeValues": {
                ":uid": { "S": "1" },
                ":name_lower": { "S": "a" },
                ":name_upper": { "S": "c" },
            },
            "ReturnConsumedCapacity": "TOTAL",
        })
    );
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_should_render_identical_json_on_every_call() {
    let transport = MockTransport::new();
    let query = client(&transport)
        .query::<User>()
        .key("uid")
        .eq("1")
        .filter("age")
        .gt(18_i64)
        .filter("age")
        .lt(65_i64);

    let first = query.to_json().unwrap();
    assert_eq!(query.to_json().unwrap(), first);
    assert_eq!(
        first["FilterExpression"],
        json!("#age > :age AND #age < :age_2")
    );
    assert_eq!(first["ExpressionAttributeValues"][":age"], json!({ "N": "18" }));
    assert_eq!(first["ExpressionAttributeValues"][":age_2"], json!({ "N": "65" }));
}

#[test]
fn test_should_render_nested_filter_groups() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .query::<User>()
        .key("uid")
        .eq("1")
        .filter("team")
        .exists()
        .filter_not(|g| g.attr("age").lt(18_i64).attr("name").begins_with("test"))
        .filter_or(|g| g.attr("team").eq("core").attr("team").eq("infra"))
        .to_input()
        .unwrap();

    assert_eq!(
        input.filter_expression.as_deref(),
        Some(
            "attribute_exists(#team) AND NOT (#age < :age AND begins_with(#name, :name_begins_with)) \
             AND (#team = :team OR #team = :team_2)"
        )
    );
    assert_eq!(input.expression_attribute_values[":team"], s("core"));
    assert_eq!(input.expression_attribute_values[":team_2"], s("infra"));
}

#[test]
fn test_should_render_deeply_nested_groups() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .scan::<User>()
        .filter_or(|g| {
            g.attr("team")
                .eq("core")
                .and(|g| g.attr("age").gte(21_i64).attr("age").lte(30_i64))
        })
        .to_input()
        .unwrap();

    assert_eq!(
        input.filter_expression.as_deref(),
        Some("(#team = :team OR (#age >= :age AND #age <= :age_2))")
    );
}

#[test]
fn test_should_query_index_with_hash_shortcut() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .query::<User>()
        .index("team-index")
        .hash_eq("core")
        .key("age")
        .gte(30_i64)
        .select("uid name")
        .desc()
        .limit(10)
        .consistent()
        .to_input()
        .unwrap();

    assert_eq!(input.index_name.as_deref(), Some("team-index"));
    assert_eq!(
        input.key_condition_expression.as_deref(),
        Some("#team = :team AND #age >= :age")
    );
    assert_eq!(input.projection_expression.as_deref(), Some("#uid, #name"));
    assert_eq!(input.scan_index_forward, Some(false));
    assert_eq!(input.limit, Some(10));
    assert_eq!(input.consistent_read, Some(true));
    assert!(input.select.is_none());
}

#[test]
fn test_should_keep_ascending_order_implicit() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .query::<User>()
        .key("uid")
        .eq("1")
        .sort(SortOrder::Ascending)
        .to_input()
        .unwrap();
    assert!(input.scan_index_forward.is_none());
}

#[test]
fn test_should_reject_query_without_key_condition() {
    let transport = MockTransport::new();
    let result = client(&transport)
        .query::<User>()
        .filter("age")
        .gt(1_i64)
        .to_input();
    match result {
        Err(ClientError::InvalidParameter { .. }) => {}
        other => panic!("expected InvalidParameter, got {other:?}"),
    }
}

#[test]
fn test_should_reject_unknown_index() {
    let transport = MockTransport::new();
    let result = client(&transport)
        .query::<User>()
        .index("missing")
        .key("uid")
        .eq("1")
        .to_input();
    match result {
        Err(ClientError::Schema(SchemaError::UnknownIndex { index, .. })) => {
            assert_eq!(index, "missing");
        }
        other => panic!("expected UnknownIndex, got {other:?}"),
    }
}

#[test]
fn test_should_reject_zero_limit() {
    let transport = MockTransport::new();
    let result = client(&transport)
        .query::<User>()
        .key("uid")
        .eq("1")
        .limit(0)
        .to_input();
    assert!(matches!(result, Err(ClientError::InvalidParameter { .. })));
}

#[test]
fn test_should_report_malformed_path_at_render() {
    let transport = MockTransport::new();
    let result = client(&transport)
        .query::<User>()
        .key("uid")
        .eq("1")
        .filter("tags[x]")
        .eq("a")
        .to_input();
    assert!(matches!(result, Err(ClientError::Expression(_))));
}

#[test]
fn test_should_reject_empty_in_list() {
    let transport = MockTransport::new();
    let result = client(&transport)
        .scan::<User>()
        .filter("team")
        .is_in(Vec::<&str>::new())
        .to_input();
    assert!(matches!(result, Err(ClientError::Expression(_))));
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

#[test]
fn test_should_render_scan_with_segments() {
    let transport = MockTransport::new();
    let input = quiet_client(&transport)
        .scan::<User>()
        .filter("team")
        .is_in(["core", "infra"])
        .filter("name")
        .size()
        .gt(3_i64)
        .filter("age")
        .attribute_type(AttributeType::Number)
        .segment(1, 4)
        .to_input()
        .unwrap();

    assert_eq!(
        input.filter_expression.as_deref(),
        Some(
            "#team IN (:team_index_0, :team_index_1) AND size(#name) > :name_size \
             AND attribute_type(#age, :age_attribute_type)"
        )
    );
    assert_eq!(input.expression_attribute_values[":age_attribute_type"], s("N"));
    assert_eq!(input.segment, Some(1));
    assert_eq!(input.total_segments, Some(4));
    assert!(input.return_consumed_capacity.is_none());
}

#[test]
fn test_should_reject_segment_out_of_range() {
    let transport = MockTransport::new();
    let result = client(&transport).scan::<User>().segment(4, 4).to_input();
    assert!(matches!(result, Err(ClientError::InvalidParameter { .. })));
}

#[test]
fn test_should_render_bare_scan() {
    let transport = MockTransport::new();
    assert_eq!(
        quiet_client(&transport).scan::<User>().to_json().unwrap(),
        json!({ "TableName": "users" })
    );
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

#[test]
fn test_should_render_get_with_projection() {
    let transport = MockTransport::new();
    let get = client(&transport)
        .get::<User>(user_key("1", "max"))
        .select("uid roles[0] profile.city")
        .consistent();

    assert_eq!(
        get.to_json().unwrap(),
        json!({
            "TableName": "users",
            "Key": { "uid": { "S": "1" }, "name": { "S": "max" } },
            "ConsistentRead": true,
            "ProjectionExpression": "#uid, #roles[0], #profile.#city",
            "ExpressionAttributeNames": {
                "#uid": "uid",
                "#roles": "roles",
                "#profile": "profile",
                "#city": "city",
            },
            "ReturnConsumedCapacity": "TOTAL",
        })
    );
}

#[test]
fn test_should_apply_table_prefix() {
    let transport = MockTransport::new();
    let config = ClientConfig::builder().table_prefix("dev-".to_owned()).build();
    let input = common::client_with(&transport, config)
        .get::<User>(user_key("1", "max"))
        .quiet()
        .to_input()
        .unwrap();
    assert_eq!(input.table_name, "dev-users");
    assert!(input.return_consumed_capacity.is_none());
}

// ---------------------------------------------------------------------------
// Put
// ---------------------------------------------------------------------------

#[test]
fn test_should_render_put_with_defaults() {
    let transport = MockTransport::new();
    let user = User::new("1", "max");

    assert_eq!(
        client(&transport).put(&user).to_json().unwrap(),
        json!({
            "TableName": "users",
            "Item": { "uid": { "S": "1" }, "name": { "S": "max" } },
            "ReturnValues": "ALL_OLD",
            "ReturnConsumedCapacity": "TOTAL",
            "ReturnItemCollectionMetrics": "SIZE",
        })
    );
}

#[test]
fn test_should_render_create_as_conditional_put() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .create(&User::new("1", "max"))
        .to_input()
        .unwrap();
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_not_exists(#uid) AND attribute_not_exists(#name)")
    );
    assert_eq!(input.expression_attribute_names["#uid"], "uid");
    assert_eq!(input.expression_attribute_names["#name"], "name");
    assert!(input.expression_attribute_values.is_empty());
}

#[test]
fn test_should_guard_only_hash_key_when_creating_hash_only_record() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .create(&Session {
            token: "t".to_owned(),
            owner: "max".to_owned(),
        })
        .to_input()
        .unwrap();
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_not_exists(#token)")
    );
    assert_eq!(input.expression_attribute_names.len(), 1);
}

#[test]
fn test_should_render_put_conditions_and_quiet() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .put(&User::new("1", "max"))
        .condition("age")
        .lt(30_i64)
        .condition_or(|g| g.attr("team").not_exists().attr("team").ne("ops"))
        .quiet()
        .to_input()
        .unwrap();

    assert_eq!(
        input.condition_expression.as_deref(),
        Some("#age < :age AND (attribute_not_exists(#team) OR #team <> :team)")
    );
    assert!(input.return_values.is_none());
    assert!(input.return_consumed_capacity.is_none());
    assert!(input.return_item_collection_metrics.is_none());
}

#[test]
fn test_should_reject_empty_put() {
    let transport = MockTransport::new();
    let result = client(&transport)
        .put_item::<User>(Default::default())
        .to_input();
    assert!(matches!(result, Err(ClientError::EmptyItem)));
}

#[test]
fn test_should_stamp_created_and_updated_on_put() {
    let transport = MockTransport::new();
    let session = Session {
        token: "t".to_owned(),
        owner: "max".to_owned(),
    };
    let input = client(&transport).put(&session).to_input().unwrap();

    let created = input.item["createdAt"].as_s().unwrap();
    assert!(created.ends_with('Z'));
    assert_eq!(input.item["updatedAt"].as_s(), Some(created));
}

#[test]
fn test_should_not_stamp_when_disabled() {
    let transport = MockTransport::new();
    let config = ClientConfig::builder().auto_timestamps(false).build();
    let session = Session {
        token: "t".to_owned(),
        owner: "max".to_owned(),
    };
    let input = common::client_with(&transport, config)
        .put(&session)
        .to_input()
        .unwrap();
    assert!(!input.item.contains_key("createdAt"));
    assert!(!input.item.contains_key("updatedAt"));
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[test]
fn test_should_render_list_append() {
    let transport = MockTransport::new();
    let input = quiet_client(&transport)
        .update::<User>(user_key("1", "max"))
        .set("roles")
        .append(vec!["vip"])
        .to_input()
        .unwrap();

    assert_eq!(
        input.update_expression.as_deref(),
        Some("SET #roles = list_append(#roles, :roles_list_append)")
    );
    assert_eq!(
        input.expression_attribute_values[":roles_list_append"],
        AttributeValue::L(vec![s("vip")])
    );
    assert_eq!(input.return_values, Some(ReturnValue::AllNew));
}

#[test]
fn test_should_render_remove_of_list_element() {
    let transport = MockTransport::new();
    let input = quiet_client(&transport)
        .update::<User>(user_key("1", "max"))
        .remove("roles[1]")
        .to_input()
        .unwrap();

    assert_eq!(input.update_expression.as_deref(), Some("REMOVE #roles[1]"));
    assert!(input.expression_attribute_values.is_empty());
}

#[test]
fn test_should_render_every_mutation_bucket_in_order() {
    let transport = MockTransport::new();
    let input = quiet_client(&transport)
        .update::<User>(user_key("1", "max"))
        .delete("tags", vec!["old"].into_iter().collect::<std::collections::BTreeSet<_>>())
        .add("visits", 1_i64)
        .remove_indexes("roles", [0, 2])
        .set("age")
        .plus(1_i64)
        .set("team")
        .if_not_exists("core")
        .condition("age")
        .exists()
        .to_input()
        .unwrap();

    assert_eq!(
        input.update_expression.as_deref(),
        Some(
            "SET #age = #age + :age_increase, #team = if_not_exists(#team, :team_if_not_exists) \
             REMOVE #roles[0], #roles[2] ADD #visits :visits_add DELETE #tags :tags_delete"
        )
    );
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_exists(#age)")
    );
    assert_eq!(
        input.expression_attribute_values[":tags_delete"],
        AttributeValue::Ss(vec!["old".to_owned()])
    );
}

#[test]
fn test_should_fail_update_without_mutation_before_sending() {
    let transport = MockTransport::new();
    let update = client(&transport)
        .update::<User>(user_key("1", "max"))
        .condition("age")
        .exists();

    let result = tokio_test::block_on(update.send());
    assert!(matches!(result, Err(ClientError::EmptyMutation)));
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_should_stamp_updated_at_on_update() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .update::<Session>(session_key("t"))
        .set("owner")
        .to("max")
        .to_input()
        .unwrap();

    assert_eq!(
        input.update_expression.as_deref(),
        Some("SET #owner = :owner, #updatedAt = :updatedAt")
    );
    assert!(
        input.expression_attribute_values[":updatedAt"]
            .as_s()
            .is_some_and(|ts| ts.ends_with('Z'))
    );
}

#[test]
fn test_should_not_overwrite_explicit_updated_at() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .update::<Session>(session_key("t"))
        .set("updatedAt")
        .to("2020-01-01T00:00:00.000Z")
        .to_input()
        .unwrap();

    assert_eq!(
        input.update_expression.as_deref(),
        Some("SET #updatedAt = :updatedAt")
    );
    assert_eq!(
        input.expression_attribute_values[":updatedAt"],
        s("2020-01-01T00:00:00.000Z")
    );
}

#[test]
fn test_should_stamp_updated_at_when_only_a_condition_references_it() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .update::<Session>(session_key("t"))
        .set("owner")
        .to("max")
        .condition("updatedAt")
        .exists()
        .to_input()
        .unwrap();

    assert_eq!(
        input.update_expression.as_deref(),
        Some("SET #owner = :owner, #updatedAt = :updatedAt")
    );
    assert_eq!(
        input.condition_expression.as_deref(),
        Some("attribute_exists(#updatedAt)")
    );
    assert!(input.expression_attribute_values.contains_key(":updatedAt"));
}

#[test]
fn test_should_stamp_updated_at_beside_nested_attribute_of_same_name() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .update::<Session>(session_key("t"))
        .set("meta.updatedAt")
        .to("yesterday")
        .to_input()
        .unwrap();

    assert_eq!(
        input.update_expression.as_deref(),
        Some("SET #meta.#updatedAt = :meta_updatedAt, #updatedAt = :updatedAt")
    );
    assert_eq!(
        input.expression_attribute_values[":meta_updatedAt"],
        s("yesterday")
    );
    assert!(
        input.expression_attribute_values[":updatedAt"]
            .as_s()
            .is_some_and(|ts| ts.ends_with('Z'))
    );
}

#[test]
fn test_should_not_stamp_updated_at_when_removing_it() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .update::<Session>(session_key("t"))
        .remove("updatedAt")
        .to_input()
        .unwrap();

    assert_eq!(input.update_expression.as_deref(), Some("REMOVE #updatedAt"));
    assert!(input.expression_attribute_values.is_empty());
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn test_should_render_conditional_delete() {
    let transport = MockTransport::new();
    let delete = client(&transport)
        .delete::<User>(user_key("1", "max"))
        .condition_not(|g| g.attr("team").eq("admin"));

    assert_eq!(
        delete.to_json().unwrap(),
        json!({
            "TableName": "users",
            "Key": { "uid": { "S": "1" }, "name": { "S": "max" } },
            "ConditionExpression": "NOT (#team = :team)",
            "ExpressionAttributeNames": { "#team": "team" },
            "ExpressionAttributeValues": { ":team": { "S": "admin" } },
            "ReturnValues": "ALL_OLD",
            "ReturnConsumedCapacity": "TOTAL",
            "ReturnItemCollectionMetrics": "SIZE",
        })
    );
}

#[test]
fn test_should_override_return_values() {
    let transport = MockTransport::new();
    let input = client(&transport)
        .delete::<User>(user_key("1", "max"))
        .return_values(ReturnValue::None)
        .to_input()
        .unwrap();
    assert!(input.return_values.is_none());
    assert_eq!(
        input.return_consumed_capacity,
        Some(ReturnConsumedCapacity::Total)
    );
    assert_eq!(
        input.return_item_collection_metrics,
        Some(ReturnItemCollectionMetrics::Size)
    );
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[test]
fn test_should_split_batch_get_inputs() {
    let transport = MockTransport::new();
    let keys: Vec<_> = (0..150).map(|i| user_key(&i.to_string(), "n")).collect();
    let inputs = client(&transport)
        .batch_get::<User>(keys)
        .select("uid")
        .consistent()
        .to_inputs()
        .unwrap();

    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0].request_items["users"].keys.len(), 100);
    assert_eq!(inputs[1].request_items["users"].keys.len(), 50);
    let request = &inputs[1].request_items["users"];
    assert_eq!(request.projection_expression.as_deref(), Some("#uid"));
    assert_eq!(request.consistent_read, Some(true));
}

#[test]
fn test_should_order_batch_puts_before_deletes() {
    let transport = MockTransport::new();
    let inputs = client(&transport)
        .batch_write::<User>()
        .delete(user_key("9", "gone"))
        .put(&User::new("1", "max"))
        .to_inputs()
        .unwrap();

    assert_eq!(inputs.len(), 1);
    let requests = &inputs[0].request_items["users"];
    assert!(requests[0].put_request.is_some());
    assert!(requests[1].delete_request.is_some());
}

#[test]
fn test_should_request_count_without_projection() {
    let transport = MockTransport::new();
    transport.reply_query(Ok(Default::default()));
    let count = tokio_test::block_on(
        client(&transport)
            .query::<User>()
            .key("uid")
            .eq("1")
            .select("name")
            .count(),
    )
    .unwrap();

    assert_eq!(count, 0);
    let sent = transport.queries();
    assert_eq!(sent[0].select, Some(Select::Count));
    assert!(sent[0].projection_expression.is_none());
    assert!(!sent[0].expression_attribute_names.contains_key("#name"));
}
