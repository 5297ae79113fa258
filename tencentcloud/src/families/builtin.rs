use serde_json::json;

use super::ResourceFamily;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub(super) fn families() -> Vec<ResourceFamily> {
    vec![
        ResourceFamily {
            kind: "cvm_instance".to_string(),
            service: "cvm".to_string(),
            version: "2017-03-12".to_string(),
            describe_action: "DescribeInstances".to_string(),
            request: json!({"InstanceIds": ["{id}"]}),
            status_pointer: "/InstanceSet/0/InstanceState".to_string(),
            detail_pointer: Some("/InstanceSet/0".to_string()),
            pending: strings(&["PENDING", "STARTING", "REBOOTING"]),
            target: strings(&["RUNNING"]),
            failure: strings(&["LAUNCH_FAILED"]),
            not_found_codes: strings(&["InvalidInstanceId.NotFound"]),
            retryable_codes: vec![],
            timeout_factor: 1,
        },
        ResourceFamily {
            kind: "postgresql_instance".to_string(),
            service: "postgres".to_string(),
            version: "2017-03-12".to_string(),
            describe_action: "DescribeDBInstances".to_string(),
            request: json!({
                "Filters": [{"Name": "db-instance-id", "Values": ["{id}"]}]
            }),
            status_pointer: "/DBInstanceSet/0/DBInstanceStatus".to_string(),
            detail_pointer: Some("/DBInstanceSet/0".to_string()),
            pending: vec![],
            target: strings(&["running"]),
            failure: vec![],
            not_found_codes: strings(&["ResourceNotFound.InstanceNotFoundError"]),
            retryable_codes: strings(&["FailedOperation\\.DatabaseAffectedError"]),
            timeout_factor: 2,
        },
        ResourceFamily {
            kind: "dcdb_flow".to_string(),
            service: "dcdb".to_string(),
            version: "2018-04-11".to_string(),
            describe_action: "DescribeFlow".to_string(),
            request: json!({"FlowId": "{id:int}"}),
            status_pointer: "/Status".to_string(),
            detail_pointer: None,
            pending: strings(&["2"]),
            target: strings(&["0"]),
            failure: strings(&["1"]),
            not_found_codes: vec![],
            retryable_codes: vec![],
            timeout_factor: 2,
        },
        ResourceFamily {
            kind: "ckafka_connect_resource".to_string(),
            service: "ckafka".to_string(),
            version: "2019-08-19".to_string(),
            describe_action: "DescribeConnectResource".to_string(),
            request: json!({"ResourceId": "{id}"}),
            status_pointer: "/Result/Status".to_string(),
            detail_pointer: Some("/Result".to_string()),
            pending: vec![],
            target: strings(&["1"]),
            failure: vec![],
            not_found_codes: strings(&["ResourceNotFound"]),
            retryable_codes: vec![],
            timeout_factor: 2,
        },
        ResourceFamily {
            kind: "cynosdb_instance_isolate".to_string(),
            service: "cynosdb".to_string(),
            version: "2019-01-07".to_string(),
            describe_action: "DescribeInstanceDetail".to_string(),
            request: json!({"InstanceId": "{id}"}),
            status_pointer: "/Detail/Status".to_string(),
            detail_pointer: Some("/Detail".to_string()),
            pending: vec![],
            target: strings(&["isolated"]),
            failure: vec![],
            not_found_codes: strings(&["ResourceNotFound.InstanceNotFoundError"]),
            retryable_codes: vec![],
            timeout_factor: 2,
        },
        ResourceFamily {
            kind: "mysql_async_request".to_string(),
            service: "cdb".to_string(),
            version: "2017-03-20".to_string(),
            describe_action: "DescribeAsyncRequestInfo".to_string(),
            request: json!({"AsyncRequestId": "{id}"}),
            status_pointer: "/Status".to_string(),
            detail_pointer: None,
            pending: strings(&["INITIAL", "RUNNING"]),
            target: strings(&["SUCCESS"]),
            failure: strings(&["FAILED", "KILLED", "REMOVED", "PAUSED"]),
            not_found_codes: vec![],
            retryable_codes: strings(&["OperationDenied\\.OtherOderInProcess"]),
            timeout_factor: 1,
        },
        ResourceFamily {
            kind: "redis_instance".to_string(),
            service: "redis".to_string(),
            version: "2018-04-12".to_string(),
            describe_action: "DescribeInstances".to_string(),
            request: json!({"InstanceId": "{id}"}),
            status_pointer: "/InstanceSet/0/Status".to_string(),
            detail_pointer: Some("/InstanceSet/0".to_string()),
            pending: strings(&["0", "1"]),
            target: strings(&["2"]),
            failure: strings(&["-2", "-3"]),
            not_found_codes: strings(&["ResourceNotFound"]),
            retryable_codes: vec![],
            timeout_factor: 1,
        },
    ]
}
