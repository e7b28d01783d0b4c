//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use staffsync_queue_core::{Mutation, TaskPayload};

/// Generate an employee id.
pub fn employee_id() -> impl Strategy<Value = i64> {
    1i64..10_000
}

/// Generate a department name.
pub fn department() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Engineering".to_string()),
        Just("Sales".to_string()),
        Just("Finance".to_string()),
        "[A-Z][a-z]{2,11}".prop_map(String::from),
    ]
}

/// Generate the editable fields of an employee, each present or not.
pub fn employee_fields() -> impl Strategy<Value = Map<String, Value>> {
    (
        proptest::option::of("[A-Z][a-z]{1,15}"),
        proptest::option::of("[A-Z][a-z]{1,15}"),
        proptest::option::of("[a-z]{1,10}@[a-z]{1,8}\\.com"),
        proptest::option::of(department()),
        proptest::option::of(0u32..500_000),
    )
        .prop_map(|(firstname, lastname, email, department, salary)| {
            let mut fields = Map::new();
            if let Some(v) = firstname {
                fields.insert("firstname".into(), json!(v));
            }
            if let Some(v) = lastname {
                fields.insert("lastname".into(), json!(v));
            }
            if let Some(v) = email {
                fields.insert("email".into(), json!(v));
            }
            if let Some(v) = department {
                fields.insert("department".into(), json!(v));
            }
            if let Some(v) = salary {
                fields.insert("salary".into(), json!(v));
            }
            fields
        })
}

/// Generate a dispatchable mutation.
pub fn mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        (employee_id(), employee_fields())
            .prop_map(|(id, fields)| Mutation::edit_employee(id, fields)),
        employee_id().prop_map(Mutation::delete_employee),
    ]
}

/// Generate a payload the dispatcher must reject.
pub fn malformed_payload() -> impl Strategy<Value = TaskPayload> {
    prop_oneof![
        "[a-z_]{1,12}"
            .prop_filter("must not be a known action", |a| {
                a != "edit_employee" && a != "delete_employee"
            })
            .prop_map(|action| TaskPayload::new().with("action", action).with("id", 1)),
        employee_id().prop_map(|id| TaskPayload::new().with("id", id)),
        Just(TaskPayload::new().with("action", "delete_employee")),
        Just(TaskPayload::new().with("action", "edit_employee").with("id", "seven")),
    ]
}

/// Remote outcome of one call in a scripted sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Succeed,
    Fail,
}

/// Generate a sequence of call outcomes.
pub fn outcomes(max_len: usize) -> impl Strategy<Value = Vec<CallOutcome>> {
    prop::collection::vec(
        prop_oneof![Just(CallOutcome::Succeed), Just(CallOutcome::Fail)],
        0..=max_len,
    )
}

/// A queued job for a property test: a mutation and how its calls go.
#[derive(Debug, Clone)]
pub struct JobParams {
    pub mutation: Mutation,
    /// Consumed one per call; calls past the end succeed.
    pub outcomes: Vec<CallOutcome>,
}

impl Arbitrary for JobParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (mutation(), outcomes(6))
            .prop_map(|(mutation, outcomes)| JobParams { mutation, outcomes })
            .boxed()
    }
}

/// Generate a batch of jobs targeting distinct employees.
pub fn job_batch(max_len: usize) -> impl Strategy<Value = Vec<JobParams>> {
    prop::collection::vec(any::<JobParams>(), 1..=max_len).prop_map(|jobs| {
        jobs.into_iter()
            .enumerate()
            .map(|(i, mut job)| {
                let id = i as i64 + 1;
                job.mutation = match job.mutation {
                    Mutation::EditEmployee { fields, .. } => Mutation::edit_employee(id, fields),
                    Mutation::DeleteEmployee { .. } => Mutation::delete_employee(id),
                };
                job
            })
            .collect()
    })
}
