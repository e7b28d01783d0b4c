//! Typed employee mutations carried by queued payloads.

use serde_json::{Map, Value};

use crate::error::MalformedTask;
use crate::task::TaskPayload;

/// Action discriminator for an employee update.
pub const EDIT_EMPLOYEE: &str = "edit_employee";

/// Action discriminator for an employee deletion.
pub const DELETE_EMPLOYEE: &str = "delete_employee";

/// A mutating remote call that can be replayed from the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// `PUT /employees/edit/{id}` with the given fields as body.
    EditEmployee {
        id: i64,
        /// Everything in the payload except `action` and `id`
        /// (`firstname`, `lastname`, `email`, `department`, `salary`, `joiningdate`).
        fields: Map<String, Value>,
    },
    /// `DELETE /employees/delete/{id}`.
    DeleteEmployee { id: i64 },
}

impl Mutation {
    /// Build an edit mutation.
    pub fn edit_employee(id: i64, fields: Map<String, Value>) -> Self {
        Mutation::EditEmployee { id, fields }
    }

    /// Build a delete mutation.
    pub fn delete_employee(id: i64) -> Self {
        Mutation::DeleteEmployee { id }
    }

    /// The payload `action` value for this mutation.
    pub fn action(&self) -> &'static str {
        match self {
            Mutation::EditEmployee { .. } => EDIT_EMPLOYEE,
            Mutation::DeleteEmployee { .. } => DELETE_EMPLOYEE,
        }
    }

    /// The employee this mutation targets.
    pub fn employee_id(&self) -> i64 {
        match self {
            Mutation::EditEmployee { id, .. } | Mutation::DeleteEmployee { id } => *id,
        }
    }

    /// Interpret a stored payload.
    ///
    /// Unknown actions and missing or mistyped fields are permanent errors.
    pub fn from_payload(payload: &TaskPayload) -> Result<Self, MalformedTask> {
        let action = match payload.get("action") {
            Some(Value::String(action)) => action.as_str(),
            _ => return Err(MalformedTask::MissingAction),
        };

        match action {
            EDIT_EMPLOYEE => {
                let id = employee_id(payload)?;
                let fields = payload
                    .as_map()
                    .iter()
                    .filter(|(key, _)| key.as_str() != "action" && key.as_str() != "id")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                Ok(Mutation::EditEmployee { id, fields })
            }
            DELETE_EMPLOYEE => Ok(Mutation::DeleteEmployee {
                id: employee_id(payload)?,
            }),
            other => Err(MalformedTask::UnsupportedAction(other.to_string())),
        }
    }

    /// Encode as a queue payload.
    pub fn to_payload(&self) -> TaskPayload {
        let mut map = Map::new();
        if let Mutation::EditEmployee { fields, .. } = self {
            map.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        map.insert("action".to_string(), Value::from(self.action()));
        map.insert("id".to_string(), Value::from(self.employee_id()));
        TaskPayload::from_map(map)
    }
}

// Integer ids are the norm; numeric strings are tolerated because older
// clients wrote ids taken straight from text inputs.
fn employee_id(payload: &TaskPayload) -> Result<i64, MalformedTask> {
    match payload.get("id") {
        None | Some(Value::Null) => Err(MalformedTask::MissingField("id")),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| MalformedTask::InvalidField {
            field: "id",
            reason: format!("{} is not an integer", n),
        }),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| MalformedTask::InvalidField {
            field: "id",
            reason: format!("{:?} is not an integer", s),
        }),
        Some(other) => Err(MalformedTask::InvalidField {
            field: "id",
            reason: format!("unexpected type: {}", other),
        }),
    }
}
