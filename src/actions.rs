use crate::error::ClientError;
use crate::form::{self, SECRET_FIELDS, secret};
use crate::gate::{CapturedAction, GateMode, GuardRequest};
use crate::models::NewRecord;

/// Outcome of a captured action, surfaced as one notification plus state
/// updates for the owning feature to apply.
pub struct ActionReport {
    pub message: String,
    pub effects: Vec<ActionEffect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEffect {
    RefreshRecords,
    RecordDeleted(String),
    Revealed { title: String, payload: String },
    CredentialsRegistered { email: String, question: String },
    RemoteRegistered,
}

/// A feature offers exactly one of the two modes: a lightweight confirmation
/// until a secret question exists, a full challenge afterwards.
pub fn guard_mode(has_question: bool) -> GateMode {
    if has_question {
        GateMode::Challenge
    } else {
        GateMode::Confirm
    }
}

const VERIFY_TITLE: &str = "Verify Secret Question";

/// Guard for storing a new secret. Requires registered credentials: the
/// payload is encrypted to the stored key and sealed with the verified
/// answer, so there is no confirmation fallback.
pub fn submit_secret(
    values: &[String; SECRET_FIELDS],
    has_email: bool,
    has_question: bool,
    has_remote: bool,
    question: &str,
) -> Result<GuardRequest, ClientError> {
    if !has_email || !has_question {
        return Err(ClientError::PrerequisiteMissing);
    }
    let record = NewRecord {
        app: values[secret::APP].trim().to_string(),
        desc: values[secret::DESC].trim().to_string(),
        format: values[secret::FORMAT].clone(),
        payload: values[secret::SECRETS].trim().to_string(),
        push_to_cloud: values[secret::PUSH] == "yes",
    };
    let repo = if has_remote {
        String::new()
    } else {
        values[secret::REPO].trim().to_string()
    };
    let action: CapturedAction = Box::new(move |backend, answer| {
        let mut effects = vec![ActionEffect::RefreshRecords];
        if !repo.is_empty() {
            backend.register_remote(&repo)?;
            effects.push(ActionEffect::RemoteRegistered);
        }
        backend.add_record(&record, answer.unwrap_or_default())?;
        Ok(ActionReport {
            message: "Encrypt secrets successfully".into(),
            effects,
        })
    });
    Ok(GuardRequest::new(
        GateMode::Challenge,
        VERIFY_TITLE,
        question,
        action,
    ))
}

pub fn delete_record(
    id: &str,
    has_email: bool,
    has_question: bool,
    question: &str,
) -> Result<GuardRequest, ClientError> {
    let mode = guard_mode(has_question);
    if mode == GateMode::Challenge && !has_email {
        return Err(ClientError::PrerequisiteMissing);
    }
    let (title, prompt) = match mode {
        GateMode::Challenge => (VERIFY_TITLE, question.to_string()),
        GateMode::Confirm => (
            "Delete Secrets",
            format!("Are you sure to delete the secrets {id} ?"),
        ),
    };
    let id = id.to_string();
    let action: CapturedAction = Box::new(move |backend, _answer| {
        backend.delete_record(&id)?;
        Ok(ActionReport {
            message: format!("Delete secrets {id} successfully"),
            effects: vec![ActionEffect::RecordDeleted(id.clone())],
        })
    });
    Ok(GuardRequest::new(mode, title, prompt, action))
}

pub fn decrypt_record(
    id: &str,
    has_email: bool,
    has_question: bool,
    question: &str,
) -> Result<GuardRequest, ClientError> {
    let mode = guard_mode(has_question);
    if mode == GateMode::Challenge && !has_email {
        return Err(ClientError::PrerequisiteMissing);
    }
    let (title, prompt) = match mode {
        GateMode::Challenge => (VERIFY_TITLE, question.to_string()),
        GateMode::Confirm => (
            "Decrypt Secrets",
            format!("Are you sure to decrypt the secrets {id} ?"),
        ),
    };
    let id = id.to_string();
    let action: CapturedAction = Box::new(move |backend, answer| {
        let payload = backend.decrypt_record(&id, answer)?;
        Ok(ActionReport {
            message: format!("Decrypt secrets {id} successfully"),
            effects: vec![ActionEffect::Revealed {
                title: format!("Decrypt Secrets {id}"),
                payload,
            }],
        })
    });
    Ok(GuardRequest::new(mode, title, prompt, action))
}

/// Guard for the one-shot credential registration. Always a confirmation:
/// the question being registered cannot verify itself.
pub fn register_credentials(values: &[String; form::PANEL_FIELDS]) -> GuardRequest {
    let email = values[form::panel::EMAIL].trim().to_string();
    let question = values[form::panel::QUESTION].trim().to_string();
    let answer = values[form::panel::ANSWER].trim().to_string();
    let prompt = format!(
        "You can NOT change these settings. Are you sure to add email {email} and question {question} ?"
    );
    let action: CapturedAction = Box::new(move |backend, _answer| {
        backend.register_challenge(&email, &question, &answer)?;
        Ok(ActionReport {
            message: "Add email and question successfully".into(),
            effects: vec![ActionEffect::CredentialsRegistered {
                email: email.clone(),
                question: question.clone(),
            }],
        })
    });
    GuardRequest::new(GateMode::Confirm, "Add Email and Question", prompt, action)
}
