//! The interaction session tying one trigger event to one in-flight
//! submission.
//!
//! A session is created on the trigger event, carries through form display
//! and submission capture, and is destroyed once the final confirmation or
//! failure notice is delivered. Sessions never persist and never share
//! mutable state; concurrent requesters each get their own.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use url::Url;

use super::error::PipelineError;
use super::pipeline::{Stage, Submission, SubmissionPipeline, SubmissionReceipt};

/// Identifier of the compose form; submissions are matched against it.
pub const COMPOSE_FORM_ID: &str = "card_compose";

/// The structured input form shown to the requester.
#[derive(Debug, Clone, Copy)]
pub struct FormSpec {
    pub id: &'static str,
    pub title: &'static str,
    pub field_label: &'static str,
}

impl FormSpec {
    pub fn compose() -> Self {
        Self {
            id: COMPOSE_FORM_ID,
            title: "📝 Write your card",
            field_label: "What's on your mind?",
        }
    }
}

/// Identity attached to activation events by the chat platform.
#[derive(Debug, Clone)]
pub struct RequesterIdentity {
    pub handle: String,
    pub avatar_url: Url,
}

/// Events the activation source delivers to a session.
#[derive(Debug, Clone)]
pub enum ActivationEvent {
    /// The requester pressed the compose trigger.
    Trigger,
    /// The requester submitted the form. `body` is `None` when the required
    /// field was absent from the payload.
    Submit {
        form_id: String,
        body: Option<String>,
    },
}

/// Boundary to the chat platform's form UI.
#[async_trait]
pub trait FormPort: Send + Sync {
    async fn present_form(&self, spec: &FormSpec) -> Result<(), FormPortError>;
}

#[derive(Debug, Error)]
#[error("form could not be presented: {message}")]
pub struct FormPortError {
    pub message: String,
}

impl FormPortError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    FormPresentation(#[from] FormPortError),
    #[error("event `{event}` is not valid in state {state:?}")]
    UnexpectedEvent {
        event: &'static str,
        state: Stage,
    },
    #[error("submission form `{form_id}` does not match the open form")]
    ForeignForm { form_id: String },
    #[error("submission is missing the required text field")]
    MissingField,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl SessionError {
    /// The single private notice for the requester.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::Pipeline(err) => err.user_message(),
            SessionError::MissingField => "Your card needs some text first.",
            _ => "Something went wrong. Nothing was posted.",
        }
    }
}

/// State machine for one requester's in-flight submission.
pub struct InteractionSession {
    requester: RequesterIdentity,
    state: Stage,
}

impl InteractionSession {
    /// A fresh session in `Idle`, created when the trigger event arrives.
    pub fn new(requester: RequesterIdentity) -> Self {
        Self {
            requester,
            state: Stage::Idle,
        }
    }

    pub fn state(&self) -> Stage {
        self.state
    }

    /// `Idle → FormRequested`: present the structured input form.
    pub async fn open_form(&mut self, port: &dyn FormPort) -> Result<(), SessionError> {
        if self.state != Stage::Idle {
            return Err(SessionError::UnexpectedEvent {
                event: "trigger",
                state: self.state,
            });
        }

        port.present_form(&FormSpec::compose()).await?;
        self.state = Stage::FormRequested;

        info!(
            target = "application::session",
            op = "session::open_form",
            handle = %self.requester.handle,
            "compose form presented"
        );
        Ok(())
    }

    /// `FormRequested → SubmissionReceived → … → Completed`.
    ///
    /// A submission without the required text field is rejected before any
    /// pipeline state exists; the session stays in `FormRequested`.
    pub async fn submit(
        &mut self,
        event: ActivationEvent,
        pipeline: &SubmissionPipeline,
    ) -> Result<SubmissionReceipt, SessionError> {
        let ActivationEvent::Submit { form_id, body } = event else {
            return Err(SessionError::UnexpectedEvent {
                event: "trigger",
                state: self.state,
            });
        };

        if self.state != Stage::FormRequested {
            return Err(SessionError::UnexpectedEvent {
                event: "submit",
                state: self.state,
            });
        }
        if form_id != COMPOSE_FORM_ID {
            return Err(SessionError::ForeignForm { form_id });
        }
        let Some(body) = body.filter(|text| !text.trim().is_empty()) else {
            return Err(SessionError::MissingField);
        };

        self.state = Stage::SubmissionReceived;
        let submission = Submission {
            handle: self.requester.handle.clone(),
            avatar_url: self.requester.avatar_url.clone(),
            body,
        };

        let state = &mut self.state;
        let outcome = pipeline
            .run_observed(submission, &mut |stage| *state = stage)
            .await;

        match outcome {
            Ok(receipt) => {
                self.state = Stage::Completed;
                Ok(receipt)
            }
            Err(err) => {
                self.state = Stage::Failed;
                Err(SessionError::Pipeline(err))
            }
        }
    }
}
