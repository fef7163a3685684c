//! End-to-end pipeline scenarios over stub collaborators.
//!
//! The stubs record every remote call so the strict side-effect ordering
//! (render before delivery, delivery before annotation) is observable.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use cartolina::application::clock::Clock;
use cartolina::application::gateway::{
    ArtifactHandle, DeliveryGateway, GatewayError, ResolvedArtifact,
};
use cartolina::application::pipeline::{
    CardOptions, CardRenderer, Stage, Submission, SubmissionPipeline,
};
use cartolina::application::raster::{CaptureRequest, RasterError, RasterService, RenderEngine};
use cartolina::application::session::{
    ActivationEvent, COMPOSE_FORM_ID, FormPort, FormPortError, FormSpec, InteractionSession,
    RequesterIdentity, SessionError,
};
use cartolina::application::template::TemplateDocument;
use cartolina::domain::counters::{CounterSampler, EngagementCounters};

// ---- stub collaborators ----------------------------------------------------

#[derive(Default)]
struct CallLog(Mutex<Vec<&'static str>>);

impl CallLog {
    fn record(&self, call: &'static str) {
        self.0.lock().expect("call log").push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.0.lock().expect("call log").clone()
    }
}

struct StubEngine {
    log: Arc<CallLog>,
    markup_seen: Mutex<Vec<String>>,
    fail: bool,
}

impl StubEngine {
    fn ok(log: Arc<CallLog>) -> Self {
        Self {
            log,
            markup_seen: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing(log: Arc<CallLog>) -> Self {
        Self {
            log,
            markup_seen: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn last_markup(&self) -> String {
        self.markup_seen
            .lock()
            .expect("markup log")
            .last()
            .cloned()
            .expect("at least one capture")
    }
}

#[async_trait]
impl RenderEngine for StubEngine {
    async fn capture(&self, markup: &str, _request: &CaptureRequest) -> Result<Bytes, RasterError> {
        self.log.record("capture");
        self.markup_seen
            .lock()
            .expect("markup log")
            .push(markup.to_string());
        if self.fail {
            // The engine raised during settle-wait.
            return Err(RasterError::Engine {
                exit_code: Some(1),
                stderr: "navigation did not settle".to_string(),
            });
        }
        Ok(Bytes::from_static(b"\x89PNG-stub"))
    }
}

struct StubGateway {
    log: Arc<CallLog>,
    fail_publish: bool,
    fail_annotate: bool,
}

impl StubGateway {
    fn ok(log: Arc<CallLog>) -> Self {
        Self {
            log,
            fail_publish: false,
            fail_annotate: false,
        }
    }
}

#[async_trait]
impl DeliveryGateway for StubGateway {
    async fn publish(&self, image: Bytes) -> Result<ArtifactHandle, GatewayError> {
        self.log.record("publish");
        assert!(!image.is_empty(), "no partial buffer may reach delivery");
        if self.fail_publish {
            return Err(GatewayError::Rejected {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(ArtifactHandle("msg-1".to_string()))
    }

    async fn resolve(&self, handle: &ArtifactHandle) -> Result<ResolvedArtifact, GatewayError> {
        self.log.record("resolve");
        Ok(ResolvedArtifact {
            channel_id: "feed".to_string(),
            message_id: handle.0.clone(),
        })
    }

    async fn annotate(
        &self,
        _artifact: &ResolvedArtifact,
        marker: &str,
    ) -> Result<(), GatewayError> {
        self.log.record("annotate");
        assert_eq!(marker, "🔃");
        if self.fail_annotate {
            return Err(GatewayError::Rejected {
                status: 403,
                body: "missing permission".to_string(),
            });
        }
        Ok(())
    }
}

struct FixedSampler(EngagementCounters);

impl CounterSampler for FixedSampler {
    fn sample(&self) -> EngagementCounters {
        self.0
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

struct StubFormPort {
    log: Arc<CallLog>,
}

#[async_trait]
impl FormPort for StubFormPort {
    async fn present_form(&self, spec: &FormSpec) -> Result<(), FormPortError> {
        assert_eq!(spec.id, COMPOSE_FORM_ID);
        self.log.record("present_form");
        Ok(())
    }
}

struct BrokenFormPort;

#[async_trait]
impl FormPort for BrokenFormPort {
    async fn present_form(&self, _spec: &FormSpec) -> Result<(), FormPortError> {
        Err(FormPortError::new("interaction token expired"))
    }
}

// ---- fixtures --------------------------------------------------------------

fn template() -> TemplateDocument {
    let source = "<html><body><div class=\"card\">\
        <img src=\"{{AVATAR_URL}}\">\
        <b>{{DISPLAY_NAME}}</b> @{{HANDLE}}\
        <p>{{TEXT}}</p>\
        <span>{{TIME}} · {{DATE}}</span>\
        <span>{{COMMENTS}} {{RETWEETS}} {{LIKES}} {{VIEWS}} {{SHARES}}</span>\
        {{#if VERIFIED}}<img class=\"badge\">{{/if}}\
        </div></body></html>";
    TemplateDocument::parse(source).expect("valid template")
}

fn scenario_counters() -> EngagementCounters {
    EngagementCounters {
        comments: 45,
        reposts: 1234,
        likes: 15_234,
        views: 99_999,
        shares: 12,
    }
}

fn renderer(engine: Arc<StubEngine>) -> CardRenderer {
    let raster = RasterService::new(
        engine,
        CaptureRequest {
            viewport_width: 600,
            viewport_height: 400,
            device_scale_factor: 2.0,
            selector: ".card".to_string(),
            omit_background: false,
        },
        Duration::from_secs(5),
    );

    let now = chrono::NaiveDate::from_ymd_opt(2026, 8, 27)
        .and_then(|d| d.and_hms_opt(13, 5, 0))
        .expect("valid datetime")
        .and_utc();

    CardRenderer::new(
        Arc::new(template()),
        raster,
        Arc::new(FixedSampler(scenario_counters())),
        Arc::new(FixedClock(now)),
        CardOptions {
            time_zone: chrono_tz::UTC,
            verified_badge: false,
            reaction_marker: "🔃".to_string(),
        },
    )
}

fn submission() -> Submission {
    Submission {
        handle: "im_franco".to_string(),
        avatar_url: Url::parse("https://cdn.example.net/a.png").expect("url"),
        body: "hello world".to_string(),
    }
}

// ---- scenarios -------------------------------------------------------------

#[tokio::test]
async fn successful_run_orders_side_effects_strictly() {
    let log = Arc::new(CallLog::default());
    let engine = Arc::new(StubEngine::ok(log.clone()));
    let gateway = Arc::new(StubGateway::ok(log.clone()));
    let pipeline = SubmissionPipeline::new(renderer(engine.clone()), gateway);

    let mut stages = Vec::new();
    let receipt = pipeline
        .run_observed(submission(), &mut |stage| stages.push(stage))
        .await
        .expect("run succeeds");

    assert_eq!(log.calls(), ["capture", "publish", "resolve", "annotate"]);
    assert_eq!(
        stages,
        [
            Stage::MetricsSynthesized,
            Stage::Rendering,
            Stage::Delivering,
            Stage::Annotating,
            Stage::Completed,
        ]
    );
    assert!(receipt.annotated);
    assert_eq!(receipt.artifact, ArtifactHandle("msg-1".to_string()));

    // Text embedded verbatim exactly once, display name cut at the first
    // underscore, counters formatted per the boundary rules.
    let markup = engine.last_markup();
    assert_eq!(markup.matches("hello world").count(), 1);
    assert!(markup.contains("<b>im</b> @im_franco"));
    assert!(markup.contains("13:05 · 27/08/2026"));
    assert!(markup.contains("45 1.2K 15K 100K 12"));
    assert!(markup.contains("<!--<img class=\"badge\">-->"));
}

#[tokio::test]
async fn render_failure_records_zero_gateway_calls() {
    let log = Arc::new(CallLog::default());
    let engine = Arc::new(StubEngine::failing(log.clone()));
    let gateway = Arc::new(StubGateway::ok(log.clone()));
    let pipeline = SubmissionPipeline::new(renderer(engine), gateway);

    let err = pipeline.run(submission()).await.expect_err("render fails");
    assert!(matches!(
        err,
        cartolina::application::error::PipelineError::Render(_)
    ));
    assert_eq!(log.calls(), ["capture"]);
}

#[tokio::test]
async fn publish_failure_stops_before_annotation() {
    let log = Arc::new(CallLog::default());
    let engine = Arc::new(StubEngine::ok(log.clone()));
    let gateway = Arc::new(StubGateway {
        log: log.clone(),
        fail_publish: true,
        fail_annotate: false,
    });
    let pipeline = SubmissionPipeline::new(renderer(engine), gateway);

    let err = pipeline.run(submission()).await.expect_err("publish fails");
    assert!(matches!(
        err,
        cartolina::application::error::PipelineError::Delivery(_)
    ));
    assert_eq!(log.calls(), ["capture", "publish"]);
}

#[tokio::test]
async fn annotation_failure_degrades_without_failing_the_run() {
    let log = Arc::new(CallLog::default());
    let engine = Arc::new(StubEngine::ok(log.clone()));
    let gateway = Arc::new(StubGateway {
        log: log.clone(),
        fail_publish: false,
        fail_annotate: true,
    });
    let pipeline = SubmissionPipeline::new(renderer(engine), gateway);

    let receipt = pipeline.run(submission()).await.expect("run succeeds");
    assert!(!receipt.annotated);
    assert_eq!(log.calls(), ["capture", "publish", "resolve", "annotate"]);
}

#[tokio::test]
async fn session_walks_the_full_state_machine() {
    let log = Arc::new(CallLog::default());
    let engine = Arc::new(StubEngine::ok(log.clone()));
    let gateway = Arc::new(StubGateway::ok(log.clone()));
    let pipeline = SubmissionPipeline::new(renderer(engine), gateway);
    let port = StubFormPort { log: log.clone() };

    let mut session = InteractionSession::new(RequesterIdentity {
        handle: "im_franco".to_string(),
        avatar_url: Url::parse("https://cdn.example.net/a.png").expect("url"),
    });
    assert_eq!(session.state(), Stage::Idle);

    session.open_form(&port).await.expect("form presented");
    assert_eq!(session.state(), Stage::FormRequested);

    let receipt = session
        .submit(
            ActivationEvent::Submit {
                form_id: COMPOSE_FORM_ID.to_string(),
                body: Some("hello world".to_string()),
            },
            &pipeline,
        )
        .await
        .expect("submission completes");

    assert_eq!(session.state(), Stage::Completed);
    assert_eq!(receipt.confirmation_message(), "✅ Your card is live!");
    assert_eq!(
        log.calls(),
        ["present_form", "capture", "publish", "resolve", "annotate"]
    );
}

#[tokio::test]
async fn form_presentation_failure_keeps_the_session_idle() {
    let mut session = InteractionSession::new(RequesterIdentity {
        handle: "im_franco".to_string(),
        avatar_url: Url::parse("https://cdn.example.net/a.png").expect("url"),
    });

    let err = session
        .open_form(&BrokenFormPort)
        .await
        .expect_err("presentation failure surfaces");

    assert!(matches!(err, SessionError::FormPresentation(_)));
    assert_eq!(session.state(), Stage::Idle);
}

#[tokio::test]
async fn missing_text_field_never_leaves_form_requested() {
    let log = Arc::new(CallLog::default());
    let engine = Arc::new(StubEngine::ok(log.clone()));
    let gateway = Arc::new(StubGateway::ok(log.clone()));
    let pipeline = SubmissionPipeline::new(renderer(engine), gateway);
    let port = StubFormPort { log: log.clone() };

    let mut session = InteractionSession::new(RequesterIdentity {
        handle: "im_franco".to_string(),
        avatar_url: Url::parse("https://cdn.example.net/a.png").expect("url"),
    });
    session.open_form(&port).await.expect("form presented");

    let err = session
        .submit(
            ActivationEvent::Submit {
                form_id: COMPOSE_FORM_ID.to_string(),
                body: None,
            },
            &pipeline,
        )
        .await
        .expect_err("missing field is rejected");

    assert!(matches!(err, SessionError::MissingField));
    assert_eq!(session.state(), Stage::FormRequested);
    assert_eq!(log.calls(), ["present_form"]);
}

#[tokio::test]
async fn engine_failure_during_session_reaches_failed_state() {
    let log = Arc::new(CallLog::default());
    let engine = Arc::new(StubEngine::failing(log.clone()));
    let gateway = Arc::new(StubGateway::ok(log.clone()));
    let pipeline = SubmissionPipeline::new(renderer(engine), gateway);
    let port = StubFormPort { log: log.clone() };

    let mut session = InteractionSession::new(RequesterIdentity {
        handle: "im_franco".to_string(),
        avatar_url: Url::parse("https://cdn.example.net/a.png").expect("url"),
    });
    session.open_form(&port).await.expect("form presented");

    let err = session
        .submit(
            ActivationEvent::Submit {
                form_id: COMPOSE_FORM_ID.to_string(),
                body: Some("hello world".to_string()),
            },
            &pipeline,
        )
        .await
        .expect_err("render failure fails the session");

    assert_eq!(err.user_message(), "Your card could not be rendered. Nothing was posted.");
    assert_eq!(session.state(), Stage::Failed);
    assert_eq!(log.calls(), ["present_form", "capture"]);
}

#[tokio::test]
async fn foreign_form_submissions_are_ignored() {
    let log = Arc::new(CallLog::default());
    let engine = Arc::new(StubEngine::ok(log.clone()));
    let gateway = Arc::new(StubGateway::ok(log.clone()));
    let pipeline = SubmissionPipeline::new(renderer(engine), gateway);
    let port = StubFormPort { log: log.clone() };

    let mut session = InteractionSession::new(RequesterIdentity {
        handle: "im_franco".to_string(),
        avatar_url: Url::parse("https://cdn.example.net/a.png").expect("url"),
    });
    session.open_form(&port).await.expect("form presented");

    let err = session
        .submit(
            ActivationEvent::Submit {
                form_id: "unrelated_form".to_string(),
                body: Some("hello".to_string()),
            },
            &pipeline,
        )
        .await
        .expect_err("foreign form is rejected");

    assert!(matches!(err, SessionError::ForeignForm { .. }));
    assert_eq!(session.state(), Stage::FormRequested);
    assert_eq!(log.calls(), ["present_form"]);
}
