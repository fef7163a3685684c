use std::{process, sync::Arc};

use cartolina::{
    application::{
        clock::SystemClock,
        error::AppError,
        pipeline::{CardOptions, CardRenderer, Submission, SubmissionPipeline},
        raster::{CaptureRequest, RasterService},
    },
    config::{self, CliArgs, Command, ComposeArgs, RenderArgs, Settings, SubmissionArgs},
    domain::counters::{CounterSampler, RangeSampler},
    infra::{assets, discord::DiscordGateway, error::InfraError, shot::SnapshotCli, telemetry},
};
use clap::Parser;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli = CliArgs::parse();
    let settings = config::load(&cli)
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    match cli.command {
        Command::Compose(args) => run_compose(settings, args).await,
        Command::Render(args) => run_render(settings, args).await,
    }
}

async fn run_compose(settings: Settings, args: ComposeArgs) -> Result<(), AppError> {
    let Some(discord) = settings.discord.as_ref() else {
        return Err(InfraError::configuration(
            "delivery is not configured: set discord.bot_token, discord.webhook_id, \
             discord.webhook_token and discord.feed_channel_id",
        )
        .into());
    };

    let gateway = DiscordGateway::new(discord)
        .map_err(|err| AppError::unexpected(format!("failed to build gateway: {err}")))?;
    let renderer = build_renderer(&settings, &args.submission).await?;
    let pipeline = SubmissionPipeline::new(renderer, Arc::new(gateway));

    let submission = submission_from_args(&args.submission);
    match pipeline.run(submission).await {
        Ok(receipt) => {
            if !receipt.annotated {
                info!(
                    artifact = %receipt.artifact.0,
                    "published without the reaction marker"
                );
            }
            println!("{}", receipt.confirmation_message());
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            Err(err.into())
        }
    }
}

async fn run_render(settings: Settings, args: RenderArgs) -> Result<(), AppError> {
    let renderer = build_renderer(&settings, &args.submission).await?;
    let submission = submission_from_args(&args.submission);

    match renderer.render_image(&submission).await {
        Ok(image) => {
            tokio::fs::write(&args.out, &image)
                .await
                .map_err(InfraError::from)?;
            println!("wrote {} bytes to {}", image.len(), args.out.display());
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            Err(err.into())
        }
    }
}

async fn build_renderer(
    settings: &Settings,
    submission: &SubmissionArgs,
) -> Result<CardRenderer, AppError> {
    let template = assets::load_template(settings.render.template_path.as_deref()).await?;

    let engine = SnapshotCli::new(settings.render.engine_cli_path.clone());
    let raster = RasterService::new(
        Arc::new(engine),
        CaptureRequest {
            viewport_width: settings.render.viewport_width,
            viewport_height: settings.render.viewport_height,
            device_scale_factor: settings.render.device_scale_factor,
            selector: settings.render.selector.clone(),
            omit_background: settings.render.omit_background,
        },
        settings.render.timeout,
    );

    let sampler: Arc<dyn CounterSampler> = match submission.seed {
        Some(seed) => Arc::new(RangeSampler::seeded(seed)),
        None => Arc::new(RangeSampler::from_os_entropy()),
    };

    Ok(CardRenderer::new(
        Arc::new(template),
        raster,
        sampler,
        Arc::new(SystemClock),
        CardOptions {
            time_zone: settings.card.time_zone,
            verified_badge: settings.card.verified_badge,
            reaction_marker: settings.card.reaction_marker.clone(),
        },
    ))
}

fn submission_from_args(args: &SubmissionArgs) -> Submission {
    Submission {
        handle: args.handle.clone(),
        avatar_url: args.avatar_url.clone(),
        body: args.text.clone(),
    }
}
