use std::sync::Arc;

use repofolio::{
    CheckResponse, ClearResponse, ErrorResponse, FullResponse, Pipeline, PipelineConfig,
    PipelineError, ReadmeLookup, UpdateResponse, short_error_message,
};
use serde::Serialize;

use crate::progress::ProgressReporter;

/// A query mode selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mode {
    Full,
    Check,
    Update(Vec<String>),
    Readme(String),
    Clear,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Full(FullResponse),
    Check(CheckResponse),
    Update(UpdateResponse),
    Readme(ReadmeLookup),
    Clear(ClearResponse),
}

async fn run(pipeline: &Pipeline, mode: Mode) -> Result<Output, PipelineError> {
    Ok(match mode {
        Mode::Full => Output::Full(pipeline.full().await?),
        Mode::Check => Output::Check(pipeline.check().await?),
        Mode::Update(names) => Output::Update(pipeline.update(&names).await?),
        Mode::Readme(name) => Output::Readme(pipeline.readme(&name).await?),
        Mode::Clear => Output::Clear(pipeline.clear()),
    })
}

fn render<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Print the failure envelope and hand the error back for the exit status.
fn fail(err: &PipelineError) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render(&ErrorResponse::from(err))?);
    Err(short_error_message(err).into())
}

pub(crate) async fn handle_mode(
    mode: Mode,
    pipeline_config: PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let reporter = Arc::new(ProgressReporter::new());

    let pipeline = match Pipeline::builder()
        .config(pipeline_config)
        .progress(reporter.as_callback())
        .build()
    {
        Ok(pipeline) => pipeline,
        Err(e) => return fail(&e),
    };

    tracing::debug!(?mode, username = %pipeline.config().username, "Running");
    let result = run(&pipeline, mode).await;
    reporter.finish();

    match result {
        Ok(output) => {
            println!("{}", render(&output)?);
            Ok(())
        }
        Err(e) => fail(&e),
    }
}
