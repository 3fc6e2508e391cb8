use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use compgen_harness::ScriptedProvider;
use compgen_pipeline::{
    AppConfig, GenerationRequest, GenerationSession, GenerationSettings, Generator, RelayStream,
    SessionState, pump, relay,
};
use futures::StreamExt as _;
use tracing::{info, warn};

/// Characters per delta when replaying a file.
const REPLAY_CHUNK_CHARS: usize = 24;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What the component should do.
    #[arg(long)]
    pub prompt: String,
    /// Existing component to edit instead of starting from scratch.
    #[arg(long)]
    pub prior_code: Option<PathBuf>,
    /// Write the final component here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Print raw relay frames to stdout instead of the final component.
    #[arg(long)]
    pub frames: bool,
    /// Replay a file's contents as the model output; no network access.
    #[arg(long)]
    pub replay: Option<PathBuf>,
}

pub async fn run(args: GenerateArgs, config: &AppConfig) -> Result<()> {
    let generator = build_generator(args.replay.as_deref(), config).await?;
    let prior_code = match &args.prior_code {
        Some(path) => Some(read(path).await?),
        None => None,
    };

    let mut session = GenerationSession::new();
    let (id, request) = session.begin(args.prompt.clone());
    let request = match prior_code {
        Some(code) => GenerationRequest::follow_up(request.prompt, code),
        None => request,
    };

    let frames = relay(generator.generate(request));
    let abort = frames.abort_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling generation");
            abort.abort();
        }
    });

    let outcome = if args.frames {
        let mut stdout = tokio::io::stdout();
        pump(frames, &mut stdout)
            .await
            .map(|_| ())
            .context("failed to write frames")
    } else {
        accumulate(frames, &mut session, id).await
    };
    interrupt.abort();
    outcome?;
    if args.frames {
        return Ok(());
    }

    match session.state() {
        SessionState::Completed => {}
        _ => bail!(
            "{}",
            session.error().unwrap_or("generation ended without a result")
        ),
    }
    match &args.out {
        Some(path) => {
            tokio::fs::write(path, session.buffer())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = session.buffer().len(), "component written");
        }
        None => println!("{}", session.buffer()),
    }
    Ok(())
}

async fn build_generator(replay: Option<&Path>, config: &AppConfig) -> Result<Generator> {
    let Some(path) = replay else {
        return Ok(Generator::from_config(config));
    };
    let text = read(path).await?;
    Ok(Generator::new(
        Arc::new(ScriptedProvider::replaying(&text, REPLAY_CHUNK_CHARS)),
        GenerationSettings::from_config(config),
    ))
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Feeds frames into `session`, echoing live code to stderr.
async fn accumulate(
    mut frames: RelayStream,
    session: &mut GenerationSession,
    id: compgen_pipeline::GenerationId,
) -> Result<()> {
    let mut echoed = 0;
    let mut stderr = std::io::stderr();
    while let Some(bytes) = frames.next().await {
        session.feed(id, &bytes)?;
        if session.state() == SessionState::Streaming
            && let Some(fresh) = session.buffer().get(echoed..)
            && !fresh.is_empty()
        {
            let _ = stderr.write_all(fresh.as_bytes());
            echoed = session.buffer().len();
        }
    }
    if echoed > 0 {
        let _ = writeln!(stderr);
    }
    Ok(())
}
