use std::io::Write;

use anyhow::Context;
use clap::Parser;
use cli_args::Args;
use gpt2::{
    Gpt2, InferenceFeedback, InferenceRequest, LoadProgress, Multinomial, SessionConfig,
    Vocabulary, XorShiftRng,
};
use rand::SeedableRng;

mod cli_args;

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    if let Err(err) = infer(&args) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn infer(args: &Args) -> anyhow::Result<()> {
    let model = Gpt2::load(&args.model_path, |progress| match progress {
        LoadProgress::HyperparametersLoaded => log::debug!("Loaded hyperparameters"),
        LoadProgress::ArenaAllocated { bytes } => log::debug!(
            "parameter arena size = {}",
            bytesize::to_string(bytes as u64, false)
        ),
        LoadProgress::Loaded { parameter_count } => {
            log::info!("Loaded model with {parameter_count} parameters")
        }
    })
    .with_context(|| format!("could not load model from {:?}", args.model_path))?;

    let n_ctx = model.hyperparameters().n_ctx;
    let seq_len = args.seq_len.unwrap_or(n_ctx);
    if seq_len > n_ctx {
        log::warn!("sequence length {seq_len} exceeds the model maximum {n_ctx}; clamping");
    }

    let mut session = model
        .start_session(SessionConfig {
            seq_len,
            oversize_ratio: args.oversize_ratio,
        })
        .context("could not start an inference session")?;

    let vocabulary = match Vocabulary::load(&args.decoder_path) {
        Ok(vocabulary) => Some(vocabulary),
        Err(err) => {
            log::warn!(
                "could not load decoder table from {:?} ({err}); printing token ids",
                args.decoder_path
            );
            None
        }
    };

    let mut rng = XorShiftRng::seed_from_u64(args.seed);
    let request = InferenceRequest {
        maximum_token_count: usize::try_from(args.num_tokens).ok(),
    };

    let mut stdout = std::io::stdout();
    let stats = session.infer::<std::io::Error>(
        &model,
        &mut rng,
        &Multinomial,
        &request,
        |id| {
            match &vocabulary {
                Some(vocabulary) => {
                    if let Some(word) = vocabulary.decode(id) {
                        stdout.write_all(word)?;
                    }
                }
                None => write!(stdout, "{id} ")?,
            }
            stdout.flush()?;
            Ok(InferenceFeedback::Continue)
        },
    )?;
    println!();

    log::debug!("{stats}");

    Ok(())
}
