//! Vocalis batch harness.
//!
//! Drives the engine over WAV files and prints the wire-contract JSON to
//! stdout. The signature store is in-memory, so verification flows enroll
//! and probe within one invocation.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vocalis_core::api::{AudioType, GenerationRequest, PerceptualProfile, PromptType, VoiceType};
use vocalis_core::{AudioInput, EmbedderHandle, EngineConfig, SpectralEmbedder, VocalisEngine};

#[derive(Parser, Debug)]
#[command(name = "vocalis")]
#[command(about = "Vocal feature & voice-signature engine harness")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Treat inputs as sung rather than spoken audio.
    #[arg(long, global = true)]
    sung: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one WAV file and print the full vocal analysis.
    Analyze {
        file: PathBuf,

        /// Recording prompt the sample responds to.
        #[arg(long, value_enum, default_value_t = PromptArg::Sustained)]
        prompt: PromptArg,
    },

    /// Enroll a voice signature from ≥ 3 WAV samples.
    Enroll {
        /// Display name for the signature.
        #[arg(short, long)]
        name: String,

        /// Enrollment samples (minimum 3).
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Enroll from samples, then verify a probe against the signature.
    Verify {
        /// Probe recording.
        probe: PathBuf,

        /// Display name for the enrolled signature.
        #[arg(short, long, default_value = "Primary Voice")]
        name: String,

        /// Enrollment samples (minimum 3).
        #[arg(short, long, required = true, num_args = 1..)]
        enroll: Vec<PathBuf>,
    },

    /// Enroll from samples, then score generated audio against the request.
    ScoreGeneration {
        /// The generated audio to score.
        generated: PathBuf,

        /// Enrollment samples (minimum 3).
        #[arg(short, long, required = true, num_args = 1..)]
        enroll: Vec<PathBuf>,

        #[arg(long, value_enum, default_value_t = VoiceTypeArg::Storyteller)]
        voice_type: VoiceTypeArg,

        #[arg(long, value_enum, default_value_t = ProfileArg::Podcast)]
        profile: ProfileArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PromptArg {
    Sustained,
    Passage,
    Verse,
}

impl From<PromptArg> for PromptType {
    fn from(value: PromptArg) -> Self {
        match value {
            PromptArg::Sustained => PromptType::Sustained,
            PromptArg::Passage => PromptType::Passage,
            PromptArg::Verse => PromptType::Verse,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VoiceTypeArg {
    Command,
    Intimate,
    Storyteller,
    Whisper,
    Urgent,
}

impl From<VoiceTypeArg> for VoiceType {
    fn from(value: VoiceTypeArg) -> Self {
        match value {
            VoiceTypeArg::Command => VoiceType::Command,
            VoiceTypeArg::Intimate => VoiceType::Intimate,
            VoiceTypeArg::Storyteller => VoiceType::Storyteller,
            VoiceTypeArg::Whisper => VoiceType::Whisper,
            VoiceTypeArg::Urgent => VoiceType::Urgent,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProfileArg {
    Podcast,
    Warm,
    Broadcast,
    Asmr,
}

impl From<ProfileArg> for PerceptualProfile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Podcast => PerceptualProfile::Podcast,
            ProfileArg::Warm => PerceptualProfile::Warm,
            ProfileArg::Broadcast => PerceptualProfile::Broadcast,
            ProfileArg::Asmr => PerceptualProfile::Asmr,
        }
    }
}

fn load_input(path: &Path, audio_type: AudioType) -> Result<AudioInput> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("wav") => "audio/wav",
        other => bail!(
            "unsupported file extension {:?} for {} (WAV expected)",
            other,
            path.display()
        ),
    };
    Ok(AudioInput {
        bytes,
        mime: mime.into(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
        audio_type,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let audio_type = if args.sung {
        AudioType::Sung
    } else {
        AudioType::Spoken
    };

    let engine = VocalisEngine::new(
        EngineConfig::default(),
        EmbedderHandle::new(SpectralEmbedder::default()),
    );

    match args.command {
        Command::Analyze { file, prompt } => {
            let input = load_input(&file, audio_type)?;
            let response = engine.analyze(input, prompt.into()).await?;
            print_json(&response)?;
        }

        Command::Enroll { name, files } => {
            let inputs = files
                .iter()
                .map(|f| load_input(f, audio_type))
                .collect::<Result<Vec<_>>>()?;
            let response = engine.enroll(&name, inputs).await?;
            print_json(&response)?;
        }

        Command::Verify {
            probe,
            name,
            enroll,
        } => {
            let inputs = enroll
                .iter()
                .map(|f| load_input(f, audio_type))
                .collect::<Result<Vec<_>>>()?;
            let enrolled = engine.enroll(&name, inputs).await?;
            info!(
                signature_id = enrolled.signature_id.as_str(),
                quality = enrolled.quality_score,
                "signature enrolled"
            );

            let probe_input = load_input(&probe, audio_type)?;
            let response = engine
                .verify(probe_input, Some(&enrolled.signature_id))
                .await?;
            print_json(&response)?;
        }

        Command::ScoreGeneration {
            generated,
            enroll,
            voice_type,
            profile,
        } => {
            let inputs = enroll
                .iter()
                .map(|f| load_input(f, audio_type))
                .collect::<Result<Vec<_>>>()?;
            let enrolled = engine.enroll("Generation Target", inputs).await?;

            let request = GenerationRequest {
                text: String::new(),
                signature_id: enrolled.signature_id.clone(),
                voice_type: voice_type.into(),
                inflections: vec![],
                perceptual_profile: profile.into(),
                pitch_variance: 50.0,
                speaking_rate: 50.0,
                expressiveness: 70.0,
            };
            let generated_input = load_input(&generated, audio_type)?;
            let scores = engine.score_generation(generated_input, &request).await?;
            print_json(&scores)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("vocalis: {e:#}");
        std::process::exit(1);
    }
}
