use std::path::PathBuf;

use clap::Parser;
use keysong_core::dsp::engine::FADE_OUT_SECONDS;
use keysong_core::dsp::renderer;
use keysong_core::input::InputKind;
use keysong_core::{AppConfig, AudioEngine, InstrumentId, RhythmSession};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

/// Host clock step between input/timer polls.
const STEP_MS: u64 = 10;

fn main() -> keysong_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if !cli.instruments.is_empty() {
        config.session.selected_instruments = cli
            .instruments
            .iter()
            .map(|s| s.parse())
            .collect::<keysong_core::Result<Vec<InstrumentId>>>()?;
    }
    config.session.accessibility_mode |= cli.accessibility;
    config.session.throttle_rapid_typing |= cli.throttle;
    if let Some(seed) = cli.seed {
        config.engine.seed = seed;
    }

    let samples = simulate(&cli, &config)?;
    renderer::write_wav(&cli.out, &samples, config.engine.sample_rate)
}

/// Type at `cli.kpm` with random jitter for `cli.seconds`, then stop and
/// render the fade-out.
fn simulate(cli: &Cli, config: &AppConfig) -> keysong_core::Result<Vec<f32>> {
    let mut engine = AudioEngine::new(config.engine.clone())?;
    let mut session = RhythmSession::new(config.session.clone());
    let mut rng = StdRng::seed_from_u64(config.engine.seed);

    engine.start(&cli.mood)?;
    if let Some(volume) = cli.volume {
        engine.set_volume(volume);
    }
    session.set_active(true, 0);

    let frames_per_step = (config.engine.sample_rate as u64 * STEP_MS / 1000) as usize;
    let interval_ms = 60_000.0 / cli.kpm.max(1.0);
    let jitter = cli.jitter.clamp(0.0, 0.9);
    let typing_ms = (cli.seconds.max(0.0) * 1000.0) as u64;

    tracing::info!(mood = %cli.mood, kpm = cli.kpm, seconds = cli.seconds, "simulating typing session");

    let mut samples = Vec::new();
    let mut next_key_ms = 0.0_f64;
    let mut now_ms = 0;
    let mut notes = 0usize;
    while now_ms < typing_ms {
        while next_key_ms <= now_ms as f64 {
            let outcome = session.on_input(InputKind::Keystroke, next_key_ms as u64, &mut engine);
            if outcome.note.is_some_and(|n| n.played.is_some()) {
                notes += 1;
            }
            next_key_ms += interval_ms * (1.0 + rng.gen_range(-jitter..=jitter));
        }
        if let Some(update) = session.advance(now_ms, &mut engine) {
            let s = update.snapshot;
            tracing::info!(
                score = s.rhythm_score,
                bpm = s.bpm,
                kpm = s.keys_per_minute,
                intensity = ?s.intensity,
                "rhythm"
            );
        }
        samples.extend(engine.render_frames(frames_per_step));
        now_ms += STEP_MS;
    }

    session.set_active(false, now_ms);
    engine.stop();
    samples.extend(renderer::render_seconds(&mut engine, FADE_OUT_SECONDS + 0.25));

    tracing::info!(
        notes,
        frames = samples.len(),
        state = ?engine.engine_state(),
        "render complete"
    );
    Ok(samples)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Render a simulated Keysong typing session to WAV", long_about = None)]
struct Cli {
    /// Mood id: lofi, melody, jazz or nocturne.
    #[arg(short, long, default_value = "lofi")]
    mood: String,

    /// Seconds of typing before the fade-out.
    #[arg(short, long, default_value_t = 20.0)]
    seconds: f64,

    /// Typing speed in keys per minute.
    #[arg(short, long, default_value_t = 90.0)]
    kpm: f64,

    /// Random spread of each inter-key interval, as a fraction of it.
    #[arg(short, long, default_value_t = 0.25)]
    jitter: f64,

    /// Instruments to rotate through (comma separated).
    #[arg(short, long, value_delimiter = ',')]
    instruments: Vec<String>,

    /// Clamp notes into the accessible 200-800 Hz range.
    #[arg(long)]
    accessibility: bool,

    /// Enforce a 50 ms gap between notes.
    #[arg(long)]
    throttle: bool,

    /// Master volume 0..1 (defaults to the mood's volume).
    #[arg(short, long)]
    volume: Option<f64>,

    /// Seed for jitter and noise.
    #[arg(long)]
    seed: Option<u64>,

    /// JSON config file with `session` and `engine` sections.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output WAV path.
    #[arg(short, long, default_value = "keysong.wav")]
    out: PathBuf,
}
