use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tubescribe::{Language, Model, PipelineOptions, TranscribeOptions};

#[derive(Parser)]
#[command(
    name = "tubescribe",
    about = "Download a video, transcribe it with Whisper, write transcript files"
)]
struct Cli {
    /// Video URL to transcribe.
    #[arg(required_unless_present_any = ["list_models", "download_model", "list_languages"])]
    url: Option<String>,

    /// Whisper model to use.
    #[arg(short, long, default_value = "base")]
    model: String,

    /// Language code (e.g. "en", "de") or "auto" for detection.
    #[arg(short, long, default_value = "auto")]
    language: String,

    /// Root directory for timestamped transcript output.
    #[arg(short, long, default_value = "transcripts")]
    output_dir: PathBuf,

    /// Download cache file.
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// Directory for downloaded videos.
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Model cache directory.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Disable GPU acceleration.
    #[arg(long)]
    no_gpu: bool,

    /// GPU device ID.
    #[arg(long, default_value = "0")]
    gpu_device: u32,

    /// Number of threads (default: auto).
    #[arg(long)]
    threads: Option<u32>,

    /// Sampling temperature.
    #[arg(long, default_value = "0.0")]
    temperature: f32,

    /// Keep the extracted audio file.
    #[arg(long)]
    keep_files: bool,

    /// Delete the downloaded video after transcribing (drops it from the cache).
    #[arg(long)]
    discard_video: bool,

    /// List available models.
    #[arg(long)]
    list_models: bool,

    /// Download a model without transcribing.
    #[arg(long)]
    download_model: Option<String>,

    /// List supported languages.
    #[arg(long)]
    list_languages: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tubescribe=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.list_languages {
        println!("{:<6} {}", "CODE", "LANGUAGE");
        println!("{:<6} {}", "----", "--------");
        for (code, name) in Language::supported() {
            println!("{code:<6} {name}");
        }
        return;
    }

    if cli.list_models {
        let models = [
            ("tiny", "75 MB"),
            ("tiny.en", "75 MB"),
            ("base", "142 MB"),
            ("base.en", "142 MB"),
            ("small", "466 MB"),
            ("small.en", "466 MB"),
            ("medium", "1.5 GB"),
            ("medium.en", "1.5 GB"),
            ("large-v2", "2.9 GB"),
            ("large-v3", "2.9 GB"),
            ("large-v3-turbo", "~1.6 GB"),
        ];
        println!("{:<16} {}", "MODEL", "SIZE");
        println!("{:<16} {}", "-----", "----");
        for (name, size) in models {
            println!("{name:<16} {size}");
        }

        let model_dir = cli
            .model_dir
            .unwrap_or_else(|| TranscribeOptions::default().resolve_model_dir());
        let cached = tubescribe::model::list_cached_models(&model_dir);
        if !cached.is_empty() {
            println!("\nCached models in {}:", model_dir.display());
            for path in cached {
                let size = std::fs::metadata(&path)
                    .map(|m| format_bytes(m.len()))
                    .unwrap_or_default();
                println!(
                    "  {} ({})",
                    path.file_name()
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    size
                );
            }
        }
        return;
    }

    if let Some(model_name) = &cli.download_model {
        let model = match Model::parse_name(model_name) {
            Some(m) => m,
            None => {
                eprintln!("Unknown model: {model_name}");
                eprintln!("Use --list-models to see available models");
                std::process::exit(1);
            }
        };
        let model_dir = cli
            .model_dir
            .unwrap_or_else(|| TranscribeOptions::default().resolve_model_dir());
        match tubescribe::model::ensure_model(&model, &model_dir).await {
            Ok(path) => println!("Model ready: {}", path.display()),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let url = cli.url.unwrap();

    let model = match Model::parse_name(&cli.model) {
        Some(m) => m,
        None => {
            // Try as custom model path
            let path = PathBuf::from(&cli.model);
            if path.exists() {
                Model::Custom(path)
            } else {
                eprintln!("Unknown model: {}", cli.model);
                eprintln!("Use --list-models to see available models, or provide a path to a .ggml file");
                std::process::exit(1);
            }
        }
    };

    let language = match Language::new(&cli.language) {
        Ok(lang) => lang,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --list-languages to see supported languages");
            std::process::exit(1);
        }
    };

    // Transcription progress arrives through the explicit callback;
    // whisper reports whole percentages.
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("Transcribing {wide_bar:.cyan/blue} {pos}%")
            .expect("valid template"),
    );
    let bar_for_callback = bar.clone();

    let mut transcribe_opts = TranscribeOptions::new()
        .model(model)
        .gpu(!cli.no_gpu)
        .gpu_device(cli.gpu_device)
        .temperature(cli.temperature)
        .on_progress(move |pct| bar_for_callback.set_position(pct.clamp(0, 100) as u64));
    transcribe_opts.language = language;

    if let Some(n) = cli.threads {
        transcribe_opts = transcribe_opts.n_threads(n);
    }
    if let Some(dir) = cli.model_dir {
        transcribe_opts = transcribe_opts.model_dir(dir);
    }

    let mut pipeline_opts = PipelineOptions::new()
        .output_root(cli.output_dir)
        .keep_intermediates(cli.keep_files)
        .discard_video(cli.discard_video)
        .transcribe(transcribe_opts);

    if let Some(path) = cli.cache_file {
        pipeline_opts = pipeline_opts.cache_file(path);
    }
    if let Some(dir) = cli.download_dir {
        pipeline_opts = pipeline_opts.download_dir(dir);
    }

    let output = match tubescribe::pipeline::run(&url, &pipeline_opts).await {
        Ok(o) => o,
        Err(e) => {
            bar.abandon();
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    bar.finish_and_clear();

    let t = &output.transcript;
    eprintln!(
        "Transcription complete: {:.1}s of audio, {} segments, language: {}{}",
        t.duration,
        t.segments.len(),
        t.language,
        if output.from_cache {
            " (video from cache)"
        } else {
            ""
        },
    );
    if let Some(title) = &t.source_title {
        eprintln!("Title: {title}");
    }

    println!("{}", output.output_dir.display());
    for path in [
        &output.files.txt,
        &output.files.md,
        &output.files.json,
        &output.files.json_raw,
        &output.files.srt,
    ] {
        println!("  {}", path.display());
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.0} MB", bytes as f64 / 1_000_000.0)
    } else {
        format!("{:.0} KB", bytes as f64 / 1_000.0)
    }
}
