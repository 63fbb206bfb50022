use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use niawase_core::diagnosis::DiagnosisResult;
use niawase_core::types::{Gender, MediaFile, Profile, SlotId, StyleKey};
use niawase_engine::controller::WorkflowController;
use niawase_engine::session::Session;
use niawase_engine::uploads::UploadStatus;
use niawase_runtime::config_store::ConfigStore;
use niawase_runtime::defaults::{CONFIG_FILE_NAME, default_app_config};
use niawase_runtime::runtime_engine::build_controller_from_config;
use niawase_runtime::secrets::{SecretKey, set_secret};
use niawase_runtime::session_cache::{KeyringSessionCache, SessionCache};
use std::io::BufRead;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "niawase",
    version,
    about = "Personal styling session: upload photos and videos, get a diagnosis, preview styles"
)]
struct Cli {
    /// Config file (created by `init-config`)
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a whole session from files on disk
    Run(RunArgs),
    /// Write a config file with default endpoints
    #[command(name = "init-config")]
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Store the web API key in the OS keyring (read from stdin when omitted)
    #[command(name = "set-api-key")]
    SetApiKey { key: Option<String> },
    /// Forget the stored account; the next run signs up as a new user
    #[command(name = "sign-out")]
    SignOut,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Display name; defaults to the name on the signed-in account
    #[arg(long)]
    name: Option<String>,
    /// female, male or other
    #[arg(long, default_value = "female", value_parser = parse_gender)]
    gender: Gender,

    #[arg(long)]
    front_image: PathBuf,
    #[arg(long)]
    side_image: PathBuf,
    #[arg(long)]
    back_image: PathBuf,
    #[arg(long)]
    front_video: PathBuf,
    #[arg(long)]
    back_video: PathBuf,

    /// Extra styles to generate after the default one (e.g. style_2)
    #[arg(long = "style")]
    styles: Vec<String>,
    /// Adjustment applied to the selected style; repeat to regenerate again
    #[arg(long = "adjust")]
    adjustments: Vec<String>,
    /// Directory for the generated `style-<key>.png` files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Reuse uploads persisted by an earlier run of the same account
    #[arg(long)]
    resume: bool,
}

impl RunArgs {
    fn media_paths(&self) -> [(SlotId, &Path); 5] {
        [
            (SlotId::FrontImage, self.front_image.as_path()),
            (SlotId::SideImage, self.side_image.as_path()),
            (SlotId::BackImage, self.back_image.as_path()),
            (SlotId::FrontVideo, self.front_video.as_path()),
            (SlotId::BackVideo, self.back_video.as_path()),
        ]
    }
}

fn parse_gender(s: &str) -> Result<Gender, String> {
    Gender::parse(s).ok_or_else(|| format!("unknown gender `{s}` (female, male, other)"))
}

fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

fn read_media(path: &Path) -> anyhow::Result<MediaFile> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))?
        .to_string();
    Ok(MediaFile {
        file_name,
        mime_type: guess_mime_type(path).to_string(),
        bytes,
    })
}

fn image_file_name(key: &StyleKey) -> String {
    format!("style-{key}.png")
}

fn print_diagnosis(d: &DiagnosisResult) {
    println!("== Diagnosis ==");
    for (category, attrs) in &d.analysis {
        println!("[{category}]");
        for (k, v) in attrs {
            println!("  {k}: {v}");
        }
    }

    println!("\n== Proposals ==");
    for s in &d.proposals.hairstyles {
        println!("hairstyle: {} - {}", s.name, s.description);
    }
    for s in &d.proposals.hair_colors {
        println!("hair color: {} - {}", s.name, s.description);
    }
    for (k, v) in &d.proposals.makeup {
        println!("makeup {k}: {v}");
    }
    for (k, v) in &d.proposals.fashion {
        println!("fashion {k}: {v}");
    }
    if !d.proposals.overall_comment.is_empty() {
        println!("\n{}", d.proposals.overall_comment);
    }
}

fn report(session: &Session) {
    if let Some(err) = session.last_error() {
        eprintln!("{}", err.message);
    }
}

async fn upload_media(
    controller: &WorkflowController,
    session: &mut Session,
    args: &RunArgs,
) -> anyhow::Result<()> {
    let mut files = Vec::new();
    for (slot, path) in args.media_paths() {
        if session.uploads().status(slot) == UploadStatus::Completed {
            log::info!("{slot}: already uploaded");
            continue;
        }
        files.push((slot, read_media(path)?));
    }

    let mut failed = Vec::new();
    for (slot, res) in controller.upload_all(session, files).await {
        if let Err(e) = res {
            eprintln!("{e}");
            failed.push(slot.as_str());
        }
    }
    if !failed.is_empty() {
        bail!("uploads failed: {}; run again to retry", failed.join(", "));
    }
    Ok(())
}

async fn run_session(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let store = ConfigStore::at_path(&cli.config);
    let cfg = store.load_or_default()?;
    let base_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let controller = build_controller_from_config(&cfg, base_dir)?;

    let mut session = controller.bootstrap().await?;
    if args.resume && controller.resume(&mut session).await? {
        log::info!("resumed earlier uploads");
    }

    controller.start(&mut session)?;
    let profile = Profile {
        name: args
            .name
            .clone()
            .unwrap_or_else(|| session.profile().name.clone()),
        gender: args.gender,
    };
    if !profile.is_complete() {
        bail!("a name is required (--name)");
    }
    controller.save_profile(&mut session, profile).await?;

    upload_media(&controller, &mut session, args).await?;

    if let Err(e) = controller.request_diagnosis(&mut session).await {
        report(&session);
        return Err(e.into());
    }
    let Some(diagnosis) = session.diagnosis() else {
        bail!("diagnosis finished without a result");
    };
    print_diagnosis(diagnosis);

    controller.view_proposals(&mut session)?;
    if controller.enter_simulation(&mut session).await.is_err() {
        report(&session);
    }

    for style in &args.styles {
        if controller
            .generate_image(&mut session, StyleKey::new(style.as_str()), None)
            .await
            .is_err()
        {
            report(&session);
        }
    }

    for adjustment in &args.adjustments {
        let key = session.selected_style().clone();
        if controller
            .generate_image(&mut session, key, Some(adjustment.as_str()))
            .await
            .is_err()
        {
            report(&session);
        }
    }

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create {}", args.out_dir.display()))?;
    for (key, image) in session.generated_images() {
        let path = args.out_dir.join(image_file_name(key));
        std::fs::write(&path, &image.image_data)
            .with_context(|| format!("write {}", path.display()))?;
        println!("{key}: {} ({})", path.display(), image.prompt);
    }
    Ok(())
}

fn init_config(cli: &Cli, force: bool) -> anyhow::Result<()> {
    let store = ConfigStore::at_path(&cli.config);
    if store.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            store.path().display()
        );
    }
    store.save(&default_app_config())?;
    println!("wrote {}", store.path().display());
    Ok(())
}

fn set_api_key(key: Option<String>) -> anyhow::Result<()> {
    let key = match key {
        Some(k) => k,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("read API key from stdin")?;
            line
        }
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("API key is empty");
    }
    set_secret(SecretKey::ApiKey, key)?;
    println!("API key stored");
    Ok(())
}

fn sign_out() -> anyhow::Result<()> {
    KeyringSessionCache.clear()?;
    println!("signed out");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Run(args) => run_session(&cli, args).await,
        Commands::InitConfig { force } => init_config(&cli, *force),
        Commands::SetApiKey { key } => set_api_key(key.clone()),
        Commands::SignOut => sign_out(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_collects_repeated_adjustments() {
        let cli = Cli::try_parse_from([
            "niawase",
            "run",
            "--name",
            "Aiko",
            "--gender",
            "その他",
            "--front-image",
            "f.jpg",
            "--side-image",
            "s.jpg",
            "--back-image",
            "b.jpg",
            "--front-video",
            "f.mp4",
            "--back-video",
            "b.mp4",
            "--adjust",
            "shorter",
            "--adjust",
            "shorter",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.gender, Gender::Other);
        assert_eq!(args.adjustments, vec!["shorter", "shorter"]);
        assert_eq!(args.media_paths()[3].0, SlotId::FrontVideo);
    }

    #[test]
    fn rejects_unknown_gender() {
        assert!(parse_gender("x").is_err());
        assert_eq!(parse_gender("male"), Ok(Gender::Male));
    }

    #[test]
    fn sign_out_takes_no_arguments() {
        let cli = Cli::try_parse_from(["niawase", "sign-out"]).unwrap();
        assert!(matches!(cli.command, Commands::SignOut));
        assert!(Cli::try_parse_from(["niawase", "sign-out", "extra"]).is_err());
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(guess_mime_type(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(guess_mime_type(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(guess_mime_type(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn images_are_named_by_style() {
        assert_eq!(image_file_name(&StyleKey::new("style_2")), "style-style_2.png");
    }
}
