//! Cli things
//!

use std::path::PathBuf;

use clap::Parser;

pub fn db_path_default() -> String {
    shellexpand::tilde("~/.cache/reel.sqlite3").to_string()
}

#[derive(Parser, Debug, Clone)]
pub struct CliOpts {
    #[clap(long, help = "Path to the database file", env = "REEL_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[clap(
        long,
        help = "Directory uploaded media is written to and served from",
        env = "REEL_UPLOADS_DIR",
        default_value = "./uploads"
    )]
    pub uploads_dir: PathBuf,

    #[clap(
        long,
        help = "Externally reachable origin prepended to media paths in responses",
        env = "MAIN_URL"
    )]
    pub main_url: Option<String>,

    #[clap(
        long,
        help = "Base URL of the recommendation service",
        env = "RECOMMENDATION_API_URL",
        default_value = "http://localhost:5000"
    )]
    pub recommendation_api_url: String,

    #[clap(long, help = "Secret used to sign access tokens", env = "ACCESSTOKENSECRET")]
    pub access_token_secret: String,

    #[clap(long, help = "Secret used to sign refresh tokens", env = "REFRESHTOKENSECRET")]
    pub refresh_token_secret: String,

    #[clap(
        long,
        help = "ffmpeg binary used to transcode videos",
        env = "REEL_FFMPEG_PATH",
        default_value = "ffmpeg"
    )]
    pub ffmpeg_path: String,

    #[clap(
        long,
        help = "Maximum number of concurrent video transcodes",
        env = "REEL_MAX_TRANSCODES",
        default_value_t = 2
    )]
    pub max_transcodes: usize,

    #[clap(long, help = "Enable debug logging")]
    pub debug: bool,
}

impl CliOpts {
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| db_path_default().into())
    }
}
