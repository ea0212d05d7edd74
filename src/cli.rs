//! Command-line interface definition.

use crate::profile::RecencyWindow;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(color = clap::ColorChoice::Auto)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a recommended playlist from your listening history.
    Recommend {
        #[command(flatten)]
        opts: RecommendOpts,

        /// Name for the generated playlist.
        #[arg(short, long, default_value = "Mixtape Recommendations")]
        name: String,

        /// Description for the generated playlist.
        #[arg(short, long, default_value = "generated by mixtape")]
        description: String,

        /// Publish the playlist to the catalog instead of printing it.
        #[arg(long)]
        publish: bool,

        /// Maximum number of tracks in the playlist.
        #[arg(short, long, default_value_t = 30)]
        tracks: usize,
    },

    /// Show the candidate playlists closest to your taste.
    Playlists {
        #[command(flatten)]
        opts: RecommendOpts,
    },

    /// Show the ranked tracks without assembling a playlist.
    Tracks {
        #[command(flatten)]
        opts: RecommendOpts,

        /// Maximum number of tracks to show.
        #[arg(short, long, default_value_t = 30)]
        tracks: usize,
    },
}

/// Options shared by every recommendation subcommand.
#[derive(clap::Args, Debug)]
pub struct RecommendOpts {
    /// Seed from a playlist id instead of your saved tracks.
    #[arg(short, long)]
    pub playlist: Option<String>,

    /// How far back the listening history should reach.
    #[arg(short, long, value_enum, default_value_t = Window::AllTime)]
    pub window: Window,

    /// Distance metric for playlist retrieval.
    #[arg(short, long, default_value = "cityblock")]
    pub metric: String,

    /// Number of candidate playlists to retrieve.
    #[arg(long, default_value_t = 10)]
    pub playlists: usize,

    /// Retrieve the farthest playlists instead of the closest.
    #[arg(long)]
    pub farthest: bool,

    /// Data directory holding the library database and model artifacts.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Catalog API client id.
    #[arg(long, env = "MIXTAPE_CLIENT_ID")]
    pub client_id: String,

    /// Catalog API client secret.
    #[arg(long, env = "MIXTAPE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    AllTime,
    LastMonth,
    LastSixMonths,
}

impl From<Window> for RecencyWindow {
    fn from(window: Window) -> Self {
        match window {
            Window::AllTime => RecencyWindow::AllTime,
            Window::LastMonth => RecencyWindow::LastMonth,
            Window::LastSixMonths => RecencyWindow::LastSixMonths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn recommend_defaults() {
        let args = Args::parse_from([
            "mixtape",
            "recommend",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
        ]);
        let Command::Recommend {
            opts,
            name,
            publish,
            tracks,
            ..
        } = args.command
        else {
            panic!("expected the recommend subcommand");
        };

        assert_eq!(name, "Mixtape Recommendations");
        assert!(!publish);
        assert_eq!(tracks, 30);
        assert_eq!(opts.metric, "cityblock");
        assert_eq!(opts.playlists, 10);
        assert_eq!(opts.window, Window::AllTime);
        assert!(opts.playlist.is_none());
        assert!(!opts.farthest);
    }

    #[test]
    fn window_values_parse() {
        let args = Args::parse_from([
            "mixtape",
            "playlists",
            "--window",
            "last-six-months",
            "--farthest",
            "--client-id",
            "id",
            "--client-secret",
            "secret",
        ]);
        let Command::Playlists { opts } = args.command else {
            panic!("expected the playlists subcommand");
        };

        assert_eq!(opts.window, Window::LastSixMonths);
        assert!(opts.farthest);
        assert_eq!(RecencyWindow::from(opts.window), RecencyWindow::LastSixMonths);
    }
}
