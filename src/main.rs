use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use mixtape::catalog::HttpCatalog;
use mixtape::cli::{Args, Command, RecommendOpts};
use mixtape::cluster::Metric;
use mixtape::config::Paths;
use mixtape::db::Library;
use mixtape::features::FeatureStore;
use mixtape::model::ModelBundle;
use mixtape::profile::Source;
use mixtape::session::RecommendationSession;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match args.command {
        Command::Recommend {
            opts,
            name,
            description,
            publish,
            tracks,
        } => recommend(&opts, &name, &description, publish, tracks),
        Command::Playlists { opts } => show_playlists(&opts),
        Command::Tracks { opts, tracks } => show_tracks(&opts, tracks),
    }
}

/// Everything a session needs that outlives it.
fn open_runtime(opts: &RecommendOpts) -> Result<(Library, ModelBundle, HttpCatalog)> {
    let paths = match &opts.data_dir {
        Some(dir) => Paths::in_dir(dir),
        None => Paths::new()?,
    };
    let library = Library::open(&paths.library_db)
        .with_context(|| format!("opening library at {}", paths.library_db.display()))?;
    let bundle = ModelBundle::load(&paths.model, &paths.scaler, &paths.corpus)?;
    let catalog = HttpCatalog::new(opts.client_id.clone(), opts.client_secret.clone())?;
    Ok((library, bundle, catalog))
}

fn source_of(opts: &RecommendOpts) -> Source {
    opts.playlist
        .clone()
        .map_or(Source::UserFavorites, Source::Playlist)
}

fn recommend(
    opts: &RecommendOpts,
    name: &str,
    description: &str,
    publish: bool,
    tracks: usize,
) -> Result<()> {
    let (library, bundle, catalog) = open_runtime(opts)?;
    let store = FeatureStore::new(library.feature_cache()?, &catalog);
    let metric = opts.metric.parse::<Metric>()?;

    let mut session = RecommendationSession::new(
        &catalog,
        &store,
        &bundle,
        &library,
        source_of(opts),
        opts.window.into(),
    );
    session.build_user_vector()?;
    session.retrieve_playlists(opts.playlists, metric, !opts.farthest)?;
    session.rank_songs(tracks)?;
    let draft = session.assemble(name, description)?;

    if publish {
        let playlist_id = draft.publish(&catalog)?;
        println!("published `{}` as {playlist_id}", draft.name);
    } else {
        println!("{} ({} tracks)", draft.name, draft.track_ids.len());
        for (rank, track_id) in draft.track_ids.iter().enumerate() {
            println!("{:>3}. {track_id}", rank + 1);
        }
    }
    info!("external feature fetches this run: {}", store.fetch_calls());
    Ok(())
}

fn show_playlists(opts: &RecommendOpts) -> Result<()> {
    let (library, bundle, catalog) = open_runtime(opts)?;
    let store = FeatureStore::new(library.feature_cache()?, &catalog);
    let metric = opts.metric.parse::<Metric>()?;

    let mut session = RecommendationSession::new(
        &catalog,
        &store,
        &bundle,
        &library,
        source_of(opts),
        opts.window.into(),
    );
    session.build_user_vector()?;
    let pids = session
        .retrieve_playlists(opts.playlists, metric, !opts.farthest)?
        .to_vec();

    for pid in pids {
        match library.playlist_name(pid)? {
            Some(name) => println!("{pid:>6}  {name}"),
            None => println!("{pid:>6}  (unnamed)"),
        }
    }
    Ok(())
}

fn show_tracks(opts: &RecommendOpts, tracks: usize) -> Result<()> {
    let (library, bundle, catalog) = open_runtime(opts)?;
    let store = FeatureStore::new(library.feature_cache()?, &catalog);
    let metric = opts.metric.parse::<Metric>()?;

    let mut session = RecommendationSession::new(
        &catalog,
        &store,
        &bundle,
        &library,
        source_of(opts),
        opts.window.into(),
    );
    session.build_user_vector()?;
    session.retrieve_playlists(opts.playlists, metric, !opts.farthest)?;
    let ranked = session.rank_songs(tracks)?;

    for (rank, track_id) in ranked.iter().enumerate() {
        println!("{:>3}. {track_id}", rank + 1);
    }
    Ok(())
}
