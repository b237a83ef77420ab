use gallery_store::{
    AppPaths, AssetAdapter, Error, FolderAssetSource, FolderPermissions, Gallery, KeyValueStore,
    PermissionGate, PersistenceMirror, Result, Settings, SqliteKeyValueStore,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Lists the photos of a folder through the gallery store.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder served as the media library
    folder: PathBuf,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: usize,

    /// Discard the persisted store before loading
    #[arg(long)]
    refresh: bool,
}

async fn run(args: Args) -> Result<()> {
    let paths = AppPaths::discover()?;
    let settings = Settings::load(&paths.settings_path)?;

    let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::open(&paths.db_path)?);
    let gate = Arc::new(PermissionGate::new(
        Arc::new(FolderPermissions::new(args.folder.clone())),
        kv.clone(),
        settings.storage_keys.permission.clone(),
        settings.grant_settle_delay(),
    ));
    let adapter = AssetAdapter::new(Arc::new(FolderAssetSource::new(args.folder.clone())), gate);
    let mirror = PersistenceMirror::spawn(kv, settings.storage_keys.clone());
    let gallery = Gallery::new(adapter, mirror, settings.page_size);

    gallery.restore().await;
    if args.refresh {
        gallery.reset();
    }

    for _ in 0..args.pages {
        if !gallery.has_next_page() {
            break;
        }
        match gallery.load_next_page().await {
            Ok(_) => {}
            Err(Error::PermissionDenied) => {
                log::error!(
                    "Cannot read {}; grant access to the folder and retry",
                    args.folder.display()
                );
                return Err(Error::PermissionDenied);
            }
            Err(err) => return Err(err),
        }
    }

    let photos = gallery.photos();
    log::info!(
        "{} photos loaded, more pages: {}",
        photos.len(),
        gallery.has_next_page()
    );
    for photo in &photos {
        let dims = photo
            .metadata
            .as_ref()
            .map(|m| format!("{}x{}", m.width, m.height))
            .unwrap_or_else(|| "?".into());
        println!("{}\t{}\t{}", photo.id, dims, photo.uri);
    }

    gallery.flush().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        log::error!("{err}");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_folder_and_flags() {
        let args = Args::try_parse_from(["gallery", "/photos", "--pages", "3", "--refresh"]).unwrap();
        assert_eq!(args.folder, PathBuf::from("/photos"));
        assert_eq!(args.pages, 3);
        assert!(args.refresh);
    }

    #[test]
    fn loads_one_page_by_default() {
        let args = Args::try_parse_from(["gallery", "/photos"]).unwrap();
        assert_eq!(args.pages, 1);
        assert!(!args.refresh);
    }

    #[test]
    fn folder_is_required() {
        assert!(Args::try_parse_from(["gallery"]).is_err());
        assert!(Args::try_parse_from(["gallery", "/photos", "--pages", "many"]).is_err());
    }
}
