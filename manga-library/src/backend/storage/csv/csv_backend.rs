use async_trait::async_trait;
use log::{info, warn};
use shared::{CollectionKind, LibraryItem, WishlistItem};
use std::io::ErrorKind;
use std::path::Path;

use super::codec::CsvRecord;
use super::connection::CsvConnection;
use super::repository::CsvRepository;
use crate::backend::config::BackendKind;
use crate::backend::storage::error::{StorageError, StorageResult};
use crate::backend::storage::traits::{check_bulk, RecordStorage, StorageBackend};

/// Text backend: one CSV file per collection
pub struct CsvBackend {
    connection: CsvConnection,
    library: CsvRepository<LibraryItem>,
    wishlist: CsvRepository<WishlistItem>,
}

impl CsvBackend {
    pub fn new(connection: CsvConnection) -> Self {
        let library = CsvRepository::new(&connection);
        let wishlist = CsvRepository::new(&connection);
        Self {
            connection,
            library,
            wishlist,
        }
    }

    pub fn connection(&self) -> &CsvConnection {
        &self.connection
    }
}

/// Current bytes of a file, `None` if it does not exist yet
fn snapshot_file(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn restore_file(path: &Path, previous: Option<Vec<u8>>) -> std::io::Result<()> {
    match previous {
        Some(bytes) => {
            let temp_path = path.with_extension("csv.restore");
            std::fs::write(&temp_path, bytes)?;
            std::fs::rename(&temp_path, path)
        }
        None => std::fs::remove_file(path),
    }
}

#[async_trait]
impl StorageBackend for CsvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Text
    }

    fn library(&self) -> &dyn RecordStorage<LibraryItem> {
        &self.library
    }

    fn wishlist(&self) -> &dyn RecordStorage<WishlistItem> {
        &self.wishlist
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        self.connection.ensure_files(&[
            (CollectionKind::Library, &LibraryItem::COLUMNS[..]),
            (CollectionKind::Wishlist, &WishlistItem::COLUMNS[..]),
        ])
    }

    /// Both batches are validated and checked against the stored ids before
    /// either file is written. If the wishlist write fails after the library
    /// was written, the previous library file is put back.
    async fn import(&self, library: &[LibraryItem], wishlist: &[WishlistItem]) -> StorageResult<()> {
        check_bulk(library)?;
        check_bulk(wishlist)?;
        let library_table = self.library.appended(library)?;
        let wishlist_table = self.wishlist.appended(wishlist)?;

        let library_path = self.library.file_path();
        let previous_library = snapshot_file(library_path)?;

        self.library.write_table(&library_table)?;
        if let Err(e) = self.wishlist.write_table(&wishlist_table) {
            if let Err(restore) = restore_file(library_path, previous_library) {
                warn!(
                    "Could not restore {} after a failed import: {}",
                    library_path.display(),
                    restore
                );
            }
            return Err(e);
        }

        info!(
            "Imported {} library and {} wishlist records into {}",
            library.len(),
            wishlist.len(),
            self.connection.base_directory().display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_schema_creates_header_only_files() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let data_dir = temp_dir.path().join("nested").join("data");
        let backend = CsvBackend::new(CsvConnection::new(&data_dir));

        backend.ensure_schema().await?;

        let library = std::fs::read_to_string(data_dir.join("library.csv"))?;
        assert_eq!(
            library,
            "id,title,author,genre,volume,status,notes,cover_image_ref,year,created_at\n"
        );
        assert!(backend.library().load().await?.is_empty());
        assert!(backend.wishlist().load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_schema_never_overwrites() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let backend = CsvBackend::new(CsvConnection::new(temp_dir.path()));
        backend.ensure_schema().await?;
        backend.library().store(&LibraryItem::new("Akira")).await?;
        let before = std::fs::read(temp_dir.path().join("library.csv"))?;

        backend.ensure_schema().await?;

        assert_eq!(std::fs::read(temp_dir.path().join("library.csv"))?, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_restores_library_when_wishlist_write_fails() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let backend = CsvBackend::new(CsvConnection::new(temp_dir.path()));
        backend.ensure_schema().await?;
        backend.library().store(&LibraryItem::new("Akira")).await?;
        let before = std::fs::read(temp_dir.path().join("library.csv"))?;

        std::fs::create_dir(temp_dir.path().join("wishlist.csv.tmp"))?;
        let result = backend
            .import(&[LibraryItem::new("Beck")], &[WishlistItem::new("Monster")])
            .await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(temp_dir.path().join("library.csv"))?, before);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_keeps_existing_records() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let backend = CsvBackend::new(CsvConnection::new(temp_dir.path()));
        backend.ensure_schema().await?;
        let kept = LibraryItem::new("Akira");
        backend.library().store(&kept).await?;

        let incoming = LibraryItem::new("Beck");
        backend
            .import(&[incoming.clone()], &[WishlistItem::new("Monster")])
            .await?;

        assert_eq!(backend.library().load().await?, vec![kept, incoming]);
        assert_eq!(backend.wishlist().load().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_import_with_colliding_id_writes_nothing() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let backend = CsvBackend::new(CsvConnection::new(temp_dir.path()));
        backend.ensure_schema().await?;
        let wish = WishlistItem::new("Monster");
        backend.wishlist().store(&wish).await?;
        let library_before = std::fs::read(temp_dir.path().join("library.csv"))?;

        let result = backend
            .import(&[LibraryItem::new("Beck")], &[wish.clone()])
            .await;

        assert!(matches!(result, Err(StorageError::Duplicate { .. })));
        assert_eq!(std::fs::read(temp_dir.path().join("library.csv"))?, library_before);
        assert_eq!(backend.wishlist().load().await?, vec![wish]);
        Ok(())
    }
}
