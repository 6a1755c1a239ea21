use std::fmt::Debug;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use google_drive3::hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use google_drive3::hyper_util::client::legacy::connect::HttpConnector;
use google_drive3::hyper_util::client::legacy::Client;
use google_drive3::hyper_util::rt::TokioExecutor;
use google_drive3::yup_oauth2;
use google_drive3::{api::File, api::Scope, DriveHub};
use tokio::runtime::Runtime;
use tracing::info;

use super::repository::{MirrorError, SpreadsheetMirror};

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Debug, thiserror::Error)]
pub enum DriveOperationError {
    #[error("drive operation failed: {0}")]
    Backend(String),
    #[error("drive runtime unavailable: {0}")]
    Runtime(String),
    #[error("drive authentication failed: {0}")]
    Auth(String),
}

pub trait DriveGateway: Debug + Send + Sync {
    /// Create or replace the spreadsheet `title` in `parent_folder_id` from CSV bytes, returning
    /// the Drive file id.
    fn upsert_spreadsheet(
        &self,
        title: &str,
        csv_body: Vec<u8>,
        parent_folder_id: &str,
    ) -> Result<String, DriveOperationError>;
}

/// Thin wrapper around the generated google-drive3 client allowing synchronous
/// workflows to interact with Drive without exposing async details.
pub struct GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
    runtime: Runtime,
}

impl<C> GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>, runtime: Runtime) -> Self {
        Self { hub, runtime }
    }

    fn map_error<E: std::fmt::Display>(err: E) -> DriveOperationError {
        DriveOperationError::Backend(err.to_string())
    }

    fn find_spreadsheet(&self, title: &str, folder_id: &str) -> Result<Option<String>, DriveOperationError> {
        let query = format!(
            "name = '{}' and '{}' in parents and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
            escape_query(title),
            escape_query(folder_id),
        );

        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .list()
                .q(&query)
                .param("fields", "files(id,name)")
                .page_size(1)
                .include_items_from_all_drives(true)
                .supports_all_drives(true)
                .add_scope(Scope::File)
                .doit()
                .await
        });

        let (_, file_list) = result.map_err(Self::map_error)?;
        Ok(file_list
            .files
            .unwrap_or_default()
            .into_iter()
            .find_map(|file| file.id))
    }
}

pub type HttpsDriveClient = GoogleDriveClient<HttpsConnector<HttpConnector>>;

impl HttpsDriveClient {
    /// Authenticate with a service-account key file and build a client on its own runtime.
    pub fn from_service_account_key(key_path: &Path) -> Result<Self, DriveOperationError> {
        let runtime =
            Runtime::new().map_err(|err| DriveOperationError::Runtime(err.to_string()))?;

        let auth = runtime
            .block_on(async {
                let key = yup_oauth2::read_service_account_key(key_path).await?;
                yup_oauth2::ServiceAccountAuthenticator::builder(key)
                    .build()
                    .await
            })
            .map_err(|err| DriveOperationError::Auth(err.to_string()))?;

        let connector = HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(Self::map_error)?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self::new(DriveHub::new(client, auth), runtime))
    }
}

impl<C> std::fmt::Debug for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveClient").finish_non_exhaustive()
    }
}

impl<C> DriveGateway for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn upsert_spreadsheet(
        &self,
        title: &str,
        csv_body: Vec<u8>,
        parent_folder_id: &str,
    ) -> Result<String, DriveOperationError> {
        let existing = self.find_spreadsheet(title, parent_folder_id)?;
        let cursor = Cursor::new(csv_body);

        let result = match existing {
            Some(file_id) => self.runtime.block_on(async {
                self.hub
                    .files()
                    .update(File::default(), &file_id)
                    .param("fields", "id")
                    .supports_all_drives(true)
                    .add_scope(Scope::File)
                    .upload(cursor, mime::TEXT_CSV)
                    .await
            }),
            None => {
                let metadata = File {
                    name: Some(title.to_string()),
                    mime_type: Some(SPREADSHEET_MIME.to_string()),
                    parents: Some(vec![parent_folder_id.to_string()]),
                    ..File::default()
                };
                self.runtime.block_on(async {
                    self.hub
                        .files()
                        .create(metadata)
                        .param("fields", "id")
                        .supports_all_drives(true)
                        .add_scope(Scope::File)
                        .upload(cursor, mime::TEXT_CSV)
                        .await
                })
            }
        };

        let (_, file) = result.map_err(Self::map_error)?;
        Ok(file.id.unwrap_or_default())
    }
}

/// Gateway that authenticates with a service-account key on every call. Each call owns its
/// runtime, so it can run on any blocking thread.
#[derive(Debug, Clone)]
pub struct ServiceAccountDrive {
    key_path: PathBuf,
}

impl ServiceAccountDrive {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }
}

impl DriveGateway for ServiceAccountDrive {
    fn upsert_spreadsheet(
        &self,
        title: &str,
        csv_body: Vec<u8>,
        parent_folder_id: &str,
    ) -> Result<String, DriveOperationError> {
        HttpsDriveClient::from_service_account_key(&self.key_path)?.upsert_spreadsheet(
            title,
            csv_body,
            parent_folder_id,
        )
    }
}

/// Uploads the whole local store as a native Google spreadsheet.
#[derive(Debug)]
pub struct DriveSpreadsheetMirror<G> {
    drive: G,
    folder_id: String,
    title: String,
}

impl<G: DriveGateway> DriveSpreadsheetMirror<G> {
    pub fn new(drive: G, folder_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            drive,
            folder_id: folder_id.into(),
            title: title.into(),
        }
    }
}

impl<G: DriveGateway> SpreadsheetMirror for DriveSpreadsheetMirror<G> {
    fn sync(&self, csv_path: &Path) -> Result<(), MirrorError> {
        let body = fs::read(csv_path)?;
        let file_id = self
            .drive
            .upsert_spreadsheet(&self.title, body, &self.folder_id)?;
        info!(%file_id, title = %self.title, "spreadsheet mirror updated");
        Ok(())
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingDrive {
        uploads: Mutex<Vec<(String, String, String)>>,
    }

    impl DriveGateway for RecordingDrive {
        fn upsert_spreadsheet(
            &self,
            title: &str,
            csv_body: Vec<u8>,
            parent_folder_id: &str,
        ) -> Result<String, DriveOperationError> {
            let body = String::from_utf8(csv_body).expect("utf-8 body");
            self.uploads.lock().expect("uploads mutex poisoned").push((
                title.to_string(),
                body,
                parent_folder_id.to_string(),
            ));
            Ok("sheet-1".to_string())
        }
    }

    #[test]
    fn mirror_uploads_current_file_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("submissions.csv");
        fs::write(&path, "a,b\n1,2\n").expect("write csv");

        let mirror = DriveSpreadsheetMirror::new(RecordingDrive::default(), "folder-9", "Intake");
        mirror.sync(&path).expect("sync succeeds");

        let uploads = mirror.drive.uploads.lock().expect("uploads mutex poisoned");
        assert_eq!(
            uploads.as_slice(),
            [(
                "Intake".to_string(),
                "a,b\n1,2\n".to_string(),
                "folder-9".to_string()
            )]
        );
    }

    #[test]
    fn mirror_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mirror = DriveSpreadsheetMirror::new(RecordingDrive::default(), "folder", "Intake");
        let err = mirror
            .sync(&dir.path().join("absent.csv"))
            .expect_err("missing file fails");
        assert!(matches!(err, MirrorError::Io(_)));
    }

    #[test]
    fn query_values_are_escaped() {
        assert_eq!(escape_query("Student's sheet"), "Student\\'s sheet");
    }
}
