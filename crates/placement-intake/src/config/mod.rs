use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use tracing::info;

use crate::workflows::intake::{
    CatalogError, CsvSubmissionStore, DriveSpreadsheetMirror, FieldId, IntakeWizard,
    MirroredSubmissionStore, Questionnaire, Requirement, ServiceAccountDrive, SiteCatalog,
    SubmissionStore, WizardSetupError,
};

const DEFAULT_CSV_PATH: &str = "placement_submissions.csv";
const DEFAULT_SPREADSHEET_TITLE: &str = "Placement Intake Submissions";
const DEFAULT_RANK_COUNT: usize = 3;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub intake: IntakeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            intake: IntakeConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Questionnaire, catalog and storage settings.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub csv_path: PathBuf,
    pub backup_dir: Option<PathBuf>,
    pub catalog: SiteCatalog,
    pub rank_count: usize,
    pub extra_languages_required: bool,
    pub drive: Option<DriveMirrorConfig>,
}

/// Present only when both a folder and a service-account key are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveMirrorConfig {
    pub folder_id: String,
    pub service_account_key: PathBuf,
    pub spreadsheet_title: String,
}

impl IntakeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let csv_path = non_empty_var("INTAKE_CSV_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH));
        let backup_dir = non_empty_var("INTAKE_BACKUP_DIR").map(PathBuf::from);

        let catalog = match non_empty_var("INTAKE_SITES") {
            Some(raw) => SiteCatalog::new(raw.split(';')).map_err(ConfigError::Catalog)?,
            None => SiteCatalog::standard(),
        };

        let rank_count = match non_empty_var("INTAKE_RANK_COUNT") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidRankCount { value: raw.clone() })?,
            None => DEFAULT_RANK_COUNT,
        };
        if rank_count == 0 || rank_count > catalog.len() {
            return Err(ConfigError::InvalidRankCount {
                value: rank_count.to_string(),
            });
        }

        let extra_languages_required = match non_empty_var("INTAKE_EXTRA_LANGUAGES_REQUIRED") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                name: "INTAKE_EXTRA_LANGUAGES_REQUIRED",
                value: raw,
            })?,
            None => false,
        };

        let drive = match (
            non_empty_var("INTAKE_DRIVE_FOLDER_ID"),
            non_empty_var("INTAKE_DRIVE_SERVICE_ACCOUNT_KEY"),
        ) {
            (Some(folder_id), Some(key)) => Some(DriveMirrorConfig {
                folder_id,
                service_account_key: PathBuf::from(key),
                spreadsheet_title: non_empty_var("INTAKE_SPREADSHEET_TITLE")
                    .unwrap_or_else(|| DEFAULT_SPREADSHEET_TITLE.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            csv_path,
            backup_dir,
            catalog,
            rank_count,
            extra_languages_required,
            drive,
        })
    }

    pub fn questionnaire(&self) -> Questionnaire {
        let requirement = if self.extra_languages_required {
            Requirement::Required
        } else {
            Requirement::Optional
        };
        Questionnaire::standard(self.rank_count).with_requirement(FieldId::ExtraLanguages, requirement)
    }

    pub fn wizard(&self) -> Result<IntakeWizard, ConfigError> {
        IntakeWizard::new(self.questionnaire(), self.catalog.clone()).map_err(ConfigError::Wizard)
    }

    /// Local CSV store, mirrored to Drive when a mirror is configured.
    pub fn store(&self) -> Box<dyn SubmissionStore> {
        let mut csv = CsvSubmissionStore::new(&self.csv_path);
        if let Some(dir) = &self.backup_dir {
            csv = csv.with_backup_dir(dir);
        }

        match &self.drive {
            Some(drive) => {
                info!(folder = %drive.folder_id, title = %drive.spreadsheet_title, "drive mirror enabled");
                let mirror = DriveSpreadsheetMirror::new(
                    ServiceAccountDrive::new(&drive.service_account_key),
                    drive.folder_id.clone(),
                    drive.spreadsheet_title.clone(),
                );
                Box::new(MirroredSubmissionStore::new(csv, mirror))
            }
            None => Box::new(csv),
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            backup_dir: None,
            catalog: SiteCatalog::standard(),
            rank_count: DEFAULT_RANK_COUNT,
            extra_languages_required: false,
            drive: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRankCount { value: String },
    InvalidFlag { name: &'static str, value: String },
    Catalog(CatalogError),
    Wizard(WizardSetupError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRankCount { value } => write!(
                f,
                "INTAKE_RANK_COUNT must be between 1 and the number of sites (got '{value}')"
            ),
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be true or false (got '{value}')")
            }
            ConfigError::Catalog(err) => write!(f, "INTAKE_SITES is invalid: {err}"),
            ConfigError::Wizard(err) => write!(f, "questionnaire setup failed: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Catalog(err) => Some(err),
            ConfigError::Wizard(err) => Some(err),
            ConfigError::InvalidPort
            | ConfigError::InvalidRankCount { .. }
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
