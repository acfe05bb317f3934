//! # Web access
//!
//! [`ExarataHttp`] is the shared HTTP state handed to every engine which talks
//! to a web service (astrometry.net, PanSTARRS MAST, JPL Horizons).
//!
//! ```text
//! ExarataHttp
//! ├── agent        (ureq::Agent, global timeout, optional SSL checks)
//! ├── ssl_checks   (also applied to the reqwest client of file uploads)
//! └── cancellation (CancellationFlag, shared with the task runner)
//! ```
//!
//! File uploads are `multipart/form-data` forms built with
//! [`reqwest::blocking::multipart`].
//!
//! Every request first looks at the cancellation flag: once it is raised the
//! next request returns [`ExarataError::Cancelled`] instead of going out.
//! A request already in flight runs to completion.
use std::{
    fs::File,
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use camino::Utf8Path;
use reqwest::blocking::{
    multipart::{Form, Part},
    Client,
};
use tracing::debug;
use ureq::{tls::TlsConfig, Agent};

use crate::{config::ExarataConfig, exarata_errors::ExarataError, pathname};

const HTTP_TIMEOUT_SECONDS: u64 = 60;

/// Shared flag asking running solves to stop at their next web request.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A file part of a `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartFile<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct ExarataHttp {
    agent: Agent,
    ssl_checks: bool,
    cancellation: CancellationFlag,
}

impl ExarataHttp {
    /// Create the HTTP state from the configuration.
    ///
    /// `API_CONNECTION_ENABLE_SSL_CHECKS = false` disables certificate
    /// verification for every request of this agent.
    pub fn new(config: &ExarataConfig, cancellation: CancellationFlag) -> Self {
        let agent_config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(HTTP_TIMEOUT_SECONDS)))
            .tls_config(
                TlsConfig::builder()
                    .disable_verification(!config.api_connection_enable_ssl_checks)
                    .build(),
            )
            .build();
        ExarataHttp {
            agent: agent_config.into(),
            ssl_checks: config.api_connection_enable_ssl_checks,
            cancellation,
        }
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    fn check_cancelled(&self) -> Result<(), ExarataError> {
        if self.cancellation.is_cancelled() {
            Err(ExarataError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// GET a URL with query parameters and return the body as text.
    pub fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, ExarataError> {
        self.check_cancelled()?;
        debug!(url, "GET");
        let text = self
            .agent
            .get(url)
            .query_pairs(query.iter().copied())
            .call()?
            .body_mut()
            .read_to_string()?;
        Ok(text)
    }

    /// POST an `application/x-www-form-urlencoded` form and return the body as text.
    pub fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, ExarataError> {
        self.check_cancelled()?;
        debug!(url, "POST form");
        let text = self
            .agent
            .post(url)
            .send_form(form.iter().copied())?
            .body_mut()
            .read_to_string()?;
        Ok(text)
    }

    /// POST a `multipart/form-data` form made of text fields and one file.
    ///
    /// Must not be called from within an async context, solves run on
    /// blocking threads.
    pub fn post_multipart(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        file: &MultipartFile<'_>,
    ) -> Result<String, ExarataError> {
        self.check_cancelled()?;
        let form = multipart_form(fields, file)?;
        debug!(url, filename = file.filename, boundary = form.boundary(), "POST multipart");
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .danger_accept_invalid_certs(!self.ssl_checks)
            .build()?;
        let text = client.post(url).multipart(form).send()?.error_for_status()?.text()?;
        Ok(text)
    }

    /// Download a URL into a file.
    ///
    /// An existing file is only replaced when `overwrite` is set, otherwise
    /// [`ExarataError::File`] is returned before any request is made.
    pub fn download_file_from_url(
        &self,
        url: &str,
        path: &Utf8Path,
        overwrite: bool,
    ) -> Result<(), ExarataError> {
        if path.exists() && !overwrite {
            return Err(ExarataError::File(format!(
                "The file `{path}` already exists, overwrite is False"
            )));
        }
        self.check_cancelled()?;
        debug!(url, path = %path, "download");

        let directory = pathname::get_directory(path.as_str());
        if !directory.is_empty() {
            std::fs::create_dir_all(&directory)?;
        }
        let response = self.agent.get(url).call()?;
        let mut reader = response.into_body().into_reader();
        let mut file = File::create(path)?;
        std::io::copy(&mut reader, &mut file)?;
        file.flush()?;
        Ok(())
    }
}

/// Sleep between two calls to the same web API.
pub fn api_request_sleep(config: &ExarataConfig) {
    let seconds = config.api_connection_request_sleep_seconds.max(0.0);
    std::thread::sleep(Duration::from_secs_f64(seconds));
}

fn multipart_form(fields: &[(&str, &str)], file: &MultipartFile<'_>) -> Result<Form, ExarataError> {
    let part = Part::bytes(file.content.to_vec())
        .file_name(file.filename.to_string())
        .mime_str("application/octet-stream")?;
    let form = fields
        .iter()
        .fold(Form::new(), |form, (name, value)| form.text(name.to_string(), value.to_string()));
    Ok(form.part(file.field.to_string(), part))
}
