//! # astrometry.net web API client
//!
//! A small client of the nova.astrometry.net JSON API, limited to what a
//! plate solve needs:
//!
//! 1. `login` with the API key, which returns a session,
//! 2. `upload` a FITS file, which returns a submission id,
//! 3. poll `submissions/{id}` until a job id appears, then `jobs/{id}` until
//!    the job status is final,
//! 4. read `jobs/{id}/calibration` and download the result files.
//!
//! Every POST body is a form with a single `request-json` field holding the
//! JSON arguments.
use std::fs;

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    constants::{ASTROMETRY_NET_API_BASE_URL, ASTROMETRY_NET_FILE_BASE_URL},
    engine::{EngineDomain, ExarataEngine},
    exarata_errors::ExarataError,
    http::{ExarataHttp, MultipartFile},
    pathname,
};

/// Result files served for a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFileKind {
    /// The WCS header alone.
    Wcs,
    /// The uploaded image with the WCS header added.
    NewFits,
    /// Reference stars near the field.
    Rdls,
    /// Stars extracted from the image.
    Axy,
    /// Correspondences between extracted and reference stars.
    Corr,
}

impl ResultFileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFileKind::Wcs => "wcs",
            ResultFileKind::NewFits => "new_fits",
            ResultFileKind::Rdls => "rdls",
            ResultFileKind::Axy => "axy",
            ResultFileKind::Corr => "corr",
        }
    }
}

/// Status of a job as reported by `jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Solving,
    Failure,
    Other(String),
}

impl From<&str> for JobStatus {
    fn from(status: &str) -> Self {
        match status {
            "success" => JobStatus::Success,
            "solving" => JobStatus::Solving,
            "failure" => JobStatus::Failure,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

/// The `calibration` of a solved job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Calibration {
    pub ra: f64,
    pub dec: f64,
    pub radius: f64,
    pub pixscale: f64,
    pub orientation: f64,
    pub parity: f64,
}

#[derive(Debug)]
pub struct AstrometryNetWebApi {
    http: ExarataHttp,
    base_url: String,
    file_base_url: String,
    session: String,
    submission_id: Option<String>,
    job_id: Option<String>,
}

impl ExarataEngine for AstrometryNetWebApi {
    fn domain(&self) -> EngineDomain {
        EngineDomain::Astrometry
    }

    fn name(&self) -> String {
        "AstrometryNetWebApi".into()
    }
}

impl AstrometryNetWebApi {
    /// Log in to nova.astrometry.net.
    pub fn login(http: &ExarataHttp, apikey: &str) -> Result<Self, ExarataError> {
        Self::login_at(http, apikey, ASTROMETRY_NET_API_BASE_URL, ASTROMETRY_NET_FILE_BASE_URL)
    }

    /// Log in to a self-hosted astrometry.net service.
    ///
    /// Arguments
    /// -----------------
    /// * `base_url`: the API base, ending with `api/`.
    /// * `file_base_url`: the site base serving `{kind}_file/{job}`.
    pub fn login_at(
        http: &ExarataHttp,
        apikey: &str,
        base_url: &str,
        file_base_url: &str,
    ) -> Result<Self, ExarataError> {
        let mut client = AstrometryNetWebApi {
            http: http.clone(),
            base_url: base_url.to_string(),
            file_base_url: file_base_url.to_string(),
            session: String::new(),
            submission_id: None,
            job_id: None,
        };
        let mut args = Map::new();
        args.insert("apikey".into(), Value::from(apikey));
        let response = client.send_request("login", args)?;
        let session = response
            .get("session")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ExarataError::WebRequest("The provided API key did not provide a valid session.".into())
            })?;
        client.session = session.to_string();
        debug!("astrometry.net session opened");
        Ok(client)
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn submission_id(&self) -> Option<&str> {
        self.submission_id.as_deref()
    }

    fn service_url(&self, service: &str) -> String {
        format!("{}{service}", self.base_url)
    }

    fn request_json(&self, mut args: Map<String, Value>) -> String {
        if !self.session.is_empty() {
            args.insert("session".into(), Value::from(self.session.as_str()));
        }
        Value::Object(args).to_string()
    }

    fn send_request(&self, service: &str, args: Map<String, Value>) -> Result<Value, ExarataError> {
        let body = self.request_json(args);
        let text = self
            .http
            .post_form(&self.service_url(service), &[("request-json", body.as_str())])?;
        parse_api_response(&text)
    }

    fn get_json(&self, service: &str) -> Result<Value, ExarataError> {
        let text = self.http.get_text(&self.service_url(service), &[])?;
        parse_api_response(&text)
    }

    /// Upload a FITS image for solving; returns the submission id.
    pub fn upload_file(&mut self, path: &Utf8Path) -> Result<String, ExarataError> {
        if !path.is_file() {
            return Err(ExarataError::File(format!("The file to upload `{path}` does not exist")));
        }
        let content = fs::read(path)?;
        let filename = pathname::get_filename_with_extension(path.as_str());
        let mut args = Map::new();
        for (key, value) in [
            ("publicly_visible", "n"),
            ("allow_modifications", "d"),
            ("allow_commercial_use", "d"),
        ] {
            args.insert(key.into(), Value::from(value));
        }
        let body = self.request_json(args);
        let text = self.http.post_multipart(
            &self.service_url("upload"),
            &[("request-json", body.as_str())],
            &MultipartFile {
                field: "file",
                filename: &filename,
                content: &content,
            },
        )?;
        let response = parse_api_response(&text)?;
        let subid = response
            .get("subid")
            .map(json_id_to_string)
            .ok_or_else(|| ExarataError::WebRequest("The upload response has no submission id.".into()))?;
        info!(submission = %subid, file = %path, "uploaded to astrometry.net");
        self.submission_id = Some(subid.clone());
        self.job_id = None;
        Ok(subid)
    }

    /// The job of the current submission, `None` while it is still queued.
    pub fn job_id(&mut self) -> Result<Option<String>, ExarataError> {
        if self.job_id.is_some() {
            return Ok(self.job_id.clone());
        }
        let Some(subid) = self.submission_id.clone() else {
            return Err(ExarataError::WebRequest(
                "There cannot be a job id without a submission for that job to operate on.".into(),
            ));
        };
        let response = self.get_json(&format!("submissions/{subid}"))?;
        self.job_id = latest_job_id(&response);
        Ok(self.job_id.clone())
    }

    fn require_job_id(&mut self) -> Result<String, ExarataError> {
        self.job_id()?
            .ok_or_else(|| ExarataError::WebRequest("The submission has no job yet.".into()))
    }

    pub fn job_status(&mut self) -> Result<JobStatus, ExarataError> {
        let job = self.require_job_id()?;
        let response = self.get_json(&format!("jobs/{job}"))?;
        let status = response.get("status").and_then(Value::as_str).unwrap_or_default();
        Ok(JobStatus::from(status))
    }

    pub fn job_results(&mut self) -> Result<Calibration, ExarataError> {
        let job = self.require_job_id()?;
        let response = self.get_json(&format!("jobs/{job}/calibration"))?;
        Ok(serde_json::from_value(response)?)
    }

    /// Download one of the result files of the finished job.
    pub fn download_result_file(
        &mut self,
        kind: ResultFileKind,
        path: &Utf8Path,
        overwrite: bool,
    ) -> Result<(), ExarataError> {
        let job = self.require_job_id()?;
        let url = result_file_url(&self.file_base_url, kind, &job);
        self.http.download_file_from_url(&url, path, overwrite)
    }
}

fn result_file_url(file_base_url: &str, kind: ResultFileKind, job: &str) -> String {
    format!("{file_base_url}{}_file/{job}", kind.as_str())
}

fn json_id_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Parse an API response and turn an `error` status into [`ExarataError::WebRequest`].
fn parse_api_response(text: &str) -> Result<Value, ExarataError> {
    let response: Value = serde_json::from_str(text)?;
    if response.get("status").and_then(Value::as_str) == Some("error") {
        let message = response
            .get("errormessage")
            .and_then(Value::as_str)
            .unwrap_or("(none)");
        return Err(if message == "bad apikey" {
            ExarataError::WebRequest("The API key provided is not a valid key.".into())
        } else {
            ExarataError::WebRequest(format!("The server returned an error status message: {message}"))
        });
    }
    Ok(response)
}

/// The last job of a submission which is not null.
fn latest_job_id(submission: &Value) -> Option<String> {
    submission
        .get("jobs")?
        .as_array()?
        .iter()
        .rev()
        .find(|job| !job.is_null())
        .map(json_id_to_string)
}
